pub mod check;
pub mod demo;
pub mod frame;
pub mod init;
pub mod render;
pub mod short;
