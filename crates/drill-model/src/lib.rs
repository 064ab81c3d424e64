//! Drillreel Drill Model
//!
//! Defines the data contracts the render pipeline consumes:
//! - **Drill:** the catalog's learning unit (three parallel texts plus media)
//! - **RenderItem:** the read-only projection of a drill needed for one frame
//! - **RenderJob:** one unit of render work (short or demo)
//! - **Locator:** normalized media references (remote URL, media path, local file)
//!
//! The render engine never talks to the catalog; callers hand it fully
//! populated `RenderJob`s.

pub mod drill;
pub mod item;
pub mod job;
pub mod locator;

pub use drill::*;
pub use item::*;
pub use job::*;
pub use locator::*;
