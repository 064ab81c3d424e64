//! Drillreel Render Engine
//!
//! Turns drill items into short videos: one still frame per item, held for
//! as long as its audio needs, joined into a timeline and encoded.
//!
//! # Pipeline Architecture
//!
//! ```text
//! item ──┬── photo ──┐
//!        │           ├── Frame Composer ──┐
//!        ├── texts ──┘                    ├── Track Synchronizer ── Clip
//!        └── audio ───────────────────────┘                          │
//!                                                                    ▼
//!                                  intro card ── Sequence Assembler ── outro card
//!                                                       │
//!                                                       ▼
//!                                              Output Sink (ffmpeg)
//!                                                       │
//!                                          ┌────────────┴────────────┐
//!                                          ▼                         ▼
//!                                   object storage URL          local .mp4
//! ```

pub mod assets;
pub mod builtin_font;
pub mod compositor;
pub mod export;
pub mod fonts;
pub mod pipeline;
pub mod sequence;
pub mod storage;
pub mod sync;

pub use export::*;
pub use pipeline::{RenderOutcome, RenderPipeline};
