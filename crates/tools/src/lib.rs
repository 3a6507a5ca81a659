//! Read-only diagnostics over a running node: partition maps, progress
//! summaries and chunk images.
//!
//! # Invariants
//! - Nothing here mutates the state it inspects.

pub mod inspector;
pub mod render;

pub use inspector::{GameInspector, GameSummary, chunk_to_rgba};
pub use render::{RangeRenderer, render_cells};
