//! Shared geometry for the sharded Life engine.
//!
//! # Invariants
//! - Worlds and chunks are square with power-of-two sides.
//! - Quadkeys and curve indices are pure functions of position and world size,
//!   so every node derives the same names for the same chunk.

pub mod error;
pub mod hilbert;
pub mod quadkey;
pub mod types;

pub use error::{GeometryError, QuadkeyError};
pub use hilbert::{Curve, size_to_length};
pub use quadkey::Quadkey;
pub use types::{Point, Region, validate_geometry};
