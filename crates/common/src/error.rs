/// Geometry that the curve and quadkey math cannot represent.
///
/// Raised while validating configuration, before any world is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("{what} must be square, got {width}x{height}")]
    NotSquare {
        what: &'static str,
        width: i32,
        height: i32,
    },
    #[error("{what} side must be a positive power of two, got {side}")]
    NotPowerOfTwo { what: &'static str, side: i32 },
    #[error("chunk side {chunk} exceeds world side {world}")]
    ChunkLargerThanWorld { chunk: i32, world: i32 },
    #[error("world side {side} exceeds the supported maximum {max}")]
    TooLarge { side: i32, max: i32 },
}

/// A quadkey string that does not name a region.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuadkeyError {
    #[error("invalid quadkey digit {digit:?} at position {position}")]
    InvalidDigit { digit: char, position: usize },
}
