use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// A cell or chunk coordinate. `x` grows east, `y` grows south.
pub type Point = glam::IVec2;

/// Largest supported world side, keeping `side * side` inside a `u64` curve
/// index with room for the ownership arithmetic.
pub const MAX_WORLD_SIDE: i32 = 1 << 30;

/// Axis-aligned region: a position (north-west corner) and a size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub position: Point,
    pub size: Point,
}

impl Region {
    pub fn new(position: Point, size: Point) -> Self {
        Self { position, size }
    }

    /// Region at the origin covering `size`.
    pub fn at_origin(size: Point) -> Self {
        Self::new(Point::ZERO, size)
    }

    /// Whether `other` lies entirely inside this region.
    pub fn contains(&self, other: &Region) -> bool {
        let end = self.position + self.size;
        let other_end = other.position + other.size;
        other.position.x >= self.position.x
            && other.position.y >= self.position.y
            && other_end.x <= end.x
            && other_end.y <= end.y
    }

    pub fn contains_point(&self, point: Point) -> bool {
        let end = self.position + self.size;
        point.x >= self.position.x && point.y >= self.position.y && point.x < end.x && point.y < end.y
    }

    /// Number of cells covered.
    pub fn area(&self) -> usize {
        self.size.x as usize * self.size.y as usize
    }

    /// Snap `point` down to the grid of `cell` sized tiles (floor division).
    pub fn align(point: Point, cell: Point) -> Point {
        Point::new(
            point.x.div_euclid(cell.x) * cell.x,
            point.y.div_euclid(cell.y) * cell.y,
        )
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.position.x, self.position.y, self.size.x, self.size.y
        )
    }
}

/// Check that a world and its chunks fit the curve and quadkey math:
/// both square, both power-of-two sided, chunk no larger than the world.
pub fn validate_geometry(world: Point, chunk: Point) -> Result<(), GeometryError> {
    check_square("world", world)?;
    check_square("chunk", chunk)?;
    if world.x > MAX_WORLD_SIDE {
        return Err(GeometryError::TooLarge {
            side: world.x,
            max: MAX_WORLD_SIDE,
        });
    }
    if chunk.x > world.x {
        return Err(GeometryError::ChunkLargerThanWorld {
            chunk: chunk.x,
            world: world.x,
        });
    }
    Ok(())
}

fn check_square(what: &'static str, size: Point) -> Result<(), GeometryError> {
    if size.x != size.y {
        return Err(GeometryError::NotSquare {
            what,
            width: size.x,
            height: size.y,
        });
    }
    if size.x <= 0 || (size.x as u32).count_ones() != 1 {
        return Err(GeometryError::NotPowerOfTwo { what, side: size.x });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_contains_region() {
        let world = Region::at_origin(Point::new(4, 4));
        assert!(world.contains(&Region::new(Point::new(2, 2), Point::new(2, 2))));
        assert!(!world.contains(&Region::new(Point::new(3, 2), Point::new(2, 2))));
        assert!(!world.contains(&Region::new(Point::new(-2, 0), Point::new(2, 2))));
    }

    #[test]
    fn align_floors_negative_coordinates() {
        let cell = Point::new(4, 4);
        assert_eq!(Region::align(Point::new(5, 7), cell), Point::new(4, 4));
        assert_eq!(Region::align(Point::new(-1, 0), cell), Point::new(-4, 0));
    }

    #[test]
    fn geometry_accepts_powers_of_two() {
        assert!(validate_geometry(Point::new(512, 512), Point::new(32, 32)).is_ok());
        assert!(validate_geometry(Point::new(1, 1), Point::new(1, 1)).is_ok());
    }

    #[test]
    fn geometry_rejects_bad_sizes() {
        assert_eq!(
            validate_geometry(Point::new(12, 12), Point::new(4, 4)),
            Err(GeometryError::NotPowerOfTwo {
                what: "world",
                side: 12
            })
        );
        assert!(matches!(
            validate_geometry(Point::new(16, 8), Point::new(4, 4)),
            Err(GeometryError::NotSquare { what: "world", .. })
        ));
        assert!(matches!(
            validate_geometry(Point::new(8, 8), Point::new(16, 16)),
            Err(GeometryError::ChunkLargerThanWorld { .. })
        ));
        assert!(matches!(
            validate_geometry(Point::new(8, 8), Point::new(0, 0)),
            Err(GeometryError::NotPowerOfTwo { what: "chunk", .. })
        ));
    }
}
