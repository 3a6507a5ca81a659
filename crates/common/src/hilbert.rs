//! Hilbert curve over a square, power-of-two sided grid.
//!
//! Consecutive curve indices are always grid neighbours, and every aligned
//! power-of-two block occupies one contiguous run of indices. The partitioner
//! relies on the second property: a run of `chunk area` indices starting at a
//! multiple of the chunk area covers exactly one chunk.

use crate::{GeometryError, Point, validate_geometry};

/// Curve length covering a region of `size` cells.
pub fn size_to_length(size: Point) -> u64 {
    size.x as u64 * size.y as u64
}

/// Bijection between the cells of a `side x side` grid and `0..side²`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Curve {
    side: u64,
}

impl Curve {
    /// Curve for a world of `size`, which must be square with a power-of-two side.
    pub fn for_size(size: Point) -> Result<Self, GeometryError> {
        validate_geometry(size, Point::ONE)?;
        Ok(Self {
            side: size.x as u64,
        })
    }

    /// Total number of indices on the curve.
    pub fn length(&self) -> u64 {
        self.side * self.side
    }

    pub fn side(&self) -> u64 {
        self.side
    }

    /// Curve index of `point`, which must lie inside the grid.
    pub fn encode(&self, point: Point) -> u64 {
        debug_assert!(point.x >= 0 && point.y >= 0);
        let (mut x, mut y) = (point.x as u64, point.y as u64);
        let mut index = 0;
        let mut scale = self.side / 2;
        while scale > 0 {
            let rx = u64::from(x & scale != 0);
            let ry = u64::from(y & scale != 0);
            index += scale * scale * ((3 * rx) ^ ry);
            rotate(self.side, &mut x, &mut y, rx, ry);
            scale /= 2;
        }
        index
    }

    /// Cell at curve `index`, which must be below [`Curve::length`].
    pub fn decode(&self, index: u64) -> Point {
        debug_assert!(index < self.length());
        let (mut x, mut y) = (0u64, 0u64);
        let mut rest = index;
        let mut scale = 1;
        while scale < self.side {
            let rx = 1 & (rest / 2);
            let ry = 1 & (rest ^ rx);
            rotate(scale, &mut x, &mut y, rx, ry);
            x += scale * rx;
            y += scale * ry;
            rest /= 4;
            scale *= 2;
        }
        Point::new(x as i32, y as i32)
    }
}

/// Reflect and transpose a quadrant so the sub-curve inside it is oriented
/// like the parent.
fn rotate(scale: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = scale - 1 - *x;
            *y = scale - 1 - *y;
        }
        std::mem::swap(x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Region;

    fn curve(side: i32) -> Curve {
        Curve::for_size(Point::splat(side)).unwrap()
    }

    #[test]
    fn first_quadrant_comes_first() {
        let c = curve(4);
        let order: Vec<Point> = (0..4).map(|i| c.decode(i)).collect();
        assert_eq!(
            order,
            [
                Point::new(0, 0),
                Point::new(1, 0),
                Point::new(1, 1),
                Point::new(0, 1)
            ]
        );
        assert_eq!(c.decode(4), Point::new(0, 2));
    }

    #[test]
    fn every_point_survives_a_trip() {
        for side in [1, 2, 4, 8, 32] {
            let c = curve(side);
            for y in 0..side {
                for x in 0..side {
                    let p = Point::new(x, y);
                    assert_eq!(c.decode(c.encode(p)), p);
                }
            }
        }
    }

    #[test]
    fn consecutive_indices_are_adjacent() {
        let c = curve(16);
        for index in 1..c.length() {
            let step = c.decode(index) - c.decode(index - 1);
            assert_eq!(step.x.abs() + step.y.abs(), 1, "step at {index}");
        }
    }

    #[test]
    fn chunk_runs_walk_adjacent_chunks() {
        for (world, chunk) in [(2, 1), (4, 1), (4, 2), (16, 4)] {
            let c = curve(world);
            let chunk_size = Point::splat(chunk);
            let run = size_to_length(chunk_size);
            let mut prev: Option<Point> = None;
            for index in (0..c.length()).step_by(run as usize) {
                let at = Region::align(c.decode(index), chunk_size);
                if let Some(prev) = prev {
                    let step = at - prev;
                    assert_eq!(step.x.abs() + step.y.abs(), chunk, "{world}/{chunk} at {index}");
                }
                prev = Some(at);
            }
        }
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(Curve::for_size(Point::splat(12)).is_err());
        assert_eq!(size_to_length(Point::new(4, 8)), 32);
    }
}
