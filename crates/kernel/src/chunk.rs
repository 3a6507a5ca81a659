use shardlife_common::{Point, Region};

use crate::Backdrop;

/// A square tile of cells belonging to one generation's world.
///
/// Cells are stored one byte each (`0` or `1`), row-major, which is also the
/// wire encoding of a chunk push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    region: Region,
    cells: Vec<u8>,
    /// Generation whose state the cells currently hold.
    generation: Option<u64>,
}

impl Chunk {
    /// A chunk covering `region`, filled from `backdrop`.
    pub fn new(region: Region, backdrop: &dyn Backdrop) -> Self {
        let mut cells = Vec::with_capacity(region.area());
        for y in 0..region.size.y {
            for x in 0..region.size.x {
                cells.push(backdrop.sample(region.position + Point::new(x, y)));
            }
        }
        Self {
            region,
            cells,
            generation: None,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn position(&self) -> Point {
        self.region.position
    }

    pub fn size(&self) -> Point {
        self.region.size
    }

    /// Cell at world coordinate `point`, or `None` when the point lies in
    /// another chunk.
    pub fn get(&self, point: Point) -> Option<u8> {
        self.offset(point).map(|i| self.cells[i])
    }

    /// Set the cell at world coordinate `point`. Returns false when the point
    /// lies in another chunk.
    pub fn set(&mut self, point: Point, alive: bool) -> bool {
        match self.offset(point) {
            Some(i) => {
                self.cells[i] = u8::from(alive);
                true
            }
            None => false,
        }
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Overwrite every cell. `cells` must hold exactly one byte per cell.
    pub fn copy_from(&mut self, cells: &[u8]) {
        self.cells.copy_from_slice(cells);
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn set_generation(&mut self, generation: u64) {
        self.generation = Some(generation);
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|c| **c != 0).count()
    }

    fn offset(&self, point: Point) -> Option<usize> {
        let local = point - self.region.position;
        if local.x < 0 || local.y < 0 || local.x >= self.region.size.x || local.y >= self.region.size.y
        {
            return None;
        }
        Some(local.y as usize * self.region.size.x as usize + local.x as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Soup, Void};

    fn chunk_at(x: i32, y: i32) -> Chunk {
        Chunk::new(Region::new(Point::new(x, y), Point::splat(4)), &Void)
    }

    #[test]
    fn cells_are_row_major() {
        let mut chunk = chunk_at(4, 8);
        assert!(chunk.set(Point::new(5, 8), true));
        assert!(chunk.set(Point::new(4, 9), true));
        assert_eq!(&chunk.cells()[..6], &[0, 1, 0, 0, 1, 0]);
        assert_eq!(chunk.population(), 2);
    }

    #[test]
    fn points_outside_are_misses() {
        let mut chunk = chunk_at(4, 4);
        assert_eq!(chunk.get(Point::new(3, 4)), None);
        assert_eq!(chunk.get(Point::new(8, 4)), None);
        assert!(!chunk.set(Point::new(4, 8), true));
        assert_eq!(chunk.get(Point::new(7, 7)), Some(0));
    }

    #[test]
    fn fills_from_backdrop() {
        let soup = Soup::new(3, 0.5);
        let region = Region::new(Point::new(8, 0), Point::splat(4));
        let chunk = Chunk::new(region, &soup);
        for y in 0..4 {
            for x in 8..12 {
                let p = Point::new(x, y);
                assert_eq!(chunk.get(p), Some(soup.sample(p)));
            }
        }
    }
}
