use std::sync::Arc;

use shardlife_common::{GeometryError, Point, Quadkey, Region, validate_geometry};

use crate::{Backdrop, Chunk, Rule};

/// One generation's grid, split into chunks that materialize on first use.
///
/// Reads outside the world, or inside a chunk that was never materialized,
/// fall through to the backdrop.
#[derive(Debug, Clone)]
pub struct World {
    size: Point,
    chunk_size: Point,
    columns: usize,
    chunks: Vec<Option<Chunk>>,
    backdrop: Arc<dyn Backdrop>,
}

impl World {
    pub fn new(
        size: Point,
        chunk_size: Point,
        backdrop: Arc<dyn Backdrop>,
    ) -> Result<Self, GeometryError> {
        validate_geometry(size, chunk_size)?;
        let columns = (size.x / chunk_size.x) as usize;
        Ok(Self {
            size,
            chunk_size,
            columns,
            chunks: vec![None; columns * columns],
            backdrop,
        })
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn chunk_size(&self) -> Point {
        self.chunk_size
    }

    /// Number of chunks materialized so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().flatten().count()
    }

    /// The chunk at `key`, if it has been materialized.
    pub fn chunk(&self, key: &Quadkey) -> Option<&Chunk> {
        self.slot_of_key(key).and_then(|slot| self.chunks[slot].as_ref())
    }

    /// The chunk at `key`, materializing it from the backdrop on first use.
    /// `None` when `key` does not name a chunk of this world.
    pub fn default_chunk(&mut self, key: &Quadkey) -> Option<&mut Chunk> {
        let slot = self.slot_of_key(key)?;
        let region = key.decode(self.size);
        let backdrop = &self.backdrop;
        Some(self.chunks[slot].get_or_insert_with(|| Chunk::new(region, backdrop.as_ref())))
    }

    /// Cell at `point`.
    pub fn get(&self, point: Point) -> u8 {
        self.slot_of_point(point)
            .and_then(|slot| self.chunks[slot].as_ref())
            .and_then(|chunk| chunk.get(point))
            .unwrap_or_else(|| self.backdrop.sample(point))
    }

    /// Set the cell at `point`, materializing its chunk. Points outside the
    /// world are ignored.
    pub fn set(&mut self, point: Point, alive: bool) -> bool {
        if !Region::at_origin(self.size).contains_point(point) {
            return false;
        }
        let position = Region::align(point, self.chunk_size);
        let key = Quadkey::encode(&Region::new(position, self.chunk_size), self.size);
        self.default_chunk(&key)
            .is_some_and(|chunk| chunk.set(point, alive))
    }

    /// Overwrite the chunks at `keys` with cells sampled from `source`.
    pub fn fill<'a>(&mut self, keys: impl IntoIterator<Item = &'a Quadkey>, source: &dyn Backdrop) {
        for key in keys {
            let Some(chunk) = self.default_chunk(key) else {
                continue;
            };
            let region = chunk.region();
            let cells = Chunk::new(region, source);
            chunk.copy_from(cells.cells());
        }
    }

    /// Apply `rule` to the chunk at `key`, returning the cells of its
    /// successor. Neighbours across the chunk edge are read from this world.
    pub fn evolve_chunk(&self, key: &Quadkey, rule: &dyn Rule) -> Option<Vec<u8>> {
        self.slot_of_key(key)?;
        let region = key.decode(self.size);
        let mut next = Vec::with_capacity(region.area());
        for y in 0..region.size.y {
            for x in 0..region.size.x {
                let point = region.position + Point::new(x, y);
                let mut neighbors = 0;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if dx != 0 || dy != 0 {
                            neighbors += self.get(point + Point::new(dx, dy));
                        }
                    }
                }
                next.push(u8::from(rule.next(self.get(point) != 0, neighbors)));
            }
        }
        Some(next)
    }

    /// Live cells across all materialized chunks.
    pub fn population(&self) -> usize {
        self.chunks.iter().flatten().map(Chunk::population).sum()
    }

    /// FNV-1a over the cells of `keys` in the given order. Unmaterialized
    /// chunks hash their backdrop cells.
    pub fn state_hash<'a>(&self, keys: impl IntoIterator<Item = &'a Quadkey>) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mut mix = |byte: u8| {
            h ^= byte as u64;
            h = h.wrapping_mul(0x0100_0000_01b3);
        };
        for key in keys {
            for b in key.as_str().bytes() {
                mix(b);
            }
            match self.chunk(key) {
                Some(chunk) => chunk.cells().iter().copied().for_each(&mut mix),
                None => {
                    let region = key.decode(self.size);
                    for y in 0..region.size.y {
                        for x in 0..region.size.x {
                            mix(self.backdrop.sample(region.position + Point::new(x, y)));
                        }
                    }
                }
            }
        }
        h
    }

    fn slot_of_key(&self, key: &Quadkey) -> Option<usize> {
        let region = key.decode(self.size);
        if region.size != self.chunk_size {
            return None;
        }
        self.slot_of_point(region.position)
    }

    fn slot_of_point(&self, point: Point) -> Option<usize> {
        if !Region::at_origin(self.size).contains_point(point) {
            return None;
        }
        let column = (point.x / self.chunk_size.x) as usize;
        let row = (point.y / self.chunk_size.y) as usize;
        Some(row * self.columns + column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LifeLike, Soup, Void};

    fn world(size: i32, chunk: i32) -> World {
        World::new(Point::splat(size), Point::splat(chunk), Arc::new(Void)).unwrap()
    }

    fn key(w: &World, x: i32, y: i32) -> Quadkey {
        Quadkey::encode(&Region::new(Point::new(x, y), w.chunk_size()), w.size())
    }

    #[test]
    fn chunks_materialize_on_demand() {
        let mut w = world(16, 4);
        assert_eq!(w.chunk_count(), 0);
        let k = key(&w, 4, 8);
        assert!(w.chunk(&k).is_none());
        let chunk = w.default_chunk(&k).unwrap();
        assert_eq!(chunk.position(), Point::new(4, 8));
        assert_eq!(w.chunk_count(), 1);
    }

    #[test]
    fn keys_of_other_depths_are_not_chunks() {
        let mut w = world(16, 4);
        assert!(w.default_chunk(&Quadkey::root()).is_none());
        assert!(w.default_chunk(&Quadkey::parse("012").unwrap()).is_none());
        assert!(w.default_chunk(&Quadkey::parse("01").unwrap()).is_some());
    }

    #[test]
    fn misses_fall_back_to_backdrop() {
        let soup = Soup::new(9, 0.5);
        let w = World::new(Point::splat(8), Point::splat(4), Arc::new(soup)).unwrap();
        for p in [Point::new(-1, 3), Point::new(8, 8), Point::new(2, 2)] {
            assert_eq!(w.get(p), soup.sample(p));
        }
    }

    #[test]
    fn blinker_oscillates_across_chunk_edges() {
        let mut w = world(8, 4);
        // Vertical blinker centred on (4, 3), straddling four chunks.
        for p in [Point::new(4, 2), Point::new(4, 3), Point::new(4, 4)] {
            assert!(w.set(p, true));
        }
        let life = LifeLike::conway();
        let mut next = world(8, 4);
        let keys: Vec<Quadkey> = (0..2)
            .flat_map(|y| (0..2).map(move |x| (x * 4, y * 4)))
            .map(|(x, y)| key(&w, x, y))
            .collect();
        for k in &keys {
            let cells = w.evolve_chunk(k, &life).unwrap();
            next.default_chunk(k).unwrap().copy_from(&cells);
        }
        assert_eq!(next.population(), 3);
        for p in [Point::new(3, 3), Point::new(4, 3), Point::new(5, 3)] {
            assert_eq!(next.get(p), 1, "{p}");
        }
        assert_eq!(next.get(Point::new(4, 2)), 0);
    }

    #[test]
    fn state_hash_depends_on_cells() {
        let mut a = world(8, 4);
        let b = world(8, 4);
        let keys: Vec<Quadkey> = vec![key(&a, 0, 0), key(&a, 4, 0)];
        assert_eq!(a.state_hash(&keys), b.state_hash(&keys));
        a.set(Point::new(5, 1), true);
        assert_ne!(a.state_hash(&keys), b.state_hash(&keys));
    }

    #[test]
    fn fill_overwrites_from_source() {
        let mut w = world(8, 4);
        let k = key(&w, 0, 4);
        let soup = Soup::new(1, 1.0);
        w.fill([&k], &soup);
        assert_eq!(w.chunk(&k).unwrap().population(), 16);
        assert!(!w.set(Point::new(9, 0), true));
    }
}
