use std::collections::{BTreeMap, BTreeSet};

use shardlife_common::{Curve, GeometryError, Point, Quadkey, Region, size_to_length, validate_geometry};

use crate::{Membership, MembershipError};

/// Offsets of the eight chunks around a chunk, in chunk units.
const COMPASS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// This node's slice of the Hilbert curve and the chunks it owns or borders.
///
/// Membership `(index, count, replicas)` selects a run of the curve starting
/// at `index / count` of the way along it and `replicas / count` of its length
/// long, wrapping at the end. Chunks the slice passes through, sampled once
/// per chunk's worth of curve, are the `contents`; chunks sharing an edge or
/// corner with them but not in the contents are the `neighbors`.
#[derive(Debug, Clone)]
pub struct WorldRange {
    size: Point,
    chunk_size: Point,
    curve: Curve,
    curve_length: u64,
    chunk_curve_length: u64,
    membership: Membership,
    /// First curve index of the slice.
    begin: u64,
    /// One past the last curve index, modulo the curve length. `begin == end == 0`
    /// is the whole curve.
    end: u64,
    contents: BTreeSet<Quadkey>,
    /// Adjacency count of every in-bounds chunk bordering the contents.
    neighborhood: BTreeMap<Quadkey, u32>,
    neighbors: Vec<Quadkey>,
    all_keys: Vec<Quadkey>,
}

impl WorldRange {
    /// A range over a `size` world of `chunk_size` chunks, initially owning
    /// everything as the sole member.
    pub fn new(size: Point, chunk_size: Point) -> Result<Self, GeometryError> {
        validate_geometry(size, chunk_size)?;
        let curve = Curve::for_size(size)?;

        let mut all_keys = Vec::new();
        for y in (0..size.y).step_by(chunk_size.y as usize) {
            for x in (0..size.x).step_by(chunk_size.x as usize) {
                let region = Region::new(Point::new(x, y), chunk_size);
                all_keys.push(Quadkey::encode(&region, size));
            }
        }
        all_keys.sort();

        let mut range = Self {
            size,
            chunk_size,
            curve,
            curve_length: curve.length(),
            chunk_curve_length: size_to_length(chunk_size),
            membership: Membership::solo(),
            begin: 0,
            end: 0,
            contents: BTreeSet::new(),
            neighborhood: BTreeMap::new(),
            neighbors: Vec::new(),
            all_keys,
        };
        range.set_range(0, 0);
        Ok(range)
    }

    /// Recompute ownership for a new membership view.
    pub fn update_membership(
        &mut self,
        index: usize,
        count: usize,
        replicas: usize,
    ) -> Result<(), MembershipError> {
        let membership = Membership::new(index, count, replicas)?;
        let _span =
            tracing::debug_span!("update_membership", index, count, replicas).entered();

        self.membership = membership;
        let (begin, end) = self.slice_for(index);
        self.set_range(begin, end);

        tracing::debug!(
            begin,
            end,
            contents = self.contents.len(),
            neighbors = self.neighbors.len(),
            "range updated"
        );
        Ok(())
    }

    /// Curve slice `[begin, end)` that member `index` owns under the current
    /// membership.
    fn slice_for(&self, index: usize) -> (u64, u64) {
        let length = self.curve_length as u128;
        let count = self.membership.count as u128;
        let replicas = self.membership.replicas as u128;

        let owned = (replicas * length).div_ceil(count);
        if owned > length {
            return (0, 0);
        }
        let begin = ((count + index as u128) * length / count) % length;
        let end = (begin + owned) % length;
        (begin as u64, end as u64)
    }

    /// Own the curve indices `[begin, end)`, wrapping past the end of the
    /// curve when `begin >= end`. An `end` of zero means the end of the curve.
    pub fn set_range(&mut self, begin: u64, end: u64) {
        self.begin = begin;
        self.end = end;
        self.contents.clear();
        self.neighborhood.clear();

        let end = if end == 0 { self.curve_length } else { end };
        if begin < end {
            self.add_range(begin, end);
        } else {
            self.add_range(0, end);
            self.add_range(begin, self.curve_length);
        }
        self.update_neighbors();
    }

    fn add_range(&mut self, begin: u64, end: u64) {
        let world = Region::at_origin(self.size);
        let mut index = begin;
        while index < end {
            let position = Region::align(self.curve.decode(index), self.chunk_size);
            self.contents
                .insert(Quadkey::encode(&Region::new(position, self.chunk_size), self.size));

            for (dx, dy) in COMPASS {
                let neighbor = Region::new(
                    position + Point::new(dx, dy) * self.chunk_size,
                    self.chunk_size,
                );
                if !world.contains(&neighbor) {
                    continue;
                }
                *self
                    .neighborhood
                    .entry(Quadkey::encode(&neighbor, self.size))
                    .or_default() += 1;
            }
            index += self.chunk_curve_length;
        }
    }

    fn update_neighbors(&mut self) {
        self.neighbors = self
            .neighborhood
            .iter()
            .filter(|(key, count)| **count > 0 && !self.contents.contains(*key))
            .map(|(key, _)| key.clone())
            .collect();
    }

    /// Index of the member that owns `key` under an even split of the curve.
    pub fn lookup(&self, key: &Quadkey) -> usize {
        let region = key.decode(self.size);
        let index = self.curve.encode(region.position) as u128;
        (index * self.membership.count as u128 / self.curve_length as u128) as usize
    }

    pub fn owns(&self, key: &Quadkey) -> bool {
        self.contents.contains(key)
    }

    /// Owned chunk keys, sorted.
    pub fn contents(&self) -> &BTreeSet<Quadkey> {
        &self.contents
    }

    /// Bordering chunk keys that are not owned, sorted.
    pub fn neighbors(&self) -> &[Quadkey] {
        &self.neighbors
    }

    pub fn neighborhood(&self) -> &BTreeMap<Quadkey, u32> {
        &self.neighborhood
    }

    /// Every chunk key of the world, sorted.
    pub fn all_keys(&self) -> &[Quadkey] {
        &self.all_keys
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn chunk_size(&self) -> Point {
        self.chunk_size
    }

    pub fn curve_length(&self) -> u64 {
        self.curve_length
    }

    pub fn chunk_curve_length(&self) -> u64 {
        self.chunk_curve_length
    }

    /// Number of quadkey digits naming a single chunk.
    pub fn chunk_depth(&self) -> usize {
        (self.size.x / self.chunk_size.x).trailing_zeros() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(world: i32, chunk: i32) -> WorldRange {
        WorldRange::new(Point::splat(world), Point::splat(chunk)).unwrap()
    }

    fn keys<'a>(keys: impl IntoIterator<Item = &'a Quadkey>) -> Vec<&'a str> {
        keys.into_iter().map(Quadkey::as_str).collect()
    }

    #[test]
    fn quarters_of_a_small_world() {
        let mut r = range(4, 2);
        r.set_range(0, r.curve_length());
        assert_eq!(keys(r.contents()), ["0", "1", "2", "3"]);
        assert!(r.neighbors().is_empty());

        r.set_range(0, r.curve_length() / 2);
        assert_eq!(keys(r.contents()), ["0", "2"]);
        assert_eq!(keys(r.neighbors()), ["1", "3"]);
    }

    #[test]
    fn corner_chunk_of_a_larger_world() {
        let mut r = range(16, 2);
        r.set_range(0, r.chunk_curve_length());
        assert_eq!(keys(r.contents()), ["000"]);
        assert_eq!(keys(r.neighbors()), ["001", "002", "003"]);

        r.set_range(0, r.curve_length());
        assert!(r.neighbors().is_empty());
        assert_eq!(r.contents().len(), 64);
    }

    #[test]
    fn sole_member_owns_everything() {
        let r = range(8, 2);
        assert_eq!((r.begin(), r.end()), (0, 0));
        assert_eq!(r.contents().len(), r.all_keys().len());
        assert_eq!(keys(r.contents()), keys(r.all_keys()));
    }

    #[test]
    fn halves_split_the_world() {
        let mut first = range(8, 2);
        let mut second = range(8, 2);
        first.update_membership(0, 2, 1).unwrap();
        second.update_membership(1, 2, 1).unwrap();

        assert_eq!(first.contents().len(), 8);
        assert_eq!(second.contents().len(), 8);
        assert!(first.contents().is_disjoint(second.contents()));
        for key in first.neighbors() {
            assert!(second.owns(key));
        }
    }

    #[test]
    fn replicas_cover_the_world_twice() {
        let r = range(8, 2);
        let total: usize = (0..4)
            .map(|index| {
                let mut r = r.clone();
                r.update_membership(index, 4, 2).unwrap();
                r.contents().len()
            })
            .sum();
        assert_eq!(total, 2 * r.all_keys().len());
    }

    #[test]
    fn last_member_wraps_around_the_curve() {
        let mut r = range(8, 2);
        r.update_membership(3, 4, 2).unwrap();
        let length = r.curve_length();
        assert_eq!(r.begin(), length * 3 / 4);
        assert_eq!(r.end(), length / 4);
        assert_eq!(r.contents().len(), 8);
        // The slice starts on the last quarter and ends after the first.
        let mut first = range(8, 2);
        first.update_membership(0, 4, 1).unwrap();
        assert!(first.contents().is_subset(r.contents()));
    }

    #[test]
    fn more_replicas_than_members_owns_everything() {
        let mut r = range(8, 2);
        r.update_membership(1, 2, 3).unwrap();
        assert_eq!((r.begin(), r.end()), (0, 0));
        assert_eq!(r.contents().len(), 16);
        assert!(r.neighbors().is_empty());
    }

    #[test]
    fn lookup_agrees_with_ownership() {
        for count in [1, 2, 4, 8] {
            for index in 0..count {
                let mut r = range(16, 2);
                r.update_membership(index, count, 1).unwrap();
                for key in r.contents() {
                    assert_eq!(r.lookup(key), index, "{key} among {count}");
                }
            }
        }
    }

    #[test]
    fn neighbors_are_sorted_and_never_owned() {
        let mut r = range(32, 4);
        r.update_membership(2, 5, 1).unwrap();
        let mut sorted = r.neighbors().to_vec();
        sorted.sort();
        assert_eq!(sorted, r.neighbors());
        assert!(r.neighbors().iter().all(|key| !r.owns(key)));
        assert!(!r.neighbors().is_empty());
    }

    #[test]
    fn invalid_membership_leaves_range_untouched() {
        let mut r = range(8, 2);
        assert!(r.update_membership(2, 2, 1).is_err());
        assert_eq!(r.membership(), Membership::solo());
        assert_eq!(r.contents().len(), 16);
    }

    #[test]
    fn chunk_depth_matches_keys() {
        let r = range(64, 8);
        assert_eq!(r.chunk_depth(), 3);
        assert!(r.all_keys().iter().all(|key| key.depth() == 3));
        assert_eq!(r.all_keys().len(), 64);
    }
}
