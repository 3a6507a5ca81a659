use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use rand::Rng;
use shardlife_common::Quadkey;
use shardlife_stream::WorldRange;

use crate::World;

/// How a chunk of a generation came to be complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Means {
    /// Part of the initial pattern of generation zero.
    Seeded,
    /// Derived locally from the previous generation.
    Computed,
    /// Pushed by a peer.
    Received,
}

/// Completion bookkeeping for one timestep, living in a recycled ring slot.
///
/// A generation is pending while any chunk of the world is missing and
/// complete once every chunk has been seeded, computed or received.
#[derive(Debug)]
pub struct Generation {
    number: Option<u64>,
    world: World,
    complete: bool,
    needed_chunks: BTreeSet<Quadkey>,
    completed_chunks: BTreeMap<Quadkey, Means>,
    /// Owned keys still to draw. Scratch: entries may already be complete.
    needed_own_pool: Vec<Quadkey>,
    /// Every key still to draw. Scratch, like the own pool.
    needed_pool: Vec<Quadkey>,
    collaborators: BTreeSet<String>,
    started_at: Instant,
    completed_at: Option<Instant>,
}

impl Generation {
    /// An unused slot. It holds no generation number until started.
    pub fn new(world: World) -> Self {
        Self {
            number: None,
            world,
            complete: false,
            needed_chunks: BTreeSet::new(),
            completed_chunks: BTreeMap::new(),
            needed_own_pool: Vec::new(),
            needed_pool: Vec::new(),
            collaborators: BTreeSet::new(),
            started_at: Instant::now(),
            completed_at: None,
        }
    }

    /// Re-purpose this slot for generation `number`. Does nothing unless
    /// `number` is newer than the one held.
    pub(crate) fn reset(&mut self, number: u64, range: &WorldRange) -> bool {
        if self.number.is_some_and(|held| number <= held) {
            return false;
        }
        self.number = Some(number);
        self.complete = false;
        self.completed_chunks.clear();
        self.collaborators.clear();
        self.started_at = Instant::now();
        self.completed_at = None;
        self.on_range_updated(range);
        tracing::debug!(generation = number, needed = self.needed_chunks.len(), "generation started");
        true
    }

    /// Rebuild the needed set and draw pools from the current partition.
    pub fn on_range_updated(&mut self, range: &WorldRange) {
        if self.number.is_none() || self.complete {
            return;
        }
        let completed = &self.completed_chunks;
        self.needed_own_pool = range
            .contents()
            .iter()
            .filter(|key| !completed.contains_key(*key))
            .cloned()
            .collect();
        self.needed_pool = range
            .all_keys()
            .iter()
            .filter(|key| !completed.contains_key(*key))
            .cloned()
            .collect();
        self.needed_chunks = self.needed_pool.iter().cloned().collect();
    }

    /// Draw a key to compute: a uniformly random owned key while any remain,
    /// else any key. Keys completed since they were pooled are skipped. The
    /// flag is whether the key came from the owned pool.
    pub(crate) fn draw(&mut self, rng: &mut impl Rng) -> Option<(Quadkey, bool)> {
        loop {
            let (pool, own) = if !self.needed_own_pool.is_empty() {
                (&mut self.needed_own_pool, true)
            } else if !self.needed_pool.is_empty() {
                (&mut self.needed_pool, false)
            } else {
                return None;
            };
            let index = rng.gen_range(0..pool.len());
            let key = pool.swap_remove(index);
            if !self.completed_chunks.contains_key(&key) {
                return Some((key, own));
            }
        }
    }

    /// Record `key` as complete. Returns false, changing nothing, if it
    /// already was.
    pub(crate) fn mark_complete(&mut self, key: &Quadkey, means: Means) -> bool {
        if self.completed_chunks.contains_key(key) {
            return false;
        }
        self.needed_chunks.remove(key);
        self.completed_chunks.insert(key.clone(), means);
        true
    }

    /// Re-evaluate completeness. Returns true only on the transition into
    /// complete.
    pub(crate) fn refresh_complete(&mut self) -> bool {
        if self.complete {
            tracing::warn!(generation = ?self.number, "completion check on a complete generation");
            return false;
        }
        if self.number.is_none() || !self.needed_chunks.is_empty() {
            return false;
        }
        self.complete = true;
        let now = Instant::now();
        self.completed_at = Some(now);
        tracing::info!(
            generation = ?self.number,
            duration_ms = (now - self.started_at).as_millis() as u64,
            collaborators = self.collaborators.len(),
            "generation complete"
        );
        true
    }

    pub(crate) fn add_collaborator(&mut self, address: &str) {
        if !self.collaborators.contains(address) {
            self.collaborators.insert(address.to_owned());
        }
    }

    pub fn number(&self) -> Option<u64> {
        self.number
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn needed_chunks(&self) -> &BTreeSet<Quadkey> {
        &self.needed_chunks
    }

    pub fn completed_chunks(&self) -> &BTreeMap<Quadkey, Means> {
        &self.completed_chunks
    }

    pub fn is_completed(&self, key: &Quadkey) -> bool {
        self.completed_chunks.contains_key(key)
    }

    /// Peers that supplied chunks of this generation.
    pub fn collaborators(&self) -> &BTreeSet<String> {
        &self.collaborators
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Instant> {
        self.completed_at
    }

    /// Time from start to completion.
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|at| at - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use shardlife_common::Point;

    use super::*;
    use crate::Void;

    fn setup(count: usize, index: usize) -> (Generation, WorldRange) {
        let mut range = WorldRange::new(Point::splat(8), Point::splat(2)).unwrap();
        range.update_membership(index, count, 1).unwrap();
        let world = World::new(Point::splat(8), Point::splat(2), Arc::new(Void)).unwrap();
        (Generation::new(world), range)
    }

    #[test]
    fn start_is_monotone() {
        let (mut generation, range) = setup(1, 0);
        assert!(generation.reset(3, &range));
        assert!(!generation.reset(3, &range));
        assert!(!generation.reset(2, &range));
        assert!(generation.reset(7, &range));
        assert_eq!(generation.number(), Some(7));
    }

    #[test]
    fn needs_every_chunk_of_the_world() {
        let (mut generation, range) = setup(2, 0);
        generation.reset(1, &range);
        assert_eq!(generation.needed_chunks().len(), 16);
        assert!(!generation.is_complete());
    }

    #[test]
    fn own_keys_are_drawn_first() {
        let (mut generation, range) = setup(4, 1);
        generation.reset(1, &range);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..range.contents().len() {
            let (key, own) = generation.draw(&mut rng).unwrap();
            assert!(own);
            assert!(range.owns(&key));
            generation.mark_complete(&key, Means::Computed);
        }
        let (key, own) = generation.draw(&mut rng).unwrap();
        assert!(!own);
        assert!(!generation.is_completed(&key));
    }

    #[test]
    fn draw_skips_completed_keys() {
        let (mut generation, range) = setup(1, 0);
        generation.reset(1, &range);
        let all: Vec<Quadkey> = range.all_keys().to_vec();
        for key in &all[1..] {
            generation.mark_complete(key, Means::Received);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(generation.draw(&mut rng), Some((all[0].clone(), true)));
        generation.mark_complete(&all[0], Means::Computed);
        assert_eq!(generation.draw(&mut rng), None);
    }

    #[test]
    fn same_seed_same_order() {
        let draws = |seed| {
            let (mut generation, range) = setup(1, 0);
            generation.reset(1, &range);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            std::iter::from_fn(|| generation.draw(&mut rng).map(|(k, _)| k)).collect::<Vec<_>>()
        };
        assert_eq!(draws(11), draws(11));
        assert_eq!(draws(11).len(), 16);
    }

    #[test]
    fn completion_is_first_writer_wins() {
        let (mut generation, range) = setup(1, 0);
        generation.reset(1, &range);
        let key = range.all_keys()[0].clone();
        assert!(generation.mark_complete(&key, Means::Received));
        assert!(!generation.mark_complete(&key, Means::Computed));
        assert_eq!(generation.completed_chunks()[&key], Means::Received);
    }

    #[test]
    fn completes_once_all_chunks_are_in() {
        let (mut generation, range) = setup(1, 0);
        generation.reset(1, &range);
        for key in range.all_keys() {
            assert!(!generation.refresh_complete());
            generation.mark_complete(key, Means::Computed);
        }
        assert!(generation.refresh_complete());
        assert!(generation.is_complete());
        assert!(generation.duration().is_some());
        assert!(!generation.refresh_complete());
    }
}
