use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shardlife_common::Quadkey;
use shardlife_stream::WorldRange;

use crate::{Backdrop, GameError, Generation, Means, ReceiveOutcome, Rule, World};

/// A chunk produced by [`Pipeline::compute_chunk`].
#[derive(Debug, Clone)]
pub struct ComputedChunk {
    pub key: Quadkey,
    /// Drawn from the owned pool, so peers should be sent a copy.
    pub own: bool,
    pub generation: u64,
    pub cells: Arc<[u8]>,
}

/// Fixed ring of generation slots. Slot `k` holds generations `k`, `k + N`,
/// `k + 2N`, ... for a ring of `N` slots.
///
/// A generation computes only while its predecessor is complete, and it
/// completes only once its predecessor has, unless the predecessor has left
/// the ring.
#[derive(Debug)]
pub struct Pipeline {
    slots: Vec<Generation>,
    current: usize,
    rng: ChaCha8Rng,
}

impl Pipeline {
    /// A ring of `ring_size` empty copies of `world`. `seed` pins the order in
    /// which chunks are drawn for computation.
    pub fn new(ring_size: usize, world: World, seed: u64) -> Result<Self, GameError> {
        if ring_size < 2 {
            return Err(GameError::RingTooSmall(ring_size));
        }
        Ok(Self {
            slots: (0..ring_size).map(|_| Generation::new(world.clone())).collect(),
            current: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Start generation zero in slot 0, complete and filled from `genesis`,
    /// and generation one behind it.
    pub fn seed_genesis(&mut self, genesis: &dyn Backdrop, range: &WorldRange) {
        self.begin(0, 0, range);
        let keys = range.all_keys();
        let slot = &mut self.slots[0];
        slot.world_mut().fill(keys, genesis);
        for key in keys {
            if let Some(chunk) = slot.world_mut().default_chunk(key) {
                chunk.set_generation(0);
            }
            slot.mark_complete(key, Means::Seeded);
        }
        self.check_completion(0, range);
    }

    /// Move `slot` forward to generation `number`, then advance the ring as
    /// far as completed generations allow.
    pub fn start(&mut self, slot: usize, number: u64, range: &WorldRange) -> bool {
        if !self.begin(slot, number, range) {
            return false;
        }
        self.check_completion(slot, range);
        true
    }

    fn begin(&mut self, slot: usize, number: u64, range: &WorldRange) -> bool {
        if !self.slots[slot].reset(number, range) {
            return false;
        }
        if self.slots[self.current].number().is_none_or(|held| number > held) {
            self.current = slot;
        }
        true
    }

    /// Complete `slot` if it is ready, and keep completing forward. Each
    /// completion starts the next generation in the following slot.
    fn check_completion(&mut self, mut slot: usize, range: &WorldRange) {
        loop {
            let generation = &self.slots[slot];
            if generation.is_complete() || !self.predecessor_settled(slot) {
                return;
            }
            let Some(number) = generation.number() else {
                return;
            };
            if !self.slots[slot].refresh_complete() {
                return;
            }
            let Some(following) = number.checked_add(1) else {
                return;
            };
            let next = self.next(slot);
            match self.slots[next].number() {
                Some(held) if held > following => return,
                Some(held) if held == following => {}
                _ => {
                    self.begin(next, following, range);
                }
            }
            slot = next;
        }
    }

    /// True when the predecessor of `slot` is complete, or no longer holds
    /// the generation before it.
    fn predecessor_settled(&self, slot: usize) -> bool {
        let Some(number) = self.slots[slot].number() else {
            return false;
        };
        let Some(expected) = number.checked_sub(1) else {
            return true;
        };
        let prev = &self.slots[self.prev(slot)];
        prev.number() != Some(expected) || prev.is_complete()
    }

    /// True when the predecessor of `slot` is complete and is exactly the
    /// generation before it.
    fn predecessor_ready(&self, slot: usize) -> bool {
        let Some(expected) = self.slots[slot].number().and_then(|n| n.checked_sub(1)) else {
            return false;
        };
        let prev = &self.slots[self.prev(slot)];
        prev.number() == Some(expected) && prev.is_complete()
    }

    /// Compute one chunk of the generation in `slot` from its predecessor.
    pub fn compute_chunk(
        &mut self,
        slot: usize,
        rule: &dyn Rule,
        range: &WorldRange,
    ) -> Option<ComputedChunk> {
        let number = self.slots[slot].number()?;
        if self.slots[slot].is_complete() || !self.predecessor_ready(slot) {
            return None;
        }
        let (key, own) = self.slots[slot].draw(&mut self.rng)?;
        let prev = self.prev(slot);
        let cells = self.slots[prev].world().evolve_chunk(&key, rule)?;
        let chunk = self.slots[slot].world_mut().default_chunk(&key)?;
        chunk.copy_from(&cells);
        chunk.set_generation(number);
        self.complete_chunk(slot, &key, Means::Computed, range);
        Some(ComputedChunk {
            key,
            own,
            generation: number,
            cells: cells.into(),
        })
    }

    /// Store a chunk pushed by `from`. The payload must already be known to
    /// hold one byte per cell.
    pub fn receive_chunk(
        &mut self,
        slot: usize,
        key: &Quadkey,
        payload: &[u8],
        from: &str,
        range: &WorldRange,
    ) -> ReceiveOutcome {
        let generation = &mut self.slots[slot];
        let Some(number) = generation.number() else {
            return ReceiveOutcome::Stale;
        };
        if generation.is_completed(key) {
            tracing::trace!(generation = number, %key, from, "duplicate chunk ignored");
            return ReceiveOutcome::Duplicate;
        }
        let Some(chunk) = generation.world_mut().default_chunk(key) else {
            return ReceiveOutcome::Rejected;
        };
        chunk.copy_from(payload);
        chunk.set_generation(number);
        generation.add_collaborator(from);
        self.complete_chunk(slot, key, Means::Received, range);
        ReceiveOutcome::Applied
    }

    /// Mark `key` complete in `slot`. Returns false if it already was.
    pub fn complete_chunk(
        &mut self,
        slot: usize,
        key: &Quadkey,
        means: Means,
        range: &WorldRange,
    ) -> bool {
        if !self.slots[slot].mark_complete(key, means) {
            return false;
        }
        self.check_completion(slot, range);
        true
    }

    /// The slot holding generation `number`, moving it and its predecessor
    /// forward when the ring lags behind. `None` when the generation has
    /// already been recycled.
    pub fn get(&mut self, number: u64, range: &WorldRange) -> Option<usize> {
        let slot = (number % self.slots.len() as u64) as usize;
        match self.slots[slot].number() {
            Some(held) if held > number => None,
            Some(held) if held == number => Some(slot),
            _ => {
                self.begin(slot, number, range);
                if let Some(previous) = number.checked_sub(1) {
                    let prev = self.prev(slot);
                    self.start(prev, previous, range);
                }
                self.check_completion(slot, range);
                Some(slot)
            }
        }
    }

    /// Re-derive the needed pools of every slot after a membership change.
    pub fn on_range_updated(&mut self, range: &WorldRange) {
        for generation in &mut self.slots {
            generation.on_range_updated(range);
        }
    }

    /// Slot of the highest generation started so far.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_number(&self) -> u64 {
        self.slots[self.current].number().unwrap_or(0)
    }

    pub fn current_generation(&self) -> &Generation {
        &self.slots[self.current]
    }

    pub fn generation(&self, slot: usize) -> &Generation {
        &self.slots[slot]
    }

    /// The slot holding exactly generation `number`, without moving anything.
    pub fn find(&self, number: u64) -> Option<&Generation> {
        let slot = (number % self.slots.len() as u64) as usize;
        let generation = &self.slots[slot];
        (generation.number() == Some(number)).then_some(generation)
    }

    /// Highest generation known to be complete.
    pub fn latest_complete(&self) -> Option<&Generation> {
        self.slots
            .iter()
            .filter(|g| g.is_complete())
            .max_by_key(|g| g.number())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Generation> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn next(&self, slot: usize) -> usize {
        (slot + 1) % self.slots.len()
    }

    fn prev(&self, slot: usize) -> usize {
        (slot + self.slots.len() - 1) % self.slots.len()
    }
}
