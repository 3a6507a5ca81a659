use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use shardlife_common::Quadkey;

use crate::{ChunkPush, TransportError};

/// Identity of one push: which chunk of which generation to which peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    pub peer: usize,
    pub generation: u64,
    pub quadkey: Quadkey,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.peer, self.generation, self.quadkey)
    }
}

/// One locally computed chunk on its way to one peer.
///
/// The payload is shared between the pushes of the same chunk to different
/// peers. The transport is expected to give up after `timeout` and report it
/// through [`DispatchQueue::acknowledge`].
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub id: RequestId,
    pub chunk: Arc<[u8]>,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn peer(&self) -> usize {
        self.id.peer
    }

    pub fn generation(&self) -> u64 {
        self.id.generation
    }

    pub fn quadkey(&self) -> &Quadkey {
        &self.id.quadkey
    }

    /// The wire message carrying this request.
    pub fn to_push(&self) -> ChunkPush {
        ChunkPush {
            generation: self.id.generation,
            quadkey: self.id.quadkey.to_string(),
            chunk: self.chunk.to_vec(),
        }
    }
}

/// Running counters for the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub enqueued: u64,
    pub duplicates: u64,
    pub sent: u64,
    pub acknowledged: u64,
    pub failed: u64,
    pub stale: u64,
}

/// FIFO of outbound chunk pushes with a cap on how many are in flight.
///
/// A request id is admitted once while it is queued or in flight. Requests for
/// generations older than the one before the current generation are dropped
/// when they reach the head of the queue rather than sent. Failures are kept
/// as an advisory last error; nothing is retried.
#[derive(Debug)]
pub struct DispatchQueue {
    max_concurrent: usize,
    queue: VecDeque<OutboundRequest>,
    queued: HashSet<RequestId>,
    in_flight: HashSet<RequestId>,
    last_error: Option<TransportError>,
    stats: DispatchStats,
}

impl DispatchQueue {
    /// # Panics
    ///
    /// If `max_concurrent` is zero, since nothing could ever be sent.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be positive");
        Self {
            max_concurrent,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            last_error: None,
            stats: DispatchStats::default(),
        }
    }

    /// Queue a request. Returns false if the same id is already queued or in flight.
    pub fn enqueue(&mut self, request: OutboundRequest) -> bool {
        if self.queued.contains(&request.id) || self.in_flight.contains(&request.id) {
            tracing::trace!(id = %request.id, "duplicate push suppressed");
            self.stats.duplicates += 1;
            return false;
        }
        self.queued.insert(request.id.clone());
        self.queue.push_back(request);
        self.stats.enqueued += 1;
        true
    }

    /// Take the next request to send, if a slot is free.
    ///
    /// Stale requests at the head of the queue are discarded on the way. The
    /// returned request counts as in flight until it is acknowledged.
    pub fn next_ready(&mut self, current_generation: u64) -> Option<OutboundRequest> {
        if self.in_flight.len() >= self.max_concurrent {
            return None;
        }
        while let Some(request) = self.queue.pop_front() {
            self.queued.remove(&request.id);
            if request.generation() < current_generation.saturating_sub(1) {
                tracing::trace!(id = %request.id, current_generation, "stale push dropped");
                self.stats.stale += 1;
                continue;
            }
            self.in_flight.insert(request.id.clone());
            self.stats.sent += 1;
            return Some(request);
        }
        None
    }

    /// Settle an in-flight request. Returns false for ids that are not in flight,
    /// which leaves the counters untouched.
    pub fn acknowledge(&mut self, id: &RequestId, result: Result<(), TransportError>) -> bool {
        if !self.in_flight.remove(id) {
            tracing::warn!(%id, "acknowledgement for a request that is not in flight");
            return false;
        }
        match result {
            Ok(()) => self.stats.acknowledged += 1,
            Err(error) => {
                tracing::warn!(%id, %error, "chunk push failed");
                self.stats.failed += 1;
                self.last_error = Some(error);
            }
        }
        true
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}
