use std::sync::Arc;

use shardlife_common::Quadkey;
use shardlife_stream::{
    ChunkAck, ChunkPush, DispatchQueue, MemberList, OutboundRequest, RequestId, TransportError,
    WorldRange,
};

use crate::{
    Backdrop, ComputedChunk, GameConfig, GameError, Generation, LifeLike, Pipeline, Rule, Void,
    World,
};

/// Outbound half of the transport.
///
/// `send_chunk` must return without waiting for the peer. Its outcome is
/// reported later through [`Game::on_chunk_acknowledged`] with the same id.
pub trait ChunkSender {
    fn send_chunk(&mut self, request: &OutboundRequest);
}

/// What became of an inbound chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Applied,
    /// The chunk was already complete; the payload was discarded.
    Duplicate,
    /// The generation is too old to be worth storing.
    Stale,
    /// Malformed key or payload.
    Rejected,
}

/// One node of the cluster: the partition, the generation ring and the
/// outbound dispatch queue.
#[derive(Debug)]
pub struct Game<S> {
    config: GameConfig,
    range: WorldRange,
    pipeline: Pipeline,
    dispatch: DispatchQueue,
    sender: S,
    rule: Box<dyn Rule>,
    checksum: Option<String>,
}

impl<S: ChunkSender> Game<S> {
    /// A solo node with generation zero taken from `genesis`.
    pub fn new(config: GameConfig, genesis: &dyn Backdrop, sender: S) -> Result<Self, GameError> {
        Self::with_backdrop(config, genesis, Arc::new(Void), sender)
    }

    /// Like [`Game::new`], reading `backdrop` for cells beyond the world edge.
    pub fn with_backdrop(
        config: GameConfig,
        genesis: &dyn Backdrop,
        backdrop: Arc<dyn Backdrop>,
        sender: S,
    ) -> Result<Self, GameError> {
        config.validate()?;
        let rule = LifeLike::parse(&config.rule)?;
        let range = WorldRange::new(config.world(), config.chunk())?;
        let world = World::new(config.world(), config.chunk(), backdrop)?;
        let mut pipeline = Pipeline::new(config.ring_size, world, config.seed)?;
        pipeline.seed_genesis(genesis, &range);
        let dispatch = DispatchQueue::new(config.max_concurrent_requests);
        tracing::debug!(
            world = config.world_size,
            chunk = config.chunk_size,
            ring = config.ring_size,
            rule = %rule,
            "game created"
        );
        Ok(Self {
            config,
            range,
            pipeline,
            dispatch,
            sender,
            rule: Box::new(rule),
            checksum: None,
        })
    }

    /// Apply a new cluster view. Every slot of the ring re-derives its needed
    /// chunks from the new partition.
    pub fn update_peers(
        &mut self,
        index: usize,
        count: usize,
        replicas: usize,
        checksum: Option<String>,
    ) -> Result<(), GameError> {
        self.range.update_membership(index, count, replicas)?;
        self.pipeline.on_range_updated(&self.range);
        tracing::debug!(
            index,
            count,
            replicas,
            owned = self.range.contents().len(),
            checksum = checksum.as_deref().unwrap_or("-"),
            "peers updated"
        );
        self.checksum = checksum;
        Ok(())
    }

    /// [`Game::update_peers`] from a member list.
    pub fn update_members(&mut self, members: &MemberList) -> Result<(), GameError> {
        let membership = members.membership();
        self.update_peers(
            membership.index,
            membership.count,
            membership.replicas,
            members.checksum().map(str::to_owned),
        )
    }

    /// Compute at most one chunk in every generation that can make progress,
    /// push owned results to the peers, and drain the dispatch queue. Returns
    /// how many chunks were computed.
    pub fn tick(&mut self) -> usize {
        let _span =
            tracing::info_span!("tick", generation = self.pipeline.current_number()).entered();
        let mut computed = 0;
        for slot in 0..self.pipeline.len() {
            let Some(chunk) = self.pipeline.compute_chunk(slot, self.rule.as_ref(), &self.range)
            else {
                continue;
            };
            computed += 1;
            if chunk.own {
                self.broadcast(&chunk);
            }
        }
        self.send_next_chunk();
        computed
    }

    fn broadcast(&mut self, chunk: &ComputedChunk) {
        let membership = self.range.membership();
        for peer in membership.peers() {
            self.enqueue_chunk(OutboundRequest {
                id: RequestId {
                    peer,
                    generation: chunk.generation,
                    quadkey: chunk.key.clone(),
                },
                chunk: Arc::clone(&chunk.cells),
                timeout: self.config.request_timeout(),
            });
        }
    }

    /// The generation `number`, catching the ring up to it if needed. `None`
    /// once the generation has been recycled.
    pub fn get_generation(&mut self, number: u64) -> Option<&Generation> {
        let slot = self.pipeline.get(number, &self.range)?;
        Some(self.pipeline.generation(slot))
    }

    /// Admit a chunk pushed by the peer at `from`.
    pub fn receive_chunk(
        &mut self,
        generation: u64,
        key: &str,
        payload: &[u8],
        from: &str,
    ) -> ReceiveOutcome {
        let current = self.pipeline.current_number();
        if generation < current.saturating_sub(1) {
            tracing::trace!(generation, current, key, from, "stale chunk dropped");
            return ReceiveOutcome::Stale;
        }
        if generation == u64::MAX {
            tracing::warn!(generation, key, from, "chunk rejected: generation has no successor");
            return ReceiveOutcome::Rejected;
        }
        let key = match Quadkey::parse(key) {
            Ok(key) => key,
            Err(error) => {
                tracing::warn!(%error, from, "chunk rejected");
                return ReceiveOutcome::Rejected;
            }
        };
        if key.depth() != self.range.chunk_depth() {
            tracing::warn!(%key, from, "chunk rejected: key does not name a chunk");
            return ReceiveOutcome::Rejected;
        }
        let area = self.range.chunk_size().x as usize * self.range.chunk_size().y as usize;
        if payload.len() != area {
            tracing::warn!(%key, from, len = payload.len(), area, "chunk rejected: wrong payload size");
            return ReceiveOutcome::Rejected;
        }
        let Some(slot) = self.pipeline.get(generation, &self.range) else {
            tracing::trace!(generation, %key, from, "chunk for a recycled generation dropped");
            return ReceiveOutcome::Stale;
        };
        self.pipeline
            .receive_chunk(slot, &key, payload, from, &self.range)
    }

    /// Admit a wire push and build its reply.
    pub fn receive_push(&mut self, push: &ChunkPush, from: &str) -> ChunkAck {
        let outcome = self.receive_chunk(push.generation, &push.quadkey, &push.chunk, from);
        ChunkAck {
            ok: outcome != ReceiveOutcome::Rejected,
        }
    }

    /// Queue a push and try to send it.
    pub fn enqueue_chunk(&mut self, request: OutboundRequest) -> bool {
        let admitted = self.dispatch.enqueue(request);
        self.send_next_chunk();
        admitted
    }

    /// Hand queued pushes to the sender while under the in-flight cap.
    pub fn send_next_chunk(&mut self) {
        let current = self.pipeline.current_number();
        while let Some(request) = self.dispatch.next_ready(current) {
            tracing::trace!(id = %request.id, "sending chunk");
            self.sender.send_chunk(&request);
        }
    }

    /// Settle a push reported by the transport, then keep draining. A reply
    /// with `ok == false` counts as a rejection by the peer.
    pub fn on_chunk_acknowledged(
        &mut self,
        id: &RequestId,
        result: Result<ChunkAck, TransportError>,
    ) {
        let result = result.and_then(|ack| {
            if ack.ok {
                Ok(())
            } else {
                Err(TransportError::Rejected { peer: id.peer })
            }
        });
        self.dispatch.acknowledge(id, result);
        self.send_next_chunk();
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn range(&self) -> &WorldRange {
        &self.range
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn dispatch(&self) -> &DispatchQueue {
        &self.dispatch
    }

    pub fn current_generation(&self) -> &Generation {
        self.pipeline.current_generation()
    }

    pub fn rule(&self) -> &dyn Rule {
        self.rule.as_ref()
    }

    /// Checksum of the member list behind the last peer update.
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }
}
