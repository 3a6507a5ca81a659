//! An in-process cluster: several [`Game`]s exchanging chunk pushes through
//! outboxes, with every message passed through its CBOR wire encoding.

use std::collections::{BTreeSet, VecDeque};

use shardlife_stream::{
    ChunkAck, ChunkPush, MemberList, MembershipError, OutboundRequest, TransportError, WireError,
};

use crate::{Backdrop, ChunkSender, Game, GameConfig, GameError};

/// Pushes waiting to be delivered by the cluster.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: VecDeque<OutboundRequest>,
}

impl Outbox {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl ChunkSender for Outbox {
    fn send_chunk(&mut self, request: &OutboundRequest) {
        self.pending.push_back(request.clone());
    }
}

/// Totals for one [`LocalCluster::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub computed: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct LocalCluster {
    config: GameConfig,
    nodes: Vec<Game<Outbox>>,
    /// Each node's own member list, in the same order as `nodes`.
    views: Vec<MemberList>,
    unreachable: BTreeSet<usize>,
    steps: u64,
}

impl LocalCluster {
    /// `count` nodes named `node-00`, `node-01`, ... sharing `config` and the
    /// same generation zero.
    pub fn new(config: &GameConfig, count: usize, genesis: &dyn Backdrop) -> Result<Self, GameError> {
        if count == 0 {
            return Err(MembershipError::Empty.into());
        }
        let width = count.to_string().len().max(2);
        let addresses: Vec<String> = (0..count).map(|i| format!("node-{i:0width$}")).collect();
        let all: Vec<&str> = addresses.iter().map(String::as_str).collect();
        let mut nodes = Vec::with_capacity(count);
        let mut views = Vec::with_capacity(count);
        for address in &all {
            let mut view = MemberList::new(*address, config.replicas);
            view.add_remove(&all, &[]);
            let mut game = Game::new(config.clone(), genesis, Outbox::default())?;
            game.update_members(&view)?;
            nodes.push(game);
            views.push(view);
        }
        tracing::info!(
            nodes = count,
            checksum = views[0].checksum().unwrap_or("-"),
            "cluster up"
        );
        Ok(Self {
            config: config.clone(),
            nodes,
            views,
            unreachable: BTreeSet::new(),
            steps: 0,
        })
    }

    /// Add a node at `address` starting from `genesis`, and tell every other
    /// node. Returns false if the address is already a member.
    ///
    /// The newcomer has no history, so it only keeps up when it joins before
    /// the others move past generation one.
    pub fn join(&mut self, address: &str, genesis: &dyn Backdrop) -> Result<bool, GameError> {
        if self.members().contains(address) {
            return Ok(false);
        }
        let mut view = MemberList::new(address, self.config.replicas);
        let existing: Vec<&str> = self.members().addresses().iter().map(String::as_str).collect();
        view.add_remove(&existing, &[]);
        let mut game = Game::new(self.config.clone(), genesis, Outbox::default())?;
        game.update_members(&view)?;
        let at = view.membership().index;
        self.nodes.insert(at, game);
        self.views.insert(at, view);
        self.unreachable = self
            .unreachable
            .iter()
            .map(|&node| if node >= at { node + 1 } else { node })
            .collect();
        self.broadcast_membership(&[address], &[])?;
        tracing::info!(address, index = at, nodes = self.nodes.len(), "node joined");
        Ok(true)
    }

    /// Drop the node at `address` and tell every remaining node, whatever
    /// generations it has in flight. Returns false for an unknown address.
    pub fn leave(&mut self, address: &str) -> Result<bool, GameError> {
        let Some(at) = self.members().addresses().iter().position(|a| a == address) else {
            return Ok(false);
        };
        if self.nodes.len() == 1 {
            return Err(MembershipError::Empty.into());
        }
        self.nodes.remove(at);
        self.views.remove(at);
        self.unreachable = self
            .unreachable
            .iter()
            .filter(|&&node| node != at)
            .map(|&node| if node > at { node - 1 } else { node })
            .collect();
        self.broadcast_membership(&[], &[address])?;
        tracing::info!(address, nodes = self.nodes.len(), "node left");
        Ok(true)
    }

    fn broadcast_membership(&mut self, plus: &[&str], minus: &[&str]) -> Result<(), GameError> {
        for (node, view) in self.nodes.iter_mut().zip(&mut self.views) {
            if view.add_remove(plus, minus) {
                node.update_members(view)?;
            }
        }
        Ok(())
    }

    /// Make pushes to `node` fail as unreachable until called with `false`.
    pub fn set_unreachable(&mut self, node: usize, unreachable: bool) {
        if unreachable {
            self.unreachable.insert(node);
        } else {
            self.unreachable.remove(&node);
        }
    }

    /// Tick every node once, then deliver pushes until every outbox is empty.
    pub fn step(&mut self) -> StepReport {
        let mut report = StepReport::default();
        for node in &mut self.nodes {
            report.computed += node.tick();
        }
        for from in 0..self.nodes.len() {
            while let Some(request) = self.nodes[from].sender_mut().pending.pop_front() {
                let result = self.deliver(from, &request);
                match &result {
                    Ok(_) => report.delivered += 1,
                    Err(_) => report.failed += 1,
                }
                self.nodes[from].on_chunk_acknowledged(&request.id, result);
            }
        }
        self.steps += 1;
        report
    }

    fn deliver(
        &mut self,
        from: usize,
        request: &OutboundRequest,
    ) -> Result<ChunkAck, TransportError> {
        let to = request.peer();
        if self.unreachable.contains(&to) || to >= self.nodes.len() {
            return Err(TransportError::Unreachable { peer: to });
        }
        let wire = |e: WireError| TransportError::Other(e.to_string());
        let bytes = request.to_push().encode().map_err(wire)?;
        let push = ChunkPush::decode(&bytes).map_err(wire)?;
        let sender = self.members().address(from).unwrap_or_default().to_owned();
        let ack = self.nodes[to].receive_push(&push, &sender);
        ChunkAck::decode(&ack.encode().map_err(wire)?).map_err(wire)
    }

    /// Step until every node has completed `generation`, or `max_steps` have
    /// run. Returns whether the target was reached.
    pub fn run_until(&mut self, generation: u64, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            if self.all_complete(generation) {
                return true;
            }
            self.step();
        }
        self.all_complete(generation)
    }

    fn all_complete(&self, generation: u64) -> bool {
        self.nodes.iter().all(|node| {
            node.pipeline()
                .latest_complete()
                .and_then(|g| g.number())
                .is_some_and(|n| n >= generation)
        })
    }

    /// The state hash of `generation` if every node holds it complete and
    /// they all agree.
    pub fn agreed_hash(&self, generation: u64) -> Option<u64> {
        let mut hashes = self.nodes.iter().map(|node| {
            node.pipeline()
                .find(generation)
                .filter(|g| g.is_complete())
                .map(|g| g.world().state_hash(node.range().all_keys()))
        });
        let first = hashes.next()??;
        hashes.all(|h| h == Some(first)).then_some(first)
    }

    pub fn nodes(&self) -> &[Game<Outbox>] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Game<Outbox> {
        &self.nodes[index]
    }

    /// The member list as seen by the first node.
    pub fn members(&self) -> &MemberList {
        &self.views[0]
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Soup, Void};

    fn config() -> GameConfig {
        GameConfig {
            world_size: 16,
            chunk_size: 4,
            ..GameConfig::default()
        }
    }

    #[test]
    fn nodes_share_one_member_list() {
        let cluster = LocalCluster::new(&config(), 3, &Void).unwrap();
        let checksum = cluster.members().checksum();
        for (i, node) in cluster.nodes().iter().enumerate() {
            assert_eq!(node.range().membership().index, i);
            assert_eq!(node.range().membership().count, 3);
            assert_eq!(node.checksum(), checksum);
        }
    }

    #[test]
    fn owners_split_the_work() {
        let mut cluster = LocalCluster::new(&config(), 2, &Soup::new(5, 0.4)).unwrap();
        let report = cluster.step();
        assert_eq!(report.computed, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);
        assert!(cluster.run_until(1, 16));
        let received = cluster
            .node(0)
            .pipeline()
            .find(1)
            .unwrap()
            .collaborators()
            .clone();
        assert!(received.contains("node-01"));
    }

    #[test]
    fn join_and_leave_reach_every_node() {
        let mut cluster = LocalCluster::new(&config(), 2, &Void).unwrap();
        assert!(cluster.join("node-02", &Void).unwrap());
        assert!(!cluster.join("node-02", &Void).unwrap());
        let checksum = cluster.members().checksum().map(str::to_owned);
        for (i, node) in cluster.nodes().iter().enumerate() {
            assert_eq!(node.range().membership().index, i);
            assert_eq!(node.range().membership().count, 3);
            assert_eq!(node.checksum(), checksum.as_deref());
        }

        assert!(cluster.leave("node-00").unwrap());
        assert!(!cluster.leave("node-00").unwrap());
        assert_eq!(cluster.members().addresses(), ["node-01", "node-02"]);
        for (i, node) in cluster.nodes().iter().enumerate() {
            assert_eq!(node.range().membership().index, i);
            assert_eq!(node.range().membership().count, 2);
        }
        assert!(cluster.run_until(2, 200));
    }

    #[test]
    fn last_node_cannot_leave() {
        let mut cluster = LocalCluster::new(&config(), 1, &Void).unwrap();
        assert!(matches!(
            cluster.leave("node-00"),
            Err(GameError::Membership(MembershipError::Empty))
        ));
        assert_eq!(cluster.nodes().len(), 1);
    }

    #[test]
    fn unreachable_peer_is_advisory() {
        let mut cluster = LocalCluster::new(&config(), 2, &Void).unwrap();
        cluster.set_unreachable(1, true);
        let report = cluster.step();
        assert_eq!(report.failed, 1);
        assert_eq!(
            cluster.node(0).dispatch().last_error(),
            Some(&TransportError::Unreachable { peer: 1 })
        );
        // Node 1 falls back to computing everything itself.
        assert!(cluster.run_until(2, 200));
    }
}
