use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardlife_common::{Point, validate_geometry};

use crate::{GameError, LifeLike};

/// Node configuration. Every member of a cluster must agree on the geometry,
/// ring size and rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Side of the square world, in cells.
    pub world_size: i32,
    /// Side of each square chunk, in cells.
    pub chunk_size: i32,
    /// Number of generations kept in flight.
    pub ring_size: usize,
    /// Cap on unacknowledged outbound chunk pushes.
    pub max_concurrent_requests: usize,
    /// Members that should own each chunk.
    pub replicas: usize,
    /// Timeout handed to the transport with each push.
    pub request_timeout_ms: u64,
    /// Seed for the chunk selection order.
    pub seed: u64,
    /// Life-like rulestring.
    pub rule: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world_size: 512,
            chunk_size: 32,
            ring_size: 4,
            max_concurrent_requests: 10,
            replicas: 1,
            request_timeout_ms: 1000,
            seed: 0,
            rule: "B3/S23".into(),
        }
    }
}

impl GameConfig {
    /// Reject configurations the partition and pipeline cannot run.
    pub fn validate(&self) -> Result<(), GameError> {
        validate_geometry(self.world(), self.chunk())?;
        if self.ring_size < 2 {
            return Err(GameError::RingTooSmall(self.ring_size));
        }
        if self.max_concurrent_requests == 0 {
            return Err(GameError::NoConcurrency);
        }
        LifeLike::parse(&self.rule)?;
        Ok(())
    }

    pub fn world(&self) -> Point {
        Point::splat(self.world_size)
    }

    pub fn chunk(&self) -> Point {
        Point::splat(self.chunk_size)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
