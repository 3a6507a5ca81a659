//! Streaming: world partition, cluster membership, outbound chunk dispatch.
//!
//! # Invariants
//! - Ownership and neighbour sets are pure functions of membership, so every
//!   node with the same member list agrees on who owns what.
//! - In-flight outbound requests never exceed the configured maximum.

mod dispatch;
mod error;
mod membership;
mod range;
mod wire;

pub use dispatch::{DispatchQueue, DispatchStats, OutboundRequest, RequestId};
pub use error::{MembershipError, TransportError, WireError};
pub use membership::{MemberList, Membership};
pub use range::WorldRange;
pub use wire::{ChunkAck, ChunkPush};
