use shardlife_common::GeometryError;
use shardlife_stream::MembershipError;

/// A rulestring that is not of the form `B<digits>/S<digits>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("malformed rule {0:?}, expected B<digits>/S<digits>")]
    Malformed(String),
    #[error("neighbour count {0:?} out of range 0-8")]
    InvalidCount(char),
}

/// Errors raised while building or reconfiguring a [`crate::Game`].
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
    #[error("invalid rule: {0}")]
    Rule(#[from] RuleError),
    #[error("invalid membership: {0}")]
    Membership(#[from] MembershipError),
    #[error("ring needs at least 2 generations, got {0}")]
    RingTooSmall(usize),
    #[error("max_concurrent_requests must be at least 1")]
    NoConcurrency,
}
