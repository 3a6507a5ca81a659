/// A membership view that cannot be partitioned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MembershipError {
    #[error("cluster has no members")]
    Empty,
    #[error("member index {index} out of range for {count} members")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("replica factor must be at least one")]
    NoReplicas,
}

/// Failure to encode or decode a chunk message.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
}

/// Why an outbound chunk push was not acknowledged.
///
/// Advisory only: the dispatcher records the latest one and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request to peer {peer} timed out after {timeout_ms}ms")]
    Timeout { peer: usize, timeout_ms: u64 },
    #[error("peer {peer} is unreachable")]
    Unreachable { peer: usize },
    #[error("peer {peer} rejected the chunk")]
    Rejected { peer: usize },
    #[error("transport failure: {0}")]
    Other(String),
}
