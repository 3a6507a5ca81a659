//! World kernel: chunk storage per generation, the pipeline of in-flight
//! generations, and the orchestrator tying them to the partition.
//!
//! # Invariants
//! - A generation computes chunks only while its immediate predecessor is
//!   complete.
//! - A chunk is completed at most once per generation; the first writer wins.
//! - All state is mutated from one thread of control; the transport reports
//!   acknowledgements back through [`Game::on_chunk_acknowledged`].

pub mod backdrop;
pub mod chunk;
pub mod cluster;
pub mod config;
pub mod error;
pub mod game;
pub mod generation;
pub mod pipeline;
pub mod rule;
pub mod world;

pub use backdrop::{Backdrop, Soup, Void};
pub use chunk::Chunk;
pub use cluster::{LocalCluster, Outbox, StepReport};
pub use config::GameConfig;
pub use error::{GameError, RuleError};
pub use game::{ChunkSender, Game, ReceiveOutcome};
pub use generation::{Generation, Means};
pub use pipeline::{ComputedChunk, Pipeline};
pub use rule::{LifeLike, Rule};
pub use world::World;
