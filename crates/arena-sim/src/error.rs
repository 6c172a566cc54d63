//! Errors surfaced to the host process.
//!
//! Per-tick recoverable failures are logged and swallowed inside the
//! subsystem that hit them (see `tick` module docs); only invariant
//! breakage that makes the match unsafe to continue, or a host-facing
//! helper that can fail outright, returns a `Result`.

use arena_ecs::entity::{EntityId, PlayerId};

/// Errors that can terminate a match or be returned from host-facing helpers.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A lookup into the entity registry failed where the caller expected
    /// the entity to exist -- surfaced only during construction/testing;
    /// during a live tick this would instead be logged and skipped.
    #[error("entity {0:?} not found in registry")]
    UnknownEntity(EntityId),

    /// A lookup into the player table failed where the caller expected the
    /// player to exist.
    #[error("player {0:?} not found in this match")]
    UnknownPlayer(PlayerId),

    /// The physics world reported a state the registry cannot reconcile
    /// (e.g. a body handle with no corresponding entity).
    #[error("physics/registry desync: {0}")]
    RegistryDesync(String),

    /// Match configuration could not be normalized into a usable state.
    #[error("invalid match configuration: {0}")]
    InvalidConfig(String),
}
