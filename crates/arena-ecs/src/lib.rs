//! Arena ECS -- match-scoped identity minting and deferred mutation queues.
//!
//! This crate is deliberately small: the simulation's entities are a fixed
//! set of concrete kinds (player, projectile, beam, field effect, obstacle,
//! active event), not an arbitrary runtime-composed component set, so there
//! is no archetype storage or query language here. What every subsystem in
//! `arena-sim` does need is a collision-free way to name an entity
//! ([`entity::EntityId`], [`entity::PlayerId`]) and a place to stash
//! mutations produced mid-pass until the pass is safe to apply them
//! ([`poststep::PostStepQueue`]).
//!
//! # Quick Start
//!
//! ```
//! use arena_ecs::prelude::*;
//!
//! let mut ids = EntityIdGenerator::new();
//! let projectile = ids.next_id();
//!
//! let mut queue = PostStepQueue::new();
//! queue.push(PostStepAction::DespawnEntity(projectile));
//! assert_eq!(queue.drain().len(), 1);
//! ```

pub mod entity;
pub mod poststep;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS-level operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity id does not refer to any currently registered entity.
    #[error("entity {entity:?} is not registered")]
    UnknownEntity { entity: entity::EntityId },

    /// The player id does not refer to any player in this match.
    #[error("player {player:?} is not part of this match")]
    UnknownPlayer { player: entity::PlayerId },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{EntityId, EntityIdGenerator, PlayerId, PlayerIdGenerator};
    pub use crate::poststep::{PostStepAction, PostStepQueue};
    pub use crate::EcsError;
}
