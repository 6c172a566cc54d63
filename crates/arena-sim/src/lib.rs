//! Arena Sim -- authoritative real-time arena combat simulation core.
//!
//! This crate is the per-match simulation driven by a host transport: it owns
//! every mutable piece of match state (entities, physics, rules, effects,
//! hazard scheduling) behind [`matchcore::MatchCore`] and exposes nothing but
//! a tick, an input/config surface, and a pure snapshot encoder. It builds on
//! [`arena_ecs`] for entity/player identity minting and the post-step
//! deferred-mutation queue that keeps collision and hazard callbacks from
//! mutating state mid-pass.
//!
//! # Quick Start
//!
//! ```
//! use arena_sim::prelude::*;
//!
//! let mut core = MatchCore::new(MatchConfig::default());
//! let player = core.join_player(0).unwrap();
//! core.tick(1.0 / 60.0);
//! let snapshot = core.snapshot();
//! assert_eq!(snapshot.players.len(), 1);
//! let _ = player;
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod effects;
pub mod entities;
pub mod error;
pub mod events;
pub mod input;
pub mod matchcore;
pub mod message;
pub mod physics;
pub mod rules;
pub mod snapshot;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use arena_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common host-transport usage.
pub mod prelude {
    pub use arena_ecs::entity::{EntityId, PlayerId};

    pub use crate::config::MatchConfig;
    pub use crate::error::MatchError;
    pub use crate::input::PlayerInput;
    pub use crate::matchcore::MatchCore;
    pub use crate::message::{MatchEvent, PlayerConfigRequest};
    pub use crate::snapshot::{InitialState, Snapshot};
}
