//! Transport-neutral message contracts -- §6.
//!
//! These are the shapes a host transport serializes onto the wire; this
//! crate never performs I/O, framing, or encoding. `PlayerInput` lives in
//! [`crate::input`] next to the buffer that consumes it; everything else
//! client/server-facing lives here.

use arena_ecs::entity::PlayerId;
use serde::{Deserialize, Serialize};

use crate::entities::{EventKind, OrdinanceKind, UtilityCategory};

/// A client's request to change their loadout or display name, applied
/// immediately to the matching player. Any field left `None` is unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfigRequest {
    pub player_name: Option<String>,
    pub primary_weapon_config: Option<WeaponChoice>,
    pub utility_weapon: Option<UtilityCategory>,
}

/// A named weapon choice a client can request; the host resolves the name
/// against its own weapon table and substitutes a default with a warning on
/// an unrecognized value (§7 "invalid client input").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponChoice {
    pub ordinance: OrdinanceKind,
}

/// Asynchronous system messages emitted by subsystems across a tick:
/// kill notifications, round lifecycle, victory, VIP events, and hazard
/// announcements. A host transport fans these out to clients; this crate
/// only produces and queues them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    Kill { killer: Option<PlayerId>, killed: PlayerId },
    RoundStart { round: u32 },
    RoundEnd { round: u32 },
    VictoryPlayer { player: PlayerId },
    VictoryTeam { team: u32 },
    SuddenDeath { new_score_limit: f64 },
    WaveRespawn,
    VipAssigned { team: u32, player: PlayerId },
    VipKilled { killer_team: u32, vip: PlayerId },
    WeaponRotation,
    EventAnnounced { kind: EventKind },
    EventImpact { kind: EventKind },
    System(String),
}
