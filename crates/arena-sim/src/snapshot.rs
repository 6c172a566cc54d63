//! `SnapshotEncoder` -- §4.8.
//!
//! A pure, side-effect-free read of [`EntityRegistry`], [`RuleEngine`], and
//! [`EventScheduler`] into a plain wire-shaped structure. Delivery to
//! sessions is the host transport's job; this module never performs I/O.

use arena_ecs::entity::{EntityId, PlayerId};
use serde::{Deserialize, Serialize};

use crate::config::MatchConfig;
use crate::entities::{BeamDamageKind, EntityRegistry, EventKind, EventPhase, FieldEffectKind, OrdinanceKind, Vec2};
use crate::events::EventScheduler;
use crate::rules::{RoundPhase, RuleEngine};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub team: u32,
    pub name: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f64,
    pub health: f64,
    pub max_health: f64,
    pub ammo: u32,
    pub reloading: bool,
    pub ordinance: OrdinanceKind,
    pub respawn_time: Option<f64>,
    pub kills: u32,
    pub deaths: u32,
    pub active: bool,
    pub eliminated: bool,
    pub placement: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub owner: PlayerId,
    pub ordinance: OrdinanceKind,
    pub bullet_effects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamSnapshot {
    pub id: EntityId,
    pub start: Vec2,
    pub effective_end: Vec2,
    pub owner: PlayerId,
    pub damage_kind: BeamDamageKind,
    pub pierce: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEffectSnapshot {
    pub id: EntityId,
    pub kind: FieldEffectKind,
    pub position: Vec2,
    pub radius: f64,
    pub time_remaining: f64,
    /// Fraction of the effect's lifetime elapsed, in `[0, 1]`.
    pub progress: f64,
    pub owner_team: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveEventSnapshot {
    pub kind: EventKind,
    pub phase: EventPhase,
    pub time_remaining: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub match_time: f64,
    pub players: Vec<PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub beams: Vec<BeamSnapshot>,
    pub field_effects: Vec<FieldEffectSnapshot>,
    pub active_event: Option<ActiveEventSnapshot>,
    pub team_scores: Vec<(u32, f64)>,
    pub round_phase: RoundPhase2,
    pub round_number: u32,
}

/// `RoundPhase` re-exported under a serializable name; `rules::RoundPhase`
/// itself stays `Copy`/`Eq`-only since it is compared far more often than it
/// is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase2 {
    Playing,
    RoundEnd,
    RestPeriod,
}

impl From<RoundPhase> for RoundPhase2 {
    fn from(p: RoundPhase) -> Self {
        match p {
            RoundPhase::Playing => RoundPhase2::Playing,
            RoundPhase::RoundEnd => RoundPhase2::RoundEnd,
            RoundPhase::RestPeriod => RoundPhase2::RestPeriod,
        }
    }
}

/// Sent once on join: everything a client needs before its first `Snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialState {
    pub assigned_player: PlayerId,
    pub world_width: f64,
    pub world_height: f64,
    pub team_count: u32,
    pub obstacles: Vec<crate::entities::Obstacle>,
}

pub struct SnapshotEncoder;

impl SnapshotEncoder {
    pub fn initial_state(registry: &EntityRegistry, config: &MatchConfig, assigned_player: PlayerId) -> InitialState {
        InitialState {
            assigned_player,
            world_width: config.world_width,
            world_height: config.world_height,
            team_count: config.team_count,
            obstacles: registry.obstacles().cloned().collect(),
        }
    }

    pub fn encode(
        registry: &EntityRegistry,
        rules: &RuleEngine,
        scheduler: &EventScheduler,
        config: &MatchConfig,
        now: f64,
    ) -> Snapshot {
        let players = registry
            .players()
            .map(|p| PlayerSnapshot {
                id: p.id,
                team: p.team,
                name: p.name.clone(),
                position: p.position,
                velocity: p.velocity,
                rotation: p.rotation,
                health: p.health,
                max_health: p.max_health,
                ammo: p.ammo,
                reloading: p.reloading,
                ordinance: p.weapon.ordinance,
                respawn_time: p.respawn_deadline,
                kills: p.kills,
                deaths: p.deaths,
                active: p.active,
                eliminated: p.eliminated,
                placement: p.placement,
            })
            .collect();

        let projectiles = registry
            .projectiles()
            .map(|p| ProjectileSnapshot {
                id: p.id,
                position: p.position,
                velocity: p.velocity,
                owner: p.owner,
                ordinance: p.ordinance,
                bullet_effects: p.bullet_effects.clone(),
            })
            .collect();

        let beams = registry
            .beams()
            .map(|b| BeamSnapshot {
                id: b.id,
                start: b.start,
                effective_end: b.effective_end,
                owner: b.owner,
                damage_kind: b.damage_kind.clone(),
                pierce: b.pierce,
            })
            .collect();

        let field_effects = registry
            .field_effects_in_creation_order()
            .map(|f| FieldEffectSnapshot {
                id: f.id,
                kind: f.kind,
                position: f.center,
                radius: f.radius,
                time_remaining: f.time_remaining,
                progress: if f.duration > 0.0 {
                    (1.0 - f.time_remaining / f.duration).clamp(0.0, 1.0)
                } else {
                    1.0
                },
                owner_team: f.owner_team,
            })
            .collect();

        let active_event = scheduler.active_kind().map(|kind| {
            let phase = scheduler.active_phase().unwrap_or(EventPhase::Warning);
            let time_remaining = scheduler.active_time_remaining(now).unwrap_or(0.0);
            ActiveEventSnapshot { kind, phase, time_remaining }
        });

        Snapshot {
            match_time: now,
            players,
            projectiles,
            beams,
            field_effects,
            active_event,
            team_scores: rules.scores(registry, config),
            round_phase: rules.phase.into(),
            round_number: rules.round_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Player;

    #[test]
    fn encode_reflects_live_player_state() {
        let config = MatchConfig::default();
        let mut registry = EntityRegistry::new();
        let pid = registry.next_player_id();
        let mut player = Player::new(pid, 0, 100.0, 3);
        player.health = 42.0;
        registry.add_player(player);

        let rules = RuleEngine::new(&config);
        let scheduler = EventScheduler::new(&config, 0.0);
        let snapshot = SnapshotEncoder::encode(&registry, &rules, &scheduler, &config, 1.0);

        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].health, 42.0);
        assert_eq!(snapshot.match_time, 1.0);
    }

    #[test]
    fn encode_has_no_active_event_by_default() {
        let config = MatchConfig::default();
        let registry = EntityRegistry::new();
        let rules = RuleEngine::new(&config);
        let scheduler = EventScheduler::new(&config, 0.0);
        let snapshot = SnapshotEncoder::encode(&registry, &rules, &scheduler, &config, 0.0);
        assert!(snapshot.active_event.is_none());
    }
}
