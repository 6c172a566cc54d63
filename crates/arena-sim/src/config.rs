//! Match configuration: immutable for a match's lifetime, normalized once at
//! construction.

use serde::{Deserialize, Serialize};

/// How a dead player's respawn deadline is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RespawnMode {
    Instant,
    Wave,
    NextRound,
    Elimination,
    Limited,
}

/// How a match is declared won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VictoryCondition {
    ScoreLimit,
    TimeLimit,
    Elimination,
    Objective,
    Endless,
}

/// How team score is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreStyle {
    TotalKills,
    Objective,
    Total,
}

/// Terrain generation density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleDensity {
    Sparse,
    Dense,
    Choked,
    Random,
}

/// Immutable match configuration, normalized once via [`MatchConfig::normalized`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    pub max_players: u32,
    pub team_count: u32,
    pub world_width: f64,
    pub world_height: f64,

    pub player_max_health: f64,
    pub player_speed: f64,
    pub player_size: f64,

    pub respawn_mode: RespawnMode,
    pub respawn_delay: f64,
    pub wave_respawn_interval: f64,
    pub round_duration: f64,
    pub rest_duration: f64,

    pub victory_condition: VictoryCondition,
    pub score_limit: f64,
    pub time_limit: f64,
    pub sudden_death: bool,
    pub max_lives: u32,

    pub score_style: ScoreStyle,

    pub enable_random_events: bool,
    pub random_event_interval: f64,
    pub random_event_interval_variance: f64,
    pub event_warning_duration: f64,
    /// Delay spread for staggered sub-impacts within an event's impact
    /// phase, and the cooldown held after the last sub-impact fires before
    /// the event is considered over. §4.7 leaves both as one "stagger
    /// window" / "cooldown window" knob; this crate uses the same value for
    /// both (see DESIGN.md).
    pub event_impact_stagger: f64,
    /// Kinds eligible for random selection; `None` means all kinds.
    pub enabled_event_kinds: Option<Vec<crate::entities::EventKind>>,

    pub meteor_radius: f64,
    pub meteor_damage: f64,
    pub eruption_radius: f64,
    pub eruption_damage: f64,
    pub earthquake_damage: f64,
    pub ion_storm_damage: f64,

    pub obstacle_density: ObstacleDensity,

    pub has_oddball: bool,
    pub has_vip: bool,
    pub has_random_weapons: bool,
    pub random_weapon_interval: f64,

    pub ai_check_interval_ms: u64,
    pub lock_game_after_seconds: Option<f64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_players: 16,
            team_count: 0,
            world_width: 2000.0,
            world_height: 2000.0,
            player_max_health: 100.0,
            player_speed: 200.0,
            player_size: 16.0,
            respawn_mode: RespawnMode::Instant,
            respawn_delay: 3.0,
            wave_respawn_interval: 5.0,
            round_duration: 300.0,
            rest_duration: 10.0,
            victory_condition: VictoryCondition::ScoreLimit,
            score_limit: 25.0,
            time_limit: 600.0,
            sudden_death: false,
            max_lives: 3,
            score_style: ScoreStyle::TotalKills,
            enable_random_events: false,
            random_event_interval: 90.0,
            random_event_interval_variance: 0.3,
            event_warning_duration: 2.0,
            event_impact_stagger: 1.0,
            enabled_event_kinds: None,
            meteor_radius: 60.0,
            meteor_damage: 40.0,
            eruption_radius: 80.0,
            eruption_damage: 25.0,
            earthquake_damage: 30.0,
            ion_storm_damage: 15.0,
            obstacle_density: ObstacleDensity::Sparse,
            has_oddball: false,
            has_vip: false,
            has_random_weapons: false,
            random_weapon_interval: 45.0,
            ai_check_interval_ms: 2000,
            lock_game_after_seconds: None,
        }
    }
}

impl MatchConfig {
    /// Apply the normalization rules of the external-interface contract:
    /// team count clamped to `[0,4]`, `1` becomes `2`; negative durations and
    /// limits fall back to their defaults' magnitude.
    pub fn normalized(mut raw: MatchConfig) -> MatchConfig {
        if raw.team_count == 1 {
            tracing::warn!(original = 1, normalized = 2, "team_count=1 is invalid, normalizing to 2");
            raw.team_count = 2;
        }
        if raw.team_count > 4 {
            tracing::warn!(original = raw.team_count, normalized = 4, "team_count clamped to 4");
            raw.team_count = 4;
        }

        if raw.respawn_delay < 0.0 {
            tracing::warn!(original = raw.respawn_delay, "negative respawn_delay, clamping to 0");
            raw.respawn_delay = 0.0;
        }
        if raw.wave_respawn_interval <= 0.0 {
            raw.wave_respawn_interval = Self::default().wave_respawn_interval;
        }
        if raw.round_duration <= 0.0 {
            raw.round_duration = Self::default().round_duration;
        }
        if raw.rest_duration < 0.0 {
            raw.rest_duration = 0.0;
        }
        if raw.score_limit <= 0.0 {
            raw.score_limit = Self::default().score_limit;
        }
        if raw.time_limit <= 0.0 {
            raw.time_limit = Self::default().time_limit;
        }
        if raw.max_lives == 0 {
            raw.max_lives = 1;
        }
        if raw.world_width <= 0.0 {
            raw.world_width = Self::default().world_width;
        }
        if raw.world_height <= 0.0 {
            raw.world_height = Self::default().world_height;
        }
        if raw.random_event_interval < 30.0 {
            raw.random_event_interval = 30.0;
        }

        raw
    }

    /// Whether the match is FFA (no teams).
    pub fn is_ffa(&self) -> bool {
        self.team_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_count_one_normalizes_to_two() {
        let mut raw = MatchConfig::default();
        raw.team_count = 1;
        let cfg = MatchConfig::normalized(raw);
        assert_eq!(cfg.team_count, 2);
    }

    #[test]
    fn team_count_clamped_to_four() {
        let mut raw = MatchConfig::default();
        raw.team_count = 9;
        let cfg = MatchConfig::normalized(raw);
        assert_eq!(cfg.team_count, 4);
    }

    #[test]
    fn negative_respawn_delay_clamped_to_zero() {
        let mut raw = MatchConfig::default();
        raw.respawn_delay = -5.0;
        let cfg = MatchConfig::normalized(raw);
        assert_eq!(cfg.respawn_delay, 0.0);
    }

    #[test]
    fn event_interval_floor_is_thirty_seconds() {
        let mut raw = MatchConfig::default();
        raw.random_event_interval = 1.0;
        let cfg = MatchConfig::normalized(raw);
        assert_eq!(cfg.random_event_interval, 30.0);
    }
}
