//! `RuleEngine` -- §4.6.
//!
//! Round lifecycle, respawn-deadline assignment, victory detection with
//! sudden-death, scoring aggregation, VIP mode, and random weapon rotation.

use std::collections::HashMap;

use arena_ecs::entity::PlayerId;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::config::{MatchConfig, RespawnMode, ScoreStyle, VictoryCondition};
use crate::entities::{EntityRegistry, ModificationKind, WeaponConfig};
use crate::effects::EffectPipeline;
use crate::message::MatchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Playing,
    RoundEnd,
    RestPeriod,
}

#[derive(Debug, Clone, Default)]
struct WaveState {
    next_wave_time: f64,
}

/// Snapshot of scoring inputs that are not owned by a `Player` directly:
/// captured objective points, KOTH zone time, oddball carry time, VIP kills,
/// and flat bonus points, keyed by team (or by player id in FFA).
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    pub koth_points: HashMap<u32, f64>,
    pub oddball_points: HashMap<u32, f64>,
    pub vip_kill_points: HashMap<u32, u32>,
    pub bonus_points: HashMap<u32, f64>,
}

pub struct RuleEngine {
    pub phase: RoundPhase,
    pub round_number: u32,
    pub round_timer: f64,
    pub rest_timer: f64,
    pub game_over: bool,
    pub winning_player: Option<PlayerId>,
    pub winning_team: Option<u32>,
    pub score_limit: f64,
    pub match_start_time: f64,
    pub scoreboard: ScoreBoard,
    pub vip_by_team: HashMap<u32, PlayerId>,
    wave: WaveState,
    vip_check_timer: f64,
    weapon_rotation_timer: f64,
    events: Vec<MatchEvent>,
    /// Players whose `active` flag flipped false -> true during the most
    /// recent [`RuleEngine::advance`] call, so the match driver can
    /// materialize a fresh body and pick a spawn point for them.
    respawned_this_tick: Vec<PlayerId>,
}

impl RuleEngine {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            phase: RoundPhase::Playing,
            round_number: 0,
            round_timer: config.round_duration,
            rest_timer: 0.0,
            game_over: false,
            winning_player: None,
            winning_team: None,
            score_limit: config.score_limit,
            match_start_time: 0.0,
            scoreboard: ScoreBoard::default(),
            vip_by_team: HashMap::new(),
            wave: WaveState::default(),
            vip_check_timer: 0.0,
            weapon_rotation_timer: 0.0,
            events: Vec::new(),
            respawned_this_tick: Vec::new(),
        }
    }

    /// Drain the match events accumulated since the last drain.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Players who transitioned from inactive to active during the most
    /// recent [`Self::advance`] call.
    pub fn drain_respawned(&mut self) -> Vec<PlayerId> {
        std::mem::take(&mut self.respawned_this_tick)
    }

    /// Advance round state, respawn timers, and victory timers by `dt`.
    /// `now` is absolute simulation time.
    pub fn advance(&mut self, registry: &mut EntityRegistry, config: &MatchConfig, dt: f64, now: f64) {
        self.respawned_this_tick.clear();

        if self.game_over {
            return;
        }

        match self.phase {
            RoundPhase::Playing => {
                self.round_timer -= dt;
                if self.round_timer <= 0.0 {
                    self.enter_round_end(registry);
                }
            }
            RoundPhase::RoundEnd => {
                self.enter_rest_period(config);
            }
            RoundPhase::RestPeriod => {
                self.rest_timer -= dt;
                if self.rest_timer <= 0.0 {
                    self.start_new_round(registry, config, now);
                }
            }
        }

        self.process_respawns(registry, config, now);

        if config.has_vip && config.team_count > 0 {
            self.vip_check_timer += dt;
            if self.vip_check_timer >= 2.0 {
                self.vip_check_timer = 0.0;
                self.ensure_vips(registry, config, now);
            }
        }

        if config.has_random_weapons {
            self.weapon_rotation_timer += dt;
            if self.weapon_rotation_timer >= config.random_weapon_interval {
                self.weapon_rotation_timer = 0.0;
                self.rotate_weapons(registry);
            }
        }

        self.check_victory(registry, config, now);
    }

    // -- round lifecycle -------------------------------------------------

    fn enter_round_end(&mut self, registry: &mut EntityRegistry) {
        info!(round = self.round_number, "round ended");
        for player in registry.players() {
            let _ = player;
        }
        self.events.push(MatchEvent::RoundEnd { round: self.round_number });
        self.phase = RoundPhase::RoundEnd;
    }

    fn enter_rest_period(&mut self, config: &MatchConfig) {
        self.rest_timer = config.rest_duration;
        self.phase = RoundPhase::RestPeriod;
    }

    fn start_new_round(&mut self, registry: &mut EntityRegistry, config: &MatchConfig, now: f64) {
        self.round_number += 1;
        info!(round = self.round_number, "new round started");

        for player in registry.players_mut() {
            player.active = false;
            player.respawn_deadline = Some(now + 0.001);
            player.kills = 0;
            player.deaths = 0;
            player.eliminated = false;
            player.elimination_time = None;
            player.placement = 0;
            player.lives = config.max_lives;
            player.modifications.clear();
        }

        self.scoreboard = ScoreBoard::default();
        self.round_timer = config.round_duration;
        self.phase = RoundPhase::Playing;
        self.vip_by_team.clear();
        self.events.push(MatchEvent::RoundStart { round: self.round_number });
    }

    // -- respawn policy ----------------------------------------------------

    fn process_respawns(&mut self, registry: &mut EntityRegistry, config: &MatchConfig, now: f64) {
        let limited = matches!(config.respawn_mode, RespawnMode::Limited);
        let ids: Vec<PlayerId> = registry.player_ids().to_vec();
        for pid in ids {
            let Some(player) = registry.player_mut(pid) else { continue };
            if player.active {
                continue;
            }
            let Some(deadline) = player.respawn_deadline else { continue };
            if deadline <= 0.0 {
                continue;
            }
            if !player.has_lives_remaining(limited) {
                continue;
            }
            if now > deadline {
                player.active = true;
                player.health = player.max_health;
                player.respawn_deadline = None;
                self.respawned_this_tick.push(pid);
            }
        }
    }

    /// Assign a death's respawn deadline per the configured policy. Called
    /// by the tick driver when a player's health reaches zero.
    pub fn on_player_death(
        &mut self,
        registry: &mut EntityRegistry,
        config: &MatchConfig,
        player_id: PlayerId,
        now: f64,
    ) {
        let Some(player) = registry.player_mut(player_id) else { return };
        player.deaths += 1;
        player.active = false;

        match config.respawn_mode {
            RespawnMode::Instant => {
                player.respawn_deadline = Some(now + config.respawn_delay);
            }
            RespawnMode::Wave => {
                if self.wave.next_wave_time <= now {
                    self.wave.next_wave_time = now + config.wave_respawn_interval;
                    info!("Wave Respawn");
                    self.events.push(MatchEvent::WaveRespawn);
                }
                player.respawn_deadline = Some(self.wave.next_wave_time);
            }
            RespawnMode::NextRound | RespawnMode::Elimination => {
                // Never within the current round: `start_new_round`
                // reactivates every player directly, bypassing this deadline.
                player.respawn_deadline = Some(f64::INFINITY);
            }
            RespawnMode::Limited => {
                if player.lives > 0 {
                    player.lives -= 1;
                }
                if player.lives > 0 {
                    player.respawn_deadline = Some(now + config.respawn_delay);
                } else {
                    player.respawn_deadline = Some(0.0);
                    if !player.eliminated {
                        player.eliminated = true;
                        player.elimination_time = Some(now);
                    }
                }
            }
        }
    }

    // -- VIP mode ----------------------------------------------------------

    fn ensure_vips(&mut self, registry: &mut EntityRegistry, config: &MatchConfig, now: f64) {
        let teams: Vec<u32> = (1..=config.team_count).collect();
        for team in teams {
            let current = self.vip_by_team.get(&team).copied();
            let current_is_active = current
                .and_then(|pid| registry.player(pid))
                .map(|p| p.active)
                .unwrap_or(false);
            if current_is_active {
                continue;
            }
            let replacement = registry
                .players()
                .find(|p| p.team == team && p.active)
                .map(|p| p.id);
            if let Some(new_vip) = replacement {
                self.vip_by_team.insert(team, new_vip);
                if let Some(player) = registry.player_mut(new_vip) {
                    EffectPipeline::attach_modification(player, ModificationKind::VipStatus, f64::MAX, now);
                }
                self.events.push(MatchEvent::VipAssigned { team, player: new_vip });
            }
        }
    }

    /// Award the VIP-kill bonus when an enemy VIP is killed.
    pub fn on_vip_killed(&mut self, killer_team: u32, vip: PlayerId) {
        *self.scoreboard.vip_kill_points.entry(killer_team).or_insert(0) += 1;
        self.events.push(MatchEvent::VipKilled { killer_team, vip });
    }

    /// Whether `player` currently holds VIP status on their team.
    pub fn is_vip(&self, player: PlayerId) -> bool {
        self.vip_by_team.values().any(|&v| v == player)
    }

    // -- weapon rotation -----------------------------------------------

    fn rotate_weapons(&mut self, registry: &mut EntityRegistry) {
        let mut rng = rand::thread_rng();
        let choices = [WeaponConfig::default()];
        for player in registry.players_mut() {
            if !player.active {
                continue;
            }
            if let Some(choice) = choices.choose(&mut rng) {
                player.weapon = choice.clone();
            }
        }
        info!("random weapon rotation");
        self.events.push(MatchEvent::WeaponRotation);
    }

    // -- scoring -------------------------------------------------------

    /// Team score (or player score in FFA, keyed by team=0 convention is
    /// not used; FFA callers pass a synthetic per-player "team" bucket via
    /// `team_key`).
    pub fn team_score(&self, registry: &EntityRegistry, config: &MatchConfig, team: u32) -> f64 {
        let kills: f64 = registry.players().filter(|p| p.team == team).map(|p| p.kills as f64).sum();
        let captures: f64 =
            registry.players().filter(|p| p.team == team).map(|p| p.captures as f64).sum();
        let koth = self.scoreboard.koth_points.get(&team).copied().unwrap_or(0.0).round();
        let oddball = self.scoreboard.oddball_points.get(&team).copied().unwrap_or(0.0).round();
        let vip = *self.scoreboard.vip_kill_points.get(&team).unwrap_or(&0) as f64;
        let bonus = self.scoreboard.bonus_points.get(&team).copied().unwrap_or(0.0);

        let objective = captures + koth + oddball + vip;

        let base = match config.score_style {
            ScoreStyle::TotalKills => kills,
            ScoreStyle::Objective => objective,
            ScoreStyle::Total => kills + objective,
        };
        base + bonus
    }

    /// Every team's (or, in FFA, every player's) current score, for the
    /// snapshot encoder.
    pub fn scores(&self, registry: &EntityRegistry, config: &MatchConfig) -> Vec<(u32, f64)> {
        self.all_team_or_player_keys(registry, config)
            .into_iter()
            .map(|key| (key, self.score_for_key(registry, config, key)))
            .collect()
    }

    fn all_team_or_player_keys(&self, registry: &EntityRegistry, config: &MatchConfig) -> Vec<u32> {
        if config.is_ffa() {
            registry.player_ids().iter().map(|p| p.to_raw() as u32).collect()
        } else {
            (1..=config.team_count).collect()
        }
    }

    fn score_for_key(&self, registry: &EntityRegistry, config: &MatchConfig, key: u32) -> f64 {
        if config.is_ffa() {
            registry
                .player(PlayerId::from_raw(key as u64))
                .map(|p| p.kills as f64)
                .unwrap_or(0.0)
        } else {
            self.team_score(registry, config, key)
        }
    }

    // -- victory detection -------------------------------------------------

    fn check_victory(&mut self, registry: &mut EntityRegistry, config: &MatchConfig, now: f64) {
        if self.game_over {
            return;
        }

        match config.victory_condition {
            VictoryCondition::Endless => {}
            VictoryCondition::ScoreLimit | VictoryCondition::Objective => {
                let keys = self.all_team_or_player_keys(registry, config);
                for key in keys {
                    if self.score_for_key(registry, config, key) >= self.score_limit {
                        self.declare_victory(registry, config, key);
                        return;
                    }
                }
            }
            VictoryCondition::TimeLimit => {
                if now - self.match_start_time >= config.time_limit {
                    let keys = self.all_team_or_player_keys(registry, config);
                    let mut scored: Vec<(u32, f64)> =
                        keys.iter().map(|&k| (k, self.score_for_key(registry, config, k))).collect();
                    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
                    if scored.len() >= 2 && (scored[0].1 - scored[1].1).abs() < f64::EPSILON && config.sudden_death {
                        let new_limit = scored[0].1 + 1.0;
                        if new_limit != self.score_limit {
                            self.score_limit = new_limit;
                            info!(new_limit = self.score_limit, "sudden death: score limit raised");
                            self.events.push(MatchEvent::SuddenDeath { new_score_limit: self.score_limit });
                        }
                    } else if let Some((winner, _)) = scored.first() {
                        self.declare_victory(registry, config, *winner);
                    }
                }
            }
            VictoryCondition::Elimination => {
                if config.is_ffa() {
                    let alive: Vec<PlayerId> =
                        registry.players().filter(|p| !p.eliminated).map(|p| p.id).collect();
                    if alive.len() == 1 {
                        self.assign_elimination_placements(registry);
                        self.declare_victory_player(alive[0]);
                    }
                } else {
                    let teams_alive: Vec<u32> = (1..=config.team_count)
                        .filter(|&t| registry.players().any(|p| p.team == t && !p.eliminated))
                        .collect();
                    if teams_alive.len() == 1 {
                        self.assign_elimination_placements(registry);
                        self.declare_victory(registry, config, teams_alive[0]);
                    }
                }
            }
        }
    }

    /// Assign placements in strictly decreasing order of elimination time:
    /// the last player eliminated gets the highest placement, the survivor
    /// (never eliminated) gets placement 1.
    fn assign_elimination_placements(&self, registry: &mut EntityRegistry) {
        let mut eliminated: Vec<(PlayerId, f64)> = registry
            .players()
            .filter(|p| p.eliminated)
            .map(|p| (p.id, p.elimination_time.unwrap_or(0.0)))
            .collect();
        // Latest elimination time -> lowest placement number among the
        // eliminated (closest to the survivor).
        eliminated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let survivor_placement = 1u32;
        for (rank, (pid, _)) in eliminated.iter().enumerate() {
            if let Some(player) = registry.player_mut(*pid) {
                player.placement = survivor_placement + 1 + rank as u32;
            }
        }
        let survivor = registry.players().find(|p| !p.eliminated).map(|p| p.id);
        if let Some(survivor) = survivor {
            if let Some(player) = registry.player_mut(survivor) {
                player.placement = survivor_placement;
            }
        }
    }

    fn declare_victory(&mut self, registry: &EntityRegistry, config: &MatchConfig, key: u32) {
        self.game_over = true;
        if config.is_ffa() {
            let player = PlayerId::from_raw(key as u64);
            self.winning_player = Some(player);
            self.events.push(MatchEvent::VictoryPlayer { player });
        } else {
            self.winning_team = Some(key);
            self.events.push(MatchEvent::VictoryTeam { team: key });
        }
        info!(key, "victory declared");
        let _ = registry;
    }

    fn declare_victory_player(&mut self, player: PlayerId) {
        self.game_over = true;
        self.winning_player = Some(player);
        info!(?player, "victory declared");
        self.events.push(MatchEvent::VictoryPlayer { player });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::entities::Player;
    use proptest::prelude::*;

    fn ffa_config() -> MatchConfig {
        let mut c = MatchConfig::default();
        c.team_count = 0;
        c.victory_condition = VictoryCondition::ScoreLimit;
        c.score_limit = 1.0;
        c.score_style = ScoreStyle::TotalKills;
        c
    }

    #[test]
    fn score_limit_declares_ffa_winner() {
        let config = ffa_config();
        let mut registry = EntityRegistry::new();
        let a_id = registry.next_player_id();
        let mut a = Player::new(a_id, 0, 100.0, 3);
        a.kills = 1;
        registry.add_player(a);
        let b_id = registry.next_player_id();
        registry.add_player(Player::new(b_id, 0, 100.0, 3));

        let mut engine = RuleEngine::new(&config);
        engine.advance(&mut registry, &config, 1.0 / 60.0, 1.0);

        assert!(engine.game_over);
        assert_eq!(engine.winning_player, Some(a_id));
    }

    #[test]
    fn limited_respawn_eliminates_after_lives_exhausted() {
        let mut config = MatchConfig::default();
        config.respawn_mode = RespawnMode::Limited;
        config.max_lives = 1;

        let mut registry = EntityRegistry::new();
        let pid = registry.next_player_id();
        registry.add_player(Player::new(pid, 0, 100.0, 1));

        let mut engine = RuleEngine::new(&config);
        engine.on_player_death(&mut registry, &config, pid, 1.0);

        let player = registry.player(pid).unwrap();
        assert!(player.eliminated);
        assert_eq!(player.respawn_deadline, Some(0.0));
    }

    #[test]
    fn elimination_placements_strictly_decreasing_by_elimination_time() {
        let mut registry = EntityRegistry::new();
        let a = registry.next_player_id();
        let b = registry.next_player_id();
        let c = registry.next_player_id();
        let mut pa = Player::new(a, 0, 100.0, 1);
        let mut pb = Player::new(b, 0, 100.0, 1);
        pb.eliminated = true;
        pb.elimination_time = Some(5.0);
        let mut pc = Player::new(c, 0, 100.0, 1);
        pc.eliminated = true;
        pc.elimination_time = Some(10.0);
        pa.eliminated = false;
        registry.add_player(pa);
        registry.add_player(pb);
        registry.add_player(pc);

        let config = MatchConfig::default();
        let engine = RuleEngine::new(&config);
        engine.assign_elimination_placements(&mut registry);

        assert_eq!(registry.player(a).unwrap().placement, 1);
        assert_eq!(registry.player(c).unwrap().placement, 2);
        assert_eq!(registry.player(b).unwrap().placement, 3);
    }

    proptest! {
        /// §8 invariant 8: the set of non-zero placements is exactly
        /// `{1, ..., N}`, assigned in strictly decreasing elimination time
        /// (survivor first), regardless of how many players were eliminated
        /// or the order their elimination times were recorded in.
        #[test]
        fn elimination_placements_are_a_bijection_onto_1_n(
            elimination_times in prop::collection::vec(0.0f64..1000.0, 1..12)
        ) {
            let mut registry = EntityRegistry::new();
            let mut ids = Vec::new();
            for &time in &elimination_times {
                let pid = registry.next_player_id();
                let mut p = Player::new(pid, 0, 100.0, 1);
                p.eliminated = true;
                p.elimination_time = Some(time);
                registry.add_player(p);
                ids.push(pid);
            }
            let survivor = registry.next_player_id();
            registry.add_player(Player::new(survivor, 0, 100.0, 1));

            let config = MatchConfig::default();
            let engine = RuleEngine::new(&config);
            engine.assign_elimination_placements(&mut registry);

            let n = ids.len() as u32 + 1;
            let mut placements: Vec<u32> = registry.players().map(|p| p.placement).collect();
            placements.sort_unstable();
            prop_assert_eq!(placements, (1..=n).collect::<Vec<u32>>());
            prop_assert_eq!(registry.player(survivor).unwrap().placement, 1);
        }

        /// §8 invariant 5: `on_player_death` under `Instant` respawn mode
        /// sets a deadline within `[now, now + respawnDelay]`.
        #[test]
        fn instant_respawn_deadline_is_bounded(
            now in 0.0f64..10_000.0,
            respawn_delay in 0.0f64..60.0,
        ) {
            let mut config = MatchConfig::default();
            config.respawn_mode = RespawnMode::Instant;
            config.respawn_delay = respawn_delay;

            let mut registry = EntityRegistry::new();
            let pid = registry.next_player_id();
            registry.add_player(Player::new(pid, 0, 100.0, 3));

            let mut engine = RuleEngine::new(&config);
            engine.on_player_death(&mut registry, &config, pid, now);

            let deadline = registry.player(pid).unwrap().respawn_deadline.unwrap();
            prop_assert!(deadline >= now);
            prop_assert!(deadline <= now + respawn_delay);
        }

        /// §8 invariant 4: a team's score never decreases as kills accrue
        /// within a round (kills, the only mutated input here, are
        /// monotonic non-decreasing by construction of the match loop).
        #[test]
        fn score_is_monotonic_in_kills(
            kill_increments in prop::collection::vec(0u32..5, 1..10)
        ) {
            let mut config = MatchConfig::default();
            config.team_count = 2;
            config.score_style = ScoreStyle::TotalKills;

            let mut registry = EntityRegistry::new();
            let pid = registry.next_player_id();
            registry.add_player(Player::new(pid, 1, 100.0, 3));

            let engine = RuleEngine::new(&config);
            let mut previous = engine.team_score(&registry, &config, 1);
            for delta in kill_increments {
                if let Some(p) = registry.player_mut(pid) {
                    p.kills += delta;
                }
                let current = engine.team_score(&registry, &config, 1);
                prop_assert!(current >= previous);
                previous = current;
            }
        }
    }
}
