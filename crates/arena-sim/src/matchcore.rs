//! `MatchCore` -- the per-tick driver described in §2.
//!
//! Sequences `InputBuffer` drain, `RuleEngine::advance`, respawn
//! materialization, input application, the physics step, manual
//! projectile/beam resolution, `EffectPipeline::tick`, `EventScheduler::tick`,
//! post-step flush, and snapshot encoding, in that fixed order every tick.
//! Owns every subsystem; nothing outside this module holds `&mut` access to
//! match state.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use arena_ecs::entity::{EntityId, PlayerId};
use arena_ecs::poststep::PostStepAction;

use crate::config::{MatchConfig, ObstacleDensity};
use crate::effects::EffectPipeline;
use crate::entities::{
    BeamDamageKind, EntityRegistry, EventKind, FieldEffect, FieldEffectKind, NEUTRAL_TEAM, OrdinanceKind, Player,
    ShapeCategory, Vec2,
};
use crate::error::MatchError;
use crate::events::{EventScheduler, PendingImpact};
use crate::input::{InputBuffer, InputProcessor, PlayerInput};
use crate::message::{MatchEvent, PlayerConfigRequest};
use crate::physics::{ColliderShape, PhysicsBodyKind, PhysicsWorld};
use crate::rules::RuleEngine;
use crate::snapshot::{InitialState, Snapshot, SnapshotEncoder};

/// Obstacles are generated once at match start, per `obstacle_density`.
fn terrain_count(density: ObstacleDensity, area: f64) -> usize {
    let per_million = match density {
        ObstacleDensity::Sparse => 2.0,
        ObstacleDensity::Dense => 6.0,
        ObstacleDensity::Choked => 12.0,
        ObstacleDensity::Random => rand::thread_rng().gen_range(2.0..12.0),
    };
    ((area / 1_000_000.0) * per_million).round().clamp(2.0, 40.0) as usize
}

pub struct MatchCore {
    config: MatchConfig,
    registry: EntityRegistry,
    physics: PhysicsWorld,
    rules: RuleEngine,
    effects: EffectPipeline,
    scheduler: EventScheduler,
    input_buffer: InputBuffer,
    tick_count: u64,
    sim_time: f64,
    shutdown: bool,
    events_out: Vec<MatchEvent>,
}

impl MatchCore {
    pub fn new(raw_config: MatchConfig) -> Self {
        let config = MatchConfig::normalized(raw_config);
        let mut registry = EntityRegistry::new();
        let mut physics = PhysicsWorld::new_zero_gravity();
        let scheduler = EventScheduler::new(&config, 0.0);
        let rules = RuleEngine::new(&config);

        Self::generate_terrain(&mut registry, &mut physics, &config);

        Self {
            config,
            registry,
            physics,
            rules,
            effects: EffectPipeline::new(),
            scheduler,
            input_buffer: InputBuffer::new(),
            tick_count: 0,
            sim_time: 0.0,
            shutdown: false,
            events_out: Vec::new(),
        }
    }

    fn generate_terrain(registry: &mut EntityRegistry, physics: &mut PhysicsWorld, config: &MatchConfig) {
        let count = terrain_count(config.obstacle_density, config.world_width * config.world_height);
        let mut rng = rand::thread_rng();
        for _ in 0..count {
            let position = Vec2::new(
                rng.gen_range(0.0..config.world_width),
                rng.gen_range(0.0..config.world_height),
            );
            let radius = rng.gen_range(15.0..50.0);
            let shape = *[ShapeCategory::Box, ShapeCategory::Circle].choose(&mut rng).unwrap();
            let id = registry.next_entity_id();
            registry.add_obstacle(crate::entities::Obstacle {
                id,
                position,
                shape,
                bounding_radius: radius,
                is_static: true,
                owner: None,
                lifespan: None,
                is_teleport_pad: false,
                linked_pad: None,
            });
            let collider = match shape {
                ShapeCategory::Box => ColliderShape::Box { half_width: radius, half_height: radius },
                ShapeCategory::Circle => ColliderShape::Circle { radius },
            };
            physics.register_entity(id, position, Vec2::ZERO, PhysicsBodyKind::Static, collider, false);
        }
    }

    // -- join / leave / config --------------------------------------------

    pub fn join_player(&mut self, team: u32) -> Result<PlayerId, MatchError> {
        if self.registry.player_ids().len() as u32 >= self.config.max_players {
            return Err(MatchError::InvalidConfig("match is full".to_string()));
        }
        if let Some(lock_after) = self.config.lock_game_after_seconds {
            if self.sim_time >= lock_after {
                return Err(MatchError::InvalidConfig("match is locked to new joins".to_string()));
            }
        }

        let pid = self.registry.next_player_id();
        let mut player = Player::new(pid, team, self.config.player_max_health, self.config.max_lives);
        player.position = self.pick_spawn_point();
        let position = player.position;
        self.registry.add_player(player);

        let body_id = self.registry.next_entity_id();
        self.physics.register_entity(
            body_id,
            position,
            Vec2::ZERO,
            PhysicsBodyKind::Dynamic,
            ColliderShape::Circle { radius: self.config.player_size },
            false,
        );
        if let Some(p) = self.registry.player_mut(pid) {
            p.body = Some(body_id);
        }
        info!(?pid, team, "player joined");
        Ok(pid)
    }

    pub fn leave_player(&mut self, id: PlayerId) {
        if let Some(player) = self.registry.remove_player(id) {
            if let Some(body) = player.body {
                self.physics.unregister_entity(body);
            }
        }
        info!(?id, "player left");
    }

    pub fn apply_config_request(&mut self, player: PlayerId, request: PlayerConfigRequest) {
        let Some(p) = self.registry.player_mut(player) else {
            warn!(?player, "config request for unknown player");
            return;
        };
        if let Some(name) = request.player_name {
            p.set_name(&name);
        }
        if let Some(choice) = request.primary_weapon_config {
            p.weapon.ordinance = choice.ordinance;
        }
        if let Some(category) = request.utility_weapon {
            p.utility.category = category;
        }
    }

    pub fn submit_input(&mut self, player: PlayerId, input: PlayerInput) {
        self.input_buffer.submit(player, input);
    }

    pub fn initial_state(&self, assigned_player: PlayerId) -> InitialState {
        SnapshotEncoder::initial_state(&self.registry, &self.config, assigned_player)
    }

    pub fn snapshot(&self) -> Snapshot {
        SnapshotEncoder::encode(&self.registry, &self.rules, &self.scheduler, &self.config, self.sim_time)
    }

    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events_out)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Idempotent: cancels further ticks. Pending delayed impact tasks become
    /// no-ops since `tick` is never called again to drain them.
    pub fn shutdown(&mut self) {
        self.shutdown = true;
    }

    // -- the tick itself ----------------------------------------------------

    /// Advance the match by one tick. `wall_dt` is the wall-clock elapsed
    /// time since the previous call, capped at 100 ms. A panic inside the
    /// tick body is caught and logged; the match remains tickable on the
    /// next call.
    pub fn tick(&mut self, wall_dt: f64) {
        if self.shutdown {
            return;
        }
        let dt = wall_dt.clamp(0.0, 0.1);
        let span = tracing::span!(tracing::Level::DEBUG, "tick", tick = self.tick_count);
        let _guard = span.enter();

        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.tick_inner(dt))).is_err() {
            warn!(tick = self.tick_count, "panic during tick, continuing at next period");
        }

        self.sim_time += dt;
        self.tick_count += 1;
    }

    fn tick_inner(&mut self, dt: f64) {
        let now = self.sim_time;
        let inputs = self.input_buffer.drain();

        self.rules.advance(&mut self.registry, &self.config, dt, now);

        for pid in self.rules.drain_respawned() {
            self.spawn_player_body(pid);
        }

        InputProcessor::apply(&mut self.registry, &mut self.physics, &inputs, dt, self.config.player_speed, now);

        let _collisions = self.physics.step(dt);
        for (entity, position, velocity) in self.physics.read_results() {
            if let Some(pid) = self.registry.player_by_body(entity) {
                if let Some(player) = self.registry.player_mut(pid) {
                    player.position = position;
                    player.velocity = velocity;
                }
            }
        }

        self.step_projectiles(dt);
        self.step_beams(dt);

        self.effects.tick(&mut self.registry, dt, now);

        self.scheduler.tick(&mut self.registry, &self.config, dt, now);
        let pending_impacts = self.scheduler.drain_pending_impacts();
        for impact in pending_impacts {
            self.apply_event_impact(impact);
        }

        self.flush_post_step();

        for expired in self.registry.age_obstacles(dt) {
            self.physics.unregister_entity(expired);
        }
        self.registry.cull_inactive();

        self.events_out.append(&mut self.rules.drain_events());
        self.events_out.append(&mut self.scheduler.drain_events());
    }

    // -- respawn / spawn placement -------------------------------------------

    fn spawn_player_body(&mut self, pid: PlayerId) {
        let position = self.pick_spawn_point();
        let old_body = self.registry.player(pid).and_then(|p| p.body);
        if let Some(body) = old_body {
            self.physics.unregister_entity(body);
        }

        let body_id = self.registry.next_entity_id();
        self.physics.register_entity(
            body_id,
            position,
            Vec2::ZERO,
            PhysicsBodyKind::Dynamic,
            ColliderShape::Circle { radius: self.config.player_size },
            false,
        );

        if let Some(player) = self.registry.player_mut(pid) {
            player.position = position;
            player.velocity = Vec2::ZERO;
            player.body = Some(body_id);
        }
    }

    fn pick_spawn_point(&self) -> Vec2 {
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let candidate = Vec2::new(
                rng.gen_range(0.0..self.config.world_width),
                rng.gen_range(0.0..self.config.world_height),
            );
            let clear = self
                .registry
                .obstacles()
                .all(|o| o.position.distance(candidate) > o.bounding_radius + self.config.player_size * 2.0);
            if clear {
                return candidate;
            }
        }
        Vec2::new(self.config.world_width / 2.0, self.config.world_height / 2.0)
    }

    // -- manual projectile / beam resolution ---------------------------------
    //
    // Projectiles and beams are not registered with `PhysicsWorld` -- they are
    // short-lived, high-churn entities and a distance check against the much
    // smaller player set is cheaper than a rapier body per shot.

    fn step_projectiles(&mut self, dt: f64) {
        let ids: Vec<EntityId> = self.registry.projectiles().map(|p| p.id).collect();
        for id in ids {
            let Some((position, owner, owner_team, damage, ordinance)) = ({
                let Some(p) = self.registry.projectiles_mut().find(|p| p.id == id) else { continue };
                p.position = p.position.add(p.velocity.scaled(dt));
                if p.position.x < 0.0
                    || p.position.x > self.config.world_width
                    || p.position.y < 0.0
                    || p.position.y > self.config.world_height
                {
                    p.active = false;
                }
                p.active.then_some((p.position, p.owner, p.owner_team, p.damage, p.ordinance))
            }) else {
                continue;
            };

            let ffa = self.config.team_count == 0;
            let hit = self
                .registry
                .players()
                .find(|target| {
                    target.active
                        && target.id != owner
                        && (if ffa { true } else { target.team != owner_team })
                        && target.position.distance(position) <= self.config.player_size
                })
                .map(|t| t.id);

            let Some(target) = hit else { continue };

            self.registry.enqueue_post_step(PostStepAction::ApplyDamage {
                target,
                amount: damage,
                source: Some(owner),
            });
            if let Some(p) = self.registry.projectiles_mut().find(|p| p.id == id) {
                p.active = false;
                p.exploded = true;
            }
            if matches!(ordinance, OrdinanceKind::Rocket | OrdinanceKind::Plasma) {
                let fid = self.registry.next_entity_id();
                self.registry.add_field_effect(FieldEffect::new(
                    fid,
                    owner,
                    owner_team,
                    FieldEffectKind::Explosion,
                    position,
                    40.0,
                    damage * 0.5,
                    0.3,
                ));
            }
        }
    }

    fn step_beams(&mut self, dt: f64) {
        let ids: Vec<EntityId> = self.registry.beams().map(|b| b.id).collect();
        for id in ids {
            let Some((owner, owner_team, damage, damage_kind, start, effective_end, active)) = ({
                let Some(b) = self.registry.beams_mut().find(|b| b.id == id) else { continue };
                b.time_remaining -= dt;
                if b.time_remaining <= 0.0 {
                    b.active = false;
                }
                Some((b.owner, b.team, b.damage, b.damage_kind.clone(), b.start, b.effective_end, b.active))
            }) else {
                continue;
            };

            if !active || damage_kind == BeamDamageKind::Instant {
                continue;
            }

            let ffa = self.config.team_count == 0;
            let targets: Vec<PlayerId> = self
                .registry
                .players()
                .filter(|p| {
                    p.active
                        && p.id != owner
                        && (if ffa { true } else { p.team != owner_team })
                        && Self::distance_to_segment(p.position, start, effective_end) <= 12.0
                })
                .map(|p| p.id)
                .collect();

            for target in targets {
                let amount = match damage_kind {
                    BeamDamageKind::DamageOverTime => damage * dt,
                    BeamDamageKind::Burst => damage,
                    BeamDamageKind::Instant => unreachable!(),
                };
                self.registry.enqueue_post_step(PostStepAction::ApplyDamage {
                    target,
                    amount,
                    source: Some(owner),
                });
            }

            if damage_kind == BeamDamageKind::Burst {
                if let Some(b) = self.registry.beams_mut().find(|b| b.id == id) {
                    b.active = false;
                }
            }
        }
    }

    fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f64 {
        let ab = b.sub(a);
        let len2 = ab.x * ab.x + ab.y * ab.y;
        if len2 < f64::EPSILON {
            return p.distance(a);
        }
        let t = (((p.x - a.x) * ab.x + (p.y - a.y) * ab.y) / len2).clamp(0.0, 1.0);
        let projection = Vec2::new(a.x + ab.x * t, a.y + ab.y * t);
        p.distance(projection)
    }

    // -- hazard impact application -------------------------------------------

    fn apply_event_impact(&mut self, impact: PendingImpact) {
        let (effect_kind, radius, damage, duration) = match impact.kind {
            EventKind::MeteorShower => {
                (FieldEffectKind::Explosion, self.config.meteor_radius, self.config.meteor_damage, 0.0)
            }
            EventKind::SupplyDrop => (FieldEffectKind::Explosion, 40.0, 0.0, 0.0),
            EventKind::VolcanicEruption => {
                (FieldEffectKind::Fire, self.config.eruption_radius, self.config.eruption_damage, 6.0)
            }
            EventKind::Earthquake => (
                FieldEffectKind::Earthquake,
                0.3 * self.config.world_width,
                self.config.earthquake_damage,
                1.0,
            ),
            EventKind::IonStorm => (FieldEffectKind::Electric, 80.0, self.config.ion_storm_damage, 1.0),
            EventKind::Blizzard => (FieldEffectKind::Freeze, 90.0, 20.0, 1.0),
        };

        // Explosion is instantaneous: its damage is dealt right here rather
        // than through `EffectPipeline::tick`, since a zero-duration field
        // effect gets culled at the end of this same tick, before the
        // pipeline ever gets a chance to visit it on a later one.
        if effect_kind == FieldEffectKind::Explosion && damage > 0.0 {
            self.apply_radial_damage(impact.at, radius, damage);
        }

        let id = self.registry.next_entity_id();
        self.registry.add_field_effect(FieldEffect::new(
            id,
            PlayerId::from_raw(u64::MAX),
            NEUTRAL_TEAM,
            effect_kind,
            impact.at,
            radius,
            if effect_kind == FieldEffectKind::Explosion { 0.0 } else { damage },
            if effect_kind == FieldEffectKind::Explosion { 0.3 } else { duration },
        ));

        if impact.kind == EventKind::SupplyDrop {
            let mut rng = rand::thread_rng();
            let pickup_kind = *[FieldEffectKind::HealZone, FieldEffectKind::SpeedBoost].choose(&mut rng).unwrap();
            let pickup_id = self.registry.next_entity_id();
            self.registry.add_field_effect(FieldEffect::new(
                pickup_id,
                PlayerId::from_raw(u64::MAX),
                NEUTRAL_TEAM,
                pickup_kind,
                impact.at,
                30.0,
                20.0,
                20.0,
            ));
        }

        info!(kind = ?impact.kind, x = impact.at.x, y = impact.at.y, "hazard impact applied");
        self.scheduler.notify_impact_applied(impact.kind);
    }

    /// Deal `damage` once to every active player within `radius` of `center`,
    /// regardless of team -- used for instantaneous, world-owned hazard
    /// damage that has no single owner to filter against.
    fn apply_radial_damage(&mut self, center: Vec2, radius: f64, damage: f64) {
        let targets: Vec<PlayerId> = self
            .registry
            .players()
            .filter(|p| p.active && p.position.distance(center) <= radius)
            .map(|p| p.id)
            .collect();
        for target in targets {
            self.registry.enqueue_post_step(PostStepAction::ApplyDamage { target, amount: damage, source: None });
        }
    }

    // -- post-step flush -------------------------------------------------

    fn flush_post_step(&mut self) {
        for action in self.registry.drain_post_step() {
            match action {
                PostStepAction::DespawnEntity(id) => self.despawn_entity(id),
                PostStepAction::ApplyDamage { target, amount, source } => {
                    self.apply_damage(target, amount, source);
                }
                PostStepAction::EliminatePlayer { player, killer } => {
                    if let Some(p) = self.registry.player_mut(player) {
                        p.health = 0.0;
                    }
                    self.on_player_eliminated(player, killer);
                }
                PostStepAction::ScheduleRespawn { player, at_sim_time } => {
                    if let Some(p) = self.registry.player_mut(player) {
                        p.respawn_deadline = Some(at_sim_time);
                    }
                }
                PostStepAction::AttachModification { target, key } => {
                    warn!(?target, key, "generic attach-modification has no kind/duration payload, ignoring");
                }
            }
        }
    }

    fn despawn_entity(&mut self, id: EntityId) {
        self.registry.remove_projectile(id);
        self.registry.remove_beam(id);
        self.registry.remove_field_effect(id);
        self.registry.remove_obstacle(id);
        self.physics.unregister_entity(id);
    }

    fn apply_damage(&mut self, target: PlayerId, amount: f64, source: Option<PlayerId>) {
        let Some(player) = self.registry.player_mut(target) else { return };
        let was_active = player.active;
        EffectPipeline::apply_damage(player, amount);
        player.sync_active_to_health();
        if was_active && !player.active {
            self.on_player_eliminated(target, source);
        }
    }

    fn on_player_eliminated(&mut self, target: PlayerId, killer: Option<PlayerId>) {
        if let Some(killer_id) = killer {
            if let Some(p) = self.registry.player_mut(killer_id) {
                p.kills += 1;
            }
        }

        let was_vip = self.rules.is_vip(target);
        self.rules.on_player_death(&mut self.registry, &self.config, target, self.sim_time);

        if was_vip {
            if let Some(killer_id) = killer {
                let killer_team = self.registry.player(killer_id).map(|p| p.team).unwrap_or(0);
                self.rules.on_vip_killed(killer_team, target);
            }
        }

        self.events_out.push(MatchEvent::Kill { killer, killed: target });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RespawnMode, ScoreStyle, VictoryCondition};
    use crate::entities::OrdinanceKind;
    use crate::input::PlayerInput;

    fn ffa_headshot_config() -> MatchConfig {
        let mut c = MatchConfig::default();
        c.team_count = 0;
        c.victory_condition = VictoryCondition::ScoreLimit;
        c.score_limit = 1.0;
        c.score_style = ScoreStyle::TotalKills;
        c.obstacle_density = ObstacleDensity::Sparse;
        c.world_width = 1000.0;
        c.world_height = 1000.0;
        c
    }

    #[test]
    fn headshot_in_ffa_declares_victory() {
        let config = ffa_headshot_config();
        let mut core = MatchCore::new(config);
        let a = core.join_player(0).unwrap();
        let b = core.join_player(0).unwrap();

        if let Some(p) = core.registry.player_mut(a) {
            p.position = Vec2::new(0.0, 0.0);
            p.weapon.ordinance = OrdinanceKind::Bullet;
            p.weapon.damage = 9999.0;
        }
        if let Some(p) = core.registry.player_mut(b) {
            p.position = Vec2::new(50.0, 0.0);
        }
        // Bodies are only pushed into rapier on the next `sync_to_rapier`
        // call (driven by submitted input); force both positions in now so
        // the physics read-back doesn't clobber them with join-time spawns.
        if let Some(body) = core.registry.player(a).and_then(|p| p.body) {
            core.physics.sync_to_rapier(body, Vec2::new(0.0, 0.0), Vec2::ZERO);
        }
        if let Some(body) = core.registry.player(b).and_then(|p| p.body) {
            core.physics.sync_to_rapier(body, Vec2::new(50.0, 0.0), Vec2::ZERO);
        }

        let mut input = PlayerInput::default();
        input.left_fire = true;
        input.aim_dir = Vec2::new(1.0, 0.0);
        core.submit_input(a, input);

        for _ in 0..10 {
            core.tick(1.0 / 60.0);
        }

        assert!(!core.registry.player(b).unwrap().active);
        assert_eq!(core.registry.player(a).unwrap().kills, 1);
        assert!(core.rules.game_over);
        assert_eq!(core.rules.winning_player, Some(a));
    }

    #[test]
    fn poison_field_deals_expected_damage_over_five_seconds() {
        let mut config = MatchConfig::default();
        config.obstacle_density = ObstacleDensity::Sparse;
        let mut core = MatchCore::new(config);
        let p = core.join_player(0).unwrap();
        if let Some(player) = core.registry.player_mut(p) {
            player.position = Vec2::new(10.0, 10.0);
        }
        if let Some(body) = core.registry.player(p).and_then(|pl| pl.body) {
            core.physics.sync_to_rapier(body, Vec2::new(10.0, 10.0), Vec2::ZERO);
        }
        let id = core.registry.next_entity_id();
        core.registry.add_field_effect(FieldEffect::new(
            id,
            p,
            1,
            FieldEffectKind::Poison,
            Vec2::new(10.0, 10.0),
            50.0,
            20.0,
            5.0,
        ));

        for _ in 0..300 {
            core.tick(1.0 / 60.0);
        }

        assert_eq!(core.registry.player(p).unwrap().health, 0.0);
        assert!(!core.registry.player(p).unwrap().active);
    }

    #[test]
    fn joining_past_max_players_is_rejected() {
        let mut config = MatchConfig::default();
        config.max_players = 1;
        let mut core = MatchCore::new(config);
        core.join_player(0).unwrap();
        assert!(core.join_player(0).is_err());
    }

    #[test]
    fn tied_score_at_time_limit_enters_sudden_death_then_first_kill_wins() {
        let mut config = MatchConfig::default();
        config.team_count = 2;
        config.victory_condition = VictoryCondition::TimeLimit;
        config.time_limit = 60.0;
        config.sudden_death = true;
        config.score_limit = 5.0;
        config.score_style = ScoreStyle::TotalKills;
        config.obstacle_density = ObstacleDensity::Sparse;

        let mut core = MatchCore::new(config);
        let a = core.join_player(1).unwrap();
        let b = core.join_player(2).unwrap();
        if let Some(p) = core.registry.player_mut(a) {
            p.kills = 3;
        }
        if let Some(p) = core.registry.player_mut(b) {
            p.kills = 3;
        }

        while core.sim_time() < 60.1 {
            core.tick(1.0 / 60.0);
        }
        assert!(!core.rules.game_over, "tied scores at the limit must not end the match");
        assert_eq!(core.rules.score_limit, 4.0, "sudden death should target one past the tied score");

        if let Some(p) = core.registry.player_mut(a) {
            p.kills += 1;
        }
        core.tick(1.0 / 60.0);

        assert!(core.rules.game_over);
        assert_eq!(core.rules.winning_team, Some(1));
    }

    #[test]
    fn heal_zone_heals_teammate_but_not_enemy() {
        let mut config = MatchConfig::default();
        config.team_count = 2;
        config.obstacle_density = ObstacleDensity::Sparse;
        let mut core = MatchCore::new(config);

        let x = core.join_player(1).unwrap();
        let z = core.join_player(2).unwrap();
        for (pid, pos) in [(x, Vec2::new(0.0, 0.0)), (z, Vec2::new(0.0, 0.0))] {
            if let Some(p) = core.registry.player_mut(pid) {
                p.health = 50.0;
                p.position = pos;
            }
            if let Some(body) = core.registry.player(pid).and_then(|p| p.body) {
                core.physics.sync_to_rapier(body, pos, Vec2::ZERO);
            }
        }

        let id = core.registry.next_entity_id();
        core.registry.add_field_effect(FieldEffect::new(
            id,
            x,
            1,
            FieldEffectKind::HealZone,
            Vec2::new(0.0, 0.0),
            50.0,
            20.0,
            1.0,
        ));

        for _ in 0..60 {
            core.tick(1.0 / 60.0);
        }

        assert!(core.registry.player(x).unwrap().health > 50.0);
        assert_eq!(core.registry.player(z).unwrap().health, 50.0);
    }
}
