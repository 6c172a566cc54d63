//! Concrete entity kinds and the registry that owns them.
//!
//! The simulation's entities are a fixed, heterogeneous set rather than an
//! arbitrary runtime-composed component set, so each kind gets its own
//! struct and its own `Vec`-backed slot in [`EntityRegistry`], indexed by
//! [`arena_ecs::entity::EntityId`]. Iteration order is insertion order,
//! matching the ordering guarantees on effect application and scoring.

use std::collections::HashMap;

use arena_ecs::entity::{EntityId, EntityIdGenerator, PlayerId, PlayerIdGenerator};
use arena_ecs::poststep::{PostStepAction, PostStepQueue};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shared geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len < f64::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    pub fn scaled(self, s: f64) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

// ---------------------------------------------------------------------------
// Weapons / ordinance
// ---------------------------------------------------------------------------

/// The kind of munition a weapon fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdinanceKind {
    Bullet,
    Rocket,
    Plasma,
    LaserBeam,
    ContinuousBeam,
}

impl OrdinanceKind {
    pub fn is_beam(self) -> bool {
        matches!(self, OrdinanceKind::LaserBeam | OrdinanceKind::ContinuousBeam)
    }
}

/// A player's configured weapon. Fire rate and ammo can be overridden by
/// attribute modifications (e.g. the oddball carrier's fire-rate-0 lock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponConfig {
    pub ordinance: OrdinanceKind,
    pub damage: f64,
    pub fire_rate: f64,
    pub ammo_capacity: u32,
    pub pellets: u32,
    pub damage_kind: BeamDamageKind,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            ordinance: OrdinanceKind::Bullet,
            damage: 25.0,
            fire_rate: 4.0,
            ammo_capacity: 12,
            pellets: 1,
            damage_kind: BeamDamageKind::Instant,
        }
    }
}

/// A utility weapon's category, driving what `InputProcessor` constructs on
/// alt-fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtilityCategory {
    FieldEffect,
    Turret,
    Barrier,
    NetProjectile,
    ProximityMine,
    TeleportPad,
    Beam,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityConfig {
    pub category: UtilityCategory,
    pub range: f64,
    pub radius: f64,
    pub ordinance: OrdinanceKind,
    pub damage_kind: BeamDamageKind,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            category: UtilityCategory::FieldEffect,
            range: 50.0,
            radius: 80.0,
            ordinance: OrdinanceKind::LaserBeam,
            damage_kind: BeamDamageKind::Instant,
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute modifications
// ---------------------------------------------------------------------------

/// A time-bounded hook set attached to a player.
///
/// Expressed as a tagged sum type with stored parameters rather than a
/// runtime-constructed closure: replacement-by-key, dispatch, and
/// serialization all fall out of matching on the variant instead of
/// invoking captured state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModificationKind {
    Burning { dps: f64 },
    Poison { dps: f64 },
    Slow { damping: f64 },
    Speed { multiplier: f64 },
    Invincibility,
    Resistance { pct: f64 },
    VipStatus,
    BallCarrier,
}

impl ModificationKind {
    /// The unique key used for replacement semantics: at most one
    /// modification per `(player, key)`.
    pub fn key(&self) -> &'static str {
        match self {
            ModificationKind::Burning { .. } => "burning",
            ModificationKind::Poison { .. } => "poison",
            ModificationKind::Slow { .. } => "slow",
            ModificationKind::Speed { .. } => "speed",
            ModificationKind::Invincibility => "invincibility",
            ModificationKind::Resistance { .. } => "resistance",
            ModificationKind::VipStatus => "vip_status",
            ModificationKind::BallCarrier => "ball_carrier",
        }
    }
}

/// An attached, time-bounded modification. `expiry` is an absolute
/// simulation time; the pipeline removes and reverts modifications once
/// `now >= expiry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeModification {
    pub kind: ModificationKind,
    pub expiry: f64,
}

impl AttributeModification {
    pub fn new(kind: ModificationKind, duration: f64, now: f64) -> Self {
        Self { kind, expiry: now + duration }
    }

    pub fn key(&self) -> &'static str {
        self.kind.key()
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamDamageKind {
    Instant,
    DamageOverTime,
    Burst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub body: Option<EntityId>,
    pub name: String,
    pub team: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f64,
    pub health: f64,
    pub max_health: f64,
    pub ammo: u32,
    pub reloading: bool,
    pub weapon: WeaponConfig,
    pub utility: UtilityConfig,
    pub kills: u32,
    pub deaths: u32,
    pub captures: u32,
    pub lives: u32,
    pub eliminated: bool,
    pub elimination_time: Option<f64>,
    pub placement: u32,
    pub active: bool,
    pub respawn_deadline: Option<f64>,
    pub modifications: Vec<AttributeModification>,
    pub damping_override: Option<f64>,
    /// The id of this player's most recently placed teleport pad, if it has
    /// not yet been linked to an earlier one.
    pub last_unlinked_pad: Option<EntityId>,
}

impl Player {
    pub fn new(id: PlayerId, team: u32, max_health: f64, max_lives: u32) -> Self {
        Self {
            id,
            body: None,
            name: String::new(),
            team,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            health: max_health,
            max_health,
            ammo: 0,
            reloading: false,
            weapon: WeaponConfig::default(),
            utility: UtilityConfig::default(),
            kills: 0,
            deaths: 0,
            captures: 0,
            lives: max_lives,
            eliminated: false,
            elimination_time: None,
            placement: 0,
            active: true,
            respawn_deadline: None,
            modifications: Vec::new(),
            damping_override: None,
            last_unlinked_pad: None,
        }
    }

    /// `health > 0 <=> active = true` is the §3 invariant; call after any
    /// damage/heal to keep `active` in sync.
    pub fn sync_active_to_health(&mut self) {
        if self.health <= 0.0 {
            self.active = false;
        }
    }

    pub fn has_modification(&self, key: &str) -> bool {
        self.modifications.iter().any(|m| m.key() == key)
    }

    pub fn has_lives_remaining(&self, limited_mode: bool) -> bool {
        if limited_mode {
            self.lives > 0
        } else {
            true
        }
    }

    pub fn reset_damping(&mut self) {
        self.damping_override = None;
    }

    /// Set the player's display name, abbreviated to the §6 limit of 26
    /// characters (truncated on a char boundary, not a byte boundary).
    pub fn set_name(&mut self, name: &str) {
        self.name = name.chars().take(26).collect();
    }
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: PlayerId,
    pub owner_team: u32,
    pub ordinance: OrdinanceKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f64,
    pub bullet_effects: Vec<String>,
    pub active: bool,
    pub exploded: bool,
}

// ---------------------------------------------------------------------------
// Beam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beam {
    pub id: EntityId,
    pub owner: PlayerId,
    pub team: u32,
    pub start: Vec2,
    pub nominal_end: Vec2,
    pub effective_end: Vec2,
    pub damage: f64,
    pub damage_kind: BeamDamageKind,
    pub duration: f64,
    pub time_remaining: f64,
    pub pierce: bool,
    pub active: bool,
}

impl Beam {
    pub fn new(
        id: EntityId,
        owner: PlayerId,
        team: u32,
        start: Vec2,
        nominal_end: Vec2,
        damage: f64,
        damage_kind: BeamDamageKind,
        duration: f64,
        pierce: bool,
    ) -> Self {
        Self {
            id,
            owner,
            team,
            start,
            nominal_end,
            effective_end: nominal_end,
            damage,
            damage_kind,
            duration,
            time_remaining: duration,
            pierce,
            active: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Field effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldEffectKind {
    Fire,
    Poison,
    Electric,
    Freeze,
    Earthquake,
    ExplosionPersistent,
    HealZone,
    SpeedBoost,
    SlowField,
    GravityWell,
    Explosion,
    WarningZone,
}

/// Sentinel `owner_team` for world-owned effects (hazard impacts, supply
/// drops) that belong to no player and no real team (`0..=4`). Using a value
/// no real team can ever equal lets the damage/positive team filters treat
/// these uniformly as "affects everyone" without a separate code path.
pub const NEUTRAL_TEAM: u32 = u32::MAX;

impl FieldEffectKind {
    /// Whether the effect is consumed on the tick it is created rather than
    /// persisting across ticks.
    pub fn is_instantaneous(self) -> bool {
        matches!(self, FieldEffectKind::Explosion)
    }

    pub fn is_damage_kind(self) -> bool {
        matches!(
            self,
            FieldEffectKind::Fire
                | FieldEffectKind::Poison
                | FieldEffectKind::Electric
                | FieldEffectKind::Freeze
                | FieldEffectKind::Earthquake
                | FieldEffectKind::ExplosionPersistent
                | FieldEffectKind::Explosion
        )
    }

    pub fn is_positive_kind(self) -> bool {
        matches!(self, FieldEffectKind::HealZone | FieldEffectKind::SpeedBoost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEffect {
    pub id: EntityId,
    pub owner: PlayerId,
    pub owner_team: u32,
    pub kind: FieldEffectKind,
    pub center: Vec2,
    pub radius: f64,
    /// Damage-per-second for damage kinds, impulse magnitude for force kinds.
    pub value: f64,
    pub duration: f64,
    pub time_remaining: f64,
    pub armed: bool,
    pub active: bool,
}

impl FieldEffect {
    pub fn new(
        id: EntityId,
        owner: PlayerId,
        owner_team: u32,
        kind: FieldEffectKind,
        center: Vec2,
        radius: f64,
        value: f64,
        duration: f64,
    ) -> Self {
        Self {
            id,
            owner,
            owner_team,
            kind,
            center,
            radius,
            value,
            duration,
            time_remaining: duration,
            armed: true,
            active: true,
        }
    }

    pub fn closeness(&self, distance: f64) -> f64 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        ((self.radius - distance) / self.radius).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Obstacle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeCategory {
    Box,
    Circle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: EntityId,
    pub position: Vec2,
    pub shape: ShapeCategory,
    pub bounding_radius: f64,
    pub is_static: bool,
    pub owner: Option<PlayerId>,
    pub lifespan: Option<f64>,
    pub is_teleport_pad: bool,
    /// The paired pad's id, once this one has been linked. Teleport pads
    /// link symmetrically, so this is set on both ends at once.
    pub linked_pad: Option<EntityId>,
}

// ---------------------------------------------------------------------------
// Active event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MeteorShower,
    SupplyDrop,
    VolcanicEruption,
    Earthquake,
    IonStorm,
    Blizzard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPhase {
    Scheduled,
    Warning,
    Impact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubImpact {
    pub target: Vec2,
    pub fire_at: f64,
    pub fired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveEvent {
    pub kind: EventKind,
    pub phase: EventPhase,
    pub warning_deadline: f64,
    pub impact_deadline: f64,
    pub targets: Vec<Vec2>,
    pub warning_zones_spawned: bool,
    pub sub_impacts: Vec<SubImpact>,
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Owns all live entity collections, the id generators, and the post-step
/// deferred-mutation queue shared with the physics step.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entity_ids: EntityIdGenerator,
    player_ids: PlayerIdGenerator,

    players: HashMap<PlayerId, Player>,
    player_order: Vec<PlayerId>,

    projectiles: HashMap<EntityId, Projectile>,
    projectile_order: Vec<EntityId>,

    beams: HashMap<EntityId, Beam>,
    beam_order: Vec<EntityId>,

    field_effects: HashMap<EntityId, FieldEffect>,
    field_effect_order: Vec<EntityId>,

    obstacles: HashMap<EntityId, Obstacle>,
    obstacle_order: Vec<EntityId>,

    post_step: PostStepQueue,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- identifiers ---------------------------------------------------

    pub fn next_entity_id(&mut self) -> EntityId {
        self.entity_ids.next_id()
    }

    pub fn next_player_id(&mut self) -> PlayerId {
        self.player_ids.next_id()
    }

    // -- players ---------------------------------------------------------

    pub fn add_player(&mut self, player: Player) {
        let id = player.id;
        self.player_order.push(id);
        self.players.insert(id, player);
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.player_order.retain(|&p| p != id);
        self.players.remove(&id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.player_order.iter().filter_map(move |id| self.players.get(id))
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn player_ids(&self) -> &[PlayerId] {
        &self.player_order
    }

    /// Resolve a physics-body `EntityId` back to the `PlayerId` that owns it.
    pub fn player_by_body(&self, body: EntityId) -> Option<PlayerId> {
        self.players.values().find(|p| p.body == Some(body)).map(|p| p.id)
    }

    // -- projectiles -------------------------------------------------------

    pub fn add_projectile(&mut self, p: Projectile) {
        let id = p.id;
        self.projectile_order.push(id);
        self.projectiles.insert(id, p);
    }

    pub fn remove_projectile(&mut self, id: EntityId) -> Option<Projectile> {
        self.projectile_order.retain(|&p| p != id);
        self.projectiles.remove(&id)
    }

    pub fn projectile(&self, id: EntityId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectile_order.iter().filter_map(move |id| self.projectiles.get(id))
    }

    pub fn projectiles_mut(&mut self) -> impl Iterator<Item = &mut Projectile> {
        self.projectiles.values_mut()
    }

    // -- beams ---------------------------------------------------------

    pub fn add_beam(&mut self, b: Beam) {
        let id = b.id;
        self.beam_order.push(id);
        self.beams.insert(id, b);
    }

    pub fn remove_beam(&mut self, id: EntityId) -> Option<Beam> {
        self.beam_order.retain(|&b| b != id);
        self.beams.remove(&id)
    }

    pub fn beams(&self) -> impl Iterator<Item = &Beam> {
        self.beam_order.iter().filter_map(move |id| self.beams.get(id))
    }

    pub fn beams_mut(&mut self) -> impl Iterator<Item = &mut Beam> {
        self.beams.values_mut()
    }

    // -- field effects -------------------------------------------------

    pub fn add_field_effect(&mut self, f: FieldEffect) {
        let id = f.id;
        self.field_effect_order.push(id);
        self.field_effects.insert(id, f);
    }

    pub fn remove_field_effect(&mut self, id: EntityId) -> Option<FieldEffect> {
        self.field_effect_order.retain(|&f| f != id);
        self.field_effects.remove(&id)
    }

    /// Field effects in creation order -- the ordering the effect pipeline
    /// must apply them in.
    pub fn field_effects_in_creation_order(&self) -> impl Iterator<Item = &FieldEffect> {
        self.field_effect_order.iter().filter_map(move |id| self.field_effects.get(id))
    }

    pub fn field_effects_mut(&mut self) -> impl Iterator<Item = &mut FieldEffect> {
        self.field_effects.values_mut()
    }

    pub fn field_effects_of_kind(&self, kind: FieldEffectKind) -> impl Iterator<Item = &FieldEffect> {
        self.field_effects.values().filter(move |f| f.kind == kind)
    }

    // -- obstacles -------------------------------------------------------

    pub fn add_obstacle(&mut self, o: Obstacle) {
        let id = o.id;
        self.obstacle_order.push(id);
        self.obstacles.insert(id, o);
    }

    pub fn remove_obstacle(&mut self, id: EntityId) -> Option<Obstacle> {
        self.obstacle_order.retain(|&o| o != id);
        self.obstacles.remove(&id)
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacle_order.iter().filter_map(move |id| self.obstacles.get(id))
    }

    pub fn obstacles_mut(&mut self) -> impl Iterator<Item = &mut Obstacle> {
        self.obstacles.values_mut()
    }

    /// Age placed (non-static) obstacles by `dt` and report the ids of any
    /// whose lifespan has elapsed, so the caller can also unregister their
    /// physics bodies before removing them from the registry.
    pub fn age_obstacles(&mut self, dt: f64) -> Vec<EntityId> {
        let mut expired = Vec::new();
        for obstacle in self.obstacles.values_mut() {
            if let Some(remaining) = obstacle.lifespan.as_mut() {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    expired.push(obstacle.id);
                }
            }
        }
        for &id in &expired {
            self.remove_obstacle(id);
        }
        expired
    }

    // -- post-step queue -------------------------------------------------

    pub fn enqueue_post_step(&mut self, action: PostStepAction) {
        self.post_step.push(action);
    }

    /// Remove and apply every queued post-step action.
    pub fn drain_post_step(&mut self) -> Vec<PostStepAction> {
        self.post_step.drain()
    }

    /// Remove projectiles/beams/field-effects whose `active` flag is false
    /// or whose `time_remaining` has expired.
    pub fn cull_inactive(&mut self) {
        let dead_projectiles: Vec<EntityId> =
            self.projectiles.values().filter(|p| !p.active).map(|p| p.id).collect();
        for id in dead_projectiles {
            self.remove_projectile(id);
        }

        let dead_beams: Vec<EntityId> = self
            .beams
            .values()
            .filter(|b| !b.active || b.time_remaining <= 0.0)
            .map(|b| b.id)
            .collect();
        for id in dead_beams {
            self.remove_beam(id);
        }

        let dead_effects: Vec<EntityId> = self
            .field_effects
            .values()
            .filter(|f| !f.active || f.time_remaining <= 0.0)
            .map(|f| f.id)
            .collect();
        for id in dead_effects {
            self.remove_field_effect(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_effects_preserve_creation_order() {
        let mut reg = EntityRegistry::new();
        for i in 0..3 {
            let id = reg.next_entity_id();
            reg.add_field_effect(FieldEffect::new(
                id,
                PlayerId::from_raw(0),
                0,
                FieldEffectKind::Fire,
                Vec2::new(i as f64, 0.0),
                10.0,
                5.0,
                1.0,
            ));
        }
        let xs: Vec<f64> = reg.field_effects_in_creation_order().map(|f| f.center.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn cull_inactive_removes_expired_field_effects() {
        let mut reg = EntityRegistry::new();
        let id = reg.next_entity_id();
        let mut effect = FieldEffect::new(
            id,
            PlayerId::from_raw(0),
            0,
            FieldEffectKind::Poison,
            Vec2::ZERO,
            10.0,
            5.0,
            1.0,
        );
        effect.time_remaining = 0.0;
        reg.add_field_effect(effect);
        reg.cull_inactive();
        assert_eq!(reg.field_effects_in_creation_order().count(), 0);
    }

    #[test]
    fn player_invariant_health_zero_implies_inactive() {
        let mut p = Player::new(PlayerId::from_raw(0), 0, 100.0, 3);
        p.health = 0.0;
        p.sync_active_to_health();
        assert!(!p.active);
    }

    #[test]
    fn at_most_one_modification_per_key_enforced_by_caller_contract() {
        let mut p = Player::new(PlayerId::from_raw(0), 0, 100.0, 3);
        p.modifications.push(AttributeModification::new(
            ModificationKind::Burning { dps: 5.0 },
            1.0,
            0.0,
        ));
        assert!(p.has_modification("burning"));
        assert!(!p.has_modification("poison"));
    }
}
