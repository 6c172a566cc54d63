//! `InputBuffer` and `InputProcessor` -- §4.4.
//!
//! Input arrives from any thread (human sessions, the synthetic AI driver)
//! and is latest-wins per player per tick: an `InputBuffer` is a lock-free
//! slot map the tick drains once at the start of its pass.

use std::collections::HashMap;

use arena_ecs::entity::{EntityId, PlayerId};
use arena_ecs::poststep::PostStepAction;
use serde::{Deserialize, Serialize};

use crate::effects::EffectPipeline;
use crate::entities::{
    Beam, BeamDamageKind, EntityRegistry, FieldEffect, FieldEffectKind, ModificationKind, Obstacle,
    Projectile, ShapeCategory, UtilityCategory, Vec2,
};
use crate::physics::PhysicsWorld;

/// Latest client input for a player. Overwritten in place by
/// [`InputBuffer::submit`]; only the most recent submission per player per
/// tick is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub left_fire: bool,
    pub alt_fire: bool,
    pub sprint: bool,
    pub move_dir: Vec2,
    pub aim_dir: Vec2,
    pub reload: bool,
}

impl Default for PlayerInput {
    fn default() -> Self {
        Self {
            left_fire: false,
            alt_fire: false,
            sprint: false,
            move_dir: Vec2::ZERO,
            aim_dir: Vec2::new(1.0, 0.0),
            reload: false,
        }
    }
}

/// Latest-wins per-player input slots, written from any thread and drained
/// exclusively by the owning match's tick.
#[derive(Debug, Default)]
pub struct InputBuffer {
    slots: HashMap<PlayerId, PlayerInput>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot for `player` with the latest input. Submissions
    /// from the same driver arrive in order, so the last call before drain
    /// wins.
    pub fn submit(&mut self, player: PlayerId, input: PlayerInput) {
        self.slots.insert(player, input);
    }

    /// Remove and return every buffered input, clearing the buffer for the
    /// next tick.
    pub fn drain(&mut self) -> HashMap<PlayerId, PlayerInput> {
        std::mem::take(&mut self.slots)
    }
}

/// A utility activation produced by alt-fire, before it is dispatched to a
/// concrete utility category.
#[derive(Debug, Clone)]
pub struct UtilityActivation {
    pub player: PlayerId,
    pub team: u32,
    pub position: Vec2,
    pub direction: Vec2,
}

/// Applies drained input to player bodies and dispatches weapon/utility
/// fire.
pub struct InputProcessor;

impl InputProcessor {
    /// Apply one tick's worth of input for every player with a submission
    /// this tick.
    pub fn apply(
        registry: &mut EntityRegistry,
        physics: &mut PhysicsWorld,
        inputs: &HashMap<PlayerId, PlayerInput>,
        dt: f64,
        player_speed: f64,
        now: f64,
    ) {
        let player_ids: Vec<PlayerId> = registry.player_ids().to_vec();
        for pid in player_ids {
            let Some(input) = inputs.get(&pid) else { continue };
            let Some(player) = registry.player_mut(pid) else { continue };
            if !player.active {
                continue;
            }

            let fire_locked = player.has_modification(ModificationKind::BallCarrier.key());

            let speed_mult = if input.sprint { 1.5 } else { 1.0 };
            let move_dir = input.move_dir.normalized();
            player.velocity = move_dir.scaled(player_speed * speed_mult);
            player.rotation = input.aim_dir.normalized().y.atan2(input.aim_dir.normalized().x);
            player.reloading = input.reload;

            let position = player.position;
            let velocity = player.velocity;
            let team = player.team;
            let weapon = EffectPipeline::effective_weapon(player);
            let utility = player.utility.clone();
            let aim_dir = input.aim_dir.normalized();

            if let Some(body) = player.body {
                physics.sync_to_rapier(body, position, velocity);
            }

            if fire_locked {
                continue;
            }

            if input.left_fire {
                Self::primary_fire(registry, physics, pid, team, position, aim_dir, &weapon, now);
            }
            if input.alt_fire {
                Self::utility_fire(registry, physics, pid, team, position, aim_dir, &utility, now);
            }
            let _ = dt;
        }
    }

    fn primary_fire(
        registry: &mut EntityRegistry,
        physics: &mut PhysicsWorld,
        pid: PlayerId,
        team: u32,
        position: Vec2,
        aim_dir: Vec2,
        weapon: &crate::entities::WeaponConfig,
        now: f64,
    ) {
        if weapon.ordinance.is_beam() {
            let id = registry.next_entity_id();
            let nominal_end = position.add(aim_dir.scaled(2000.0));
            let hits = physics.raycast(position, aim_dir, 2000.0, None);
            let effective_end = hits.first().map(|h| h.point).unwrap_or(nominal_end);

            let beam = Beam::new(
                id,
                pid,
                team,
                position,
                nominal_end,
                weapon.damage,
                weapon.damage_kind.clone(),
                0.2,
                false,
            );
            let mut beam = beam;
            beam.effective_end = effective_end;
            registry.add_beam(beam);

            if weapon.damage_kind == BeamDamageKind::Instant {
                // Primary-fire beams hit only the first body in their path;
                // piercing is reserved for utility beams (see `Beam::pierce`).
                if let Some(hit) = hits.first() {
                    if let Some(target) = registry.player_by_body(hit.entity) {
                        registry.enqueue_post_step(PostStepAction::ApplyDamage {
                            target,
                            amount: weapon.damage,
                            source: Some(pid),
                        });
                    }
                }
            }
        } else {
            for i in 0..weapon.pellets.max(1) {
                let id = registry.next_entity_id();
                let spread = (i as f64 - (weapon.pellets as f64 - 1.0) / 2.0) * 0.05;
                let dir = Vec2::new(
                    aim_dir.x * spread.cos() - aim_dir.y * spread.sin(),
                    aim_dir.x * spread.sin() + aim_dir.y * spread.cos(),
                );
                let projectile = Projectile {
                    id,
                    owner: pid,
                    owner_team: team,
                    ordinance: weapon.ordinance,
                    position,
                    velocity: dir.scaled(600.0),
                    damage: weapon.damage,
                    bullet_effects: Vec::new(),
                    active: true,
                    exploded: false,
                };
                registry.add_projectile(projectile);
            }
        }
        let _ = now;
    }

    fn utility_fire(
        registry: &mut EntityRegistry,
        physics: &mut PhysicsWorld,
        pid: PlayerId,
        team: u32,
        position: Vec2,
        aim_dir: Vec2,
        utility: &crate::entities::UtilityConfig,
        now: f64,
    ) {
        let activation = UtilityActivation { player: pid, team, position, direction: aim_dir };
        match utility.category {
            UtilityCategory::FieldEffect => {
                let id = registry.next_entity_id();
                let center = activation.position.add(activation.direction.scaled(utility.range));
                registry.add_field_effect(FieldEffect::new(
                    id,
                    pid,
                    team,
                    FieldEffectKind::HealZone,
                    center,
                    utility.radius,
                    20.0,
                    5.0,
                ));
            }
            UtilityCategory::Barrier => {
                let id = registry.next_entity_id();
                let position = activation.position.add(activation.direction.scaled(utility.range));
                registry.add_obstacle(Obstacle {
                    id,
                    position,
                    shape: ShapeCategory::Box,
                    bounding_radius: utility.radius,
                    is_static: false,
                    owner: Some(pid),
                    lifespan: Some(15.0),
                    is_teleport_pad: false,
                    linked_pad: None,
                });
            }
            UtilityCategory::Beam => {
                let id = registry.next_entity_id();
                let nominal_end = position.add(aim_dir.scaled(1500.0));
                let hits = physics.raycast(position, aim_dir, 1500.0, None);
                let effective_end = hits.first().map(|h| h.point).unwrap_or(nominal_end);
                let mut beam = Beam::new(
                    id,
                    pid,
                    team,
                    position,
                    nominal_end,
                    40.0,
                    utility.damage_kind.clone(),
                    0.2,
                    false,
                );
                beam.effective_end = effective_end;
                registry.add_beam(beam);
            }
            // The fixed entity kinds (Projectile/Beam/FieldEffect/Obstacle)
            // have no dedicated "turret"/"mine"/"net" shape, so each is
            // modeled as a distinct field effect kind instead of being
            // collapsed into one: a turret is a standing arc-damage zone, a
            // net immobilizes without hurting, a mine pulls nearby players
            // into its blast radius before going off.
            UtilityCategory::Turret => {
                let id = registry.next_entity_id();
                let position = activation.position.add(activation.direction.scaled(utility.range));
                registry.add_field_effect(FieldEffect::new(
                    id,
                    pid,
                    team,
                    FieldEffectKind::Electric,
                    position,
                    utility.radius,
                    15.0,
                    20.0,
                ));
            }
            UtilityCategory::NetProjectile => {
                let id = registry.next_entity_id();
                let position = activation.position.add(activation.direction.scaled(utility.range));
                registry.add_field_effect(FieldEffect::new(
                    id,
                    pid,
                    team,
                    FieldEffectKind::SlowField,
                    position,
                    utility.radius,
                    0.0,
                    4.0,
                ));
            }
            UtilityCategory::ProximityMine => {
                let id = registry.next_entity_id();
                let position = activation.position.add(activation.direction.scaled(utility.range));
                registry.add_field_effect(FieldEffect::new(
                    id,
                    pid,
                    team,
                    FieldEffectKind::GravityWell,
                    position,
                    utility.radius,
                    40.0,
                    0.3,
                ));
            }
            UtilityCategory::TeleportPad => {
                let id = registry.next_entity_id();
                let position = activation.position.add(activation.direction.scaled(utility.range));
                registry.add_obstacle(Obstacle {
                    id,
                    position,
                    shape: ShapeCategory::Circle,
                    bounding_radius: 20.0,
                    is_static: true,
                    owner: Some(pid),
                    lifespan: None,
                    is_teleport_pad: true,
                    linked_pad: None,
                });
                Self::link_teleport_pad(registry, pid, id);
            }
        }
        let _ = now;
    }

    /// Link a newly-placed teleport pad to `pid`'s previous unlinked pad, if
    /// it still exists and is itself unlinked. The link is symmetric: both
    /// pads end up pointing at each other. Otherwise the new pad becomes the
    /// player's unlinked pad, awaiting a future placement to pair with.
    fn link_teleport_pad(registry: &mut EntityRegistry, pid: PlayerId, new_pad: EntityId) {
        let previous = registry.player(pid).and_then(|p| p.last_unlinked_pad);
        let previous_is_linkable = previous
            .and_then(|prev_id| registry.obstacles().find(|o| o.id == prev_id))
            .map(|o| o.is_teleport_pad && o.linked_pad.is_none())
            .unwrap_or(false);

        if previous_is_linkable {
            let prev_id = previous.expect("checked above");
            if let Some(prev) = registry.obstacles_mut().find(|o| o.id == prev_id) {
                prev.linked_pad = Some(new_pad);
            }
            if let Some(pad) = registry.obstacles_mut().find(|o| o.id == new_pad) {
                pad.linked_pad = Some(prev_id);
            }
            if let Some(player) = registry.player_mut(pid) {
                player.last_unlinked_pad = None;
            }
        } else if let Some(player) = registry.player_mut(pid) {
            player.last_unlinked_pad = Some(new_pad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_all_slots_and_clears_buffer() {
        let mut buf = InputBuffer::new();
        buf.submit(PlayerId::from_raw(0), PlayerInput::default());
        buf.submit(PlayerId::from_raw(1), PlayerInput::default());
        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn submit_overwrites_previous_slot() {
        let mut buf = InputBuffer::new();
        let mut first = PlayerInput::default();
        first.left_fire = true;
        buf.submit(PlayerId::from_raw(0), first);
        let mut second = PlayerInput::default();
        second.left_fire = false;
        buf.submit(PlayerId::from_raw(0), second);
        let drained = buf.drain();
        assert_eq!(drained.len(), 1);
        assert!(!drained[&PlayerId::from_raw(0)].left_fire);
    }
}
