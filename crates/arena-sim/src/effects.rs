//! `EffectPipeline` -- §4.5.
//!
//! Per-tick application of field effects to players inside their radius,
//! and the attribute-modification replace/revert/dispatch machinery that
//! field effects (and weapons) attach to players.

use std::collections::HashSet;

use arena_ecs::entity::PlayerId;
use tracing::trace;

use crate::entities::{
    AttributeModification, EntityRegistry, FieldEffectKind, ModificationKind, Player, WeaponConfig, NEUTRAL_TEAM,
};

/// Per-tick field-effect application and attribute-modification lifecycle.
pub struct EffectPipeline {
    /// Players standing in a `SLOW_FIELD` last tick, used to detect the
    /// "left the field" transition that triggers `reset_damping`.
    players_in_slow_fields_previous_frame: HashSet<PlayerId>,
}

impl Default for EffectPipeline {
    fn default() -> Self {
        Self { players_in_slow_fields_previous_frame: HashSet::new() }
    }
}

impl EffectPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick of the §4.5 algorithm.
    pub fn tick(&mut self, registry: &mut EntityRegistry, dt: f64, now: f64) {
        let mut current_frame_slow_set: HashSet<PlayerId> = HashSet::new();

        let effect_ids: Vec<_> = registry.field_effects_in_creation_order().map(|f| f.id).collect();

        for effect_id in effect_ids {
            let (kind, center, radius, value, owner, owner_team, is_instantaneous) = {
                let Some(effect) = registry.field_effects_mut().find(|f| f.id == effect_id) else {
                    continue;
                };
                if !effect.active {
                    continue;
                }
                if !effect.kind.is_instantaneous() {
                    effect.time_remaining -= dt;
                }
                (
                    effect.kind,
                    effect.center,
                    effect.radius,
                    effect.value,
                    effect.owner,
                    effect.owner_team,
                    effect.kind.is_instantaneous(),
                )
            };

            let player_ids: Vec<PlayerId> = registry.player_ids().to_vec();
            for pid in player_ids {
                let Some(player) = registry.player(pid) else { continue };
                if !player.active {
                    continue;
                }
                let distance = player.position.distance(center);
                let in_range = distance <= radius;
                if !in_range {
                    continue;
                }
                if !Self::team_filter_allows(kind, owner, owner_team, pid, player.team) {
                    continue;
                }

                let closeness = if radius > 0.0 { ((radius - distance) / radius).max(0.0) } else { 0.0 };

                if kind == FieldEffectKind::SlowField {
                    current_frame_slow_set.insert(pid);
                }

                if let Some(player) = registry.player_mut(pid) {
                    Self::apply_kind_consequence(player, kind, value, dt, closeness, center, now);
                    player.sync_active_to_health();
                }
            }

            if is_instantaneous {
                if let Some(effect) = registry.field_effects_mut().find(|f| f.id == effect_id) {
                    effect.active = false;
                }
            }
        }

        let left_the_field: Vec<PlayerId> = self
            .players_in_slow_fields_previous_frame
            .difference(&current_frame_slow_set)
            .copied()
            .collect();
        for pid in left_the_field {
            if let Some(player) = registry.player_mut(pid) {
                player.reset_damping();
            }
        }
        self.players_in_slow_fields_previous_frame = current_frame_slow_set;

        registry.cull_inactive();

        for pid in registry.player_ids().to_vec() {
            if let Some(player) = registry.player_mut(pid) {
                if player.active {
                    Self::apply_per_tick_player_hooks(player, dt);
                    player.sync_active_to_health();
                }
                Self::expire_modifications(player, now);
            }
        }
    }

    /// Team mode keys friendly fire off `team`, but FFA has no meaningful
    /// team number -- every FFA player conventionally carries `team == 0`,
    /// so `owner_team != target_team` is trivially false for every pairing
    /// and nothing would ever be hit or healed. In FFA the same rule has to
    /// be asked of player identity instead: damage/slow kinds affect anyone
    /// but the owner, positive kinds affect only the owner. `owner_team ==
    /// 0` is an unambiguous FFA signal because `MatchConfig::normalized`
    /// only ever assigns real team-mode teams `1..=4`.
    fn team_filter_allows(kind: FieldEffectKind, owner: PlayerId, owner_team: u32, target: PlayerId, target_team: u32) -> bool {
        if kind == FieldEffectKind::WarningZone {
            return false;
        }
        if kind == FieldEffectKind::GravityWell {
            return true;
        }
        if owner_team == NEUTRAL_TEAM {
            return true;
        }
        let ffa = owner_team == 0;
        if kind.is_positive_kind() {
            if ffa { target == owner } else { owner_team == target_team }
        } else {
            if ffa { target != owner } else { owner_team != target_team }
        }
    }

    fn apply_kind_consequence(
        player: &mut Player,
        kind: FieldEffectKind,
        v: f64,
        dt: f64,
        closeness: f64,
        center: crate::entities::Vec2,
        now: f64,
    ) {
        match kind {
            FieldEffectKind::Fire => {
                Self::take_damage(player, v * dt);
                Self::attach_modification(player, ModificationKind::Burning { dps: v * 0.3 }, 1.0, now);
            }
            FieldEffectKind::Poison => {
                Self::take_damage(player, v * dt);
                Self::attach_modification(player, ModificationKind::Poison { dps: v * 0.2 }, 1.5, now);
            }
            FieldEffectKind::Electric => {
                Self::take_damage(player, v * dt);
                Self::attach_modification(player, ModificationKind::Slow { damping: 0.7 }, 0.5, now);
            }
            FieldEffectKind::Freeze => {
                Self::take_damage(player, v * dt);
                Self::attach_modification(player, ModificationKind::Slow { damping: 0.6 }, 1.0, now);
            }
            FieldEffectKind::Earthquake | FieldEffectKind::ExplosionPersistent => {
                Self::take_damage(player, v * dt);
            }
            FieldEffectKind::Explosion => {
                Self::take_damage(player, v);
            }
            FieldEffectKind::HealZone => {
                player.health = (player.health + v * dt).min(player.max_health);
            }
            FieldEffectKind::SpeedBoost => {
                Self::attach_modification(player, ModificationKind::Speed { multiplier: 1.5 }, 2.0, now);
                player.damping_override = Some(0.0);
            }
            FieldEffectKind::SlowField => {
                player.damping_override = Some(1.0 + 2.0 * closeness);
                if player.velocity.length() > 1.0 {
                    let resist = player.velocity.normalized().scaled(-400.0 * closeness);
                    player.velocity = player.velocity.add(resist);
                }
            }
            FieldEffectKind::GravityWell => {
                let toward = center.sub(player.position).normalized().scaled(800.0 * closeness);
                player.velocity = player.velocity.add(toward);
            }
            FieldEffectKind::WarningZone => {}
        }
    }

    fn take_damage(player: &mut Player, raw_amount: f64) {
        let amount = Self::fold_damage_taken(player, raw_amount);
        player.health = (player.health - amount).max(0.0);
    }

    /// Apply already-resolved damage (a collision or hazard impact), still
    /// routed through the damage-taken modification fold so invincibility
    /// and resistance apply uniformly regardless of the damage's origin.
    pub fn apply_damage(player: &mut Player, raw_amount: f64) {
        Self::take_damage(player, raw_amount);
    }

    /// Fold every attached modification's `modify_damage_taken` hook over
    /// the raw incoming amount, in insertion order.
    fn fold_damage_taken(player: &Player, raw_amount: f64) -> f64 {
        player.modifications.iter().fold(raw_amount, |amount, modification| {
            match &modification.kind {
                ModificationKind::Invincibility => 0.0,
                ModificationKind::Resistance { pct } => amount * pct,
                _ => amount,
            }
        })
    }

    /// Fold every attached modification's `per_tick_weapon` hook over the
    /// player's configured weapon, in insertion order, producing the
    /// effective weapon used for firing this tick.
    pub fn effective_weapon(player: &Player) -> WeaponConfig {
        player.modifications.iter().fold(player.weapon.clone(), |weapon, modification| {
            match &modification.kind {
                ModificationKind::BallCarrier => {
                    let mut w = weapon;
                    w.fire_rate = 0.0;
                    w.ammo_capacity = u32::MAX;
                    w
                }
                _ => weapon,
            }
        })
    }

    /// Run every modification's `per_tick_player` hook, in insertion order.
    pub fn apply_per_tick_player_hooks(player: &mut Player, dt: f64) {
        let kinds: Vec<ModificationKind> = player.modifications.iter().map(|m| m.kind.clone()).collect();
        for kind in kinds {
            match kind {
                ModificationKind::Burning { dps } | ModificationKind::Poison { dps } => {
                    Self::take_damage(player, dps * dt);
                }
                _ => {}
            }
        }
    }

    /// Attach a modification, replacing any existing one with the same key
    /// (firing its revert) and appending the new one at the end.
    pub fn attach_modification(player: &mut Player, kind: ModificationKind, duration: f64, now: f64) {
        let key = kind.key();
        if let Some(pos) = player.modifications.iter().position(|m| m.key() == key) {
            let removed = player.modifications.remove(pos);
            Self::revert(player, &removed);
        }
        trace!(player = ?player.id, key, duration, "attaching modification");
        player.modifications.push(AttributeModification::new(kind, duration, now));
    }

    fn expire_modifications(player: &mut Player, now: f64) {
        let mut i = 0;
        while i < player.modifications.len() {
            if now >= player.modifications[i].expiry {
                let removed = player.modifications.remove(i);
                Self::revert(player, &removed);
            } else {
                i += 1;
            }
        }
    }

    fn revert(player: &mut Player, modification: &AttributeModification) {
        match &modification.kind {
            ModificationKind::Slow { .. } | ModificationKind::Speed { .. } => {
                player.reset_damping();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{FieldEffect, Vec2};

    fn make_player(team: u32) -> Player {
        Player::new(PlayerId::from_raw(0), team, 100.0, 3)
    }

    #[test]
    fn attach_modification_replaces_same_key() {
        let mut player = make_player(0);
        EffectPipeline::attach_modification(&mut player, ModificationKind::Burning { dps: 1.0 }, 1.0, 0.0);
        EffectPipeline::attach_modification(&mut player, ModificationKind::Burning { dps: 9.0 }, 1.0, 0.0);
        assert_eq!(player.modifications.len(), 1);
        match &player.modifications[0].kind {
            ModificationKind::Burning { dps } => assert_eq!(*dps, 9.0),
            _ => panic!("expected burning"),
        }
    }

    #[test]
    fn invincibility_blocks_all_damage() {
        let mut player = make_player(0);
        EffectPipeline::attach_modification(&mut player, ModificationKind::Invincibility, 5.0, 0.0);
        EffectPipeline::take_damage(&mut player, 999.0);
        assert_eq!(player.health, 100.0);
    }

    #[test]
    fn resistance_scales_damage() {
        let mut player = make_player(0);
        EffectPipeline::attach_modification(&mut player, ModificationKind::Resistance { pct: 0.5 }, 5.0, 0.0);
        EffectPipeline::take_damage(&mut player, 40.0);
        assert_eq!(player.health, 80.0);
    }

    #[test]
    fn poison_damages_enemy_not_ally() {
        let mut registry = EntityRegistry::new();
        let ally = Player::new(registry.next_player_id(), 0, 100.0, 3);
        let enemy = Player::new(registry.next_player_id(), 1, 100.0, 3);
        let ally_id = ally.id;
        let enemy_id = enemy.id;
        registry.add_player(ally);
        registry.add_player(enemy);

        let id = registry.next_entity_id();
        registry.add_field_effect(FieldEffect::new(
            id,
            ally_id,
            0,
            FieldEffectKind::Poison,
            Vec2::ZERO,
            100.0,
            20.0,
            1.0,
        ));

        let mut pipeline = EffectPipeline::new();
        pipeline.tick(&mut registry, 1.0, 1.0);

        assert_eq!(registry.player(ally_id).unwrap().health, 100.0);
        assert!(registry.player(enemy_id).unwrap().health < 100.0);
    }
}
