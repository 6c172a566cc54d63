//! `EventScheduler` -- §4.7.
//!
//! A warning-then-impact state machine that injects ephemeral hazards
//! (meteors, eruptions, storms) into the live simulation. At most one
//! [`ActiveEvent`] exists at a time (§8 invariant 7). Sub-impacts are
//! staggered within the impact phase; firing one does not mutate the
//! registry directly -- it is recorded as a completed impact that the match
//! driver applies as a post-step spawn, matching the "scheduled impact
//! tasks must enqueue a post-step hook" design note.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::config::MatchConfig;
use crate::entities::{
    ActiveEvent, EntityRegistry, EventKind, EventPhase, FieldEffect, FieldEffectKind, SubImpact, Vec2,
};
use crate::message::MatchEvent;

const ALL_KINDS: [EventKind; 6] = [
    EventKind::MeteorShower,
    EventKind::SupplyDrop,
    EventKind::VolcanicEruption,
    EventKind::Earthquake,
    EventKind::IonStorm,
    EventKind::Blizzard,
];

/// A hazard ready to be materialized as a field effect at `at`, produced by
/// [`EventScheduler::tick`] once a sub-impact's stagger delay elapses. The
/// match driver applies this after its own post-step processing, keeping
/// the scheduler itself free of direct registry mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingImpact {
    pub kind: EventKind,
    pub at: Vec2,
}

pub struct EventScheduler {
    active: Option<ActiveEvent>,
    next_event_time: f64,
    events: Vec<MatchEvent>,
    pending_impacts: Vec<PendingImpact>,
}

impl EventScheduler {
    pub fn new(config: &MatchConfig, now: f64) -> Self {
        Self {
            active: None,
            next_event_time: Self::roll_next_event_time(config, now),
            events: Vec::new(),
            pending_impacts: Vec::new(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Impacts whose stagger delay elapsed this tick, ready to become field
    /// effects. The match driver owns applying these to the registry.
    pub fn drain_pending_impacts(&mut self) -> Vec<PendingImpact> {
        std::mem::take(&mut self.pending_impacts)
    }

    pub fn active_kind(&self) -> Option<EventKind> {
        self.active.as_ref().map(|e| e.kind)
    }

    pub fn active_phase(&self) -> Option<EventPhase> {
        self.active.as_ref().map(|e| e.phase)
    }

    /// Seconds left in the active event's current phase, or `None` if no
    /// event is active. `Warning` counts down to the impact deadline;
    /// `Impact` counts down to the last sub-impact's fire time.
    pub fn active_time_remaining(&self, now: f64) -> Option<f64> {
        let event = self.active.as_ref()?;
        let remaining = match event.phase {
            EventPhase::Scheduled => 0.0,
            EventPhase::Warning => event.warning_deadline - now,
            EventPhase::Impact => {
                let last_fire = event.sub_impacts.iter().map(|s| s.fire_at).fold(0.0, f64::max);
                last_fire - now
            }
        };
        Some(remaining.max(0.0))
    }

    fn roll_next_event_time(config: &MatchConfig, now: f64) -> f64 {
        let mut rng = rand::thread_rng();
        let base = config.random_event_interval;
        let spread = base * config.random_event_interval_variance;
        let jitter = rng.gen_range(-spread..=spread);
        (now + base + jitter).max(now + 30.0)
    }

    /// Advance the scheduler by `dt`. `registry` is consulted (read-only, via
    /// `obstacles()`) to bias target selection toward clear terrain and
    /// (mutably) to spawn/remove `WARNING_ZONE` field effects.
    pub fn tick(&mut self, registry: &mut EntityRegistry, config: &MatchConfig, dt: f64, now: f64) {
        let _ = dt;
        if !config.enable_random_events {
            return;
        }

        if self.active.is_none() && now >= self.next_event_time {
            self.start_event(registry, config, now);
        }

        let Some(event) = self.active.as_mut() else { return };

        match event.phase {
            EventPhase::Scheduled => {
                // Construction immediately transitions to Warning (see
                // `start_event`); Scheduled is not observed mid-tick.
            }
            EventPhase::Warning => {
                if now >= event.warning_deadline {
                    for target in &event.targets {
                        let dead: Vec<_> = registry
                            .field_effects_of_kind(FieldEffectKind::WarningZone)
                            .filter(|f| f.center.x == target.x && f.center.y == target.y)
                            .map(|f| f.id)
                            .collect();
                        for id in dead {
                            registry.remove_field_effect(id);
                        }
                    }

                    let stagger = config.event_impact_stagger.max(0.05);
                    let mut rng = rand::thread_rng();
                    event.sub_impacts = event
                        .targets
                        .iter()
                        .map(|&target| SubImpact {
                            target,
                            fire_at: now + stagger + rng.gen_range(0.0..stagger),
                            fired: false,
                        })
                        .collect();
                    event.phase = EventPhase::Impact;
                    event.impact_deadline = now;
                }
            }
            EventPhase::Impact => {
                let kind = event.kind;
                for sub in event.sub_impacts.iter_mut() {
                    if !sub.fired && now >= sub.fire_at {
                        sub.fired = true;
                        self.pending_impacts.push(PendingImpact { kind, at: sub.target });
                    }
                }

                let all_fired = event.sub_impacts.iter().all(|s| s.fired);
                let last_fire = event.sub_impacts.iter().map(|s| s.fire_at).fold(0.0, f64::max);
                let cooldown = config.event_impact_stagger.max(0.05);
                if all_fired && now >= last_fire + cooldown {
                    info!(?kind, "hazard event complete");
                    self.active = None;
                    self.next_event_time = Self::roll_next_event_time(config, now);
                }
            }
        }
    }

    fn start_event(&mut self, registry: &mut EntityRegistry, config: &MatchConfig, now: f64) {
        let enabled: Vec<EventKind> = config
            .enabled_event_kinds
            .clone()
            .unwrap_or_else(|| ALL_KINDS.to_vec());
        if enabled.is_empty() {
            return;
        }
        let mut rng = rand::thread_rng();
        let kind = *enabled.choose(&mut rng).expect("enabled is non-empty");

        let impact_radius = Self::impact_radius(kind, config);
        let target_count = Self::target_count(config, kind);
        let targets = Self::pick_targets(registry, config, target_count, &mut rng);

        for &target in &targets {
            let id = registry.next_entity_id();
            registry.add_field_effect(FieldEffect::new(
                id,
                arena_ecs::entity::PlayerId::from_raw(u64::MAX),
                0,
                FieldEffectKind::WarningZone,
                target,
                impact_radius,
                0.0,
                config.event_warning_duration,
            ));
        }

        info!(?kind, count = targets.len(), "hazard event announced");
        self.events.push(MatchEvent::EventAnnounced { kind });

        self.active = Some(ActiveEvent {
            kind,
            phase: EventPhase::Warning,
            warning_deadline: now + config.event_warning_duration,
            impact_deadline: 0.0,
            targets,
            warning_zones_spawned: true,
            sub_impacts: Vec::new(),
        });
    }

    fn impact_radius(kind: EventKind, config: &MatchConfig) -> f64 {
        match kind {
            EventKind::MeteorShower => config.meteor_radius,
            EventKind::SupplyDrop => 40.0,
            EventKind::VolcanicEruption => config.eruption_radius,
            EventKind::Earthquake => 0.3 * config.world_width,
            EventKind::IonStorm => 80.0,
            EventKind::Blizzard => 90.0,
        }
    }

    /// Number of impact locations, scaled from world area against a
    /// reference arena size (1000x500) and a flat per-kind density
    /// multiplier. Clamped to a sane [1, 8] range; see DESIGN.md for the
    /// rationale (§4.7 specifies "a function of world area and a density
    /// multiplier" without naming constants).
    fn target_count(config: &MatchConfig, kind: EventKind) -> usize {
        const REFERENCE_AREA: f64 = 1000.0 * 500.0;
        let density = match kind {
            EventKind::MeteorShower => 1.0,
            EventKind::SupplyDrop => 0.5,
            EventKind::VolcanicEruption => 0.75,
            EventKind::Earthquake => 0.5,
            EventKind::IonStorm => 0.75,
            EventKind::Blizzard => 0.5,
        };
        let area = config.world_width * config.world_height;
        let raw = (area / REFERENCE_AREA) * density * 3.0;
        raw.round().clamp(1.0, 8.0) as usize
    }

    fn pick_targets(
        registry: &EntityRegistry,
        config: &MatchConfig,
        count: usize,
        rng: &mut impl Rng,
    ) -> Vec<Vec2> {
        let mut targets = Vec::with_capacity(count);
        for _ in 0..count {
            let mut chosen = None;
            for _ in 0..10 {
                let candidate = Vec2::new(
                    rng.gen_range(0.0..config.world_width),
                    rng.gen_range(0.0..config.world_height),
                );
                let clear = registry
                    .obstacles()
                    .all(|o| o.position.distance(candidate) > o.bounding_radius + 30.0);
                if clear {
                    chosen = Some(candidate);
                    break;
                }
                chosen = Some(candidate);
            }
            targets.push(chosen.unwrap_or(Vec2::new(config.world_width / 2.0, config.world_height / 2.0)));
        }
        targets
    }

    pub fn notify_impact_applied(&mut self, kind: EventKind) {
        self.events.push(MatchEvent::EventImpact { kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_events() -> MatchConfig {
        let mut c = MatchConfig::default();
        c.enable_random_events = true;
        c.event_warning_duration = 2.0;
        c.event_impact_stagger = 0.5;
        c.enabled_event_kinds = Some(vec![EventKind::MeteorShower]);
        c
    }

    #[test]
    fn at_most_one_active_event_at_a_time() {
        let config = config_with_events();
        let mut registry = EntityRegistry::new();
        let mut scheduler = EventScheduler::new(&config, 0.0);
        scheduler.next_event_time = 0.0;

        scheduler.tick(&mut registry, &config, 1.0 / 60.0, 0.0);
        assert!(scheduler.active.is_some());

        // A second attempt to start while one is active must not replace it.
        let kind_before = scheduler.active_kind();
        scheduler.tick(&mut registry, &config, 1.0 / 60.0, 0.1);
        assert_eq!(scheduler.active_kind(), kind_before);
    }

    #[test]
    fn warning_then_impact_sequence_matches_scenario_four() {
        let config = config_with_events();
        let mut registry = EntityRegistry::new();
        let mut scheduler = EventScheduler::new(&config, 0.0);
        scheduler.next_event_time = 0.0;

        scheduler.tick(&mut registry, &config, 1.0 / 60.0, 0.0);
        assert_eq!(scheduler.active_phase(), Some(EventPhase::Warning));
        let warning_zone_count = registry.field_effects_of_kind(FieldEffectKind::WarningZone).count();
        assert!(warning_zone_count >= 1);

        scheduler.tick(&mut registry, &config, 1.0 / 60.0, 2.1);
        assert_eq!(scheduler.active_phase(), Some(EventPhase::Impact));
        assert_eq!(registry.field_effects_of_kind(FieldEffectKind::WarningZone).count(), 0);

        // Drain impacts across the stagger window.
        let mut impacts = Vec::new();
        let mut t = 2.1;
        while scheduler.active.is_some() && t < 10.0 {
            t += 0.1;
            scheduler.tick(&mut registry, &config, 0.1, t);
            impacts.extend(scheduler.drain_pending_impacts());
        }
        assert!(!impacts.is_empty());
        assert!(scheduler.active.is_none());
    }
}
