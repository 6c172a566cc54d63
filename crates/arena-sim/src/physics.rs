//! `PhysicsWorld` -- the §4.3 contract wrapping `rapier2d`.
//!
//! A 2-D rigid-body world with zero gravity, axis-aligned bounds enforced by
//! the simulation loop (not by the physics world itself), and per-body
//! user-data pointing back to the owning [`EntityId`]. Bodies may only be
//! added or removed between steps; collision callbacks fire during `step`
//! and must not mutate the broadphase, so [`PhysicsWorld::step`] only
//! *reports* collision pairs for the caller to enqueue as post-step hooks.

use std::collections::HashMap;

use arena_ecs::entity::EntityId;
use rapier2d::crossbeam;
use rapier2d::prelude::*;

use crate::entities::Vec2;

/// Whether a body participates in the dynamics solver or is a fixed wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsBodyKind {
    Dynamic,
    Kinematic,
    Static,
}

/// Collider geometry for a registered body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Box { half_width: f64, half_height: f64 },
    Circle { radius: f64 },
}

/// A pair of entities whose colliders began touching during the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionPair {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
}

/// A single raycast hit, sorted by ascending distance from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub entity: EntityId,
    pub distance: f64,
    pub point: Vec2,
}

/// Optional predicate restricting which entities a raycast considers.
pub type RaycastFilter<'a> = &'a dyn Fn(EntityId) -> bool;

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<f32>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    entity_to_body: HashMap<EntityId, RigidBodyHandle>,
    body_to_entity: HashMap<RigidBodyHandle, EntityId>,
    collider_to_entity: HashMap<ColliderHandle, EntityId>,
}

impl PhysicsWorld {
    /// A world with zero gravity, as the spec requires.
    pub fn new_zero_gravity() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0],
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            entity_to_body: HashMap::new(),
            body_to_entity: HashMap::new(),
            collider_to_entity: HashMap::new(),
        }
    }

    /// Register a new entity's body and collider. No-op if already registered.
    pub fn register_entity(
        &mut self,
        entity_id: EntityId,
        position: Vec2,
        velocity: Vec2,
        kind: PhysicsBodyKind,
        shape: ColliderShape,
        is_sensor: bool,
    ) {
        if self.entity_to_body.contains_key(&entity_id) {
            return;
        }

        let body_builder = match kind {
            PhysicsBodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            PhysicsBodyKind::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
            PhysicsBodyKind::Static => RigidBodyBuilder::fixed(),
        };
        let body = body_builder
            .translation(vector![position.x as f32, position.y as f32])
            .linvel(vector![velocity.x as f32, velocity.y as f32])
            .build();
        let body_handle = self.rigid_body_set.insert(body);

        let collider = match shape {
            ColliderShape::Box { half_width, half_height } => {
                ColliderBuilder::cuboid(half_width as f32, half_height as f32)
            }
            ColliderShape::Circle { radius } => ColliderBuilder::ball(radius as f32),
        }
        .sensor(is_sensor)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
        let collider_handle =
            self.collider_set.insert_with_parent(collider, body_handle, &mut self.rigid_body_set);

        self.entity_to_body.insert(entity_id, body_handle);
        self.body_to_entity.insert(body_handle, entity_id);
        self.collider_to_entity.insert(collider_handle, entity_id);
    }

    /// Remove an entity's body and collider, if registered.
    pub fn unregister_entity(&mut self, entity_id: EntityId) {
        if let Some(body_handle) = self.entity_to_body.remove(&entity_id) {
            self.body_to_entity.remove(&body_handle);
            self.rigid_body_set.remove(
                body_handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
            self.collider_to_entity.retain(|_, &mut e| e != entity_id);
        }
    }

    /// Push a position/velocity update into rapier for an already-registered
    /// entity (e.g. after `InputProcessor` applies movement intent).
    pub fn sync_to_rapier(&mut self, entity_id: EntityId, position: Vec2, velocity: Vec2) {
        if let Some(&handle) = self.entity_to_body.get(&entity_id) {
            if let Some(body) = self.rigid_body_set.get_mut(handle) {
                body.set_translation(vector![position.x as f32, position.y as f32], true);
                body.set_linvel(vector![velocity.x as f32, velocity.y as f32], true);
            }
        }
    }

    /// Advance the world by `dt` seconds and report collision pairs sorted
    /// by `(min id, max id)` for deterministic replay order.
    pub fn step(&mut self, dt: f64) -> Vec<CollisionPair> {
        self.integration_parameters.dt = dt as f32;

        let (collision_send, collision_recv) = crossbeam::channel::unbounded();
        let (contact_force_send, _contact_force_recv) = crossbeam::channel::unbounded();
        let event_handler = ChannelEventCollector::new(collision_send, contact_force_send);

        let physics_hooks = ();

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &physics_hooks,
            &event_handler,
        );

        let mut pairs = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            if let CollisionEvent::Started(c1, c2, _flags) = event {
                if let (Some(&e1), Some(&e2)) =
                    (self.collider_to_entity.get(&c1), self.collider_to_entity.get(&c2))
                {
                    let (a, b) = if e1.to_raw() <= e2.to_raw() { (e1, e2) } else { (e2, e1) };
                    pairs.push(CollisionPair { entity_a: a, entity_b: b });
                }
            }
        }
        pairs.sort_by_key(|p| (p.entity_a.to_raw(), p.entity_b.to_raw()));
        pairs.dedup();
        pairs
    }

    /// Read back position/velocity for every dynamic body, sorted by raw id
    /// for deterministic iteration.
    pub fn read_results(&self) -> Vec<(EntityId, Vec2, Vec2)> {
        let mut out: Vec<(EntityId, Vec2, Vec2)> = self
            .entity_to_body
            .iter()
            .filter_map(|(&entity, &handle)| {
                let body = self.rigid_body_set.get(handle)?;
                if body.body_type() != RigidBodyType::Dynamic {
                    return None;
                }
                let t = body.translation();
                let v = body.linvel();
                Some((entity, Vec2::new(t.x as f64, t.y as f64), Vec2::new(v.x as f64, v.y as f64)))
            })
            .collect();
        out.sort_by_key(|(e, _, _)| e.to_raw());
        out
    }

    /// Cast a ray and return every hit sorted by ascending distance, up to
    /// `max_dist`, restricted by `filter` if given.
    pub fn raycast(
        &mut self,
        origin: Vec2,
        direction: Vec2,
        max_dist: f64,
        filter: Option<RaycastFilter>,
    ) -> Vec<RaycastHit> {
        self.query_pipeline.update(&self.collider_set);

        let dir = direction.normalized();
        if dir.length() < f64::EPSILON {
            return Vec::new();
        }
        let ray = Ray::new(
            point![origin.x as f32, origin.y as f32],
            vector![dir.x as f32, dir.y as f32],
        );

        let mut hits = Vec::new();
        let collider_to_entity = &self.collider_to_entity;

        self.query_pipeline.intersections_with_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_dist as f32,
            true,
            QueryFilter::default(),
            |collider_handle, intersection| {
                if let Some(&entity) = collider_to_entity.get(&collider_handle) {
                    let point = ray.point_at(intersection.time_of_impact);
                    hits.push(RaycastHit {
                        entity,
                        distance: intersection.time_of_impact as f64,
                        point: Vec2::new(point.x as f64, point.y as f64),
                    });
                }
                true
            },
        );

        if let Some(f) = filter {
            hits.retain(|h| f(h.entity));
        }
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        hits
    }

    pub fn has_entity(&self, entity_id: EntityId) -> bool {
        self.entity_to_body.contains_key(&entity_id)
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u64) -> EntityId {
        EntityId::from_raw(id)
    }

    #[test]
    fn register_then_has_entity() {
        let mut world = PhysicsWorld::new_zero_gravity();
        let e = entity(0);
        world.register_entity(
            e,
            Vec2::ZERO,
            Vec2::ZERO,
            PhysicsBodyKind::Dynamic,
            ColliderShape::Circle { radius: 1.0 },
            false,
        );
        assert!(world.has_entity(e));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn unregister_removes_entity() {
        let mut world = PhysicsWorld::new_zero_gravity();
        let e = entity(0);
        world.register_entity(
            e,
            Vec2::ZERO,
            Vec2::ZERO,
            PhysicsBodyKind::Dynamic,
            ColliderShape::Circle { radius: 1.0 },
            false,
        );
        world.unregister_entity(e);
        assert!(!world.has_entity(e));
    }

    #[test]
    fn zero_gravity_body_does_not_drift_without_velocity() {
        let mut world = PhysicsWorld::new_zero_gravity();
        let e = entity(0);
        world.register_entity(
            e,
            Vec2::new(5.0, 5.0),
            Vec2::ZERO,
            PhysicsBodyKind::Dynamic,
            ColliderShape::Circle { radius: 1.0 },
            false,
        );
        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        let results = world.read_results();
        let (_, pos, _) = results.into_iter().find(|(id, _, _)| *id == e).unwrap();
        assert!((pos.x - 5.0).abs() < 1e-3);
        assert!((pos.y - 5.0).abs() < 1e-3);
    }

    #[test]
    fn register_is_idempotent() {
        let mut world = PhysicsWorld::new_zero_gravity();
        let e = entity(0);
        world.register_entity(
            e,
            Vec2::ZERO,
            Vec2::ZERO,
            PhysicsBodyKind::Dynamic,
            ColliderShape::Circle { radius: 1.0 },
            false,
        );
        world.register_entity(
            e,
            Vec2::new(99.0, 99.0),
            Vec2::ZERO,
            PhysicsBodyKind::Dynamic,
            ColliderShape::Circle { radius: 1.0 },
            false,
        );
        assert_eq!(world.body_count(), 1);
    }
}
