//! Deferred mutation queue for post-step hooks.
//!
//! Physics collision callbacks and hazard-impact handlers run while the
//! simulation's entity registry is borrowed immutably for iteration; they
//! cannot mutate it in place. Instead they push a [`PostStepAction`] onto a
//! [`PostStepQueue`], which the owning subsystem drains after the step
//! completes. This mirrors the two-phase "collect then apply" shape used
//! throughout the simulation: gather mutation intents during the pass, apply
//! them once the pass is over so no in-progress iteration observes a
//! half-applied tick.

use crate::entity::{EntityId, PlayerId};

/// A single deferred mutation produced during a physics step, input pass, or
/// event impact, to be applied once that pass has finished iterating.
#[derive(Debug, Clone, PartialEq)]
pub enum PostStepAction {
    /// Remove an entity from the registry (projectile expiry, beam fade-out,
    /// field effect expiry, obstacle destruction).
    DespawnEntity(EntityId),
    /// Apply raw damage to a player, bypassing further effect-pipeline
    /// routing (already-resolved damage from a collision or hazard impact).
    ApplyDamage { target: PlayerId, amount: f64, source: Option<PlayerId> },
    /// Mark a player as eliminated (health reached zero).
    EliminatePlayer { player: PlayerId, killer: Option<PlayerId> },
    /// Schedule a respawn for a player at a future simulation time.
    ScheduleRespawn { player: PlayerId, at_sim_time: f64 },
    /// Attach an attribute modification to a player, replacing any existing
    /// modification with the same unique key.
    AttachModification { target: PlayerId, key: &'static str },
}

/// Accumulates [`PostStepAction`]s produced during a single simulation pass.
///
/// Queues are drained (not cloned) by the subsystem that owns the pass; a
/// queue left undrained across a tick boundary indicates a subsystem bug, so
/// `drain` always consumes every pending action.
#[derive(Debug, Clone, Default)]
pub struct PostStepQueue {
    actions: Vec<PostStepAction>,
}

impl PostStepQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    /// Enqueue an action to be applied once the current pass finishes.
    pub fn push(&mut self, action: PostStepAction) {
        self.actions.push(action);
    }

    /// Number of actions currently queued.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the queue has no pending actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Remove and return all queued actions in the order they were pushed.
    pub fn drain(&mut self) -> Vec<PostStepAction> {
        std::mem::take(&mut self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_push_order() {
        let mut q = PostStepQueue::new();
        q.push(PostStepAction::DespawnEntity(EntityId::from_raw(1)));
        q.push(PostStepAction::DespawnEntity(EntityId::from_raw(2)));
        q.push(PostStepAction::DespawnEntity(EntityId::from_raw(3)));
        let drained = q.drain();
        assert_eq!(
            drained,
            vec![
                PostStepAction::DespawnEntity(EntityId::from_raw(1)),
                PostStepAction::DespawnEntity(EntityId::from_raw(2)),
                PostStepAction::DespawnEntity(EntityId::from_raw(3)),
            ]
        );
    }

    #[test]
    fn drain_empties_the_queue() {
        let mut q = PostStepQueue::new();
        q.push(PostStepAction::DespawnEntity(EntityId::from_raw(1)));
        assert!(!q.is_empty());
        q.drain();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
    }
}
