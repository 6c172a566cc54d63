//! Match-scoped entity and player identifiers.
//!
//! Unlike a generic ECS, identifiers here are never recycled: a match-unique,
//! monotonically increasing 64-bit id is minted by a per-match generator.
//! There is no generation counter and no stale-id detection by reuse -- an
//! id that has been retired simply never appears again for the lifetime of
//! the match.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A match-unique identifier for a live simulation entity (player body,
/// projectile, beam, field effect, obstacle, or active event).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct directly from a raw value. Used by tests and by
    /// deserialization; production code should obtain ids from
    /// [`EntityIdGenerator`].
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw `u64` value.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mints monotonically increasing [`EntityId`]s for a single match.
///
/// Never recycles a value. A match's generator is owned by its
/// `EntityRegistry` and is never shared across matches.
#[derive(Debug, Clone, Default)]
pub struct EntityIdGenerator {
    next: u64,
}

impl EntityIdGenerator {
    /// Create a generator starting at id `0`.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Mint the next id.
    pub fn next_id(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids minted so far.
    pub fn minted(&self) -> u64 {
        self.next
    }
}

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A session-scoped identifier that survives a player's death and respawn.
///
/// `PlayerId` is distinct from [`EntityId`]: a player's body (the `EntityId`
/// of their in-world character) is removed on death and a new one is
/// materialized on respawn, but `PlayerId` is stable for the whole session.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Construct directly from a raw value.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw `u64` value.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mints monotonically increasing [`PlayerId`]s for a single match.
#[derive(Debug, Clone, Default)]
pub struct PlayerIdGenerator {
    next: u64,
}

impl PlayerIdGenerator {
    /// Create a generator starting at id `0`.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Mint the next id.
    pub fn next_id(&mut self) -> PlayerId {
        let id = PlayerId(self.next);
        self.next += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_monotonic_and_never_repeat() {
        let mut gen = EntityIdGenerator::new();
        let ids: Vec<EntityId> = (0..1000).map(|_| gen.next_id()).collect();
        for w in ids.windows(2) {
            assert!(w[0].to_raw() < w[1].to_raw());
        }
        let mut raws: Vec<u64> = ids.iter().map(|e| e.to_raw()).collect();
        raws.sort_unstable();
        raws.dedup();
        assert_eq!(raws.len(), ids.len());
    }

    #[test]
    fn player_ids_independent_sequence_from_entity_ids() {
        let mut entities = EntityIdGenerator::new();
        let mut players = PlayerIdGenerator::new();
        let e0 = entities.next_id();
        let p0 = players.next_id();
        let e1 = entities.next_id();
        assert_eq!(e0.to_raw(), 0);
        assert_eq!(p0.to_raw(), 0);
        assert_eq!(e1.to_raw(), 1);
    }

    #[test]
    fn entity_id_roundtrips_through_raw() {
        let id = EntityId::from_raw(42);
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
    }
}
