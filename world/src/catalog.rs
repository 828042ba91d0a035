//! In-memory persistent catalog.

use std::collections::BTreeSet;

use spawn_pools_core::{
    CandidateRecord, CatalogError, CatalogReader, EntityGuid, EntityKind, EventId, PoolCapacity,
    PoolId,
};

/// A pool spawned and despawned by its parent pool rather than on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NestedPool {
    /// The nested pool.
    pub pool: PoolId,
    /// Pool that contains it.
    pub parent: PoolId,
}

/// A pool activated only while a scheduled event runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventPool {
    /// The gating event.
    pub event: EventId,
    /// The gated pool.
    pub pool: PoolId,
}

/// Catalog tables held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    pools: Vec<PoolCapacity>,
    creatures: Vec<CandidateRecord>,
    objects: Vec<CandidateRecord>,
    nested: Vec<NestedPool>,
    event_pools: Vec<EventPool>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capacity row.
    #[must_use]
    pub fn with_pool(mut self, pool: PoolId, max_limit: u32) -> Self {
        self.pools.push(PoolCapacity::new(pool, max_limit));
        self
    }

    /// Adds a candidate row of the given kind.
    #[must_use]
    pub fn with_candidate(
        mut self,
        kind: EntityKind,
        guid: EntityGuid,
        pool: PoolId,
        chance: f32,
    ) -> Self {
        let row = CandidateRecord::new(guid, pool, chance);
        match kind {
            EntityKind::Creature => self.creatures.push(row),
            EntityKind::Object => self.objects.push(row),
        }
        self
    }

    /// Declares `pool` as nested inside `parent`.
    #[must_use]
    pub fn with_nested(mut self, pool: PoolId, parent: PoolId) -> Self {
        self.nested.push(NestedPool { pool, parent });
        self
    }

    /// Declares `pool` as gated by `event`.
    #[must_use]
    pub fn with_event_pool(mut self, event: EventId, pool: PoolId) -> Self {
        self.event_pools.push(EventPool { event, pool });
        self
    }

    /// Pools nested inside other pools.
    #[must_use]
    pub fn nested(&self) -> &[NestedPool] {
        &self.nested
    }

    /// Pools gated by events.
    #[must_use]
    pub fn event_pools(&self) -> &[EventPool] {
        &self.event_pools
    }
}

impl CatalogReader for MemoryCatalog {
    fn pool_capacities(&self) -> Result<Vec<PoolCapacity>, CatalogError> {
        Ok(self.pools.clone())
    }

    fn candidates(&self, kind: EntityKind) -> Result<Vec<CandidateRecord>, CatalogError> {
        Ok(match kind {
            EntityKind::Creature => self.creatures.clone(),
            EntityKind::Object => self.objects.clone(),
        })
    }

    fn independent_pools(&self) -> Result<Vec<PoolId>, CatalogError> {
        let excluded: BTreeSet<PoolId> = self
            .nested
            .iter()
            .map(|link| link.pool)
            .chain(self.event_pools.iter().map(|gate| gate.pool))
            .collect();
        let independent: BTreeSet<PoolId> = self
            .pools
            .iter()
            .map(|capacity| capacity.pool)
            .filter(|pool| !excluded.contains(pool))
            .collect();
        Ok(independent.into_iter().collect())
    }
}
