#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative pool state for the spawn pool engine.
//!
//! The [`PoolRegistry`] owns one capacity row and one selection group per
//! entity kind for every pool, plus reverse indexes from spawn point to
//! owning pool. It is built from the persistent catalog once, before the
//! simulation accepts pool events, and afterwards only changes through
//! [`PoolRegistry::spawn_pool`], [`PoolRegistry::despawn_pool`] and
//! [`PoolRegistry::update_pool`]. Every call runs to completion on the
//! simulation tick that issues it.

mod load;

use std::collections::HashMap;

use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use spawn_pools_core::{
    CatalogError, CatalogReader, EntityGuid, EntityKind, PoolCapacity, PoolId, WorldHost,
};
use spawn_pools_system_selection::{CreatureHooks, ObjectHooks, SelectionGroup};

pub use load::{KindReport, LoadReport};

/// Configuration parameters required to construct the registry.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration drawing pool selections from the provided seed.
    #[must_use]
    pub const fn new(rng_seed: u64) -> Self {
        Self { rng_seed }
    }

    /// Seed of the selection random stream.
    #[must_use]
    pub const fn rng_seed(&self) -> u64 {
        self.rng_seed
    }
}

/// Pools of interchangeable spawn points and their live membership.
#[derive(Debug)]
pub struct PoolRegistry {
    capacities: Vec<PoolCapacity>,
    creature_groups: Vec<SelectionGroup>,
    object_groups: Vec<SelectionGroup>,
    creature_index: HashMap<EntityGuid, PoolId>,
    object_index: HashMap<EntityGuid, PoolId>,
    rng: ChaCha8Rng,
    initialized: bool,
}

impl PoolRegistry {
    /// Creates an empty registry; pools arrive through [`Self::load_from_catalog`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        debug!("pool selections seeded with {:#x}", config.rng_seed());
        Self {
            capacities: Vec::new(),
            creature_groups: Vec::new(),
            object_groups: Vec::new(),
            creature_index: HashMap::new(),
            object_index: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed()),
            initialized: false,
        }
    }

    /// Spawns every independent, well-formed pool and returns how many were spawned.
    ///
    /// Independent pools are those the catalog reports as neither nested in
    /// another pool nor gated by a scheduled event. Pools failing
    /// [`Self::check_pool`] are logged and left idle; they can still be
    /// spawned by hand.
    pub fn initialize<C, W>(&mut self, catalog: &C, world: &mut W) -> Result<usize, CatalogError>
    where
        C: CatalogReader + ?Sized,
        W: WorldHost + ?Sized,
    {
        let mut spawned = 0;
        for pool in catalog.independent_pools()? {
            if !self.contains(pool) {
                warn!("independent pool {pool} has no capacity row, skipped");
                continue;
            }
            if !self.check_pool(pool) {
                error!(
                    "pool {pool} has explicit chances that do not sum to 100 and no \
                     equal-chance members, it cannot pick one to spawn"
                );
                continue;
            }
            self.spawn_pool(pool, false, &mut *world);
            spawned += 1;
        }

        info!("pool system initialized, {spawned} pools spawned");
        self.initialized = true;
        Ok(spawned)
    }

    /// Brings both kinds of the pool up to its limit.
    ///
    /// With `cache` set, a member previously marked by
    /// [`Self::update_pool`] is reinserted if it is drawn again and removed
    /// otherwise. Objects are handled before creatures.
    pub fn spawn_pool<W: WorldHost + ?Sized>(&mut self, pool: PoolId, cache: bool, world: &mut W) {
        let Some(capacity) = self.capacity(pool) else {
            warn!("spawn requested for unknown pool {pool}");
            return;
        };
        let max_limit = capacity.max_limit;
        let index = pool.index();

        let objects = &mut self.object_groups[index];
        if !objects.is_empty() {
            let mut hooks = ObjectHooks::new(&mut *world);
            objects.spawn_object(max_limit, cache, &mut hooks, &mut self.rng);
        }
        let creatures = &mut self.creature_groups[index];
        if !creatures.is_empty() {
            let mut hooks = CreatureHooks::new(&mut *world);
            creatures.spawn_object(max_limit, cache, &mut hooks, &mut self.rng);
        }
    }

    /// Removes every live member of the pool from the world.
    pub fn despawn_pool<W: WorldHost + ?Sized>(&mut self, pool: PoolId, world: &mut W) {
        if !self.contains(pool) {
            warn!("despawn requested for unknown pool {pool}");
            return;
        }
        let index = pool.index();
        self.object_groups[index].despawn_object(None, &mut ObjectHooks::new(&mut *world));
        self.creature_groups[index].despawn_object(None, &mut CreatureHooks::new(&mut *world));
    }

    /// Replaces a member that became eligible to respawn.
    ///
    /// The member is marked for replacement and the pool is respawned in
    /// caching mode, so a redraw of the same member reuses its instance.
    pub fn update_pool<W: WorldHost + ?Sized>(
        &mut self,
        pool: PoolId,
        guid: EntityGuid,
        kind: EntityKind,
        world: &mut W,
    ) {
        if !self.contains(pool) {
            warn!("update requested for unknown pool {pool}");
            return;
        }
        let group = &mut self.groups_mut(kind)[pool.index()];
        match kind {
            EntityKind::Creature => {
                group.despawn_object(Some(guid), &mut CreatureHooks::new(&mut *world));
            }
            EntityKind::Object => {
                group.despawn_object(Some(guid), &mut ObjectHooks::new(&mut *world));
            }
        }
        self.spawn_pool(pool, true, world);
    }

    /// Returns the pool owning the spawn point, if it is pooled.
    #[must_use]
    pub fn is_part_of_a_pool(&self, guid: EntityGuid, kind: EntityKind) -> Option<PoolId> {
        self.index(kind).get(&guid).copied()
    }

    /// Reports whether both kinds of the pool can make a pick.
    ///
    /// Unknown pools are reported as malformed.
    #[must_use]
    pub fn check_pool(&self, pool: PoolId) -> bool {
        if !self.contains(pool) {
            return false;
        }
        let index = pool.index();
        self.creature_groups[index].check_pool() && self.object_groups[index].check_pool()
    }

    /// Reports whether the spawn point is a live member of the pool.
    #[must_use]
    pub fn is_spawned_object(&self, pool: PoolId, guid: EntityGuid, kind: EntityKind) -> bool {
        self.group(pool, kind)
            .is_some_and(|group| group.is_spawned_object(guid))
    }

    /// Reports whether [`Self::initialize`] has completed.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Largest valid pool id, or `None` when no pools are loaded.
    #[must_use]
    pub fn max_pool_id(&self) -> Option<PoolId> {
        self.capacities.last().map(|capacity| capacity.pool)
    }

    fn contains(&self, pool: PoolId) -> bool {
        pool.index() < self.capacities.len()
    }

    fn capacity(&self, pool: PoolId) -> Option<&PoolCapacity> {
        self.capacities.get(pool.index())
    }

    fn group(&self, pool: PoolId, kind: EntityKind) -> Option<&SelectionGroup> {
        let groups = match kind {
            EntityKind::Creature => &self.creature_groups,
            EntityKind::Object => &self.object_groups,
        };
        groups.get(pool.index())
    }

    fn groups_mut(&mut self, kind: EntityKind) -> &mut [SelectionGroup] {
        match kind {
            EntityKind::Creature => &mut self.creature_groups,
            EntityKind::Object => &mut self.object_groups,
        }
    }

    fn index(&self, kind: EntityKind) -> &HashMap<EntityGuid, PoolId> {
        match kind {
            EntityKind::Creature => &self.creature_index,
            EntityKind::Object => &self.object_index,
        }
    }

    fn index_mut(&mut self, kind: EntityKind) -> &mut HashMap<EntityGuid, PoolId> {
        match kind {
            EntityKind::Creature => &mut self.creature_index,
            EntityKind::Object => &mut self.object_index,
        }
    }

    fn clear(&mut self) {
        self.capacities.clear();
        self.creature_groups.clear();
        self.object_groups.clear();
        self.creature_index.clear();
        self.object_index.clear();
        self.initialized = false;
    }
}

/// Query functions that provide read-only access to pool state.
pub mod query {
    use spawn_pools_core::{EntityGuid, EntityKind, PoolId};
    use spawn_pools_system_selection::SelectionGroup;

    use super::PoolRegistry;

    /// Live member limit of the pool, or `None` for unknown pools.
    #[must_use]
    pub fn max_limit(registry: &PoolRegistry, pool: PoolId) -> Option<u32> {
        registry.capacity(pool).map(|capacity| capacity.max_limit)
    }

    /// Number of live members of one kind in the pool.
    #[must_use]
    pub fn spawned_count(registry: &PoolRegistry, pool: PoolId, kind: EntityKind) -> u32 {
        registry
            .group(pool, kind)
            .map_or(0, SelectionGroup::spawned_count)
    }

    /// Number of candidates of one kind in the pool.
    #[must_use]
    pub fn candidate_count(registry: &PoolRegistry, pool: PoolId, kind: EntityKind) -> usize {
        registry.group(pool, kind).map_or(0, SelectionGroup::len)
    }

    /// Read-only access to the selection group of one kind in the pool.
    #[must_use]
    pub fn group(registry: &PoolRegistry, pool: PoolId, kind: EntityKind) -> Option<&SelectionGroup> {
        registry.group(pool, kind)
    }

    /// Live members of one kind in the pool, in candidate order.
    #[must_use]
    pub fn spawned_members(registry: &PoolRegistry, pool: PoolId, kind: EntityKind) -> Vec<EntityGuid> {
        registry.group(pool, kind).map_or_else(Vec::new, |group| {
            group
                .explicit_entries()
                .iter()
                .chain(group.equal_entries())
                .filter(|entry| entry.is_spawned())
                .map(|entry| entry.guid())
                .collect()
        })
    }

    /// Every pool id known to the registry, ascending.
    pub fn pools(registry: &PoolRegistry) -> impl Iterator<Item = PoolId> + '_ {
        registry.capacities.iter().map(|capacity| capacity.pool)
    }
}
