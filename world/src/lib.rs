#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! In-memory world that hosts pooled creatures and objects.
//!
//! The [`World`] plays every collaborator role the pool registry expects:
//! it resolves spawn definitions, keeps spawn points registered on a grid
//! of cells, constructs and destroys live instances, and answers which
//! instance is live for a spawn point. Cells can be unloaded and loaded
//! again; loading a cell materializes the spawn points registered there.

mod catalog;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, warn};
use spawn_pools_core::{
    Definition, DefinitionLookup, EntityGuid, EntityKind, InstanceHandle, LiveInstances, MapId,
    Position, SpatialWorld,
};

pub use catalog::{EventPool, MemoryCatalog, NestedPool};

/// Side length of a square grid cell measured in world units.
pub const CELL_LENGTH: f32 = 128.0;

type SpawnKey = (EntityKind, EntityGuid);

/// Cell of the spatial grid containing a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    column: i32,
    row: i32,
}

impl GridCell {
    /// Creates a cell from explicit column and row indices.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Cell that contains the provided position.
    #[must_use]
    pub fn containing(position: Position) -> Self {
        Self {
            column: (position.x() / CELL_LENGTH).floor() as i32,
            row: (position.y() / CELL_LENGTH).floor() as i32,
        }
    }

    /// Column index of the cell.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Row index of the cell.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }
}

/// Counters of placement calls the world has served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementStats {
    /// Instances constructed.
    pub instantiated: u32,
    /// Instances destroyed by removal requests.
    pub removed: u32,
    /// Existing instances put back into the world.
    pub reinserted: u32,
}

#[derive(Clone, Copy, Debug)]
struct Instance {
    guid: EntityGuid,
    kind: EntityKind,
}

/// Authoritative in-memory world state.
#[derive(Debug, Default)]
pub struct World {
    definitions: HashMap<SpawnKey, Definition>,
    grid: BTreeMap<(MapId, GridCell), BTreeSet<SpawnKey>>,
    unloaded: HashSet<(MapId, GridCell)>,
    instanced_maps: HashSet<MapId>,
    instances: BTreeMap<InstanceHandle, Instance>,
    live: HashMap<SpawnKey, InstanceHandle>,
    next_handle: u64,
    stats: PlacementStats,
}

impl World {
    /// Creates an empty world with every cell loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the definition of a spawn point, replacing any previous one.
    pub fn define(&mut self, guid: EntityGuid, kind: EntityKind, definition: Definition) {
        if self.definitions.insert((kind, guid), definition).is_some() {
            debug!("{kind} spawn {guid} redefined");
        }
    }

    /// Marks a map as instanced; pools never place instances on it directly.
    pub fn mark_instanced(&mut self, map: MapId) {
        let _ = self.instanced_maps.insert(map);
    }

    /// Unloads a cell, dropping the live instances inside it.
    ///
    /// Grid registrations survive, so the spawn points return on load.
    pub fn unload_cell(&mut self, map: MapId, cell: GridCell) {
        if !self.unloaded.insert((map, cell)) {
            return;
        }
        let keys: Vec<SpawnKey> = self
            .grid
            .get(&(map, cell))
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default();
        for key in keys {
            if let Some(handle) = self.live.remove(&key) {
                let _ = self.instances.remove(&handle);
            }
        }
    }

    /// Loads a cell and materializes the spawn points registered in it.
    ///
    /// Returns the number of instances constructed.
    pub fn load_cell(&mut self, map: MapId, cell: GridCell) -> usize {
        if !self.unloaded.remove(&(map, cell)) {
            return 0;
        }
        let keys: Vec<SpawnKey> = self
            .grid
            .get(&(map, cell))
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default();

        let mut materialized = 0;
        for (kind, guid) in keys {
            let Some(definition) = self.definitions.get(&(kind, guid)).cloned() else {
                continue;
            };
            if kind == EntityKind::Object && !definition.spawned_by_default {
                continue;
            }
            if self.instantiate(guid, kind, &definition).is_some() {
                materialized += 1;
            }
        }
        materialized
    }

    fn allocate_handle(&mut self) -> InstanceHandle {
        let handle = InstanceHandle::new(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl DefinitionLookup for World {
    fn definition(&self, guid: EntityGuid, kind: EntityKind) -> Option<Definition> {
        self.definitions.get(&(kind, guid)).cloned()
    }
}

impl SpatialWorld for World {
    fn add_to_grid(&mut self, guid: EntityGuid, kind: EntityKind, definition: &Definition) {
        let cell = GridCell::containing(definition.position);
        let _ = self
            .grid
            .entry((definition.map, cell))
            .or_default()
            .insert((kind, guid));
    }

    fn remove_from_grid(&mut self, guid: EntityGuid, kind: EntityKind, definition: &Definition) {
        let slot = (definition.map, GridCell::containing(definition.position));
        if let Some(keys) = self.grid.get_mut(&slot) {
            let _ = keys.remove(&(kind, guid));
            if keys.is_empty() {
                let _ = self.grid.remove(&slot);
            }
        }
    }

    fn is_in_loaded_region(&self, map: MapId, position: Position) -> bool {
        !self.instanced_maps.contains(&map)
            && !self.unloaded.contains(&(map, GridCell::containing(position)))
    }

    fn instantiate(
        &mut self,
        guid: EntityGuid,
        kind: EntityKind,
        _definition: &Definition,
    ) -> Option<InstanceHandle> {
        if self.live.contains_key(&(kind, guid)) {
            warn!("{kind} {guid} already has a live instance");
            return None;
        }
        let handle = self.allocate_handle();
        let _ = self.instances.insert(handle, Instance { guid, kind });
        let _ = self.live.insert((kind, guid), handle);
        self.stats.instantiated += 1;
        Some(handle)
    }

    fn remove_from_world(&mut self, handle: InstanceHandle) {
        let Some(instance) = self.instances.remove(&handle) else {
            return;
        };
        let _ = self.live.remove(&(instance.kind, instance.guid));
        self.stats.removed += 1;
    }

    fn reinsert(&mut self, handle: InstanceHandle) {
        if self.instances.contains_key(&handle) {
            self.stats.reinserted += 1;
        }
    }
}

impl LiveInstances for World {
    fn find_live(&self, guid: EntityGuid, kind: EntityKind) -> Option<InstanceHandle> {
        self.live.get(&(kind, guid)).copied()
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use spawn_pools_core::{EntityGuid, EntityKind};

    use super::{PlacementStats, World};

    /// Counters of placement calls served so far.
    #[must_use]
    pub fn placement_stats(world: &World) -> PlacementStats {
        world.stats
    }

    /// Reports whether the spawn point has a live instance.
    #[must_use]
    pub fn is_live(world: &World, guid: EntityGuid, kind: EntityKind) -> bool {
        world.live.contains_key(&(kind, guid))
    }

    /// Reports whether the spawn point is registered on the grid.
    #[must_use]
    pub fn is_on_grid(world: &World, guid: EntityGuid, kind: EntityKind) -> bool {
        world.grid.values().any(|keys| keys.contains(&(kind, guid)))
    }

    /// Spawn points of one kind with a live instance, ascending.
    #[must_use]
    pub fn live_guids(world: &World, kind: EntityKind) -> Vec<EntityGuid> {
        let mut guids: Vec<EntityGuid> = world
            .live
            .keys()
            .filter(|(live_kind, _)| *live_kind == kind)
            .map(|(_, guid)| *guid)
            .collect();
        guids.sort();
        guids
    }
}
