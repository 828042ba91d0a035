#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the spawn pool engine.
//!
//! This crate defines the identifiers, catalog rows and collaborator
//! interfaces that connect the pool registry with the outside world. The
//! persistent catalog is read through [`CatalogReader`], entity definitions
//! are resolved through [`DefinitionLookup`], and concrete instances are
//! placed and removed through [`SpatialWorld`] and [`LiveInstances`]. The
//! registry never owns world state; it only decides which pool members
//! should be live and hands the actual placement off to these traits.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest chance value accepted for a pool candidate.
pub const MIN_CHANCE: f32 = 0.0;

/// Highest chance value accepted for a pool candidate.
pub const MAX_CHANCE: f32 = 100.0;

/// Identifier of a pool as stored in the persistent catalog.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PoolId(u16);

impl PoolId {
    /// Creates a new pool identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }

    /// Dense index of the pool inside registry tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a spawn point for a creature or object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityGuid(u32);

impl EntityGuid {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a world map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(u32);

impl MapId {
    /// Creates a new map identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Opaque handle to a live instance owned by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(u64);

impl InstanceHandle {
    /// Wraps the provided raw handle value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the raw handle value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Identifier of a scheduled world event that may gate pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u16);

impl EventId {
    /// Creates a new event identifier.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Families of world entities that pools can manage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Living creatures such as wildlife or rare spawns.
    Creature,
    /// Interactable objects such as chests or resource nodes.
    Object,
}

impl EntityKind {
    /// Lower-case label used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Creature => "creature",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structural archetype recorded on an entity definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Any creature; creatures are never checked against object archetypes.
    Creature,
    /// Lootable container.
    Chest,
    /// Prop that reacts to player interaction.
    InteractiveProp,
    /// Harvestable resource node such as a fishing hole.
    ResourceNode,
    /// Door or gate.
    Door,
    /// Static decoration without interaction.
    Decoration,
}

impl Archetype {
    /// Reports whether objects of this archetype may be pooled.
    #[must_use]
    pub const fn is_lootable(self) -> bool {
        matches!(
            self,
            Self::Chest | Self::InteractiveProp | Self::ResourceNode
        )
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Creature => "creature",
            Self::Chest => "chest",
            Self::InteractiveProp => "interactive_prop",
            Self::ResourceNode => "resource_node",
            Self::Door => "door",
            Self::Decoration => "decoration",
        };
        f.write_str(label)
    }
}

/// Location of a spawn point on its map, in world units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f32,
    y: f32,
}

impl Position {
    /// Creates a new position from planar coordinates.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical coordinate.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }
}

/// Static spawn definition resolved from the entity catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    /// Template entry the spawn point instantiates.
    pub entry: u32,
    /// Map that hosts the spawn point.
    pub map: MapId,
    /// Spawn coordinates on the map.
    pub position: Position,
    /// Structural archetype of the template.
    pub archetype: Archetype,
    /// Whether the instance is added to the world as soon as it is constructed.
    pub spawned_by_default: bool,
}

/// Capacity row of a pool: how many members may be live at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolCapacity {
    /// Pool the capacity applies to.
    pub pool: PoolId,
    /// Maximum number of simultaneously spawned members.
    pub max_limit: u32,
}

impl PoolCapacity {
    /// Creates a capacity row.
    #[must_use]
    pub const fn new(pool: PoolId, max_limit: u32) -> Self {
        Self { pool, max_limit }
    }
}

/// Candidate row linking a spawn point to a pool.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Spawn point that belongs to the pool.
    pub guid: EntityGuid,
    /// Pool the spawn point belongs to.
    pub pool: PoolId,
    /// Explicit chance in percent, or zero for equal chance.
    pub chance: f32,
}

impl CandidateRecord {
    /// Creates a candidate row.
    #[must_use]
    pub const fn new(guid: EntityGuid, pool: PoolId, chance: f32) -> Self {
        Self { guid, pool, chance }
    }
}

/// Failure to read a table from the persistent catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing store could not produce the requested table.
    #[error("catalog table `{table}` is unavailable: {reason}")]
    Unavailable {
        /// Name of the table that failed.
        table: &'static str,
        /// Human readable cause reported by the store.
        reason: String,
    },
}

/// Reasons a candidate row is skipped while loading pools.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CandidateRejection {
    /// The guid has no definition in the entity catalog.
    #[error("{kind} spawn {guid} does not exist (pool {pool})")]
    MissingDefinition {
        /// Kind of candidate that was rejected.
        kind: EntityKind,
        /// Spawn point referenced by the row.
        guid: EntityGuid,
        /// Pool referenced by the row.
        pool: PoolId,
    },
    /// The pool id lies beyond the largest pool with a capacity row.
    #[error("{kind} spawn {guid} references pool {pool} beyond max pool id {max}")]
    PoolOutOfRange {
        /// Kind of candidate that was rejected.
        kind: EntityKind,
        /// Spawn point referenced by the row.
        guid: EntityGuid,
        /// Pool referenced by the row.
        pool: PoolId,
        /// Largest valid pool id.
        max: PoolId,
    },
    /// The chance lies outside `[0, 100]`.
    #[error("{kind} spawn {guid} has invalid chance {chance} in pool {pool}")]
    InvalidChance {
        /// Kind of candidate that was rejected.
        kind: EntityKind,
        /// Spawn point referenced by the row.
        guid: EntityGuid,
        /// Pool referenced by the row.
        pool: PoolId,
        /// Chance found in the row.
        chance: f32,
    },
    /// The object definition is not a lootable archetype.
    #[error("object spawn {guid} is not lootable ({archetype}) in pool {pool}")]
    NotLootable {
        /// Spawn point referenced by the row.
        guid: EntityGuid,
        /// Pool referenced by the row.
        pool: PoolId,
        /// Archetype found on the definition.
        archetype: Archetype,
    },
    /// The guid already belongs to another pool of the same kind.
    #[error("{kind} spawn {guid} for pool {pool} already belongs to pool {owner}")]
    AlreadyPooled {
        /// Kind of candidate that was rejected.
        kind: EntityKind,
        /// Spawn point referenced by the row.
        guid: EntityGuid,
        /// Pool referenced by the row.
        pool: PoolId,
        /// Pool that owns the guid.
        owner: PoolId,
    },
}

/// Read access to the persistent pool catalog.
pub trait CatalogReader {
    /// Lists every pool capacity row.
    fn pool_capacities(&self) -> Result<Vec<PoolCapacity>, CatalogError>;

    /// Lists candidate rows for the requested entity kind.
    fn candidates(&self, kind: EntityKind) -> Result<Vec<CandidateRecord>, CatalogError>;

    /// Lists pools that are neither nested in another pool nor gated by an event.
    fn independent_pools(&self) -> Result<Vec<PoolId>, CatalogError>;
}

/// Resolves spawn definitions from the entity catalog.
pub trait DefinitionLookup {
    /// Returns the definition of the spawn point, if it exists.
    fn definition(&self, guid: EntityGuid, kind: EntityKind) -> Option<Definition>;
}

/// Spatial collaborator that owns grid registration and live placement.
pub trait SpatialWorld {
    /// Registers the spawn point with its grid cell so it appears when the cell loads.
    fn add_to_grid(&mut self, guid: EntityGuid, kind: EntityKind, definition: &Definition);

    /// Unregisters the spawn point from its grid cell.
    fn remove_from_grid(&mut self, guid: EntityGuid, kind: EntityKind, definition: &Definition);

    /// Reports whether the position lies in a loaded region of a non-instanced map.
    fn is_in_loaded_region(&self, map: MapId, position: Position) -> bool;

    /// Constructs a live instance of the spawn point.
    fn instantiate(
        &mut self,
        guid: EntityGuid,
        kind: EntityKind,
        definition: &Definition,
    ) -> Option<InstanceHandle>;

    /// Destroys a live instance.
    fn remove_from_world(&mut self, handle: InstanceHandle);

    /// Adds an already constructed instance back to its map.
    fn reinsert(&mut self, handle: InstanceHandle);
}

/// Lookup of live instances by spawn point.
pub trait LiveInstances {
    /// Returns the live instance of the spawn point, if any.
    fn find_live(&self, guid: EntityGuid, kind: EntityKind) -> Option<InstanceHandle>;
}

/// Everything the pool engine needs from the world it populates.
pub trait WorldHost: DefinitionLookup + SpatialWorld + LiveInstances {}

impl<T> WorldHost for T where T: DefinitionLookup + SpatialWorld + LiveInstances {}
