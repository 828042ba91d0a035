//! TOML scenario manifests describing pools, candidates and spawn definitions.

use std::{collections::HashSet, fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use spawn_pools_core::{
    Archetype, Definition, EntityGuid, EntityKind, EventId, MapId, PoolId, Position,
};
use spawn_pools_world::{MemoryCatalog, World};

/// Manifest layout version understood by this binary.
pub(crate) const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// World and catalog assembled from a manifest.
#[derive(Debug)]
pub(crate) struct Scenario {
    /// World holding every declared spawn definition.
    pub(crate) world: World,
    /// Catalog tables the registry loads from.
    pub(crate) catalog: MemoryCatalog,
}

/// Reads and assembles the manifest stored at `path`.
pub(crate) fn load(path: &Path) -> Result<Scenario> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario manifest at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid scenario manifest {}", path.display()))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    version: u32,
    #[serde(default)]
    instanced_maps: Vec<MapId>,
    #[serde(default)]
    pools: Vec<PoolRow>,
    #[serde(default)]
    creatures: Vec<CandidateRow>,
    #[serde(default)]
    objects: Vec<CandidateRow>,
    #[serde(default)]
    definitions: Vec<DefinitionRow>,
    #[serde(default)]
    nested: Vec<NestedRow>,
    #[serde(default)]
    event_pools: Vec<EventPoolRow>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PoolRow {
    id: PoolId,
    max_limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CandidateRow {
    guid: EntityGuid,
    pool: PoolId,
    #[serde(default)]
    chance: f32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionRow {
    guid: EntityGuid,
    kind: EntityKind,
    entry: u32,
    #[serde(default = "default_map")]
    map: MapId,
    x: f32,
    y: f32,
    archetype: Archetype,
    #[serde(default = "default_spawned")]
    spawned_by_default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NestedRow {
    pool: PoolId,
    parent: PoolId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EventPoolRow {
    event: EventId,
    pool: PoolId,
}

const fn default_map() -> MapId {
    MapId::new(0)
}

const fn default_spawned() -> bool {
    true
}

/// Parses manifest contents into a ready-to-load scenario.
///
/// Candidate rows are passed through untouched so the registry can report
/// on them; only structural problems of the manifest itself are errors.
pub(crate) fn parse(contents: &str) -> Result<Scenario> {
    let manifest: Manifest =
        toml::from_str(contents).context("failed to parse scenario manifest toml contents")?;
    if manifest.version != SUPPORTED_MANIFEST_VERSION {
        bail!(
            "unsupported scenario manifest version {}; expected {}",
            manifest.version,
            SUPPORTED_MANIFEST_VERSION
        );
    }

    let mut world = World::new();
    for map in manifest.instanced_maps {
        world.mark_instanced(map);
    }

    let mut defined = HashSet::with_capacity(manifest.definitions.len());
    for row in manifest.definitions {
        if !defined.insert((row.kind, row.guid)) {
            bail!("manifest defines {} spawn {} twice", row.kind, row.guid);
        }
        if row.kind == EntityKind::Creature && row.archetype != Archetype::Creature {
            bail!(
                "creature spawn {} declares object archetype {}",
                row.guid,
                row.archetype
            );
        }
        world.define(
            row.guid,
            row.kind,
            Definition {
                entry: row.entry,
                map: row.map,
                position: Position::new(row.x, row.y),
                archetype: row.archetype,
                spawned_by_default: row.spawned_by_default,
            },
        );
    }

    let mut declared = HashSet::with_capacity(manifest.pools.len());
    let mut catalog = MemoryCatalog::new();
    for pool in manifest.pools {
        if !declared.insert(pool.id) {
            bail!("pool {} is declared twice", pool.id);
        }
        catalog = catalog.with_pool(pool.id, pool.max_limit);
    }
    for (kind, rows) in [
        (EntityKind::Creature, manifest.creatures),
        (EntityKind::Object, manifest.objects),
    ] {
        for row in rows {
            catalog = catalog.with_candidate(kind, row.guid, row.pool, row.chance);
        }
    }
    for link in manifest.nested {
        catalog = catalog.with_nested(link.pool, link.parent);
    }
    for gate in manifest.event_pools {
        catalog = catalog.with_event_pool(gate.event, gate.pool);
    }

    Ok(Scenario { world, catalog })
}
