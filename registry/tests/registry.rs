use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spawn_pools_core::{
    Archetype, CandidateRecord, CandidateRejection, CatalogError, CatalogReader, Definition,
    DefinitionLookup, EntityGuid, EntityKind, EventId, InstanceHandle, LiveInstances, MapId,
    PoolCapacity, PoolId, Position, SpatialWorld,
};
use spawn_pools_registry::{query, Config, PoolRegistry};
use spawn_pools_world::{self as world, GridCell, MemoryCatalog, World};

const SEED: u64 = 0x4d59_5df4_d0f3_3173;

fn guid(value: u32) -> EntityGuid {
    EntityGuid::new(value)
}

fn pool(value: u16) -> PoolId {
    PoolId::new(value)
}

fn definition(value: u32, archetype: Archetype) -> Definition {
    Definition {
        entry: 100 + value,
        map: MapId::new(0),
        position: Position::new(value as f32 * 10.0, 10.0),
        archetype,
        spawned_by_default: true,
    }
}

fn define_creatures(world: &mut World, guids: impl IntoIterator<Item = u32>) {
    for value in guids {
        world.define(
            guid(value),
            EntityKind::Creature,
            definition(value, Archetype::Creature),
        );
    }
}

fn define_chests(world: &mut World, guids: impl IntoIterator<Item = u32>) {
    for value in guids {
        world.define(guid(value), EntityKind::Object, definition(value, Archetype::Chest));
    }
}

fn loaded(catalog: &MemoryCatalog, world: &World) -> PoolRegistry {
    let mut registry = PoolRegistry::new(Config::new(SEED));
    let report = registry
        .load_from_catalog(catalog, world)
        .expect("memory catalog is readable");
    assert_eq!(report.rejected(), 0, "unexpected rejections: {report:?}");
    registry
}

#[test]
fn five_candidate_pool_keeps_three_live_across_swaps() {
    let mut world = World::new();
    define_creatures(&mut world, 1..=5);
    let mut catalog = MemoryCatalog::new().with_pool(pool(1), 3);
    for value in 1..=5 {
        catalog = catalog.with_candidate(EntityKind::Creature, guid(value), pool(1), 0.0);
    }
    let mut registry = loaded(&catalog, &world);

    let spawned_pools = registry
        .initialize(&catalog, &mut world)
        .expect("memory catalog is readable");
    assert_eq!(spawned_pools, 1);
    assert!(registry.is_initialized());
    assert_eq!(query::spawned_count(&registry, pool(1), EntityKind::Creature), 3);
    assert_eq!(world::query::live_guids(&world, EntityKind::Creature).len(), 3);

    registry.despawn_pool(pool(1), &mut world);
    assert_eq!(query::spawned_count(&registry, pool(1), EntityKind::Creature), 0);
    for value in 1..=5 {
        assert!(!registry.is_spawned_object(pool(1), guid(value), EntityKind::Creature));
    }
    assert!(world::query::live_guids(&world, EntityKind::Creature).is_empty());

    registry.spawn_pool(pool(1), false, &mut world);
    let members = query::spawned_members(&registry, pool(1), EntityKind::Creature);
    assert_eq!(members.len(), 3);

    let swapped = members[0];
    let before = world::query::placement_stats(&world);
    registry.update_pool(pool(1), swapped, EntityKind::Creature, &mut world);
    registry.spawn_pool(pool(1), true, &mut world);
    let after = world::query::placement_stats(&world);

    assert_eq!(query::spawned_count(&registry, pool(1), EntityKind::Creature), 3);
    assert_eq!(world::query::live_guids(&world, EntityKind::Creature).len(), 3);
    if registry.is_spawned_object(pool(1), swapped, EntityKind::Creature) {
        assert_eq!(after.reinserted, before.reinserted + 1, "redraw reinserts");
        assert_eq!(after.instantiated, before.instantiated);
        assert_eq!(after.removed, before.removed);
    } else {
        assert_eq!(after.removed, before.removed + 1, "old member removed");
        assert_eq!(after.instantiated, before.instantiated + 1, "new member built");
        assert!(!world::query::is_live(&world, swapped, EntityKind::Creature));
    }
}

#[test]
fn single_slot_rematch_reuses_the_live_instance() {
    let mut world = World::new();
    define_creatures(&mut world, [7]);
    let catalog = MemoryCatalog::new()
        .with_pool(pool(2), 1)
        .with_candidate(EntityKind::Creature, guid(7), pool(2), 100.0);
    let mut registry = loaded(&catalog, &world);
    let _ = registry
        .initialize(&catalog, &mut world)
        .expect("memory catalog is readable");

    registry.update_pool(pool(2), guid(7), EntityKind::Creature, &mut world);

    let stats = world::query::placement_stats(&world);
    assert_eq!(stats.instantiated, 1, "instance must not be rebuilt");
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.reinserted, 1);
    assert!(registry.is_spawned_object(pool(2), guid(7), EntityKind::Creature));
}

#[test]
fn classification_depends_on_pool_limit() {
    let mut world = World::new();
    define_creatures(&mut world, [1, 2]);
    let catalog = MemoryCatalog::new()
        .with_pool(pool(1), 1)
        .with_pool(pool(2), 5)
        .with_candidate(EntityKind::Creature, guid(1), pool(1), 50.0)
        .with_candidate(EntityKind::Creature, guid(2), pool(2), 50.0);
    let registry = loaded(&catalog, &world);

    let single = query::group(&registry, pool(1), EntityKind::Creature).expect("pool 1 exists");
    assert_eq!(single.explicit_entries().len(), 1);
    assert!(single.equal_entries().is_empty());

    let wide = query::group(&registry, pool(2), EntityKind::Creature).expect("pool 2 exists");
    assert!(wide.explicit_entries().is_empty());
    assert_eq!(wide.equal_entries().len(), 1);
}

#[test]
fn bad_rows_are_skipped_and_reported() {
    let mut world = World::new();
    define_creatures(&mut world, [1, 2, 3, 4]);
    define_chests(&mut world, [10]);
    world.define(guid(11), EntityKind::Object, definition(11, Archetype::Door));

    let catalog = MemoryCatalog::new()
        .with_pool(pool(1), 2)
        .with_pool(pool(2), 2)
        .with_candidate(EntityKind::Creature, guid(1), pool(1), 0.0)
        .with_candidate(EntityKind::Creature, guid(99), pool(1), 0.0)
        .with_candidate(EntityKind::Creature, guid(2), pool(3), 0.0)
        .with_candidate(EntityKind::Creature, guid(3), pool(1), -1.0)
        .with_candidate(EntityKind::Creature, guid(4), pool(1), 100.5)
        .with_candidate(EntityKind::Creature, guid(1), pool(2), 0.0)
        .with_candidate(EntityKind::Object, guid(10), pool(1), 0.0)
        .with_candidate(EntityKind::Object, guid(11), pool(1), 0.0);

    let mut registry = PoolRegistry::new(Config::new(SEED));
    let report = registry
        .load_from_catalog(&catalog, &world)
        .expect("memory catalog is readable");

    assert_eq!(report.pools, 2);
    assert_eq!(report.creatures.accepted, 1);
    assert_eq!(report.objects.accepted, 1);
    assert_eq!(
        report.creatures.rejected,
        vec![
            CandidateRejection::MissingDefinition {
                kind: EntityKind::Creature,
                guid: guid(99),
                pool: pool(1),
            },
            CandidateRejection::PoolOutOfRange {
                kind: EntityKind::Creature,
                guid: guid(2),
                pool: pool(3),
                max: pool(2),
            },
            CandidateRejection::InvalidChance {
                kind: EntityKind::Creature,
                guid: guid(3),
                pool: pool(1),
                chance: -1.0,
            },
            CandidateRejection::InvalidChance {
                kind: EntityKind::Creature,
                guid: guid(4),
                pool: pool(1),
                chance: 100.5,
            },
            CandidateRejection::AlreadyPooled {
                kind: EntityKind::Creature,
                guid: guid(1),
                pool: pool(2),
                owner: pool(1),
            },
        ]
    );
    assert_eq!(
        report.objects.rejected,
        vec![CandidateRejection::NotLootable {
            guid: guid(11),
            pool: pool(1),
            archetype: Archetype::Door,
        }]
    );
    assert_eq!(query::candidate_count(&registry, pool(2), EntityKind::Creature), 0);
}

#[test]
fn reverse_index_yields_a_single_owner_per_kind() {
    let mut world = World::new();
    define_creatures(&mut world, [5]);
    define_chests(&mut world, [5]);
    let catalog = MemoryCatalog::new()
        .with_pool(pool(1), 1)
        .with_pool(pool(2), 1)
        .with_candidate(EntityKind::Creature, guid(5), pool(1), 0.0)
        .with_candidate(EntityKind::Creature, guid(5), pool(2), 0.0)
        .with_candidate(EntityKind::Object, guid(5), pool(2), 0.0);

    let mut registry = PoolRegistry::new(Config::new(SEED));
    let report = registry
        .load_from_catalog(&catalog, &world)
        .expect("memory catalog is readable");

    assert_eq!(report.rejected(), 1);
    assert_eq!(
        registry.is_part_of_a_pool(guid(5), EntityKind::Creature),
        Some(pool(1))
    );
    assert_eq!(
        registry.is_part_of_a_pool(guid(5), EntityKind::Object),
        Some(pool(2))
    );
    assert_eq!(registry.is_part_of_a_pool(guid(6), EntityKind::Creature), None);
}

#[test]
fn initialize_skips_malformed_nested_and_event_pools() {
    let mut world = World::new();
    define_creatures(&mut world, 1..=6);
    let catalog = MemoryCatalog::new()
        .with_pool(pool(1), 1)
        .with_pool(pool(2), 1)
        .with_pool(pool(3), 1)
        .with_pool(pool(4), 1)
        .with_candidate(EntityKind::Creature, guid(1), pool(1), 30.0)
        .with_candidate(EntityKind::Creature, guid(2), pool(1), 70.0)
        .with_candidate(EntityKind::Creature, guid(3), pool(2), 30.0)
        .with_candidate(EntityKind::Creature, guid(4), pool(2), 69.0)
        .with_candidate(EntityKind::Creature, guid(5), pool(3), 0.0)
        .with_candidate(EntityKind::Creature, guid(6), pool(4), 0.0)
        .with_nested(pool(3), pool(1))
        .with_event_pool(EventId::new(12), pool(4));
    let mut registry = loaded(&catalog, &world);

    assert!(registry.check_pool(pool(1)));
    assert!(!registry.check_pool(pool(2)));

    let spawned = registry
        .initialize(&catalog, &mut world)
        .expect("memory catalog is readable");
    assert_eq!(spawned, 1);
    assert_eq!(query::spawned_count(&registry, pool(1), EntityKind::Creature), 1);
    for idle in [2, 3, 4] {
        assert_eq!(query::spawned_count(&registry, pool(idle), EntityKind::Creature), 0);
    }

    registry.spawn_pool(pool(3), false, &mut world);
    assert!(registry.is_spawned_object(pool(3), guid(5), EntityKind::Creature));
}

#[test]
fn out_of_range_pools_degrade_to_defaults() {
    let mut world = World::new();
    define_creatures(&mut world, [1]);
    let catalog = MemoryCatalog::new()
        .with_pool(pool(1), 1)
        .with_candidate(EntityKind::Creature, guid(1), pool(1), 0.0);
    let mut registry = loaded(&catalog, &world);

    registry.spawn_pool(pool(40), false, &mut world);
    registry.despawn_pool(pool(40), &mut world);
    registry.update_pool(pool(40), guid(1), EntityKind::Creature, &mut world);

    assert_eq!(registry.max_pool_id(), Some(pool(1)));
    assert!(!registry.check_pool(pool(40)));
    assert!(!registry.is_spawned_object(pool(40), guid(1), EntityKind::Creature));
    assert_eq!(query::max_limit(&registry, pool(40)), None);
    assert_eq!(world::query::placement_stats(&world).instantiated, 0);
}

#[test]
fn empty_capacity_table_loads_nothing() {
    let mut world = World::new();
    define_creatures(&mut world, [1]);
    let catalog =
        MemoryCatalog::new().with_candidate(EntityKind::Creature, guid(1), pool(0), 0.0);

    let mut registry = PoolRegistry::new(Config::new(SEED));
    let report = registry
        .load_from_catalog(&catalog, &world)
        .expect("memory catalog is readable");
    assert_eq!(report.pools, 0);
    assert_eq!(registry.max_pool_id(), None);
    assert_eq!(registry.is_part_of_a_pool(guid(1), EntityKind::Creature), None);
    assert_eq!(registry.initialize(&catalog, &mut world).ok(), Some(0));
}

#[test]
fn objects_outside_default_spawn_or_loaded_cells_stay_on_the_grid() {
    let mut world = World::new();
    let mut hidden = definition(1, Archetype::ResourceNode);
    hidden.spawned_by_default = false;
    world.define(guid(1), EntityKind::Object, hidden);
    define_chests(&mut world, [2]);
    let far_cell = GridCell::containing(definition(2, Archetype::Chest).position);
    world.unload_cell(MapId::new(0), far_cell);

    let catalog = MemoryCatalog::new()
        .with_pool(pool(1), 5)
        .with_candidate(EntityKind::Object, guid(1), pool(1), 0.0)
        .with_candidate(EntityKind::Object, guid(2), pool(1), 0.0);
    let mut registry = loaded(&catalog, &world);
    let _ = registry
        .initialize(&catalog, &mut world)
        .expect("memory catalog is readable");

    for value in [1, 2] {
        assert!(registry.is_spawned_object(pool(1), guid(value), EntityKind::Object));
        assert!(world::query::is_on_grid(&world, guid(value), EntityKind::Object));
    }
    assert!(world::query::live_guids(&world, EntityKind::Object).is_empty());

    let _ = world.load_cell(MapId::new(0), far_cell);
    assert_eq!(
        world::query::live_guids(&world, EntityKind::Object),
        vec![guid(2)],
        "only the default-spawned chest materializes"
    );
}

#[test]
fn live_instances_track_pool_state_under_random_events() {
    let mut world = World::new();
    define_creatures(&mut world, 1..=12);
    define_chests(&mut world, 20..=23);

    let layout: [(u16, u32, EntityKind, Vec<(u32, f32)>); 4] = [
        (1, 3, EntityKind::Creature, (1..=7).map(|value| (value, 0.0)).collect()),
        (2, 1, EntityKind::Creature, vec![(8, 40.0), (9, 60.0), (10, 0.0)]),
        (3, 4, EntityKind::Creature, vec![(11, 0.0), (12, 0.0)]),
        (4, 2, EntityKind::Object, (20..=23).map(|value| (value, 0.0)).collect()),
    ];
    let mut catalog = MemoryCatalog::new();
    for (id, limit, kind, members) in &layout {
        catalog = catalog.with_pool(pool(*id), *limit);
        for (value, chance) in members {
            catalog = catalog.with_candidate(*kind, guid(*value), pool(*id), *chance);
        }
    }
    let mut registry = loaded(&catalog, &world);
    let _ = registry
        .initialize(&catalog, &mut world)
        .expect("memory catalog is readable");

    let mut rng = ChaCha8Rng::seed_from_u64(0xdead_beef);
    for _ in 0..500 {
        let (id, _, kind, members) = &layout[rng.gen_range(0..layout.len())];
        match rng.gen_range(0..5) {
            0 => registry.despawn_pool(pool(*id), &mut world),
            1 => registry.spawn_pool(pool(*id), false, &mut world),
            _ => {
                let (value, _) = members[rng.gen_range(0..members.len())];
                registry.update_pool(pool(*id), guid(value), *kind, &mut world);
            }
        }

        for (id, limit, kind, members) in &layout {
            let spawned = query::spawned_count(&registry, pool(*id), *kind);
            assert!(spawned <= *limit, "pool {id} exceeded its limit");

            let tracked: BTreeSet<EntityGuid> =
                query::spawned_members(&registry, pool(*id), *kind).into_iter().collect();
            let live: BTreeSet<EntityGuid> = members
                .iter()
                .map(|(value, _)| guid(*value))
                .filter(|member| world::query::is_live(&world, *member, *kind))
                .collect();
            assert_eq!(tracked, live, "pool {id} disagrees with the world");
            assert_eq!(tracked.len(), spawned as usize);
        }
    }
}

#[derive(Debug, Default)]
struct OrderedWorld {
    inner: World,
    placements: Vec<(EntityKind, EntityGuid)>,
}

impl DefinitionLookup for OrderedWorld {
    fn definition(&self, guid: EntityGuid, kind: EntityKind) -> Option<Definition> {
        self.inner.definition(guid, kind)
    }
}

impl SpatialWorld for OrderedWorld {
    fn add_to_grid(&mut self, guid: EntityGuid, kind: EntityKind, definition: &Definition) {
        self.inner.add_to_grid(guid, kind, definition);
    }

    fn remove_from_grid(&mut self, guid: EntityGuid, kind: EntityKind, definition: &Definition) {
        self.inner.remove_from_grid(guid, kind, definition);
    }

    fn is_in_loaded_region(&self, map: MapId, position: Position) -> bool {
        self.inner.is_in_loaded_region(map, position)
    }

    fn instantiate(
        &mut self,
        guid: EntityGuid,
        kind: EntityKind,
        definition: &Definition,
    ) -> Option<InstanceHandle> {
        self.placements.push((kind, guid));
        self.inner.instantiate(guid, kind, definition)
    }

    fn remove_from_world(&mut self, handle: InstanceHandle) {
        self.inner.remove_from_world(handle);
    }

    fn reinsert(&mut self, handle: InstanceHandle) {
        self.inner.reinsert(handle);
    }
}

impl LiveInstances for OrderedWorld {
    fn find_live(&self, guid: EntityGuid, kind: EntityKind) -> Option<InstanceHandle> {
        self.inner.find_live(guid, kind)
    }
}

#[test]
fn spawn_pool_places_objects_before_creatures() {
    let mut world = OrderedWorld::default();
    define_creatures(&mut world.inner, [1, 2]);
    define_chests(&mut world.inner, [10, 11]);
    let catalog = MemoryCatalog::new()
        .with_pool(pool(1), 2)
        .with_candidate(EntityKind::Creature, guid(1), pool(1), 0.0)
        .with_candidate(EntityKind::Creature, guid(2), pool(1), 0.0)
        .with_candidate(EntityKind::Object, guid(10), pool(1), 0.0)
        .with_candidate(EntityKind::Object, guid(11), pool(1), 0.0);
    let mut registry = loaded(&catalog, &world.inner);

    registry.spawn_pool(pool(1), false, &mut world);

    let kinds: Vec<EntityKind> = world.placements.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Object,
            EntityKind::Object,
            EntityKind::Creature,
            EntityKind::Creature
        ],
        "objects are placed before creatures"
    );
}

#[test]
fn equal_seeds_replay_identical_selections() {
    let selections = |seed: u64| {
        let mut world = World::new();
        define_creatures(&mut world, 1..=8);
        let mut catalog = MemoryCatalog::new().with_pool(pool(1), 3);
        for value in 1..=8 {
            catalog = catalog.with_candidate(EntityKind::Creature, guid(value), pool(1), 0.0);
        }
        let mut registry = PoolRegistry::new(Config::new(seed));
        let _ = registry
            .load_from_catalog(&catalog, &world)
            .expect("memory catalog is readable");

        let mut rounds = Vec::new();
        for _ in 0..10 {
            registry.spawn_pool(pool(1), false, &mut world);
            rounds.push(query::spawned_members(&registry, pool(1), EntityKind::Creature));
            registry.despawn_pool(pool(1), &mut world);
        }
        rounds
    };

    assert_eq!(selections(SEED), selections(SEED), "same seed, same draws");
}

#[test]
fn largest_pool_id_gets_a_slot() {
    let mut world = World::new();
    define_creatures(&mut world, [1]);
    let catalog = MemoryCatalog::new()
        .with_pool(pool(u16::MAX), 1)
        .with_candidate(EntityKind::Creature, guid(1), pool(u16::MAX), 0.0);
    let mut registry = loaded(&catalog, &world);

    assert_eq!(registry.max_pool_id(), Some(pool(u16::MAX)));
    assert_eq!(query::max_limit(&registry, pool(u16::MAX)), Some(1));
    assert_eq!(query::max_limit(&registry, pool(7)), Some(0), "gaps get an inert row");

    registry.spawn_pool(pool(u16::MAX), false, &mut world);
    assert!(registry.is_spawned_object(pool(u16::MAX), guid(1), EntityKind::Creature));
}

#[derive(Debug)]
struct BrokenCatalog;

impl CatalogReader for BrokenCatalog {
    fn pool_capacities(&self) -> Result<Vec<PoolCapacity>, CatalogError> {
        Ok(vec![PoolCapacity::new(pool(1), 1)])
    }

    fn candidates(&self, _kind: EntityKind) -> Result<Vec<CandidateRecord>, CatalogError> {
        Err(CatalogError::Unavailable {
            table: "pool_candidates",
            reason: "connection reset".to_owned(),
        })
    }

    fn independent_pools(&self) -> Result<Vec<PoolId>, CatalogError> {
        Ok(Vec::new())
    }
}

#[test]
fn unreadable_catalog_fails_the_load() {
    let world = World::new();
    let mut registry = PoolRegistry::new(Config::new(SEED));

    let error = registry
        .load_from_catalog(&BrokenCatalog, &world)
        .expect_err("candidate table is unreadable");
    assert!(error.to_string().contains("pool_candidates"));
}
