#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that loads a pool scenario and drives it.
//!
//! The binary reads a TOML manifest, loads the pool registry from it,
//! spawns every independent pool and optionally simulates a number of
//! respawn events before printing a per-pool summary.

mod manifest;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, LevelFilter};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spawn_pools_core::{EntityGuid, EntityKind, PoolId};
use spawn_pools_registry::{query, Config, PoolRegistry};
use spawn_pools_world::{self as world, MemoryCatalog, World};

use crate::manifest::Scenario;

/// Seed offset separating the churn stream from the registry's own stream.
const CHURN_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Parser)]
#[command(name = "spawn-pools", about = "Loads spawn pools and simulates respawns")]
struct Args {
    /// Path to the TOML scenario manifest.
    #[arg(long)]
    manifest: PathBuf,
    /// Seed for every random draw made by the pools.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Number of respawn events to simulate after initialization.
    #[arg(long, default_value_t = 0)]
    churn: u32,
    /// Enables debug logging.
    #[arg(long)]
    verbose: bool,
}

/// Entry point for the spawn pool command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let Scenario {
        mut world,
        catalog,
    } = manifest::load(&args.manifest)?;

    let mut registry = PoolRegistry::new(Config::new(args.seed));
    let report = registry
        .load_from_catalog(&catalog, &world)
        .context("failed to load pools from the scenario catalog")?;
    if report.rejected() > 0 {
        info!("{} candidate rows were skipped", report.rejected());
    }

    let spawned = registry
        .initialize(&catalog, &mut world)
        .context("failed to initialize pools")?;
    println!(
        "loaded {} pools ({} creatures, {} objects), spawned {spawned}",
        report.pools, report.creatures.accepted, report.objects.accepted
    );

    let applied = churn(&mut registry, &mut world, args.churn, args.seed);
    if args.churn > 0 {
        println!("applied {applied} of {} respawn events", args.churn);
    }

    print_summary(&registry, &catalog, &world);
    Ok(())
}

/// Feeds respawn events for randomly chosen live members into the registry.
///
/// Returns how many events found a live member to replace.
fn churn(registry: &mut PoolRegistry, world: &mut World, events: u32, seed: u64) -> u32 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ CHURN_STREAM);
    let pools: Vec<PoolId> = query::pools(registry).collect();

    let mut applied = 0;
    for _ in 0..events {
        let Some(&pool) = pools.choose(&mut rng) else {
            break;
        };
        let live = live_members(registry, pool);
        if live.is_empty() {
            continue;
        }

        let (kind, guid) = live[rng.gen_range(0..live.len())];
        debug!("{kind} {guid} in pool {pool} is due to respawn");
        registry.update_pool(pool, guid, kind, world);
        applied += 1;
    }
    applied
}

fn live_members(registry: &PoolRegistry, pool: PoolId) -> Vec<(EntityKind, EntityGuid)> {
    [EntityKind::Creature, EntityKind::Object]
        .into_iter()
        .flat_map(|kind| {
            query::spawned_members(registry, pool, kind)
                .into_iter()
                .map(move |guid| (kind, guid))
        })
        .collect()
}

/// Describes how a pool is activated when it is not spawned on its own.
fn activation(catalog: &MemoryCatalog, pool: PoolId) -> Option<String> {
    if let Some(link) = catalog.nested().iter().find(|link| link.pool == pool) {
        return Some(format!("nested in pool {}", link.parent));
    }
    catalog
        .event_pools()
        .iter()
        .find(|gate| gate.pool == pool)
        .map(|gate| format!("gated by event {}", gate.event.get()))
}

fn print_summary(registry: &PoolRegistry, catalog: &MemoryCatalog, world: &World) {
    for pool in query::pools(registry) {
        let limit = query::max_limit(registry, pool).unwrap_or_default();
        let mut columns = Vec::new();
        for kind in [EntityKind::Creature, EntityKind::Object] {
            let candidates = query::candidate_count(registry, pool, kind);
            if candidates == 0 {
                continue;
            }
            let live = query::spawned_count(registry, pool, kind);
            columns.push(format!("{kind}s {live}/{candidates}"));
        }
        if columns.is_empty() {
            continue;
        }
        let health = if registry.check_pool(pool) {
            ""
        } else {
            " (malformed)"
        };
        if let Some(activation) = activation(catalog, pool) {
            columns.push(activation);
        }
        println!("pool {pool}: limit {limit}, {}{health}", columns.join(", "));
    }

    let stats = world::query::placement_stats(world);
    println!(
        "world: {} instantiated, {} removed, {} reinserted",
        stats.instantiated, stats.removed, stats.reinserted
    );
}
