//! Catalog loading and candidate validation.

use std::collections::hash_map::Entry;

use log::{error, info};
use spawn_pools_core::{
    CandidateRecord, CandidateRejection, CatalogError, CatalogReader, DefinitionLookup, EntityKind,
    PoolCapacity, PoolId, MAX_CHANCE, MIN_CHANCE,
};
use spawn_pools_system_selection::SelectionGroup;

use crate::PoolRegistry;

/// Outcome of loading one entity kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KindReport {
    /// Candidates that joined a pool.
    pub accepted: usize,
    /// Candidates skipped, in catalog order.
    pub rejected: Vec<CandidateRejection>,
}

/// Outcome of [`PoolRegistry::load_from_catalog`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    /// Number of capacity rows read.
    pub pools: usize,
    /// Creature candidates.
    pub creatures: KindReport,
    /// Object candidates.
    pub objects: KindReport,
}

impl LoadReport {
    /// Total number of skipped candidate rows.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.creatures.rejected.len() + self.objects.rejected.len()
    }
}

impl PoolRegistry {
    /// Rebuilds every pool from the persistent catalog.
    ///
    /// Bad candidate rows are logged and skipped; only a catalog that cannot
    /// be read at all yields an error. An empty capacity table leaves the
    /// registry without pools.
    pub fn load_from_catalog<C, D>(
        &mut self,
        catalog: &C,
        definitions: &D,
    ) -> Result<LoadReport, CatalogError>
    where
        C: CatalogReader + ?Sized,
        D: DefinitionLookup + ?Sized,
    {
        self.clear();

        let capacities = catalog.pool_capacities()?;
        let Some(max_pool_id) = capacities.iter().map(|capacity| capacity.pool).max() else {
            info!("pool capacity table is empty, no pools loaded");
            return Ok(LoadReport::default());
        };

        self.capacities = (0..=max_pool_id.get())
            .map(|id| PoolCapacity::new(PoolId::new(id), 0))
            .collect();
        let slots = self.capacities.len();
        for capacity in &capacities {
            self.capacities[capacity.pool.index()] = *capacity;
        }
        self.creature_groups = vec![SelectionGroup::new(); slots];
        self.object_groups = vec![SelectionGroup::new(); slots];
        info!("loaded {} pools (max pool id {max_pool_id})", capacities.len());

        let mut report = LoadReport {
            pools: capacities.len(),
            ..LoadReport::default()
        };
        for kind in [EntityKind::Creature, EntityKind::Object] {
            let rows = catalog.candidates(kind)?;
            let kind_report = match kind {
                EntityKind::Creature => &mut report.creatures,
                EntityKind::Object => &mut report.objects,
            };
            for row in rows {
                match self.admit(kind, row, definitions) {
                    Ok(()) => kind_report.accepted += 1,
                    Err(rejection) => {
                        error!("pool candidate skipped: {rejection}");
                        kind_report.rejected.push(rejection);
                    }
                }
            }
            info!("loaded {} {kind}s in pools", kind_report.accepted);
        }

        Ok(report)
    }

    fn admit<D>(
        &mut self,
        kind: EntityKind,
        row: CandidateRecord,
        definitions: &D,
    ) -> Result<(), CandidateRejection>
    where
        D: DefinitionLookup + ?Sized,
    {
        let CandidateRecord { guid, pool, chance } = row;

        let Some(definition) = definitions.definition(guid, kind) else {
            return Err(CandidateRejection::MissingDefinition { kind, guid, pool });
        };
        if kind == EntityKind::Object && !definition.archetype.is_lootable() {
            return Err(CandidateRejection::NotLootable {
                guid,
                pool,
                archetype: definition.archetype,
            });
        }
        if !self.contains(pool) {
            return Err(CandidateRejection::PoolOutOfRange {
                kind,
                guid,
                pool,
                max: self.max_pool_id().unwrap_or_default(),
            });
        }
        if !(MIN_CHANCE..=MAX_CHANCE).contains(&chance) {
            return Err(CandidateRejection::InvalidChance {
                kind,
                guid,
                pool,
                chance,
            });
        }

        match self.index_mut(kind).entry(guid) {
            Entry::Occupied(owner) => {
                return Err(CandidateRejection::AlreadyPooled {
                    kind,
                    guid,
                    pool,
                    owner: *owner.get(),
                });
            }
            Entry::Vacant(slot) => {
                let _ = slot.insert(pool);
            }
        }

        let max_limit = self.capacities[pool.index()].max_limit;
        self.groups_mut(kind)[pool.index()].add_entry(guid, chance, max_limit);
        Ok(())
    }
}
