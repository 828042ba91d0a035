#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Candidate selection for a single pool and entity kind.
//!
//! A [`SelectionGroup`] decides which of its candidates are live. Weighted
//! draws are only used for single-slot pools; larger pools draw uniformly
//! without replacement until their cap is reached. The group never touches
//! the world directly: every placement goes through a [`SpawnHooks`]
//! implementation so the same algorithm serves creatures and objects.

mod hooks;

use log::{debug, trace};
use rand::Rng;
use spawn_pools_core::{EntityGuid, MAX_CHANCE, MIN_CHANCE};

pub use hooks::{CreatureHooks, ObjectHooks, SpawnHooks};

/// One candidate member of a pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateEntry {
    guid: EntityGuid,
    chance: f32,
    spawned: bool,
}

impl CandidateEntry {
    const fn new(guid: EntityGuid, chance: f32) -> Self {
        Self {
            guid,
            chance,
            spawned: false,
        }
    }

    /// Spawn point represented by the entry.
    #[must_use]
    pub const fn guid(&self) -> EntityGuid {
        self.guid
    }

    /// Chance recorded for the entry at load time.
    #[must_use]
    pub const fn chance(&self) -> f32 {
        self.chance
    }

    /// Reports whether the entry is currently live.
    #[must_use]
    pub const fn is_spawned(&self) -> bool {
        self.spawned
    }
}

/// Candidate lists and live bookkeeping for one pool and entity kind.
#[derive(Clone, Debug, Default)]
pub struct SelectionGroup {
    explicit: Vec<CandidateEntry>,
    equal: Vec<CandidateEntry>,
    explicit_total: f32,
    spawned_count: u32,
    cached_guid: Option<EntityGuid>,
}

impl SelectionGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate, classifying it by chance and the pool's limit.
    ///
    /// Explicit weighting only makes sense when exactly one member is live,
    /// so a non-zero chance lands in the explicit list only for pools with a
    /// limit of one. Everything else is drawn with equal chance.
    pub fn add_entry(&mut self, guid: EntityGuid, chance: f32, max_limit: u32) {
        let entry = CandidateEntry::new(guid, chance);
        if chance != 0.0 && max_limit == 1 {
            self.explicit_total += chance;
            self.explicit.push(entry);
        } else {
            self.equal.push(entry);
        }
    }

    /// Reports whether the group has no candidates at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty() && self.equal.is_empty()
    }

    /// Total number of candidates across both lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.explicit.len() + self.equal.len()
    }

    /// Candidates drawn by weighted roll.
    #[must_use]
    pub fn explicit_entries(&self) -> &[CandidateEntry] {
        &self.explicit
    }

    /// Candidates drawn uniformly.
    #[must_use]
    pub fn equal_entries(&self) -> &[CandidateEntry] {
        &self.equal
    }

    /// Number of members currently live.
    #[must_use]
    pub const fn spawned_count(&self) -> u32 {
        self.spawned_count
    }

    /// Member awaiting replacement, if any.
    #[must_use]
    pub const fn cached_guid(&self) -> Option<EntityGuid> {
        self.cached_guid
    }

    /// Reports whether the chances of the group allow a pick to be made.
    ///
    /// A group is well-formed when it has equal-chance candidates, or when
    /// its explicit chances add up to exactly 0 or exactly 100. The sum is
    /// the one accumulated while loading and is compared without tolerance.
    #[must_use]
    pub fn check_pool(&self) -> bool {
        if !self.equal.is_empty() {
            return true;
        }
        self.explicit_total == MIN_CHANCE || self.explicit_total == MAX_CHANCE
    }

    /// Reports whether the spawn point is a live member of the group.
    #[must_use]
    pub fn is_spawned_object(&self, guid: EntityGuid) -> bool {
        self.entries()
            .find(|entry| entry.guid == guid)
            .is_some_and(|entry| entry.spawned)
    }

    /// Picks a single winner, weighted first and uniform as a fallback.
    ///
    /// Returns `None` when the group has no candidates.
    pub fn roll_one<R: Rng>(&self, rng: &mut R) -> Option<EntityGuid> {
        if !self.explicit.is_empty() {
            let roll = rng.gen_range(MIN_CHANCE..MAX_CHANCE);
            if let Some(winner) = self.pick_explicit(roll) {
                return Some(winner);
            }
        }

        if self.equal.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.equal.len());
        Some(self.equal[index].guid)
    }

    fn pick_explicit(&self, roll: f32) -> Option<EntityGuid> {
        let mut remaining = roll;
        for entry in &self.explicit {
            remaining -= entry.chance;
            if remaining < 0.0 {
                return Some(entry.guid);
            }
        }
        None
    }

    /// Brings the group up to its limit, swapping out the cached member when `cache` is set.
    pub fn spawn_object<H, R>(&mut self, max_limit: u32, cache: bool, hooks: &mut H, rng: &mut R)
    where
        H: SpawnHooks,
        R: Rng,
    {
        if max_limit == 0 {
            trace!("group with zero limit stays empty");
            return;
        }
        if max_limit == 1 {
            self.spawn_single(cache, hooks, rng);
            return;
        }

        let limit = usize::try_from(max_limit).unwrap_or(usize::MAX);
        if limit < self.equal.len() {
            if self.spawned_count < max_limit {
                self.fill(max_limit, cache, hooks, rng);
            }
            return;
        }
        self.spawn_all(cache, hooks);
    }

    fn spawn_single<H, R>(&mut self, cache: bool, hooks: &mut H, rng: &mut R)
    where
        H: SpawnHooks,
        R: Rng,
    {
        if self.spawned_count >= 1 {
            return;
        }
        let Some(winner) = self.roll_one(rng) else {
            debug!("no candidate available for single-slot group");
            return;
        };

        let spawned = match self.cached_guid {
            Some(cached) if cache && cached == winner => {
                debug!("respawning cached winner {winner}");
                hooks.respawn(winner)
            }
            previous => {
                if let Some(cached) = previous.filter(|_| cache) {
                    debug!("replacing {cached} with {winner}");
                    hooks.despawn(cached);
                }
                hooks.spawn(winner)
            }
        };

        if spawned {
            if let Some(entry) = self.entry_mut(winner) {
                entry.spawned = true;
            }
            self.spawned_count = 1;
        }
        self.cached_guid = spawned.then_some(winner);
    }

    fn fill<H, R>(&mut self, max_limit: u32, cache: bool, hooks: &mut H, rng: &mut R)
    where
        H: SpawnHooks,
        R: Rng,
    {
        let mut unspawned: Vec<usize> = self
            .equal
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.spawned)
            .map(|(index, _)| index)
            .collect();

        while self.spawned_count < max_limit && !unspawned.is_empty() {
            let slot = rng.gen_range(0..unspawned.len());
            let index = unspawned.swap_remove(slot);
            let guid = self.equal[index].guid;

            let spawned = if cache && self.cached_guid == Some(guid) {
                self.cached_guid = None;
                debug!("redrew cached member {guid}, respawning in place");
                hooks.respawn(guid)
            } else {
                if let Some(cached) = self.cached_guid.take().filter(|_| cache) {
                    debug!("replacing {cached} with {guid}");
                    hooks.despawn(cached);
                }
                hooks.spawn(guid)
            };

            self.equal[index].spawned = spawned;
            if spawned {
                self.spawned_count += 1;
            }
        }
        self.settle_cache(cache, hooks);
    }

    fn spawn_all<H: SpawnHooks>(&mut self, cache: bool, hooks: &mut H) {
        for entry in &mut self.equal {
            if entry.spawned {
                continue;
            }
            entry.spawned = if cache && self.cached_guid == Some(entry.guid) {
                self.cached_guid = None;
                hooks.respawn(entry.guid)
            } else {
                hooks.spawn(entry.guid)
            };
            if entry.spawned {
                self.spawned_count += 1;
            }
        }
        self.settle_cache(cache, hooks);
    }

    // A cached member left over after a pass was never redrawn; it is still
    // in the world and must go.
    fn settle_cache<H: SpawnHooks>(&mut self, cache: bool, hooks: &mut H) {
        if let Some(stale) = self.cached_guid.take() {
            if cache {
                hooks.despawn(stale);
            }
        }
    }

    /// Removes live members from the group.
    ///
    /// Without a target every live member is removed from the world. With a
    /// target the member is only marked for replacement: it stays in the
    /// world and becomes the cached member that the next caching
    /// [`spawn_object`](Self::spawn_object) call either respawns or removes.
    pub fn despawn_object<H: SpawnHooks>(&mut self, target: Option<EntityGuid>, hooks: &mut H) {
        match target {
            None => {
                let mut removed = Vec::new();
                for entry in self.explicit.iter_mut().chain(self.equal.iter_mut()) {
                    if entry.spawned {
                        hooks.despawn(entry.guid);
                        entry.spawned = false;
                        removed.push(entry.guid);
                    }
                }
                self.spawned_count = self
                    .spawned_count
                    .saturating_sub(u32::try_from(removed.len()).unwrap_or(u32::MAX));
                if let Some(pending) = self.cached_guid.take() {
                    if !removed.contains(&pending) {
                        hooks.despawn(pending);
                    }
                }
            }
            Some(guid) => {
                let mut matches = self
                    .explicit
                    .iter_mut()
                    .chain(self.equal.iter_mut())
                    .filter(|entry| entry.guid == guid);
                let found = matches.next();
                debug_assert!(
                    matches.next().is_none(),
                    "spawn {guid} appears more than once in one group"
                );

                let Some(entry) = found.filter(|entry| entry.spawned) else {
                    trace!("spawn {guid} is not live, nothing to replace");
                    return;
                };
                entry.spawned = false;
                self.cached_guid = Some(guid);
                self.spawned_count = self.spawned_count.saturating_sub(1);
            }
        }
    }

    fn entries(&self) -> impl Iterator<Item = &CandidateEntry> {
        self.explicit.iter().chain(self.equal.iter())
    }

    fn entry_mut(&mut self, guid: EntityGuid) -> Option<&mut CandidateEntry> {
        self.explicit
            .iter_mut()
            .chain(self.equal.iter_mut())
            .find(|entry| entry.guid == guid)
    }
}
