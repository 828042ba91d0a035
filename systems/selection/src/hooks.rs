//! Kind-specific placement hooks used by [`SelectionGroup`](crate::SelectionGroup).

use log::{trace, warn};
use spawn_pools_core::{Definition, EntityGuid, EntityKind, WorldHost};

/// Placement capability a selection group drives.
pub trait SpawnHooks {
    /// Fully spawns the member; returns `false` when it cannot exist.
    fn spawn(&mut self, guid: EntityGuid) -> bool;

    /// Removes the member from the grid and destroys any live instance.
    fn despawn(&mut self, guid: EntityGuid);

    /// Puts an already constructed member back into the world.
    fn respawn(&mut self, guid: EntityGuid) -> bool;
}

/// Hooks placing creatures into a world.
#[derive(Debug)]
pub struct CreatureHooks<'w, W: ?Sized> {
    world: &'w mut W,
}

impl<'w, W: WorldHost + ?Sized> CreatureHooks<'w, W> {
    /// Wraps the world the creatures live in.
    pub fn new(world: &'w mut W) -> Self {
        Self { world }
    }
}

impl<W: WorldHost + ?Sized> SpawnHooks for CreatureHooks<'_, W> {
    fn spawn(&mut self, guid: EntityGuid) -> bool {
        let Some(definition) = resolve(self.world, guid, EntityKind::Creature) else {
            return false;
        };
        register_and_place(self.world, guid, EntityKind::Creature, &definition);
        true
    }

    fn despawn(&mut self, guid: EntityGuid) {
        remove(self.world, guid, EntityKind::Creature);
    }

    fn respawn(&mut self, guid: EntityGuid) -> bool {
        reinsert(self.world, guid, EntityKind::Creature)
    }
}

/// Hooks placing interactable objects into a world.
///
/// Objects whose definition is not spawned by default are registered with
/// the grid but no instance is built until something else activates them.
#[derive(Debug)]
pub struct ObjectHooks<'w, W: ?Sized> {
    world: &'w mut W,
}

impl<'w, W: WorldHost + ?Sized> ObjectHooks<'w, W> {
    /// Wraps the world the objects live in.
    pub fn new(world: &'w mut W) -> Self {
        Self { world }
    }
}

impl<W: WorldHost + ?Sized> SpawnHooks for ObjectHooks<'_, W> {
    fn spawn(&mut self, guid: EntityGuid) -> bool {
        let Some(definition) = resolve(self.world, guid, EntityKind::Object) else {
            return false;
        };
        if definition.spawned_by_default {
            register_and_place(self.world, guid, EntityKind::Object, &definition);
        } else {
            trace!("object {guid} is not spawned by default, grid only");
            self.world.add_to_grid(guid, EntityKind::Object, &definition);
        }
        true
    }

    fn despawn(&mut self, guid: EntityGuid) {
        remove(self.world, guid, EntityKind::Object);
    }

    fn respawn(&mut self, guid: EntityGuid) -> bool {
        reinsert(self.world, guid, EntityKind::Object)
    }
}

fn resolve<W: WorldHost + ?Sized>(world: &W, guid: EntityGuid, kind: EntityKind) -> Option<Definition> {
    let definition = world.definition(guid, kind);
    if definition.is_none() {
        warn!("{kind} spawn {guid} lost its definition, cannot place it");
    }
    definition
}

fn register_and_place<W: WorldHost + ?Sized>(
    world: &mut W,
    guid: EntityGuid,
    kind: EntityKind,
    definition: &Definition,
) {
    world.add_to_grid(guid, kind, definition);

    // Unloaded cells pick the spawn up from the grid when they load.
    if !world.is_in_loaded_region(definition.map, definition.position) {
        trace!("{kind} {guid} registered in an unloaded region");
        return;
    }
    if world.instantiate(guid, kind, definition).is_none() {
        warn!("{kind} {guid} could not be constructed");
    }
}

fn remove<W: WorldHost + ?Sized>(world: &mut W, guid: EntityGuid, kind: EntityKind) {
    let Some(definition) = world.definition(guid, kind) else {
        return;
    };
    world.remove_from_grid(guid, kind, &definition);
    if let Some(handle) = world.find_live(guid, kind) {
        world.remove_from_world(handle);
    }
}

fn reinsert<W: WorldHost + ?Sized>(world: &mut W, guid: EntityGuid, kind: EntityKind) -> bool {
    if world.definition(guid, kind).is_none() {
        return false;
    }
    if let Some(handle) = world.find_live(guid, kind) {
        world.reinsert(handle);
    }
    true
}
