//! ECS World implementation
//!
//! The world is shared by `Arc` between the frame loop and the scheduler's
//! worker threads, so every method takes `&self`. Each component type lives in
//! its own [`ComponentStorage`] behind a `parking_lot::RwLock`; systems grab the
//! storage guards they declared in their access set and hold them for as long
//! as they iterate.
//!
//! Guards are owned (`read_arc`/`write_arc`) so they can outlive the borrow of
//! the world. Taking a write guard on a storage while already holding a guard
//! on the same storage deadlocks; structural calls (`insert`, `remove`,
//! `despawn`) take the storage lock internally.

use super::{Component, ComponentStorage, Entity};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared read guard over the storage of `T`
pub type ReadStorage<T> = ArcRwLockReadGuard<RawRwLock, ComponentStorage<T>>;

/// Exclusive write guard over the storage of `T`
pub type WriteStorage<T> = ArcRwLockWriteGuard<RawRwLock, ComponentStorage<T>>;

/// Shared read guard over a global component
pub type ResourceRef<T> = ArcRwLockReadGuard<RawRwLock, T>;

/// Exclusive write guard over a global component
pub type ResourceMut<T> = ArcRwLockWriteGuard<RawRwLock, T>;

type RemoveHook = Arc<dyn Fn(&World, Entity, &dyn Any) + Send + Sync>;

/// ECS errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity was never spawned or has been despawned
    #[error("{0} does not exist")]
    NoSuchEntity(Entity),

    /// A required component is missing
    #[error("{entity} has no {component} component")]
    MissingComponent {
        /// Entity that was queried
        entity: Entity,
        /// Type name of the missing component
        component: &'static str,
    },

    /// A required global component is missing
    #[error("global component {0} is not registered")]
    MissingResource(&'static str),
}

/// Type-erased view of a storage, used when despawning
trait ErasedStorage: Send + Sync {
    fn remove_boxed(&self, entity: Entity) -> Option<Box<dyn Any + Send>>;
}

impl<T: Component> ErasedStorage for RwLock<ComponentStorage<T>> {
    fn remove_boxed(&self, entity: Entity) -> Option<Box<dyn Any + Send>> {
        self.write()
            .remove(entity)
            .map(|value| Box::new(value) as Box<dyn Any + Send>)
    }
}

struct StorageEntry {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn ErasedStorage>,
}

/// ECS World containing all entities, components and global components
pub struct World {
    next_entity_id: AtomicU32,
    entities: RwLock<HashSet<Entity>>,
    storages: RwLock<HashMap<TypeId, StorageEntry>>,
    resources: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    remove_hooks: RwLock<HashMap<TypeId, RemoveHook>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            next_entity_id: AtomicU32::new(0),
            entities: RwLock::new(HashSet::new()),
            storages: RwLock::new(HashMap::new()),
            resources: RwLock::new(HashMap::new()),
            remove_hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new entity
    pub fn spawn(&self) -> Entity {
        let entity = Entity::new(self.next_entity_id.fetch_add(1, Ordering::Relaxed));
        self.entities.write().insert(entity);
        entity
    }

    /// Whether the entity exists
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.read().contains(&entity)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Snapshot of all live entities, sorted by id
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.entities.read().iter().copied().collect();
        entities.sort();
        entities
    }

    /// Destroy an entity, detaching every component it owns
    ///
    /// Remove hooks run for each detached component. Returns `false` if the
    /// entity was not alive.
    pub fn despawn(&self, entity: Entity) -> bool {
        if !self.entities.write().remove(&entity) {
            return false;
        }

        let storages: Vec<(TypeId, Arc<dyn ErasedStorage>)> = self
            .storages
            .read()
            .iter()
            .map(|(type_id, entry)| (*type_id, Arc::clone(&entry.erased)))
            .collect();

        for (type_id, storage) in storages {
            if let Some(value) = storage.remove_boxed(entity) {
                let hook = self.remove_hooks.read().get(&type_id).cloned();
                if let Some(hook) = hook {
                    hook(self, entity, value.as_ref());
                }
            }
        }

        log::trace!("despawned {entity}");
        true
    }

    fn storage<T: Component>(&self) -> Arc<RwLock<ComponentStorage<T>>> {
        let type_id = TypeId::of::<T>();
        let existing = self.storages.read().get(&type_id).map(|entry| Arc::clone(&entry.typed));
        let typed = match existing {
            Some(typed) => typed,
            None => {
                let mut storages = self.storages.write();
                let entry = storages.entry(type_id).or_insert_with(|| {
                    let storage = Arc::new(RwLock::new(ComponentStorage::<T>::new()));
                    StorageEntry {
                        typed: storage.clone(),
                        erased: storage,
                    }
                });
                Arc::clone(&entry.typed)
            }
        };

        match typed.downcast::<RwLock<ComponentStorage<T>>>() {
            Ok(storage) => storage,
            // Entries are keyed by the TypeId of the storage they hold
            Err(_) => unreachable!("storage for {} registered under a foreign TypeId", type_name::<T>()),
        }
    }

    /// Attach a component, replacing and returning any previous value
    pub fn insert<T: Component>(&self, entity: Entity, component: T) -> Result<Option<T>, EcsError> {
        if !self.is_alive(entity) {
            return Err(EcsError::NoSuchEntity(entity));
        }
        Ok(self.storage::<T>().write().insert(entity, component))
    }

    /// Detach a component, running its remove hook
    pub fn remove<T: Component>(&self, entity: Entity) -> Option<T> {
        let value = self.storage::<T>().write().remove(entity)?;
        let hook = self.remove_hooks.read().get(&TypeId::of::<T>()).cloned();
        if let Some(hook) = hook {
            hook(self, entity, &value);
        }
        Some(value)
    }

    /// Whether the entity has a component of type `T`
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>().read().contains(entity)
    }

    /// Clone a single component out of its storage
    pub fn get_cloned<T: Component + Clone>(&self, entity: Entity) -> Option<T> {
        self.storage::<T>().read().get(entity).cloned()
    }

    /// Clone a component or report which one is missing
    pub fn require<T: Component + Clone>(&self, entity: Entity) -> Result<T, EcsError> {
        self.get_cloned(entity).ok_or(EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        })
    }

    /// Shared access to every component of type `T`
    pub fn read<T: Component>(&self) -> ReadStorage<T> {
        self.storage::<T>().read_arc()
    }

    /// Exclusive access to every component of type `T`
    pub fn write<T: Component>(&self) -> WriteStorage<T> {
        self.storage::<T>().write_arc()
    }

    /// Register a hook invoked whenever a `T` is detached from an entity
    ///
    /// Hooks run on the thread that removed the component, after the storage
    /// lock has been released, so they may touch other components freely.
    pub fn on_remove<T, F>(&self, hook: F)
    where
        T: Component,
        F: Fn(&World, Entity, &T) + Send + Sync + 'static,
    {
        let erased: RemoveHook = Arc::new(move |world, entity, value| {
            if let Some(value) = value.downcast_ref::<T>() {
                hook(world, entity, value);
            }
        });
        self.remove_hooks.write().insert(TypeId::of::<T>(), erased);
    }

    /// Insert or replace a global component
    pub fn insert_resource<T: Component>(&self, resource: T) {
        self.resources
            .write()
            .insert(TypeId::of::<T>(), Arc::new(RwLock::new(resource)));
    }

    fn resource_lock<T: Component>(&self) -> Option<Arc<RwLock<T>>> {
        let resource = self.resources.read().get(&TypeId::of::<T>()).cloned()?;
        resource.downcast::<RwLock<T>>().ok()
    }

    /// Shared access to a global component
    pub fn resource<T: Component>(&self) -> Option<ResourceRef<T>> {
        self.resource_lock::<T>().map(|lock| lock.read_arc())
    }

    /// Exclusive access to a global component
    pub fn resource_mut<T: Component>(&self) -> Option<ResourceMut<T>> {
        self.resource_lock::<T>().map(|lock| lock.write_arc())
    }

    /// Exclusive access to a global component, or an error naming it
    pub fn require_resource_mut<T: Component>(&self) -> Result<ResourceMut<T>, EcsError> {
        self.resource_mut::<T>()
            .ok_or(EcsError::MissingResource(type_name::<T>()))
    }

    /// Whether a global component of type `T` exists
    pub fn has_resource<T: Component>(&self) -> bool {
        self.resources.read().contains_key(&TypeId::of::<T>())
    }

    /// Remove a global component
    ///
    /// Returns `None` if it does not exist or is still borrowed elsewhere.
    pub fn remove_resource<T: Component>(&self) -> Option<T> {
        let resource = self.resources.write().remove(&TypeId::of::<T>())?;
        let lock = resource.downcast::<RwLock<T>>().ok()?;
        Arc::try_unwrap(lock).ok().map(|lock| lock.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Name(&'static str);
    impl Component for Name {}

    #[test]
    fn test_entity_ids_are_never_reused() {
        let world = World::new();
        let a = world.spawn();
        assert!(world.despawn(a));
        let b = world.spawn();

        assert_ne!(a, b);
        assert!(!world.is_alive(a));
        assert!(world.is_alive(b));
    }

    #[test]
    fn test_insert_and_read() {
        let world = World::new();
        let entity = world.spawn();
        world.insert(entity, Health(10)).unwrap();

        assert_eq!(world.get_cloned::<Health>(entity), Some(Health(10)));
        assert!(world.has::<Health>(entity));
        assert!(!world.has::<Name>(entity));

        for (_, health) in world.write::<Health>().iter_mut() {
            health.0 -= 3;
        }
        assert_eq!(world.read::<Health>().get(entity), Some(&Health(7)));
    }

    #[test]
    fn test_insert_on_dead_entity_fails() {
        let world = World::new();
        let entity = world.spawn();
        world.despawn(entity);

        assert_eq!(world.insert(entity, Health(1)), Err(EcsError::NoSuchEntity(entity)));
    }

    #[test]
    fn test_despawn_detaches_components_and_runs_hooks() {
        let world = World::new();
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        world.on_remove::<Health, _>(move |_, _, health| {
            counter.fetch_add(health.0 as usize, Ordering::SeqCst);
        });

        let entity = world.spawn();
        world.insert(entity, Health(5)).unwrap();
        world.insert(entity, Name("crate")).unwrap();
        world.despawn(entity);

        assert_eq!(removed.load(Ordering::SeqCst), 5);
        assert!(world.read::<Health>().is_empty());
        assert!(world.read::<Name>().is_empty());
        assert!(!world.despawn(entity));
    }

    #[test]
    fn test_resources() {
        let world = World::new();
        assert!(world.resource::<Health>().is_none());

        world.insert_resource(Health(100));
        world.resource_mut::<Health>().unwrap().0 = 50;

        assert_eq!(world.resource::<Health>().unwrap().0, 50);
        assert_eq!(world.remove_resource::<Health>(), Some(Health(50)));
        assert!(!world.has_resource::<Health>());
    }
}
