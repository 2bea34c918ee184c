//! Transform hierarchy resolution
//!
//! World transforms are never cached: they are recomputed on demand by
//! folding `parent.local * child.local` up the chain of weak parent
//! references. Changing a parent therefore moves every descendant on the next
//! read, and changing a child never affects its parent.
//!
//! Only rigid transforms participate. Scale is applied at render submission
//! time, so inversion can use the rotation conjugate and stays exact.
//!
//! The same operations serve the 3D [`TransformComponent`] and the 2D
//! [`Transform2DComponent`] through [`HierarchyNode`].

use super::components::{Transform2DComponent, TransformComponent};
use super::{Component, ComponentStorage, Entity};
use crate::foundation::math::{Transform, Transform2D};
use std::collections::HashSet;

/// Longest parent chain accepted before the chain is assumed to be cyclic
pub const MAX_HIERARCHY_DEPTH: usize = 1024;

/// Hierarchy errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// The entity has no transform
    #[error("{0} has no transform")]
    MissingEntity(Entity),

    /// A parent reference points at an entity without a transform
    #[error("{child} references missing parent {parent}")]
    MissingParent {
        /// Entity holding the dangling reference
        child: Entity,
        /// The referenced parent
        parent: Entity,
    },

    /// The parent chain loops back on itself
    #[error("parent chain of {0} is cyclic")]
    Cycle(Entity),
}

/// A rigid transform that can be composed and inverted
pub trait RigidTransform: Copy {
    /// Identity transform
    fn identity() -> Self;

    /// `self * child`
    fn compose(&self, child: &Self) -> Self;

    /// `self⁻¹ * other`
    fn inverse_compose(&self, other: &Self) -> Self;
}

impl RigidTransform for Transform {
    fn identity() -> Self {
        Transform::identity()
    }

    fn compose(&self, child: &Self) -> Self {
        Transform::compose(self, child)
    }

    fn inverse_compose(&self, other: &Self) -> Self {
        Transform::inverse_compose(self, other)
    }
}

impl RigidTransform for Transform2D {
    fn identity() -> Self {
        Transform2D::identity()
    }

    fn compose(&self, child: &Self) -> Self {
        Transform2D::compose(self, child)
    }

    fn inverse_compose(&self, other: &Self) -> Self {
        Transform2D::inverse_compose(self, other)
    }
}

/// A component that is a node of a transform hierarchy
pub trait HierarchyNode: Component {
    /// Transform type of the hierarchy
    type Transform: RigidTransform;

    /// Transform relative to the parent
    fn local(&self) -> Self::Transform;

    /// Replace the transform relative to the parent
    fn set_local(&mut self, local: Self::Transform);

    /// Weak parent reference
    fn parent(&self) -> Option<Entity>;

    /// Replace the parent reference
    fn set_parent(&mut self, parent: Option<Entity>);
}

impl HierarchyNode for TransformComponent {
    type Transform = Transform;

    fn local(&self) -> Transform {
        self.local
    }

    fn set_local(&mut self, local: Transform) {
        self.local = local;
    }

    fn parent(&self) -> Option<Entity> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<Entity>) {
        self.parent = parent;
    }
}

impl HierarchyNode for Transform2DComponent {
    type Transform = Transform2D;

    fn local(&self) -> Transform2D {
        self.local
    }

    fn set_local(&mut self, local: Transform2D) {
        self.local = local;
    }

    fn parent(&self) -> Option<Entity> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<Entity>) {
        self.parent = parent;
    }
}

/// Walk the parent chain of `entity`
///
/// Returns the accumulated transform up to the first broken link, together
/// with the error describing that link. With no error the transform is the
/// full world transform.
fn walk<N: HierarchyNode>(
    storage: &ComponentStorage<N>,
    entity: Entity,
) -> (N::Transform, Option<HierarchyError>) {
    let Some(node) = storage.get(entity) else {
        return (N::Transform::identity(), Some(HierarchyError::MissingEntity(entity)));
    };

    let mut world = node.local();
    let mut current = entity;
    let mut parent = node.parent();
    let mut depth = 0;
    // Release builds rely on the depth cap alone
    let mut visited = cfg!(debug_assertions).then(|| HashSet::from([entity]));

    while let Some(parent_entity) = parent {
        depth += 1;
        let revisited = visited.as_mut().is_some_and(|set| !set.insert(parent_entity));
        if revisited || depth > MAX_HIERARCHY_DEPTH {
            return (world, Some(HierarchyError::Cycle(entity)));
        }

        let Some(parent_node) = storage.get(parent_entity) else {
            return (
                world,
                Some(HierarchyError::MissingParent {
                    child: current,
                    parent: parent_entity,
                }),
            );
        };

        world = parent_node.local().compose(&world);
        current = parent_entity;
        parent = parent_node.parent();
    }

    (world, None)
}

/// Resolve the world transform of `entity`, reporting malformed hierarchies
pub fn try_calculate_world_transform<N: HierarchyNode>(
    storage: &ComponentStorage<N>,
    entity: Entity,
) -> Result<N::Transform, HierarchyError> {
    match walk(storage, entity) {
        (world, None) => Ok(world),
        (_, Some(error)) => Err(error),
    }
}

/// Resolve the world transform of `entity`
///
/// A malformed hierarchy is an authoring error: it asserts in debug builds.
/// In release builds the broken link is treated as a root (a missing entity
/// resolves to identity) and the error is logged.
pub fn calculate_world_transform<N: HierarchyNode>(
    storage: &ComponentStorage<N>,
    entity: Entity,
) -> N::Transform {
    let (world, error) = walk(storage, entity);
    if let Some(error) = error {
        log::error!("bad transform hierarchy: {error}");
        debug_assert!(false, "bad transform hierarchy: {error}");
    }
    world
}

/// Set the local transform of `entity` so its world transform becomes `world`
///
/// The parent is left untouched: `local = parentWorld⁻¹ * world`.
pub fn set_local_from_world<N: HierarchyNode>(
    storage: &mut ComponentStorage<N>,
    entity: Entity,
    world: N::Transform,
) -> Result<(), HierarchyError> {
    let parent = storage
        .get(entity)
        .ok_or(HierarchyError::MissingEntity(entity))?
        .parent();

    let local = match parent {
        Some(parent) => {
            let parent_world = try_calculate_world_transform(storage, parent).map_err(|error| match error {
                HierarchyError::MissingEntity(_) => HierarchyError::MissingParent { child: entity, parent },
                other => other,
            })?;
            parent_world.inverse_compose(&world)
        }
        None => world,
    };

    if let Some(node) = storage.get_mut(entity) {
        node.set_local(local);
    }
    Ok(())
}

/// Bake the world transform into the local transform and clear the parent
///
/// Detaching an entity that has no parent does nothing.
pub fn detach_from_parent<N: HierarchyNode>(
    storage: &mut ComponentStorage<N>,
    entity: Entity,
) -> Result<(), HierarchyError> {
    let node = storage.get(entity).ok_or(HierarchyError::MissingEntity(entity))?;
    if node.parent().is_none() {
        return Ok(());
    }

    let world = try_calculate_world_transform(storage, entity)?;
    if let Some(node) = storage.get_mut(entity) {
        node.set_local(world);
        node.set_parent(None);
    }
    Ok(())
}

/// Re-parent `child` under `parent` (or make it a root with `None`)
///
/// With `keep_world` the child keeps its current world pose; otherwise its
/// local transform is kept and it moves with the new parent. Parenting an
/// entity under itself or one of its descendants is rejected.
pub fn set_parent<N: HierarchyNode>(
    storage: &mut ComponentStorage<N>,
    child: Entity,
    parent: Option<Entity>,
    keep_world: bool,
) -> Result<(), HierarchyError> {
    if !storage.contains(child) {
        return Err(HierarchyError::MissingEntity(child));
    }

    if let Some(parent) = parent {
        if !storage.contains(parent) {
            return Err(HierarchyError::MissingParent { child, parent });
        }
        if is_ancestor_or_self(storage, child, parent)? {
            return Err(HierarchyError::Cycle(child));
        }
    }

    let world = if keep_world {
        Some(try_calculate_world_transform(storage, child)?)
    } else {
        None
    };

    if let Some(node) = storage.get_mut(child) {
        node.set_parent(parent);
    }

    match world {
        Some(world) => set_local_from_world(storage, child, world),
        None => Ok(()),
    }
}

/// Whether `ancestor` is `entity` or appears on its parent chain
pub fn is_ancestor_or_self<N: HierarchyNode>(
    storage: &ComponentStorage<N>,
    ancestor: Entity,
    entity: Entity,
) -> Result<bool, HierarchyError> {
    let mut current = Some(entity);
    let mut depth = 0;
    while let Some(node_entity) = current {
        if node_entity == ancestor {
            return Ok(true);
        }
        depth += 1;
        if depth > MAX_HIERARCHY_DEPTH {
            return Err(HierarchyError::Cycle(entity));
        }
        current = storage.get(node_entity).and_then(|node| node.parent());
    }
    Ok(false)
}

/// Direct children of `parent`
pub fn children_of<N: HierarchyNode>(storage: &ComponentStorage<N>, parent: Entity) -> Vec<Entity> {
    storage
        .iter()
        .filter(|(_, node)| node.parent() == Some(parent))
        .map(|(entity, _)| entity)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{constants::HALF_PI, Quat, Vec2, Vec3};
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_transform(rng: &mut ChaCha8Rng) -> Transform {
        Transform::from_rotation_translation(
            Quat::from_euler_angles(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0)),
            Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)),
        )
    }

    fn chain(storage: &mut ComponentStorage<TransformComponent>, locals: &[Transform]) -> Vec<Entity> {
        let mut entities = Vec::new();
        for (i, local) in locals.iter().enumerate() {
            let entity = Entity::from_raw(i as u32);
            let mut component = TransformComponent::new(*local);
            component.parent = entities.last().copied();
            storage.insert(entity, component);
            entities.push(entity);
        }
        entities
    }

    #[test]
    fn test_world_transform_is_ordered_fold() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let locals = [random_transform(&mut rng), random_transform(&mut rng), random_transform(&mut rng)];
            let mut storage = ComponentStorage::new();
            let entities = chain(&mut storage, &locals);

            let expected = locals[0] * locals[1] * locals[2];
            let world = try_calculate_world_transform(&storage, entities[2]).unwrap();

            assert!(world.is_close(&expected, 1e-4));
        }
    }

    #[test]
    fn test_parent_change_moves_child() {
        let mut storage = ComponentStorage::new();
        let entities = chain(
            &mut storage,
            &[Transform::identity(), Transform::from_translation(Vec3::new(0.0, 0.0, 1.0))],
        );

        storage.get_mut(entities[0]).unwrap().local = Transform::from_rotation_translation(
            Quat::from_axis_angle(&Vec3::y_axis(), HALF_PI),
            Vec3::new(1.0, 0.0, 0.0),
        );

        let world = calculate_world_transform(&storage, entities[1]);
        assert_relative_eq!(world.translation, Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(storage.get(entities[0]).unwrap().local.translation, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_detach_preserves_world_and_is_idempotent() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let locals = [random_transform(&mut rng), random_transform(&mut rng), random_transform(&mut rng)];
        let mut storage = ComponentStorage::new();
        let entities = chain(&mut storage, &locals);

        let before = calculate_world_transform(&storage, entities[2]);
        detach_from_parent(&mut storage, entities[2]).unwrap();
        let after = calculate_world_transform(&storage, entities[2]);

        assert!(before.is_close(&after, 1e-4));
        assert_eq!(storage.get(entities[2]).unwrap().parent, None);
        assert_eq!(storage.get(entities[2]).unwrap().local, after);

        let snapshot = *storage.get(entities[2]).unwrap();
        detach_from_parent(&mut storage, entities[2]).unwrap();
        assert_eq!(*storage.get(entities[2]).unwrap(), snapshot);
    }

    #[test]
    fn test_set_local_from_world_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        for _ in 0..20 {
            let locals = [random_transform(&mut rng), random_transform(&mut rng), random_transform(&mut rng)];
            let target = random_transform(&mut rng);
            let mut storage = ComponentStorage::new();
            let entities = chain(&mut storage, &locals);

            set_local_from_world(&mut storage, entities[2], target).unwrap();

            let world = calculate_world_transform(&storage, entities[2]);
            assert!(world.is_close(&target, 1e-4));
            assert_eq!(storage.get(entities[2]).unwrap().parent, Some(entities[1]));
        }
    }

    #[test]
    fn test_missing_parent_is_reported() {
        let mut storage = ComponentStorage::new();
        let child = Entity::from_raw(1);
        let ghost = Entity::from_raw(99);
        storage.insert(child, TransformComponent::from_position(Vec3::x()).with_parent(ghost));

        assert_eq!(
            try_calculate_world_transform(&storage, child),
            Err(HierarchyError::MissingParent { child, parent: ghost })
        );
        assert_eq!(
            try_calculate_world_transform(&storage, ghost),
            Err(HierarchyError::MissingEntity(ghost))
        );
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut storage = ComponentStorage::new();
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        storage.insert(a, TransformComponent::identity().with_parent(b));
        storage.insert(b, TransformComponent::identity().with_parent(a));

        assert_eq!(try_calculate_world_transform(&storage, a), Err(HierarchyError::Cycle(a)));
    }

    #[test]
    fn test_set_parent_rejects_descendant() {
        let mut storage = ComponentStorage::new();
        let entities = chain(&mut storage, &[Transform::identity(), Transform::identity()]);

        let result = set_parent(&mut storage, entities[0], Some(entities[1]), true);

        assert_eq!(result, Err(HierarchyError::Cycle(entities[0])));
        assert_eq!(storage.get(entities[0]).unwrap().parent, None);
    }

    #[test]
    fn test_set_parent_keep_world() {
        let mut storage = ComponentStorage::new();
        let parent = Entity::from_raw(1);
        let child = Entity::from_raw(2);
        storage.insert(parent, TransformComponent::from_position(Vec3::new(3.0, 0.0, 0.0)));
        storage.insert(child, TransformComponent::from_position(Vec3::new(5.0, 1.0, 0.0)));

        set_parent(&mut storage, child, Some(parent), true).unwrap();

        assert_relative_eq!(storage.get(child).unwrap().local.translation, Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(children_of(&storage, parent), vec![child]);
    }

    #[test]
    fn test_2d_hierarchy_round_trip() {
        let mut storage = ComponentStorage::new();
        let parent = Entity::from_raw(1);
        let child = Entity::from_raw(2);
        storage.insert(parent, Transform2DComponent::new(Transform2D::new(0.5, Vec2::new(4.0, 2.0))));
        storage.insert(child, Transform2DComponent::from_position(Vec2::new(1.0, 0.0)).with_parent(parent));

        let target = Transform2D::new(-1.2, Vec2::new(-3.0, 7.0));
        set_local_from_world(&mut storage, child, target).unwrap();

        assert!(calculate_world_transform(&storage, child).is_close(&target, 1e-4));

        detach_from_parent(&mut storage, child).unwrap();
        assert!(storage.get(child).unwrap().local.is_close(&target, 1e-4));
    }
}
