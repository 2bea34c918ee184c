//! System trait and per-frame context

use super::{Component, EcsError, HierarchyError, SerialMarker, World};
use crate::foundation::time::FrameTime;
use crate::input::InputSnapshot;
use crate::physics::PhysicsError;
use crate::render::{RenderError, SceneAssembly, SceneError};
use std::any::{type_name, TypeId};
use std::sync::Arc;

/// Component type identifier for conflict detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    /// Identifier of the component type `T`
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Rust type name, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Component types a system reads and writes
///
/// The scheduler never runs two systems of the same phase concurrently when
/// one writes a type the other reads or writes. Declaring mutable access to
/// [`SerialMarker`] (via [`SystemAccess::serial`]) additionally chains the
/// system behind every other serial system of its phase, in registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct SystemAccess {
    reads: Vec<ComponentType>,
    writes: Vec<ComponentType>,
}

impl SystemAccess {
    /// Empty access set
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare shared access to `T`
    pub fn reads<T: Component>(mut self) -> Self {
        let ty = ComponentType::of::<T>();
        if !self.reads.contains(&ty) {
            self.reads.push(ty);
        }
        self
    }

    /// Declare exclusive access to `T`
    pub fn writes<T: Component>(mut self) -> Self {
        let ty = ComponentType::of::<T>();
        if !self.writes.contains(&ty) {
            self.writes.push(ty);
        }
        self
    }

    /// Take the forced-serial marker mutably
    pub fn serial(self) -> Self {
        self.writes::<SerialMarker>()
    }

    /// Whether the system holds the forced-serial marker
    pub fn is_serial(&self) -> bool {
        self.writes.contains(&ComponentType::of::<SerialMarker>())
    }

    /// Declared read set
    pub fn read_set(&self) -> &[ComponentType] {
        &self.reads
    }

    /// Declared write set
    pub fn write_set(&self) -> &[ComponentType] {
        &self.writes
    }

    /// Whether two systems must not run at the same time
    pub fn conflicts_with(&self, other: &SystemAccess) -> bool {
        self.writes
            .iter()
            .any(|ty| other.writes.contains(ty) || other.reads.contains(ty))
            || other.writes.iter().any(|ty| self.reads.contains(ty))
    }

    /// Union of both access sets
    pub fn merge(&mut self, other: &SystemAccess) {
        for ty in &other.reads {
            if !self.reads.contains(ty) {
                self.reads.push(*ty);
            }
        }
        for ty in &other.writes {
            if !self.writes.contains(ty) {
                self.writes.push(*ty);
            }
        }
    }
}

/// Errors a system can report
///
/// Any error aborts the remainder of the frame.
#[derive(thiserror::Error, Debug)]
pub enum SystemError {
    /// ECS lookup failed
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// Transform hierarchy is malformed
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Physics bridge failure
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// Scene assembly authoring error
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Draw submission failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Anything else
    #[error("{0}")]
    Failed(String),
}

/// Everything a system may touch during one frame
///
/// Built by the engine once per frame after the clock tick and the input
/// snapshot; it replaces process-wide singletons such as the current camera,
/// the light accumulation state or the frame time.
#[derive(Clone)]
pub struct FrameContext {
    /// Entities and components
    pub world: Arc<World>,
    /// Per-frame render submission buffers and the persistent sprite registry
    pub scene: Arc<SceneAssembly>,
    /// Timing for this frame
    pub time: FrameTime,
    /// Input state polled for this frame
    pub input: InputSnapshot,
    /// Monotonic frame counter
    pub frame_index: u64,
}

impl FrameContext {
    /// Create a frame context
    pub fn new(world: Arc<World>, scene: Arc<SceneAssembly>, time: FrameTime, input: InputSnapshot) -> Self {
        Self {
            world,
            scene,
            frame_index: time.frame_count,
            time,
            input,
        }
    }

    /// Scaled frame delta in seconds
    pub fn delta(&self) -> f32 {
        self.time.delta
    }
}

/// Per-frame logic operating on components
pub trait System: Send {
    /// Name used in logs and error reports
    fn name(&self) -> &str;

    /// Component types this system touches
    fn access(&self) -> SystemAccess;

    /// Execute the system
    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError>;
}

/// Adapter turning a closure into a [`System`]
pub struct FnSystem<F> {
    name: String,
    access: SystemAccess,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&FrameContext) -> Result<(), SystemError> + Send,
{
    /// Wrap a closure with a name and access set
    pub fn new(name: impl Into<String>, access: SystemAccess, func: F) -> Self {
        Self {
            name: name.into(),
            access,
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&FrameContext) -> Result<(), SystemError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> SystemAccess {
        self.access.clone()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        (self.func)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    impl Component for A {}
    struct B;
    impl Component for B {}

    #[test]
    fn test_readers_do_not_conflict() {
        let first = SystemAccess::new().reads::<A>();
        let second = SystemAccess::new().reads::<A>().reads::<B>();
        assert!(!first.conflicts_with(&second));
    }

    #[test]
    fn test_write_conflicts_with_read_and_write() {
        let writer = SystemAccess::new().writes::<A>();
        let reader = SystemAccess::new().reads::<A>();
        let other_writer = SystemAccess::new().writes::<A>();
        let unrelated = SystemAccess::new().writes::<B>();

        assert!(writer.conflicts_with(&reader));
        assert!(reader.conflicts_with(&writer));
        assert!(writer.conflicts_with(&other_writer));
        assert!(!writer.conflicts_with(&unrelated));
    }

    #[test]
    fn test_serial_systems_conflict() {
        let first = SystemAccess::new().serial();
        let second = SystemAccess::new().reads::<A>().serial();

        assert!(first.is_serial());
        assert!(first.conflicts_with(&second));
    }
}
