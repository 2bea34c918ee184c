//! Entity-Component-System implementation
//!
//! A shared [`World`] of sparse component storages, systems declaring their
//! component access, and a phased scheduler running them on a worker pool.

pub mod world;
pub mod entity;
pub mod component;
pub mod storage;
pub mod system;
pub mod scheduler;
pub mod hierarchy;
pub mod components;

pub use world::{EcsError, ReadStorage, ResourceMut, ResourceRef, World, WriteStorage};
pub use entity::Entity;
pub use component::{Component, SerialMarker};
pub use storage::ComponentStorage;
pub use system::{ComponentType, FnSystem, FrameContext, System, SystemAccess, SystemError};
pub use scheduler::{FrameReport, Phase, SchedulerError, SystemScheduler, ThreadPool};
pub use hierarchy::{HierarchyError, HierarchyNode, RigidTransform};
