//! ECS Components module
//!
//! Engine-level components shared by every subsystem. Physics, lighting and
//! camera components live next to the systems that consume them.

pub mod transform;

pub use transform::{Transform2DComponent, TransformComponent};
