//! Entity implementation

use std::fmt;

/// Entity identifier
///
/// An opaque, never-reused handle. Entities carry no data of their own; every
/// piece of state lives in components stored by the [`World`](super::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    id: u32,
}

impl Entity {
    /// Create a new entity with the given ID
    pub(super) fn new(id: u32) -> Self {
        Self { id }
    }

    /// Rebuild an entity handle from its raw ID
    ///
    /// The handle is not checked against any world; lookups through a
    /// fabricated handle simply miss.
    pub fn from_raw(id: u32) -> Self {
        Self { id }
    }

    /// Get the entity ID
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.id)
    }
}
