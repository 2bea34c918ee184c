//! Component trait

/// Marker trait for components
///
/// Both per-entity components and global components (resources) implement
/// this trait. Components are shared with worker threads, hence the bounds.
pub trait Component: 'static + Send + Sync {}

/// The forced-serial global component
///
/// A system that declares mutable access to this marker (see
/// [`SystemAccess::serial`](super::SystemAccess::serial)) never runs at the
/// same time as another such system in the same phase, and serial systems run
/// in registration order. GPU submission relies on it because the draw API is
/// not thread-safe.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialMarker;

impl Component for SerialMarker {}
