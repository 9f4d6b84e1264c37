//! Scene boundary
//!
//! The scene graph owns surfaces and tells interested parties when they come
//! and go. The delivery subsystem only needs a surface's identity and its
//! input channel.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::channel::InputChannel;

/// Stable identity of a scene surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Wrap a raw surface id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// A surface as seen by input delivery
pub trait Surface: Send + Sync {
    /// Stable identity
    fn id(&self) -> SurfaceId;

    /// Human readable name, used in logs
    fn name(&self) -> String;

    /// Input channel, if the surface accepts input
    fn input_channel(&self) -> Option<Arc<dyn InputChannel>>;
}

/// Receives scene lifecycle notifications
///
/// Each transition is notified exactly once. Calls may arrive on any thread.
pub trait SceneObserver: Send + Sync {
    /// A surface was added to the scene
    fn surface_added(&self, surface: &dyn Surface);

    /// A surface was removed from the scene
    fn surface_removed(&self, surface: &dyn Surface);

    /// Replayed for every surface already in the scene when the observer is attached
    fn surface_exists(&self, surface: &dyn Surface);

    /// Something about the scene changed that does not add or remove surfaces
    fn scene_changed(&self);
}

/// A scene that can be observed
pub trait Scene: Send + Sync {
    /// Attach an observer; existing surfaces are replayed through `surface_exists`
    fn add_observer(&self, observer: Arc<dyn SceneObserver>);

    /// Detach a previously attached observer
    fn remove_observer(&self, observer: &Arc<dyn SceneObserver>);
}
