//! Scene lifecycle to transfer table bridge

use std::sync::Weak;

use tracing::trace;

use super::sender::SenderState;
use super::surface::{SceneObserver, Surface};

/// Scene observer that keeps the sender's transfer table in step with the scene
///
/// Holds the sender weakly; notifications arriving after the sender is gone
/// are dropped.
pub(crate) struct SceneWatcher {
    sender: Weak<SenderState>,
}

impl SceneWatcher {
    pub(crate) fn new(sender: Weak<SenderState>) -> Self {
        Self { sender }
    }
}

impl SceneObserver for SceneWatcher {
    fn surface_added(&self, surface: &dyn Surface) {
        if let Some(sender) = self.sender.upgrade() {
            sender.surface_added(surface);
        }
    }

    fn surface_removed(&self, surface: &dyn Surface) {
        if let Some(sender) = self.sender.upgrade() {
            sender.surface_removed(surface);
        }
    }

    fn surface_exists(&self, surface: &dyn Surface) {
        self.surface_added(surface);
    }

    fn scene_changed(&self) {
        trace!("Scene changed");
    }
}
