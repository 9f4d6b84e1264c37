//! In-memory scene
//!
//! A minimal [`Scene`] that keeps a list of surfaces and tells observers when
//! the list changes. The binary and the integration tests use it to play the
//! part of the compositor's scene graph.
//!
//! Every mutation and its notifications happen under one notification lock,
//! so observers see adds and removes in the order they were applied, even
//! when different threads add and remove the same surface. The lock is
//! reentrant and the surface list has its own lock that is released before
//! observers run, so an observer may query or mutate the scene from its
//! callback.

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

use crate::input::{InputChannel, Scene, SceneObserver, Surface, SurfaceId};

/// Surface with a fixed name and optional input channel
pub struct BasicSurface {
    id: SurfaceId,
    name: String,
    channel: Option<Arc<dyn InputChannel>>,
}

impl BasicSurface {
    /// Create a surface
    pub fn new(id: SurfaceId, name: impl Into<String>, channel: Option<Arc<dyn InputChannel>>) -> Self {
        Self {
            id,
            name: name.into(),
            channel,
        }
    }
}

impl Surface for BasicSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn input_channel(&self) -> Option<Arc<dyn InputChannel>> {
        self.channel.clone()
    }
}

#[derive(Default)]
struct SceneInner {
    surfaces: Vec<Arc<dyn Surface>>,
    observers: Vec<Arc<dyn SceneObserver>>,
}

/// Observable list of surfaces
#[derive(Default)]
pub struct BasicScene {
    inner: Mutex<SceneInner>,
    notify: ReentrantMutex<()>,
}

impl BasicScene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a surface and notify observers
    ///
    /// Returns false if a surface with the same id is already present.
    pub fn add_surface(&self, surface: Arc<dyn Surface>) -> bool {
        let _notify = self.notify.lock();
        let observers = {
            let mut inner = self.inner.lock();
            if inner.surfaces.iter().any(|s| s.id() == surface.id()) {
                return false;
            }
            inner.surfaces.push(surface.clone());
            inner.observers.clone()
        };

        debug!(surface = %surface.id(), name = %surface.name(), "Surface added to scene");
        for observer in &observers {
            observer.surface_added(surface.as_ref());
        }
        true
    }

    /// Remove a surface and notify observers
    pub fn remove_surface(&self, id: SurfaceId) -> Option<Arc<dyn Surface>> {
        let _notify = self.notify.lock();
        let (surface, observers) = {
            let mut inner = self.inner.lock();
            let pos = inner.surfaces.iter().position(|s| s.id() == id)?;
            (inner.surfaces.remove(pos), inner.observers.clone())
        };

        debug!(surface = %id, "Surface removed from scene");
        for observer in &observers {
            observer.surface_removed(surface.as_ref());
        }
        Some(surface)
    }

    /// Tell observers something changed without adding or removing surfaces
    pub fn mark_changed(&self) {
        let _notify = self.notify.lock();
        let observers = self.inner.lock().observers.clone();
        for observer in &observers {
            observer.scene_changed();
        }
    }

    /// Number of surfaces in the scene
    pub fn surface_count(&self) -> usize {
        self.inner.lock().surfaces.len()
    }

    /// Number of attached observers
    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }
}

impl Scene for BasicScene {
    fn add_observer(&self, observer: Arc<dyn SceneObserver>) {
        let _notify = self.notify.lock();
        let existing = {
            let mut inner = self.inner.lock();
            inner.observers.push(observer.clone());
            inner.surfaces.clone()
        };

        trace!(surfaces = existing.len(), "Replaying existing surfaces to new observer");
        for surface in &existing {
            observer.surface_exists(surface.as_ref());
        }
    }

    /// Once this returns, `observer` receives no further notifications
    fn remove_observer(&self, observer: &Arc<dyn SceneObserver>) {
        let _notify = self.notify.lock();
        self.inner
            .lock()
            .observers
            .retain(|o| !Arc::ptr_eq(o, observer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        calls: Mutex<Vec<String>>,
    }

    impl SceneObserver for Log {
        fn surface_added(&self, surface: &dyn Surface) {
            self.calls.lock().push(format!("added {}", surface.id().raw()));
        }

        fn surface_removed(&self, surface: &dyn Surface) {
            self.calls.lock().push(format!("removed {}", surface.id().raw()));
        }

        fn surface_exists(&self, surface: &dyn Surface) {
            self.calls.lock().push(format!("exists {}", surface.id().raw()));
        }

        fn scene_changed(&self) {
            self.calls.lock().push("changed".to_string());
        }
    }

    fn surface(id: u64) -> Arc<dyn Surface> {
        Arc::new(BasicSurface::new(SurfaceId::new(id), format!("s{id}"), None))
    }

    #[test]
    fn test_observer_sees_replay_then_changes() {
        let scene = BasicScene::new();
        scene.add_surface(surface(1));

        let log = Arc::new(Log::default());
        scene.add_observer(log.clone());
        scene.add_surface(surface(2));
        scene.mark_changed();
        scene.remove_surface(SurfaceId::new(1));

        assert_eq!(
            *log.calls.lock(),
            vec!["exists 1", "added 2", "changed", "removed 1"]
        );
        assert_eq!(scene.surface_count(), 1);
    }

    #[test]
    fn test_duplicate_and_missing_surfaces() {
        let scene = BasicScene::new();
        assert!(scene.add_surface(surface(1)));
        assert!(!scene.add_surface(surface(1)));
        assert!(scene.remove_surface(SurfaceId::new(9)).is_none());
        assert_eq!(scene.surface_count(), 1);
    }

    #[test]
    fn test_racing_add_and_remove_are_notified_in_order() {
        let scene = Arc::new(BasicScene::new());
        let log = Arc::new(Log::default());
        scene.add_observer(log.clone());

        let adder = {
            let scene = scene.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    scene.add_surface(surface(1));
                }
            })
        };
        let remover = {
            let scene = scene.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    scene.remove_surface(SurfaceId::new(1));
                }
            })
        };
        adder.join().unwrap();
        remover.join().unwrap();

        let calls = log.calls.lock().clone();
        for (i, call) in calls.iter().enumerate() {
            let expected = if i % 2 == 0 { "added 1" } else { "removed 1" };
            assert_eq!(call, expected, "call {i} in {calls:?}");
        }
        assert_eq!(scene.surface_count(), calls.len() % 2);
    }

    #[test]
    fn test_observer_may_mutate_scene_from_callback() {
        struct Evictor {
            scene: std::sync::Weak<BasicScene>,
        }

        impl SceneObserver for Evictor {
            fn surface_added(&self, surface: &dyn Surface) {
                if let Some(scene) = self.scene.upgrade() {
                    scene.remove_surface(surface.id());
                }
            }
            fn surface_removed(&self, _surface: &dyn Surface) {}
            fn surface_exists(&self, _surface: &dyn Surface) {}
            fn scene_changed(&self) {}
        }

        let scene = Arc::new(BasicScene::new());
        scene.add_observer(Arc::new(Evictor {
            scene: Arc::downgrade(&scene),
        }));

        assert!(scene.add_surface(surface(4)));
        assert_eq!(scene.surface_count(), 0);
    }

    #[test]
    fn test_removed_observer_is_not_notified() {
        let scene = BasicScene::new();
        let log = Arc::new(Log::default());
        let observer: Arc<dyn SceneObserver> = log.clone();

        scene.add_observer(observer.clone());
        scene.remove_observer(&observer);
        scene.add_surface(surface(3));

        assert!(log.calls.lock().is_empty());
        assert_eq!(scene.observer_count(), 0);
    }
}
