//! Restart-safe session continuity.
//!
//! The rendering backend can be initialized only once per process, so every load
//! after the first one is carried across a full process restart: the scene id is
//! written as a pending marker, the process restarts, and the new process consumes
//! the marker on start.

#[cfg(test)]
mod memory;
mod store;

#[cfg(test)]
pub use memory::MemoryStore;
pub use store::{FileSessionStore, SessionStore, StoreError};

pub const CHAT_HISTORY_KEY: &str = "splat_studio.chat_history";
pub const PENDING_SCENE_KEY: &str = "splat_studio.pending_scene";
pub const HAS_LOADED_KEY: &str = "splat_studio.has_loaded_scene";

/// Host capable of replacing the current process with a fresh one.
pub trait RestartHost {
    fn request_restart(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// First load of the session: build in this process.
    Direct,
    /// Backend already used: queue the scene and restart.
    Restart,
}

#[derive(Debug, Default)]
pub struct Continuity {
    loaded_in_process: bool,
    backend_used: bool,
    marker_checked: bool,
}

impl Continuity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_loaded_before(&self, store: &dyn SessionStore) -> bool {
        if self.loaded_in_process {
            return true;
        }
        match store.get(HAS_LOADED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                log::warn!("Failed to read load flag: {}", err);
                false
            }
        }
    }

    /// Picks the strategy for a load request. The first request sets the
    /// has-loaded flag before anything is built.
    pub fn begin_load(&mut self, store: &mut dyn SessionStore) -> LoadStrategy {
        if self.backend_used || self.has_loaded_before(store) {
            return LoadStrategy::Restart;
        }
        self.loaded_in_process = true;
        self.backend_used = true;
        if let Err(err) = store.set(HAS_LOADED_KEY, "true") {
            log::warn!("Failed to persist load flag: {}", err);
        }
        LoadStrategy::Direct
    }

    pub fn queue_pending(
        &self,
        store: &mut dyn SessionStore,
        scene_id: &str,
    ) -> Result<(), StoreError> {
        store.set(PENDING_SCENE_KEY, scene_id)?;
        log::info!("Queued '{}' for the next start", scene_id);
        Ok(())
    }

    /// Consumes the pending marker. Only the first call per process can return a
    /// scene, and only when the marker was removed from storage first.
    pub fn take_pending(&mut self, store: &mut dyn SessionStore) -> Option<String> {
        if self.marker_checked {
            return None;
        }
        self.marker_checked = true;

        let scene_id = match store.get(PENDING_SCENE_KEY) {
            Ok(Some(scene_id)) => scene_id,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("Failed to read pending scene marker: {}", err);
                return None;
            }
        };
        if let Err(err) = store.remove(PENDING_SCENE_KEY) {
            log::warn!(
                "Failed to clear pending scene marker; not resuming '{}': {}",
                scene_id,
                err
            );
            return None;
        }
        let scene_id = scene_id.trim().to_string();
        if scene_id.is_empty() {
            return None;
        }
        // The pending load happens in a fresh process, so it counts as a load.
        self.loaded_in_process = true;
        self.backend_used = true;
        Some(scene_id)
    }

    /// Forgets the marker and the has-loaded flag. A backend already initialized in
    /// this process stays used, so later loads still go through a restart.
    pub fn reset(&mut self, store: &mut dyn SessionStore) {
        for key in [PENDING_SCENE_KEY, HAS_LOADED_KEY] {
            if let Err(err) = store.remove(key) {
                log::warn!("Failed to clear {}: {}", key, err);
            }
        }
        self.loaded_in_process = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_flips_once_and_only_reset_clears_it() {
        let mut store = MemoryStore::new();
        let mut continuity = Continuity::new();
        assert!(!continuity.has_loaded_before(&store));

        assert_eq!(continuity.begin_load(&mut store), LoadStrategy::Direct);
        assert_eq!(
            store.get(HAS_LOADED_KEY).unwrap(),
            Some("true".to_string())
        );
        assert_eq!(continuity.begin_load(&mut store), LoadStrategy::Restart);
        assert_eq!(continuity.begin_load(&mut store), LoadStrategy::Restart);

        continuity.reset(&mut store);
        assert!(!continuity.has_loaded_before(&store));
        assert_eq!(store.get(HAS_LOADED_KEY).unwrap(), None);

        let mut restarted = Continuity::new();
        assert_eq!(restarted.begin_load(&mut store), LoadStrategy::Direct);
    }

    #[test]
    fn reset_keeps_restart_strategy_for_used_backend() {
        let mut store = MemoryStore::new();
        let mut continuity = Continuity::new();
        assert_eq!(continuity.begin_load(&mut store), LoadStrategy::Direct);

        continuity.reset(&mut store);
        assert_eq!(continuity.begin_load(&mut store), LoadStrategy::Restart);
        assert_eq!(store.get(HAS_LOADED_KEY).unwrap(), None);
    }

    #[test]
    fn resumed_process_restarts_after_reset() {
        let mut store = MemoryStore::new();
        Continuity::new()
            .queue_pending(&mut store, "animation")
            .unwrap();

        let mut restarted = Continuity::new();
        assert!(restarted.take_pending(&mut store).is_some());
        restarted.reset(&mut store);
        assert_eq!(restarted.begin_load(&mut store), LoadStrategy::Restart);
    }

    #[test]
    fn flag_is_shared_across_restarts() {
        let mut store = MemoryStore::new();
        Continuity::new().begin_load(&mut store);

        let mut restarted = Continuity::new();
        assert_eq!(restarted.begin_load(&mut store), LoadStrategy::Restart);
    }

    #[test]
    fn unpersisted_flag_still_blocks_second_direct_load() {
        let mut store = MemoryStore::new();
        store.fail_writes(true);
        let mut continuity = Continuity::new();
        assert_eq!(continuity.begin_load(&mut store), LoadStrategy::Direct);
        assert_eq!(continuity.begin_load(&mut store), LoadStrategy::Restart);
    }

    #[test]
    fn marker_is_consumed_at_most_once() {
        let mut store = MemoryStore::new();
        let continuity = Continuity::new();
        continuity.queue_pending(&mut store, "animation").unwrap();

        let mut restarted = Continuity::new();
        assert_eq!(
            restarted.take_pending(&mut store),
            Some("animation".to_string())
        );
        assert_eq!(store.get(PENDING_SCENE_KEY).unwrap(), None);

        restarted.queue_pending(&mut store, "food-gallery").unwrap();
        assert_eq!(restarted.take_pending(&mut store), None);
    }

    #[test]
    fn missing_marker_is_a_no_op() {
        let mut store = MemoryStore::new();
        let mut continuity = Continuity::new();
        assert_eq!(continuity.take_pending(&mut store), None);
        assert!(store.is_empty());
    }

    #[test]
    fn marker_that_cannot_be_cleared_is_not_used() {
        let mut store = MemoryStore::new();
        Continuity::new()
            .queue_pending(&mut store, "animation")
            .unwrap();
        store.fail_removes(true);

        let mut continuity = Continuity::new();
        assert_eq!(continuity.take_pending(&mut store), None);
    }
}
