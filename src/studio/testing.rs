//! Recording doubles shared by studio and app tests.

use super::{Frontend, Studio};
use crate::assets::{spz, AssetLoader};
use crate::config::StudioConfig;
use crate::continuity::{MemoryStore, RestartHost};
use crate::conversation::{ChatSurface, ConversationEntry};
use crate::render::HeadlessBackend;
use crate::scene::{SceneCatalog, SceneDescriptor};
use crate::ui::StatusPanel;
use crate::viewport::{ViewportState, ViewportSurface};
use std::path::Path;

#[derive(Default)]
pub struct RecordingFrontend {
    pub entries: Vec<ConversationEntry>,
    pub regions: Vec<ViewportState>,
    pub loading_steps: Vec<usize>,
    pub statuses: Vec<String>,
    pub notices: Vec<String>,
    pub galleries: usize,
    pub prefilled: Option<String>,
}

impl RecordingFrontend {
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.text.as_str()).collect()
    }
}

impl ChatSurface for RecordingFrontend {
    fn show_entry(&mut self, entry: &ConversationEntry) {
        self.entries.push(entry.clone());
    }

    fn clear_entries(&mut self) {
        self.entries.clear();
    }
}

impl ViewportSurface for RecordingFrontend {
    fn set_region_visible(&mut self, region: ViewportState, visible: bool) {
        if visible {
            self.regions.push(region);
        }
    }

    fn set_loading_step(&mut self, step: usize) {
        self.loading_steps.push(step);
    }
}

impl Frontend for RecordingFrontend {
    fn show_status(&mut self, panel: &StatusPanel) {
        self.statuses.push(panel.summary().to_string());
    }

    fn show_gallery(&mut self, _scenes: &[SceneDescriptor]) {
        self.galleries += 1;
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn prefill_input(&mut self, text: &str) {
        self.prefilled = Some(text.to_string());
    }
}

#[derive(Default)]
pub struct RecordingHost {
    pub restarts: usize,
}

impl RestartHost for RecordingHost {
    fn request_restart(&mut self) {
        self.restarts += 1;
    }
}

pub type TestStudio = Studio<HeadlessBackend, MemoryStore, RecordingHost, RecordingFrontend>;

/// Built-in catalog with every asset redirected to a small local `.spz` file.
pub fn fixture_catalog(dir: &Path) -> SceneCatalog {
    let mut data = SceneCatalog::builtin().unwrap().data().clone();
    for scene in &mut data.scenes {
        for (index, instance) in scene.instances.iter_mut().enumerate() {
            let path = dir.join(format!("{}-{}.spz", scene.id, index));
            std::fs::write(&path, spz::encode_header(2, 64)).unwrap();
            instance.url = path.to_string_lossy().to_string();
        }
    }
    SceneCatalog::from_data(data).unwrap()
}

/// A fresh "process": new single-initialization backend over a shared store.
pub fn studio(dir: &Path, store: &MemoryStore) -> TestStudio {
    Studio::new(
        fixture_catalog(dir),
        &StudioConfig::default(),
        HeadlessBackend::new(AssetLoader::offline()),
        store.clone(),
        RecordingHost::default(),
        RecordingFrontend::default(),
    )
}
