use crate::scene::SceneDescriptor;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Generating,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Ready => "Ready",
            Status::Generating => "Generating...",
        }
    }
}

/// Status indicator and generation info for the current scene.
pub struct StatusPanel {
    status: Status,
    model_label: String,
    title: String,
    build_time: Option<Duration>,
    summary: String,
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPanel {
    pub fn new() -> Self {
        let mut panel = Self {
            status: Status::Ready,
            model_label: "-".to_string(),
            title: "-".to_string(),
            build_time: None,
            summary: String::new(),
        };
        panel.update();
        panel
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_generating(&self) -> bool {
        self.status == Status::Generating
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.update();
    }

    pub fn show_scene(&mut self, scene: &SceneDescriptor, build_time: Duration) {
        self.model_label = scene.model_label().to_string();
        self.title = scene.title.clone();
        self.build_time = Some(build_time);
        self.update();
    }

    pub fn clear_scene(&mut self) {
        self.model_label = "-".to_string();
        self.title = "-".to_string();
        self.build_time = None;
        self.update();
    }

    pub fn model_label(&self) -> &str {
        &self.model_label
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn build_time(&self) -> Option<Duration> {
        self.build_time
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    fn update(&mut self) {
        let build = self
            .build_time
            .map(|time| format!("{:.1}s", time.as_secs_f32()))
            .unwrap_or_else(|| "-".to_string());
        self.summary = format!(
            "[{}] model: {} | scene: {} | build: {}",
            self.status.label(),
            self.model_label,
            self.title,
            build
        );
    }
}
