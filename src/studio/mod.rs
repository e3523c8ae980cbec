//! The studio ties catalog, conversation, continuity, viewport and the live
//! resource session together and exposes the user-facing commands.
//!
//! Everything runs on the event-loop thread. Work that the user should perceive
//! as taking time (routing a message, restarting, resuming) is queued on the
//! [`Scheduler`] and executed from [`Studio::tick`].

mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

pub use scheduler::Scheduler;

use crate::config::{DelayConfig, StudioConfig};
use crate::continuity::{Continuity, LoadStrategy, RestartHost, SessionStore};
use crate::conversation::{ChatSurface, ConversationEntry, ConversationLog, IntentRouter};
use crate::render::{CameraMovement, RenderBackend, SurfaceHandle};
use crate::scene::{SceneCatalog, SceneDescriptor};
use crate::session::{ResourceSession, SessionSettings, SessionSlot};
use crate::ui::{Status, StatusPanel};
use crate::viewport::{Viewport, ViewportState, ViewportSurface};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const RESTART_NOTICE: &str = "Loading your 3D creation... This will just take a moment!";
const REGENERATE_NOTICE: &str = "Let me create a new variation for you...";
const VARIANT_NOTICE: &str = "Creating a variant with different lighting and angles...";
const ENHANCE_NOTICE: &str = "Enhancing the current creation with better quality...";
const LOAD_FAILED: &str =
    "Sorry, I encountered an error loading that scene. Here are the scenes you can try instead.";
const RESTORE_FAILED: &str =
    "Sorry, I had trouble restoring the scene after the restart. Please try again!";

/// User interface the studio drives: transcript, viewport regions, status line,
/// gallery and short notices.
pub trait Frontend: ChatSurface + ViewportSurface {
    fn show_status(&mut self, panel: &StatusPanel);
    fn show_gallery(&mut self, scenes: &[SceneDescriptor]);
    fn notify(&mut self, message: &str);
    fn prefill_input(&mut self, text: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    RouteMessage(String),
    TriggerRestart,
    ResumePending(String),
    FinishGenerating,
}

pub struct Studio<B, S, H, F> {
    backend: B,
    store: S,
    host: H,
    frontend: F,
    catalog: SceneCatalog,
    router: IntentRouter,
    settings: SessionSettings,
    delays: DelayConfig,
    surface: SurfaceHandle,
    log: ConversationLog,
    continuity: Continuity,
    viewport: Viewport,
    slot: SessionSlot,
    panel: StatusPanel,
    scheduler: Scheduler<Task>,
    restart_requested: bool,
}

impl<B, S, H, F> Studio<B, S, H, F>
where
    B: RenderBackend,
    S: SessionStore,
    H: RestartHost,
    F: Frontend,
{
    pub fn new(
        catalog: SceneCatalog,
        config: &StudioConfig,
        backend: B,
        store: S,
        host: H,
        frontend: F,
    ) -> Self {
        let router = IntentRouter::from_catalog(&catalog);
        Self {
            backend,
            store,
            host,
            frontend,
            catalog,
            router,
            settings: config.session_settings(),
            delays: config.delays.clone(),
            surface: SurfaceHandle::offscreen(config.window_width, config.window_height),
            log: ConversationLog::new(),
            continuity: Continuity::new(),
            viewport: Viewport::new(),
            slot: SessionSlot::new(),
            panel: StatusPanel::new(),
            scheduler: Scheduler::new(),
            restart_requested: false,
        }
    }

    /// Replays the stored transcript and picks up a load queued before a restart.
    pub fn on_start(&mut self, now: Instant) {
        let restored = self.log.restore(&self.store, &mut self.frontend);
        self.viewport
            .enter(ViewportState::Welcome, &mut self.frontend, now);
        self.frontend.show_status(&self.panel);
        if restored == 0 {
            self.frontend
                .notify("Welcome to Splat Studio! Describe a scene or pick one from the gallery.");
        }

        if let Some(scene_id) = self.continuity.take_pending(&mut self.store) {
            log::info!("Resuming '{}' after restart", scene_id);
            self.scheduler
                .schedule_after(now, self.delays.resume(), Task::ResumePending(scene_id));
        }
    }

    /// Chat path. Returns false when the message was ignored.
    pub fn submit_message(&mut self, text: &str, now: Instant) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if self.restart_requested {
            self.frontend.notify("Restarting, please wait...");
            return false;
        }
        if self.panel.is_generating() {
            self.frontend
                .notify("Still working on your last request...");
            return false;
        }
        self.append(ConversationEntry::user(text));
        self.set_status(Status::Generating);
        self.scheduler.schedule_after(
            now,
            self.delays.processing(),
            Task::RouteMessage(text.to_string()),
        );
        true
    }

    /// Gallery path: load a catalog scene by id.
    pub fn load_scene(&mut self, scene_id: &str, now: Instant) {
        if self.restart_requested {
            self.frontend.notify("Restarting, please wait...");
            return;
        }
        if !self.catalog.contains(scene_id) {
            log::warn!("Load requested for unknown scene '{}'", scene_id);
            self.fail_load(now);
            return;
        }

        self.viewport
            .enter(ViewportState::Loading, &mut self.frontend, now);
        match self.continuity.begin_load(&mut self.store) {
            LoadStrategy::Direct => {
                log::info!("Loading '{}' in place", scene_id);
                if !self.build_now(scene_id, now) {
                    self.fail_load(now);
                }
            }
            LoadStrategy::Restart => {
                if let Err(err) = self.continuity.queue_pending(&mut self.store, scene_id) {
                    log::warn!("Cannot queue '{}' across a restart: {}", scene_id, err);
                    self.fail_load(now);
                    return;
                }
                self.append(ConversationEntry::assistant(RESTART_NOTICE));
                self.restart_requested = true;
                self.scheduler
                    .schedule_after(now, self.delays.restart(), Task::TriggerRestart);
            }
        }
    }

    pub fn reset_camera(&mut self) {
        match self.slot.get_mut() {
            Some(session) => session.reset_camera(&mut self.backend),
            None => self.frontend.notify("No scene is loaded"),
        }
    }

    pub fn close_session(&mut self, now: Instant) {
        if self.slot.close(&mut self.backend) {
            self.panel.clear_scene();
            self.frontend.show_status(&self.panel);
        }
        self.viewport
            .enter(ViewportState::Welcome, &mut self.frontend, now);
    }

    pub fn clear_conversation(&mut self) {
        self.log.clear(&mut self.store);
        self.frontend.clear_entries();
        log::info!("Conversation cleared");
    }

    /// Forgets the transcript, the pending marker and the has-loaded flag.
    pub fn reset_session(&mut self) {
        self.clear_conversation();
        self.continuity.reset(&mut self.store);
        self.frontend.notify("Session state reset");
    }

    pub fn regenerate(&mut self, now: Instant) {
        if self.refuse_while_busy() {
            return;
        }
        let Some(last) = self.log.last_user_message().map(str::to_string) else {
            self.frontend.notify("Nothing to regenerate yet");
            return;
        };
        self.append(ConversationEntry::assistant(REGENERATE_NOTICE));
        self.set_status(Status::Generating);
        self.scheduler
            .schedule_after(now, self.delays.processing(), Task::RouteMessage(last));
    }

    pub fn create_variant(&mut self, now: Instant) {
        if self.refuse_while_busy() {
            return;
        }
        self.append(ConversationEntry::assistant(VARIANT_NOTICE));
        self.set_status(Status::Generating);
        self.scheduler
            .schedule_after(now, self.delays.variant(), Task::FinishGenerating);
    }

    pub fn enhance(&mut self, now: Instant) {
        if self.refuse_while_busy() {
            return;
        }
        self.append(ConversationEntry::assistant(ENHANCE_NOTICE));
        self.set_status(Status::Generating);
        self.scheduler
            .schedule_after(now, self.delays.enhance(), Task::FinishGenerating);
    }

    /// Picks one of the catalog's prompt ideas and puts it into the input.
    pub fn suggest_prompt(&mut self) -> Option<String> {
        let ideas = self.catalog.prompt_ideas();
        if ideas.is_empty() {
            self.frontend.notify("No prompt ideas available");
            return None;
        }
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_nanos() as usize)
            .unwrap_or(0);
        let idea = ideas[seed % ideas.len()].clone();
        self.frontend.prefill_input(&idea);
        Some(idea)
    }

    /// Submits the prompt of chip `index` (0-based) of the latest entry with chips.
    pub fn select_suggestion(&mut self, index: usize, now: Instant) -> bool {
        let Some(prompt) = self
            .log
            .latest_suggestions()
            .get(index)
            .map(|suggestion| suggestion.prompt.clone())
        else {
            self.frontend
                .notify(&format!("There is no suggestion {}", index + 1));
            return false;
        };
        self.submit_message(&prompt, now)
    }

    pub fn show_gallery(&mut self) {
        self.frontend.show_gallery(self.catalog.scenes());
    }

    pub fn set_surface(&mut self, surface: SurfaceHandle) {
        self.surface = surface;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.width = width.max(1);
        self.surface.height = height.max(1);
        if let Some(session) = self.slot.get_mut() {
            session.resize(&mut self.backend, width, height);
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if let Some(session) = self.slot.get_mut() {
            session.pointer_down(x, y);
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if let Some(session) = self.slot.get_mut() {
            session.pointer_move(&mut self.backend, x, y);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(session) = self.slot.get_mut() {
            session.pointer_up();
        }
    }

    pub fn move_camera(&mut self, movement: &CameraMovement, frame_dt: f32) {
        if let Some(session) = self.slot.get_mut() {
            session.move_camera(&mut self.backend, movement, frame_dt);
        }
    }

    /// Runs due tasks, advances the loading animation and renders one frame.
    pub fn tick(&mut self, now: Instant) {
        while let Some(task) = self.scheduler.pop_due(now) {
            self.run(task, now);
        }
        self.viewport.tick(&mut self.frontend, now);
        if let Some(session) = self.slot.get_mut() {
            if let Err(err) = session.update(&mut self.backend) {
                log::warn!("Frame for '{}' failed: {}", session.scene_id(), err);
            }
        }
    }

    /// Earliest instant at which `tick` has scheduled work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.scheduler.next_deadline(), self.viewport.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Releases the live session ahead of a clean exit.
    pub fn shutdown(&mut self) {
        if self.restart_requested {
            self.slot.abandon();
        } else {
            self.slot.close(&mut self.backend);
        }
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn viewport_state(&self) -> ViewportState {
        self.viewport.state()
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    pub fn panel(&self) -> &StatusPanel {
        &self.panel
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    pub fn session(&self) -> Option<&ResourceSession> {
        self.slot.get()
    }

    pub fn pending_tasks(&self) -> impl Iterator<Item = &Task> {
        self.scheduler.pending()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn run(&mut self, task: Task, now: Instant) {
        log::debug!("Running {:?}", task);
        match task {
            Task::RouteMessage(message) => self.route_message(&message, now),
            Task::TriggerRestart => {
                log::info!("🔄 Restarting to load the queued scene");
                self.slot.abandon();
                self.host.request_restart();
            }
            Task::ResumePending(scene_id) => self.resume(&scene_id, now),
            Task::FinishGenerating => self.set_status(Status::Ready),
        }
    }

    fn route_message(&mut self, message: &str, now: Instant) {
        if self.restart_requested {
            log::info!("Dropping routed message, restart pending");
            self.set_status(Status::Ready);
            self.frontend.notify("Restarting, please wait...");
            return;
        }
        match self.router.route(message) {
            Some(found) => {
                self.append(ConversationEntry::assistant(format!(
                    "I found a perfect match! Let me show you {}.",
                    found.title
                )));
                self.set_status(Status::Ready);
                self.load_scene(&found.scene_id, now);
            }
            None => {
                self.append(ConversationEntry::assistant(format!(
                    "I understand you want to create \"{}\". While I'm still learning to \
                     generate 3D content from scratch, let me show you some examples that \
                     might inspire you!",
                    message
                )));
                let chips = self.router.fallback_suggestions().to_vec();
                self.append(ConversationEntry::assistant("").with_suggestions(&chips));
                self.set_status(Status::Ready);
            }
        }
    }

    fn resume(&mut self, scene_id: &str, now: Instant) {
        self.viewport
            .enter(ViewportState::Loading, &mut self.frontend, now);
        if self.build_now(scene_id, now) {
            let title = self.catalog.title(scene_id);
            self.append(ConversationEntry::assistant(format!(
                "✨ Scene restored after restart! Now showing: {}",
                title
            )));
        } else {
            self.append(ConversationEntry::assistant(RESTORE_FAILED));
        }
    }

    /// Tears down any live session and builds `scene_id` in this process.
    fn build_now(&mut self, scene_id: &str, now: Instant) -> bool {
        let Some(scene) = self.catalog.get(scene_id).cloned() else {
            log::warn!("Scene '{}' is not in the catalog", scene_id);
            self.slot.close(&mut self.backend);
            self.viewport
                .enter(ViewportState::Welcome, &mut self.frontend, now);
            return false;
        };
        let started = Instant::now();
        match self
            .slot
            .replace(&mut self.backend, &scene, &self.surface, &self.settings)
        {
            Ok(_) => {
                let elapsed = started.elapsed();
                log::info!("'{}' ready in {:.2?}", scene.id, elapsed);
                self.viewport
                    .enter(ViewportState::Canvas, &mut self.frontend, now);
                self.panel.show_scene(&scene, elapsed);
                self.frontend.show_status(&self.panel);
                true
            }
            Err(err) => {
                log::warn!("Failed to load '{}': {}", scene.id, err);
                self.viewport
                    .enter(ViewportState::Welcome, &mut self.frontend, now);
                self.panel.clear_scene();
                self.frontend.show_status(&self.panel);
                false
            }
        }
    }

    /// Leaves `Loading` after a load that will not happen. A scene that is still
    /// live keeps the canvas.
    fn fail_load(&mut self, now: Instant) {
        let state = if self.slot.is_active() {
            ViewportState::Canvas
        } else {
            ViewportState::Welcome
        };
        self.viewport.enter(state, &mut self.frontend, now);
        self.append(ConversationEntry::assistant(LOAD_FAILED));
        self.frontend.show_gallery(self.catalog.scenes());
    }

    fn refuse_while_busy(&mut self) -> bool {
        if self.restart_requested {
            self.frontend.notify("Restarting, please wait...");
            return true;
        }
        if self.panel.is_generating() {
            self.frontend
                .notify("Still working on your last request...");
            return true;
        }
        false
    }

    fn set_status(&mut self, status: Status) {
        self.panel.set_status(status);
        self.frontend.show_status(&self.panel);
    }

    fn append(&mut self, entry: ConversationEntry) {
        let entry = self.log.append(&mut self.store, entry);
        self.frontend.show_entry(entry);
    }
}
