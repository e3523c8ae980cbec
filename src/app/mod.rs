mod console;
mod headless;
mod host;
mod input;
mod timing;

pub use host::{relaunch, ProcessHost};

use crate::assets::AssetLoader;
use crate::config::StudioConfig;
use crate::continuity::FileSessionStore;
use crate::render::{HeadlessBackend, SurfaceHandle};
use crate::scene::SceneCatalog;
use crate::studio::Studio;
use anyhow::Context;
use console::{ConsoleFrontend, Flow};
use input::{InputAction, InputState};
use raw_window_handle::HasWindowHandle;
use timing::{window_title, FrameTiming};

use std::io::BufRead;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

type NativeStudio =
    Studio<HeadlessBackend, FileSessionStore, ProcessHost, ConsoleFrontend<std::io::Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Clean exit: the session ends with the process.
    Quit,
    /// The process should be replaced to load a queued scene.
    Restart,
}

pub struct Launch {
    pub config: StudioConfig,
    pub catalog: SceneCatalog,
    pub session_id: String,
    pub headless: bool,
}

#[derive(Debug)]
enum UserEvent {
    ConsoleLine(String),
    ConsoleClosed,
}

/// Reads stdin on a helper thread and hands each line to `sink`; `None` marks the
/// end of input. The thread stops when `sink` returns false.
fn spawn_console_reader<F>(mut sink: F)
where
    F: FnMut(Option<String>) -> bool + Send + 'static,
{
    let spawned = std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if !sink(Some(line)) {
                            return;
                        }
                    }
                    Err(err) => {
                        log::warn!("Console input failed: {}", err);
                        break;
                    }
                }
            }
            sink(None);
        });
    if let Err(err) = spawned {
        log::warn!("Console reader unavailable: {}", err);
    }
}

struct App<'a> {
    studio: &'a mut NativeStudio,
    window: Option<Arc<Window>>,
    title: String,
    initial_size: PhysicalSize<u32>,
    input: InputState,
    cursor: Option<(f32, f32)>,
    dragging: bool,
    active_touch: Option<u64>,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    started: bool,
    exit: Exit,
}

impl<'a> App<'a> {
    fn new(studio: &'a mut NativeStudio, config: &StudioConfig) -> Self {
        Self {
            studio,
            window: None,
            title: config.window_title.clone(),
            initial_size: PhysicalSize::new(config.window_width, config.window_height),
            input: InputState::default(),
            cursor: None,
            dragging: false,
            active_touch: None,
            timing: FrameTiming::new(Instant::now()),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            started: false,
            exit: Exit::Quit,
        }
    }

    fn attach_surface(&mut self, window: &Window) {
        let size = window.inner_size();
        let raw = match window.window_handle() {
            Ok(handle) => Some(handle.as_raw()),
            Err(err) => {
                log::warn!("No native window handle, rendering offscreen: {}", err);
                None
            }
        };
        self.studio.set_surface(SurfaceHandle {
            window: raw,
            width: size.width.max(1),
            height: size.height.max(1),
        });
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn frame(&mut self) {
        let now = Instant::now();
        let fps = self.timing.update(now);
        self.studio
            .move_camera(&self.input.movement(), self.timing.frame_dt);
        self.studio.tick(now);
        if let (Some(fps), Some(window)) = (fps, &self.window) {
            window.set_title(&window_title(
                &self.title,
                self.studio.viewport_state(),
                self.studio.panel(),
                fps,
            ));
        }
    }

    fn handle_pointer_button(&mut self, pressed: bool) {
        if pressed {
            if let Some((x, y)) = self.cursor {
                self.studio.pointer_down(x, y);
                self.dragging = true;
            }
        } else if self.dragging {
            self.studio.pointer_up();
            self.dragging = false;
        }
    }
}

impl ApplicationHandler<UserEvent> for App<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(self.initial_size)
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        self.attach_surface(&window);
        self.update_target_frame_duration(&window);
        self.window = Some(window);

        if !self.started {
            self.started = true;
            self.studio.on_start(Instant::now());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Focused(focused) => {
                if !focused {
                    self.input.release_all();
                    self.handle_pointer_button(false);
                    self.cursor = None;
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                let pressed = event.state == ElementState::Pressed;
                match self.input.handle_key(event.physical_key, pressed) {
                    InputAction::ResetCamera => self.studio.reset_camera(),
                    InputAction::ShowGallery => self.studio.show_gallery(),
                    InputAction::None => {}
                }
            }
            WindowEvent::Resized(new_size) => {
                self.studio.resize(new_size.width, new_size.height);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                self.cursor = Some((x, y));
                if self.dragging {
                    self.studio.pointer_move(x, y);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.handle_pointer_button(false);
                self.cursor = None;
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.handle_pointer_button(state == ElementState::Pressed);
            }
            WindowEvent::Touch(touch) => {
                let (x, y) = (touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started if self.active_touch.is_none() => {
                        self.active_touch = Some(touch.id);
                        self.studio.pointer_down(x, y);
                    }
                    TouchPhase::Moved if self.active_touch == Some(touch.id) => {
                        self.studio.pointer_move(x, y);
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled
                        if self.active_touch == Some(touch.id) =>
                    {
                        self.active_touch = None;
                        self.studio.pointer_up();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame();
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::ConsoleLine(line) => {
                let Some(command) = console::parse(&line) else {
                    return;
                };
                if console::dispatch(self.studio, command, Instant::now()) == Flow::Quit {
                    event_loop.exit();
                }
            }
            UserEvent::ConsoleClosed => {
                log::debug!("Console input closed; window stays open");
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.studio.host().restart_pending() {
            self.exit = Exit::Restart;
            event_loop.exit();
            return;
        }
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

fn run_windowed(studio: &mut NativeStudio, config: &StudioConfig) -> anyhow::Result<Exit> {
    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let proxy = event_loop.create_proxy();
    spawn_console_reader(move |line| {
        let event = match line {
            Some(line) => UserEvent::ConsoleLine(line),
            None => UserEvent::ConsoleClosed,
        };
        proxy.send_event(event).is_ok()
    });

    let mut app = App::new(studio, config);
    event_loop.run_app(&mut app).context("event loop error")?;
    Ok(app.exit)
}

/// Wires the studio to the native collaborators and runs it until it quits or
/// asks for a restart. The session file is removed on a clean exit unless it is
/// configured to be kept.
pub fn run(launch: Launch) -> anyhow::Result<Exit> {
    let Launch {
        config,
        catalog,
        session_id,
        headless: console_only,
    } = launch;

    let store = FileSessionStore::open(&config.session_dir, &session_id);
    log::info!("Session {} ({})", session_id, store.path().display());

    let assets = AssetLoader::new(Some(config.asset_cache_dir()), config.offline);
    let mut studio = Studio::new(
        catalog,
        &config,
        HeadlessBackend::new(assets),
        store,
        ProcessHost::new(),
        ConsoleFrontend::stdout(),
    );

    let exit = if console_only {
        headless::run(&mut studio)
    } else {
        run_windowed(&mut studio, &config)?
    };

    studio.shutdown();
    let store = studio.into_store();
    if exit == Exit::Quit {
        if config.keep_session {
            log::info!("Keeping session file {}", store.path().display());
        } else if let Err(err) = store.discard() {
            log::warn!("Failed to remove session file: {}", err);
        }
    }
    Ok(exit)
}
