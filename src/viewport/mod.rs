use std::time::{Duration, Instant};

/// Activation offsets of the loading progress steps, relative to entering `Loading`.
pub const LOADING_STEP_OFFSETS: [Duration; 3] = [
    Duration::from_millis(0),
    Duration::from_millis(1000),
    Duration::from_millis(2000),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportState {
    Welcome,
    Loading,
    Canvas,
}

impl ViewportState {
    pub const ALL: [ViewportState; 3] = [
        ViewportState::Welcome,
        ViewportState::Loading,
        ViewportState::Canvas,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ViewportState::Welcome => "welcome",
            ViewportState::Loading => "loading",
            ViewportState::Canvas => "canvas",
        }
    }
}

/// Display regions driven by the viewport.
pub trait ViewportSurface {
    fn set_region_visible(&mut self, region: ViewportState, visible: bool);

    /// Marks loading step `step` (0-based) as active.
    fn set_loading_step(&mut self, step: usize);
}

#[derive(Debug)]
pub struct Viewport {
    state: ViewportState,
    loading_since: Option<Instant>,
    steps_shown: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            state: ViewportState::Welcome,
            loading_since: None,
            steps_shown: 0,
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    /// Hides every region, reveals `state`, and runs its entry effects. Entering
    /// `Loading` restarts the progress animation even when already loading.
    pub fn enter(&mut self, state: ViewportState, surface: &mut dyn ViewportSurface, now: Instant) {
        for region in ViewportState::ALL {
            surface.set_region_visible(region, false);
        }
        surface.set_region_visible(state, true);
        if self.state != state {
            log::debug!("Viewport {} -> {}", self.state.label(), state.label());
        }
        self.state = state;

        if state == ViewportState::Loading {
            self.loading_since = Some(now);
            self.steps_shown = 0;
            self.tick(surface, now);
        } else {
            self.loading_since = None;
            self.steps_shown = 0;
        }
    }

    /// Activates any loading step whose offset has elapsed.
    pub fn tick(&mut self, surface: &mut dyn ViewportSurface, now: Instant) {
        let Some(since) = self.loading_since else {
            return;
        };
        let elapsed = now.saturating_duration_since(since);
        while self.steps_shown < LOADING_STEP_OFFSETS.len()
            && elapsed >= LOADING_STEP_OFFSETS[self.steps_shown]
        {
            surface.set_loading_step(self.steps_shown);
            self.steps_shown += 1;
        }
    }

    /// Next instant a loading step becomes due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        let since = self.loading_since?;
        LOADING_STEP_OFFSETS
            .get(self.steps_shown)
            .map(|offset| since + *offset)
    }

    pub fn steps_shown(&self) -> usize {
        self.steps_shown
    }
}
