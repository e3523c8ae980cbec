use crate::ui::StatusPanel;
use crate::viewport::ViewportState;
use std::time::{Duration, Instant};

const TITLE_REFRESH: Duration = Duration::from_millis(500);

/// Frame delta and a rolling frame rate, sampled every half second.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    window_start: Instant,
    frames_in_window: u32,
    pub frame_dt: f32,
}

impl FrameTiming {
    pub fn new(now: Instant) -> Self {
        Self {
            last_frame_time: None,
            window_start: now,
            frames_in_window: 0,
            frame_dt: 1.0 / 60.0,
        }
    }

    /// Records a frame at `now`. Returns the frame rate when a new sample is due.
    pub fn update(&mut self, now: Instant) -> Option<f32> {
        self.frame_dt = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 1.0 / 60.0,
        };
        self.last_frame_time = Some(now);

        self.frames_in_window = self.frames_in_window.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < TITLE_REFRESH {
            return None;
        }
        let fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
        self.frames_in_window = 0;
        self.window_start = now;
        Some(fps)
    }
}

/// Window title: what the viewport shows, the scene and the studio status.
pub fn window_title(base: &str, state: ViewportState, panel: &StatusPanel, fps: f32) -> String {
    let shown = match state {
        ViewportState::Canvas => panel.title(),
        other => other.label(),
    };
    format!(
        "{} - {} [{}] - {:.0} fps",
        base,
        shown,
        panel.status().label(),
        fps
    )
}
