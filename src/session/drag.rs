use glam::Vec2;

/// Pointer drag tracking for one session. Deltas are measured between
/// consecutive pointer positions while a button or touch is held.
#[derive(Debug, Clone, Copy, Default)]
pub struct DragState {
    last: Option<Vec2>,
}

impl DragState {
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.last = Some(Vec2::new(x, y));
    }

    /// Returns the movement since the previous position, or `None` when no drag
    /// is in progress.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<Vec2> {
        let last = self.last?;
        let current = Vec2::new(x, y);
        self.last = Some(current);
        Some(current - last)
    }

    pub fn pointer_up(&mut self) {
        self.last = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }
}
