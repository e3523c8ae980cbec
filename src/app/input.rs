use crate::render::CameraMovement;
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    None,
    ResetCamera,
    ShowGallery,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub orbit_left: bool,
    pub orbit_right: bool,
    pub orbit_up: bool,
    pub orbit_down: bool,
    pub zoom_in: bool,
    pub zoom_out: bool,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) -> InputAction {
        match key {
            PhysicalKey::Code(KeyCode::ArrowLeft) => self.orbit_left = pressed,
            PhysicalKey::Code(KeyCode::ArrowRight) => self.orbit_right = pressed,
            PhysicalKey::Code(KeyCode::ArrowUp) => self.orbit_up = pressed,
            PhysicalKey::Code(KeyCode::ArrowDown) => self.orbit_down = pressed,
            PhysicalKey::Code(KeyCode::PageUp | KeyCode::Equal) => self.zoom_in = pressed,
            PhysicalKey::Code(KeyCode::PageDown | KeyCode::Minus) => self.zoom_out = pressed,
            PhysicalKey::Code(KeyCode::KeyR) if pressed => return InputAction::ResetCamera,
            PhysicalKey::Code(KeyCode::KeyG) if pressed => return InputAction::ShowGallery,
            _ => {}
        }
        InputAction::None
    }

    pub fn movement(&self) -> CameraMovement {
        CameraMovement {
            orbit_left: self.orbit_left,
            orbit_right: self.orbit_right,
            orbit_up: self.orbit_up,
            orbit_down: self.orbit_down,
            zoom_in: self.zoom_in,
            zoom_out: self.zoom_out,
        }
    }

    pub fn release_all(&mut self) {
        *self = Self::default();
    }
}
