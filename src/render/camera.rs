use crate::render::{CameraHandle, RenderBackend};
use glam::Vec3;

const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 100.0;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Debug, Clone, Copy, Default)]
pub struct CameraMovement {
    pub orbit_left: bool,
    pub orbit_right: bool,
    pub orbit_up: bool,
    pub orbit_down: bool,
    pub zoom_in: bool,
    pub zoom_out: bool,
}

/// Spherical orbit around `target`. The pose the camera was created with is its
/// home pose and `reset` returns to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    home: (Vec3, f32, f32, f32),
}

impl OrbitCamera {
    pub fn new(eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let distance = offset.length().clamp(MIN_DISTANCE, MAX_DISTANCE);
        let (yaw, pitch) = offset_to_yaw_pitch(offset);
        Self {
            target,
            distance,
            yaw,
            pitch,
            home: (target, distance, yaw, pitch),
        }
    }

    pub fn eye(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        let offset = Vec3::new(
            self.yaw.sin() * cos_pitch,
            self.pitch.sin(),
            self.yaw.cos() * cos_pitch,
        );
        self.target + offset * self.distance
    }

    pub fn reset(&mut self) {
        let (target, distance, yaw, pitch) = self.home;
        self.target = target;
        self.distance = distance;
        self.yaw = yaw;
        self.pitch = pitch;
    }

    pub fn is_home(&self) -> bool {
        let (target, distance, yaw, pitch) = self.home;
        self.target == target && self.distance == distance && self.yaw == yaw && self.pitch == pitch
    }

    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = wrap_angle(self.yaw + yaw_delta);
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance + delta).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn apply(&self, backend: &mut dyn RenderBackend, camera: CameraHandle) {
        backend.set_camera_pose(camera, self.eye(), self.target, Vec3::Y);
    }

    pub fn update_movement(&mut self, input: &CameraMovement, frame_dt: f32) -> bool {
        let orbit_speed = 1.8 * frame_dt;
        let zoom_speed = 3.0 * frame_dt;
        let mut yaw = 0.0;
        let mut pitch = 0.0;
        let mut zoom = 0.0;

        if input.orbit_left {
            yaw -= orbit_speed;
        }
        if input.orbit_right {
            yaw += orbit_speed;
        }
        if input.orbit_up {
            pitch += orbit_speed;
        }
        if input.orbit_down {
            pitch -= orbit_speed;
        }
        if input.zoom_in {
            zoom -= zoom_speed;
        }
        if input.zoom_out {
            zoom += zoom_speed;
        }

        if yaw == 0.0 && pitch == 0.0 && zoom == 0.0 {
            return false;
        }
        self.orbit(yaw, pitch);
        self.zoom(zoom);
        true
    }
}

fn offset_to_yaw_pitch(offset: Vec3) -> (f32, f32) {
    let len = offset.length().max(1e-6);
    let n = offset / len;
    let yaw = n.x.atan2(n.z);
    let pitch = n.y.clamp(-1.0, 1.0).asin();
    (yaw, pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT))
}

fn wrap_angle(angle: f32) -> f32 {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        (angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraMovement, OrbitCamera};
    use glam::Vec3;

    #[test]
    fn default_pose_round_trips_through_eye() {
        let camera = OrbitCamera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
        assert!(camera.is_home());
    }

    #[test]
    fn orbit_keeps_distance_and_reset_restores_home() {
        let mut camera = OrbitCamera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        camera.orbit(1.2, 0.4);
        assert!((camera.eye().length() - 5.0).abs() < 1e-4);
        assert!(!camera.is_home());

        camera.reset();
        assert!(camera.is_home());
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped_short_of_the_poles() {
        let mut camera = OrbitCamera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        camera.orbit(0.0, 10.0);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        assert!(camera.eye().is_finite());
    }

    #[test]
    fn movement_update_keeps_finite_values() {
        let mut camera = OrbitCamera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let movement = CameraMovement {
            orbit_right: true,
            orbit_up: true,
            zoom_in: true,
            ..CameraMovement::default()
        };
        assert!(camera.update_movement(&movement, 1.0 / 60.0));
        assert!(camera.eye().is_finite());
        assert!(camera.distance < 5.0);

        assert!(!camera.update_movement(&CameraMovement::default(), 1.0 / 60.0));
    }
}
