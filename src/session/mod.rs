//! Resource Session: the complete set of rendering resources needed to show one
//! scene, created and destroyed as a unit.

mod drag;

pub use drag::DragState;

use crate::render::{
    BackendError, CameraHandle, CameraMovement, ContextHandle, Light, LightHandle, OrbitCamera,
    Projection, RenderBackend, SplatHandle, SurfaceHandle,
};
use crate::scene::{compose_transform_matrix, SceneDescriptor};
use glam::{EulerRot, Mat4, Quat, Vec3};
use std::time::Duration;

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
    pub target: Vec3,
    pub ambient_intensity: f32,
    pub directional_intensity: f32,
    pub directional_position: Vec3,
    /// Constant yaw added to every splat per frame, in radians.
    pub spin_per_frame: f32,
    /// Radians of rotation per pixel of drag.
    pub drag_sensitivity: f32,
    pub readiness_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            fov_y_deg: 60.0,
            near: 0.1,
            far: 1000.0,
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            ambient_intensity: 0.6,
            directional_intensity: 0.8,
            directional_position: Vec3::new(1.0, 1.0, 1.0),
            spin_per_frame: 0.005,
            drag_sensitivity: 0.01,
            readiness_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("scene '{0}' has no splat instances")]
    EmptyScene(String),
    #[error("resources for scene '{scene}' are unavailable: {source}")]
    ResourceUnavailable {
        scene: String,
        #[source]
        source: BackendError,
    },
}

/// One placed splat plus the rotation accumulated from spin and drag.
#[derive(Debug, Clone, Copy)]
struct SplatInstance {
    handle: SplatHandle,
    position: Vec3,
    base: Quat,
    scale: Vec3,
    yaw: f32,
    pitch: f32,
}

impl SplatInstance {
    fn transform(&self) -> Mat4 {
        let spin = Quat::from_euler(EulerRot::XYZ, self.pitch, self.yaw, 0.0);
        compose_transform_matrix(
            self.position.to_array(),
            (spin * self.base).to_array(),
            self.scale.to_array(),
        )
    }
}

pub struct ResourceSession {
    scene_id: String,
    settings: SessionSettings,
    aspect: f32,
    context: Option<ContextHandle>,
    camera: Option<CameraHandle>,
    lights: Vec<LightHandle>,
    splats: Vec<SplatInstance>,
    orbit: OrbitCamera,
    drag: DragState,
    active: bool,
}

impl ResourceSession {
    /// Allocates a context on `surface`, sets up camera and lights, waits for the
    /// backend, instantiates every placement of `scene` and starts the frame loop.
    /// On failure everything created so far is released before returning.
    pub fn build(
        backend: &mut dyn RenderBackend,
        scene: &SceneDescriptor,
        surface: &SurfaceHandle,
        settings: &SessionSettings,
    ) -> Result<Self, SessionError> {
        if scene.instances.is_empty() {
            return Err(SessionError::EmptyScene(scene.id.clone()));
        }
        let mut session = Self {
            scene_id: scene.id.clone(),
            settings: settings.clone(),
            aspect: surface.aspect(),
            context: None,
            camera: None,
            lights: Vec::new(),
            splats: Vec::new(),
            orbit: OrbitCamera::new(settings.eye, settings.target),
            drag: DragState::default(),
            active: false,
        };

        match session.populate(backend, scene, surface) {
            Ok(()) => {
                log::info!(
                    "Session built for '{}' ({} splats)",
                    scene.id,
                    session.splats.len()
                );
                Ok(session)
            }
            Err(source) => {
                log::warn!("Session build for '{}' failed: {}", scene.id, source);
                session.teardown(backend);
                Err(SessionError::ResourceUnavailable {
                    scene: scene.id.clone(),
                    source,
                })
            }
        }
    }

    fn populate(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &SceneDescriptor,
        surface: &SurfaceHandle,
    ) -> Result<(), BackendError> {
        let context = backend.create_context(surface)?;
        self.context = Some(context);

        let camera = backend.create_camera(context, self.projection())?;
        self.camera = Some(camera);
        self.orbit.apply(backend, camera);

        let ambient = backend.add_light(
            context,
            Light::Ambient {
                color: WHITE,
                intensity: self.settings.ambient_intensity,
            },
        )?;
        self.lights.push(ambient);
        let directional = backend.add_light(
            context,
            Light::Directional {
                color: WHITE,
                intensity: self.settings.directional_intensity,
                position: self.settings.directional_position,
            },
        )?;
        self.lights.push(directional);

        backend.wait_until_ready(self.settings.readiness_timeout)?;

        for placement in &scene.instances {
            let handle = backend.create_splat(&placement.url)?;
            let instance = SplatInstance {
                handle,
                position: Vec3::from(placement.position),
                base: placement.orientation(),
                scale: Vec3::from(placement.scale),
                yaw: 0.0,
                pitch: 0.0,
            };
            self.splats.push(instance);
            backend.set_splat_transform(handle, instance.transform());
            backend.attach_splat(context, handle);
        }

        backend.start_animation_loop(context);
        self.active = true;
        Ok(())
    }

    /// Releases every resource this session holds. Safe to call repeatedly.
    pub fn teardown(&mut self, backend: &mut dyn RenderBackend) {
        let had_resources = self.context.is_some() || !self.splats.is_empty();
        if let Some(context) = self.context {
            backend.stop_animation_loop(context);
        }
        for splat in self.splats.drain(..) {
            if let Some(context) = self.context {
                backend.detach_splat(context, splat.handle);
            }
            backend.dispose_splat(splat.handle);
        }
        if let Some(context) = self.context {
            for light in self.lights.drain(..) {
                backend.remove_light(context, light);
            }
        }
        self.lights.clear();
        if let Some(context) = self.context.take() {
            backend.release_context(context);
        }
        self.camera = None;
        self.drag = DragState::default();
        self.active = false;
        if had_resources {
            log::info!("Session for '{}' torn down", self.scene_id);
        }
    }

    /// Advances the idle spin by one frame and renders.
    pub fn update(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        let (Some(context), Some(camera)) = (self.context, self.camera) else {
            return Ok(());
        };
        if !self.active {
            return Ok(());
        }
        let spin = self.settings.spin_per_frame;
        for splat in &mut self.splats {
            splat.yaw += spin;
            backend.set_splat_transform(splat.handle, splat.transform());
        }
        backend.render(context, camera)
    }

    pub fn reset_camera(&mut self, backend: &mut dyn RenderBackend) {
        self.orbit.reset();
        if let Some(camera) = self.camera {
            self.orbit.apply(backend, camera);
        }
    }

    pub fn move_camera(
        &mut self,
        backend: &mut dyn RenderBackend,
        movement: &CameraMovement,
        frame_dt: f32,
    ) -> bool {
        let Some(camera) = self.camera else {
            return false;
        };
        if self.orbit.update_movement(movement, frame_dt) {
            self.orbit.apply(backend, camera);
            return true;
        }
        false
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
        if let Some(context) = self.context {
            backend.resize_context(context, width, height);
        }
        if let Some(camera) = self.camera {
            backend.set_projection(camera, self.projection());
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.active {
            self.drag.pointer_down(x, y);
        }
    }

    pub fn pointer_move(&mut self, backend: &mut dyn RenderBackend, x: f32, y: f32) {
        let Some(delta) = self.drag.pointer_move(x, y) else {
            return;
        };
        let yaw = delta.x * self.settings.drag_sensitivity;
        let pitch = delta.y * self.settings.drag_sensitivity;
        for splat in &mut self.splats {
            splat.yaw += yaw;
            splat.pitch += pitch;
            backend.set_splat_transform(splat.handle, splat.transform());
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag.pointer_up();
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn context(&self) -> Option<ContextHandle> {
        self.context
    }

    pub fn splat_handles(&self) -> Vec<SplatHandle> {
        self.splats.iter().map(|splat| splat.handle).collect()
    }

    /// Accumulated (yaw, pitch) of each splat.
    pub fn splat_angles(&self) -> Vec<(f32, f32)> {
        self.splats
            .iter()
            .map(|splat| (splat.yaw, splat.pitch))
            .collect()
    }

    pub fn orbit(&self) -> &OrbitCamera {
        &self.orbit
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    fn projection(&self) -> Projection {
        Projection {
            fov_y_deg: self.settings.fov_y_deg,
            aspect: self.aspect,
            near: self.settings.near,
            far: self.settings.far,
        }
    }
}

impl Drop for ResourceSession {
    fn drop(&mut self) {
        if self.context.is_some() {
            log::warn!(
                "Session for '{}' dropped without teardown; backend resources leaked",
                self.scene_id
            );
        }
    }
}

/// Holds at most one live session and enforces teardown before the next build.
#[derive(Default)]
pub struct SessionSlot {
    current: Option<ResourceSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &SceneDescriptor,
        surface: &SurfaceHandle,
        settings: &SessionSettings,
    ) -> Result<&mut ResourceSession, SessionError> {
        self.close(backend);
        let session = ResourceSession::build(backend, scene, surface, settings)?;
        Ok(self.current.insert(session))
    }

    pub fn close(&mut self, backend: &mut dyn RenderBackend) -> bool {
        match self.current.take() {
            Some(mut session) => {
                session.teardown(backend);
                true
            }
            None => false,
        }
    }

    pub fn get(&self) -> Option<&ResourceSession> {
        self.current.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut ResourceSession> {
        self.current.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .map(ResourceSession::is_active)
            .unwrap_or(false)
    }

    /// Forgets the session without releasing it. Used right before the process is
    /// replaced, when the backend state dies with the process anyway.
    pub fn abandon(&mut self) {
        if let Some(mut session) = self.current.take() {
            log::debug!("Abandoning session for '{}' ahead of restart", session.scene_id);
            session.context = None;
            session.camera = None;
            session.lights.clear();
            session.splats.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{spz, AssetLoader};
    use crate::render::HeadlessBackend;
    use crate::scene::SplatPlacement;

    fn scene_with(dir: &tempfile::TempDir, id: &str, count: usize) -> SceneDescriptor {
        let instances = (0..count)
            .map(|index| {
                let path = dir.path().join(format!("{}-{}.spz", id, index));
                std::fs::write(&path, spz::encode_header(2, 10)).unwrap();
                SplatPlacement {
                    url: path.to_string_lossy().to_string(),
                    position: [index as f32 * 2.0, 0.0, -3.0],
                    rotation: [1.0, 0.0, 0.0, 0.0],
                    scale: [0.8, 0.8, 0.8],
                }
            })
            .collect();
        SceneDescriptor {
            id: id.to_string(),
            title: id.to_string(),
            gallery_title: None,
            description: String::new(),
            model_label: None,
            instances,
        }
    }

    fn backend() -> HeadlessBackend {
        HeadlessBackend::new(AssetLoader::offline()).with_reinitialization()
    }

    #[test]
    fn build_attaches_every_placement_with_default_rig() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with(&dir, "robots", 3);
        let mut backend = backend();
        let mut session = ResourceSession::build(
            &mut backend,
            &scene,
            &SurfaceHandle::offscreen(800, 600),
            &SessionSettings::default(),
        )
        .unwrap();

        let context = session.context().unwrap();
        assert!(session.is_active());
        assert_eq!(backend.attached(context).len(), 3);
        assert_eq!(backend.stats().animation_loops, 1);

        let lights = backend.lights(context);
        assert_eq!(lights.len(), 2);
        assert!(matches!(lights[0], Light::Ambient { intensity, .. } if intensity == 0.6));
        assert!(matches!(
            lights[1],
            Light::Directional { intensity, position, .. }
                if intensity == 0.8 && position == Vec3::new(1.0, 1.0, 1.0)
        ));
        assert!((session.orbit().eye() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);

        session.teardown(&mut backend);
    }

    #[test]
    fn teardown_is_idempotent_and_leaves_nothing_attached() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with(&dir, "butterfly", 1);
        let mut backend = backend();
        let mut session = ResourceSession::build(
            &mut backend,
            &scene,
            &SurfaceHandle::offscreen(800, 600),
            &SessionSettings::default(),
        )
        .unwrap();

        session.teardown(&mut backend);
        session.teardown(&mut backend);
        assert!(!session.is_active());
        assert!(session.splat_handles().is_empty());
        let stats = backend.stats();
        assert_eq!(stats.live_contexts, 0);
        assert_eq!(stats.live_splats, 0);
        assert_eq!(stats.attached_splats, 0);
        assert_eq!(stats.animation_loops, 0);
    }

    #[test]
    fn failed_build_releases_partial_resources() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = scene_with(&dir, "valley", 2);
        scene.instances[1].url = dir.path().join("missing.spz").to_string_lossy().to_string();
        let mut backend = backend();
        let result = ResourceSession::build(
            &mut backend,
            &scene,
            &SurfaceHandle::offscreen(800, 600),
            &SessionSettings::default(),
        );
        assert!(matches!(
            result,
            Err(SessionError::ResourceUnavailable { .. })
        ));
        let stats = backend.stats();
        assert_eq!(stats.live_contexts, 0);
        assert_eq!(stats.live_splats, 0);
    }

    #[test]
    fn readiness_timeout_is_a_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with(&dir, "cat", 1);
        let mut backend = backend().with_readiness_failure();
        let result = ResourceSession::build(
            &mut backend,
            &scene,
            &SurfaceHandle::offscreen(800, 600),
            &SessionSettings::default(),
        );
        assert!(matches!(
            result,
            Err(SessionError::ResourceUnavailable {
                source: BackendError::ReadinessTimeout(_),
                ..
            })
        ));
        assert_eq!(backend.stats().live_contexts, 0);
    }

    #[test]
    fn update_spins_and_drag_rotates_every_splat() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with(&dir, "food", 3);
        let mut backend = backend();
        let mut session = ResourceSession::build(
            &mut backend,
            &scene,
            &SurfaceHandle::offscreen(800, 600),
            &SessionSettings::default(),
        )
        .unwrap();

        let first = session.splat_handles()[0];
        let placed = backend.splat_transform(first).unwrap();
        session.update(&mut backend).unwrap();
        session.update(&mut backend).unwrap();
        assert_ne!(backend.splat_transform(first), Some(placed));
        for (yaw, pitch) in session.splat_angles() {
            assert!((yaw - 0.01).abs() < 1e-6);
            assert_eq!(pitch, 0.0);
        }
        assert_eq!(backend.stats().frames_rendered, 2);

        session.pointer_down(100.0, 100.0);
        session.pointer_move(&mut backend, 110.0, 95.0);
        session.pointer_up();
        session.pointer_move(&mut backend, 500.0, 500.0);
        for (yaw, pitch) in session.splat_angles() {
            assert!((yaw - 0.11).abs() < 1e-5);
            assert!((pitch + 0.05).abs() < 1e-5);
        }

        session.pointer_down(0.0, 0.0);
        session.teardown(&mut backend);
        assert!(!session.is_dragging());
    }

    #[test]
    fn reset_camera_returns_to_default_pose() {
        let dir = tempfile::tempdir().unwrap();
        let scene = scene_with(&dir, "butterfly", 1);
        let mut backend = backend();
        let mut session = ResourceSession::build(
            &mut backend,
            &scene,
            &SurfaceHandle::offscreen(800, 600),
            &SessionSettings::default(),
        )
        .unwrap();
        let camera = session.camera.unwrap();
        let home_view = backend.camera_view(camera).unwrap();
        let movement = CameraMovement {
            orbit_left: true,
            ..CameraMovement::default()
        };
        assert!(session.move_camera(&mut backend, &movement, 0.5));
        assert!(!session.orbit().is_home());
        assert_ne!(backend.camera_view(camera), Some(home_view));

        session.reset_camera(&mut backend);
        assert!(session.orbit().is_home());
        let view = backend.camera_view(camera).unwrap();
        assert!(view.abs_diff_eq(home_view, 1e-5));
        session.teardown(&mut backend);
    }

    #[test]
    fn slot_tears_down_before_rebuilding() {
        let dir = tempfile::tempdir().unwrap();
        let butterfly = scene_with(&dir, "butterfly", 1);
        let robots = scene_with(&dir, "robots", 3);
        let surface = SurfaceHandle::offscreen(800, 600);
        let settings = SessionSettings::default();
        let mut backend = backend();
        let mut slot = SessionSlot::new();

        slot.replace(&mut backend, &butterfly, &surface, &settings)
            .unwrap();
        slot.replace(&mut backend, &robots, &surface, &settings)
            .unwrap();
        let stats = backend.stats();
        assert_eq!(stats.live_contexts, 1);
        assert_eq!(stats.attached_splats, 3);
        assert_eq!(slot.get().unwrap().scene_id(), "robots");

        slot.get_mut().unwrap().resize(&mut backend, 1024, 512);
        let context = slot.get().unwrap().context().unwrap();
        assert_eq!(backend.context_size(context), Some((1024, 512)));

        assert!(slot.close(&mut backend));
        assert!(!slot.close(&mut backend));
        assert_eq!(backend.stats().live_contexts, 0);
    }
}
