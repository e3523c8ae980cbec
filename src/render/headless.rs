//! CPU-side rendering backend.
//!
//! Keeps the full scene graph bookkeeping of a real splat renderer (contexts,
//! cameras, lights, attached renderables, animation loops, buffer residency)
//! without touching a GPU. Like the WASM-backed renderer it stands in for, it can
//! only be initialized once per process: after a context has been released a new
//! one cannot be created.

use crate::assets::{AssetLoader, SplatAsset};
use crate::render::{
    BackendError, CameraHandle, ContextHandle, Light, LightHandle, Projection, RenderBackend,
    SplatHandle, SurfaceHandle,
};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct ContextState {
    width: u32,
    height: u32,
    external_surface: bool,
    lights: Vec<(LightHandle, Light)>,
    attached: Vec<SplatHandle>,
    animating: bool,
}

struct CameraState {
    context: ContextHandle,
    projection: Projection,
    view: Mat4,
}

struct SplatState {
    asset: Arc<SplatAsset>,
    transform: Mat4,
    attached_to: Option<ContextHandle>,
}

/// Snapshot of live backend resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub live_contexts: usize,
    pub live_cameras: usize,
    pub live_splats: usize,
    pub attached_splats: usize,
    pub resident_bytes: usize,
    pub animation_loops: usize,
    pub frames_rendered: u64,
}

pub struct HeadlessBackend {
    assets: AssetLoader,
    single_initialization: bool,
    ready: bool,
    fail_readiness: bool,
    contexts_released: usize,
    next_id: u64,
    contexts: HashMap<ContextHandle, ContextState>,
    cameras: HashMap<CameraHandle, CameraState>,
    splats: HashMap<SplatHandle, SplatState>,
    frames_rendered: u64,
}

impl HeadlessBackend {
    pub fn new(assets: AssetLoader) -> Self {
        Self {
            assets,
            single_initialization: true,
            ready: false,
            fail_readiness: false,
            contexts_released: 0,
            next_id: 1,
            contexts: HashMap::new(),
            cameras: HashMap::new(),
            splats: HashMap::new(),
            frames_rendered: 0,
        }
    }

    /// Allow contexts to be created again after a release.
    #[cfg(test)]
    pub fn with_reinitialization(mut self) -> Self {
        self.single_initialization = false;
        self
    }

    #[cfg(test)]
    pub fn with_readiness_failure(mut self) -> Self {
        self.fail_readiness = true;
        self
    }

    pub fn stats(&self) -> BackendStats {
        BackendStats {
            live_contexts: self.contexts.len(),
            live_cameras: self.cameras.len(),
            live_splats: self.splats.len(),
            attached_splats: self
                .contexts
                .values()
                .map(|context| context.attached.len())
                .sum(),
            resident_bytes: self
                .splats
                .values()
                .map(|splat| splat.asset.bytes.len())
                .sum(),
            animation_loops: self
                .contexts
                .values()
                .filter(|context| context.animating)
                .count(),
            frames_rendered: self.frames_rendered,
        }
    }

    pub fn attached(&self, context: ContextHandle) -> &[SplatHandle] {
        self.contexts
            .get(&context)
            .map(|state| state.attached.as_slice())
            .unwrap_or(&[])
    }

    pub fn splat_transform(&self, splat: SplatHandle) -> Option<Mat4> {
        self.splats.get(&splat).map(|state| state.transform)
    }

    pub fn camera_view(&self, camera: CameraHandle) -> Option<Mat4> {
        self.cameras.get(&camera).map(|state| state.view)
    }

    pub fn context_size(&self, context: ContextHandle) -> Option<(u32, u32)> {
        self.contexts
            .get(&context)
            .map(|state| (state.width, state.height))
    }

    pub fn lights(&self, context: ContextHandle) -> Vec<Light> {
        self.contexts
            .get(&context)
            .map(|state| state.lights.iter().map(|(_, light)| *light).collect())
            .unwrap_or_default()
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl RenderBackend for HeadlessBackend {
    fn wait_until_ready(&mut self, timeout: Duration) -> Result<(), BackendError> {
        if self.fail_readiness {
            return Err(BackendError::ReadinessTimeout(timeout));
        }
        if !self.ready {
            log::debug!("Headless backend static initialization complete");
            self.ready = true;
        }
        Ok(())
    }

    fn create_context(&mut self, surface: &SurfaceHandle) -> Result<ContextHandle, BackendError> {
        if self.single_initialization && self.contexts_released > 0 {
            return Err(BackendError::Reinitialization);
        }
        let handle = ContextHandle(self.next_handle());
        self.contexts.insert(
            handle,
            ContextState {
                width: surface.width.max(1),
                height: surface.height.max(1),
                external_surface: surface.window.is_some(),
                lights: Vec::new(),
                attached: Vec::new(),
                animating: false,
            },
        );
        log::debug!(
            "Context {:?} created {}x{} ({})",
            handle,
            surface.width,
            surface.height,
            if surface.window.is_some() {
                "host surface"
            } else {
                "offscreen"
            }
        );
        Ok(handle)
    }

    fn resize_context(&mut self, context: ContextHandle, width: u32, height: u32) {
        if let Some(state) = self.contexts.get_mut(&context) {
            state.width = width.max(1);
            state.height = height.max(1);
        }
    }

    fn release_context(&mut self, context: ContextHandle) {
        let Some(state) = self.contexts.remove(&context) else {
            return;
        };
        if !state.attached.is_empty() {
            log::warn!(
                "Context {:?} released with {} splats still attached",
                context,
                state.attached.len()
            );
            for splat in state.attached {
                if let Some(splat_state) = self.splats.get_mut(&splat) {
                    splat_state.attached_to = None;
                }
            }
        }
        self.cameras.retain(|_, camera| camera.context != context);
        self.contexts_released += 1;
        log::debug!(
            "Context {:?} released (external surface: {})",
            context,
            state.external_surface
        );
    }

    fn create_camera(
        &mut self,
        context: ContextHandle,
        projection: Projection,
    ) -> Result<CameraHandle, BackendError> {
        if !self.contexts.contains_key(&context) {
            return Err(BackendError::UnknownContext(context));
        }
        let handle = CameraHandle(self.next_handle());
        self.cameras.insert(
            handle,
            CameraState {
                context,
                projection,
                view: Mat4::IDENTITY,
            },
        );
        Ok(handle)
    }

    fn set_projection(&mut self, camera: CameraHandle, projection: Projection) {
        if let Some(state) = self.cameras.get_mut(&camera) {
            state.projection = projection;
        }
    }

    fn set_camera_pose(&mut self, camera: CameraHandle, eye: Vec3, target: Vec3, up: Vec3) {
        if let Some(state) = self.cameras.get_mut(&camera) {
            state.view = Mat4::look_at_rh(eye, target, up);
        }
    }

    fn add_light(
        &mut self,
        context: ContextHandle,
        light: Light,
    ) -> Result<LightHandle, BackendError> {
        let handle = LightHandle(self.next_handle());
        let state = self
            .contexts
            .get_mut(&context)
            .ok_or(BackendError::UnknownContext(context))?;
        state.lights.push((handle, light));
        Ok(handle)
    }

    fn remove_light(&mut self, context: ContextHandle, light: LightHandle) {
        if let Some(state) = self.contexts.get_mut(&context) {
            state.lights.retain(|(handle, _)| *handle != light);
        }
    }

    fn create_splat(&mut self, url: &str) -> Result<SplatHandle, BackendError> {
        let asset = self.assets.load(url)?;
        let handle = SplatHandle(self.next_handle());
        log::debug!(
            "Splat {:?} from {} ({} bytes, {} points, {} assets cached)",
            handle,
            url,
            asset.bytes.len(),
            asset
                .point_count()
                .map(|count| count.to_string())
                .unwrap_or_else(|| "?".to_string()),
            self.assets.loaded_count()
        );
        self.splats.insert(
            handle,
            SplatState {
                asset,
                transform: Mat4::IDENTITY,
                attached_to: None,
            },
        );
        Ok(handle)
    }

    fn set_splat_transform(&mut self, splat: SplatHandle, transform: Mat4) {
        if let Some(state) = self.splats.get_mut(&splat) {
            state.transform = transform;
        }
    }

    fn attach_splat(&mut self, context: ContextHandle, splat: SplatHandle) {
        let Some(splat_state) = self.splats.get_mut(&splat) else {
            log::warn!("attach of unknown splat {:?}", splat);
            return;
        };
        let Some(context_state) = self.contexts.get_mut(&context) else {
            log::warn!("attach to unknown context {:?}", context);
            return;
        };
        if splat_state.attached_to == Some(context) {
            return;
        }
        splat_state.attached_to = Some(context);
        context_state.attached.push(splat);
    }

    fn detach_splat(&mut self, context: ContextHandle, splat: SplatHandle) {
        if let Some(state) = self.contexts.get_mut(&context) {
            state.attached.retain(|handle| *handle != splat);
        }
        if let Some(state) = self.splats.get_mut(&splat) {
            if state.attached_to == Some(context) {
                state.attached_to = None;
            }
        }
    }

    fn dispose_splat(&mut self, splat: SplatHandle) {
        if let Some(state) = self.splats.remove(&splat) {
            if let Some(context) = state.attached_to {
                log::warn!("Splat {:?} disposed while attached to {:?}", splat, context);
                if let Some(context_state) = self.contexts.get_mut(&context) {
                    context_state.attached.retain(|handle| *handle != splat);
                }
            }
        }
    }

    fn start_animation_loop(&mut self, context: ContextHandle) {
        if let Some(state) = self.contexts.get_mut(&context) {
            state.animating = true;
        }
    }

    fn stop_animation_loop(&mut self, context: ContextHandle) {
        if let Some(state) = self.contexts.get_mut(&context) {
            state.animating = false;
        }
    }

    fn render(&mut self, context: ContextHandle, camera: CameraHandle) -> Result<(), BackendError> {
        let state = self
            .contexts
            .get(&context)
            .ok_or(BackendError::UnknownContext(context))?;
        let camera_state = self
            .cameras
            .get(&camera)
            .ok_or(BackendError::UnknownCamera(camera))?;
        let view_projection = camera_state.projection.matrix() * camera_state.view;
        let visible = state
            .attached
            .iter()
            .filter_map(|handle| self.splats.get(handle))
            .filter(|splat| {
                let clip = view_projection * splat.transform.w_axis;
                clip.w > 0.0
            })
            .count();
        self.frames_rendered += 1;
        log::trace!(
            "Frame {} on {:?}: {}/{} splats in front of the camera",
            self.frames_rendered,
            context,
            visible,
            state.attached.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::spz;

    fn backend_with_asset() -> (HeadlessBackend, tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("butterfly.spz");
        std::fs::write(&path, spz::encode_header(2, 100)).unwrap();
        let url = path.to_string_lossy().to_string();
        (HeadlessBackend::new(AssetLoader::offline()), dir, url)
    }

    #[test]
    fn attach_detach_dispose_bookkeeping() {
        let (mut backend, _dir, url) = backend_with_asset();
        let context = backend
            .create_context(&SurfaceHandle::offscreen(640, 480))
            .unwrap();
        let splat = backend.create_splat(&url).unwrap();
        backend.attach_splat(context, splat);
        backend.attach_splat(context, splat);
        assert_eq!(backend.attached(context), &[splat]);

        backend.detach_splat(context, splat);
        backend.dispose_splat(splat);
        let stats = backend.stats();
        assert_eq!(stats.attached_splats, 0);
        assert_eq!(stats.live_splats, 0);
        assert_eq!(stats.resident_bytes, 0);
    }

    #[test]
    fn refuses_second_initialization() {
        let (mut backend, _dir, _url) = backend_with_asset();
        let surface = SurfaceHandle::offscreen(64, 64);
        let context = backend.create_context(&surface).unwrap();
        backend.release_context(context);
        assert!(matches!(
            backend.create_context(&surface),
            Err(BackendError::Reinitialization)
        ));

        let (backend, _dir, _url) = backend_with_asset();
        let mut backend = backend.with_reinitialization();
        let context = backend.create_context(&surface).unwrap();
        backend.release_context(context);
        assert!(backend.create_context(&surface).is_ok());
    }

    #[test]
    fn releasing_context_drops_its_cameras() {
        let (mut backend, _dir, _url) = backend_with_asset();
        let context = backend
            .create_context(&SurfaceHandle::offscreen(64, 64))
            .unwrap();
        let projection = Projection {
            fov_y_deg: 60.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        };
        let camera = backend.create_camera(context, projection).unwrap();
        backend.render(context, camera).unwrap();
        backend.release_context(context);

        let stats = backend.stats();
        assert_eq!(stats.live_cameras, 0);
        assert_eq!(stats.frames_rendered, 1);
        assert!(backend.render(context, camera).is_err());
    }

    #[test]
    fn missing_asset_is_reported() {
        let (mut backend, dir, _url) = backend_with_asset();
        let missing = dir.path().join("missing.spz");
        assert!(matches!(
            backend.create_splat(&missing.to_string_lossy()),
            Err(BackendError::Asset(_))
        ));
    }
}
