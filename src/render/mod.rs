mod camera;
pub mod headless;

pub use camera::{CameraMovement, OrbitCamera};
pub use headless::{BackendStats, HeadlessBackend};

use crate::assets::AssetError;
use glam::{Mat4, Vec3};
use raw_window_handle::RawWindowHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplatHandle(pub u64);

/// Output surface supplied by the host. A backend may render into it instead of
/// allocating its own target.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHandle {
    pub window: Option<RawWindowHandle>,
    pub width: u32,
    pub height: u32,
}

impl SurfaceHandle {
    pub fn offscreen(width: u32, height: u32) -> Self {
        Self {
            window: None,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect.max(1e-3),
            self.near,
            self.far,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    Directional {
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("rendering backend did not become ready within {0:?}")]
    ReadinessTimeout(Duration),
    #[error("rendering backend failed to initialize: {0}")]
    InitFailed(String),
    #[error("rendering backend cannot be initialized again in this process")]
    Reinitialization,
    #[error("unknown rendering context {0:?}")]
    UnknownContext(ContextHandle),
    #[error("unknown camera {0:?}")]
    UnknownCamera(CameraHandle),
    #[error("splat asset unavailable: {0}")]
    Asset(#[from] AssetError),
}

/// Boundary to the splat rendering library.
///
/// Handles are plain ids owned by the caller; the backend owns the GPU-side state
/// behind them until `dispose_splat` / `release_context` is called.
pub trait RenderBackend {
    /// Blocks until the backend's one-time static initialization has finished.
    /// Backends without a readiness signal are always ready.
    fn wait_until_ready(&mut self, _timeout: Duration) -> Result<(), BackendError> {
        Ok(())
    }

    fn create_context(&mut self, surface: &SurfaceHandle) -> Result<ContextHandle, BackendError>;

    fn resize_context(&mut self, context: ContextHandle, width: u32, height: u32);

    fn release_context(&mut self, context: ContextHandle);

    fn create_camera(
        &mut self,
        context: ContextHandle,
        projection: Projection,
    ) -> Result<CameraHandle, BackendError>;

    fn set_projection(&mut self, camera: CameraHandle, projection: Projection);

    fn set_camera_pose(&mut self, camera: CameraHandle, eye: Vec3, target: Vec3, up: Vec3);

    fn add_light(&mut self, context: ContextHandle, light: Light)
        -> Result<LightHandle, BackendError>;

    fn remove_light(&mut self, context: ContextHandle, light: LightHandle);

    /// Creates a renderable from an asset location. The result is not attached.
    fn create_splat(&mut self, url: &str) -> Result<SplatHandle, BackendError>;

    fn set_splat_transform(&mut self, splat: SplatHandle, transform: Mat4);

    fn attach_splat(&mut self, context: ContextHandle, splat: SplatHandle);

    fn detach_splat(&mut self, context: ContextHandle, splat: SplatHandle);

    /// Frees the GPU buffers behind `splat`. The handle is invalid afterwards.
    fn dispose_splat(&mut self, splat: SplatHandle);

    fn start_animation_loop(&mut self, context: ContextHandle);

    fn stop_animation_loop(&mut self, context: ContextHandle);

    fn render(&mut self, context: ContextHandle, camera: CameraHandle) -> Result<(), BackendError>;
}
