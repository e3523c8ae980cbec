use crate::session::SessionSettings;
use clap::Parser;
use glam::Vec3;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable carrying the session id across a restart.
pub const SESSION_ENV: &str = "SPLAT_STUDIO_SESSION";

#[derive(Parser, Debug, Clone, Default)]
#[command(
    about = "Splat scene studio with a scripted chat assistant",
    version
)]
pub struct Args {
    /// JSON file overriding the built-in settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Scene catalog JSON replacing the built-in catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Session id to resume (default: $SPLAT_STUDIO_SESSION or a new id)
    #[arg(long)]
    pub session: Option<String>,

    /// Directory holding per-session state files
    #[arg(long)]
    pub session_dir: Option<PathBuf>,

    /// Directory for downloaded splat assets
    #[arg(long)]
    pub asset_cache: Option<PathBuf>,

    /// Never fetch assets over the network
    #[arg(long)]
    pub offline: bool,

    /// Run with the console only, without opening a window
    #[arg(long)]
    pub headless: bool,

    /// Keep the session file when the studio exits
    #[arg(long)]
    pub keep_session: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid session id '{0}' (use letters, digits, '-' or '_')")]
    InvalidSessionId(String),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Time spent "thinking" before a routed reply is applied.
    pub processing_ms: u64,
    pub restart_ms: u64,
    pub resume_ms: u64,
    pub variant_ms: u64,
    pub enhance_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            processing_ms: 2000,
            restart_ms: 1000,
            resume_ms: 1000,
            variant_ms: 1500,
            enhance_ms: 2000,
        }
    }
}

impl DelayConfig {
    pub fn processing(&self) -> Duration {
        Duration::from_millis(self.processing_ms)
    }

    pub fn restart(&self) -> Duration {
        Duration::from_millis(self.restart_ms)
    }

    pub fn resume(&self) -> Duration {
        Duration::from_millis(self.resume_ms)
    }

    pub fn variant(&self) -> Duration {
        Duration::from_millis(self.variant_ms)
    }

    pub fn enhance(&self) -> Duration {
        Duration::from_millis(self.enhance_ms)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub eye: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 60.0,
            near: 0.1,
            far: 1000.0,
            eye: [0.0, 0.0, 5.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub ambient_intensity: f32,
    pub directional_intensity: f32,
    pub directional_position: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            ambient_intensity: 0.6,
            directional_intensity: 0.8,
            directional_position: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub spin_per_frame: f32,
    pub drag_sensitivity: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            spin_per_frame: 0.005,
            drag_sensitivity: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub catalog: Option<PathBuf>,
    pub session_dir: PathBuf,
    pub asset_cache: Option<PathBuf>,
    pub offline: bool,
    pub keep_session: bool,
    pub readiness_timeout_ms: u64,
    pub delays: DelayConfig,
    pub camera: CameraConfig,
    pub lights: LightConfig,
    pub motion: MotionConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            window_title: "Splat Studio".to_string(),
            window_width: 1280,
            window_height: 720,
            catalog: None,
            session_dir: std::env::temp_dir().join("splat-studio").join("sessions"),
            asset_cache: None,
            offline: false,
            keep_session: false,
            readiness_timeout_ms: 10_000,
            delays: DelayConfig::default(),
            camera: CameraConfig::default(),
            lights: LightConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Defaults, overlaid by `--config`, overlaid by the remaining flags.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(catalog) = &args.catalog {
            self.catalog = Some(catalog.clone());
        }
        if let Some(dir) = &args.session_dir {
            self.session_dir = dir.clone();
        }
        if let Some(dir) = &args.asset_cache {
            self.asset_cache = Some(dir.clone());
        }
        self.offline |= args.offline;
        self.keep_session |= args.keep_session;
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !(camera.fov_y_deg > 0.0 && camera.fov_y_deg < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.fov_y_deg must be within (0, 180), got {}",
                camera.fov_y_deg
            )));
        }
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera clip range {}..{} is empty",
                camera.near, camera.far
            )));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn asset_cache_dir(&self) -> PathBuf {
        self.asset_cache
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("splat-studio").join("assets"))
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            fov_y_deg: self.camera.fov_y_deg,
            near: self.camera.near,
            far: self.camera.far,
            eye: Vec3::from(self.camera.eye),
            target: Vec3::from(self.camera.target),
            ambient_intensity: self.lights.ambient_intensity,
            directional_intensity: self.lights.directional_intensity,
            directional_position: Vec3::from(self.lights.directional_position),
            spin_per_frame: self.motion.spin_per_frame,
            drag_sensitivity: self.motion.drag_sensitivity,
            readiness_timeout: Duration::from_millis(self.readiness_timeout_ms),
        }
    }
}

/// Session id from the flag, else the environment, else a fresh one.
pub fn resolve_session_id(
    flag: Option<&str>,
    env: Option<String>,
) -> Result<String, ConfigError> {
    let chosen = flag
        .map(str::to_string)
        .or_else(|| env.filter(|value| !value.trim().is_empty()));
    match chosen {
        Some(id) => {
            let id = id.trim().to_string();
            if id.is_empty()
                || !id
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
            {
                return Err(ConfigError::InvalidSessionId(id));
            }
            Ok(id)
        }
        None => Ok(new_session_id()),
    }
}

fn new_session_id() -> String {
    format!(
        "{:x}-{:x}",
        crate::conversation::unix_millis(),
        std::process::id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_studio_behaviour() {
        let config = StudioConfig::default();
        assert_eq!(config.delays.processing(), Duration::from_millis(2000));
        assert_eq!(config.delays.restart(), Duration::from_millis(1000));
        assert_eq!(config.session_settings(), SessionSettings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        std::fs::write(
            &path,
            r#"{ "delays": { "processing_ms": 10 }, "motion": { "spin_per_frame": 0.0 } }"#,
        )
        .unwrap();

        let args = Args {
            config: Some(path),
            offline: true,
            session_dir: Some(dir.path().join("sessions")),
            ..Args::default()
        };
        let config = StudioConfig::load(&args).unwrap();
        assert_eq!(config.delays.processing_ms, 10);
        assert_eq!(config.delays.resume_ms, 1000);
        assert_eq!(config.motion.spin_per_frame, 0.0);
        assert_eq!(config.motion.drag_sensitivity, 0.01);
        assert!(config.offline);
        assert_eq!(config.session_dir, dir.path().join("sessions"));
    }

    #[test]
    fn rejects_bad_camera_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        std::fs::write(&path, r#"{ "camera": { "near": 5.0, "far": 1.0 } }"#).unwrap();
        let args = Args {
            config: Some(path),
            ..Args::default()
        };
        assert!(matches!(
            StudioConfig::load(&args),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn parses_command_line() {
        let args = Args::parse_from([
            "splat-studio",
            "--session",
            "tab-7",
            "--offline",
            "--headless",
            "--keep-session",
        ]);
        assert_eq!(args.session.as_deref(), Some("tab-7"));
        assert!(args.offline && args.headless && args.keep_session);
    }

    #[test]
    fn session_id_resolution_order() {
        assert_eq!(
            resolve_session_id(Some("flag"), Some("env".to_string())).unwrap(),
            "flag"
        );
        assert_eq!(
            resolve_session_id(None, Some("env-id".to_string())).unwrap(),
            "env-id"
        );
        let fresh = resolve_session_id(None, Some("  ".to_string())).unwrap();
        assert!(!fresh.is_empty());
        assert!(matches!(
            resolve_session_id(Some("../etc"), None),
            Err(ConfigError::InvalidSessionId(_))
        ));
    }
}
