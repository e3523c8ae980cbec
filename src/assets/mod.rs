pub mod spz;

use sha2::{Digest, Sha256};
use spz::SpzHeader;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound for a single downloaded splat asset.
const MAX_ASSET_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Remote(String),
    Local(PathBuf),
}

impl AssetSource {
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            AssetSource::Remote(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            AssetSource::Local(PathBuf::from(path))
        } else {
            AssetSource::Local(PathBuf::from(trimmed))
        }
    }
}

/// Raw splat bytes plus whatever header could be decoded from them.
#[derive(Debug, Clone)]
pub struct SplatAsset {
    pub url: String,
    pub bytes: Vec<u8>,
    pub header: Option<SpzHeader>,
}

impl SplatAsset {
    pub fn point_count(&self) -> Option<u32> {
        self.header.map(|header| header.num_points)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read splat at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("{url} exceeds the {limit} byte asset limit")]
    TooLarge { url: String, limit: u64 },
    #[error("network fetch disabled (offline) for {url}")]
    Offline { url: String },
    #[error("splat asset is empty: {url}")]
    Empty { url: String },
    #[error("invalid spz asset {url}: {source}")]
    InvalidSpz {
        url: String,
        #[source]
        source: spz::SpzError,
    },
}

/// Resolves asset locations to bytes. Remote assets are cached on disk by URL hash,
/// every asset is kept in memory for the lifetime of the loader.
pub struct AssetLoader {
    cache_dir: Option<PathBuf>,
    offline: bool,
    loaded: HashMap<String, Arc<SplatAsset>>,
}

impl AssetLoader {
    pub fn new(cache_dir: Option<PathBuf>, offline: bool) -> Self {
        Self {
            cache_dir,
            offline,
            loaded: HashMap::new(),
        }
    }

    pub fn offline() -> Self {
        Self::new(None, true)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn load(&mut self, location: &str) -> Result<Arc<SplatAsset>, AssetError> {
        if let Some(asset) = self.loaded.get(location) {
            return Ok(Arc::clone(asset));
        }

        let bytes = match AssetSource::parse(location) {
            AssetSource::Local(path) => read_local(&path)?,
            AssetSource::Remote(url) => self.fetch_remote(&url)?,
        };
        if bytes.is_empty() {
            return Err(AssetError::Empty {
                url: location.to_string(),
            });
        }

        let header = if is_spz(location) {
            let header = spz::read_header(&bytes).map_err(|source| AssetError::InvalidSpz {
                url: location.to_string(),
                source,
            })?;
            log::debug!(
                "spz v{} '{}': {} points, sh degree {}, antialiased {}",
                header.version,
                location,
                header.num_points,
                header.sh_degree,
                header.antialiased()
            );
            Some(header)
        } else {
            None
        };

        let asset = Arc::new(SplatAsset {
            url: location.to_string(),
            bytes,
            header,
        });
        self.loaded.insert(location.to_string(), Arc::clone(&asset));
        Ok(asset)
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let cached = self.cache_path(url);
        if let Some(path) = &cached {
            if let Ok(bytes) = std::fs::read(path) {
                if !bytes.is_empty() {
                    log::debug!("Asset cache hit for {}", url);
                    return Ok(bytes);
                }
            }
        }
        if self.offline {
            return Err(AssetError::Offline {
                url: url.to_string(),
            });
        }

        log::info!("Fetching {}", url);
        let response = ureq::get(url).call().map_err(|err| AssetError::Fetch {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let bytes = read_capped(response.into_reader(), url, MAX_ASSET_BYTES)?;

        if let Some(path) = cached {
            if let Err(err) = write_cache(&path, &bytes) {
                log::warn!("Failed to cache {} at {}: {}", url, path.display(), err);
            }
        }
        Ok(bytes)
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        Some(dir.join(cache_file_name(url)))
    }
}

pub fn cache_file_name(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let extension = Path::new(url)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");
    format!("{:x}.{}", digest, extension)
}

/// Reads a download body, refusing anything longer than `limit` bytes.
fn read_capped(reader: impl Read, url: &str, limit: u64) -> Result<Vec<u8>, AssetError> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| AssetError::Fetch {
            url: url.to_string(),
            message: err.to_string(),
        })?;
    if bytes.len() as u64 > limit {
        return Err(AssetError::TooLarge {
            url: url.to_string(),
            limit,
        });
    }
    Ok(bytes)
}

fn is_spz(location: &str) -> bool {
    location
        .split(['?', '#'])
        .next()
        .map(|path| path.to_ascii_lowercase().ends_with(".spz"))
        .unwrap_or(false)
}

fn read_local(path: &Path) -> Result<Vec<u8>, AssetError> {
    std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn write_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let partial = path.with_extension("partial");
    std::fs::write(&partial, bytes)?;
    std::fs::rename(partial, path)
}
