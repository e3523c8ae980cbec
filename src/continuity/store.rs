use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session store file is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(test)]
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// String key/value storage that survives a process restart.
pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// JSON-file store for one studio session, kept at `<dir>/<session id>.json`.
/// Every mutation rewrites the whole file through a temporary file and a rename.
pub struct FileSessionStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSessionStore {
    /// Opens the store for `session_id`. An unreadable or corrupt file is logged and
    /// the session starts empty; a corrupt file is moved aside to `<id>.json.corrupt`.
    pub fn open(dir: &Path, session_id: &str) -> Self {
        if let Err(err) = std::fs::create_dir_all(dir) {
            log::warn!("Failed to create session dir {}: {}", dir.display(), err);
        }
        let path = dir.join(format!("{}.json", session_id));
        let values = match std::fs::read_to_string(&path) {
            Ok(json) if json.trim().is_empty() => BTreeMap::new(),
            Ok(json) => match serde_json::from_str(&json) {
                Ok(values) => values,
                Err(err) => {
                    log::warn!("Session file {} is malformed: {}", path.display(), err);
                    set_aside(&path);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                log::warn!("Failed to read session file {}: {}", path.display(), err);
                BTreeMap::new()
            }
        };
        log::debug!(
            "Session store {} opened with {} keys",
            path.display(),
            values.len()
        );
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the backing file. Called when the session ends for good.
    pub fn discard(self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path,
                source,
            }),
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.values)?;
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(|source| StoreError::Io {
            path: temp.clone(),
            source,
        })?;
        std::fs::rename(&temp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn set_aside(path: &Path) {
    let corrupt = path.with_extension("json.corrupt");
    match std::fs::rename(path, &corrupt) {
        Ok(()) => log::info!("Moved malformed session file to {}", corrupt.display()),
        Err(err) => log::warn!("Failed to move {} aside: {}", path.display(), err),
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.values.insert(key.to_string(), value.to_string());
        if let Err(err) = self.flush() {
            match previous {
                Some(previous) => self.values.insert(key.to_string(), previous),
                None => self.values.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let Some(previous) = self.values.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.flush() {
            self.values.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }
}
