//! Persistent key/value sidecar.
//!
//! A handful of request fields survive restarts. The store writes them as
//! plain strings under fixed keys and reads them back once at startup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

pub const LAST_VIEW_KEY: &str = "lastViewKey";
pub const LAST_REQUEST_TYPE: &str = "lastRequestType";
pub const LAST_METHOD: &str = "lastMethod";
pub const LAST_PAYLOAD: &str = "lastPayload";
pub const LAST_URL: &str = "lastURL";
pub const LAST_HEADERS: &str = "lastHeaders";
pub const LAST_RES_TRANSFORM: &str = "lastResTransform";

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("sidecar I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sidecar file is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait Sidecar {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SidecarError>;
}

/// In-memory sidecar, used by tests and when persistence is disabled.
#[derive(Debug, Clone, Default)]
pub struct MemorySidecar {
    values: HashMap<String, String>,
}

impl MemorySidecar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Sidecar for MemorySidecar {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SidecarError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Sidecar backed by a single JSON object on disk, rewritten on every set.
#[derive(Debug)]
pub struct FileSidecar {
    path: PathBuf,
    values: IndexMap<String, String>,
}

impl FileSidecar {
    /// Load `path`, or start empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SidecarError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => IndexMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), SidecarError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl Sidecar for FileSidecar {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SidecarError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}
