//! Durable string-keyed settings table.
//!
//! The whole table lives in memory and is written out as one JSON document on
//! every mutation. Writes are write-through: the in-memory value is updated
//! even when persisting fails, and the failure is reported to the caller.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, warn};

/// Well-known keys behind the getter/setter command pairs.
pub mod keys {
    pub const SWITCH_ADDRESS: &str = "switchAddress";
    pub const IMAGE_SWITCH_ADDRESS: &str = "imageSwitchAddress";
    pub const USE_API_CLIENT_LOAD_IMAGE: &str = "useApiClientLoadImage";
    pub const PROXY: &str = "proxy";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
}

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize properties: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct PropertyStore {
    /// Backing document; changes when the data root is migrated.
    document: RwLock<PathBuf>,
    /// Held across serialize-and-write so documents land in mutation order.
    table: Mutex<HashMap<String, String>>,
}

impl PropertyStore {
    /// Open the store, loading `document` if it exists.
    ///
    /// A missing or malformed document yields an empty table.
    pub fn open(document: impl Into<PathBuf>) -> Self {
        let document = document.into();
        let table = load_document(&document);
        debug!(
            "Loaded {} properties from {}",
            table.len(),
            document.display()
        );
        Self {
            document: RwLock::new(document),
            table: Mutex::new(table),
        }
    }

    /// Stored value for `name`, or `default` when absent.
    pub fn get(&self, name: &str, default: &str) -> String {
        self.lock_table()
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn set(&self, name: &str, value: &str) -> Result<(), PropertyError> {
        let mut table = self.lock_table();
        table.insert(name.to_string(), value.to_string());
        self.persist(&table)
    }

    /// Remove several keys with a single document write.
    pub fn remove(&self, names: &[&str]) -> Result<(), PropertyError> {
        let mut table = self.lock_table();
        for name in names {
            table.remove(*name);
        }
        self.persist(&table)
    }

    pub fn len(&self) -> usize {
        self.lock_table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn document_path(&self) -> PathBuf {
        self.document
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Point the store at a new backing document without reloading.
    ///
    /// Used after the data root moved: the document moved along with it and
    /// the in-memory table is already its superset.
    pub fn relocate(&self, document: impl Into<PathBuf>) {
        let document = document.into();
        debug!("Property document now at {}", document.display());
        *self
            .document
            .write()
            .unwrap_or_else(PoisonError::into_inner) = document;
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, table: &HashMap<String, String>) -> Result<(), PropertyError> {
        let path = self.document_path();
        let content = serde_json::to_string_pretty(table)?;
        write_replace(&path, content.as_bytes()).map_err(|source| {
            warn!("Error saving properties to {}: {}", path.display(), source);
            PropertyError::Io {
                path: path.clone(),
                source,
            }
        })
    }
}

fn load_document(path: &Path) -> HashMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("Error loading properties from {}: {}", path.display(), e);
            return HashMap::new();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring malformed properties in {}: {}", path.display(), e);
        HashMap::new()
    })
}

/// Replace `path` with `contents` via a sibling temp file and rename, so a
/// crash never leaves a half-written document behind.
pub(crate) fn write_replace(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = replace_temp(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// Sibling that [`write_replace`] writes before renaming into place.
pub(crate) fn replace_temp(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
