//! Fixed, well-known locations of the application.
//!
//! The files directory is the built-in default data root. It also holds the
//! pointer file, the migration marker and the config file, which never move
//! with the data.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::ProjectDirs;

use crate::env::PIC2ACG_DATA_DIR;

/// Name of the pointer file recording a non-default data root.
pub const POINTER_FILE: &str = "data.local";

/// Name of the marker naming the target of an unfinished migration.
pub const MIGRATION_MARKER: &str = "data.migrating";

/// Name of the config file inside the files directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Name of the property document inside the data root.
pub const PROPERTIES_FILE: &str = "properties.json";

#[derive(Debug, Clone, Default)]
pub struct Paths {
    /// Built-in default data root (`Context.filesDir` on Android).
    pub files_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at an explicit files directory (mobile hosts pass theirs).
    ///
    /// A relative directory is made absolute against the working directory,
    /// so the default root stays a valid migration target.
    pub fn from_root(files_dir: impl Into<PathBuf>) -> Self {
        let files_dir = files_dir.into();
        let files_dir = std::path::absolute(&files_dir).unwrap_or(files_dir);
        Self { files_dir }
    }

    /// Resolve the files directory for desktop use.
    ///
    /// 1. `PIC2ACG_DATA_DIR` env var
    /// 2. XDG data dir (`~/.local/share/pic2acg`)
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = std::env::var(PIC2ACG_DATA_DIR)
            && !dir.is_empty()
        {
            return Ok(Self::from_root(dir));
        }

        let dirs = ProjectDirs::from("opensource", "pic2acg", "pic2acg")
            .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory"))?;
        Ok(Self::from_root(dirs.data_dir()))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.files_dir)?;
        Ok(())
    }

    pub fn pointer_file(&self) -> PathBuf {
        self.files_dir.join(POINTER_FILE)
    }

    pub fn migration_marker(&self) -> PathBuf {
        self.files_dir.join(MIGRATION_MARKER)
    }

    pub fn config_file(&self) -> PathBuf {
        self.files_dir.join(CONFIG_FILE)
    }

    /// Property document for a given data root.
    pub fn properties_file(root: &Path) -> PathBuf {
        root.join(PROPERTIES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_locations() {
        let paths = Paths::from_root("/data/user/0/app/files");
        assert_eq!(
            paths.pointer_file(),
            PathBuf::from("/data/user/0/app/files/data.local")
        );
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/data/user/0/app/files/config.toml")
        );
        assert_eq!(
            Paths::properties_file(Path::new("/sdcard/app")),
            PathBuf::from("/sdcard/app/properties.json")
        );
        assert_eq!(
            paths.migration_marker(),
            PathBuf::from("/data/user/0/app/files/data.migrating")
        );
    }

    #[test]
    fn test_relative_files_dir_is_made_absolute() {
        let paths = Paths::from_root("files");
        assert!(paths.files_dir.is_absolute());
        assert!(paths.files_dir.ends_with("files"));
        assert_eq!(
            paths.files_dir,
            std::env::current_dir().unwrap().join("files")
        );
    }
}
