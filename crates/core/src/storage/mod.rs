//! Data root resolution and migration.
//!
//! The data root defaults to the files directory. A pointer file in the
//! files directory names any other root; it is the single source of truth
//! and is rewritten only after every entry has been moved, so an interrupted
//! migration leaves the old root authoritative.
//!
//! While entries are moving, a marker in the files directory names the
//! target. A rerun into the same target finds the marker and resumes
//! without clearing the target, which by then holds the only copy of the
//! entries already moved.

mod mover;

pub use mover::{
    CopyMover, EntryMover, RenameMover, move_tree, rename_supported, select_mover,
};

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{MoveStrategyKind, StorageConfig};
use crate::paths::Paths;
use crate::properties::{replace_temp, write_replace};

/// Delimiter used by `getExtendDirs`.
pub const EXTEND_DIRS_DELIMITER: &str = "|";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("migration target must be an absolute path: {0}")]
    RelativeTarget(PathBuf),

    #[error("cannot migrate between nested roots {current} and {target}")]
    NestedTarget { current: PathBuf, target: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Progress of one migration, reported after each top-level entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationProgress {
    pub entry: String,
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// Target already is the current root; nothing touched.
    Unchanged,
    Moved {
        from: PathBuf,
        to: PathBuf,
        entries: usize,
        files: u64,
        strategy: &'static str,
    },
}

pub struct MigrationEngine {
    paths: Paths,
    strategy: MoveStrategyKind,
    extend_dirs: Vec<PathBuf>,
    /// Replaces strategy selection when set.
    mover: Option<Box<dyn EntryMover>>,
}

impl MigrationEngine {
    pub fn new(paths: Paths, storage: &StorageConfig) -> Self {
        Self {
            paths,
            strategy: storage.strategy,
            extend_dirs: storage.extend_dirs.iter().map(PathBuf::from).collect(),
            mover: None,
        }
    }

    /// Always move entries with `mover`.
    pub fn with_mover(mut self, mover: Box<dyn EntryMover>) -> Self {
        self.mover = Some(mover);
        self
    }

    pub fn default_root(&self) -> &Path {
        &self.paths.files_dir
    }

    /// Resolve the pointer file, falling back to the default root when it is
    /// absent or names something that is not a directory.
    pub fn current_root(&self) -> PathBuf {
        let pointer = self.paths.pointer_file();
        match fs::read_to_string(&pointer) {
            Ok(content) => {
                let root = PathBuf::from(content.trim());
                if root.is_dir() {
                    return root;
                }
                warn!(
                    "Data root pointer names {}, which is not a directory; using default",
                    root.display()
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Error reading {}: {}", pointer.display(), e),
        }
        self.paths.files_dir.clone()
    }

    /// Candidate data roots: configured extra roots, then the default.
    pub fn candidate_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.extend_dirs.clone();
        roots.push(self.paths.files_dir.clone());
        roots
    }

    /// An empty target stands for the default root; `.` and `..` in an
    /// absolute target are resolved lexically.
    pub fn resolve_target(&self, target: &Path) -> PathBuf {
        if target.as_os_str().is_empty() {
            self.paths.files_dir.clone()
        } else if target.is_absolute() {
            normalize(target)
        } else {
            target.to_path_buf()
        }
    }

    /// Whether `target` already names the current root, however spelled.
    pub fn is_current_root(&self, target: &Path) -> bool {
        same_location(&self.current_root(), &self.resolve_target(target))
    }

    /// Target of a migration that started and never finished.
    pub fn pending_target(&self) -> Option<PathBuf> {
        let content = fs::read_to_string(self.paths.migration_marker()).ok()?;
        let target = content.trim();
        (!target.is_empty()).then(|| PathBuf::from(target))
    }

    pub fn migrate(&self, target: &Path) -> Result<MigrationOutcome, StorageError> {
        self.migrate_with(target, &mut |_| {})
    }

    /// Move the whole data root to `target`.
    ///
    /// An empty `target` means the default root. Existing top-level entries
    /// of `target` are deleted first, unless this resumes an interrupted
    /// migration into the same target.
    pub fn migrate_with(
        &self,
        target: &Path,
        on_progress: &mut dyn FnMut(&MigrationProgress),
    ) -> Result<MigrationOutcome, StorageError> {
        let target = self.resolve_target(target);
        if !target.is_absolute() {
            return Err(StorageError::RelativeTarget(target));
        }

        let current = self.current_root();
        let pending = self.pending_target();
        if same_location(&current, &target) {
            debug!("Data root already at {}", target.display());
            if pending.is_some_and(|p| same_location(&p, &target)) {
                // Pointer was written but the marker outlived it
                self.remove_marker();
            }
            return Ok(MigrationOutcome::Unchanged);
        }

        let created = !target.exists();
        fs::create_dir_all(&target).map_err(io_error(&target))?;
        if let Err(e) = check_not_nested(&current, &target) {
            if created {
                let _ = fs::remove_dir(&target);
            }
            return Err(e);
        }

        match pending {
            Some(p) if same_location(&p, &target) => {
                info!(
                    "Resuming migration {} -> {}",
                    current.display(),
                    target.display()
                );
            }
            pending => {
                if let Some(p) = pending {
                    warn!(
                        "Abandoning unfinished migration into {}; entries moved there stay there",
                        p.display()
                    );
                }
                info!(
                    "Migrating data root {} -> {}",
                    current.display(),
                    target.display()
                );
                let marker = self.paths.migration_marker();
                write_replace(&marker, target.to_string_lossy().as_bytes())
                    .map_err(io_error(&marker))?;
                self.clear_target(&target)?;
            }
        }

        let entries = self.movable_entries(&current)?;
        let selected;
        let mover: &dyn EntryMover = match &self.mover {
            Some(mover) => mover.as_ref(),
            None => {
                selected = select_mover(self.strategy, &current, &target);
                selected.as_ref()
            }
        };
        debug!("Moving {} entries with {}", entries.len(), mover.name());

        let total = entries.len();
        let mut files = 0;
        for (i, name) in entries.iter().enumerate() {
            let from = current.join(name);
            let to = target.join(name);
            files += move_tree(mover, &from, &to).map_err(|source| {
                error!(
                    "Migration stopped at {}: {}; {} stays the data root",
                    from.display(),
                    source,
                    current.display()
                );
                StorageError::Move {
                    from: from.clone(),
                    to: to.clone(),
                    source,
                }
            })?;
            on_progress(&MigrationProgress {
                entry: name.to_string_lossy().into_owned(),
                done: i + 1,
                total,
            });
        }

        self.write_pointer(&target)?;
        self.remove_marker();
        info!(
            "Data root now at {} ({} files moved)",
            target.display(),
            files
        );

        Ok(MigrationOutcome::Moved {
            from: current,
            to: target,
            entries: total,
            files,
            strategy: mover.name(),
        })
    }

    /// Files that belong to the files directory itself and never move,
    /// including the temporaries of their atomic replacement.
    fn is_fixed(&self, path: &Path) -> bool {
        [
            self.paths.pointer_file(),
            self.paths.migration_marker(),
            self.paths.config_file(),
        ]
        .iter()
        .any(|fixed| path == fixed || path == replace_temp(fixed))
    }

    fn clear_target(&self, target: &Path) -> Result<(), StorageError> {
        for entry in fs::read_dir(target).map_err(io_error(target))? {
            let path = entry.map_err(io_error(target))?.path();
            if self.is_fixed(&path) {
                continue;
            }
            let meta = fs::symlink_metadata(&path).map_err(io_error(&path))?;
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(io_error(&path))?;
            debug!("Cleared {}", path.display());
        }
        Ok(())
    }

    fn movable_entries(&self, current: &Path) -> Result<Vec<OsString>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(current).map_err(io_error(current))? {
            let entry = entry.map_err(io_error(current))?;
            if self.is_fixed(&entry.path()) {
                continue;
            }
            names.push(entry.file_name());
        }
        names.sort();
        Ok(names)
    }

    fn write_pointer(&self, target: &Path) -> Result<(), StorageError> {
        let pointer = self.paths.pointer_file();
        if target == self.paths.files_dir {
            match fs::remove_file(&pointer) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error(&pointer)(e)),
            }
        } else {
            write_replace(&pointer, target.to_string_lossy().as_bytes())
                .map_err(io_error(&pointer))
        }
    }

    /// The pointer is already authoritative here; a marker that cannot be
    /// removed only costs a warning.
    fn remove_marker(&self) {
        let marker = self.paths.migration_marker();
        match fs::remove_file(&marker) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Error removing {}: {}", marker.display(), e),
        }
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Equal paths, or two existing paths resolving to the same directory.
fn same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Reject roots where one contains the other; moving would recurse into
/// itself or clearing the target would destroy the source.
fn check_not_nested(current: &Path, target: &Path) -> Result<(), StorageError> {
    let current_real = fs::canonicalize(current).map_err(io_error(current))?;
    let target_real = fs::canonicalize(target).map_err(io_error(target))?;

    if current_real.starts_with(&target_real) || target_real.starts_with(&current_real) {
        return Err(StorageError::NestedTarget {
            current: current.to_path_buf(),
            target: target.to_path_buf(),
        });
    }
    Ok(())
}
