//! File move strategies and the recursive tree walk shared by both.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::MoveStrategyKind;

/// Moves one non-directory entry to a destination path.
pub trait EntryMover: Send + Sync {
    fn name(&self) -> &'static str;

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Atomic rename, only valid within one volume.
pub struct RenameMover;

impl EntryMover for RenameMover {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// Copy then delete, for crossing volumes.
///
/// The copy lands in a hidden sibling first and is renamed into place, so a
/// rerun after a crash overwrites leftovers instead of tripping over them.
pub struct CopyMover;

impl EntryMover for CopyMover {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        let partial = partial_path(to);
        let meta = fs::symlink_metadata(from)?;

        if meta.file_type().is_symlink() {
            copy_symlink(from, &partial)?;
        } else {
            fs::copy(from, &partial)?;
        }

        if let Err(e) = fs::rename(&partial, to) {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        fs::remove_file(from)
    }
}

fn partial_path(to: &Path) -> PathBuf {
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    to.with_file_name(format!(".{name}.partial"))
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    match fs::remove_file(to) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Move `from` to `to`, preserving names.
///
/// Walks contents first: every non-directory entry (symlinks included) is
/// handed to `mover`, and each source directory is recreated at the
/// destination and removed once its contents are gone. Returns the number
/// of non-directory entries moved.
pub fn move_tree(mover: &dyn EntryMover, from: &Path, to: &Path) -> io::Result<u64> {
    let mut moved = 0;
    for entry in WalkDir::new(from)
        .follow_root_links(false)
        .contents_first(true)
    {
        let entry = entry?;
        let rel = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let dest = if rel.as_os_str().is_empty() {
            to.to_path_buf()
        } else {
            to.join(rel)
        };

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
            fs::remove_dir(entry.path())?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            mover.move_file(entry.path(), &dest)?;
            moved += 1;
        }
    }
    Ok(moved)
}

/// Probe file name used by [`rename_supported`].
pub(crate) const PROBE_FILE: &str = ".pic2acg-rename-probe";

/// Whether a file can be renamed from `from_dir` into `to_dir`.
///
/// Leaves no probe behind in either directory.
pub fn rename_supported(from_dir: &Path, to_dir: &Path) -> bool {
    let source = from_dir.join(PROBE_FILE);
    let dest = to_dir.join(PROBE_FILE);

    if let Err(e) = fs::write(&source, b"probe") {
        debug!("Rename probe could not be written: {}", e);
        return false;
    }

    match fs::rename(&source, &dest) {
        Ok(()) => {
            let _ = fs::remove_file(&dest);
            true
        }
        Err(e) => {
            debug!("Rename probe failed ({}), falling back to copy", e);
            let _ = fs::remove_file(&source);
            false
        }
    }
}

/// Pick the mover for a migration between two existing directories.
pub fn select_mover(kind: MoveStrategyKind, from_dir: &Path, to_dir: &Path) -> Box<dyn EntryMover> {
    match kind {
        MoveStrategyKind::Rename => Box::new(RenameMover),
        MoveStrategyKind::Copy => Box::new(CopyMover),
        MoveStrategyKind::Auto if rename_supported(from_dir, to_dir) => Box::new(RenameMover),
        MoveStrategyKind::Auto => Box::new(CopyMover),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("cache/images/deep")).unwrap();
        fs::write(root.join("properties.json"), "{}").unwrap();
        fs::write(root.join("cache/index.db"), "index").unwrap();
        fs::write(root.join("cache/images/deep/1.jpg"), vec![7u8; 4096]).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
    }

    fn assert_moved(src: &Path, dst: &Path) {
        assert!(!src.join("cache").exists());
        assert_eq!(fs::read_to_string(dst.join("cache/index.db")).unwrap(), "index");
        assert_eq!(
            fs::read(dst.join("cache/images/deep/1.jpg")).unwrap(),
            vec![7u8; 4096]
        );
        assert!(dst.join("empty").is_dir());
    }

    #[test]
    fn test_move_tree_with_rename() {
        let temp = TempDir::new().unwrap();
        let (src, dst) = (temp.path().join("src"), temp.path().join("dst"));
        populate(&src);

        for name in ["cache", "empty", "properties.json"] {
            move_tree(&RenameMover, &src.join(name), &dst.join(name)).unwrap();
        }
        assert_moved(&src, &dst);
        assert!(!src.join("properties.json").exists());
    }

    #[test]
    fn test_move_tree_with_copy() {
        let temp = TempDir::new().unwrap();
        let (src, dst) = (temp.path().join("src"), temp.path().join("dst"));
        populate(&src);

        let moved = move_tree(&CopyMover, &src.join("cache"), &dst.join("cache")).unwrap();
        move_tree(&CopyMover, &src.join("empty"), &dst.join("empty")).unwrap();
        assert_eq!(moved, 2);
        assert_moved(&src, &dst);
        assert!(!dst.join("cache/.index.db.partial").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dir_moves_as_link() {
        let temp = TempDir::new().unwrap();
        let (src, dst) = (temp.path().join("src"), temp.path().join("dst"));
        let outside = temp.path().join("outside");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("keep.txt"), "keep").unwrap();
        std::os::unix::fs::symlink(&outside, src.join("link")).unwrap();

        let moved = move_tree(&CopyMover, &src.join("link"), &dst.join("link")).unwrap();
        assert_eq!(moved, 1);
        assert_eq!(fs::read_link(dst.join("link")).unwrap(), outside);
        assert!(outside.join("keep.txt").exists());
    }

    #[test]
    fn test_copy_overwrites_leftover_from_interrupted_run() {
        let temp = TempDir::new().unwrap();
        let (src, dst) = (temp.path().join("src"), temp.path().join("dst"));
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("a.txt"), "complete").unwrap();
        fs::write(dst.join("a.txt"), "compl").unwrap();
        fs::write(dst.join(".a.txt.partial"), "co").unwrap();

        CopyMover.move_file(&src.join("a.txt"), &dst.join("a.txt")).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "complete");
        assert!(!src.join("a.txt").exists());
    }

    #[test]
    fn test_rename_probe_on_same_volume() {
        let temp = TempDir::new().unwrap();
        let (a, b) = (temp.path().join("a"), temp.path().join("b"));
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();

        assert!(rename_supported(&a, &b));
        assert!(!a.join(PROBE_FILE).exists());
        assert!(!b.join(PROBE_FILE).exists());
        assert_eq!(select_mover(MoveStrategyKind::Auto, &a, &b).name(), "rename");
        assert_eq!(select_mover(MoveStrategyKind::Copy, &a, &b).name(), "copy");
    }

    #[test]
    fn test_rename_probe_into_missing_dir_fails_cleanly() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        fs::create_dir_all(&a).unwrap();

        assert!(!rename_supported(&a, &temp.path().join("missing")));
        assert!(!a.join(PROBE_FILE).exists());
    }
}
