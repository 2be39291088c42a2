//! Atomic file operations
//!
//! Files are published in three steps:
//!
//! 1. Write to a temporary file (.tmp) next to the destination
//! 2. Call sync_all() to flush to disk
//! 3. Rename temp file to final path (atomic on most filesystems)
//!
//! Readers therefore see either nothing or the complete file. If any step
//! fails the temp file is removed, so no partial output is left behind.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Extension used for in-progress writes
pub const TEMP_EXTENSION: &str = "tmp";

/// Temp path used while publishing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    path.with_extension(TEMP_EXTENSION)
}

/// Atomically write content to a file
///
/// # Example
///
/// ```ignore
/// atomic_write("data/live.jsonl", "line1\nline2\n")?;
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> io::Result<()> {
    atomic_write_with(path, |file| file.write_all(content))
}

/// Atomically write content using a writer function
///
/// This is more efficient for large files as it doesn't require
/// building the entire content in memory first.
pub fn atomic_write_with<P, F>(path: P, write_fn: F) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let result = write_and_publish(path, &temp_path, write_fn);
    if result.is_err() && temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
        }
    }
    result
}

fn write_and_publish<F>(path: &Path, temp_path: &Path, write_fn: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut file = File::create(temp_path)?;
    write_fn(&mut file)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)
}

/// Clean up any leftover temp files from interrupted operations
///
/// Call this on startup to clean up .tmp files that may have been
/// left behind from crashes.
pub fn cleanup_temp_files<P: AsRef<Path>>(dir: P) -> io::Result<usize> {
    let dir = dir.as_ref();
    let mut cleaned = 0;

    if !dir.exists() {
        return Ok(0);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().map(|e| e == TEMP_EXTENSION).unwrap_or(false) {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed leftover temp file");
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backups").join("nested").join("a.json");

        atomic_write(&path, b"nested content").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "nested content");
    }

    #[test]
    fn test_failed_write_leaves_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");

        let result = atomic_write_with(&path, |file| {
            writeln!(file, "{{\"version\":")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("live.jsonl");
        atomic_write(&path, b"old").unwrap();

        let result = atomic_write_with(&path, |_| {
            Err(io::Error::new(io::ErrorKind::Other, "interrupted"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn test_cleanup_temp_files() {
        let temp_dir = TempDir::new().unwrap();

        fs::write(temp_dir.path().join("snapshot-a.tmp"), "temp1").unwrap();
        fs::write(temp_dir.path().join("snapshot-b.tmp"), "temp2").unwrap();
        fs::write(temp_dir.path().join("keep.json"), "keep").unwrap();

        let cleaned = cleanup_temp_files(temp_dir.path()).unwrap();
        assert_eq!(cleaned, 2);

        assert!(!temp_dir.path().join("snapshot-a.tmp").exists());
        assert!(temp_dir.path().join("keep.json").exists());
    }
}
