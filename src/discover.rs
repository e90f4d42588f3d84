//! Filesystem discovery of candidate images.
//!
//! Walks a directory tree and returns the absolute path of every regular file
//! whose extension is one of [`SUPPORTED_EXTENSIONS`] (case-insensitive). A
//! relative root is resolved against the working directory; symlinks are left
//! as they are. Order is traversal order, and nothing downstream relies on it
//! beyond partitioning being stable within a run.
//!
//! Only a failure to read the root itself is an error. Unreadable entries below
//! the root are logged and skipped.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions accepted by discovery and by the transform.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif"];

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    NotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Cannot read {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DiscoveryError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Walk {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// True when `path` has one of the supported extensions.
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Recursively collect supported image files under `root`.
///
/// Returns an empty list (not an error) when nothing matches.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let root = &std::path::absolute(root).map_err(|e| DiscoveryError::from_io(root, e))?;
    let meta = std::fs::metadata(root).map_err(|e| DiscoveryError::from_io(root, e))?;
    if !meta.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }
    // Surface an unreadable root once, up front, rather than as a walk error.
    std::fs::read_dir(root).map_err(|e| DiscoveryError::from_io(root, e))?;

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.depth() == 0 {
                    let io_err = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop"));
                    return Err(DiscoveryError::from_io(root, io_err));
                }
                warn!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        if entry.file_type().is_file() && has_supported_extension(entry.path()) {
            found.push(entry.into_path());
        }
    }

    debug!("Discovered {} image(s) under {}", found.len(), root.display());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        let mut names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn finds_supported_files_recursively() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.jpg"));
        touch(&tmp.path().join("nested/b.PNG"));
        touch(&tmp.path().join("nested/deeper/c.TiF"));
        touch(&tmp.path().join("nested/deeper/d.jpeg"));
        touch(&tmp.path().join("e.tiff"));

        let found = discover(tmp.path()).unwrap();
        assert_eq!(
            names(&found),
            vec!["a.jpg", "b.PNG", "c.TiF", "d.jpeg", "e.tiff"]
        );
    }

    #[test]
    fn relative_root_yields_absolute_paths() {
        let tmp = tempfile::Builder::new()
            .prefix("discover-relative")
            .tempdir_in(".")
            .unwrap();
        assert!(tmp.path().is_relative());
        touch(&tmp.path().join("nested/a.jpg"));

        let found = discover(tmp.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_absolute());
        assert!(found[0].ends_with("nested/a.jpg"));
    }

    #[test]
    fn ignores_unsupported_and_extensionless_files() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("keep.jpg"));
        touch(&tmp.path().join("scan.bmp"));
        touch(&tmp.path().join("notes.txt"));
        touch(&tmp.path().join("README"));
        fs::create_dir_all(tmp.path().join("folder.jpg")).unwrap();

        let found = discover(tmp.path()).unwrap();
        assert_eq!(names(&found), vec!["keep.jpg"]);
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(discover(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            discover(&missing),
            Err(DiscoveryError::NotFound(p)) if p == missing
        ));
    }

    #[test]
    fn file_root_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.jpg");
        touch(&file);
        assert!(matches!(
            discover(&file),
            Err(DiscoveryError::NotADirectory(_))
        ));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_supported_extension(Path::new("x/IMG_01.JPG")));
        assert!(has_supported_extension(Path::new("x.Tif")));
        assert!(!has_supported_extension(Path::new("x.bmp")));
        assert!(!has_supported_extension(Path::new("jpg")));
    }
}
