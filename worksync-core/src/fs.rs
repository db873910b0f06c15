//! File system provider seam.
//!
//! The synchronizer and the diff preview read files through
//! [`FileSystemProvider`] so tests can substitute an in-memory tree.
//! Paths are accepted in either tree form (`/src/a.ts`) or project-relative
//! form (`src/a.ts`).

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{io_err, CoreError};
use crate::tree;
use crate::types::{relative_path, FileNode};

/// Point-in-time reads of a project directory.
pub trait FileSystemProvider: Send + Sync {
    /// File content, or `None` when the file does not exist.
    ///
    /// Binary content is [`CoreError::NotText`].
    fn read_file(&self, path: &str) -> Result<Option<String>, CoreError>;

    /// Snapshot of the whole project tree.
    fn get_tree(&self) -> Result<FileNode, CoreError>;
}

/// [`FileSystemProvider`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    ignore: Vec<String>,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>, ignore: Vec<String>) -> Self {
        Self {
            root: root.into(),
            ignore,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a tree or relative path. Rejects `..` escapes.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, CoreError> {
        let relative = Path::new(relative_path(path));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(io_err(
                relative,
                std::io::Error::new(ErrorKind::InvalidInput, "path escapes project root"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl FileSystemProvider for LocalFileSystem {
    fn read_file(&self, path: &str) -> Result<Option<String>, CoreError> {
        let absolute = self.resolve(path)?;
        match std::fs::read_to_string(&absolute) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                Err(CoreError::NotText { path: absolute })
            }
            Err(err) => Err(io_err(absolute, err)),
        }
    }

    fn get_tree(&self) -> Result<FileNode, CoreError> {
        tree::scan_tree(&self.root, &self.ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_tree_and_relative_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "export {}").unwrap();
        let fs = LocalFileSystem::new(dir.path(), vec![]);

        assert_eq!(fs.read_file("/src/a.ts").unwrap().as_deref(), Some("export {}"));
        assert_eq!(fs.read_file("src/a.ts").unwrap().as_deref(), Some("export {}"));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(dir.path(), vec![]);
        assert!(fs.read_file("/nope.txt").unwrap().is_none());
    }

    #[test]
    fn binary_file_is_not_text() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("logo.png"), [0x89, 0x50, 0xff, 0xfe, 0x00]).unwrap();
        let fs = LocalFileSystem::new(dir.path(), vec![]);

        let err = fs.read_file("/logo.png").unwrap_err();
        assert!(matches!(err, CoreError::NotText { .. }), "got {err:?}");
    }

    #[test]
    fn parent_escape_is_rejected() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(dir.path(), vec![]);
        let err = fs.read_file("../etc/passwd").unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }
}
