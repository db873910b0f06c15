//! Recursive file watcher over one or more project roots.
//!
//! notify delivers raw events on its own thread; they are translated there
//! into [`FileChange`]s (project-relative tree path plus fresh content) and
//! forwarded over an unbounded channel. Dropping or closing the
//! [`WatchSession`] stops delivery and closes the channel.

use std::fs;
use std::path::{Component, Path, PathBuf};

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::mpsc;

use worksync_core::types::tree_path;

use crate::error::{io_err, DaemonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Watched root the change happened under.
    pub root: PathBuf,
    /// Tree path relative to `root` (`/src/a.ts`).
    pub path: String,
    pub kind: ChangeKind,
    /// New content; `None` for removals and unreadable (e.g. binary) files.
    pub content: Option<String>,
}

impl FileChange {
    /// Creations and removals change the tree shape; edits do not.
    pub fn is_structural(&self) -> bool {
        self.kind != ChangeKind::Modified
    }
}

pub struct WatchSession {
    watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl WatchSession {
    pub fn start(
        roots: &[PathBuf],
        ignore: Vec<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FileChange>), DaemonError> {
        // Canonicalize so that FSEvents paths (which arrive as real paths, e.g.
        // /private/var/... on macOS) match the prefix checks below.
        let roots = roots
            .iter()
            .map(|root| fs::canonicalize(root).map_err(|e| io_err(root, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let callback_roots = roots.clone();
        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
            Ok(event) => {
                for change in translate(&callback_roots, &ignore, &event) {
                    let _ = tx.send(change);
                }
            }
            Err(err) => tracing::warn!(error = %err, "watcher event error"),
        })?;

        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            tracing::debug!(path = %root.display(), "watching project root");
        }
        Ok((Self { watcher, roots }, rx))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Stop watching. Pending receivers see the channel close.
    pub fn close(mut self) {
        for root in &self.roots {
            if let Err(err) = self.watcher.unwatch(root) {
                tracing::debug!(path = %root.display(), error = %err, "unwatch failed");
            }
        }
    }
}

fn translate(roots: &[PathBuf], ignore: &[String], event: &Event) -> Vec<FileChange> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            let (root, relative) = roots
                .iter()
                .find_map(|root| path.strip_prefix(root).ok().map(|rel| (root, rel)))?;
            if relative.as_os_str().is_empty() || is_ignored(relative, ignore) || path.is_dir() {
                return None;
            }
            let content = match kind {
                ChangeKind::Removed => None,
                _ => fs::read_to_string(path).ok(),
            };
            // Renames away surface as modifications of a path that is gone.
            let kind = if content.is_none() && !path.exists() {
                ChangeKind::Removed
            } else {
                kind
            };
            Some(FileChange {
                root: root.clone(),
                path: tree_path(&slash_path(relative)),
                kind,
                content,
            })
        })
        .collect()
}

fn is_ignored(relative: &Path, ignore: &[String]) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => ignore.iter().any(|i| name == i.as_str()),
        _ => false,
    })
}

fn slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    use super::*;

    fn event(kind: EventKind, path: PathBuf) -> Event {
        Event::new(kind).add_path(path)
    }

    #[test]
    fn modification_carries_relative_path_and_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(dir.path()).expect("canonical");
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::write(root.join("src/a.ts"), "A").expect("write");

        let changes = translate(
            &[root.clone()],
            &[],
            &event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                root.join("src/a.ts"),
            ),
        );
        assert_eq!(
            changes,
            vec![FileChange {
                root,
                path: "/src/a.ts".to_string(),
                kind: ChangeKind::Modified,
                content: Some("A".to_string()),
            }]
        );
    }

    #[test]
    fn ignored_and_metadata_events_are_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(dir.path()).expect("canonical");
        fs::create_dir_all(root.join(".git")).expect("mkdir");
        fs::write(root.join(".git/HEAD"), "ref").expect("write");
        fs::write(root.join("a.ts"), "A").expect("write");
        let ignore = vec![".git".to_string()];

        let git = translate(
            &[root.clone()],
            &ignore,
            &event(EventKind::Create(CreateKind::File), root.join(".git/HEAD")),
        );
        assert!(git.is_empty());

        let chmod = translate(
            &[root.clone()],
            &ignore,
            &event(
                EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
                root.join("a.ts"),
            ),
        );
        assert!(chmod.is_empty());
    }

    #[test]
    fn vanished_path_is_reported_as_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(dir.path()).expect("canonical");

        let removed = translate(
            &[root.clone()],
            &[],
            &event(EventKind::Remove(RemoveKind::File), root.join("gone.ts")),
        );
        assert_eq!(removed[0].kind, ChangeKind::Removed);
        assert!(removed[0].is_structural());

        let renamed_away = translate(
            &[root.clone()],
            &[],
            &event(EventKind::Modify(ModifyKind::Any), root.join("gone.ts")),
        );
        assert_eq!(renamed_away[0].kind, ChangeKind::Removed);
        assert_eq!(renamed_away[0].content, None);
    }

    #[test]
    fn paths_outside_every_root_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = fs::canonicalize(dir.path()).expect("canonical");
        let changes = translate(
            &[root.join("project")],
            &[],
            &event(EventKind::Create(CreateKind::File), root.join("elsewhere.ts")),
        );
        assert!(changes.is_empty());
    }
}
