//! Unified diff preview of an iteration against the files on disk.
//!
//! Selecting a leaf in the merged tree shows what the iteration would change
//! in that file. Nothing is written.

use similar::TextDiff;

use crate::error::CoreError;
use crate::fs::FileSystemProvider;
use crate::types::{relative_path, ChangeType, Iteration};

/// A single file's preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePreview {
    /// Project-relative path.
    pub path: String,
    pub change_type: ChangeType,
    pub unified_diff: String,
}

/// Preview every file an iteration touches, in path order.
///
/// Files whose generated content already matches disk are skipped.
pub fn preview_iteration(
    fs: &dyn FileSystemProvider,
    iteration: &Iteration,
) -> Result<Vec<FilePreview>, CoreError> {
    let mut previews = Vec::new();
    for path in iteration.files.keys() {
        if let Some(preview) = preview_file(fs, iteration, path)? {
            previews.push(preview);
        }
    }
    Ok(previews)
}

/// Preview one file. `None` when the iteration does not touch `path` or the
/// content is unchanged.
pub fn preview_file(
    fs: &dyn FileSystemProvider,
    iteration: &Iteration,
    path: &str,
) -> Result<Option<FilePreview>, CoreError> {
    let relative = relative_path(path);
    let Some(generated) = iteration.files.get(relative) else {
        return Ok(None);
    };

    let existing = fs.read_file(relative)?.map(|c| normalize_line_endings(&c));
    let change_type = match (&existing, generated.deleted) {
        (_, true) => ChangeType::Deleted,
        (Some(_), false) => ChangeType::Modified,
        (None, false) => ChangeType::Added,
    };

    let old = existing.unwrap_or_default();
    let new = if generated.deleted {
        String::new()
    } else {
        normalize_line_endings(&generated.content)
    };
    if old == new {
        return Ok(None);
    }

    let old_header = format!("a/{relative}");
    let new_header = format!("b/{relative}");
    let unified_diff = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(FilePreview {
        path: relative.to_string(),
        change_type,
        unified_diff,
    }))
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
