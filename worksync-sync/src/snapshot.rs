//! Local selection and the desired remote context state derived from it.

use std::collections::{BTreeMap, BTreeSet};

use worksync_core::types::relative_path;
use worksync_core::{ContextRecord, ContextUpdate, CoreError, FileSystemProvider, SourceFile};

/// What the user has selected: project-relative file paths plus rule and
/// image ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSelection {
    pub files: BTreeSet<String>,
    pub rule_ids: BTreeSet<String>,
    pub image_ids: BTreeSet<String>,
}

impl LocalSelection {
    /// Seed from a fetched record.
    pub fn from_record(record: &ContextRecord) -> Self {
        Self {
            files: record
                .source_files
                .iter()
                .map(|f| relative_path(&f.path).to_string())
                .collect(),
            rule_ids: record.text_block_ids.clone(),
            image_ids: record.image_ids.clone(),
        }
    }

    /// Replace the file selection. Accepts tree or relative paths.
    pub fn set_files<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.files = paths
            .into_iter()
            .map(|p| relative_path(p.as_ref()).to_string())
            .collect();
    }

    /// Read every selected file's current content.
    ///
    /// Files that no longer exist, are not text, or cannot be read are
    /// dropped from the result so the rest of the selection still syncs.
    pub fn resolve(&self, fs: &dyn FileSystemProvider) -> Result<DesiredState, CoreError> {
        let mut files = BTreeMap::new();
        for path in &self.files {
            match fs.read_file(path) {
                Ok(Some(content)) => {
                    files.insert(path.clone(), content);
                }
                Ok(None) => tracing::warn!(path = %path, "selected file vanished; dropping from context"),
                Err(CoreError::NotText { .. }) => {
                    tracing::warn!(path = %path, "selected file is not text; dropping from context")
                }
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "selected file unreadable; dropping from context")
                }
            }
        }
        Ok(DesiredState {
            files,
            rule_ids: self.rule_ids.clone(),
            image_ids: self.image_ids.clone(),
        })
    }
}

/// The full context the server should hold. Order-insensitive by
/// construction, so equality is a set comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    /// Relative path -> content.
    pub files: BTreeMap<String, String>,
    pub rule_ids: BTreeSet<String>,
    pub image_ids: BTreeSet<String>,
}

impl DesiredState {
    pub fn from_record(record: &ContextRecord) -> Self {
        Self {
            files: record
                .source_files
                .iter()
                .map(|f| (relative_path(&f.path).to_string(), f.content.clone()))
                .collect(),
            rule_ids: record.text_block_ids.clone(),
            image_ids: record.image_ids.clone(),
        }
    }

    /// Partial update carrying every field that differs from any of `bases`.
    ///
    /// With a single base this is the plain diff against the acknowledged
    /// snapshot. With an in-flight write as a second base, fields that write
    /// touched are re-sent so an aborted-but-applied write gets overwritten.
    pub fn diff_against(&self, bases: &[&DesiredState]) -> ContextUpdate {
        let mut update = ContextUpdate::default();
        if bases.iter().any(|b| b.files != self.files) {
            update.source_files = Some(self.source_files());
        }
        if bases.iter().any(|b| b.rule_ids != self.rule_ids) {
            update.text_block_ids = Some(self.rule_ids.iter().cloned().collect());
        }
        if bases.iter().any(|b| b.image_ids != self.image_ids) {
            update.image_ids = Some(self.image_ids.iter().cloned().collect());
        }
        update
    }

    pub fn diff(&self, acknowledged: &DesiredState) -> ContextUpdate {
        self.diff_against(&[acknowledged])
    }

    pub fn source_files(&self) -> Vec<SourceFile> {
        self.files
            .iter()
            .map(|(path, content)| SourceFile {
                path: path.clone(),
                content: content.clone(),
            })
            .collect()
    }
}
