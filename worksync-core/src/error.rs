//! Error types for worksync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config YAML parse error: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (config save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error (artifact files, context records).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file exists but is not UTF-8 text (e.g. an image).
    #[error("{path} is not a UTF-8 text file")]
    NotText { path: PathBuf },

    /// An illegal iteration history transition.
    #[error("invalid history state: {0}")]
    InvalidState(String),

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.worksync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
