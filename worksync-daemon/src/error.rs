use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watcher and the editing session runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("core error: {0}")]
    Core(#[from] worksync_core::CoreError),

    #[error("sync error: {0}")]
    Sync(#[from] worksync_sync::SyncError),

    #[error("service error: {0}")]
    Service(#[from] worksync_sync::ServiceError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
