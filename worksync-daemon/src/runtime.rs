//! Editing session runtime.
//!
//! Wires the pieces of a live session together:
//!
//! ```text
//! WatchSession ──FileChange──▶ EditingSession ──schedule_flush / set_files──▶ SyncHandle
//!                                   │
//!                                   └─ structural change: rescan disk, Workspace::set_base
//! ```
//!
//! Every change schedules a flush; the synchronizer's debounce and no-op
//! detection decide whether anything is actually written.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use worksync_core::types::tree_path;
use worksync_core::{Config, ContextId, FileSystemProvider, LocalFileSystem, Workspace};
use worksync_sync::{
    ContextService, ContextSynchronizer, HttpContextService, SyncConfig, SyncError, SyncEvent,
    SyncHandle,
};

use crate::error::{io_err, DaemonError};
use crate::watch::{FileChange, WatchSession};

pub struct EditingSession {
    root: PathBuf,
    ignore: Vec<String>,
    fs: Arc<LocalFileSystem>,
    workspace: Workspace,
    sync: SyncHandle,
    sync_task: JoinHandle<Result<(), SyncError>>,
}

impl EditingSession {
    /// Fetch the context record, scan the project and start the synchronizer.
    ///
    /// The workspace selection is seeded from the record's source files.
    pub async fn open(
        root: &Path,
        context_id: ContextId,
        service: Arc<dyn ContextService>,
        config: &Config,
    ) -> Result<Self, DaemonError> {
        let fs = Arc::new(LocalFileSystem::new(root, config.ignore.clone()));
        let record = service.get(&context_id).await?;

        let mut workspace = Workspace::new(fs.get_tree()?);
        workspace
            .selection_mut()
            .set_selected(record.source_files.iter().map(|f| tree_path(&f.path)));

        let (sync, sync_task) = ContextSynchronizer::spawn(
            &record,
            service,
            fs.clone(),
            SyncConfig::from_config(config),
        );
        tracing::info!(
            root = %root.display(),
            context = %context_id,
            selected = workspace.selected_files().len(),
            "editing session opened",
        );

        Ok(Self {
            root: root.to_path_buf(),
            ignore: config.ignore.clone(),
            fs,
            workspace,
            sync,
            sync_task,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    /// Apply raw checked keys and push the resulting leaf paths to the
    /// synchronizer.
    pub fn select<I, S>(&mut self, raw_checked_keys: I) -> Result<Vec<String>, DaemonError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emitted = self.workspace.on_check(raw_checked_keys);
        self.sync.set_files(emitted.iter().cloned())?;
        Ok(emitted)
    }

    /// React to one watcher event.
    pub fn on_change(&mut self, change: &FileChange) -> Result<(), DaemonError> {
        tracing::debug!(path = %change.path, kind = ?change.kind, "file change");
        if change.is_structural() {
            match self.fs.get_tree() {
                Ok(tree) => {
                    let before = self.workspace.selected_files();
                    self.workspace.set_base(tree);
                    let after = self.workspace.selected_files();
                    if before != after {
                        self.sync.set_files(after)?;
                        return Ok(());
                    }
                }
                // The tree stays stale until the next structural change.
                Err(err) => tracing::warn!(error = %err, "rescan failed; keeping previous tree"),
            }
        }
        self.sync.schedule_flush()?;
        Ok(())
    }

    /// Watch the project until `shutdown` resolves, then flush and stop.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), DaemonError>
    where
        F: Future<Output = ()>,
    {
        let (watcher, mut changes) = WatchSession::start(&[self.root.clone()], self.ignore.clone())?;
        let mut events = self.sync.subscribe();
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutting down editing session");
                    break Ok(());
                }
                change = changes.recv() => {
                    let Some(change) = change else { break Ok(()) };
                    if let Err(err) = self.on_change(&change) {
                        break Err(err);
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "sync event receiver lagged");
                    }
                    Err(RecvError::Closed) => {
                        break Err(DaemonError::ChannelClosed("sync events"));
                    }
                },
            }
        };

        watcher.close();
        // Close even after an error so a pending flush is drained.
        let closed = self.close().await;
        outcome.and(closed)
    }

    /// Flush pending changes and wait for the synchronizer to stop.
    pub async fn close(self) -> Result<(), DaemonError> {
        self.sync.shutdown()?;
        match self.sync_task.await {
            Ok(result) => Ok(result?),
            Err(err) => Err(DaemonError::Join {
                task: "context_synchronizer",
                message: err.to_string(),
            }),
        }
    }
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::Flushed { fields } => tracing::info!(fields = ?fields, "context synced"),
        SyncEvent::Unchanged => tracing::debug!("context already up to date"),
        SyncEvent::Failed { message } => {
            tracing::warn!(error = %message, "context sync failed; will retry")
        }
    }
}

/// Open a session against the configured server, apply `select` and run
/// until ctrl-c. Blocks the current thread.
pub fn run_blocking(
    root: &Path,
    context_id: ContextId,
    select: Vec<String>,
    config: Config,
) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    runtime.block_on(async move {
        let service = Arc::new(HttpContextService::from_config(&config)?);
        let mut session = EditingSession::open(root, context_id, service, &config).await?;
        if !select.is_empty() {
            let keys: Vec<String> = select.iter().map(|p| tree_path(p)).collect();
            let selected = session.select(keys)?;
            tracing::info!(files = selected.len(), "initial selection applied");
        }
        session
            .run(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %err, "ctrl-c handler failed");
                }
            })
            .await
    })
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
