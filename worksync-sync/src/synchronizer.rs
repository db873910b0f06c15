//! Debounced, cancellable context synchronizer.
//!
//! One actor task owns the local selection, the last acknowledged server
//! state and at most one in-flight write. Callers talk to it through a
//! cloneable [`SyncHandle`]:
//!
//! ```text
//! set_files / set_rules / set_images / schedule_flush
//!        │
//!        ▼
//!   Debounce::schedule ──(window elapses)──▶ flush
//!                                              │ resolve selection -> DesiredState
//!                                              │ diff vs acknowledged
//!                                              ├─ empty      -> SyncEvent::Unchanged
//!                                              └─ different  -> abort in-flight, spawn PATCH
//!                                                               │
//!                               outcome (seq-tagged) ◀──────────┘
//!                                 ├─ stale seq  -> dropped
//!                                 ├─ Ok         -> acknowledged = desired, SyncEvent::Flushed
//!                                 └─ Err        -> stay dirty, SyncEvent::Failed
//! ```
//!
//! While dirty and idle, a retry interval reschedules the flush so a failed
//! write is eventually repeated.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use worksync_core::{Config, ContextId, ContextRecord, FileSystemProvider};

use crate::debounce::Debounce;
use crate::error::{ServiceError, SyncError};
use crate::service::ContextService;
use crate::snapshot::{DesiredState, LocalSelection};

const EVENT_CAPACITY: usize = 64;

/// Timing knobs for one synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub debounce: Duration,
    /// `None` disables periodic retry of a dirty state.
    pub retry_interval: Option<Duration>,
}

impl SyncConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.debounce_window(),
            retry_interval: (config.retry_interval_secs > 0).then(|| config.retry_interval()),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Broadcast after every flush attempt that reaches a conclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A partial update was acknowledged. `fields` are its wire names.
    Flushed { fields: Vec<&'static str> },
    /// Desired state already matched the server; nothing was sent.
    Unchanged,
    /// The write or the local read failed; the state stays dirty.
    Failed { message: String },
}

/// Point-in-time view of the synchronizer, readable from any handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub dirty: bool,
    pub in_flight: bool,
    pub last_flushed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Number of PATCH requests dispatched, including superseded ones.
    pub writes: u64,
}

#[derive(Debug)]
enum SyncCommand {
    SetFiles(Vec<String>),
    SetRules(Vec<String>),
    SetImages(Vec<String>),
    ScheduleFlush,
    FlushNow,
    Shutdown,
}

/// Cloneable front door to a running [`ContextSynchronizer`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    context_id: ContextId,
    commands: mpsc::UnboundedSender<SyncCommand>,
    events: broadcast::Sender<SyncEvent>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncHandle {
    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Replace the selected files (tree or relative paths) and schedule a flush.
    pub fn set_files<I, S>(&self, paths: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(SyncCommand::SetFiles(
            paths.into_iter().map(Into::into).collect(),
        ))
    }

    /// Replace the selected rule (text block) ids and schedule a flush.
    pub fn set_rules<I, S>(&self, ids: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(SyncCommand::SetRules(ids.into_iter().map(Into::into).collect()))
    }

    pub fn set_images<I, S>(&self, ids: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(SyncCommand::SetImages(ids.into_iter().map(Into::into).collect()))
    }

    /// Mark the state dirty and (re)start the debounce window.
    ///
    /// Used by the file watcher: content of a selected file may have changed.
    pub fn schedule_flush(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::ScheduleFlush)
    }

    /// Skip the debounce window and flush immediately.
    pub fn flush_now(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::FlushNow)
    }

    /// Flush anything still pending, wait for the in-flight write, then stop.
    pub fn shutdown(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::Shutdown)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    fn send(&self, command: SyncCommand) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::ChannelClosed("context synchronizer"))
    }
}

struct InFlight {
    seq: u64,
    desired: DesiredState,
    fields: Vec<&'static str>,
    task: JoinHandle<()>,
}

struct WriteOutcome {
    seq: u64,
    result: Result<(), ServiceError>,
}

/// The actor behind a [`SyncHandle`].
pub struct ContextSynchronizer {
    context_id: ContextId,
    service: Arc<dyn ContextService>,
    fs: Arc<dyn FileSystemProvider>,
    selection: LocalSelection,
    acknowledged: DesiredState,
    debounce: Debounce,
    retry_interval: Option<Duration>,
    dirty: bool,
    in_flight: Option<InFlight>,
    next_seq: u64,
    writes: u64,
    last_flushed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    outcomes_tx: mpsc::UnboundedSender<WriteOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<WriteOutcome>,
    events: broadcast::Sender<SyncEvent>,
    /// Held back until the status reflecting them is published.
    pending_events: Vec<SyncEvent>,
    status: Arc<RwLock<SyncStatus>>,
}

impl ContextSynchronizer {
    /// Fetch the record, seed local state from it and start the actor.
    pub async fn open(
        context_id: ContextId,
        service: Arc<dyn ContextService>,
        fs: Arc<dyn FileSystemProvider>,
        config: SyncConfig,
    ) -> Result<(SyncHandle, JoinHandle<Result<(), SyncError>>), SyncError> {
        let record = service.get(&context_id).await?;
        tracing::info!(
            context = %context_id,
            files = record.source_files.len(),
            rules = record.text_block_ids.len(),
            images = record.image_ids.len(),
            "opened context",
        );
        Ok(Self::spawn(&record, service, fs, config))
    }

    /// Start the actor from an already fetched record.
    pub fn spawn(
        record: &ContextRecord,
        service: Arc<dyn ContextService>,
        fs: Arc<dyn FileSystemProvider>,
        config: SyncConfig,
    ) -> (SyncHandle, JoinHandle<Result<(), SyncError>>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let status = Arc::new(RwLock::new(SyncStatus::default()));

        let actor = Self {
            context_id: record.id.clone(),
            service,
            fs,
            selection: LocalSelection::from_record(record),
            acknowledged: DesiredState::from_record(record),
            debounce: Debounce::new(config.debounce),
            retry_interval: config.retry_interval,
            dirty: false,
            in_flight: None,
            next_seq: 0,
            writes: 0,
            last_flushed_at: None,
            last_error: None,
            outcomes_tx,
            outcomes_rx,
            events: events.clone(),
            pending_events: Vec::new(),
            status: status.clone(),
        };

        let handle = SyncHandle {
            context_id: record.id.clone(),
            commands: commands_tx,
            events,
            status,
        };
        let task = tokio::spawn(actor.run(commands_rx));
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SyncCommand>,
    ) -> Result<(), SyncError> {
        let mut retry = self.retry_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let deadline = self.debounce.deadline();
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        None | Some(SyncCommand::Shutdown) => break,
                        Some(command) => self.handle(command).await,
                    }
                }
                _ = sleep_until(deadline) => {
                    if self.debounce.fire(Instant::now()) {
                        self.flush().await;
                    }
                }
                Some(outcome) = self.outcomes_rx.recv() => self.settle(outcome),
                _ = next_tick(&mut retry) => self.retry(),
            }
            self.publish_status().await;
        }

        self.drain().await;
        tracing::debug!(context = %self.context_id, "context synchronizer stopped");
        Ok(())
    }

    async fn handle(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::SetFiles(paths) => {
                self.selection.set_files(paths);
                self.schedule_flush();
            }
            SyncCommand::SetRules(ids) => {
                self.selection.rule_ids = ids.into_iter().collect();
                self.schedule_flush();
            }
            SyncCommand::SetImages(ids) => {
                self.selection.image_ids = ids.into_iter().collect();
                self.schedule_flush();
            }
            SyncCommand::ScheduleFlush => self.schedule_flush(),
            SyncCommand::FlushNow => {
                self.debounce.cancel();
                self.dirty = true;
                self.flush().await;
            }
            SyncCommand::Shutdown => {}
        }
    }

    fn schedule_flush(&mut self) {
        self.dirty = true;
        self.debounce.schedule(Instant::now());
    }

    async fn flush(&mut self) {
        let desired = match self.resolve().await {
            Ok(desired) => desired,
            Err(err) => {
                self.fail(err.to_string());
                return;
            }
        };

        if let Some(in_flight) = &self.in_flight {
            if in_flight.desired == desired {
                tracing::debug!(seq = in_flight.seq, "desired state already in flight");
                return;
            }
        }

        let update = match &self.in_flight {
            Some(in_flight) => desired.diff_against(&[&self.acknowledged, &in_flight.desired]),
            None => desired.diff(&self.acknowledged),
        };
        if update.is_empty() {
            tracing::debug!(context = %self.context_id, "context unchanged; skipping write");
            self.dirty = false;
            self.emit(SyncEvent::Unchanged);
            return;
        }

        if let Some(previous) = self.in_flight.take() {
            previous.task.abort();
            tracing::debug!(seq = previous.seq, "aborted superseded context write");
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        let fields = update.field_names();
        let service = self.service.clone();
        let context_id = self.context_id.clone();
        let outcomes = self.outcomes_tx.clone();
        let task = tokio::spawn(async move {
            let result = service.patch(&context_id, &update).await;
            let _ = outcomes.send(WriteOutcome { seq, result });
        });

        tracing::debug!(seq, fields = ?fields, "dispatched context write");
        self.writes += 1;
        self.in_flight = Some(InFlight {
            seq,
            desired,
            fields,
            task,
        });
    }

    async fn resolve(&self) -> Result<DesiredState, SyncError> {
        let fs = self.fs.clone();
        let selection = self.selection.clone();
        let desired = tokio::task::spawn_blocking(move || selection.resolve(fs.as_ref()))
            .await
            .map_err(|err| SyncError::Join(format!("selection read: {err}")))??;
        Ok(desired)
    }

    fn settle(&mut self, outcome: WriteOutcome) {
        let in_flight = match self.in_flight.take() {
            Some(in_flight) if in_flight.seq == outcome.seq => in_flight,
            other => {
                self.in_flight = other;
                tracing::debug!(seq = outcome.seq, "dropping outcome of superseded write");
                return;
            }
        };

        match outcome.result {
            Ok(()) => {
                tracing::info!(
                    context = %self.context_id,
                    fields = ?in_flight.fields,
                    "context flushed",
                );
                self.acknowledged = in_flight.desired;
                self.dirty = self.debounce.is_pending();
                self.last_flushed_at = Some(Utc::now());
                self.last_error = None;
                self.emit(SyncEvent::Flushed {
                    fields: in_flight.fields,
                });
            }
            Err(ServiceError::Aborted) => {
                tracing::debug!(seq = outcome.seq, "context write aborted");
            }
            Err(err) => self.fail(err.to_string()),
        }
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(
            context = %self.context_id,
            error = %message,
            "context flush failed; state kept dirty",
        );
        self.dirty = true;
        self.last_error = Some(message.clone());
        self.emit(SyncEvent::Failed { message });
    }

    fn retry(&mut self) {
        if self.dirty && !self.debounce.is_pending() && self.in_flight.is_none() {
            tracing::debug!(context = %self.context_id, "retrying dirty context");
            self.debounce.schedule(Instant::now());
        }
    }

    /// Final flush on shutdown: a pending debounce fires immediately and the
    /// last in-flight write is awaited.
    async fn drain(&mut self) {
        if self.debounce.is_pending() {
            self.debounce.cancel();
            self.flush().await;
        }
        if let Some(seq) = self.in_flight.as_ref().map(|f| f.seq) {
            while let Some(outcome) = self.outcomes_rx.recv().await {
                let last = outcome.seq == seq;
                self.settle(outcome);
                if last {
                    break;
                }
            }
        }
        self.publish_status().await;
    }

    fn emit(&mut self, event: SyncEvent) {
        self.pending_events.push(event);
    }

    async fn publish_status(&mut self) {
        {
            let mut status = self.status.write().await;
            *status = SyncStatus {
                dirty: self.dirty,
                in_flight: self.in_flight.is_some(),
                last_flushed_at: self.last_flushed_at,
                last_error: self.last_error.clone(),
                writes: self.writes,
            };
        }
        for event in self.pending_events.drain(..) {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
