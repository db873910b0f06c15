//! # worksync-sync
//!
//! Remote-facing half of the engine: the debounced, cancellable
//! [`ContextSynchronizer`] and the [`Generator`] that drives the iteration
//! history through the generation service.
//!
//! Both talk to the outside world only through the [`ContextService`] and
//! [`GenerationService`] traits; [`http`] provides the reqwest-backed
//! implementations.

pub mod debounce;
pub mod error;
pub mod generation;
pub mod http;
pub mod service;
pub mod snapshot;
pub mod synchronizer;

pub use debounce::{Debounce, DebounceState};
pub use error::{ServiceError, SyncError};
pub use generation::Generator;
pub use http::{HttpClient, HttpContextService, HttpGenerationService};
pub use service::{ContextService, GenerationService};
pub use snapshot::{DesiredState, LocalSelection};
pub use synchronizer::{ContextSynchronizer, SyncConfig, SyncEvent, SyncHandle, SyncStatus};
