//! Live editing session: file watcher + workspace rescans + context sync.

mod error;
pub mod runtime;
pub mod watch;

pub use error::DaemonError;
pub use runtime::{init_tracing, run_blocking, EditingSession};
pub use watch::{ChangeKind, FileChange, WatchSession};
