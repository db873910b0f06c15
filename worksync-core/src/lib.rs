//! Worksync core library: file trees, selection, iteration history, config.
//!
//! Public API surface:
//! - [`types`]: newtypes and domain structs shared with the remote services
//! - [`tree`]: merge / prune / scan for [`FileNode`] trees
//! - [`selection`]: checkbox key to leaf-path propagation
//! - [`history`]: branch-aware iteration history state machine
//! - [`workspace`]: the recomputed view tying the three together
//! - [`preview`]: unified diff of an iteration against disk
//! - [`config`]: `~/.worksync/config.yaml`
//! - [`fs`]: the file system provider seam

pub mod config;
pub mod error;
pub mod fs;
pub mod history;
pub mod preview;
pub mod selection;
pub mod tree;
pub mod types;
pub mod workspace;

pub use config::Config;
pub use error::CoreError;
pub use fs::{FileSystemProvider, LocalFileSystem};
pub use history::{EditDraft, EditMode, IterationHistory};
pub use selection::SelectionPropagator;
pub use types::{
    Artifact, ArtifactId, ChangeType, ContextId, ContextRecord, ContextUpdate, ExecuteRequest,
    ExecuteResponse, FileNode, GeneratedFile, Iteration, IterationId, Personality, SourceFile,
    WorkItemId,
};
pub use workspace::Workspace;
