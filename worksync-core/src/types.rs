//! Domain types for trees, iterations, and context records.
//!
//! Wire-facing structs serialize with camelCase keys to match the remote
//! services; absent optionals are omitted rather than sent as `null`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for one generated iteration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IterationId(pub String);

impl fmt::Display for IterationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for IterationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IterationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed identifier for a generation artifact (one session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed identifier for the work item an editing session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub String);

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WorkItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed identifier for a remote context record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub String);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// File trees
// ---------------------------------------------------------------------------

/// Change classification of a leaf in a generated or merged tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Added => write!(f, "added"),
            ChangeType::Modified => write!(f, "modified"),
            ChangeType::Deleted => write!(f, "deleted"),
        }
    }
}

/// One entry in a hierarchical file snapshot.
///
/// A node is a directory iff `children` is `Some` (even when empty).
/// `path` is the identity key within one tree: `/` for the root, `/src/a.ts`
/// for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
}

impl FileNode {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: None,
            change_type: None,
        }
    }

    pub fn dir(name: impl Into<String>, path: impl Into<String>, children: Vec<FileNode>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: Some(children),
            change_type: None,
        }
    }

    /// Builder-style change tag.
    pub fn with_change(mut self, change: ChangeType) -> Self {
        self.change_type = Some(change);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Child slice; empty for leaves.
    pub fn children(&self) -> &[FileNode] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// Tree path (`/src/a.ts`) to project-relative path (`src/a.ts`).
pub fn relative_path(tree_path: &str) -> &str {
    tree_path.trim_start_matches('/')
}

/// Project-relative path (`src/a.ts`) to tree path (`/src/a.ts`).
pub fn tree_path(relative: &str) -> String {
    let trimmed = relative.trim_start_matches("./").trim_start_matches('/');
    format!("/{trimmed}")
}

// ---------------------------------------------------------------------------
// Iterations
// ---------------------------------------------------------------------------

/// A generated file entry inside an iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub content: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// A personality reference attached to a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub id: String,
}

/// One AI-generated code-change proposal. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: IterationId,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub files: BTreeMap<String, GeneratedFile>,
    #[serde(default)]
    pub personalities: Vec<Personality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// The iteration this one was forked from; `None` for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_from_iteration_id: Option<IterationId>,
}

/// A generation session as returned by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    #[serde(default)]
    pub iterations: Vec<Iteration>,
}

/// `POST /ai-coder/execute` body.
///
/// Absence of `artifact_id` creates a new session; its presence together
/// with `artifact_iteration_id` appends an iteration forked from that id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub work_item_id: WorkItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_iteration_id: Option<IterationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personality_ids: Vec<String>,
}

impl ExecuteRequest {
    /// True when this request starts a new session instead of forking.
    pub fn is_new_session(&self) -> bool {
        self.artifact_id.is_none()
    }
}

/// `POST /ai-coder/execute` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub artifact: Artifact,
    #[serde(default)]
    pub work_item: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Context records
// ---------------------------------------------------------------------------

/// A selected source file stored in a context record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Server-held bundle of selected files, rule references, and images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRecord {
    pub id: ContextId,
    #[serde(default)]
    pub source_files: Vec<SourceFile>,
    #[serde(default)]
    pub text_block_ids: BTreeSet<String>,
    #[serde(default)]
    pub image_ids: BTreeSet<String>,
}

/// `PATCH /context/:id` body. Only supplied fields are replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_files: Option<Vec<SourceFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_block_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ids: Option<Vec<String>>,
}

impl ContextUpdate {
    pub fn is_empty(&self) -> bool {
        self.source_files.is_none() && self.text_block_ids.is_none() && self.image_ids.is_none()
    }

    /// Wire names of the fields this update carries.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.source_files.is_some() {
            fields.push("sourceFiles");
        }
        if self.text_block_ids.is_some() {
            fields.push("textBlockIds");
        }
        if self.image_ids.is_some() {
            fields.push("imageIds");
        }
        fields
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(IterationId::from("it-1").to_string(), "it-1");
        assert_eq!(ArtifactId::from("art").to_string(), "art");
        assert_eq!(ContextId::from("ctx").to_string(), "ctx");
    }

    #[test]
    fn directory_classification_follows_children() {
        assert!(FileNode::dir("src", "/src", vec![]).is_dir());
        assert!(FileNode::file("a.ts", "/src/a.ts").is_leaf());
    }

    #[test]
    fn file_node_serializes_camel_case_and_omits_absent_fields() {
        let node = FileNode::file("a.ts", "/a.ts").with_change(ChangeType::Modified);
        let json = serde_json::to_value(&node).expect("serialize");
        assert_eq!(json["changeType"], "modified");
        assert!(json.get("children").is_none());
    }

    #[test]
    fn execute_request_omits_artifact_for_new_session() {
        let req = ExecuteRequest {
            work_item_id: WorkItemId::from("wi-1"),
            artifact_id: None,
            artifact_iteration_id: None,
            prompt: Some("add login".to_string()),
            provider: "anthropic".to_string(),
            personality_ids: vec![],
        };
        let json = serde_json::to_value(&req).expect("serialize");
        assert_eq!(json["workItemId"], "wi-1");
        assert!(json.get("artifactId").is_none());
        assert!(json.get("personalityIds").is_none());
        assert!(req.is_new_session());
    }

    #[test]
    fn context_update_lists_only_supplied_fields() {
        let update = ContextUpdate {
            image_ids: Some(vec!["img".to_string()]),
            ..Default::default()
        };
        assert_eq!(update.field_names(), vec!["imageIds"]);
        let json = serde_json::to_string(&update).expect("serialize");
        assert_eq!(json, r#"{"imageIds":["img"]}"#);
    }

    #[test]
    fn path_conversions() {
        assert_eq!(relative_path("/src/a.ts"), "src/a.ts");
        assert_eq!(tree_path("src/a.ts"), "/src/a.ts");
        assert_eq!(tree_path("./src/a.ts"), "/src/a.ts");
    }
}
