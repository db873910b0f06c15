//! Branch-aware iteration history for one work item.
//!
//! # States
//!
//! ```text
//! NoSession ──create──▶ HasIterations(iterations, selected)
//!                          │  add / select / edit
//!                          ▼
//!                       HasIterations
//! ```
//!
//! # API pattern
//!
//! Transitions that need the generation service are split in two:
//! - `prepare_*`: pure; validates the transition and returns the
//!   [`ExecuteRequest`] to send
//! - [`IterationHistory::apply`]: commits the service response
//!
//! A failed call simply never reaches `apply`, so the history is left
//! exactly as it was.

use crate::error::CoreError;
use crate::types::{
    ArtifactId, ExecuteRequest, ExecuteResponse, Iteration, IterationId, WorkItemId,
};

/// Coarse state of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    NoSession,
    HasIterations,
}

/// How the next generation request is addressed after [`IterationHistory::edit_iteration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditMode {
    /// The root was edited: the next request replaces the whole list.
    RestartSession,
    /// A later iteration was edited: fork from its predecessor.
    ForkFrom(IterationId),
}

/// Editable seed for the prompt editor, produced by [`IterationHistory::edit_iteration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub editing: IterationId,
    pub mode: EditMode,
    pub prompt: String,
    pub provider: Option<String>,
    pub personality_ids: Vec<String>,
}

/// Ordered iterations plus a selection pointer, scoped to one work item.
#[derive(Debug, Clone)]
pub struct IterationHistory {
    work_item_id: WorkItemId,
    artifact_id: Option<ArtifactId>,
    iterations: Vec<Iteration>,
    selected: Option<IterationId>,
    tip: Option<IterationId>,
    pending_edit: Option<EditMode>,
}

impl IterationHistory {
    pub fn new(work_item_id: WorkItemId) -> Self {
        Self {
            work_item_id,
            artifact_id: None,
            iterations: Vec::new(),
            selected: None,
            tip: None,
            pending_edit: None,
        }
    }

    /// Resume an existing session; the last iteration becomes tip and selection.
    pub fn from_artifact(work_item_id: WorkItemId, artifact: crate::types::Artifact) -> Self {
        let last = artifact.iterations.last().map(|it| it.id.clone());
        Self {
            work_item_id,
            artifact_id: Some(artifact.id),
            iterations: artifact.iterations,
            selected: last.clone(),
            tip: last,
            pending_edit: None,
        }
    }

    /// Snapshot as an artifact; `None` before a session exists.
    pub fn to_artifact(&self) -> Option<crate::types::Artifact> {
        self.artifact_id.as_ref().map(|id| crate::types::Artifact {
            id: id.clone(),
            iterations: self.iterations.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> HistoryState {
        if self.iterations.is_empty() {
            HistoryState::NoSession
        } else {
            HistoryState::HasIterations
        }
    }

    pub fn work_item_id(&self) -> &WorkItemId {
        &self.work_item_id
    }

    pub fn artifact_id(&self) -> Option<&ArtifactId> {
        self.artifact_id.as_ref()
    }

    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    pub fn get(&self, id: &IterationId) -> Option<&Iteration> {
        self.iterations.iter().find(|it| &it.id == id)
    }

    pub fn root(&self) -> Option<&Iteration> {
        self.iterations.first()
    }

    pub fn selected_id(&self) -> Option<&IterationId> {
        self.selected.as_ref()
    }

    pub fn selected(&self) -> Option<&Iteration> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    /// The most recently generated iteration: head of the visible history.
    pub fn tip(&self) -> Option<&Iteration> {
        self.tip.as_ref().and_then(|id| self.get(id))
    }

    pub fn pending_edit(&self) -> Option<&EditMode> {
        self.pending_edit.as_ref()
    }

    /// Lineage from the root to the tip, following parent links.
    ///
    /// Iterations without a recorded parent fall back to their list
    /// predecessor. Branches not on the tip's lineage stay reachable via
    /// [`IterationHistory::get`].
    pub fn visible_history(&self) -> Vec<&Iteration> {
        let mut chain = Vec::new();
        let mut cursor = self.tip();
        while let Some(iteration) = cursor {
            // Guard against cyclic parent links from a misbehaving server.
            if chain.len() > self.iterations.len() {
                tracing::warn!("iteration parent links form a cycle; truncating history");
                break;
            }
            chain.push(iteration);
            cursor = self.predecessor(&iteration.id);
        }
        chain.reverse();
        chain
    }

    fn position(&self, id: &IterationId) -> Option<usize> {
        self.iterations.iter().position(|it| &it.id == id)
    }

    /// Parent link when recorded, else the list predecessor.
    fn predecessor(&self, id: &IterationId) -> Option<&Iteration> {
        let index = self.position(id)?;
        match &self.iterations[index].start_from_iteration_id {
            Some(parent) => self.get(parent),
            None if index > 0 => self.iterations.get(index - 1),
            None => None,
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Request for a brand-new session. Valid from any state (full reset).
    pub fn prepare_create(
        &self,
        prompt: impl Into<String>,
        provider: impl Into<String>,
        personality_ids: Vec<String>,
    ) -> ExecuteRequest {
        ExecuteRequest {
            work_item_id: self.work_item_id.clone(),
            artifact_id: None,
            artifact_iteration_id: None,
            prompt: Some(prompt.into()),
            provider: provider.into(),
            personality_ids,
        }
    }

    /// Request for a new iteration forked from `start_from`.
    ///
    /// - A pending root edit turns this into [`IterationHistory::prepare_create`].
    /// - `start_from == None` uses the pending edit's fork point, else the
    ///   selected iteration.
    /// - Fails with [`CoreError::InvalidState`] from `NoSession` or when the
    ///   fork point cannot be resolved.
    pub fn prepare_add(
        &self,
        prompt: impl Into<String>,
        provider: impl Into<String>,
        personality_ids: Vec<String>,
        start_from: Option<&IterationId>,
    ) -> Result<ExecuteRequest, CoreError> {
        if self.pending_edit == Some(EditMode::RestartSession) {
            return Ok(self.prepare_create(prompt, provider, personality_ids));
        }

        let artifact_id = match (&self.artifact_id, self.state()) {
            (Some(artifact_id), HistoryState::HasIterations) => artifact_id.clone(),
            _ => {
                return Err(CoreError::InvalidState(
                    "cannot add an iteration before a session exists".to_string(),
                ))
            }
        };

        let fork_point = match (start_from, &self.pending_edit) {
            (Some(id), _) => id.clone(),
            (None, Some(EditMode::ForkFrom(id))) => id.clone(),
            (None, _) => self.selected.clone().ok_or_else(|| {
                CoreError::InvalidState("no iteration selected to fork from".to_string())
            })?,
        };
        if self.get(&fork_point).is_none() {
            return Err(CoreError::InvalidState(format!(
                "unknown iteration '{fork_point}' to fork from"
            )));
        }

        Ok(ExecuteRequest {
            work_item_id: self.work_item_id.clone(),
            artifact_id: Some(artifact_id),
            artifact_iteration_id: Some(fork_point),
            prompt: Some(prompt.into()),
            provider: provider.into(),
            personality_ids,
        })
    }

    /// Commit the response to a request built by `prepare_*`.
    ///
    /// New-session responses replace the whole list and select iteration[0].
    /// Fork responses adopt the server's list and select the new iteration,
    /// which also becomes the tip. Validation happens before any mutation.
    pub fn apply(
        &mut self,
        request: &ExecuteRequest,
        response: ExecuteResponse,
    ) -> Result<&Iteration, CoreError> {
        let artifact = response.artifact;
        if artifact.iterations.is_empty() {
            return Err(CoreError::InvalidState(format!(
                "artifact '{}' returned no iterations",
                artifact.id
            )));
        }

        let new_id = if request.is_new_session() {
            artifact.iterations[0].id.clone()
        } else {
            if self.artifact_id.as_ref() != Some(&artifact.id) {
                return Err(CoreError::InvalidState(format!(
                    "response artifact '{}' does not match the active session",
                    artifact.id
                )));
            }
            artifact
                .iterations
                .iter()
                .rev()
                .find(|it| self.get(&it.id).is_none())
                .map(|it| it.id.clone())
                .ok_or_else(|| {
                    CoreError::InvalidState("fork response contained no new iteration".to_string())
                })?
        };

        let mut iterations = artifact.iterations;
        if let Some(new_iteration) = iterations.iter_mut().find(|it| it.id == new_id) {
            if new_iteration.start_from_iteration_id.is_none() {
                new_iteration.start_from_iteration_id = request.artifact_iteration_id.clone();
            }
            if new_iteration.provider.is_none() {
                new_iteration.provider = Some(request.provider.clone());
            }
        }

        tracing::info!(
            "committed iteration {new_id} ({} total, new session: {})",
            iterations.len(),
            request.is_new_session()
        );
        self.artifact_id = Some(artifact.id);
        self.iterations = iterations;
        self.selected = Some(new_id.clone());
        self.tip = Some(new_id);
        self.pending_edit = None;

        let index = self.iterations.len() - 1;
        Ok(self.selected().unwrap_or(&self.iterations[index]))
    }

    /// Move the selection pointer. Unknown ids are a logged no-op.
    pub fn select_iteration(&mut self, id: &IterationId) -> bool {
        if self.get(id).is_none() {
            tracing::warn!("{}", CoreError::InvalidState(format!("unknown iteration '{id}'")));
            return false;
        }
        self.selected = Some(id.clone());
        true
    }

    /// Begin editing the selected iteration.
    ///
    /// Editing the root schedules a session restart; editing any later
    /// iteration schedules a fork from the iteration just before it in the
    /// list.
    pub fn edit_iteration(&mut self) -> Result<EditDraft, CoreError> {
        let selected = self.selected().ok_or_else(|| {
            CoreError::InvalidState("no iteration selected to edit".to_string())
        })?;
        let is_root = self.root().is_some_and(|root| root.id == selected.id);

        let mode = if is_root {
            EditMode::RestartSession
        } else {
            // List predecessor, not the parent link: in a branched list the
            // two differ.
            let previous = self
                .position(&selected.id)
                .and_then(|index| index.checked_sub(1))
                .and_then(|index| self.iterations.get(index))
                .ok_or_else(|| {
                    CoreError::InvalidState(format!(
                        "iteration '{}' has no predecessor to fork from",
                        selected.id
                    ))
                })?;
            EditMode::ForkFrom(previous.id.clone())
        };

        let draft = EditDraft {
            editing: selected.id.clone(),
            mode: mode.clone(),
            prompt: selected.prompt.clone(),
            provider: selected.provider.clone(),
            personality_ids: selected.personalities.iter().map(|p| p.id.clone()).collect(),
        };
        self.pending_edit = Some(mode);
        Ok(draft)
    }

    pub fn cancel_edit(&mut self) {
        self.pending_edit = None;
    }

    /// Drop everything; used when the work item changes.
    pub fn reset(&mut self) {
        self.artifact_id = None;
        self.iterations.clear();
        self.selected = None;
        self.tip = None;
        self.pending_edit = None;
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Artifact, Personality};

    fn iteration(id: &str, parent: Option<&str>) -> Iteration {
        Iteration {
            id: IterationId::from(id),
            prompt: format!("prompt for {id}"),
            files: Default::default(),
            personalities: vec![Personality {
                id: "reviewer".to_string(),
            }],
            provider: Some("anthropic".to_string()),
            start_from_iteration_id: parent.map(IterationId::from),
        }
    }

    fn response(artifact: &str, iterations: Vec<Iteration>) -> ExecuteResponse {
        ExecuteResponse {
            artifact: Artifact {
                id: ArtifactId::from(artifact),
                iterations,
            },
            work_item: serde_json::Value::Null,
        }
    }

    fn linear(n: usize) -> IterationHistory {
        let iterations = (0..n)
            .map(|i| {
                let parent = (i > 0).then(|| format!("I{}", i - 1));
                iteration(&format!("I{i}"), parent.as_deref())
            })
            .collect();
        IterationHistory::from_artifact(
            WorkItemId::from("wi"),
            Artifact {
                id: ArtifactId::from("art"),
                iterations,
            },
        )
    }

    #[test]
    fn create_session_selects_root() {
        let mut history = IterationHistory::new(WorkItemId::from("wi"));
        assert_eq!(history.state(), HistoryState::NoSession);

        let request = history.prepare_create("build it", "anthropic", vec![]);
        assert!(request.is_new_session());
        history
            .apply(&request, response("art", vec![iteration("I0", None)]))
            .expect("apply");

        assert_eq!(history.state(), HistoryState::HasIterations);
        assert_eq!(history.selected_id(), Some(&IterationId::from("I0")));
        assert_eq!(history.artifact_id(), Some(&ArtifactId::from("art")));
    }

    #[test]
    fn artifact_snapshot_round_trips() {
        assert!(IterationHistory::new(WorkItemId::from("wi")).to_artifact().is_none());

        let history = linear(2);
        let artifact = history.to_artifact().expect("artifact");
        let reloaded = IterationHistory::from_artifact(WorkItemId::from("wi"), artifact);
        assert_eq!(reloaded.iterations(), history.iterations());
        assert_eq!(reloaded.selected_id(), Some(&IterationId::from("I1")));
    }

    #[test]
    fn add_without_session_is_invalid_state() {
        let history = IterationHistory::new(WorkItemId::from("wi"));
        let err = history
            .prepare_add("again", "anthropic", vec![], None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn add_with_unknown_fork_point_is_invalid_state() {
        let history = linear(2);
        let err = history
            .prepare_add("again", "anthropic", vec![], Some(&IterationId::from("nope")))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn add_forks_from_selected_by_default() {
        let mut history = linear(3);
        assert!(history.select_iteration(&IterationId::from("I1")));
        let request = history
            .prepare_add("tweak", "anthropic", vec![], None)
            .expect("prepare");
        assert_eq!(request.artifact_iteration_id, Some(IterationId::from("I1")));
        assert_eq!(request.artifact_id, Some(ArtifactId::from("art")));
    }

    #[test]
    fn select_unknown_iteration_is_noop() {
        let mut history = linear(2);
        let before = history.selected_id().cloned();
        assert!(!history.select_iteration(&IterationId::from("missing")));
        assert_eq!(history.selected_id().cloned(), before);
    }

    #[test]
    fn editing_root_then_adding_discards_prior_list() {
        let mut history = linear(3);
        history.select_iteration(&IterationId::from("I0"));
        let draft = history.edit_iteration().expect("edit");
        assert_eq!(draft.mode, EditMode::RestartSession);
        assert_eq!(draft.prompt, "prompt for I0");

        let request = history
            .prepare_add(draft.prompt, "anthropic", draft.personality_ids, None)
            .expect("prepare");
        assert!(request.is_new_session());

        history
            .apply(&request, response("art-2", vec![iteration("J0", None)]))
            .expect("apply");
        assert_eq!(history.iterations().len(), 1);
        assert_eq!(history.artifact_id(), Some(&ArtifactId::from("art-2")));
        assert!(history.pending_edit().is_none());
    }

    #[test]
    fn editing_third_of_four_forks_from_second() {
        let mut history = linear(4);
        history.select_iteration(&IterationId::from("I2"));
        let draft = history.edit_iteration().expect("edit");
        assert_eq!(draft.mode, EditMode::ForkFrom(IterationId::from("I1")));

        let request = history
            .prepare_add("redo", "anthropic", vec![], None)
            .expect("prepare");
        assert_eq!(request.artifact_iteration_id, Some(IterationId::from("I1")));

        let mut server_list: Vec<Iteration> = history.iterations().to_vec();
        server_list.push(iteration("I4", None));
        let created = history
            .apply(&request, response("art", server_list))
            .expect("apply")
            .clone();
        assert_eq!(
            created.start_from_iteration_id,
            Some(IterationId::from("I1"))
        );
    }

    #[test]
    fn scenario_b_edit_non_root_makes_new_tip_and_keeps_old() {
        let mut history = linear(3);
        history.select_iteration(&IterationId::from("I2"));
        history.edit_iteration().expect("edit");

        let request = history
            .prepare_add("again", "anthropic", vec![], None)
            .expect("prepare");
        assert_eq!(request.artifact_iteration_id, Some(IterationId::from("I1")));

        let mut server_list: Vec<Iteration> = history.iterations().to_vec();
        server_list.push(iteration("I3", Some("I1")));
        history
            .apply(&request, response("art", server_list))
            .expect("apply");

        assert_eq!(history.tip().map(|it| it.id.0.as_str()), Some("I3"));
        let visible: Vec<&str> = history
            .visible_history()
            .iter()
            .map(|it| it.id.0.as_str())
            .collect();
        assert_eq!(visible, vec!["I0", "I1", "I3"]);
        assert!(history.get(&IterationId::from("I2")).is_some());
    }

    #[test]
    fn editing_a_branched_tip_forks_from_list_predecessor() {
        let mut history = IterationHistory::from_artifact(
            WorkItemId::from("wi"),
            Artifact {
                id: ArtifactId::from("art"),
                iterations: vec![
                    iteration("I0", None),
                    iteration("I1", Some("I0")),
                    iteration("I2", Some("I1")),
                    iteration("I3", Some("I1")),
                ],
            },
        );
        assert!(history.select_iteration(&IterationId::from("I3")));

        let draft = history.edit_iteration().expect("edit");
        assert_eq!(draft.mode, EditMode::ForkFrom(IterationId::from("I2")));
        let request = history
            .prepare_add("again", "anthropic", vec![], None)
            .expect("prepare");
        assert_eq!(request.artifact_iteration_id, Some(IterationId::from("I2")));
    }

    #[test]
    fn mismatched_artifact_leaves_history_untouched() {
        let mut history = linear(2);
        let request = history
            .prepare_add("x", "anthropic", vec![], None)
            .expect("prepare");
        let before: Vec<IterationId> = history.iterations().iter().map(|i| i.id.clone()).collect();

        let err = history
            .apply(&request, response("other", vec![iteration("Z", None)]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        let after: Vec<IterationId> = history.iterations().iter().map(|i| i.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn edit_without_selection_is_invalid_state() {
        let mut history = IterationHistory::new(WorkItemId::from("wi"));
        assert!(matches!(
            history.edit_iteration(),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn cancel_edit_restores_plain_add() {
        let mut history = linear(2);
        history.select_iteration(&IterationId::from("I0"));
        history.edit_iteration().expect("edit");
        history.cancel_edit();
        let request = history
            .prepare_add("x", "anthropic", vec![], None)
            .expect("prepare");
        assert!(!request.is_new_session());
    }

    #[test]
    fn reset_returns_to_no_session() {
        let mut history = linear(2);
        history.reset();
        assert_eq!(history.state(), HistoryState::NoSession);
        assert!(history.selected().is_none());
    }
}
