//! Generation driver over [`IterationHistory`].
//!
//! Each operation builds its request with the history's `prepare_*` step,
//! awaits the service under a hard timeout and only then commits with
//! [`IterationHistory::apply`]. On any failure the history is untouched.

use std::sync::Arc;
use std::time::Duration;

use worksync_core::{ExecuteRequest, IterationHistory, IterationId};

use crate::error::{ServiceError, SyncError};
use crate::service::GenerationService;

pub struct Generator {
    service: Arc<dyn GenerationService>,
    timeout: Duration,
}

impl Generator {
    pub fn new(service: Arc<dyn GenerationService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Start a new session. Replaces whatever the history held.
    pub async fn create_session(
        &self,
        history: &mut IterationHistory,
        prompt: &str,
        provider: &str,
        personality_ids: Vec<String>,
    ) -> Result<IterationId, SyncError> {
        let request = history.prepare_create(prompt, provider, personality_ids);
        self.run(history, request).await
    }

    /// Fork a new iteration. `start_from` defaults to the pending edit's fork
    /// point, then to the selected iteration.
    pub async fn add_iteration(
        &self,
        history: &mut IterationHistory,
        prompt: &str,
        provider: &str,
        personality_ids: Vec<String>,
        start_from: Option<&IterationId>,
    ) -> Result<IterationId, SyncError> {
        let request = history.prepare_add(prompt, provider, personality_ids, start_from)?;
        self.run(history, request).await
    }

    async fn run(
        &self,
        history: &mut IterationHistory,
        request: ExecuteRequest,
    ) -> Result<IterationId, SyncError> {
        let response = match tokio::time::timeout(self.timeout, self.service.execute(&request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(self.failed(err)),
            Err(_) => return Err(self.failed(ServiceError::Timeout)),
        };
        let iteration = history.apply(&request, response)?;
        Ok(iteration.id.clone())
    }

    fn failed(&self, err: ServiceError) -> SyncError {
        tracing::warn!(error = %err, "generation request failed; history unchanged");
        SyncError::GenerationFailed(err)
    }
}
