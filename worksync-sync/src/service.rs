//! Remote service seams.

use async_trait::async_trait;

use worksync_core::{ContextId, ContextRecord, ContextUpdate, ExecuteRequest, ExecuteResponse};

use crate::error::ServiceError;

/// `GET /context/:id` and `PATCH /context/:id`.
#[async_trait]
pub trait ContextService: Send + Sync {
    async fn get(&self, id: &ContextId) -> Result<ContextRecord, ServiceError>;

    /// Partial update: only the fields present in `update` are replaced.
    async fn patch(&self, id: &ContextId, update: &ContextUpdate) -> Result<(), ServiceError>;
}

/// `POST /ai-coder/execute`.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, ServiceError>;
}
