use crate::{DynamyteError, QuorumCoordinator, QuorumWrite, Result, VersionContext};
use std::sync::Arc;

#[derive(Clone)]
pub struct PutValueOperation {
    coordinator: Arc<QuorumCoordinator>,
}

/// Both fields are optional so a body missing either one is reported as a
/// bad request rather than a decode failure.
#[derive(Debug, Clone)]
pub struct PutValueOperationRequest {
    pub key: String,
    pub value: Option<serde_json::Value>,
    pub context: Option<VersionContext>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutValueOperationResult {
    pub context: VersionContext,
    pub accepted_replicas: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PutValueOperationOutcome {
    Committed(PutValueOperationResult),
    Conflict(String),
    RedirectTo(String),
}

impl PutValueOperation {
    pub fn new(coordinator: Arc<QuorumCoordinator>) -> Self {
        Self { coordinator }
    }

    pub async fn run(&self, request: PutValueOperationRequest) -> Result<PutValueOperationOutcome> {
        let PutValueOperationRequest {
            key,
            value,
            context,
        } = request;

        let value = validate_value(value)?;
        let context = validate_context(context)?;

        match self.coordinator.put(&key, value, context).await {
            Ok(QuorumWrite::Committed {
                context,
                accepted_replicas,
            }) => {
                tracing::debug!(
                    "Committed put: key={} version={} accepted={}",
                    key,
                    context.version,
                    accepted_replicas
                );
                Ok(PutValueOperationOutcome::Committed(PutValueOperationResult {
                    context,
                    accepted_replicas,
                }))
            }
            Ok(QuorumWrite::Redirect(owner)) => Ok(PutValueOperationOutcome::RedirectTo(owner)),
            Err(DynamyteError::QuorumFailure {
                status_code: 409,
                reason,
                ..
            }) => Ok(PutValueOperationOutcome::Conflict(reason)),
            Err(error) => Err(error),
        }
    }
}

/// JSON `null` counts as an absent value.
pub fn validate_value(value: Option<serde_json::Value>) -> Result<serde_json::Value> {
    match value {
        Some(serde_json::Value::Null) | None => {
            Err(DynamyteError::InvalidRequest("No value provided".to_string()))
        }
        Some(value) => Ok(value),
    }
}

/// A context at `u64::MAX` has no successor version, so no write can carry it.
pub fn validate_context(context: Option<VersionContext>) -> Result<VersionContext> {
    match context {
        None => Err(DynamyteError::InvalidRequest("No context provided".to_string())),
        Some(context) if context.version == u64::MAX => Err(DynamyteError::InvalidRequest(
            "Context version out of range".to_string(),
        )),
        Some(context) => Ok(context),
    }
}
