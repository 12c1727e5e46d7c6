use crate::{DynamyteError, QuorumCoordinator, QuorumRead, Result, VersionedValue};
use std::sync::Arc;

#[derive(Clone)]
pub struct GetValueOperation {
    coordinator: Arc<QuorumCoordinator>,
}

#[derive(Debug, Clone)]
pub struct GetValueOperationRequest {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetValueOperationOutcome {
    Found(VersionedValue),
    NotFound,
    RedirectTo(String),
}

impl GetValueOperation {
    pub fn new(coordinator: Arc<QuorumCoordinator>) -> Self {
        Self { coordinator }
    }

    pub async fn run(&self, request: GetValueOperationRequest) -> Result<GetValueOperationOutcome> {
        let GetValueOperationRequest { key } = request;

        match self.coordinator.get(&key).await {
            Ok(QuorumRead::Found(value)) => Ok(GetValueOperationOutcome::Found(value)),
            Ok(QuorumRead::Redirect(owner)) => Ok(GetValueOperationOutcome::RedirectTo(owner)),
            Err(DynamyteError::QuorumFailure {
                status_code: 404, ..
            }) => Ok(GetValueOperationOutcome::NotFound),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::test_support::single_node_coordinator;
    use crate::VersionContext;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let operation = GetValueOperation::new(single_node_coordinator());
        let outcome = operation
            .run(GetValueOperationRequest {
                key: "missing".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, GetValueOperationOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_get_returns_stored_value() {
        let coordinator = single_node_coordinator();
        coordinator
            .put_local("k", json!({"a": 1}), &VersionContext::new(0))
            .await
            .unwrap();

        let outcome = GetValueOperation::new(coordinator)
            .run(GetValueOperationRequest {
                key: "k".to_string(),
            })
            .await
            .unwrap();
        let GetValueOperationOutcome::Found(value) = outcome else {
            panic!("expected value, got {:?}", outcome);
        };
        assert_eq!(value.value, json!({"a": 1}));
        assert_eq!(value.context, VersionContext::new(1));
    }
}
