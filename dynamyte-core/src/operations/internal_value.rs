use crate::operations::put_value::{validate_context, validate_value};
use crate::{LocalStore, Result, VersionContext, VersionedValue, WriteOutcome};
use std::sync::Arc;

/// Single-replica reads and writes against this node's store, used by peers
/// during quorum fan-out. Never consults the ring for redirection.
#[derive(Clone)]
pub struct InternalValueOperation {
    store: Arc<LocalStore>,
}

#[derive(Debug, Clone)]
pub struct InternalGetValueOperationRequest {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalGetValueOperationOutcome {
    Found(VersionedValue),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct InternalPutValueOperationRequest {
    pub key: String,
    pub value: Option<serde_json::Value>,
    pub context: Option<VersionContext>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalPutValueOperationOutcome {
    Accepted(VersionContext),
    Conflict(String),
}

impl InternalValueOperation {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    pub async fn run_get(
        &self,
        request: InternalGetValueOperationRequest,
    ) -> Result<InternalGetValueOperationOutcome> {
        let InternalGetValueOperationRequest { key } = request;

        Ok(match self.store.get(&key).await? {
            Some(value) => InternalGetValueOperationOutcome::Found(value),
            None => InternalGetValueOperationOutcome::NotFound,
        })
    }

    pub async fn run_put(
        &self,
        request: InternalPutValueOperationRequest,
    ) -> Result<InternalPutValueOperationOutcome> {
        let InternalPutValueOperationRequest {
            key,
            value,
            context,
        } = request;

        let value = validate_value(value)?;
        let context = validate_context(context)?;

        Ok(match self.store.put(&key, value, &context).await? {
            WriteOutcome::Accepted(accepted) => {
                InternalPutValueOperationOutcome::Accepted(accepted)
            }
            WriteOutcome::Conflict(current) => {
                InternalPutValueOperationOutcome::Conflict(current.stale_reason(&context))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DynamyteError;
    use crate::operations::test_support::single_node_coordinator;
    use serde_json::json;

    #[tokio::test]
    async fn test_internal_put_rejects_exhausted_context() {
        let coordinator = single_node_coordinator();
        let operation = InternalValueOperation::new(coordinator.store().clone());

        let error = operation
            .run_put(InternalPutValueOperationRequest {
                key: "k".to_string(),
                value: Some(json!(1)),
                context: Some(VersionContext::new(u64::MAX)),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            &error,
            DynamyteError::InvalidRequest(reason) if reason == "Context version out of range"
        ));
        assert_eq!(
            operation
                .run_get(InternalGetValueOperationRequest {
                    key: "k".to_string()
                })
                .await
                .unwrap(),
            InternalGetValueOperationOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_internal_put_then_get() {
        let coordinator = single_node_coordinator();
        let operation = InternalValueOperation::new(coordinator.store().clone());

        let get = InternalGetValueOperationRequest {
            key: "k".to_string(),
        };
        assert_eq!(
            operation.run_get(get.clone()).await.unwrap(),
            InternalGetValueOperationOutcome::NotFound
        );

        let put = operation
            .run_put(InternalPutValueOperationRequest {
                key: "k".to_string(),
                value: Some(json!([1, 2])),
                context: Some(VersionContext::new(3)),
            })
            .await
            .unwrap();
        assert_eq!(
            put,
            InternalPutValueOperationOutcome::Accepted(VersionContext::new(4))
        );

        let stale = operation
            .run_put(InternalPutValueOperationRequest {
                key: "k".to_string(),
                value: Some(json!([3])),
                context: Some(VersionContext::new(2)),
            })
            .await
            .unwrap();
        assert_eq!(
            stale,
            InternalPutValueOperationOutcome::Conflict(
                "stale context: stored version 4 is newer than 2".to_string()
            )
        );

        assert_eq!(
            operation.run_get(get).await.unwrap(),
            InternalGetValueOperationOutcome::Found(VersionedValue::new(
                json!([1, 2]),
                VersionContext::new(4)
            ))
        );
    }
}
