use super::{
    HealthResponse, PutValueBody, PutValueResponse, ServerState, error_response, response_error,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use dynamyte_core::{
    GetValueOperationOutcome, GetValueOperationRequest, PutValueOperationOutcome,
    PutValueOperationRequest, node_url,
};
use std::sync::Arc;

pub(crate) async fn health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let ring_size = state.coordinator.ring().read().await.nodes().len();

    Json(HealthResponse {
        status: "ok".to_string(),
        node_id: state.coordinator.local_node().to_string(),
        ring_size,
    })
}

pub(crate) async fn get_value(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
) -> Response {
    let outcome = state
        .get_value_operation
        .run(GetValueOperationRequest { key: key.clone() })
        .await;

    match outcome {
        Ok(GetValueOperationOutcome::Found(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(GetValueOperationOutcome::NotFound) => {
            response_error(StatusCode::NOT_FOUND, "Value for key not found")
        }
        Ok(GetValueOperationOutcome::RedirectTo(owner)) => redirect_to_owner(&owner, &key),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn put_value(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
    body: Result<Json<PutValueBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return response_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let outcome = state
        .put_value_operation
        .run(PutValueOperationRequest {
            key: key.clone(),
            value: body.value,
            context: body.context,
        })
        .await;

    match outcome {
        Ok(PutValueOperationOutcome::Committed(result)) => (
            StatusCode::OK,
            Json(PutValueResponse {
                context: result.context,
            }),
        )
            .into_response(),
        Ok(PutValueOperationOutcome::Conflict(reason)) => {
            response_error(StatusCode::CONFLICT, reason)
        }
        Ok(PutValueOperationOutcome::RedirectTo(owner)) => redirect_to_owner(&owner, &key),
        Err(error) => error_response(&error),
    }
}

/// 307 so clients resend the same method and body to the owner.
fn redirect_to_owner(owner: &str, key: &str) -> Response {
    match node_url(owner, &["val", key]) {
        Ok(url) => {
            tracing::debug!("Redirecting key={} to {}", key, url);
            Redirect::temporary(url.as_str()).into_response()
        }
        Err(error) => response_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    }
}
