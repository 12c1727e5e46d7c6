use super::{
    PutValueBody, PutValueResponse, ServerState, TreeItem, TreeListResponse, error_response,
    response_error,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dynamyte_core::{
    InternalGetValueOperationOutcome, InternalGetValueOperationRequest,
    InternalPutValueOperationOutcome, InternalPutValueOperationRequest, ReadTreeOperationOutcome,
    ReadTreeOperationRequest,
};
use std::sync::Arc;

pub(crate) async fn internal_get_value(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
) -> Response {
    match state
        .internal_value_operation
        .run_get(InternalGetValueOperationRequest { key })
        .await
    {
        Ok(InternalGetValueOperationOutcome::Found(value)) => {
            (StatusCode::OK, Json(value)).into_response()
        }
        Ok(InternalGetValueOperationOutcome::NotFound) => {
            response_error(StatusCode::NOT_FOUND, "Value for key not found")
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn internal_put_value(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
    body: Result<Json<PutValueBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return response_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let outcome = state
        .internal_value_operation
        .run_put(InternalPutValueOperationRequest {
            key,
            value: body.value,
            context: body.context,
        })
        .await;

    match outcome {
        Ok(InternalPutValueOperationOutcome::Accepted(context)) => {
            (StatusCode::OK, Json(PutValueResponse { context })).into_response()
        }
        Ok(InternalPutValueOperationOutcome::Conflict(reason)) => {
            response_error(StatusCode::CONFLICT, reason)
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn list_trees(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let trees = state
        .read_tree_operation
        .list()
        .await
        .into_iter()
        .map(|summary| TreeItem {
            tree_id: summary.tree_id,
            root_hash: summary.root_hash,
        })
        .collect();

    Json(TreeListResponse { trees })
}

pub(crate) async fn get_tree_root(
    State(state): State<Arc<ServerState>>,
    Path(tree_id): Path<String>,
) -> Response {
    read_tree(&state, tree_id, None).await
}

pub(crate) async fn get_tree_branch(
    State(state): State<Arc<ServerState>>,
    Path((tree_id, hash)): Path<(String, String)>,
) -> Response {
    read_tree(&state, tree_id, Some(hash)).await
}

async fn read_tree(state: &ServerState, tree_id: String, branch: Option<String>) -> Response {
    match state
        .read_tree_operation
        .run(ReadTreeOperationRequest { tree_id, branch })
        .await
    {
        Ok(ReadTreeOperationOutcome::Found(node)) => (StatusCode::OK, Json(node)).into_response(),
        Ok(ReadTreeOperationOutcome::NotFound) => {
            response_error(StatusCode::NOT_FOUND, "tree or branch not found")
        }
        Err(error) => error_response(&error),
    }
}
