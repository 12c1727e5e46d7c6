use crate::config::Config;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dynamyte_core::{
    DynamyteError, GetValueOperation, HashRing, Hasher, HttpPeerChannel, InternalValueOperation,
    LocalStore, PutValueOperation, QuorumCoordinator, ReadTreeOperation, Result, Sha256Hasher,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

mod external;
mod internal;
mod types;

use external::{get_value, health, put_value};
use internal::{
    get_tree_branch, get_tree_root, internal_get_value, internal_put_value, list_trees,
};
pub(crate) use types::*;

pub struct ServerState {
    pub(crate) coordinator: Arc<QuorumCoordinator>,
    pub(crate) get_value_operation: Arc<GetValueOperation>,
    pub(crate) put_value_operation: Arc<PutValueOperation>,
    pub(crate) internal_value_operation: Arc<InternalValueOperation>,
    pub(crate) read_tree_operation: Arc<ReadTreeOperation>,
}

impl ServerState {
    pub fn new(coordinator: Arc<QuorumCoordinator>) -> Self {
        let store = coordinator.store().clone();

        Self {
            get_value_operation: Arc::new(GetValueOperation::new(coordinator.clone())),
            put_value_operation: Arc::new(PutValueOperation::new(coordinator.clone())),
            internal_value_operation: Arc::new(InternalValueOperation::new(store.clone())),
            read_tree_operation: Arc::new(ReadTreeOperation::new(store)),
            coordinator,
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let hasher: Arc<dyn Hasher> = Arc::new(Sha256Hasher);

    let mut ring = HashRing::new(config.cluster.virtual_nodes, hasher.clone());
    for node in config.cluster_nodes() {
        ring.add_node(&node);
    }
    let ring = Arc::new(RwLock::new(ring));

    let store = Arc::new(LocalStore::new(ring.clone(), hasher));
    let peers = Arc::new(HttpPeerChannel::new(config.peer_timeout())?);
    let coordinator = Arc::new(QuorumCoordinator::new(
        config.node.node_id.clone(),
        ring,
        store,
        peers,
        config.quorum()?,
    ));

    let state = Arc::new(ServerState::new(coordinator));
    let app = build_router(state);

    let listener = TcpListener::bind(&config.node.bind_addr).await?;
    tracing::info!("Server listening on {}", config.node.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|error| DynamyteError::Http(error.to_string()))?;

    Ok(())
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/val/:key", get(get_value).put(put_value))
        .route(
            "/no-quorum/val/:key",
            get(internal_get_value).put(internal_put_value),
        )
        .route("/tree", get(list_trees))
        .route("/tree/:tree_id/branch", get(get_tree_root))
        .route("/tree/:tree_id/branch/:hash", get(get_tree_branch))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn response_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub(crate) fn error_response(error: &DynamyteError) -> Response {
    match error {
        DynamyteError::InvalidRequest(message) => {
            response_error(StatusCode::BAD_REQUEST, message.clone())
        }
        DynamyteError::NotFound(_) => response_error(StatusCode::NOT_FOUND, error.to_string()),
        DynamyteError::AlreadyExists(_) => response_error(StatusCode::CONFLICT, error.to_string()),
        DynamyteError::OwnerNotFound(_) => {
            response_error(StatusCode::SERVICE_UNAVAILABLE, error.to_string())
        }
        DynamyteError::QuorumFailure {
            status_code,
            reason,
            ..
        } => response_error(
            StatusCode::from_u16(*status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            reason.clone(),
        ),
        _ => {
            tracing::error!("Request failed: {}", error);
            response_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}
