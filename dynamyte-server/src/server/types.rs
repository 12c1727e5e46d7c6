use dynamyte_core::VersionContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: String,
    pub(crate) node_id: String,
    pub(crate) ring_size: usize,
}

/// Body of `PUT /val/{key}` and `PUT /no-quorum/val/{key}`. Missing fields
/// decode as `None` and are rejected by the operation with a 400.
#[derive(Debug, Deserialize)]
pub(crate) struct PutValueBody {
    #[serde(default)]
    pub(crate) value: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) context: Option<VersionContext>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PutValueResponse {
    pub(crate) context: VersionContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TreeItem {
    pub(crate) tree_id: String,
    pub(crate) root_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TreeListResponse {
    pub(crate) trees: Vec<TreeItem>,
}
