use crate::{LocalStore, MerkleTreeNode, Result};
use std::sync::Arc;

#[derive(Clone)]
pub struct ReadTreeOperation {
    store: Arc<LocalStore>,
}

#[derive(Debug, Clone)]
pub struct ReadTreeOperationRequest {
    pub tree_id: String,
    /// Branch hash to fetch; the root when absent.
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadTreeOperationOutcome {
    Found(MerkleTreeNode),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSummary {
    pub tree_id: String,
    pub root_hash: String,
}

impl ReadTreeOperation {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    pub async fn run(&self, request: ReadTreeOperationRequest) -> Result<ReadTreeOperationOutcome> {
        let ReadTreeOperationRequest { tree_id, branch } = request;

        let Some(tree) = self.store.tree(&tree_id).await else {
            return Ok(ReadTreeOperationOutcome::NotFound);
        };

        let node = match branch {
            Some(hash) => tree.get_branch(&hash).cloned(),
            None => Some(tree.get_root().clone()),
        };

        Ok(node.map_or(ReadTreeOperationOutcome::NotFound, ReadTreeOperationOutcome::Found))
    }

    pub async fn list(&self) -> Vec<TreeSummary> {
        let mut summaries = Vec::new();
        for tree_id in self.store.tree_ids().await {
            if let Some(tree) = self.store.tree(&tree_id).await {
                summaries.push(TreeSummary {
                    root_hash: tree.root_hash().to_string(),
                    tree_id,
                });
            }
        }
        summaries
    }
}
