use crate::{
    DynamyteError, HashRing, Hasher, MerkleTree, MerkleTreeBuilder, Result, VersionContext,
    VersionedValue,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted(VersionContext),
    /// The stored context was newer than the supplied one.
    Conflict(VersionContext),
}

/// In-memory values held by this node, grouped by the key's primary owner.
///
/// Each owner group doubles as a partition identity with its own Merkle
/// tree snapshot, rebuilt after every mutation of that group.
pub struct LocalStore {
    ring: Arc<RwLock<HashRing>>,
    hasher: Arc<dyn Hasher>,
    partitions: RwLock<HashMap<String, HashMap<String, VersionedValue>>>,
    trees: RwLock<HashMap<String, Arc<MerkleTree>>>,
}

impl LocalStore {
    pub fn new(ring: Arc<RwLock<HashRing>>, hasher: Arc<dyn Hasher>) -> Self {
        Self {
            ring,
            hasher,
            partitions: RwLock::new(HashMap::new()),
            trees: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, key: &str) -> Result<VersionedValue> {
        let owner = self.owner_for_key(key).await?;
        let mut partitions = self.partitions.write().await;
        let values = partitions.entry(owner.clone()).or_default();

        if values.contains_key(key) {
            return Err(DynamyteError::AlreadyExists(key.to_string()));
        }

        let created = VersionedValue::default();
        values.insert(key.to_string(), created.clone());
        self.rebuild_tree(&owner, values).await;

        Ok(created)
    }

    pub async fn get(&self, key: &str) -> Result<Option<VersionedValue>> {
        let owner = self.owner_for_key(key).await?;
        let partitions = self.partitions.read().await;

        Ok(partitions
            .get(&owner)
            .and_then(|values| values.get(key))
            .cloned())
    }

    /// Creates the entry if needed, then applies the write under the store
    /// lock so no two writers observe the same prior context.
    pub async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        supplied: &VersionContext,
    ) -> Result<WriteOutcome> {
        let owner = self.owner_for_key(key).await?;
        let mut partitions = self.partitions.write().await;
        let values = partitions.entry(owner.clone()).or_default();
        let created = !values.contains_key(key);
        let stored = values.entry(key.to_string()).or_default();

        let written = match stored.write(value, supplied) {
            Ok(written) => written,
            Err(error) => {
                if created {
                    values.remove(key);
                }
                return Err(error);
            }
        };

        if !written {
            tracing::debug!(
                "Rejected stale write: key={} stored_version={} supplied_version={}",
                key,
                stored.context.version,
                supplied.version
            );
            return Ok(WriteOutcome::Conflict(stored.context));
        }

        let context = stored.context;
        self.rebuild_tree(&owner, values).await;

        Ok(WriteOutcome::Accepted(context))
    }

    /// Current tree snapshot for a partition identity hosted here.
    pub async fn tree(&self, tree_id: &str) -> Option<Arc<MerkleTree>> {
        self.trees.read().await.get(tree_id).cloned()
    }

    pub async fn tree_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.trees.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.partitions
            .read()
            .await
            .values()
            .map(|values| values.len())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn owner_for_key(&self, key: &str) -> Result<String> {
        let ring = self.ring.read().await;
        ring.resolve_owners(key, 1)
            .into_iter()
            .next()
            .ok_or_else(|| DynamyteError::OwnerNotFound(key.to_string()))
    }

    async fn rebuild_tree(&self, tree_id: &str, values: &HashMap<String, VersionedValue>) {
        let builder = MerkleTreeBuilder::new(self.hasher.clone())
            .path_to_root(format!("/tree/{}/branch", tree_id));
        let tree = builder.build(
            values
                .iter()
                .map(|(key, stored)| (key.as_str(), &stored.value)),
        );

        let mut trees = self.trees.write().await;
        match tree {
            Some(tree) => {
                tracing::debug!(
                    "Rebuilt merkle tree: tree_id={} root={} keys={}",
                    tree_id,
                    tree.root_hash(),
                    values.len()
                );
                trees.insert(tree_id.to_string(), Arc::new(tree));
            }
            None => {
                trees.remove(tree_id);
            }
        }
    }
}
