use crate::{
    DynamyteError, HashRing, LocalStore, PeerChannel, ReplicaFailure, ReplicaResult, Result,
    VersionContext, VersionedValue, WriteOutcome,
};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumConfig {
    pub replication_factor: usize,
    pub read_quorum: usize,
    pub write_quorum: usize,
}

impl QuorumConfig {
    pub fn new(replication_factor: usize, read_quorum: usize, write_quorum: usize) -> Result<Self> {
        if replication_factor == 0 {
            return Err(DynamyteError::Config(
                "replication_factor must be at least 1".to_string(),
            ));
        }

        for (name, quorum) in [("read_quorum", read_quorum), ("write_quorum", write_quorum)] {
            if quorum == 0 || quorum > replication_factor {
                return Err(DynamyteError::Config(format!(
                    "{} must be between 1 and replication_factor ({}), got {}",
                    name, replication_factor, quorum
                )));
            }
        }

        Ok(Self {
            replication_factor,
            read_quorum,
            write_quorum,
        })
    }

    /// Whether every read quorum overlaps every write quorum.
    pub fn is_strict(&self) -> bool {
        self.read_quorum + self.write_quorum > self.replication_factor
    }
}

/// Where an operation on a key must run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Local node is a replica; members in execution order, local first.
    Replicas(Vec<String>),
    /// Local node is not a replica; the caller must redirect to this owner.
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuorumRead {
    Found(VersionedValue),
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuorumWrite {
    Committed {
        context: VersionContext,
        accepted_replicas: usize,
    },
    Redirect(String),
}

struct Settled<T> {
    successes: Vec<(String, T)>,
    failures: Vec<(String, ReplicaFailure)>,
}

/// Fans reads and writes out to a key's replica set and applies the R/W
/// thresholds. Holds no per-call state; a failed write is not rolled back
/// on replicas that accepted it.
pub struct QuorumCoordinator {
    local_node: String,
    ring: Arc<RwLock<HashRing>>,
    store: Arc<LocalStore>,
    peers: Arc<dyn PeerChannel>,
    quorum: QuorumConfig,
}

impl QuorumCoordinator {
    pub fn new(
        local_node: impl Into<String>,
        ring: Arc<RwLock<HashRing>>,
        store: Arc<LocalStore>,
        peers: Arc<dyn PeerChannel>,
        quorum: QuorumConfig,
    ) -> Self {
        Self {
            local_node: local_node.into(),
            ring,
            store,
            peers,
            quorum,
        }
    }

    pub fn local_node(&self) -> &str {
        &self.local_node
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn ring(&self) -> &Arc<RwLock<HashRing>> {
        &self.ring
    }

    pub async fn route(&self, key: &str) -> Result<Route> {
        let owners = self
            .ring
            .read()
            .await
            .resolve_owners(key, self.quorum.replication_factor);

        let Some(primary) = owners.first() else {
            return Err(DynamyteError::OwnerNotFound(key.to_string()));
        };

        if !owners.iter().any(|owner| owner == &self.local_node) {
            return Ok(Route::Redirect(primary.clone()));
        }

        let mut ordered = Vec::with_capacity(owners.len());
        ordered.push(self.local_node.clone());
        ordered.extend(owners.into_iter().filter(|owner| owner != &self.local_node));

        Ok(Route::Replicas(ordered))
    }

    pub async fn get(&self, key: &str) -> Result<QuorumRead> {
        let replicas = match self.route(key).await? {
            Route::Replicas(replicas) => replicas,
            Route::Redirect(owner) => {
                tracing::debug!("Redirecting get: key={} owner={}", key, owner);
                return Ok(QuorumRead::Redirect(owner));
            }
        };

        let required = self.quorum.read_quorum;
        let total = replicas.len();
        let (sender, receiver) = mpsc::unbounded_channel();

        for replica in replicas {
            let sender = sender.clone();
            let key = key.to_string();

            if replica == self.local_node {
                let store = self.store.clone();
                tokio::spawn(async move {
                    let result = read_local(&store, &key).await;
                    let _ = sender.send((replica, result));
                });
            } else {
                let peers = self.peers.clone();
                tokio::spawn(async move {
                    let result = peers.get(&replica, &key).await;
                    let _ = sender.send((replica, result));
                });
            }
        }
        drop(sender);

        let settled = await_quorum(receiver, total, required).await;
        if settled.successes.len() < required {
            return Err(quorum_failure("get", key, required, settled));
        }

        let newest = settled
            .successes
            .into_iter()
            .map(|(_, value)| value)
            .max_by_key(|value| value.context.version)
            .ok_or_else(|| DynamyteError::Internal("quorum read without values".to_string()))?;

        Ok(QuorumRead::Found(newest))
    }

    pub async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        supplied: VersionContext,
    ) -> Result<QuorumWrite> {
        let replicas = match self.route(key).await? {
            Route::Replicas(replicas) => replicas,
            Route::Redirect(owner) => {
                tracing::debug!("Redirecting put: key={} owner={}", key, owner);
                return Ok(QuorumWrite::Redirect(owner));
            }
        };

        let required = self.quorum.write_quorum;
        let total = replicas.len();
        let value = Arc::new(value);
        let (sender, receiver) = mpsc::unbounded_channel();

        for replica in replicas {
            let sender = sender.clone();
            let key = key.to_string();
            let value = value.clone();

            if replica == self.local_node {
                let store = self.store.clone();
                tokio::spawn(async move {
                    let result = write_local(&store, &key, value.as_ref().clone(), &supplied).await;
                    let _ = sender.send((replica, result));
                });
            } else {
                let peers = self.peers.clone();
                tokio::spawn(async move {
                    let result = peers.put(&replica, &key, &value, &supplied).await;
                    let _ = sender.send((replica, result));
                });
            }
        }
        drop(sender);

        let settled = await_quorum(receiver, total, required).await;
        if settled.successes.len() < required {
            return Err(quorum_failure("put", key, required, settled));
        }

        let accepted_replicas = settled.successes.len();
        let (_, context) = settled
            .successes
            .into_iter()
            .next()
            .ok_or_else(|| DynamyteError::Internal("quorum write without contexts".to_string()))?;

        Ok(QuorumWrite::Committed {
            context,
            accepted_replicas,
        })
    }

    /// Single-replica read against this node only.
    pub async fn get_local(&self, key: &str) -> ReplicaResult<VersionedValue> {
        read_local(&self.store, key).await
    }

    /// Single-replica write against this node only.
    pub async fn put_local(
        &self,
        key: &str,
        value: serde_json::Value,
        supplied: &VersionContext,
    ) -> ReplicaResult<VersionContext> {
        write_local(&self.store, key, value, supplied).await
    }
}

async fn read_local(store: &LocalStore, key: &str) -> ReplicaResult<VersionedValue> {
    match store.get(key).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(ReplicaFailure::from(&DynamyteError::NotFound(
            key.to_string(),
        ))),
        Err(error) => Err(ReplicaFailure::from(&error)),
    }
}

async fn write_local(
    store: &LocalStore,
    key: &str,
    value: serde_json::Value,
    supplied: &VersionContext,
) -> ReplicaResult<VersionContext> {
    match store.put(key, value, supplied).await {
        Ok(WriteOutcome::Accepted(context)) => Ok(context),
        Ok(WriteOutcome::Conflict(current)) => {
            Err(ReplicaFailure::rejected(409, current.stale_reason(supplied)))
        }
        Err(error) => Err(ReplicaFailure::from(&error)),
    }
}

/// Collects replica results until `required` succeed or all `total` settle.
/// Replicas still running afterwards are left alone; their results are dropped.
async fn await_quorum<T>(
    mut results: mpsc::UnboundedReceiver<(String, ReplicaResult<T>)>,
    total: usize,
    required: usize,
) -> Settled<T> {
    let mut settled = Settled {
        successes: Vec::with_capacity(required),
        failures: Vec::new(),
    };

    while settled.successes.len() < required
        && settled.successes.len() + settled.failures.len() < total
    {
        match results.recv().await {
            Some((node, Ok(value))) => settled.successes.push((node, value)),
            Some((node, Err(failure))) => {
                tracing::debug!(
                    "Replica failed: node={} status={} reason={}",
                    node,
                    failure.status_code(),
                    failure.reason()
                );
                settled.failures.push((node, failure));
            }
            None => break,
        }
    }

    settled
}

fn quorum_failure<T>(
    operation: &str,
    key: &str,
    required: usize,
    settled: Settled<T>,
) -> DynamyteError {
    let succeeded = settled.successes.len();
    let (status_code, reason) = settled
        .failures
        .iter()
        .map(|(_, failure)| failure)
        .min_by_key(|failure| failure.status_code())
        .map(|failure| (failure.status_code(), failure.reason().to_string()))
        .unwrap_or_else(|| {
            (
                503,
                format!("insufficient replicas: need {}, have {}", required, succeeded),
            )
        });

    tracing::warn!(
        "Quorum {} failed: key={} required={} succeeded={} status={} reason={}",
        operation,
        key,
        required,
        succeeded,
        status_code,
        reason
    );

    DynamyteError::QuorumFailure {
        status_code,
        reason,
        required,
        succeeded,
    }
}
