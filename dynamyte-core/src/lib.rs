//! Dynamyte Core - replicated key-value store with tunable quorums
//!
//! A leaderless, Dynamo-style store using:
//! - consistent hashing with virtual nodes for placement
//! - scalar version contexts for optimistic concurrency
//! - R/W quorums over N replicas
//! - per-owner Merkle trees for anti-entropy

pub mod coordinator;
pub mod error;
pub mod hasher;
pub mod merkle;
pub mod operations;
pub mod peer;
pub mod ring;
pub mod store;
pub mod version;

pub use coordinator::{QuorumConfig, QuorumCoordinator, QuorumRead, QuorumWrite, Route};
pub use error::{DynamyteError, Result};
pub use hasher::{Hasher, Sha256Hasher, compute_hash};
pub use merkle::{MerkleTree, MerkleTreeBuilder, MerkleTreeNode};
pub use peer::{HttpPeerChannel, PeerChannel, ReplicaFailure, ReplicaResult, node_url};
pub use ring::HashRing;
pub use store::{LocalStore, WriteOutcome};
pub use version::{VersionContext, VersionedValue};
pub use operations::{
    GetValueOperation, GetValueOperationOutcome, GetValueOperationRequest,
    InternalGetValueOperationOutcome, InternalGetValueOperationRequest,
    InternalPutValueOperationOutcome, InternalPutValueOperationRequest, InternalValueOperation,
    PutValueOperation, PutValueOperationOutcome, PutValueOperationRequest,
    PutValueOperationResult, ReadTreeOperation, ReadTreeOperationOutcome,
    ReadTreeOperationRequest, TreeSummary,
};
