use crate::Hasher;
use std::sync::Arc;

/// Consistent-hash ring with virtual nodes.
///
/// Each node occupies `virtual_nodes` positions derived from
/// `hash(node ++ replica_index)`. Positions are kept sorted and unique.
pub struct HashRing {
    virtual_nodes: usize,
    hasher: Arc<dyn Hasher>,
    positions: Vec<RingPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RingPosition {
    ring_key: String,
    node: String,
}

impl HashRing {
    pub fn new(virtual_nodes: usize, hasher: Arc<dyn Hasher>) -> Self {
        Self {
            virtual_nodes: virtual_nodes.max(1),
            hasher,
            positions: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: &str) {
        for replica in 0..self.virtual_nodes {
            let ring_key = self.position_key(node, replica);
            match self.search(&ring_key) {
                Ok(_) => {
                    tracing::warn!(
                        "Ring position collision: node={} replica={} ring_key={}",
                        node,
                        replica,
                        ring_key
                    );
                }
                Err(index) => self.positions.insert(
                    index,
                    RingPosition {
                        ring_key,
                        node: node.to_string(),
                    },
                ),
            }
        }
    }

    pub fn remove_node(&mut self, node: &str) {
        for replica in 0..self.virtual_nodes {
            let ring_key = self.position_key(node, replica);
            if let Ok(index) = self.search(&ring_key) {
                if self.positions[index].node == node {
                    self.positions.remove(index);
                }
            }
        }
    }

    pub fn contains_node(&self, node: &str) -> bool {
        let ring_key = self.position_key(node, 0);
        match self.search(&ring_key) {
            Ok(index) => self.positions[index].node == node,
            Err(_) => false,
        }
    }

    /// Returns up to `count` distinct nodes responsible for `key`, primary first.
    pub fn resolve_owners(&self, key: &str, count: usize) -> Vec<String> {
        let mut owners: Vec<String> = Vec::with_capacity(count);
        if self.positions.is_empty() || count == 0 {
            return owners;
        }

        let key_hash = self.hasher.hash(key);
        let mut start = self
            .positions
            .partition_point(|position| position.ring_key.as_str() < key_hash.as_str());
        if start == self.positions.len() {
            start = 0;
        }

        for offset in 0..self.positions.len() {
            let position = &self.positions[(start + offset) % self.positions.len()];
            if !owners.iter().any(|owner| owner == &position.node) {
                owners.push(position.node.clone());
                if owners.len() == count {
                    break;
                }
            }
        }

        owners
    }

    /// Distinct nodes currently on the ring, in ring order of first appearance.
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = Vec::new();
        for position in &self.positions {
            if !nodes.contains(&position.node) {
                nodes.push(position.node.clone());
            }
        }
        nodes
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn position_key(&self, node: &str, replica: usize) -> String {
        self.hasher.hash(&format!("{}{}", node, replica))
    }

    fn search(&self, ring_key: &str) -> std::result::Result<usize, usize> {
        self.positions
            .binary_search_by(|position| position.ring_key.as_str().cmp(ring_key))
    }
}
