//! Merkle tree summaries of locally stored keys, used for anti-entropy.
//!
//! Nodes reference each other through links of the form
//! `{path_to_root}/{hash}`, so a remote replica can walk a tree one branch
//! at a time using nothing but hashes.

use crate::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleTreeNode {
    pub hash: String,
    pub value: Option<serde_json::Value>,
    pub parent_link: Option<String>,
    pub child_links: Vec<String>,
}

impl MerkleTreeNode {
    fn leaf(hash: String, value: serde_json::Value) -> Self {
        Self {
            hash,
            value: Some(value),
            parent_link: None,
            child_links: Vec::new(),
        }
    }

    fn branch(hash: String, child_links: Vec<String>) -> Self {
        Self {
            hash,
            value: None,
            parent_link: None,
            child_links,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.child_links.is_empty()
    }

    /// Hashes of the direct children, in link order.
    pub fn child_hashes(&self) -> impl Iterator<Item = &str> {
        self.child_links.iter().map(|link| link_hash(link))
    }
}

/// Immutable snapshot of a tree. Rebuilt wholesale, never patched.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    root_hash: String,
    nodes: HashMap<String, MerkleTreeNode>,
}

impl MerkleTree {
    pub fn get_root(&self) -> &MerkleTreeNode {
        // The builder always inserts the root into `nodes`.
        &self.nodes[&self.root_hash]
    }

    pub fn root_hash(&self) -> &str {
        &self.root_hash
    }

    pub fn get_branch(&self, hash: &str) -> Option<&MerkleTreeNode> {
        self.nodes.get(hash)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &MerkleTreeNode> {
        self.nodes.values().filter(|node| node.value.is_some())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaf hashes reachable from this root that `other` does not contain.
    ///
    /// Descends only into branches whose hash is unknown to `other`, so
    /// matching subtrees are skipped after a single lookup.
    pub fn diff(&self, other: &MerkleTree) -> Vec<String> {
        let mut missing = Vec::new();
        if self.root_hash == other.root_hash {
            return missing;
        }

        let mut pending = vec![self.root_hash.as_str()];
        while let Some(hash) = pending.pop() {
            if other.get_branch(hash).is_some() {
                continue;
            }

            let Some(node) = self.get_branch(hash) else {
                continue;
            };

            if node.is_leaf() {
                missing.push(node.hash.clone());
            } else {
                pending.extend(node.child_hashes());
            }
        }

        missing.sort();
        missing
    }
}

#[derive(Serialize)]
struct LeafEntry<'a> {
    key: &'a str,
    value: &'a serde_json::Value,
}

#[derive(Clone)]
pub struct MerkleTreeBuilder {
    hasher: Arc<dyn Hasher>,
    path_to_root: String,
}

impl MerkleTreeBuilder {
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self {
            hasher,
            path_to_root: String::new(),
        }
    }

    pub fn path_to_root(mut self, path_to_root: impl Into<String>) -> Self {
        self.path_to_root = path_to_root.into();
        self
    }

    /// Builds a tree over `entries`; `None` when there is nothing to summarize.
    pub fn build<'a, I>(&self, entries: I) -> Option<MerkleTree>
    where
        I: IntoIterator<Item = (&'a str, &'a serde_json::Value)>,
    {
        let mut leaves = Vec::new();
        for (key, value) in entries {
            let entry = LeafEntry { key, value };
            let payload = serde_json::to_string(&entry).ok()?;
            let hash = self.hasher.hash(&payload);
            leaves.push(MerkleTreeNode::leaf(hash, serde_json::to_value(&entry).ok()?));
        }

        if leaves.is_empty() {
            return None;
        }

        // Insertion order must not affect the shape.
        leaves.sort_by(|left, right| left.hash.cmp(&right.hash));

        let mut nodes: HashMap<String, MerkleTreeNode> = HashMap::with_capacity(leaves.len() * 3);
        let mut queue: VecDeque<String> = VecDeque::with_capacity(leaves.len());

        for mut leaf in leaves {
            let parent_hash = self.hasher.hash(&leaf.hash);
            leaf.parent_link = Some(self.link(&parent_hash));

            let parent = MerkleTreeNode::branch(parent_hash.clone(), vec![self.link(&leaf.hash)]);
            nodes.insert(leaf.hash.clone(), leaf);
            nodes.insert(parent_hash.clone(), parent);
            queue.push_back(parent_hash);
        }

        let carried = if queue.len() % 2 == 1 {
            queue.pop_back()
        } else {
            None
        };

        while queue.len() > 1 {
            let (Some(left), Some(right)) = (queue.pop_front(), queue.pop_front()) else {
                break;
            };
            let parent_hash = self.join(&mut nodes, [left, right]);
            queue.push_back(parent_hash);
        }

        let root_hash = match (queue.pop_front(), carried) {
            (Some(top), Some(carried)) => self.join(&mut nodes, [top, carried]),
            (Some(top), None) => top,
            (None, Some(carried)) => carried,
            (None, None) => return None,
        };

        Some(MerkleTree { root_hash, nodes })
    }

    fn join(&self, nodes: &mut HashMap<String, MerkleTreeNode>, children: [String; 2]) -> String {
        let hash = self.hasher.hash(&children.concat());
        let link = self.link(&hash);

        for child in &children {
            if let Some(node) = nodes.get_mut(child) {
                node.parent_link = Some(link.clone());
            }
        }

        let child_links = children.iter().map(|child| self.link(child)).collect();
        nodes.insert(hash.clone(), MerkleTreeNode::branch(hash.clone(), child_links));
        hash
    }

    fn link(&self, hash: &str) -> String {
        format!("{}/{}", self.path_to_root, hash)
    }
}

fn link_hash(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sha256Hasher;
    use serde_json::json;

    const ROOT: &str = "/tree/n1/branch";

    /// Wraps its input so expected hashes can be written out by hand.
    struct WrapHasher;

    impl Hasher for WrapHasher {
        fn hash(&self, input: &str) -> String {
            format!("h({})", input)
        }
    }

    fn h(input: &str) -> String {
        format!("h({})", input)
    }

    fn leaf_payload(key: &str, value: &serde_json::Value) -> String {
        serde_json::to_string(&LeafEntry { key, value }).unwrap()
    }

    fn wrap_builder() -> MerkleTreeBuilder {
        MerkleTreeBuilder::new(Arc::new(WrapHasher)).path_to_root(ROOT)
    }

    fn link(hash: &str) -> String {
        format!("{}/{}", ROOT, hash)
    }

    #[test]
    fn test_empty_input_builds_no_tree() {
        let entries: Vec<(&str, &serde_json::Value)> = Vec::new();
        assert!(wrap_builder().build(entries).is_none());
    }

    #[test]
    fn test_single_value_tree() {
        let value = json!(1);
        let tree = wrap_builder().build([("a", &value)]).unwrap();

        let leaf_hash = h(&leaf_payload("a", &value));
        let root = tree.get_root();
        assert_eq!(root.hash, h(&leaf_hash));
        assert_eq!(root.child_links, vec![link(&leaf_hash)]);
        assert_eq!(root.parent_link, None);
        assert_eq!(root.value, None);

        let leaf = tree.get_branch(&leaf_hash).unwrap();
        assert_eq!(leaf.parent_link, Some(link(&root.hash)));
        assert_eq!(leaf.value, Some(json!({"key": "a", "value": 1})));
    }

    #[test]
    fn test_two_value_tree() {
        let (one, two) = (json!(1), json!(2));
        let tree = wrap_builder().build([("b", &two), ("a", &one)]).unwrap();

        let pa = h(&h(&leaf_payload("a", &one)));
        let pb = h(&h(&leaf_payload("b", &two)));
        let root = tree.get_root();
        assert_eq!(root.hash, h(&format!("{}{}", pa, pb)));
        assert_eq!(root.child_links, vec![link(&pa), link(&pb)]);
    }

    #[test]
    fn test_odd_leaf_is_carried_to_the_root() {
        let (one, two, three) = (json!(1), json!(2), json!(3));
        let tree = wrap_builder()
            .build([("c", &three), ("a", &one), ("b", &two)])
            .unwrap();

        let pa = h(&h(&leaf_payload("a", &one)));
        let pb = h(&h(&leaf_payload("b", &two)));
        let pc = h(&h(&leaf_payload("c", &three)));
        let pab = h(&format!("{}{}", pa, pb));

        let root = tree.get_root();
        assert_eq!(root.hash, h(&format!("{}{}", pab, pc)));
        assert_eq!(root.child_links, vec![link(&pab), link(&pc)]);

        assert_eq!(
            tree.get_branch(&pc).unwrap().parent_link,
            Some(link(&root.hash))
        );
        assert_eq!(
            tree.get_branch(&pa).unwrap().parent_link,
            Some(link(&pab))
        );
        // three leaves, three leaf parents, pab and the root
        assert_eq!(tree.len(), 8);
        assert_eq!(tree.leaves().count(), 3);
    }

    #[test]
    fn test_every_link_resolves() {
        let values: Vec<serde_json::Value> = (0..11).map(|i| json!({"n": i})).collect();
        let keys: Vec<String> = (0..11).map(|i| format!("key-{}", i)).collect();
        let builder = MerkleTreeBuilder::new(Arc::new(Sha256Hasher)).path_to_root(ROOT);
        let tree = builder
            .build(keys.iter().map(String::as_str).zip(values.iter()))
            .unwrap();

        let mut pending = vec![tree.root_hash().to_string()];
        let mut leaves = 0;
        while let Some(hash) = pending.pop() {
            let node = tree.get_branch(&hash).unwrap();
            if node.is_leaf() {
                leaves += 1;
            }
            for child in node.child_hashes() {
                let child_node = tree.get_branch(child).unwrap();
                assert_eq!(child_node.parent_link, Some(link(&node.hash)));
                pending.push(child.to_string());
            }
        }
        assert_eq!(leaves, 11);
    }

    #[test]
    fn test_root_is_independent_of_insertion_order() {
        let values: Vec<(String, serde_json::Value)> = (0..7)
            .map(|i| (format!("k{}", i), json!(format!("v{}", i))))
            .collect();
        let builder = MerkleTreeBuilder::new(Arc::new(Sha256Hasher)).path_to_root(ROOT);

        let forward = builder
            .build(values.iter().map(|(k, v)| (k.as_str(), v)))
            .unwrap();
        let reversed = builder
            .build(values.iter().rev().map(|(k, v)| (k.as_str(), v)))
            .unwrap();

        assert_eq!(forward.root_hash(), reversed.root_hash());
    }

    #[test]
    fn test_diff_finds_divergent_leaves() {
        let builder = MerkleTreeBuilder::new(Arc::new(Sha256Hasher)).path_to_root(ROOT);
        let (one, two, three, four) = (json!(1), json!(2), json!(3), json!(4));

        let local = builder
            .build([("a", &one), ("b", &two), ("c", &three)])
            .unwrap();
        let remote = builder
            .build([("a", &one), ("b", &two), ("c", &four)])
            .unwrap();
        let same = builder
            .build([("c", &three), ("b", &two), ("a", &one)])
            .unwrap();

        assert!(local.diff(&same).is_empty());

        let missing = local.diff(&remote);
        assert_eq!(missing.len(), 1);
        let leaf = local.get_branch(&missing[0]).unwrap();
        assert_eq!(leaf.value, Some(json!({"key": "c", "value": 3})));
    }
}
