//! Optimistic-lock digests over node trees.
//!
//! The digest of a node is computed depth-first, children before parents:
//!
//! - scalars hash a type tag plus their canonical bytes
//! - a list hashes the ordered digests of its elements
//! - an object hashes its `(key, child digest)` pairs sorted by key, skipping
//!   the reserved hash keys and its own identity key
//!
//! A node's `#uuid` never enters its own digest. Its container, list or
//! object, feeds it next to the child's digest instead.
//!
//! The digest is therefore independent of map iteration order, never depends
//! on a previously stored hash, and changes for every ancestor when a leaf
//! changes. Renaming a key changes the parent's digest but not the child's.

use cfgdoc_types::{Node, NodeMap, OLD_OLOCK_HASH_KEY, OLOCK_HASH_KEY, UUID_KEY};
use tracing::debug;

use crate::hasher::{finish, DigestHasher, OlockHash};

const TAG_NULL: u8 = b'n';
const TAG_TRUE: u8 = b't';
const TAG_FALSE: u8 = b'f';
const TAG_NUM: u8 = b'd';
const TAG_STR: u8 = b's';
const TAG_LIST: u8 = b'l';
const TAG_OBJ: u8 = b'o';
const TAG_IDENTITY: u8 = b'u';

/// Computes, stamps and verifies optimistic-lock hashes.
pub struct OlockEngine {
    hasher: DigestHasher,
}

impl Default for OlockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OlockEngine {
    pub fn new() -> Self {
        Self {
            hasher: DigestHasher::OLOCK,
        }
    }

    /// Digest of `node`. Pure: stored hash fields are ignored.
    pub fn digest(&self, node: &Node) -> OlockHash {
        match node {
            Node::List(items) => {
                let elements: Vec<(OlockHash, Option<&str>)> = items
                    .iter()
                    .map(|n| (self.digest(n), identity_of(n)))
                    .collect();
                self.list_digest(elements)
            }
            Node::Obj(map) => {
                let entries: Vec<(&str, OlockHash, Option<&str>)> = map
                    .iter()
                    .filter(|(k, _)| !excluded(k))
                    .map(|(k, v)| (k.as_str(), self.digest(v), identity_of(v)))
                    .collect();
                self.obj_digest(entries)
            }
            scalar => self.scalar_digest(scalar),
        }
    }

    /// Recompute hashes and write them into every object node that carries
    /// the `#olockhash` key. Returns the root digest.
    pub fn stamp(&self, node: &mut Node) -> OlockHash {
        self.stamp_inner(node, false)
    }

    /// Like [`OlockEngine::stamp`], but first moves each existing hash into
    /// the `#old_olockhash` side field so the hash the writer started from
    /// survives next to the fresh one.
    pub fn stamp_preserving_old(&self, node: &mut Node) -> OlockHash {
        self.stamp_inner(node, true)
    }

    /// Check that every stamped object's stored hash matches its content.
    pub fn verify(&self, node: &Node) -> bool {
        match node {
            Node::List(items) => items.iter().all(|n| self.verify(n)),
            Node::Obj(map) => {
                let own = match map.get(OLOCK_HASH_KEY) {
                    Some(Node::Str(stored)) => *stored == self.digest(node).to_base64(),
                    Some(Node::Null) | None => true,
                    Some(_) => false,
                };
                own && map.values().all(|n| self.verify(n))
            }
            _ => true,
        }
    }

    fn stamp_inner(&self, node: &mut Node, preserve_old: bool) -> OlockHash {
        match node {
            Node::List(items) => {
                let mut elements: Vec<(OlockHash, Option<String>)> = Vec::new();
                for item in items.iter_mut() {
                    let digest = self.stamp_inner(item, preserve_old);
                    elements.push((digest, identity_of(item).map(String::from)));
                }
                self.list_digest(elements.iter().map(|(d, u)| (*d, u.as_deref())).collect())
            }
            Node::Obj(map) => {
                let mut children: Vec<(String, OlockHash, Option<String>)> = Vec::new();
                for (key, child) in map.iter_mut() {
                    if excluded(key) {
                        continue;
                    }
                    let digest = self.stamp_inner(child, preserve_old);
                    children.push((key.clone(), digest, identity_of(child).map(String::from)));
                }
                let digest = self.obj_digest(
                    children
                        .iter()
                        .map(|(k, d, u)| (k.as_str(), *d, u.as_deref()))
                        .collect(),
                );
                write_hash(map, digest, preserve_old);
                digest
            }
            scalar => self.scalar_digest(scalar),
        }
    }

    fn scalar_digest(&self, node: &Node) -> OlockHash {
        let mut h = self.hasher.start();
        match node {
            Node::Null => {
                h.update(&[TAG_NULL]);
            }
            Node::Bool(true) => {
                h.update(&[TAG_TRUE]);
            }
            Node::Bool(false) => {
                h.update(&[TAG_FALSE]);
            }
            Node::Num(n) => {
                // -0.0 and 0.0 are the same configuration value.
                let n = if *n == 0.0 { 0.0 } else { *n };
                h.update(&[TAG_NUM]);
                h.update(&n.to_bits().to_be_bytes());
            }
            Node::Str(s) => {
                h.update(&[TAG_STR]);
                update_len_prefixed(&mut h, s.as_bytes());
            }
            Node::List(_) | Node::Obj(_) => unreachable!("containers are hashed structurally"),
        }
        finish(h)
    }

    fn list_digest(&self, elements: Vec<(OlockHash, Option<&str>)>) -> OlockHash {
        let mut h = self.hasher.start();
        h.update(&[TAG_LIST]);
        h.update(&(elements.len() as u64).to_be_bytes());
        for (digest, identity) in elements {
            h.update(digest.as_bytes());
            update_identity(&mut h, identity);
        }
        finish(h)
    }

    fn obj_digest(&self, mut entries: Vec<(&str, OlockHash, Option<&str>)>) -> OlockHash {
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut h = self.hasher.start();
        h.update(&[TAG_OBJ]);
        h.update(&(entries.len() as u64).to_be_bytes());
        for (key, digest, identity) in entries {
            update_len_prefixed(&mut h, key.as_bytes());
            h.update(digest.as_bytes());
            update_identity(&mut h, identity);
        }
        finish(h)
    }
}

fn excluded(key: &str) -> bool {
    matches!(key, OLOCK_HASH_KEY | OLD_OLOCK_HASH_KEY | UUID_KEY)
}

fn identity_of(node: &Node) -> Option<&str> {
    node.get(UUID_KEY).and_then(Node::as_str)
}

fn update_identity(h: &mut blake3::Hasher, identity: Option<&str>) {
    if let Some(identity) = identity {
        h.update(&[TAG_IDENTITY]);
        update_len_prefixed(h, identity.as_bytes());
    }
}

fn update_len_prefixed(h: &mut blake3::Hasher, bytes: &[u8]) {
    h.update(&(bytes.len() as u64).to_be_bytes());
    h.update(bytes);
}

fn write_hash(map: &mut NodeMap, digest: OlockHash, preserve_old: bool) {
    let Some(slot) = map.get_mut(OLOCK_HASH_KEY) else {
        return;
    };
    let previous = std::mem::replace(slot, Node::Str(digest.to_base64()));
    if preserve_old && !map.contains_key(OLD_OLOCK_HASH_KEY) {
        if let Node::Str(old) = previous {
            debug!(old = %old, new = %digest.short_hex(), "preserving previous olock hash");
            map.insert(OLD_OLOCK_HASH_KEY.to_string(), Node::Str(old));
        }
    }
}

/// Remove the `#old_olockhash` side field from the root object and return
/// its value: the hash the writer expects to find in storage.
pub fn take_expected_hash(node: &mut Node) -> Option<String> {
    match node.as_obj_mut()?.shift_remove(OLD_OLOCK_HASH_KEY)? {
        Node::Str(s) => Some(s),
        _ => None,
    }
}

/// Remove every `#old_olockhash` side field in the tree.
pub fn strip_side_fields(node: &mut Node) {
    match node {
        Node::Obj(map) => {
            map.shift_remove(OLD_OLOCK_HASH_KEY);
            map.values_mut().for_each(strip_side_fields);
        }
        Node::List(items) => items.iter_mut().for_each(strip_side_fields),
        _ => {}
    }
}

/// Read the stamped hash stored directly on an object node.
pub fn stored_hash(node: &Node) -> Option<&str> {
    node.get(OLOCK_HASH_KEY).and_then(Node::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn engine() -> OlockEngine {
        OlockEngine::new()
    }

    fn device() -> Node {
        Node::from(json!({
            "#olockhash": null,
            "#uuid": "dev-1",
            "deviceName": "arc",
            "connections": {
                "dicom": {"#olockhash": null, "#uuid": "conn-1", "port": 11112, "tls": false},
                "hl7": {"#olockhash": null, "port": 2575}
            }
        }))
    }

    #[test]
    fn digest_ignores_key_order() {
        let a = Node::from(json!({"a": 1, "b": {"x": "1", "y": [1, 2]}}));
        let b = Node::from(json!({"b": {"y": [1, 2], "x": "1"}, "a": 1}));
        assert_eq!(engine().digest(&a), engine().digest(&b));
    }

    #[test]
    fn list_order_matters() {
        let a = Node::from(json!([1, 2]));
        let b = Node::from(json!([2, 1]));
        assert_ne!(engine().digest(&a), engine().digest(&b));
    }

    #[test]
    fn leaf_change_propagates_to_every_ancestor() {
        let e = engine();
        let mut before = device();
        e.stamp(&mut before);
        let mut after = device();
        after
            .get_mut("connections")
            .and_then(|c| c.get_mut("dicom"))
            .and_then(|d| d.as_obj_mut())
            .unwrap()
            .insert("port".into(), Node::from(104));
        e.stamp(&mut after);

        let dicom = |n: &Node| {
            stored_hash(n.get("connections").unwrap().get("dicom").unwrap())
                .unwrap()
                .to_string()
        };
        let hl7 = |n: &Node| {
            stored_hash(n.get("connections").unwrap().get("hl7").unwrap())
                .unwrap()
                .to_string()
        };
        assert_ne!(stored_hash(&before), stored_hash(&after));
        assert_ne!(dicom(&before), dicom(&after));
        assert_eq!(hl7(&before), hl7(&after));
    }

    #[test]
    fn renaming_a_key_changes_parent_but_not_child() {
        let e = engine();
        let mut before = device();
        e.stamp(&mut before);

        let mut renamed = device();
        let conns = renamed.get_mut("connections").unwrap().as_obj_mut().unwrap();
        let entry = conns.shift_remove("hl7").unwrap();
        conns.insert("mllp".into(), entry);
        e.stamp(&mut renamed);

        assert_ne!(stored_hash(&before), stored_hash(&renamed));
        assert_eq!(
            stored_hash(before.get("connections").unwrap().get("hl7").unwrap()),
            stored_hash(renamed.get("connections").unwrap().get("mllp").unwrap())
        );
    }

    #[test]
    fn identity_excluded_from_own_hash_but_not_parent() {
        let e = engine();
        let mut a = device();
        let mut b = device();
        b.get_mut("connections")
            .and_then(|c| c.get_mut("dicom"))
            .and_then(|d| d.as_obj_mut())
            .unwrap()
            .insert(UUID_KEY.into(), Node::from("conn-2"));
        e.stamp(&mut a);
        e.stamp(&mut b);
        let dicom = |n: &Node| {
            stored_hash(n.get("connections").unwrap().get("dicom").unwrap()).map(String::from)
        };
        assert_eq!(dicom(&a), dicom(&b));
        assert_ne!(
            stored_hash(a.get("connections").unwrap()),
            stored_hash(b.get("connections").unwrap())
        );
    }

    #[test]
    fn list_element_identity_reaches_ancestors() {
        let e = engine();
        let with = |identity: &str| {
            Node::from(json!({
                "#olockhash": null,
                "connections": [{"#olockhash": null, "#uuid": identity, "port": 104}]
            }))
        };
        let mut a = with("conn-1");
        let mut b = with("conn-2");
        assert_ne!(e.digest(&a), e.digest(&b));

        e.stamp(&mut a);
        e.stamp(&mut b);
        let element = |n: &Node| match n.get("connections") {
            Some(Node::List(items)) => stored_hash(&items[0]).map(String::from),
            _ => None,
        };
        assert_eq!(element(&a), element(&b));
        assert_ne!(stored_hash(&a), stored_hash(&b));
        assert!(e.verify(&a));
    }

    #[test]
    fn previous_hash_never_influences_digest() {
        let e = engine();
        let mut node = device();
        let first = e.stamp(&mut node);
        let second = e.stamp(&mut node);
        assert_eq!(first, second);
        assert!(e.verify(&node));
    }

    #[test]
    fn preserving_variant_keeps_old_hash_in_side_field() {
        let e = engine();
        let mut node = device();
        let original = e.stamp(&mut node);

        node.as_obj_mut()
            .unwrap()
            .insert("deviceName".into(), Node::from("arc-renamed"));
        let fresh = e.stamp_preserving_old(&mut node);

        assert_ne!(original, fresh);
        assert_eq!(stored_hash(&node), Some(fresh.to_base64().as_str()));
        assert_eq!(take_expected_hash(&mut node), Some(original.to_base64()));
        assert!(node.get(OLD_OLOCK_HASH_KEY).is_none());
        assert!(e.verify(&node));
    }

    #[test]
    fn strip_removes_nested_side_fields() {
        let e = engine();
        let mut node = device();
        e.stamp(&mut node);
        e.stamp_preserving_old(&mut node);
        strip_side_fields(&mut node);
        assert!(node.get(OLD_OLOCK_HASH_KEY).is_none());
        let dicom = node.get("connections").unwrap().get("dicom").unwrap();
        assert!(dicom.get(OLD_OLOCK_HASH_KEY).is_none());
    }

    #[test]
    fn verify_detects_tampering() {
        let e = engine();
        let mut node = device();
        e.stamp(&mut node);
        node.as_obj_mut()
            .unwrap()
            .insert("deviceName".into(), Node::from("tampered"));
        assert!(!e.verify(&node));
    }

    #[test]
    fn unstamped_objects_get_no_hash_key() {
        let e = engine();
        let mut node = Node::from(json!({"a": {"b": 1}}));
        e.stamp(&mut node);
        assert!(node.get(OLOCK_HASH_KEY).is_none());
        assert!(node.get("a").unwrap().get(OLOCK_HASH_KEY).is_none());
    }

    proptest! {
        #[test]
        fn digest_is_independent_of_insertion_order(
            entries in proptest::collection::btree_map("[a-z]{1,6}", -1000i64..1000, 1..8)
        ) {
            let forward: NodeMap = entries.iter().map(|(k, v)| (k.clone(), Node::from(*v))).collect();
            let backward: NodeMap = entries.iter().rev().map(|(k, v)| (k.clone(), Node::from(*v))).collect();
            prop_assert_eq!(
                engine().digest(&Node::Obj(forward)),
                engine().digest(&Node::Obj(backward))
            );
        }
    }
}
