use cfgdoc_types::{Node, Result};
use tracing::trace;

use crate::adapter::unknown_class;
use crate::adapters::normalize_object;
use crate::descriptor::PropertyDescriptor;
use crate::registry::Registry;

/// Brings a raw node into the shape its class declares before binding.
///
/// Absent properties receive their declared default or a neutral value,
/// absent containers become empty, and string-encoded scalars are coerced.
/// Normalizing an already normalized node leaves it unchanged.
#[derive(Clone, Copy, Debug)]
pub struct Normalizer<'r> {
    registry: &'r Registry,
}

impl<'r> Normalizer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Normalize a node bound to the registered class `class`.
    pub fn normalize(&self, class: &str, node: Node) -> Result<Node> {
        let descriptor = self
            .registry
            .class(class)
            .ok_or_else(|| unknown_class("", class))?;
        trace!(class, "normalizing node");
        normalize_object(descriptor, node, self.registry)
    }

    /// Normalize one property value. `None` means absent.
    pub fn normalize_property(
        &self,
        prop: &PropertyDescriptor,
        node: Option<Node>,
    ) -> Result<Option<Node>> {
        self.registry
            .adapter(&prop.kind)?
            .normalize(node, prop, self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ValueKind;
    use crate::testing::registry;
    use cfgdoc_types::{ConfigError, OLOCK_HASH_KEY, UUID_KEY};
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Defaults
    // -----------------------------------------------------------------------

    #[test]
    fn fills_defaults_and_empty_containers() {
        let registry = registry();
        let node = Node::obj([("deviceName", Node::from("arc"))]);
        let out = Normalizer::new(&registry).normalize("Device", node).unwrap();

        assert_eq!(out.get("deviceName"), Some(&Node::from("arc")));
        assert_eq!(out.get("installed"), Some(&Node::Bool(false)));
        assert_eq!(out.get("connections"), Some(&Node::list()));
        assert_eq!(out.get("tags"), Some(&Node::list()));
        assert_eq!(out.get("portNames"), Some(&Node::object()));
        assert_eq!(out.get("extensions"), Some(&Node::object()));
        assert_eq!(out.get("vendorData"), Some(&Node::from("")));
        assert!(out.get("description").is_none());
        assert!(out.get("primaryConnection").is_none());
    }

    #[test]
    fn nested_objects_are_normalized() {
        let registry = registry();
        let node = Node::obj([
            ("deviceName", Node::from("arc")),
            (
                "connections",
                Node::List(vec![Node::obj([
                    ("cn", Node::from("dicom")),
                    ("port", Node::from("104")),
                ])]),
            ),
            (
                "extensions",
                Node::obj([("ArchiveExt", Node::obj([("storageDir", Node::from("/a"))]))]),
            ),
        ]);
        let out = Normalizer::new(&registry).normalize("Device", node).unwrap();

        let conn = &out.get("connections").unwrap().as_list().unwrap()[0];
        assert_eq!(conn.get("port"), Some(&Node::Num(104.0)));
        assert_eq!(conn.get("hostname"), Some(&Node::from("localhost")));
        assert_eq!(conn.get("protocol"), Some(&Node::from("DICOM")));
        let archive = out.get("extensions").unwrap().get("ArchiveExt").unwrap();
        assert_eq!(archive.get("retries"), Some(&Node::Num(3.0)));
    }

    #[test]
    fn missing_required_value_fails() {
        let registry = registry();
        let err = Normalizer::new(&registry)
            .normalize("Device", Node::object())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { ref field } if field == "deviceName"));
    }

    #[test]
    fn reserved_keys_pass_through() {
        let registry = registry();
        let node = Node::obj([
            (UUID_KEY, Node::from("dev-1")),
            (OLOCK_HASH_KEY, Node::Null),
            ("deviceName", Node::from("arc")),
        ]);
        let out = Normalizer::new(&registry).normalize("Device", node).unwrap();
        assert_eq!(out.get(UUID_KEY), Some(&Node::from("dev-1")));
        assert_eq!(out.get(OLOCK_HASH_KEY), Some(&Node::Null));
    }

    #[test]
    fn unknown_class_is_rejected() {
        let registry = registry();
        assert!(matches!(
            Normalizer::new(&registry).normalize("Nope", Node::object()),
            Err(ConfigError::Deserialization { .. })
        ));
    }

    #[test]
    fn single_property() {
        let registry = registry();
        let prop = PropertyDescriptor::new("port", ValueKind::int()).with_default("104");
        let normalizer = Normalizer::new(&registry);
        assert_eq!(
            normalizer.normalize_property(&prop, None).unwrap(),
            Some(Node::Num(104.0))
        );
    }

    // -----------------------------------------------------------------------
    // Idempotence
    // -----------------------------------------------------------------------

    fn scalar() -> impl Strategy<Value = Node> {
        prop_oneof![
            Just(Node::Null),
            any::<bool>().prop_map(Node::Bool),
            (0i64..70000).prop_map(|i| Node::Num(i as f64)),
            (0i64..70000).prop_map(|i| Node::Str(i.to_string())),
            "[a-z]{0,8}".prop_map(Node::Str),
        ]
    }

    fn connection_node() -> impl Strategy<Value = Node> {
        (scalar(), proptest::option::of(scalar())).prop_map(|(port, host)| {
            let mut node = Node::obj([("cn", Node::from("c")), ("port", port)]);
            if let (Some(host), Some(map)) = (host, node.as_obj_mut()) {
                map.insert("hostname".into(), host);
            }
            node
        })
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(
            installed in proptest::option::of(scalar()),
            connections in proptest::collection::vec(connection_node(), 0..4),
            tags in proptest::collection::vec("[a-z]{1,4}", 0..4),
        ) {
            let registry = registry();
            let normalizer = Normalizer::new(&registry);
            let mut node = Node::obj([
                ("deviceName", Node::from("arc")),
                ("connections", Node::List(connections)),
                ("tags", Node::List(tags.into_iter().map(Node::Str).collect())),
            ]);
            if let (Some(installed), Some(map)) = (installed, node.as_obj_mut()) {
                map.insert("installed".into(), installed);
            }
            if let Ok(once) = normalizer.normalize("Device", node) {
                let twice = normalizer.normalize("Device", once.clone()).unwrap();
                prop_assert_eq!(once, twice);
            }
        }
    }
}
