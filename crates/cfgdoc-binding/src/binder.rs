use cfgdoc_types::{ConfigError, Node, Result};
use tracing::debug;

use crate::adapter::unknown_class;
use crate::adapters::{decode_object, encode_object};
use crate::context::BindContext;
use crate::descriptor::ClassDescriptor;
use crate::normalize::Normalizer;
use crate::registry::Registry;
use crate::value::ConfigObject;

/// A Rust type that binds through a registered class.
///
/// Implementors describe their class once and convert to and from the
/// engine's [`ConfigObject`]; the [`Binder`] does the rest.
pub trait Configurable: Sized {
    /// Name of the class, as registered.
    const CLASS: &'static str;

    fn class() -> ClassDescriptor;

    fn to_object(&self) -> ConfigObject;

    fn from_object(obj: &ConfigObject) -> Result<Self>;
}

/// Converts typed objects to nodes and back, through one registry.
#[derive(Clone, Copy, Debug)]
pub struct Binder<'r> {
    registry: &'r Registry,
}

impl<'r> Binder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// A fresh context over this binder's registry.
    pub fn context(&self) -> BindContext<'r> {
        BindContext::new(self.registry)
    }

    /// Encode `obj` as a node of its own class.
    ///
    /// Identity-only references must have been turned into paths first.
    pub fn to_node(&self, obj: &ConfigObject) -> Result<Node> {
        let class = self.registry.class(obj.class()).ok_or_else(|| {
            ConfigError::unserializable("", format!("class {} is not registered", obj.class()))
        })?;
        encode_object(obj, class, self.registry)
    }

    /// Normalize a copy of `node` and decode it as `class`.
    pub fn from_node(
        &self,
        class: &str,
        node: &Node,
        ctx: &mut BindContext<'_>,
    ) -> Result<ConfigObject> {
        let descriptor = self
            .registry
            .class(class)
            .ok_or_else(|| unknown_class("", class))?;
        let normalized = Normalizer::new(self.registry).normalize(class, node.clone())?;
        let obj = decode_object(descriptor, &normalized, ctx, None)?;
        if !ctx.diagnostics().is_empty() {
            debug!(class, diagnostics = ctx.diagnostics().len(), "bound with diagnostics");
        }
        Ok(obj)
    }

    pub fn encode<T: Configurable>(&self, value: &T) -> Result<Node> {
        self.to_node(&value.to_object())
    }

    pub fn decode<T: Configurable>(&self, node: &Node, ctx: &mut BindContext<'_>) -> Result<T> {
        T::from_object(&self.from_node(T::CLASS, node, ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DiagnosticKind, ReferenceLoader, ResolverConfig};
    use crate::descriptor::{PropertyDescriptor, ValueKind};
    use crate::testing::{connection, device, reference, registry};
    use crate::value::{Reference, Value};
    use cfgdoc_path::Path;
    use cfgdoc_types::UUID_KEY;
    use std::collections::HashMap;

    struct Fixture(HashMap<String, Node>);

    impl ReferenceLoader for Fixture {
        fn load(&self, path: &Path) -> Result<Option<Node>> {
            Ok(self.0.get(&path.to_string()).cloned())
        }
    }

    fn normalized(registry: &Registry, obj: &ConfigObject) -> ConfigObject {
        let binder = Binder::new(registry);
        let node = binder.to_node(obj).unwrap();
        binder.from_node(obj.class(), &node, &mut binder.context()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[test]
    fn every_kind_roundtrips() {
        let registry = registry();
        let obj = device()
            .with("description", "main archive")
            .with("installed", true)
            .with("priority", Value::Enum("HL7".into()))
            .with("vendorData", Value::Bytes(vec![1, 2, 3]))
            .with(
                "portNames",
                Value::Map(vec![
                    (Value::Int(104), Value::from("dicom")),
                    (Value::Int(2575), Value::Null),
                ]),
            )
            .with("tags", Value::set_of(["a", "b"].map(Value::from)))
            .with("primaryConnection", reference("/devices/arc/connections/0"));

        let binder = Binder::new(&registry);
        let node = binder.to_node(&obj).unwrap();
        assert_eq!(node.get("vendorData"), Some(&Node::from("AQID")));
        assert_eq!(node.get("priority"), Some(&Node::from(1)));
        assert_eq!(node.get(UUID_KEY), Some(&Node::from("dev-1")));

        let back = binder.from_node("Device", &node, &mut binder.context()).unwrap();
        assert_eq!(back, normalized(&registry, &obj));
        assert_eq!(back.get("vendorData"), Some(&Value::Bytes(vec![1, 2, 3])));
        assert_eq!(back.get("priority"), Some(&Value::Enum("HL7".into())));
        assert_eq!(
            back.reference("primaryConnection").and_then(Reference::path),
            Some(&Path::parse("/devices/arc/connections/0").unwrap())
        );
    }

    #[test]
    fn defaults_substitute_for_absent_nullable_fields() {
        let registry = registry();
        let binder = Binder::new(&registry);
        let node = binder.to_node(&device()).unwrap();
        let back = binder.from_node("Device", &node, &mut binder.context()).unwrap();

        assert_eq!(back.bool("installed"), Some(false));
        let conns = back.get("connections").and_then(Value::as_elements).unwrap();
        let conn = conns[0].as_object().unwrap();
        assert_eq!(conn.str("hostname"), Some("localhost"));
        assert_eq!(conn.str("protocol"), Some("DICOM"));
        assert_eq!(conn.parent().map(|p| p.class.as_str()), Some("Device"));
        let archive = back.extension("extensions", "ArchiveExt").unwrap();
        assert_eq!(archive.int("retries"), Some(3));
    }

    #[test]
    fn second_pass_is_stable() {
        let registry = registry();
        let once = normalized(&registry, &device());
        let twice = normalized(&registry, &once);
        assert_eq!(once, twice);
    }

    // -----------------------------------------------------------------------
    // Extensions
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_extension_is_dropped_with_diagnostic() {
        let registry = registry();
        let binder = Binder::new(&registry);
        let mut node = binder.to_node(&device()).unwrap();
        node.get_mut("extensions")
            .and_then(Node::as_obj_mut)
            .unwrap()
            .insert("HL7Ext".into(), Node::obj([("port", Node::from(2575))]));

        let mut ctx = binder.context();
        let back = binder.from_node("Device", &node, &mut ctx).unwrap();
        assert!(back.extension("extensions", "ArchiveExt").is_some());
        assert!(back.extension("extensions", "HL7Ext").is_none());
        assert_eq!(ctx.diagnostics().len(), 1);
        assert_eq!(ctx.diagnostics()[0].location, "extensions/HL7Ext");
        assert_eq!(
            ctx.diagnostics()[0].kind,
            DiagnosticKind::UnknownExtension {
                tag: "HL7Ext".into()
            }
        );
    }

    #[test]
    fn writing_unregistered_extension_fails() {
        let registry = registry();
        let obj = device().with_extension("extensions", ConfigObject::new("AuditExt"));
        assert!(matches!(
            Binder::new(&registry).to_node(&obj),
            Err(ConfigError::Unserializable { ref field, .. }) if field == "extensions"
        ));
    }

    #[test]
    fn unregistered_class_is_unserializable() {
        let registry = registry();
        assert!(matches!(
            Binder::new(&registry).to_node(&ConfigObject::new("Nope")),
            Err(ConfigError::Unserializable { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    fn with_primary(target: &str) -> Node {
        let registry = registry();
        let obj = device().with("primaryConnection", reference(target));
        Binder::new(&registry).to_node(&obj).unwrap()
    }

    fn store() -> Fixture {
        let mut nodes = HashMap::new();
        nodes.insert(
            "/connections/dicom".to_string(),
            Node::obj([("cn", Node::from("dicom")), ("port", Node::from("104"))]),
        );
        Fixture(nodes)
    }

    #[test]
    fn eager_mode_loads_target() {
        let registry = registry();
        let binder = Binder::new(&registry);
        let loader = store();
        let mut ctx = binder.context().with_loader(&loader);
        let back = binder
            .from_node("Device", &with_primary("/connections/dicom"), &mut ctx)
            .unwrap();
        let target = back.reference("primaryConnection").and_then(Reference::target).unwrap();
        assert_eq!(target.int("port"), Some(104));
        assert_eq!(target.str("hostname"), Some("localhost"));
    }

    #[test]
    fn lazy_mode_keeps_paths() {
        let registry = registry();
        let binder = Binder::new(&registry);
        let loader = store();
        let mut ctx = binder
            .context()
            .with_loader(&loader)
            .with_resolver(ResolverConfig::lazy());
        let back = binder
            .from_node("Device", &with_primary("/connections/dicom"), &mut ctx)
            .unwrap();
        let primary = back.reference("primaryConnection").unwrap();
        assert!(!primary.is_resolved());
    }

    #[test]
    fn dangling_reference_strict_and_lenient() {
        let registry = registry();
        let binder = Binder::new(&registry);
        let loader = store();
        let node = with_primary("/connections/gone");

        let mut strict = binder.context().with_loader(&loader);
        assert!(matches!(
            binder.from_node("Device", &node, &mut strict),
            Err(ConfigError::UnresolvedReference { .. })
        ));

        let mut lenient = binder
            .context()
            .with_loader(&loader)
            .with_resolver(ResolverConfig::default().lenient());
        let back = binder.from_node("Device", &node, &mut lenient).unwrap();
        assert!(back.get("primaryConnection").is_none());
        assert_eq!(lenient.diagnostics()[0].location, "primaryConnection");
    }

    // -----------------------------------------------------------------------
    // Configurable
    // -----------------------------------------------------------------------

    #[derive(Debug, PartialEq)]
    struct Endpoint {
        cn: String,
        port: u16,
    }

    impl Configurable for Endpoint {
        const CLASS: &'static str = "Endpoint";

        fn class() -> ClassDescriptor {
            ClassDescriptor::new(Self::CLASS)
                .property(PropertyDescriptor::new("cn", ValueKind::string()))
                .property(PropertyDescriptor::new("port", ValueKind::int()).with_default("104"))
        }

        fn to_object(&self) -> ConfigObject {
            ConfigObject::new(Self::CLASS)
                .with("cn", self.cn.as_str())
                .with("port", i64::from(self.port))
        }

        fn from_object(obj: &ConfigObject) -> Result<Self> {
            let port = obj.require("port")?.as_int().unwrap_or_default();
            Ok(Self {
                cn: obj.str("cn").unwrap_or_default().to_string(),
                port: u16::try_from(port)
                    .map_err(|_| ConfigError::deserialization("port", "Int", "out of range"))?,
            })
        }
    }

    #[test]
    fn configurable_types_bind() {
        let mut registry = Registry::new();
        registry.register::<Endpoint>();
        let binder = Binder::new(&registry);
        let value = Endpoint {
            cn: "dicom".into(),
            port: 11112,
        };
        let node = binder.encode(&value).unwrap();
        let back: Endpoint = binder.decode(&node, &mut binder.context()).unwrap();
        assert_eq!(back, value);

        let defaulted: Endpoint = binder
            .decode(&Node::obj([("cn", Node::from("x"))]), &mut binder.context())
            .unwrap();
        assert_eq!(defaulted.port, 104);
    }

    #[test]
    fn connection_fixture_binds() {
        let registry = registry();
        let back = normalized(&registry, &connection("dicom", 104));
        assert_eq!(back.int("port"), Some(104));
    }
}
