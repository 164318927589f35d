use cfgdoc_types::{ConfigError, Node, NodeMap, Result};

use crate::adapter::{mismatch, unknown_class, wrong_value, TypeAdapter};
use crate::context::BindContext;
use crate::descriptor::{ClassDescriptor, PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::SchemaContext;
use crate::value::{ConfigObject, ParentHandle, Value};

/// Nested objects of a registered class.
pub struct ReflectiveAdapter;

fn class_of<'r>(prop: &PropertyDescriptor, registry: &'r Registry) -> Result<&'r ClassDescriptor> {
    match &prop.kind {
        ValueKind::Reflective { class } => registry
            .class(class)
            .ok_or_else(|| unknown_class(&prop.name, class)),
        other => Err(ConfigError::deserialization(
            prop.name.as_str(),
            other.to_string(),
            "not an object property",
        )),
    }
}

/// Encode every declared property of `obj`. The olock-hash property is always
/// written, as `Null` when the object has no hash yet, so that stamping
/// knows where hashes belong.
pub(crate) fn encode_object(
    obj: &ConfigObject,
    class: &ClassDescriptor,
    registry: &Registry,
) -> Result<Node> {
    if obj.class() != class.name() {
        return Err(ConfigError::unserializable(
            "",
            format!("{} object cannot be written as {}", obj.class(), class.name()),
        ));
    }
    if let Some(name) = obj
        .fields()
        .keys()
        .find(|name| class.property_named(name).is_none())
    {
        return Err(ConfigError::unserializable(
            name.as_str(),
            format!("{} has no such property", class.name()),
        ));
    }

    let mut out = NodeMap::new();
    for prop in class.properties() {
        let key = prop.storage_key();
        if prop.is_olock_hash {
            let hash = obj.str(&prop.name).map(Node::from).unwrap_or(Node::Null);
            out.insert(key.to_string(), hash);
            continue;
        }
        let Some(value) = obj.get(&prop.name).filter(|v| !v.is_null()) else {
            continue;
        };
        let node = registry
            .adapter(&prop.kind)
            .map_err(|e| e.in_field(&prop.name))?
            .to_node(value, prop, registry)?;
        if !node.is_null() {
            out.insert(key.to_string(), node);
        }
    }
    Ok(Node::Obj(out))
}

/// Decode an object node of `class`. Absent and null children leave their
/// field absent; keys the class does not declare are ignored.
pub(crate) fn decode_object(
    class: &ClassDescriptor,
    node: &Node,
    ctx: &mut BindContext<'_>,
    parent: Option<&ParentHandle>,
) -> Result<ConfigObject> {
    let Node::Obj(map) = node else {
        return Err(ConfigError::deserialization(
            "",
            class.name(),
            format!("expected an object, found {}", node.kind_name()),
        ));
    };
    let handle = ParentHandle {
        class: class.name().to_string(),
        identity: class
            .uuid_property()
            .and_then(|p| map.get(p.storage_key()))
            .and_then(Node::as_str)
            .map(String::from),
    };

    let mut obj = ConfigObject::new(class.name());
    obj.set_parent(parent.cloned());
    let registry = ctx.registry();
    for prop in class.properties() {
        let key = prop.storage_key();
        let Some(child) = map.get(key).filter(|n| !n.is_null()) else {
            continue;
        };
        let adapter = registry
            .adapter(&prop.kind)
            .map_err(|e| e.in_field(&prop.name))?;
        let value = ctx.within(key, |ctx| adapter.from_node(child, prop, ctx, Some(&handle)))?;
        if let Some(value) = value {
            obj.set(prop.name.clone(), value);
        }
    }
    Ok(obj)
}

/// Normalize every declared property of an object node and check setter
/// groups. Reserved identity and hash keys are left untouched.
pub(crate) fn normalize_object(
    class: &ClassDescriptor,
    node: Node,
    registry: &Registry,
) -> Result<Node> {
    let Node::Obj(mut map) = node else {
        return Ok(node);
    };
    let present = |map: &NodeMap, member: &str| {
        class
            .property_named(member)
            .and_then(|p| map.get(p.storage_key()))
            .is_some_and(|n| !n.is_null())
    };
    let started: Vec<bool> = class
        .setter_groups()
        .iter()
        .map(|group| group.members.iter().any(|m| present(&map, m)))
        .collect();

    for prop in class.properties() {
        if prop.is_uuid || prop.is_olock_hash {
            continue;
        }
        let key = prop.storage_key();
        let current = map.get_mut(key).map(std::mem::take);
        let normalized = registry
            .adapter(&prop.kind)
            .map_err(|e| e.in_field(&prop.name))?
            .normalize(current, prop, registry)?;
        match normalized {
            Some(node) => {
                map.insert(key.to_string(), node);
            }
            None => {
                map.shift_remove(key);
            }
        }
    }

    for (group, started) in class.setter_groups().iter().zip(started) {
        if started && !group.members.iter().all(|m| present(&map, m)) {
            return Err(ConfigError::missing(group.name.as_str()));
        }
    }
    Ok(Node::Obj(map))
}

impl TypeAdapter for ReflectiveAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, registry: &Registry) -> Result<Node> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::Object(obj) => {
                let class = class_of(prop, registry)?;
                encode_object(obj, class, registry).map_err(|e| e.in_field(&prop.name))
            }
            other => Err(wrong_value(prop, other)),
        }
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        ctx: &mut BindContext<'_>,
        parent: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        if node.is_null() {
            return Ok(None);
        }
        if !node.is_obj() {
            return Err(mismatch(prop, "an object", node));
        }
        let class = class_of(prop, ctx.registry())?;
        decode_object(class, node, ctx, parent)
            .map(|obj| Some(Value::Object(obj)))
            .map_err(|e| e.in_field(&prop.name))
    }

    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        registry: &Registry,
    ) -> Result<Option<Node>> {
        match node {
            Some(Node::Null) | None => Ok(None),
            Some(node) => {
                let class = class_of(prop, registry)?;
                normalize_object(class, node, registry)
                    .map(Some)
                    .map_err(|e| e.in_field(&prop.name))
            }
        }
    }

    fn schema(&self, prop: &PropertyDescriptor, schema: &mut SchemaContext<'_>) -> Result<NodeMap> {
        match &prop.kind {
            ValueKind::Reflective { class } => schema.class(class),
            other => Err(ConfigError::deserialization(
                prop.name.as_str(),
                other.to_string(),
                "not an object property",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{connection, device, registry};
    use cfgdoc_types::{OLOCK_HASH_KEY, UUID_KEY};

    #[test]
    fn reserved_keys_for_identity_and_hash() {
        let registry = registry();
        let class = registry.class("Device").unwrap();
        let node = encode_object(&device(), class, &registry).unwrap();
        assert_eq!(node.get(UUID_KEY), Some(&Node::from("dev-1")));
        assert_eq!(node.get(OLOCK_HASH_KEY), Some(&Node::Null));
        assert!(node.get("uuid").is_none());
    }

    #[test]
    fn undeclared_field_is_unserializable() {
        let registry = registry();
        let class = registry.class("Connection").unwrap();
        let obj = connection("dicom", 104).with("bogus", 1);
        match encode_object(&obj, class, &registry) {
            Err(ConfigError::Unserializable { field, .. }) => assert_eq!(field, "bogus"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn nested_objects_receive_parent_handle() {
        let registry = registry();
        let class = registry.class("Device").unwrap();
        let node = encode_object(&device(), class, &registry).unwrap();
        let mut ctx = BindContext::new(&registry);
        let decoded = decode_object(class, &node, &mut ctx, None).unwrap();
        let archive = decoded.extension("extensions", "ArchiveExt").unwrap();
        let parent = archive.parent().unwrap();
        assert_eq!(parent.class, "Device");
        assert_eq!(parent.identity.as_deref(), Some("dev-1"));
        assert!(decoded.parent().is_none());
    }

    #[test]
    fn setter_group_is_all_or_nothing() {
        let registry = registry();
        let class = registry.class("Connection").unwrap();
        let partial = Node::obj([
            ("cn", Node::from("dicom")),
            ("port", Node::from(104)),
            ("tlsKeyStore", Node::from("/etc/ks.p12")),
        ]);
        match normalize_object(class, partial, &registry) {
            Err(ConfigError::MissingValue { field }) => assert_eq!(field, "tls"),
            other => panic!("unexpected result: {other:?}"),
        }

        let complete = Node::obj([
            ("cn", Node::from("dicom")),
            ("port", Node::from(104)),
            ("tlsKeyStore", Node::from("/etc/ks.p12")),
            ("tlsKeyStorePin", Node::from("secret")),
        ]);
        assert!(normalize_object(class, complete, &registry).is_ok());
    }

    #[test]
    fn normalize_keeps_hash_placeholder() {
        let registry = registry();
        let class = registry.class("Device").unwrap();
        let node = encode_object(&device(), class, &registry).unwrap();
        let normalized = normalize_object(class, node, &registry).unwrap();
        assert_eq!(normalized.get(OLOCK_HASH_KEY), Some(&Node::Null));
    }

    #[test]
    fn nested_error_carries_field_path() {
        let registry = registry();
        let class = registry.class("Device").unwrap();
        let node = Node::obj([
            ("deviceName", Node::from("arc")),
            (
                "connections",
                Node::List(vec![Node::obj([
                    ("cn", Node::from("dicom")),
                    ("port", Node::from("not-a-port")),
                ])]),
            ),
        ]);
        let mut ctx = BindContext::new(&registry);
        match decode_object(class, &node, &mut ctx, None) {
            Err(ConfigError::Deserialization { field, declared, .. }) => {
                assert_eq!(field, "connections/0/port");
                assert_eq!(declared, "Int");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
