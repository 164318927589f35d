use cfgdoc_types::{ConfigError, Node, NodeMap, Result};

use crate::adapter::{mismatch, wrong_value, TypeAdapter};
use crate::context::BindContext;
use crate::descriptor::{PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::{schema_type, SchemaContext};
use crate::value::{ParentHandle, Value};

/// Maps, written as objects. Keys of any scalar kind are stringified on the
/// way out and parsed back through the key adapter; null values are kept.
pub struct MapAdapter;

fn parameters(prop: &PropertyDescriptor) -> Result<(PropertyDescriptor, PropertyDescriptor)> {
    match &prop.kind {
        ValueKind::Map { key, value } => Ok((prop.element(key), prop.element(value))),
        other => Err(ConfigError::deserialization(
            prop.name.as_str(),
            other.to_string(),
            "not a map property",
        )),
    }
}

fn key_text(
    key: &Value,
    key_prop: &PropertyDescriptor,
    prop: &PropertyDescriptor,
    registry: &Registry,
) -> Result<String> {
    let node = registry
        .adapter(&key_prop.kind)?
        .to_node(key, key_prop, registry)
        .map_err(|e| e.in_field(&prop.name))?;
    node.scalar_text().ok_or_else(|| {
        ConfigError::unserializable(
            prop.name.as_str(),
            format!("map key encodes to a {} node", node.kind_name()),
        )
    })
}

impl TypeAdapter for MapAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, registry: &Registry) -> Result<Node> {
        let pairs = match value {
            Value::Null => return Ok(Node::Null),
            Value::Map(pairs) => pairs,
            other => return Err(wrong_value(prop, other)),
        };
        let (key_prop, value_prop) = parameters(prop)?;
        let value_adapter = registry.adapter(&value_prop.kind)?;
        let mut out = NodeMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            let key = key_text(key, &key_prop, prop, registry)?;
            let node = match value {
                Value::Null => Node::Null,
                value => value_adapter
                    .to_node(value, &value_prop, registry)
                    .map_err(|e| e.in_field(&key).in_field(&prop.name))?,
            };
            out.insert(key, node);
        }
        Ok(Node::Obj(out))
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        ctx: &mut BindContext<'_>,
        parent: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        let entries = match node {
            Node::Null => return Ok(None),
            Node::Obj(entries) => entries,
            other => return Err(mismatch(prop, "an object", other)),
        };
        let (key_prop, value_prop) = parameters(prop)?;
        let registry = ctx.registry();
        let key_adapter = registry.adapter(&key_prop.kind)?;
        let value_adapter = registry.adapter(&value_prop.kind)?;
        let mut pairs = Vec::with_capacity(entries.len());
        for (text, child) in entries {
            let locate = |e: ConfigError| e.in_field(text).in_field(&prop.name);
            let key_node = key_adapter
                .normalize(Some(Node::Str(text.clone())), &key_prop, registry)
                .map_err(locate)?
                .unwrap_or(Node::Null);
            let key = key_adapter
                .from_node(&key_node, &key_prop, ctx, parent)
                .map_err(locate)?
                .ok_or_else(|| mismatch(prop, "a map key", &key_node))?;
            let value = if child.is_null() {
                Value::Null
            } else {
                ctx.within(text, |ctx| value_adapter.from_node(child, &value_prop, ctx, parent))
                    .map_err(locate)?
                    .unwrap_or(Value::Null)
            };
            pairs.push((key, value));
        }
        Ok(Some(Value::Map(pairs)))
    }

    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        registry: &Registry,
    ) -> Result<Option<Node>> {
        let entries = match node {
            Some(Node::Null) | None => return Ok(Some(Node::object())),
            Some(Node::Obj(entries)) => entries,
            Some(other) => return Ok(Some(other)),
        };
        let (_, value_prop) = parameters(prop)?;
        let adapter = registry.adapter(&value_prop.kind)?;
        let mut out = NodeMap::with_capacity(entries.len());
        for (key, child) in entries {
            let child = if child.is_null() {
                Node::Null
            } else {
                adapter
                    .normalize(Some(child), &value_prop, registry)
                    .map_err(|e| e.in_field(&key).in_field(&prop.name))?
                    .unwrap_or(Node::Null)
            };
            out.insert(key, child);
        }
        Ok(Some(Node::Obj(out)))
    }

    fn schema(&self, prop: &PropertyDescriptor, schema: &mut SchemaContext<'_>) -> Result<NodeMap> {
        let (key_prop, value_prop) = parameters(prop)?;
        let mut entry = schema_type("object");
        entry.insert("mapkey".into(), schema.property(&key_prop)?);
        entry.insert("items".into(), schema.property(&value_prop)?);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::EnumType;

    fn roundtrip(prop: &PropertyDescriptor, value: &Value) -> (Node, Value) {
        let registry = Registry::new();
        let node = MapAdapter.to_node(value, prop, &registry).unwrap();
        let mut ctx = BindContext::new(&registry);
        let back = MapAdapter.from_node(&node, prop, &mut ctx, None).unwrap().unwrap();
        (node, back)
    }

    #[test]
    fn integer_keys_are_stringified_and_parsed_back() {
        let prop = PropertyDescriptor::new("ports", ValueKind::map(ValueKind::int(), ValueKind::string()));
        let value = Value::Map(vec![
            (Value::Int(104), Value::from("dicom")),
            (Value::Int(2575), Value::from("hl7")),
        ]);
        let (node, back) = roundtrip(&prop, &value);
        assert_eq!(node.get("104"), Some(&Node::from("dicom")));
        assert_eq!(back, value);
    }

    #[test]
    fn enum_keys() {
        let protocol = EnumType::new("Protocol", ["DICOM", "HL7"]);
        let prop = PropertyDescriptor::new(
            "timeouts",
            ValueKind::map(ValueKind::enumeration(protocol), ValueKind::int()),
        );
        let value = Value::Map(vec![(Value::Enum("HL7".into()), Value::Int(30))]);
        let (node, back) = roundtrip(&prop, &value);
        assert_eq!(node.get("HL7"), Some(&Node::from(30)));
        assert_eq!(back, value);
    }

    #[test]
    fn null_values_are_kept() {
        let prop = PropertyDescriptor::new(
            "aliases",
            ValueKind::map(ValueKind::string(), ValueKind::nullable_string()),
        );
        let value = Value::Map(vec![
            (Value::from("a"), Value::Null),
            (Value::from("b"), Value::from("x")),
        ]);
        let (node, back) = roundtrip(&prop, &value);
        assert_eq!(node.get("a"), Some(&Node::Null));
        assert_eq!(back, value);

        let normalized = MapAdapter
            .normalize(Some(node), &prop, &Registry::new())
            .unwrap()
            .unwrap();
        assert_eq!(normalized.get("a"), Some(&Node::Null));
    }

    #[test]
    fn bad_key_reports_location() {
        let registry = Registry::new();
        let prop = PropertyDescriptor::new("ports", ValueKind::map(ValueKind::int(), ValueKind::string()));
        let node = Node::obj([("abc", Node::from("x"))]);
        let mut ctx = BindContext::new(&registry);
        match MapAdapter.from_node(&node, &prop, &mut ctx, None) {
            Err(ConfigError::Deserialization { field, .. }) => assert_eq!(field, "ports/abc"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn absent_map_normalizes_to_empty_object() {
        let prop = PropertyDescriptor::new("m", ValueKind::map(ValueKind::string(), ValueKind::int()));
        assert_eq!(
            MapAdapter.normalize(None, &prop, &Registry::new()).unwrap(),
            Some(Node::object())
        );
    }
}
