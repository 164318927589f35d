use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cfgdoc_types::{ConfigError, Node, NodeMap, Result};

use crate::adapter::{mismatch, wrong_value, TypeAdapter};
use crate::context::BindContext;
use crate::descriptor::{PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::{schema_type, SchemaContext};
use crate::value::{ParentHandle, Value};

/// Arrays. A byte array is one base64 string; any other array is a list of
/// its encoded elements with nulls dropped.
pub struct ArrayAdapter;

fn element_kind(prop: &PropertyDescriptor) -> Result<&ValueKind> {
    match &prop.kind {
        ValueKind::Array(element) | ValueKind::Collection { element, .. } => Ok(&**element),
        other => Err(ConfigError::deserialization(
            prop.name.as_str(),
            other.to_string(),
            "not a sequence property",
        )),
    }
}

/// Encode sequence elements, skipping nulls.
pub(crate) fn encode_elements(
    items: &[Value],
    prop: &PropertyDescriptor,
    registry: &Registry,
) -> Result<Node> {
    let element = prop.element(element_kind(prop)?);
    let adapter = registry.adapter(&element.kind)?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().filter(|v| !v.is_null()).enumerate() {
        let node = adapter
            .to_node(item, &element, registry)
            .map_err(|e| e.in_field(&i.to_string()).in_field(&prop.name))?;
        out.push(node);
    }
    Ok(Node::List(out))
}

/// Decode the elements of a list node, skipping nulls and elements the
/// element adapter leaves absent.
pub(crate) fn decode_elements(
    node: &Node,
    prop: &PropertyDescriptor,
    ctx: &mut BindContext<'_>,
    parent: Option<&ParentHandle>,
) -> Result<Vec<Value>> {
    let Node::List(items) = node else {
        return Err(mismatch(prop, "a list", node));
    };
    let element = prop.element(element_kind(prop)?);
    let adapter = ctx.registry().adapter(&element.kind)?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().filter(|n| !n.is_null()).enumerate() {
        let index = i.to_string();
        let value = ctx
            .within(&index, |ctx| adapter.from_node(item, &element, ctx, parent))
            .map_err(|e| e.in_field(&index).in_field(&prop.name))?;
        out.extend(value);
    }
    Ok(out)
}

/// Normalize a sequence: absent becomes empty, nulls are dropped, elements
/// go through their own adapter.
pub(crate) fn normalize_elements(
    node: Option<Node>,
    prop: &PropertyDescriptor,
    registry: &Registry,
) -> Result<Option<Node>> {
    let items = match node {
        Some(Node::Null) | None => return Ok(Some(Node::list())),
        Some(Node::List(items)) => items,
        Some(other) => return Ok(Some(other)),
    };
    let element = prop.element(element_kind(prop)?);
    let adapter = registry.adapter(&element.kind)?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().filter(|n| !n.is_null()).enumerate() {
        let normalized = adapter
            .normalize(Some(item), &element, registry)
            .map_err(|e| e.in_field(&i.to_string()).in_field(&prop.name))?;
        out.extend(normalized);
    }
    Ok(Some(Node::List(out)))
}

pub(crate) fn sequence_schema(
    prop: &PropertyDescriptor,
    schema: &mut SchemaContext<'_>,
) -> Result<NodeMap> {
    let element = prop.element(element_kind(prop)?);
    let mut entry = schema_type("array");
    entry.insert("items".into(), schema.property(&element)?);
    Ok(entry)
}

impl TypeAdapter for ArrayAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, registry: &Registry) -> Result<Node> {
        if prop.kind.is_byte_array() {
            return match value {
                Value::Null => Ok(Node::Null),
                Value::Bytes(bytes) => Ok(Node::Str(STANDARD.encode(bytes))),
                other => Err(wrong_value(prop, other)),
            };
        }
        match value {
            Value::Null => Ok(Node::Null),
            Value::Array(items) | Value::List(items) => encode_elements(items, prop, registry),
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
        if prop.kind.is_byte_array() {
            let Node::Str(text) = node else {
                return Err(mismatch(prop, "a base64 string", node));
            };
            let bytes = STANDARD.decode(text.trim()).map_err(|e| {
                ConfigError::deserialization(prop.name.as_str(), prop.kind.to_string(), e.to_string())
            })?;
            return Ok(Some(Value::Bytes(bytes)));
        }
        decode_elements(node, prop, ctx, parent).map(|items| Some(Value::Array(items)))
    }

    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        registry: &Registry,
    ) -> Result<Option<Node>> {
        if prop.kind.is_byte_array() {
            return Ok(match node {
                Some(Node::Null) | None => Some(Node::Str(String::new())),
                other => other,
            });
        }
        normalize_elements(node, prop, registry)
    }

    fn schema(&self, prop: &PropertyDescriptor, schema: &mut SchemaContext<'_>) -> Result<NodeMap> {
        if prop.kind.is_byte_array() {
            let mut entry = schema_type("string");
            entry.insert("class".into(), Node::from("Base64"));
            return Ok(entry);
        }
        sequence_schema(prop, schema)
    }
}
