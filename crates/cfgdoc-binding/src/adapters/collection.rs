use cfgdoc_types::{Node, NodeMap, Result};

use super::array::{decode_elements, encode_elements, normalize_elements, sequence_schema};
use crate::adapter::{wrong_value, TypeAdapter};
use crate::context::BindContext;
use crate::descriptor::{CollectionKind, PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::SchemaContext;
use crate::value::{dedup, ParentHandle, Value};

/// Lists and sets, written as lists. Sets drop duplicates on both paths.
pub struct CollectionAdapter;

fn is_set(prop: &PropertyDescriptor) -> bool {
    matches!(
        prop.kind,
        ValueKind::Collection {
            kind: CollectionKind::Set,
            ..
        }
    )
}

impl TypeAdapter for CollectionAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, registry: &Registry) -> Result<Node> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::List(items) | Value::Array(items) | Value::Set(items) if is_set(prop) => {
                encode_elements(&dedup(items.iter().cloned()), prop, registry)
            }
            Value::List(items) | Value::Array(items) | Value::Set(items) => {
                encode_elements(items, prop, registry)
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
        let items = decode_elements(node, prop, ctx, parent)?;
        Ok(Some(if is_set(prop) {
            Value::set_of(items)
        } else {
            Value::List(items)
        }))
    }

    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        registry: &Registry,
    ) -> Result<Option<Node>> {
        normalize_elements(node, prop, registry)
    }

    fn schema(&self, prop: &PropertyDescriptor, schema: &mut SchemaContext<'_>) -> Result<NodeMap> {
        sequence_schema(prop, schema)
    }
}
