use cfgdoc_types::{format_number, ConfigError, Node, NodeMap, Result};

use crate::adapter::{mismatch, wrong_value, TypeAdapter};
use crate::context::BindContext;
use crate::descriptor::{PrimitiveKind, PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::{schema_type, SchemaContext};
use crate::value::{ParentHandle, Value};

/// Strings, integers, bytes, booleans and numbers.
///
/// Textual backends hand every scalar back as a string, so `normalize`
/// coerces string-encoded values to the declared kind.
pub struct PrimitiveAdapter;

fn primitive(prop: &PropertyDescriptor) -> (PrimitiveKind, bool) {
    match prop.kind {
        ValueKind::Primitive { kind, nullable } => (kind, nullable),
        _ => (PrimitiveKind::String, true),
    }
}

/// Coerce a string-encoded scalar to `kind`. Values that cannot be coerced
/// are returned unchanged and rejected later by `from_node`.
pub(crate) fn coerce(kind: PrimitiveKind, node: Node) -> Node {
    match (kind, node) {
        (PrimitiveKind::String, Node::Num(n)) => Node::Str(format_number(n)),
        (PrimitiveKind::String, Node::Bool(b)) => Node::Str(b.to_string()),
        (PrimitiveKind::Int | PrimitiveKind::Byte, Node::Str(s)) => match parse_int(&s) {
            Some(i) => Node::Num(i as f64),
            None => Node::Str(s),
        },
        (PrimitiveKind::Number, Node::Str(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Node::Num(n),
            _ => Node::Str(s),
        },
        (PrimitiveKind::Bool, Node::Str(s)) => match parse_bool(&s) {
            Some(b) => Node::Bool(b),
            None => Node::Str(s),
        },
        (_, node) => node,
    }
}

fn parse_int(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64).then_some(n as i64)
}

fn byte_range(i: i64) -> bool {
    (i64::from(i8::MIN)..=i64::from(i8::MAX)).contains(&i)
}

fn zero(kind: PrimitiveKind) -> Option<Node> {
    match kind {
        PrimitiveKind::String => None,
        PrimitiveKind::Int | PrimitiveKind::Byte => Some(Node::Num(0.0)),
        PrimitiveKind::Bool => Some(Node::Bool(false)),
        PrimitiveKind::Number => Some(Node::Num(0.0)),
    }
}

impl TypeAdapter for PrimitiveAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, _: &Registry) -> Result<Node> {
        let (kind, _) = primitive(prop);
        match (kind, value) {
            (_, Value::Null) => Ok(Node::Null),
            (PrimitiveKind::String, Value::Str(s)) => Ok(Node::Str(s.clone())),
            (PrimitiveKind::Int, Value::Int(i)) => Ok(Node::Num(*i as f64)),
            (PrimitiveKind::Byte, Value::Int(i)) if byte_range(*i) => Ok(Node::Num(*i as f64)),
            (PrimitiveKind::Byte, Value::Int(i)) => Err(ConfigError::unserializable(
                prop.name.as_str(),
                format!("{i} is out of range for Byte"),
            )),
            (PrimitiveKind::Bool, Value::Bool(b)) => Ok(Node::Bool(*b)),
            (PrimitiveKind::Number, Value::Number(n)) if n.is_finite() => Ok(Node::Num(*n)),
            (PrimitiveKind::Number, Value::Int(i)) => Ok(Node::Num(*i as f64)),
            (PrimitiveKind::Number, Value::Number(n)) => Err(ConfigError::unserializable(
                prop.name.as_str(),
                format!("{n} has no document encoding"),
            )),
            (_, other) => Err(wrong_value(prop, other)),
        }
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        _: &mut BindContext<'_>,
        _: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        let (kind, _) = primitive(prop);
        let value = match (kind, node) {
            (_, Node::Null) => return Ok(None),
            (PrimitiveKind::String, Node::Str(s)) => Value::Str(s.clone()),
            (PrimitiveKind::String, Node::Num(_) | Node::Bool(_)) => {
                Value::Str(node.scalar_text().unwrap_or_default())
            }
            (PrimitiveKind::Int, Node::Num(n)) => {
                Value::Int(integral(*n).ok_or_else(|| mismatch(prop, "an integer", node))?)
            }
            (PrimitiveKind::Int, Node::Str(s)) => {
                Value::Int(parse_int(s).ok_or_else(|| mismatch(prop, "an integer", node))?)
            }
            (PrimitiveKind::Byte, Node::Num(_) | Node::Str(_)) => {
                let i = match node {
                    Node::Num(n) => integral(*n),
                    Node::Str(s) => parse_int(s),
                    _ => None,
                }
                .ok_or_else(|| mismatch(prop, "a byte", node))?;
                if !byte_range(i) {
                    return Err(ConfigError::deserialization(
                        prop.name.as_str(),
                        prop.kind.to_string(),
                        format!("{i} is out of range"),
                    ));
                }
                Value::Int(i)
            }
            (PrimitiveKind::Bool, Node::Bool(b)) => Value::Bool(*b),
            (PrimitiveKind::Bool, Node::Str(s)) => {
                Value::Bool(parse_bool(s).ok_or_else(|| mismatch(prop, "a boolean", node))?)
            }
            (PrimitiveKind::Number, Node::Num(n)) => Value::Number(*n),
            (PrimitiveKind::Number, Node::Str(s)) => Value::Number(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| mismatch(prop, "a number", node))?,
            ),
            (_, other) => return Err(mismatch(prop, "a scalar", other)),
        };
        Ok(Some(value))
    }

    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        _: &Registry,
    ) -> Result<Option<Node>> {
        let (kind, nullable) = primitive(prop);
        match node {
            Some(Node::Null) | None => {
                if let Some(default) = &prop.default {
                    Ok(Some(coerce(kind, Node::Str(default.clone()))))
                } else if nullable {
                    Ok(zero(kind))
                } else {
                    Err(ConfigError::missing(prop.name.as_str()))
                }
            }
            Some(node) => Ok(Some(coerce(kind, node))),
        }
    }

    fn schema(&self, prop: &PropertyDescriptor, _: &mut SchemaContext<'_>) -> Result<NodeMap> {
        let (kind, _) = primitive(prop);
        Ok(schema_type(match kind {
            PrimitiveKind::String => "string",
            PrimitiveKind::Int | PrimitiveKind::Byte => "integer",
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Number => "number",
        }))
    }
}
