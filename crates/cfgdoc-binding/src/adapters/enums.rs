use cfgdoc_types::{ConfigError, Node, NodeMap, Result};

use crate::adapter::{wrong_value, TypeAdapter};
use crate::context::BindContext;
use crate::descriptor::{EnumRepresentation, EnumType, PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::schema::{schema_type, SchemaContext};
use crate::value::{ParentHandle, Value};

/// Enum constants, written by name or by ordinal.
pub struct EnumAdapter;

fn enum_type(prop: &PropertyDescriptor) -> Result<&EnumType> {
    match &prop.kind {
        ValueKind::Enum(ty) => Ok(ty),
        other => Err(ConfigError::deserialization(
            prop.name.as_str(),
            other.to_string(),
            "not an enum property",
        )),
    }
}

fn invalid(prop: &PropertyDescriptor, ty: &EnumType, found: &Node) -> ConfigError {
    let expected = match prop.enum_representation {
        EnumRepresentation::String => "a constant name",
        EnumRepresentation::Ordinal => "a constant ordinal",
    };
    ConfigError::deserialization(
        prop.name.as_str(),
        ty.name.as_str(),
        format!("expected {expected}, found {found}"),
    )
}

impl TypeAdapter for EnumAdapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, _: &Registry) -> Result<Node> {
        let ty = enum_type(prop)?;
        let name = match value {
            Value::Null => return Ok(Node::Null),
            Value::Enum(name) | Value::Str(name) => name,
            other => return Err(wrong_value(prop, other)),
        };
        let ordinal = ty.ordinal(name).ok_or_else(|| {
            ConfigError::unserializable(
                prop.name.as_str(),
                format!("{name} is not a constant of {}", ty.name),
            )
        })?;
        Ok(match prop.enum_representation {
            EnumRepresentation::String => Node::Str(name.clone()),
            EnumRepresentation::Ordinal => Node::Num(ordinal as f64),
        })
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        _: &mut BindContext<'_>,
        _: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        let ty = enum_type(prop)?;
        let constant = match (prop.enum_representation, node) {
            (_, Node::Null) => return Ok(None),
            (EnumRepresentation::String, Node::Str(name)) => ty
                .ordinal(name)
                .and_then(|i| ty.constant(i)),
            (EnumRepresentation::Ordinal, Node::Num(n)) if n.fract() == 0.0 && *n >= 0.0 => {
                ty.constant(*n as usize)
            }
            _ => None,
        };
        constant
            .map(|c| Some(Value::Enum(c.to_string())))
            .ok_or_else(|| invalid(prop, ty, node))
    }

    fn normalize(
        &self,
        node: Option<Node>,
        prop: &PropertyDescriptor,
        _: &Registry,
    ) -> Result<Option<Node>> {
        let ty = enum_type(prop)?;
        let node = match node {
            Some(Node::Null) | None => match &prop.default {
                Some(default) => Node::Str(default.clone()),
                None => return Ok(None),
            },
            Some(node) => node,
        };
        Ok(Some(match (prop.enum_representation, node) {
            (EnumRepresentation::Ordinal, Node::Str(s)) => match s.trim().parse::<usize>() {
                Ok(i) => Node::Num(i as f64),
                Err(_) => match ty.ordinal(&s) {
                    Some(i) => Node::Num(i as f64),
                    None => Node::Str(s),
                },
            },
            (_, node) => node,
        }))
    }

    fn schema(&self, prop: &PropertyDescriptor, _: &mut SchemaContext<'_>) -> Result<NodeMap> {
        let ty = enum_type(prop)?;
        let (kind, representation) = match prop.enum_representation {
            EnumRepresentation::String => ("string", "string"),
            EnumRepresentation::Ordinal => ("integer", "ordinal"),
        };
        let mut entry = schema_type(kind);
        entry.insert("class".into(), Node::from(ty.name.as_str()));
        let names = ty.constants.iter().map(|c| Node::from(c.as_str())).collect();
        entry.insert("enum".into(), Node::List(names));
        entry.insert("enumRepresentation".into(), Node::from(representation));
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol() -> ValueKind {
        ValueKind::enumeration(EnumType::new("Protocol", ["DICOM", "HL7", "SYSLOG"]))
    }

    fn roundtrip(prop: &PropertyDescriptor, value: Value) -> (Node, Option<Value>) {
        let registry = Registry::new();
        let node = EnumAdapter.to_node(&value, prop, &registry).unwrap();
        let mut ctx = BindContext::new(&registry);
        let back = EnumAdapter.from_node(&node, prop, &mut ctx, None).unwrap();
        (node, back)
    }

    #[test]
    fn string_representation() {
        let prop = PropertyDescriptor::new("protocol", protocol());
        let (node, back) = roundtrip(&prop, Value::Enum("HL7".into()));
        assert_eq!(node, Node::from("HL7"));
        assert_eq!(back, Some(Value::Enum("HL7".into())));
    }

    #[test]
    fn ordinal_representation() {
        let prop = PropertyDescriptor::new("protocol", protocol()).ordinal();
        let (node, back) = roundtrip(&prop, Value::Enum("SYSLOG".into()));
        assert_eq!(node, Node::Num(2.0));
        assert_eq!(back, Some(Value::Enum("SYSLOG".into())));
    }

    #[test]
    fn invalid_representation_names_field_and_type() {
        let registry = Registry::new();
        let mut ctx = BindContext::new(&registry);
        let prop = PropertyDescriptor::new("protocol", protocol());
        let err = EnumAdapter
            .from_node(&Node::from("SMTP"), &prop, &mut ctx, None)
            .unwrap_err();
        match err {
            ConfigError::Deserialization { field, declared, .. } => {
                assert_eq!(field, "protocol");
                assert_eq!(declared, "Protocol");
            }
            other => panic!("unexpected error: {other}"),
        }
        let ordinal = prop.clone().ordinal();
        assert!(EnumAdapter
            .from_node(&Node::from(7), &ordinal, &mut ctx, None)
            .is_err());
        assert!(EnumAdapter
            .from_node(&Node::from("HL7"), &ordinal, &mut ctx, None)
            .is_err());
    }

    #[test]
    fn normalize_fills_default_and_coerces_ordinals() {
        let registry = Registry::new();
        let prop = PropertyDescriptor::new("protocol", protocol())
            .ordinal()
            .with_default("HL7");
        assert_eq!(
            EnumAdapter.normalize(None, &prop, &registry).unwrap(),
            Some(Node::Num(1.0))
        );
        assert_eq!(
            EnumAdapter
                .normalize(Some(Node::from("2")), &prop, &registry)
                .unwrap(),
            Some(Node::Num(2.0))
        );
    }

    #[test]
    fn ordinal_schema_lists_names() {
        let registry = Registry::new();
        let prop = PropertyDescriptor::new("protocol", protocol()).ordinal();
        let schema = EnumAdapter
            .schema(&prop, &mut SchemaContext::new(&registry))
            .unwrap();
        assert_eq!(schema["type"], Node::from("integer"));
        assert_eq!(schema["enumRepresentation"], Node::from("ordinal"));
        assert_eq!(schema["enum"].len(), 3);
    }
}
