use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cfgdoc_types::{ConfigError, Node, NodeMap, Result};

use crate::adapter::{mismatch, wrong_value, TypeAdapter};
use crate::context::BindContext;
use crate::descriptor::PropertyDescriptor;
use crate::registry::Registry;
use crate::schema::{schema_type, SchemaContext};
use crate::value::{ParentHandle, Value};

fn decode_base64(prop: &PropertyDescriptor, text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| {
        ConfigError::deserialization(prop.name.as_str(), prop.kind.to_string(), e.to_string())
    })
}

fn opaque_schema(tag: &str) -> NodeMap {
    let mut entry = schema_type("string");
    entry.insert("class".into(), Node::from(tag));
    entry
}

// ---------------------------------------------------------------------------
// Base64
// ---------------------------------------------------------------------------

/// Arbitrary binary values as base64 strings.
pub struct Base64Adapter;

impl Base64Adapter {
    pub const TAG: &'static str = "Base64";
}

impl TypeAdapter for Base64Adapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, _: &Registry) -> Result<Node> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::Bytes(bytes) => Ok(Node::Str(STANDARD.encode(bytes))),
            other => Err(wrong_value(prop, other)),
        }
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        _: &mut BindContext<'_>,
        _: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        match node {
            Node::Null => Ok(None),
            Node::Str(text) => decode_base64(prop, text).map(|b| Some(Value::Bytes(b))),
            other => Err(mismatch(prop, "a base64 string", other)),
        }
    }

    fn schema(&self, _: &PropertyDescriptor, _: &mut SchemaContext<'_>) -> Result<NodeMap> {
        Ok(opaque_schema(Self::TAG))
    }
}

// ---------------------------------------------------------------------------
// X509
// ---------------------------------------------------------------------------

/// DER-encoded X.509 certificates, stored as base64. PEM armour is accepted
/// on read.
pub struct X509Adapter;

impl X509Adapter {
    pub const TAG: &'static str = "X509";

    /// A DER certificate is an ASN.1 SEQUENCE: tag `0x30` and a length.
    fn check_der(prop: &PropertyDescriptor, der: &[u8]) -> std::result::Result<(), String> {
        match der {
            [0x30, _, ..] => Ok(()),
            [] => Err("empty certificate".to_string()),
            _ => Err(format!(
                "{} does not hold a DER certificate",
                if prop.name.is_empty() { "value" } else { prop.name.as_str() }
            )),
        }
    }
}

fn strip_pem(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .collect()
}

impl TypeAdapter for X509Adapter {
    fn to_node(&self, value: &Value, prop: &PropertyDescriptor, _: &Registry) -> Result<Node> {
        let der = match value {
            Value::Null => return Ok(Node::Null),
            Value::Bytes(der) => der,
            other => return Err(wrong_value(prop, other)),
        };
        Self::check_der(prop, der)
            .map_err(|reason| ConfigError::unserializable(prop.name.as_str(), reason))?;
        Ok(Node::Str(STANDARD.encode(der)))
    }

    fn from_node(
        &self,
        node: &Node,
        prop: &PropertyDescriptor,
        _: &mut BindContext<'_>,
        _: Option<&ParentHandle>,
    ) -> Result<Option<Value>> {
        let text = match node {
            Node::Null => return Ok(None),
            Node::Str(text) => text,
            other => return Err(mismatch(prop, "a base64 certificate", other)),
        };
        let der = decode_base64(prop, &strip_pem(text))?;
        Self::check_der(prop, &der).map_err(|reason| {
            ConfigError::deserialization(prop.name.as_str(), Self::TAG, reason)
        })?;
        Ok(Some(Value::Bytes(der)))
    }

    fn schema(&self, _: &PropertyDescriptor, _: &mut SchemaContext<'_>) -> Result<NodeMap> {
        Ok(opaque_schema(Self::TAG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ValueKind;

    const DER: [u8; 6] = [0x30, 0x04, 0x02, 0x01, 0x05, 0x00];

    fn decode(adapter: &dyn TypeAdapter, node: &Node, prop: &PropertyDescriptor) -> Result<Option<Value>> {
        let registry = Registry::new();
        let mut ctx = BindContext::new(&registry);
        adapter.from_node(node, prop, &mut ctx, None)
    }

    #[test]
    fn certificate_roundtrip() {
        let registry = Registry::new();
        let prop = PropertyDescriptor::new("cert", ValueKind::opaque("X509"));
        let node = X509Adapter
            .to_node(&Value::Bytes(DER.to_vec()), &prop, &registry)
            .unwrap();
        assert_eq!(
            decode(&X509Adapter, &node, &prop).unwrap(),
            Some(Value::Bytes(DER.to_vec()))
        );
    }

    #[test]
    fn pem_armour_is_accepted() {
        let prop = PropertyDescriptor::new("cert", ValueKind::opaque("X509"));
        let pem = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            STANDARD.encode(DER)
        );
        assert_eq!(
            decode(&X509Adapter, &Node::from(pem), &prop).unwrap(),
            Some(Value::Bytes(DER.to_vec()))
        );
    }

    #[test]
    fn non_der_is_rejected() {
        let registry = Registry::new();
        let prop = PropertyDescriptor::new("cert", ValueKind::opaque("X509"));
        assert!(matches!(
            X509Adapter.to_node(&Value::Bytes(vec![1, 2, 3]), &prop, &registry),
            Err(ConfigError::Unserializable { .. })
        ));
        assert!(matches!(
            decode(&X509Adapter, &Node::from("AQID"), &prop),
            Err(ConfigError::Deserialization { .. })
        ));
    }

    #[test]
    fn base64_values() {
        let registry = Registry::new();
        let prop = PropertyDescriptor::new("blob", ValueKind::opaque("Base64"));
        let node = Base64Adapter
            .to_node(&Value::Bytes(vec![1, 2, 3]), &prop, &registry)
            .unwrap();
        assert_eq!(node, Node::from("AQID"));
        assert_eq!(
            decode(&Base64Adapter, &node, &prop).unwrap(),
            Some(Value::Bytes(vec![1, 2, 3]))
        );
    }
}
