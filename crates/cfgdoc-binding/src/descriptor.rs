use std::fmt;

use cfgdoc_types::{OLOCK_HASH_KEY, UUID_KEY};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ValueKind
// ---------------------------------------------------------------------------

/// Scalar kinds with a direct node representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    String,
    Int,
    /// Signed 8-bit integer.
    Byte,
    Bool,
    Number,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    List,
    /// Unordered; duplicates are removed, first occurrence wins.
    Set,
}

/// How enum constants are written into the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumRepresentation {
    /// The constant's name.
    #[default]
    String,
    /// The constant's 0-based position.
    Ordinal,
}

/// A named, ordered set of enum constants.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub name: String,
    pub constants: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            constants: constants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn ordinal(&self, constant: &str) -> Option<usize> {
        self.constants.iter().position(|c| c == constant)
    }

    pub fn constant(&self, ordinal: usize) -> Option<&str> {
        self.constants.get(ordinal).map(String::as_str)
    }
}

/// The closed set of value kinds a property can declare.
///
/// Generic parameters live inside the kind: a `List<Map<String, Int>>` is a
/// collection whose element is a map whose key and value are primitives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Primitive { kind: PrimitiveKind, nullable: bool },
    Enum(EnumType),
    /// Fixed-shape array. An array of `Byte` is written as one base64 string.
    Array(Box<ValueKind>),
    Collection {
        kind: CollectionKind,
        element: Box<ValueKind>,
    },
    Map {
        key: Box<ValueKind>,
        value: Box<ValueKind>,
    },
    /// Polymorphic extension objects keyed by concrete class name, restricted
    /// to the classes registered for `base`.
    ExtensionMap { base: String },
    /// A path-valued pointer at an object of class `target`.
    Reference { target: String },
    /// A nested object of a registered class.
    Reflective { class: String },
    /// Value converted by an adapter registered under this tag.
    Opaque(String),
}

impl ValueKind {
    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String, false)
    }

    pub fn nullable_string() -> Self {
        Self::primitive(PrimitiveKind::String, true)
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int, false)
    }

    pub fn nullable_int() -> Self {
        Self::primitive(PrimitiveKind::Int, true)
    }

    pub fn byte() -> Self {
        Self::primitive(PrimitiveKind::Byte, false)
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Bool, false)
    }

    pub fn nullable_bool() -> Self {
        Self::primitive(PrimitiveKind::Bool, true)
    }

    pub fn number() -> Self {
        Self::primitive(PrimitiveKind::Number, false)
    }

    pub fn nullable_number() -> Self {
        Self::primitive(PrimitiveKind::Number, true)
    }

    pub fn primitive(kind: PrimitiveKind, nullable: bool) -> Self {
        Self::Primitive { kind, nullable }
    }

    pub fn enumeration(ty: EnumType) -> Self {
        Self::Enum(ty)
    }

    pub fn array(element: ValueKind) -> Self {
        Self::Array(Box::new(element))
    }

    /// `byte[]`, written as base64.
    pub fn bytes() -> Self {
        Self::array(Self::byte())
    }

    pub fn list(element: ValueKind) -> Self {
        Self::Collection {
            kind: CollectionKind::List,
            element: Box::new(element),
        }
    }

    pub fn set(element: ValueKind) -> Self {
        Self::Collection {
            kind: CollectionKind::Set,
            element: Box::new(element),
        }
    }

    pub fn map(key: ValueKind, value: ValueKind) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn extensions(base: impl Into<String>) -> Self {
        Self::ExtensionMap { base: base.into() }
    }

    pub fn reference(target: impl Into<String>) -> Self {
        Self::Reference {
            target: target.into(),
        }
    }

    pub fn object(class: impl Into<String>) -> Self {
        Self::Reflective {
            class: class.into(),
        }
    }

    pub fn opaque(tag: impl Into<String>) -> Self {
        Self::Opaque(tag.into())
    }

    /// Generic type parameters: the element of arrays and collections, the
    /// key and value of maps. Empty for every other kind.
    pub fn generic_params(&self) -> Vec<&ValueKind> {
        match self {
            Self::Array(element) | Self::Collection { element, .. } => vec![&**element],
            Self::Map { key, value } => vec![&**key, &**value],
            _ => Vec::new(),
        }
    }

    pub fn is_byte_array(&self) -> bool {
        matches!(
            self,
            Self::Array(element) if matches!(**element, Self::Primitive { kind: PrimitiveKind::Byte, .. })
        )
    }

    /// Kinds that normalize to an empty container when absent.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Array(_) | Self::Collection { .. } | Self::Map { .. } | Self::ExtensionMap { .. }
        )
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Primitive { nullable, .. } => *nullable,
            _ => true,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { kind, nullable } => {
                write!(f, "{kind:?}")?;
                if *nullable {
                    f.write_str("?")?;
                }
                Ok(())
            }
            Self::Enum(ty) => f.write_str(&ty.name),
            Self::Array(element) => write!(f, "{element}[]"),
            Self::Collection { kind, element } => write!(f, "{kind:?}<{element}>"),
            Self::Map { key, value } => write!(f, "Map<{key}, {value}>"),
            Self::ExtensionMap { base } => write!(f, "Extensions<{base}>"),
            Self::Reference { target } => write!(f, "Ref<{target}>"),
            Self::Reflective { class } => f.write_str(class),
            Self::Opaque(tag) => f.write_str(tag),
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// Everything the engine knows about one configurable property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Name of the field on the typed object.
    pub name: String,
    /// Key used in the document.
    pub annotated_name: String,
    pub kind: ValueKind,
    /// Holds the object's optimistic-lock hash; stored under `#olockhash`.
    pub is_olock_hash: bool,
    /// Holds the object's identity; stored under `#uuid`.
    pub is_uuid: bool,
    /// Textual default, coerced to the property's kind on normalization.
    pub default: Option<String>,
    pub enum_representation: EnumRepresentation,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub ui_order: Option<i32>,
    pub ui_group: Option<String>,
}

impl PropertyDescriptor {
    /// A property stored under its own name.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        let name = name.into();
        Self {
            annotated_name: name.clone(),
            name,
            kind,
            is_olock_hash: false,
            is_uuid: false,
            default: None,
            enum_representation: EnumRepresentation::String,
            title: None,
            description: None,
            tags: Vec::new(),
            ui_order: None,
            ui_group: None,
        }
    }

    /// The identity property of a class.
    pub fn uuid(name: impl Into<String>) -> Self {
        let mut prop = Self::new(name, ValueKind::nullable_string());
        prop.is_uuid = true;
        prop
    }

    /// The optimistic-lock hash property of a class.
    pub fn olock_hash(name: impl Into<String>) -> Self {
        let mut prop = Self::new(name, ValueKind::nullable_string());
        prop.is_olock_hash = true;
        prop
    }

    pub fn annotated(mut self, key: impl Into<String>) -> Self {
        self.annotated_name = key.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn ordinal(mut self) -> Self {
        self.enum_representation = EnumRepresentation::Ordinal;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn ui_order(mut self, order: i32) -> Self {
        self.ui_order = Some(order);
        self
    }

    pub fn ui_group(mut self, group: impl Into<String>) -> Self {
        self.ui_group = Some(group.into());
        self
    }

    /// The document key this property reads from and writes to.
    pub fn storage_key(&self) -> &str {
        if self.is_uuid {
            UUID_KEY
        } else if self.is_olock_hash {
            OLOCK_HASH_KEY
        } else {
            &self.annotated_name
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, ValueKind::Reference { .. })
    }

    pub fn is_collection_of_references(&self) -> bool {
        match &self.kind {
            ValueKind::Array(element) | ValueKind::Collection { element, .. } => {
                matches!(**element, ValueKind::Reference { .. })
            }
            _ => false,
        }
    }

    pub fn generic_params(&self) -> Vec<&ValueKind> {
        self.kind.generic_params()
    }

    /// Descriptor for an element of this container property. Errors raised
    /// for the element carry no field name; the container adds the position.
    pub(crate) fn element(&self, kind: &ValueKind) -> PropertyDescriptor {
        let mut element = PropertyDescriptor::new("", kind.clone());
        element.enum_representation = self.enum_representation;
        element
    }
}

// ---------------------------------------------------------------------------
// ClassDescriptor
// ---------------------------------------------------------------------------

/// Properties that must be configured together: if any member is present,
/// all of them must be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetterGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// The configurable shape of one class.
///
/// Built once at registration and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDescriptor {
    name: String,
    properties: Vec<PropertyDescriptor>,
    setter_groups: Vec<SetterGroup>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            setter_groups: Vec::new(),
        }
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn setter_group<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.setter_groups.push(SetterGroup {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn setter_groups(&self) -> &[SetterGroup] {
        &self.setter_groups
    }

    pub fn property_named(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn uuid_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_uuid)
    }

    pub fn olock_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_olock_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_params_follow_structure() {
        let kind = ValueKind::map(ValueKind::int(), ValueKind::list(ValueKind::string()));
        let params = kind.generic_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], &ValueKind::int());
        assert_eq!(params[1].generic_params(), vec![&ValueKind::string()]);
        assert!(ValueKind::string().generic_params().is_empty());
    }

    #[test]
    fn storage_keys_use_reserved_names() {
        assert_eq!(PropertyDescriptor::uuid("uuid").storage_key(), UUID_KEY);
        assert_eq!(PropertyDescriptor::olock_hash("hash").storage_key(), OLOCK_HASH_KEY);
        let prop = PropertyDescriptor::new("aeTitle", ValueKind::string()).annotated("dicomAETitle");
        assert_eq!(prop.storage_key(), "dicomAETitle");
    }

    #[test]
    fn reference_flags_derive_from_kind() {
        let single = PropertyDescriptor::new("conn", ValueKind::reference("Connection"));
        assert!(single.is_reference());
        assert!(!single.is_collection_of_references());
        let many = PropertyDescriptor::new(
            "conns",
            ValueKind::list(ValueKind::reference("Connection")),
        );
        assert!(many.is_collection_of_references());
        assert!(!many.is_reference());
    }

    #[test]
    fn display_names_declared_types() {
        assert_eq!(ValueKind::nullable_int().to_string(), "Int?");
        assert_eq!(ValueKind::bytes().to_string(), "Byte[]");
        assert_eq!(
            ValueKind::map(ValueKind::string(), ValueKind::set(ValueKind::bool())).to_string(),
            "Map<String, Set<Bool>>"
        );
    }

    #[test]
    fn enum_lookup() {
        let ty = EnumType::new("Protocol", ["DICOM", "HL7", "SYSLOG"]);
        assert_eq!(ty.ordinal("HL7"), Some(1));
        assert_eq!(ty.constant(2), Some("SYSLOG"));
        assert_eq!(ty.constant(3), None);
    }

    #[test]
    fn class_lookups() {
        let class = ClassDescriptor::new("Device")
            .property(PropertyDescriptor::uuid("uuid"))
            .property(PropertyDescriptor::olock_hash("olockHash"))
            .property(PropertyDescriptor::new("deviceName", ValueKind::string()))
            .setter_group("tls", ["keyStore", "keyStorePin"]);
        assert_eq!(class.uuid_property().unwrap().name, "uuid");
        assert_eq!(class.olock_property().unwrap().name, "olockHash");
        assert!(class.property_named("deviceName").is_some());
        assert_eq!(class.setter_groups()[0].members.len(), 2);
    }
}
