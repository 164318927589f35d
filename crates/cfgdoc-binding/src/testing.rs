//! Shared fixtures for the binding tests.

use crate::descriptor::{ClassDescriptor, EnumType, PropertyDescriptor, ValueKind};
use crate::registry::Registry;
use crate::value::{ConfigObject, Reference, Value};

pub(crate) fn protocol() -> EnumType {
    EnumType::new("Protocol", ["DICOM", "HL7", "SYSLOG"])
}

pub(crate) fn connection_class() -> ClassDescriptor {
    ClassDescriptor::new("Connection")
        .property(PropertyDescriptor::uuid("uuid"))
        .property(PropertyDescriptor::new("cn", ValueKind::string()))
        .property(PropertyDescriptor::new("port", ValueKind::int()))
        .property(
            PropertyDescriptor::new("hostname", ValueKind::nullable_string())
                .with_default("localhost"),
        )
        .property(
            PropertyDescriptor::new("protocol", ValueKind::enumeration(protocol()))
                .with_default("DICOM"),
        )
        .property(PropertyDescriptor::new("tlsKeyStore", ValueKind::nullable_string()))
        .property(PropertyDescriptor::new("tlsKeyStorePin", ValueKind::nullable_string()))
        .setter_group("tls", ["tlsKeyStore", "tlsKeyStorePin"])
}

pub(crate) fn device_class() -> ClassDescriptor {
    ClassDescriptor::new("Device")
        .property(PropertyDescriptor::uuid("uuid"))
        .property(PropertyDescriptor::olock_hash("olockHash"))
        .property(PropertyDescriptor::new("deviceName", ValueKind::string()))
        .property(PropertyDescriptor::new("description", ValueKind::nullable_string()))
        .property(PropertyDescriptor::new("installed", ValueKind::nullable_bool()))
        .property(PropertyDescriptor::new(
            "connections",
            ValueKind::list(ValueKind::object("Connection")),
        ))
        .property(PropertyDescriptor::new(
            "primaryConnection",
            ValueKind::reference("Connection"),
        ))
        .property(
            PropertyDescriptor::new("priority", ValueKind::enumeration(protocol())).ordinal(),
        )
        .property(PropertyDescriptor::new("vendorData", ValueKind::bytes()))
        .property(PropertyDescriptor::new(
            "portNames",
            ValueKind::map(ValueKind::int(), ValueKind::nullable_string()),
        ))
        .property(PropertyDescriptor::new("tags", ValueKind::set(ValueKind::string())))
        .property(PropertyDescriptor::new("extensions", ValueKind::extensions("Device")))
}

pub(crate) fn archive_class() -> ClassDescriptor {
    ClassDescriptor::new("ArchiveExt")
        .property(PropertyDescriptor::new("storageDir", ValueKind::string()))
        .property(PropertyDescriptor::new("retries", ValueKind::nullable_int()).with_default("3"))
}

/// Device, Connection and the `ArchiveExt` extension of Device.
pub(crate) fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_class(device_class())
        .register_class(connection_class())
        .register_class(archive_class())
        .register_class(ClassDescriptor::new("AuditExt"))
        .register_extension("Device", "ArchiveExt");
    registry
}

pub(crate) fn connection(cn: &str, port: i64) -> ConfigObject {
    ConfigObject::new("Connection")
        .with("cn", cn)
        .with("port", port)
}

pub(crate) fn device() -> ConfigObject {
    ConfigObject::new("Device")
        .with("uuid", "dev-1")
        .with("deviceName", "arc")
        .with(
            "connections",
            Value::List(vec![Value::Object(connection("dicom", 11112))]),
        )
        .with_extension(
            "extensions",
            ConfigObject::new("ArchiveExt").with("storageDir", "/var/arc"),
        )
}

pub(crate) fn reference(path: &str) -> Value {
    match cfgdoc_path::Path::parse(path) {
        Ok(path) => Value::Reference(Reference::Path(path)),
        Err(e) => panic!("bad fixture path {path}: {e}"),
    }
}
