//! Built-in [`TypeAdapter`](crate::TypeAdapter) implementations, one per
//! value kind.

mod array;
mod collection;
mod enums;
mod extension;
mod map;
mod opaque;
mod primitive;
mod reference;
mod reflective;

pub use array::ArrayAdapter;
pub use collection::CollectionAdapter;
pub use enums::EnumAdapter;
pub use extension::ExtensionMapAdapter;
pub use map::MapAdapter;
pub use opaque::{Base64Adapter, X509Adapter};
pub use primitive::PrimitiveAdapter;
pub use reference::ReferenceAdapter;
pub use reflective::ReflectiveAdapter;

pub(crate) use reflective::{decode_object, encode_object, normalize_object};
