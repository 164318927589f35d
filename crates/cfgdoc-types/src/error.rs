use thiserror::Error;

/// Errors produced by the configuration engine.
///
/// Binding errors carry the field path they occurred at. The path is built
/// up while the error unwinds through nested objects via
/// [`ConfigError::in_field`], so the outermost caller sees the full location
/// (e.g. `connections/0/port`).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A non-nullable value is absent and no default is declared.
    #[error("missing value for {field}")]
    MissingValue { field: String },

    /// A node does not match the declared type of its property.
    #[error("cannot deserialize {field} as {declared}: {reason}")]
    Deserialization {
        field: String,
        declared: String,
        reason: String,
    },

    /// A value has no lossless tree encoding in this context.
    #[error("cannot serialize {field}: {reason}")]
    Unserializable { field: String, reason: String },

    /// A reference could not be encoded because its target is not persisted.
    #[error("dangling reference from {field} to {target}")]
    DanglingReference { field: String, target: String },

    /// A stored reference path does not lead to a node.
    #[error("unresolved reference {path}: {reason}")]
    UnresolvedReference { path: String, reason: String },

    /// The stored node's hash differs from the hash the writer started from.
    #[error("optimistic lock conflict at {path}: expected {expected}, found {actual}")]
    Conflict {
        path: String,
        expected: String,
        actual: String,
    },

    /// No node exists at the given path.
    #[error("node not found: {path}")]
    NotFound { path: String },

    /// A node already exists where a new one was being created.
    #[error("node already exists: {path}")]
    AlreadyExists { path: String },

    /// A path or search expression cannot be parsed, or a segment does not
    /// fit the container it addresses.
    #[error("malformed path {path}: {reason}")]
    MalformedPath { path: String, reason: String },

    /// Encoding or decoding of a persisted representation failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from a storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingValue {
            field: field.into(),
        }
    }

    pub fn deserialization(
        field: impl Into<String>,
        declared: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Deserialization {
            field: field.into(),
            declared: declared.into(),
            reason: reason.into(),
        }
    }

    pub fn unserializable(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unserializable {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn unresolved(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Prefix the field location of a binding error with `name`.
    ///
    /// Errors that are not tied to a field are returned unchanged.
    pub fn in_field(self, name: &str) -> Self {
        fn join(name: &str, field: String) -> String {
            if name.is_empty() {
                field
            } else if field.is_empty() {
                name.to_string()
            } else {
                format!("{name}/{field}")
            }
        }
        match self {
            Self::MissingValue { field } => Self::MissingValue {
                field: join(name, field),
            },
            Self::Deserialization {
                field,
                declared,
                reason,
            } => Self::Deserialization {
                field: join(name, field),
                declared,
                reason,
            },
            Self::Unserializable { field, reason } => Self::Unserializable {
                field: join(name, field),
                reason,
            },
            Self::DanglingReference { field, target } => Self::DanglingReference {
                field: join(name, field),
                target,
            },
            other => other,
        }
    }

    /// Only optimistic-lock conflicts are worth retrying after a re-read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
