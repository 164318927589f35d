use cfgdoc_types::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read engine configuration {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse engine configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("cannot write engine configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("update of {path} still conflicting after {attempts} attempts")]
    UpdateExhausted { path: String, attempts: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SdkError {
    /// The underlying engine error, if this is one.
    pub fn config_error(&self) -> Option<&ConfigError> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.config_error().is_some_and(ConfigError::is_retryable)
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
