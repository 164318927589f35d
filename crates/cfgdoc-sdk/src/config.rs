//! Engine configuration, usually read from a TOML file.

use std::path::Path as FsPath;

use cfgdoc_binding::ResolverConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// How a [`Configuration`](crate::Configuration) is put together.
///
/// # Example
///
/// ```toml
/// cache = true
/// fill_defaults = true
/// max_update_attempts = 5
///
/// [resolver]
/// mode = "eager"     # or "lazy"
/// policy = "strict"  # or "lenient"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Put a read cache in front of the backend.
    pub cache: bool,
    /// Fill defaults into nodes read with a class hint.
    pub fill_defaults: bool,
    /// Attempts `update` makes before giving up on conflicts.
    pub max_update_attempts: usize,
    /// When references are loaded and what a missing target means.
    pub resolver: ResolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: true,
            fill_defaults: true,
            max_update_attempts: 5,
            resolver: ResolverConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<FsPath>) -> SdkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SdkError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.max_update_attempts == 0 {
            return Err(SdkError::InvalidConfig(
                "max_update_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgdoc_binding::{ReferencePolicy, ResolveMode};
    use std::io::Write;

    #[test]
    fn empty_text_gives_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn parses_every_field() {
        let config = EngineConfig::from_toml_str(
            r#"
            cache = false
            fill_defaults = false
            max_update_attempts = 2

            [resolver]
            mode = "lazy"
            policy = "lenient"
            "#,
        )
        .unwrap();
        assert!(!config.cache);
        assert!(!config.fill_defaults);
        assert_eq!(config.max_update_attempts, 2);
        assert_eq!(config.resolver.mode, ResolveMode::Lazy);
        assert_eq!(config.resolver.policy, ReferencePolicy::Lenient);
    }

    #[test]
    fn partial_resolver_table_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str("[resolver]\npolicy = \"lenient\"\n").unwrap();
        assert_eq!(config.resolver.mode, ResolveMode::Eager);
        assert!(config.cache);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_update_attempts = 0"),
            Err(SdkError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[resolver]\nmode = \"sometimes\""),
            Err(SdkError::ConfigParse(_))
        ));
    }

    #[test]
    fn file_round_trip() {
        let config = EngineConfig {
            cache: false,
            max_update_attempts: 9,
            ..EngineConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();
        assert_eq!(EngineConfig::from_file(file.path()).unwrap(), config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineConfig::from_file(dir.path().join("cfgdoc.toml")),
            Err(SdkError::ConfigIo { .. })
        ));
    }
}
