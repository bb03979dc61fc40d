use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tunables for a [`Session`](crate::engine::Session).
///
/// Every field has a default, so a configuration file only needs to name what
/// it changes. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    /// Upper bound on queue generations before evaluation gives up.
    pub max_generations: usize,
    /// Name of the view every media type is guaranteed to have.
    pub default_view: String,
    /// Canonical action assumed for resources that do not name one.
    pub canonical_action: String,
    /// View used to render links that do not name one.
    pub link_view: String,
    /// Seed the built-in error media type and standard responses.
    pub builtin_defaults: bool,
    /// When set, diagnostic file names are reported relative to this directory.
    pub location_root: Option<PathBuf>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_generations: 100,
            default_view: "default".to_string(),
            canonical_action: "show".to_string(),
            link_view: "link".to_string(),
            builtin_defaults: true,
            location_root: None,
        }
    }
}

impl EvalConfig {
    /// # Errors
    /// Returns [`ConfigError::Json`] if the text is not a valid configuration.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    /// Returns [`ConfigError::Yaml`] if the text is not a valid configuration.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads a configuration file, picking the format from its extension.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, has an
    /// unsupported extension, or does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let parse: fn(&str) -> Result<Self, ConfigError> = match extension.as_str() {
            "json" => Self::from_json_str,
            "yaml" | "yml" => Self::from_yaml_str,
            _ => return Err(ConfigError::UnsupportedFormat { extension }),
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loading evaluation config from {}", path.display());
        parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EvalConfig::from_yaml_str("max_generations: 5\n").unwrap();
        assert_eq!(config.max_generations, 5);
        assert_eq!(config.default_view, "default");
        assert_eq!(config.link_view, "link");
        assert!(config.builtin_defaults);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = EvalConfig::from_json_str(r#"{ "max_generation": 5 }"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = EvalConfig::load("design.toml");
        match result {
            Err(ConfigError::UnsupportedFormat { extension }) => assert_eq!(extension, "toml"),
            other => panic!("expected unsupported format, got {other:?}"),
        }
    }
}
