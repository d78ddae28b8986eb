//! Configuration types

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Upper bound for the zero-pad width of prefixed keys (u64 has 20 digits).
pub const MAX_KEY_PREFIX_WIDTH: usize = 18;

/// Tunables shared by the executor and the adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmelConfig {
    /// Zero-pad width of the counter in `GENERATE KEY ... AS STRING PREFIX` keys.
    pub key_prefix_width: usize,
    /// Name of the surrogate key EXTRACT generates on the new entity.
    pub default_key_name: String,
    /// Attribute holding each element of a scalar array aggregation.
    pub value_column: String,
}

impl Default for SmelConfig {
    fn default() -> Self {
        Self {
            key_prefix_width: 6,
            default_key_name: "id".to_string(),
            value_column: "value".to_string(),
        }
    }
}

impl SmelConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SMEL_KEY_PREFIX_WIDTH`: counter width for prefixed keys (default: 6)
    /// - `SMEL_DEFAULT_KEY_NAME`: surrogate key name used by EXTRACT (default: id)
    /// - `SMEL_VALUE_COLUMN`: scalar array element attribute (default: value)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            key_prefix_width: std::env::var("SMEL_KEY_PREFIX_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.key_prefix_width),
            default_key_name: std::env::var("SMEL_DEFAULT_KEY_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_key_name),
            value_column: std::env::var("SMEL_VALUE_COLUMN")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.value_column),
        }
    }

    /// Parse a TOML document; missing fields fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SmelConfig = toml::from_str(source).map_err(|e| ConfigError::Malformed {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - key_prefix_width in 1..=18
    /// - default_key_name and value_column are plain identifiers
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix_width == 0 || self.key_prefix_width > MAX_KEY_PREFIX_WIDTH {
            return Err(ConfigError::InvalidValue {
                field: "key_prefix_width".to_string(),
                value: self.key_prefix_width.to_string(),
                reason: format!("key_prefix_width must be between 1 and {}", MAX_KEY_PREFIX_WIDTH),
            });
        }

        for (field, value) in [
            ("default_key_name", &self.default_key_name),
            ("value_column", &self.value_column),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                    reason: format!("{} must be a plain identifier", field),
                });
            }
        }

        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SmelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.key_prefix_width, 6);
        assert_eq!(config.value_column, "value");
    }

    #[test]
    fn test_validate_rejects_zero_width() {
        let config = SmelConfig {
            key_prefix_width: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "key_prefix_width"));
    }

    #[test]
    fn test_validate_rejects_non_identifier_names() {
        let config = SmelConfig {
            value_column: "tag value".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_str_fills_defaults() {
        let config = SmelConfig::from_toml_str("key_prefix_width = 4\n").unwrap();
        assert_eq!(config.key_prefix_width, 4);
        assert_eq!(config.default_key_name, "id");
    }

    #[test]
    fn test_from_toml_str_reports_malformed_input() {
        let err = SmelConfig::from_toml_str("key_prefix_width = \"wide\"").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_from_env_overrides() {
        let _width = EnvVarGuard::set("SMEL_KEY_PREFIX_WIDTH", Some("3"));
        let _column = EnvVarGuard::set("SMEL_VALUE_COLUMN", None);
        let config = SmelConfig::from_env();
        assert_eq!(config.key_prefix_width, 3);
        assert_eq!(config.value_column, "value");
    }
}
