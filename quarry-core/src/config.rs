//! Configuration types
//!
//! Values are loaded from environment variables (with defaults suitable for
//! development) or from a TOML file in which every field is required.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default lifetime of one cache generation.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Longest accepted cache generation lifetime.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default suffix appended to a namespace to form its index name.
pub const DEFAULT_INDEX_SUFFIX: &str = "_datastore";

// ============================================================================
// DATASTORE CONFIGURATION
// ============================================================================

/// Settings for the read/write paths and the record cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatastoreConfig {
    /// Fixed lifetime of a cache generation; the whole cache is dropped when
    /// it elapses.
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,
    /// When false every read goes to the backing engine.
    pub cache_enabled: bool,
    /// Suffix that turns a namespace into its index name.
    pub index_suffix: String,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_enabled: true,
            index_suffix: DEFAULT_INDEX_SUFFIX.to_string(),
        }
    }
}

impl DatastoreConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache generation lifetime.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Enable or disable the read cache.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the index name suffix.
    pub fn with_index_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.index_suffix = suffix.into();
        self
    }

    /// Create a DatastoreConfig from environment variables.
    ///
    /// Environment variables:
    /// - `QUARRY_CACHE_TTL_SECS`: cache generation lifetime (default: 60)
    /// - `QUARRY_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `QUARRY_INDEX_SUFFIX`: index name suffix (default: "_datastore")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_ttl = std::env::var("QUARRY_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let cache_enabled = std::env::var("QUARRY_CACHE_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.cache_enabled);

        let index_suffix = std::env::var("QUARRY_INDEX_SUFFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.index_suffix);

        Self {
            cache_ttl,
            cache_enabled,
            index_suffix,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl".to_string(),
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache_ttl > MAX_CACHE_TTL {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl".to_string(),
                value: format!("{}s", self.cache_ttl.as_secs()),
                reason: format!("must be at most {}s", MAX_CACHE_TTL.as_secs()),
            });
        }
        if self.index_suffix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "index_suffix".to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        let legal = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c);
        if !self.index_suffix.chars().all(legal) {
            return Err(ConfigError::InvalidValue {
                field: "index_suffix".to_string(),
                value: self.index_suffix.clone(),
                reason: "must be lowercase letters, digits, '.', '_' or '-'".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// BACKEND CONFIGURATION
// ============================================================================

/// Connection settings for an HTTP search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub base_url: String,
    /// Ask the engine to make each write visible to search before returning.
    pub refresh_on_write: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            refresh_on_write: false,
            username: None,
            password: None,
        }
    }
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_refresh_on_write(mut self, refresh: bool) -> Self {
        self.refresh_on_write = refresh;
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Create a BackendConfig from environment variables.
    ///
    /// Environment variables:
    /// - `QUARRY_BACKEND_URL`: base URL (default: http://localhost:9200)
    /// - `QUARRY_BACKEND_REFRESH`: "true" or "false" (default: false)
    /// - `QUARRY_BACKEND_USERNAME` / `QUARRY_BACKEND_PASSWORD`: basic auth
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("QUARRY_BACKEND_URL").unwrap_or(defaults.base_url),
            refresh_on_write: std::env::var("QUARRY_BACKEND_REFRESH")
                .ok()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(defaults.refresh_on_write),
            username: std::env::var("QUARRY_BACKEND_USERNAME").ok(),
            password: std::env::var("QUARRY_BACKEND_PASSWORD").ok(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "base_url".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: self.base_url.clone(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "username".to_string(),
                value: self.username.clone().unwrap_or_default(),
                reason: "username and password must be set together".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// FILE CONFIGURATION
// ============================================================================

/// Complete configuration as read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuarryConfig {
    pub datastore: DatastoreConfig,
    pub backend: BackendConfig,
}

impl QuarryConfig {
    pub fn from_env() -> Self {
        Self {
            datastore: DatastoreConfig::from_env(),
            backend: BackendConfig::from_env(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: QuarryConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.datastore.validate()?;
        self.backend.validate()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datastore_config_builder() {
        let config = DatastoreConfig::new()
            .with_cache_ttl(Duration::from_secs(5))
            .with_cache_enabled(false)
            .with_index_suffix("-records");

        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert!(!config.cache_enabled);
        assert_eq!(config.index_suffix, "-records");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_datastore_defaults() {
        let config = DatastoreConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(config.cache_enabled);
        assert_eq!(config.index_suffix, "_datastore");
    }

    #[test]
    fn test_datastore_validate_rejects_zero_ttl() {
        let err = DatastoreConfig::new()
            .with_cache_ttl(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "cache_ttl"));
    }

    #[test]
    fn test_datastore_validate_caps_ttl() {
        assert!(DatastoreConfig::default().with_cache_ttl(MAX_CACHE_TTL).validate().is_ok());

        for ttl in [MAX_CACHE_TTL + Duration::from_secs(1), Duration::from_secs(u64::MAX)] {
            let err = DatastoreConfig::default().with_cache_ttl(ttl).validate().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "cache_ttl"));
        }
    }

    #[test]
    fn test_from_toml_str_rejects_huge_ttl() {
        let toml = r#"
            [datastore]
            cache_ttl = 9223372036854775807
            cache_enabled = true
            index_suffix = "_datastore"

            [backend]
            base_url = "http://localhost:9200"
            refresh_on_write = false
        "#;
        assert!(QuarryConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_datastore_validate_rejects_bad_suffix() {
        assert!(DatastoreConfig::new().with_index_suffix("").validate().is_err());
        assert!(DatastoreConfig::new().with_index_suffix("_*").validate().is_err());
        assert!(DatastoreConfig::new().with_index_suffix("_DS").validate().is_err());
        assert!(DatastoreConfig::new().with_index_suffix("%2a").validate().is_err());
        assert!(DatastoreConfig::new().with_index_suffix("-records.v2").validate().is_ok());
    }

    #[test]
    fn test_backend_validate() {
        assert!(BackendConfig::default().validate().is_ok());
        assert!(BackendConfig::new("").validate().is_err());
        assert!(BackendConfig::new("localhost:9200").validate().is_err());

        let mut half_auth = BackendConfig::default();
        half_auth.username = Some("elastic".to_string());
        assert!(half_auth.validate().is_err());

        let auth = BackendConfig::default().with_basic_auth("elastic", "secret");
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = QuarryConfig::from_toml_str(
            r#"
            [datastore]
            cache_ttl = 30
            cache_enabled = true
            index_suffix = "_datastore"

            [backend]
            base_url = "https://search.internal:9200"
            refresh_on_write = true
            "#,
        )
        .unwrap();

        assert_eq!(config.datastore.cache_ttl, Duration::from_secs(30));
        assert!(config.backend.refresh_on_write);
        assert_eq!(config.backend.username, None);
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_fields() {
        let err = QuarryConfig::from_toml_str(
            r#"
            [datastore]
            cache_ttl = 30
            cache_enabled = true
            index_suffix = "_datastore"
            shards = 3

            [backend]
            base_url = "http://localhost:9200"
            refresh_on_write = false
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_toml_str_validates() {
        let err = QuarryConfig::from_toml_str(
            r#"
            [datastore]
            cache_ttl = 0
            cache_enabled = true
            index_suffix = "_datastore"

            [backend]
            base_url = "http://localhost:9200"
            refresh_on_write = false
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
