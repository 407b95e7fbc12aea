//! Configuration types for nori service settings synchronization
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoriConfig {
    /// Configuration store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Optional router settings
    #[serde(default)]
    pub router: RouterConfig,
}

impl NoriConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.router.validate()?;
        Ok(())
    }
}

/// Configuration store backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// SQLite database file
    Sqlite {
        /// Path to the database file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Sqlite { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("SQLite store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Capacity of the inbound event channel
    ///
    /// When full, producers wait instead of growing memory without bound.
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Capacity of the `SettingsChanged` broadcast buffer
    ///
    /// Observers that fall further behind than this skip ahead; since a
    /// notification only says "re-read the store", nothing is lost.
    ///
    /// Default: 64 notifications
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl RouterConfig {
    /// Validate the router configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self.notification_capacity == 0 {
            return Err(crate::Error::config("Notification capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_notification_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NoriConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.type_name(), "memory");
        assert_eq!(config.router.event_channel_capacity, 1000);
        assert_eq!(config.router.notification_capacity, 64);
    }

    #[test]
    fn test_store_config_from_json() {
        let config: NoriConfig = serde_json::from_value(serde_json::json!({
            "store": { "type": "sqlite", "path": "/var/lib/nori/settings.db" }
        }))
        .unwrap();

        assert_eq!(config.store.type_name(), "sqlite");
        assert_eq!(config.router.notification_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let empty_path = StoreConfig::Sqlite {
            path: String::new(),
        };
        assert!(empty_path.validate().is_err());

        let custom = StoreConfig::Custom {
            factory: "redis".to_string(),
            config: serde_json::Value::Null,
        };
        assert!(custom.validate().is_err());

        let router = RouterConfig {
            event_channel_capacity: 10,
            notification_capacity: 0,
        };
        assert!(router.validate().is_err());
    }
}
