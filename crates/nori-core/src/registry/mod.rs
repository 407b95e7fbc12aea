//! Plugin-based store registry
//!
//! The registry allows configuration store backends to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nori_core::config::StoreConfig;
//! use nori_core::registry::StoreRegistry;
//!
//! // Create a registry
//! let registry = StoreRegistry::new();
//!
//! // Register backends
//! nori_core::state::register(&registry);
//! nori_store_sqlite::register(&registry);
//!
//! // Create store from config
//! let config = StoreConfig::Sqlite { path: "settings.db".into() };
//! let store = registry.create_store(&config)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates should expose a `register()` function:
//!
//! ```rust,ignore
//! # use nori_core::registry::StoreRegistry;
//! // In nori-store-sqlite crate
//! pub fn register(registry: &StoreRegistry) {
//!     registry.register_store("sqlite", Box::new(SqliteConfigurationStoreFactory));
//! }
//! ```

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::traits::{ConfigurationStore, ConfigurationStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Store registry for plugin-based configuration store creation
///
/// The registry maintains a map of store type names to factory objects,
/// allowing dynamic instantiation of stores based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct StoreRegistry {
    /// Registered store factories
    stores: RwLock<HashMap<String, Arc<dyn ConfigurationStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store factory
    ///
    /// Registering the same name twice replaces the earlier factory.
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "sqlite", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ConfigurationStoreFactory>,
    ) {
        let name = name.into();
        debug!("Registering store backend: {}", name);
        let mut stores = match self.stores.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stores.insert(name, Arc::from(factory));
    }

    /// Create a store from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Store configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn ConfigurationStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn ConfigurationStore>> {
        config.validate()?;
        let store_type = config.type_name();

        let factory = {
            let stores = self
                .stores
                .read()
                .map_err(|_| Error::other("store registry lock poisoned"))?;
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        factory.create(config)
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        match self.stores.read() {
            Ok(stores) => stores.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        match self.stores.read() {
            Ok(stores) => stores.contains_key(name),
            Err(poisoned) => poisoned.into_inner().contains_key(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStoreFactory;

    impl ConfigurationStoreFactory for MockStoreFactory {
        fn create(&self, _config: &StoreConfig) -> Result<Arc<dyn ConfigurationStore>> {
            Err(Error::not_found("Mock store not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = StoreRegistry::new();

        // Initially empty
        assert!(!registry.has_store("mock"));

        // Register
        registry.register_store("mock", Box::new(MockStoreFactory));

        // Now present
        assert!(registry.has_store("mock"));
        assert!(registry.list_stores().contains(&"mock".to_string()));
    }

    #[test]
    fn test_unknown_store_type() {
        let registry = StoreRegistry::new();
        let config = StoreConfig::Sqlite {
            path: "settings.db".to_string(),
        };

        let err = registry.create_store(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_create_memory_store() {
        let registry = StoreRegistry::new();
        crate::state::register(&registry);

        let store = registry.create_store(&StoreConfig::Memory).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_invalid_config_rejected_before_lookup() {
        let registry = StoreRegistry::new();
        registry.register_store("mock", Box::new(MockStoreFactory));

        let config = StoreConfig::Custom {
            factory: "mock".to_string(),
            config: serde_json::Value::Null,
        };
        let err = registry.create_store(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
