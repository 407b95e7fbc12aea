// # Memory Configuration Store
//
// In-memory implementation of ConfigurationStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for embedding where settings are re-detected on
// every start.
//
// ## Semantics
//
// Identical to the SQLite store: ids start at 1 and come from a counter
// that is never rewound, so a deleted id is never reused. Rows are listed
// in id order and credentials follow the same write/read rules via
// `ServiceWrite` and `StoredService`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::model::{Identity, ServiceId, ServiceRecord, StoredService};
use crate::registry::StoreRegistry;
use crate::traits::config_store::{ConfigurationStore, ConfigurationStoreFactory};
use crate::Error;

/// In-memory configuration store implementation
///
/// This implementation stores all rows in an ordered map protected by a
/// RwLock. It provides no persistence across restarts.
///
/// # Example
///
/// ```rust,no_run
/// use nori_core::state::MemoryConfigurationStore;
/// use nori_core::traits::ConfigurationStore;
/// use nori_core::{ServiceRecord, ServiceSubtype, ServiceType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryConfigurationStore::new();
///
///     let record = ServiceRecord::new(
///         "Danbooru",
///         "https://danbooru.donmai.us",
///         ServiceType::Danbooru,
///         ServiceSubtype::Danbooru,
///     );
///     let id = store.upsert(&record).await?;
///
///     assert_eq!(store.get(id).await?.map(|r| r.name), Some("Danbooru".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigurationStore {
    inner: Arc<RwLock<MemoryTable>>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    rows: BTreeMap<i64, StoredService>,
    /// Highest id ever assigned; 0 before the first insert
    last_id: i64,
}

impl MemoryConfigurationStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.rows.is_empty()
    }

    /// Clear all records from the store
    ///
    /// The id counter is kept, so ids handed out earlier stay unique.
    pub async fn clear(&self) {
        self.inner.write().await.rows.clear();
    }
}

#[async_trait]
impl ConfigurationStore for MemoryConfigurationStore {
    async fn upsert(&self, record: &ServiceRecord) -> Result<ServiceId, Error> {
        record.validate()?;
        let write = record.to_write();

        let mut table = self.inner.write().await;
        match record.identity {
            Identity::Unassigned => {
                let id = ServiceId::new(table.last_id + 1)?;
                table.last_id = id.get();
                table
                    .rows
                    .insert(id.get(), StoredService::inserted(id.get(), &write));
                Ok(id)
            }
            Identity::Persisted(id) => match table.rows.get_mut(&id.get()) {
                Some(row) => {
                    row.apply(&write);
                    Ok(id)
                }
                None => Err(Error::not_found(format!("no service with id {}", id))),
            },
        }
    }

    async fn remove(&self, id: ServiceId) -> Result<bool, Error> {
        let mut table = self.inner.write().await;
        Ok(table.rows.remove(&id.get()).is_some())
    }

    async fn list(&self) -> Result<Vec<ServiceRecord>, Error> {
        let table = self.inner.read().await;
        table
            .rows
            .values()
            .cloned()
            .map(StoredService::into_record)
            .collect()
    }

    async fn get(&self, id: ServiceId) -> Result<Option<ServiceRecord>, Error> {
        let table = self.inner.read().await;
        table
            .rows
            .get(&id.get())
            .cloned()
            .map(StoredService::into_record)
            .transpose()
    }

    async fn count(&self) -> Result<usize, Error> {
        Ok(self.len().await)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory stores
pub struct MemoryConfigurationStoreFactory;

impl ConfigurationStoreFactory for MemoryConfigurationStoreFactory {
    fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ConfigurationStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryConfigurationStore::new())),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}

/// Register the memory store with a registry
///
/// # Example
///
/// ```rust
/// use nori_core::StoreRegistry;
///
/// let registry = StoreRegistry::new();
/// nori_core::state::register(&registry);
/// assert!(registry.has_store("memory"));
/// ```
pub fn register(registry: &StoreRegistry) {
    registry.register_store("memory", Box::new(MemoryConfigurationStoreFactory));
}
