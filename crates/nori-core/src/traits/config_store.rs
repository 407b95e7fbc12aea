// # Configuration Store Trait
//
// Defines the interface for the durable table of service records.
//
// ## Purpose
//
// The configuration store is the sole reader and writer of persisted
// `ServiceRecord`s. Every mutation is atomic and durable before the call
// returns, so the router can notify observers right after it.
//
// ## Implementations
//
// - In-memory: `nori_core::state::MemoryConfigurationStore`
// - SQLite: `nori-store-sqlite` crate
//
// ## Usage
//
// ```rust,ignore
// use nori_core::{ConfigurationStore, ServiceRecord, ServiceSubtype, ServiceType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* ConfigurationStore implementation */;
//
//     let record = ServiceRecord::new(
//         "yande.re",
//         "https://yande.re",
//         ServiceType::Danbooru,
//         ServiceSubtype::Moebooru,
//     );
//     let id = store.upsert(&record).await?;
//
//     let stored = store.get(id).await?;
//     assert_eq!(stored.map(|r| r.name), Some("yande.re".to_string()));
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::model::{ServiceId, ServiceRecord};

/// Trait for configuration store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Write Discipline
///
/// - Every write runs as exactly one statement inside its own transaction
/// - A failed write leaves the store exactly as it was before the call
/// - Connections and transactions never outlive a single call
///
/// # Credentials
///
/// Writes go through [`ServiceRecord::to_write`]: when the record is not
/// authenticated the credential columns are left untouched. Reads go
/// through [`StoredService::into_record`](crate::model::StoredService::into_record),
/// which hides credentials whenever the stored flag is off.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Insert or update a service record
    ///
    /// Dispatches on `record.identity`:
    /// - `Unassigned`: insert a new row, assigning a fresh id
    /// - `Persisted(id)`: update the row with that id
    ///
    /// # Returns
    ///
    /// - `Ok(ServiceId)`: The newly assigned or unchanged id
    /// - `Err(Error::Validation)`: Empty name or API URL
    /// - `Err(Error::NotFound)`: Update of an id the store does not hold
    /// - `Err(Error::Storage)`: Backend failure, nothing written
    async fn upsert(&self, record: &ServiceRecord) -> Result<ServiceId, crate::Error>;

    /// Delete a service record
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The row existed and was deleted
    /// - `Ok(false)`: No such row (not an error)
    /// - `Err(Error::Storage)`: Backend failure
    async fn remove(&self, id: ServiceId) -> Result<bool, crate::Error>;

    /// Snapshot of every persisted record, in insertion order
    async fn list(&self) -> Result<Vec<ServiceRecord>, crate::Error>;

    /// Get one record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ServiceRecord))`: The stored record
    /// - `Ok(None)`: No record with that id
    /// - `Err(Error)`: Storage error
    async fn get(&self, id: ServiceId) -> Result<Option<ServiceRecord>, crate::Error>;

    /// Number of persisted records
    async fn count(&self) -> Result<usize, crate::Error> {
        Ok(self.list().await?.len())
    }

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for constructing configuration stores from configuration
pub trait ConfigurationStoreFactory: Send + Sync {
    /// Create a store instance from configuration
    ///
    /// # Returns
    ///
    /// A shared store handle; the router and observers hold clones of it.
    fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ConfigurationStore>, crate::Error>;
}
