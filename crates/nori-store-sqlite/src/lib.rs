// # SQLite Configuration Store
//
// Durable implementation of ConfigurationStore on an embedded SQLite
// database.
//
// ## Transactions
//
// Every operation runs on the blocking pool, takes the connection guard,
// opens a transaction, executes one statement and commits. A transaction
// that is dropped before `commit()` rolls back, so a failed statement
// leaves the table exactly as it was.
//
// ## Table Layout
//
// ```sql
// CREATE TABLE service_settings (
//     id INTEGER PRIMARY KEY AUTOINCREMENT,
//     name TEXT NOT NULL,
//     api_url TEXT NOT NULL,
//     "type" INTEGER NOT NULL,
//     subtype INTEGER NOT NULL,
//     requires_authentication INTEGER NOT NULL DEFAULT 0,
//     username TEXT,
//     passphrase TEXT
// );
// ```
//
// AUTOINCREMENT keeps SQLite from handing out the id of a deleted row again.

use async_trait::async_trait;
use nori_core::config::StoreConfig;
use nori_core::model::{Identity, ServiceId, ServiceRecord, ServiceWrite, StoredService};
use nori_core::registry::StoreRegistry;
use nori_core::traits::{ConfigurationStore, ConfigurationStoreFactory};
use nori_core::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// How long a writer waits for a competing lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Path that selects a private in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS service_settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    api_url TEXT NOT NULL,
    "type" INTEGER NOT NULL,
    subtype INTEGER NOT NULL,
    requires_authentication INTEGER NOT NULL DEFAULT 0,
    username TEXT,
    passphrase TEXT
);
"#;

const SELECT_COLUMNS: &str = r#"SELECT id, name, api_url, "type", subtype, requires_authentication, username, passphrase FROM service_settings"#;

/// SQLite-backed configuration store
///
/// # Example
///
/// ```rust,no_run
/// use nori_core::traits::ConfigurationStore;
/// use nori_core::{ServiceRecord, ServiceSubtype, ServiceType};
/// use nori_store_sqlite::SqliteConfigurationStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteConfigurationStore::open("/var/lib/nori/settings.db")?;
///
///     let record = ServiceRecord::new(
///         "Safebooru",
///         "https://safebooru.org",
///         ServiceType::Gelbooru,
///         ServiceSubtype::Gelbooru,
///     );
///     let id = store.upsert(&record).await?;
///     assert!(store.get(id).await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SqliteConfigurationStore {
    path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConfigurationStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConfigurationStore {
    /// Open (or create) a database file
    ///
    /// Creates missing parent directories, switches the database to WAL
    /// journaling and ensures the table exists. `":memory:"` opens a private
    /// in-memory database instead.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str() == IN_MEMORY_PATH {
            return Self::open_in_memory();
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let connection = Connection::open(&path).map_err(|e| {
            Error::storage(format!(
                "Failed to open SQLite database {}: {}",
                path.display(),
                e
            ))
        })?;
        connection
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(db_error)?;
        connection.pragma_update(None, "synchronous", "NORMAL").map_err(db_error)?;

        let store = Self::from_connection(path, connection)?;
        info!("Opened SQLite settings store at {}", store.path.display());
        Ok(store)
    }

    /// Open a private in-memory database
    ///
    /// Nothing survives the store being dropped.
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(db_error)?;
        Self::from_connection(PathBuf::from(IN_MEMORY_PATH), connection)
    }

    fn from_connection(path: PathBuf, connection: Connection) -> Result<Self> {
        connection.busy_timeout(BUSY_TIMEOUT).map_err(db_error)?;
        connection.execute_batch(SCHEMA).map_err(db_error)?;

        Ok(Self {
            path,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Database location (`":memory:"` for in-memory stores)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside one transaction on the blocking pool
    ///
    /// The transaction commits only when `f` returns `Ok`.
    async fn with_transaction<F, T>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut guard = connection
                .lock()
                .map_err(|_| Error::storage("SQLite connection lock poisoned"))?;
            let tx = guard.transaction().map_err(db_error)?;
            let result = f(&tx)?;
            tx.commit().map_err(db_error)?;
            Ok(result)
        })
        .await
        .map_err(|e| Error::storage(format!("SQLite {} task failed: {}", operation, e)))?
    }
}

#[async_trait]
impl ConfigurationStore for SqliteConfigurationStore {
    async fn upsert(&self, record: &ServiceRecord) -> Result<ServiceId> {
        record.validate()?;
        let record = record.clone();

        self.with_transaction("upsert", move |tx| {
            let write = record.to_write();
            match record.identity {
                Identity::Unassigned => insert_row(tx, &write),
                Identity::Persisted(id) => {
                    update_row(tx, id, &write)?;
                    Ok(id)
                }
            }
        })
        .await
    }

    async fn remove(&self, id: ServiceId) -> Result<bool> {
        self.with_transaction("remove", move |tx| {
            let affected = tx
                .execute("DELETE FROM service_settings WHERE id = ?1", params![id.get()])
                .map_err(db_error)?;
            debug!("Deleted {} row(s) for service {}", affected, id);
            Ok(affected > 0)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<ServiceRecord>> {
        self.with_transaction("list", |tx| {
            let mut statement = tx
                .prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))
                .map_err(db_error)?;
            let rows = statement
                .query_map([], read_row)
                .map_err(db_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error)?;
            rows.into_iter().map(StoredService::into_record).collect()
        })
        .await
    }

    async fn get(&self, id: ServiceId) -> Result<Option<ServiceRecord>> {
        self.with_transaction("get", move |tx| {
            tx.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id.get()],
                read_row,
            )
            .optional()
            .map_err(db_error)?
            .map(StoredService::into_record)
            .transpose()
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_transaction("count", |tx| {
            let count: i64 = tx
                .query_row("SELECT COUNT(*) FROM service_settings", [], |row| row.get(0))
                .map_err(db_error)?;
            usize::try_from(count).map_err(|_| Error::storage("negative row count"))
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn insert_row(tx: &Transaction<'_>, write: &ServiceWrite<'_>) -> Result<ServiceId> {
    let username = write.credentials.and_then(|c| c.username);
    let passphrase = write.credentials.and_then(|c| c.passphrase);

    tx.execute(
        r#"INSERT INTO service_settings
               (name, api_url, "type", subtype, requires_authentication, username, passphrase)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        params![
            write.name,
            write.api_url,
            write.service_type,
            write.subtype,
            write.requires_authentication,
            username,
            passphrase,
        ],
    )
    .map_err(db_error)?;

    let id = ServiceId::new(tx.last_insert_rowid())?;
    debug!("Inserted service {}", id);
    Ok(id)
}

fn update_row(tx: &Transaction<'_>, id: ServiceId, write: &ServiceWrite<'_>) -> Result<()> {
    let affected = match write.credentials {
        Some(credentials) => tx.execute(
            r#"UPDATE service_settings
                  SET name = ?1, api_url = ?2, "type" = ?3, subtype = ?4,
                      requires_authentication = ?5, username = ?6, passphrase = ?7
                WHERE id = ?8"#,
            params![
                write.name,
                write.api_url,
                write.service_type,
                write.subtype,
                write.requires_authentication,
                credentials.username,
                credentials.passphrase,
                id.get(),
            ],
        ),
        // Unauthenticated: credential columns stay as they are
        None => tx.execute(
            r#"UPDATE service_settings
                  SET name = ?1, api_url = ?2, "type" = ?3, subtype = ?4,
                      requires_authentication = ?5
                WHERE id = ?6"#,
            params![
                write.name,
                write.api_url,
                write.service_type,
                write.subtype,
                write.requires_authentication,
                id.get(),
            ],
        ),
    }
    .map_err(db_error)?;

    if affected == 0 {
        return Err(Error::not_found(format!("no service with id {}", id)));
    }
    debug!("Updated service {}", id);
    Ok(())
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredService> {
    Ok(StoredService {
        id: row.get(0)?,
        name: row.get(1)?,
        api_url: row.get(2)?,
        service_type: row.get(3)?,
        subtype: row.get(4)?,
        requires_authentication: row.get(5)?,
        username: row.get(6)?,
        passphrase: row.get(7)?,
    })
}

fn db_error(err: rusqlite::Error) -> Error {
    Error::storage(err.to_string())
}

/// Factory for creating SQLite stores
pub struct SqliteConfigurationStoreFactory;

impl ConfigurationStoreFactory for SqliteConfigurationStoreFactory {
    fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ConfigurationStore>> {
        match config {
            StoreConfig::Sqlite { path } => Ok(Arc::new(SqliteConfigurationStore::open(path)?)),
            _ => Err(Error::config("Invalid config for SQLite store")),
        }
    }
}

/// Register the SQLite store with a registry
///
/// # Example
///
/// ```rust
/// use nori_core::StoreRegistry;
///
/// let registry = StoreRegistry::new();
/// nori_store_sqlite::register(&registry);
/// assert!(registry.has_store("sqlite"));
/// ```
pub fn register(registry: &StoreRegistry) {
    registry.register_store("sqlite", Box::new(SqliteConfigurationStoreFactory));
}
