// # norid - nori settings daemon
//
// This is a thin integration layer: all settings logic lives in nori-core.
//
// The norid daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering store backends and creating the configured store
// 4. Feeding change events from stdin to the router
// 5. Printing a fresh store snapshot after every change
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Store
// - `NORI_STORE_TYPE`: Store backend (sqlite, memory). Default: sqlite
// - `NORI_STORE_PATH`: Database file (required for sqlite)
//
// ### Router
// - `NORI_EVENT_CHANNEL_CAPACITY`: Inbound event buffer. Default: 1000
// - `NORI_NOTIFICATION_CAPACITY`: Notification buffer. Default: 64
//
// ### Logging
// - `NORI_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Streams
//
// - stdin: one JSON `ChangeEvent` per line
// - stdout: one JSON snapshot `{"revision": n, "services": [...]}` per change
// - stderr: logs
//
// ## Example
//
// ```bash
// export NORI_STORE_TYPE=sqlite
// export NORI_STORE_PATH=/var/lib/nori/settings.db
//
// echo '{"event":"settings_detected","status":0,"settings":{"id":-1,"name":"yande.re","apiUrl":"https://yande.re","type":0,"subtype":2}}' | norid
// ```

use anyhow::{Context, Result};
use nori_core::config::{NoriConfig, RouterConfig, StoreConfig};
use nori_core::traits::ConfigurationStore;
use nori_core::{ChangeEvent, ChangeEventRouter, ChannelEventSource, StoreRegistry};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long runtime shutdown waits for a blocked stdin read
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum NoridExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<NoridExitCode> for ExitCode {
    fn from(code: NoridExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    store_type: String,
    store_path: Option<String>,
    event_channel_capacity: Option<usize>,
    notification_capacity: Option<usize>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            store_type: env::var("NORI_STORE_TYPE").unwrap_or_else(|_| "sqlite".to_string()),
            store_path: env::var("NORI_STORE_PATH").ok(),
            event_channel_capacity: parse_env("NORI_EVENT_CHANNEL_CAPACITY")?,
            notification_capacity: parse_env("NORI_NOTIFICATION_CAPACITY")?,
            log_level: env::var("NORI_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "sqlite" => {
                if !cfg!(feature = "sqlite") {
                    anyhow::bail!("NORI_STORE_TYPE=sqlite requires norid built with the 'sqlite' feature");
                }
                if self.store_path.as_ref().is_none_or(|p| p.is_empty()) {
                    anyhow::bail!(
                        "NORI_STORE_PATH is required when NORI_STORE_TYPE=sqlite. \
                        Set it via: export NORI_STORE_PATH=/var/lib/nori/settings.db"
                    );
                }
            }
            "memory" => {
                if self.store_path.is_some() {
                    eprintln!("WARNING: NORI_STORE_PATH is ignored when NORI_STORE_TYPE=memory");
                }
            }
            _ => anyhow::bail!(
                "NORI_STORE_TYPE '{}' is not supported. \
                Supported types: sqlite, memory",
                self.store_type
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "NORI_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_nori_config()
            .validate()
            .context("Invalid NORI_* settings")?;

        Ok(())
    }

    /// Translate into the library configuration
    fn to_nori_config(&self) -> NoriConfig {
        let store = match self.store_type.as_str() {
            "sqlite" => StoreConfig::Sqlite {
                path: self.store_path.clone().unwrap_or_default(),
            },
            _ => StoreConfig::Memory,
        };

        let defaults = RouterConfig::default();
        let router = RouterConfig {
            event_channel_capacity: self
                .event_channel_capacity
                .unwrap_or(defaults.event_channel_capacity),
            notification_capacity: self
                .notification_capacity
                .unwrap_or(defaults.notification_capacity),
        };

        NoriConfig { store, router }
    }
}

/// Parse an optional numeric environment variable
fn parse_env(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a positive integer, got '{}'", name, value)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NoridExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return NoridExitCode::ConfigError.into();
    }

    // Initialize tracing; stdout is reserved for snapshots
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NoridExitCode::ConfigError.into();
    }

    info!("Starting norid daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NoridExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config.to_nori_config()).await {
            Ok(()) => NoridExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                NoridExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                NoridExitCode::RuntimeError
            }
        }
    });

    // A pending stdin read cannot be cancelled; don't wait on it forever
    rt.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    result.into()
}

/// Failure class, mapped to an exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: NoriConfig) -> std::result::Result<(), DaemonError> {
    let registry = StoreRegistry::new();
    nori_core::state::register(&registry);

    #[cfg(feature = "sqlite")]
    {
        debug!("Registering SQLite store");
        nori_store_sqlite::register(&registry);
    }

    let store = registry
        .create_store(&config.store)
        .context("Failed to create configuration store")
        .map_err(DaemonError::Startup)?;
    info!(
        "Using {} store ({} service(s) configured)",
        store.backend_name(),
        store.count().await.map_err(|e| DaemonError::Startup(e.into()))?
    );

    let router = ChangeEventRouter::new(Arc::clone(&store), config.router.clone())
        .context("Failed to create router")
        .map_err(DaemonError::Startup)?;

    let (source, events_tx) = ChannelEventSource::bounded(config.router.event_channel_capacity);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let observer = tokio::spawn(print_snapshots(router.watch(), Arc::clone(&store)));
    let reader = tokio::spawn(read_events(events_tx));
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed: {:#}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Ready for change events on stdin");
    let run_result = router.run_with_shutdown(&source, Some(shutdown_rx)).await;

    info!("Shutting down daemon");
    reader.abort();
    signals.abort();

    // Dropping the router closes the notification channel; the observer
    // drains what is left and exits.
    drop(router);
    let observer_result = observer.await;

    run_result
        .context("Router stopped with an error")
        .map_err(DaemonError::Runtime)?;
    observer_result
        .context("Snapshot printer panicked")
        .map_err(DaemonError::Runtime)?
        .map_err(DaemonError::Runtime)?;

    Ok(())
}

/// Forward JSON-lines change events from stdin until EOF
async fn read_events(events_tx: mpsc::Sender<ChangeEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("stdin closed, no more change events");
                break;
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };
        line_number += 1;

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ChangeEvent>(&line) {
            Ok(event) => {
                debug!("Line {}: {} event", line_number, event.kind());
                if events_tx.send(event).await.is_err() {
                    debug!("Router gone, stopping stdin reader");
                    break;
                }
            }
            Err(e) => warn!("Ignoring malformed event on line {}: {}", line_number, e),
        }
    }
}

/// Print the whole store as one JSON line after every change
async fn print_snapshots(
    mut changes: std::pin::Pin<Box<dyn tokio_stream::Stream<Item = nori_core::SettingsChanged> + Send>>,
    store: Arc<dyn ConfigurationStore>,
) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(changed) = changes.next().await {
        let services = match store.list().await {
            Ok(services) => services,
            Err(e) => {
                error!("Failed to re-read store after revision {}: {}", changed.revision, e);
                continue;
            }
        };

        let mut line = serde_json::to_vec(&serde_json::json!({
            "revision": changed.revision,
            "services": services,
        }))?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(store_type: &str, store_path: Option<&str>) -> Config {
        Config {
            store_type: store_type.to_string(),
            store_path: store_path.map(str::to_string),
            event_channel_capacity: None,
            notification_capacity: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_memory_config_is_valid() {
        let config = config("memory", None);
        assert!(config.validate().is_ok());
        assert!(matches!(config.to_nori_config().store, StoreConfig::Memory));
    }

    #[test]
    fn test_sqlite_requires_path() {
        assert!(config("sqlite", None).validate().is_err());
        assert!(config("sqlite", Some("")).validate().is_err());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_config_translates() {
        let config = config("sqlite", Some("/tmp/nori/settings.db"));
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.to_nori_config().store,
            StoreConfig::Sqlite { ref path } if path == "/tmp/nori/settings.db"
        ));
    }

    #[test]
    fn test_unknown_store_and_level_rejected() {
        assert!(config("redis", None).validate().is_err());

        let mut noisy = config("memory", None);
        noisy.log_level = "verbose".to_string();
        assert!(noisy.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = config("memory", None);
        config.notification_capacity = Some(0);
        assert!(config.validate().is_err());
    }
}
