//! Change event router
//!
//! The ChangeEventRouter is responsible for:
//! - Receiving change events from an EventSource
//! - Applying each one to the ConfigurationStore
//! - Notifying observers after every committed mutation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ EventSource │─── ChangeEvent ───┐
//! └─────────────┘                   │
//!                                   ▼
//!                       ┌───────────────────┐
//!                       │ ChangeEventRouter │
//!                       └───────────────────┘
//!                                   │
//!                 ┌─────────────────┴─────────────────┐
//!                 │                                   │
//!                 ▼                                   ▼
//!     ┌────────────────────┐             ┌──────────────────────┐
//!     │ ConfigurationStore │             │   SettingsChanged    │
//!     │ (upsert / remove)  │             │ (broadcast, re-read) │
//!     └────────────────────┘             └──────────────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. Event received (Idle)
//! 2. `SettingsDetected` with a failed status is discarded silently
//! 3. Store operation runs (Applying)
//! 4. On commit, exactly one `SettingsChanged` is broadcast (Notifying)
//! 5. On failure, the error is returned and nothing is broadcast (Failed)
//!
//! Steps 3 and 4 run under one lock, so notifications are never emitted
//! before their commit and always follow commit order. Once the lock is
//! taken they run on a spawned task: dropping the `dispatch()` future
//! cannot leave a committed mutation without its notification.

use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::model::{Identity, ServiceId, ServiceRecord};
use crate::traits::{ChangeEvent, ConfigurationStore, DetectionStatus, EventSource};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// What a committed mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// A new service was inserted
    Inserted { id: ServiceId },
    /// An existing service was updated
    Updated { id: ServiceId },
    /// A service was deleted
    Removed { id: ServiceId },
}

impl StoreChange {
    /// The affected service
    pub fn id(&self) -> ServiceId {
        match self {
            StoreChange::Inserted { id }
            | StoreChange::Updated { id }
            | StoreChange::Removed { id } => *id,
        }
    }
}

/// Notification that the configuration store changed
///
/// Observers are expected to re-read the store; the payload is only a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsChanged {
    /// Commit counter, starting at 1 and increasing by one per notification
    pub revision: u64,
    pub change: StoreChange,
}

/// Result of dispatching one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A mutation committed and this notification was broadcast
    Applied(SettingsChanged),
    /// The detector reported a failure; nothing happened
    Discarded(DetectionStatus),
    /// Removal of an id the store did not hold; nothing happened
    NothingRemoved(ServiceId),
}

impl Dispatch {
    /// The broadcast notification, if one was emitted
    pub fn notification(&self) -> Option<SettingsChanged> {
        match self {
            Dispatch::Applied(changed) => Some(*changed),
            _ => None,
        }
    }
}

/// Change event router
///
/// The only entry point through which change events reach the store.
/// It holds no durable state of its own: it is a dispatcher plus a
/// notifier.
///
/// ## Lifecycle
///
/// 1. Create with [`ChangeEventRouter::new()`]
/// 2. Hand out [`subscribe()`](Self::subscribe) / [`watch()`](Self::watch) to observers
/// 3. Either call [`dispatch()`](Self::dispatch) directly, or
///    [`run()`](Self::run) against an [`EventSource`]
///
/// ## Threading
///
/// `dispatch()` may be called from many tasks at once; events are applied
/// one at a time in lock acquisition order.
pub struct ChangeEventRouter {
    /// Store all mutations go through
    store: Arc<dyn ConfigurationStore>,

    /// Serializes apply + notify; holds the last emitted revision
    apply_lock: Arc<Mutex<u64>>,

    /// Notification sender for observers
    changes_tx: broadcast::Sender<SettingsChanged>,
}

impl ChangeEventRouter {
    /// Create a new router
    ///
    /// # Parameters
    ///
    /// - `store`: Store implementation; observers re-read the same handle
    /// - `config`: Router configuration
    pub fn new(store: Arc<dyn ConfigurationStore>, config: RouterConfig) -> Result<Self> {
        config.validate()?;

        let (changes_tx, _) = broadcast::channel(config.notification_capacity);

        Ok(Self {
            store,
            apply_lock: Arc::new(Mutex::new(0)),
            changes_tx,
        })
    }

    /// The store this router writes to
    pub fn store(&self) -> &Arc<dyn ConfigurationStore> {
        &self.store
    }

    /// Subscribe to `SettingsChanged` notifications
    ///
    /// Only notifications emitted after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChanged> {
        self.changes_tx.subscribe()
    }

    /// Stream of `SettingsChanged` notifications
    ///
    /// A subscriber that falls behind skips the missed notifications
    /// (logged); the next one it sees still means "re-read the store".
    pub fn watch(&self) -> Pin<Box<dyn Stream<Item = SettingsChanged> + Send + 'static>> {
        let stream = BroadcastStream::new(self.changes_tx.subscribe()).filter_map(|item| match item {
            Ok(changed) => Some(changed),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("Settings observer lagged, skipped {} notification(s)", skipped);
                None
            }
        });
        Box::pin(stream)
    }

    /// Apply one change event to completion
    ///
    /// # Returns
    ///
    /// - `Ok(Dispatch::Applied)`: Mutation committed, notification broadcast
    /// - `Ok(Dispatch::Discarded)`: Detector status was not OK
    /// - `Ok(Dispatch::NothingRemoved)`: Removal of an absent id
    /// - `Err(Error)`: Validation, not-found or storage failure; nothing broadcast
    pub async fn dispatch(&self, event: ChangeEvent) -> Result<Dispatch> {
        debug!("Dispatching {} event", event.kind());

        let mutation = match event {
            ChangeEvent::SettingsDetected { status, .. } if !status.is_ok() => {
                debug!("Discarding detected settings with status {:?}", status);
                return Ok(Dispatch::Discarded(status));
            }
            ChangeEvent::SettingsDetected { settings, .. } => Mutation::Upsert(settings),
            ChangeEvent::ServiceRemoveRequested { id } => Mutation::Remove(ServiceId::new(id)?),
        };

        // Cancelling while queued for the lock is harmless; past this point
        // the apply task runs to completion on its own
        let revision = Arc::clone(&self.apply_lock).lock_owned().await;
        let task = tokio::spawn(apply_and_notify(
            Arc::clone(&self.store),
            self.changes_tx.clone(),
            revision,
            mutation,
        ));

        task.await
            .map_err(|e| Error::other(format!("Change event task failed: {}", e)))?
    }

    /// Run the router
    ///
    /// Consumes the source's event stream until it ends or Ctrl-C is
    /// received. Failed events are logged and do not stop the loop.
    pub async fn run(&self, source: &dyn EventSource) -> Result<()> {
        self.run_internal(source, None).await
    }

    /// Run the router with a controlled shutdown signal
    ///
    /// Stops when the event stream ends or `shutdown_rx` fires. With
    /// `None`, behaves like [`run()`](Self::run).
    pub async fn run_with_shutdown(
        &self,
        source: &dyn EventSource,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(source, shutdown_rx).await
    }

    async fn run_internal(
        &self,
        source: &dyn EventSource,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!(
            "Change event router started ({} store)",
            self.store.backend_name()
        );

        let mut events = source.events();

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    event = events.next() => {
                        let Some(event) = event else {
                            info!("Event source closed");
                            break;
                        };
                        self.handle(event).await;
                    }

                    _ = &mut rx => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    event = events.next() => {
                        let Some(event) = event else {
                            info!("Event source closed");
                            break;
                        };
                        self.handle(event).await;
                    }

                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        info!("Change event router stopped");
        Ok(())
    }

    /// Dispatch one event from the run loop, logging failures
    async fn handle(&self, event: ChangeEvent) {
        let kind = event.kind();
        if let Err(e) = self.dispatch(event).await {
            error!("Failed to apply {} event: {}", kind, e);
        }
    }
}

/// A store write waiting to be applied
enum Mutation {
    Upsert(ServiceRecord),
    Remove(ServiceId),
}

/// Apply one mutation and broadcast its notification
///
/// Holds the apply lock for its whole duration.
async fn apply_and_notify(
    store: Arc<dyn ConfigurationStore>,
    changes_tx: broadcast::Sender<SettingsChanged>,
    mut revision: OwnedMutexGuard<u64>,
    mutation: Mutation,
) -> Result<Dispatch> {
    let change = match mutation {
        Mutation::Upsert(settings) => {
            let id = store.upsert(&settings).await?;
            match settings.identity {
                Identity::Unassigned => StoreChange::Inserted { id },
                Identity::Persisted(_) => StoreChange::Updated { id },
            }
        }
        Mutation::Remove(id) => {
            if !store.remove(id).await? {
                debug!("Service {} not present, nothing removed", id);
                return Ok(Dispatch::NothingRemoved(id));
            }
            StoreChange::Removed { id }
        }
    };

    *revision += 1;
    let changed = SettingsChanged {
        revision: *revision,
        change,
    };
    info!(
        "Service settings changed: {:?} (revision {}, {} store)",
        changed.change,
        changed.revision,
        store.backend_name()
    );

    // No subscribers is fine: nobody needs to re-read
    if changes_tx.send(changed).is_err() {
        debug!("No settings observers subscribed");
    }

    Ok(Dispatch::Applied(changed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_notification_accessor() {
        let id = ServiceId::new(2).unwrap();
        let changed = SettingsChanged {
            revision: 1,
            change: StoreChange::Removed { id },
        };

        assert_eq!(Dispatch::Applied(changed).notification(), Some(changed));
        assert_eq!(Dispatch::NothingRemoved(id).notification(), None);
        assert_eq!(changed.change.id(), id);
    }
}
