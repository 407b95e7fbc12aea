//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that verify the router's
//! contracts without a durable backend.

#![allow(dead_code)]

use nori_core::error::{Error, Result};
use nori_core::state::MemoryConfigurationStore;
use nori_core::traits::{ChangeEvent, ConfigurationStore, EventSource};
use nori_core::{ChangeEventRouter, RouterConfig, ServiceRecord, ServiceSubtype, ServiceType};
use nori_core::model::ServiceId;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// An EventSource whose events are pushed by the test
pub struct ControlledEventSource {
    /// Receiver for the router's stream
    router_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>,
    /// Call counter for events()
    events_call_count: Arc<AtomicUsize>,
}

impl ControlledEventSource {
    /// Create a new controlled source and the sender that feeds it
    pub fn new() -> (Self, mpsc::UnboundedSender<ChangeEvent>) {
        let (test_tx, router_rx) = mpsc::unbounded_channel();

        let source = Self {
            router_rx: std::sync::Mutex::new(Some(router_rx)),
            events_call_count: Arc::new(AtomicUsize::new(0)),
        };

        (source, test_tx)
    }

    /// Get the number of times events() was called
    pub fn events_call_count(&self) -> usize {
        self.events_call_count.load(Ordering::SeqCst)
    }
}

impl EventSource for ControlledEventSource {
    fn events(&self) -> Pin<Box<dyn Stream<Item = ChangeEvent> + Send + 'static>> {
        self.events_call_count.fetch_add(1, Ordering::SeqCst);

        // Take the receiver (only called once)
        let rx = self
            .router_rx
            .lock()
            .unwrap()
            .take()
            .expect("events() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

/// An EventSource that never emits and never ends (for shutdown testing)
pub struct IdleEventSource;

impl EventSource for IdleEventSource {
    fn events(&self) -> Pin<Box<dyn Stream<Item = ChangeEvent> + Send + 'static>> {
        Box::pin(tokio_stream::pending())
    }
}

/// A ConfigurationStore that counts calls and can be told to fail writes
///
/// Reads and successful writes go to an inner memory store.
pub struct MockConfigurationStore {
    inner: MemoryConfigurationStore,
    /// Call counter for upsert()
    upsert_call_count: Arc<AtomicUsize>,
    /// Call counter for remove()
    remove_call_count: Arc<AtomicUsize>,
    /// When set, upsert() and remove() fail with a storage error
    fail_writes: Arc<AtomicBool>,
    /// Artificial latency added to every write
    write_delay: Duration,
}

impl MockConfigurationStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryConfigurationStore::new(),
            upsert_call_count: Arc::new(AtomicUsize::new(0)),
            remove_call_count: Arc::new(AtomicUsize::new(0)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            write_delay: Duration::ZERO,
        }
    }

    /// Same store, but every write sleeps first
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Get the number of times upsert() was called
    pub fn upsert_call_count(&self) -> usize {
        self.upsert_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times remove() was called
    pub fn remove_call_count(&self) -> usize {
        self.remove_call_count.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn before_write(&self) -> Result<()> {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage("simulated disk failure"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigurationStore for MockConfigurationStore {
    async fn upsert(&self, record: &ServiceRecord) -> Result<ServiceId> {
        self.upsert_call_count.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.inner.upsert(record).await
    }

    async fn remove(&self, id: ServiceId) -> Result<bool> {
        self.remove_call_count.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.inner.remove(id).await
    }

    async fn list(&self) -> Result<Vec<ServiceRecord>> {
        self.inner.list().await
    }

    async fn get(&self, id: ServiceId) -> Result<Option<ServiceRecord>> {
        self.inner.get(id).await
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Router over a store, with default capacities
pub fn router_over(store: Arc<dyn ConfigurationStore>) -> ChangeEventRouter {
    ChangeEventRouter::new(store, RouterConfig::default()).expect("router construction succeeds")
}

/// The unauthenticated yande.re record used across scenarios
pub fn yandere() -> ServiceRecord {
    ServiceRecord::new(
        "yande.re",
        "https://yande.re",
        ServiceType::Danbooru,
        ServiceSubtype::Moebooru,
    )
}

/// An authenticated Danbooru record
pub fn danbooru_with_login() -> ServiceRecord {
    ServiceRecord::new(
        "Danbooru",
        "https://danbooru.donmai.us",
        ServiceType::Danbooru,
        ServiceSubtype::Danbooru,
    )
    .with_credentials("alice", "api-key-123")
}

/// A Gelbooru record with the given name
pub fn gelbooru(name: &str) -> ServiceRecord {
    ServiceRecord::new(
        name,
        "https://gelbooru.com",
        ServiceType::Gelbooru,
        ServiceSubtype::Gelbooru,
    )
}
