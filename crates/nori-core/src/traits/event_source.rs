// # Event Source Trait
//
// Defines where inbound change events come from.
//
// The origin of an event (a resource-type detector, a settings screen, a
// test) is opaque to the router: it only sees a stream of `ChangeEvent`s.
//
// ## Usage
//
// ```rust,ignore
// use nori_core::traits::{ChangeEvent, EventSource};
// use tokio_stream::StreamExt;
//
// let source = /* EventSource implementation */;
// let mut events = source.events();
// while let Some(event) = events.next().await {
//     println!("change requested: {:?}", event);
// }
// ```

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::model::ServiceRecord;

/// Outcome code reported by the settings detector
///
/// Only `Ok` settings are applied. On the wire `0` is `Ok` and any other
/// integer is a failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum DetectionStatus {
    Ok,
    Failed(i32),
}

impl DetectionStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, DetectionStatus::Ok)
    }
}

impl From<i32> for DetectionStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => DetectionStatus::Ok,
            other => DetectionStatus::Failed(other),
        }
    }
}

impl From<DetectionStatus> for i32 {
    fn from(status: DetectionStatus) -> Self {
        match status {
            DetectionStatus::Ok => 0,
            DetectionStatus::Failed(code) => code,
        }
    }
}

/// An inbound request to change the configuration store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// The detector produced settings for a service
    SettingsDetected {
        settings: ServiceRecord,
        status: DetectionStatus,
    },

    /// A service should be removed
    ///
    /// The id is carried raw; negative ids are rejected by the router.
    ServiceRemoveRequested { id: i64 },
}

impl ChangeEvent {
    /// Settings detected successfully
    pub fn detected(settings: ServiceRecord) -> Self {
        ChangeEvent::SettingsDetected {
            settings,
            status: DetectionStatus::Ok,
        }
    }

    /// Removal of the given id
    pub fn remove(id: impl Into<i64>) -> Self {
        ChangeEvent::ServiceRemoveRequested { id: id.into() }
    }

    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::SettingsDetected { .. } => "settings_detected",
            ChangeEvent::ServiceRemoveRequested { .. } => "service_remove_requested",
        }
    }
}

/// Trait for inbound event sources
///
/// # Behavior
///
/// - The stream yields events in the order they were produced
/// - The stream ends when the origin is gone; the router then stops
/// - Dropping the stream must release the underlying resources
pub trait EventSource: Send + Sync {
    /// Stream of change events
    ///
    /// A source may only hand out its stream once; later calls return an
    /// empty stream.
    fn events(&self) -> Pin<Box<dyn Stream<Item = ChangeEvent> + Send + 'static>>;
}
