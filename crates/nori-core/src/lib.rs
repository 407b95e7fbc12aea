// # nori-core
//
// Core library for nori's service settings synchronization and image
// contract checks.
//
// ## Architecture Overview
//
// This library provides the shared pieces of the image-board client:
// - **ConfigurationStore**: Trait for the durable table of configured services
// - **EventSource**: Trait for the inbound stream of change events
// - **ChangeEventRouter**: Applies change events to the store and notifies observers
// - **StoreRegistry**: Plugin-based registry for store backends
// - **verify_image**: Contract check for image records produced by API clients
//
// ## Design Principles
//
// 1. **Single writer path**: Every mutation goes through the router
// 2. **Event-Driven**: Changes arrive as async streams, observers get broadcasts
// 3. **Plugin-Based**: Store backends are registered dynamically
// 4. **Library-First**: The daemon is a thin shell over this crate

pub mod config;
pub mod error;
pub mod image;
pub mod model;
pub mod registry;
pub mod router;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{NoriConfig, RouterConfig, StoreConfig};
pub use error::{Error, Result};
pub use image::{Image, ObscenityRating, SoftWarning, Tag, TagType, Violation, verify_image};
pub use model::{Identity, ServiceId, ServiceRecord, ServiceSubtype, ServiceType};
pub use registry::StoreRegistry;
pub use router::{ChangeEventRouter, Dispatch, SettingsChanged, StoreChange};
pub use state::{ChannelEventSource, MemoryConfigurationStore};
pub use traits::{ChangeEvent, ConfigurationStore, DetectionStatus, EventSource};
