//! Core traits for nori service settings synchronization
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ConfigurationStore`]: Durable table of service records
//! - [`EventSource`]: Inbound stream of change events

pub mod config_store;
pub mod event_source;

pub use config_store::{ConfigurationStore, ConfigurationStoreFactory};
pub use event_source::{ChangeEvent, DetectionStatus, EventSource};
