// # Store and Source Implementations
//
// This module provides the in-process implementations of the core traits:
// a non-durable configuration store and a channel-backed event source.

pub mod channel;
pub mod memory;

pub use channel::ChannelEventSource;
pub use memory::{MemoryConfigurationStore, MemoryConfigurationStoreFactory, register};
