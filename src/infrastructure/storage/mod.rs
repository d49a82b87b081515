//! Storage infrastructure - blob store and queue implementations

pub mod azure;
mod factory;
mod in_memory;

pub use factory::{CredentialMode, StorageClients, StorageFactory};
pub use in_memory::{InMemoryBlobStore, InMemoryMessageQueue};
