//! Azure-Storage-compatible REST clients (also served by the Azurite emulator)

mod blob;
mod client;
mod connection_string;
mod credential;
mod queue;
mod xml;

pub use blob::AzureBlobStore;
pub use client::{StorageHttpClient, API_VERSION};
pub use connection_string::ConnectionString;
pub use credential::{
    AmbientCredential, RequestAuthorizer, SharedKeyCredential, DEFAULT_IDENTITY_ENDPOINT,
};
pub use queue::{AzureMessageQueue, MAX_MESSAGES_PER_RECEIVE};
