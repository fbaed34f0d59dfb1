//! Infrastructure for SceneForge: key/value persistence for credentials.

pub mod credential_store;

pub use credential_store::{JsonFileStore, MemoryStore, GATEWAY_API_KEY};
