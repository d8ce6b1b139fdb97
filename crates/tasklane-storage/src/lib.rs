//! State storage for Tasklane billing.
//!
//! This crate provides:
//! - The [`StateStorage`] trait, a string-keyed blob store
//! - File-backed storage (one JSON file per key, atomic replace)
//! - In-memory storage for tests and ephemeral sessions
//! - JSON load/save helpers

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::{load_json, save_json, validate_key, StateStorage};
pub use error::{StorageError, StorageResult};
pub use file::{FileStorage, StorageConfig, DEFAULT_STATE_DIR};
pub use memory::MemoryStorage;
