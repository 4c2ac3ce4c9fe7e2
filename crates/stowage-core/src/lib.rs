//! Stowage Core Library
//!
//! This crate provides the configuration, error taxonomy, object-key normalization,
//! content-type inference and result models shared by the storage crate.
//!
//! # Object key format
//!
//! Object keys are `/`-joined, non-empty path segments with no leading slash and no
//! `.` or `..` segments. When uploading a local file the key is derived as:
//!
//! - **Explicit destination**: the destination itself (folder is ignored)
//! - **With folder**: `{folder}/{file_name}`
//! - **Without folder**: `{file_name}`
//!
//! Key derivation is centralized in the `key` module so every backend sees the same
//! layout.

pub mod config;
pub mod content_type;
pub mod error;
pub mod key;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BackendConfig, ClientConfig, RetryPolicy};
pub use content_type::{infer_content_type, DEFAULT_CONTENT_TYPE};
pub use error::{BackendErrorKind, StoreError, StoreResult};
pub use key::ObjectKey;
pub use models::{ListedObject, UploadOutcome, UploadedObject};
pub use storage_types::StorageBackend;
