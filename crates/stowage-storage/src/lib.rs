//! Stowage Storage Library
//!
//! This crate provides the [`ObjectStoreClient`] façade and the storage backends it
//! can drive: Supabase Storage, the local filesystem and S3 (feature `storage-s3`).
//!
//! The client owns one configured bucket and exposes upload, listing, download,
//! delete, move, URL generation and bucket creation. Every operation returns a
//! [`StoreResult`]; backend failures are mapped into [`StoreError`] at the backend
//! boundary and never escape as panics.
//!
//! ```no_run
//! use stowage_storage::{BackendConfig, ClientConfig, ObjectStoreClient};
//!
//! # async fn run() -> stowage_storage::StoreResult<()> {
//! let config = ClientConfig::new(
//!     BackendConfig::Supabase {
//!         url: "https://project.supabase.co".to_string(),
//!         api_key: "service-role-key".to_string(),
//!     },
//!     "videos",
//! );
//! let client = ObjectStoreClient::new(config).await?;
//! let uploaded = client.upload("output/short_4.mp4", None, Some("uploads3"), false).await?;
//! println!("{}", uploaded.public_url);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
#[cfg(any(feature = "storage-supabase", feature = "storage-local"))]
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub(crate) mod retry;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(feature = "storage-supabase")]
pub mod supabase;
pub mod telemetry;
pub mod traits;

// Re-export commonly used types
pub use client::ObjectStoreClient;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use stowage_core::{
    BackendConfig, BackendErrorKind, ClientConfig, ListedObject, ObjectKey, RetryPolicy,
    StorageBackend, StoreError, StoreResult, UploadOutcome, UploadedObject,
};
#[cfg(feature = "storage-supabase")]
pub use supabase::SupabaseStorage;
pub use telemetry::init_tracing;
pub use traits::Storage;
