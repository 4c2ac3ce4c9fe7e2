//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use stowage_core::{ListedObject, ObjectKey, StoreResult};

/// Storage abstraction trait
///
/// All storage backends (Supabase, local filesystem, S3) implement this trait so the
/// client can drive any of them. Implementations map their native failures into
/// `StoreError` and never retry on their own; retries and timeouts belong to the
/// client.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` at `key`. With `upsert == false` an existing object must be
    /// rejected with a `Conflict` error rather than replaced.
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> StoreResult<()>;

    /// List at most `limit` entries directly under `prefix` (empty for the bucket
    /// root). Ordering is whatever the backend provides.
    async fn list(&self, bucket: &str, prefix: &str, limit: usize)
        -> StoreResult<Vec<ListedObject>>;

    /// Download a whole object
    async fn download(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes>;

    /// Remove an object
    async fn remove(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()>;

    /// Move an object to a new key inside the same bucket
    async fn move_object(&self, bucket: &str, from: &ObjectKey, to: &ObjectKey)
        -> StoreResult<()>;

    /// Public URL for a key. Pure: performs no I/O and does not check existence.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Generate a time-limited URL granting read access to the object
    async fn signed_url(
        &self,
        bucket: &str,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> StoreResult<String>;

    /// Create a bucket. `public` controls unauthenticated read access where the
    /// backend supports it.
    async fn create_bucket(&self, name: &str, public: bool) -> StoreResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
