//! Object store client façade
//!
//! [`ObjectStoreClient`] binds one configured bucket to a storage backend and turns
//! local paths into object keys. Every backend call goes through the configured
//! timeout and retry policy, and every operation reports failure as a
//! [`StoreError`].

use crate::factory::create_storage;
use crate::retry::run_with_policy;
use crate::traits::Storage;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stowage_core::{
    infer_content_type, ClientConfig, ListedObject, ObjectKey, StoreError, StoreResult,
    UploadOutcome, UploadedObject,
};

/// Default number of entries returned by [`ObjectStoreClient::list`]
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Default lifetime of URLs from [`ObjectStoreClient::signed_url`]
pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct ObjectStoreClient {
    backend: Arc<dyn Storage>,
    config: Arc<ClientConfig>,
}

impl ObjectStoreClient {
    /// Validate `config` and connect to the backend it selects.
    pub async fn new(config: ClientConfig) -> StoreResult<Self> {
        config.validate()?;
        let backend = create_storage(&config).await?;

        tracing::info!(
            backend = %backend.backend_type(),
            bucket = %config.bucket,
            "Object store client initialized"
        );

        Ok(ObjectStoreClient {
            backend,
            config: Arc::new(config),
        })
    }

    /// Build a client over an already constructed backend.
    pub fn with_backend(config: ClientConfig, backend: Arc<dyn Storage>) -> StoreResult<Self> {
        config.validate()?;
        Ok(ObjectStoreClient {
            backend,
            config: Arc::new(config),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn Storage> {
        &self.backend
    }

    /// Upload one local file.
    ///
    /// The key is `explicit_key` when given, otherwise `{folder}/{file_name}` (or just
    /// the file name without a folder). With `overwrite == false` an existing object
    /// at that key makes the upload fail with a `Conflict` backend error. A missing
    /// local file fails with [`StoreError::NotFound`] before the backend is touched.
    /// Create-only uploads are never retried; overwriting uploads follow the
    /// configured [`RetryPolicy`](stowage_core::RetryPolicy).
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        explicit_key: Option<&str>,
        folder: Option<&str>,
        overwrite: bool,
    ) -> UploadOutcome {
        let local_path = local_path.as_ref();
        let start = Instant::now();

        let result = self
            .upload_file(local_path, explicit_key, folder, overwrite)
            .await;

        match &result {
            Ok(uploaded) => tracing::info!(
                bucket = %self.config.bucket,
                key = %uploaded.object_key,
                size_bytes = uploaded.size_bytes,
                content_type = %uploaded.content_type,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload successful"
            ),
            Err(e) => tracing::error!(
                error = %e,
                bucket = %self.config.bucket,
                path = %local_path.display(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload failed"
            ),
        }

        result
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        explicit_key: Option<&str>,
        folder: Option<&str>,
        overwrite: bool,
    ) -> UploadOutcome {
        match tokio::fs::try_exists(local_path).await {
            Ok(true) => {}
            Ok(false) => return Err(StoreError::NotFound(local_path.display().to_string())),
            Err(e) => return Err(StoreError::Io(e)),
        }

        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                StoreError::InvalidKey(format!(
                    "'{}' has no valid UTF-8 file name",
                    local_path.display()
                ))
            })?
            .to_string();

        let key = ObjectKey::derive(&file_name, explicit_key, folder)?;
        let data = Bytes::from(tokio::fs::read(local_path).await?);
        let size_bytes = data.len() as u64;
        let content_type = infer_content_type(&file_name, &self.config.default_content_type);

        tracing::debug!(
            key = %key,
            size_bytes = size_bytes,
            content_type = %content_type,
            overwrite = overwrite,
            "Uploading file"
        );

        let bucket = self.config.bucket.as_str();
        self.call("upload", overwrite, || {
            self.backend
                .upload(bucket, &key, data.clone(), &content_type, overwrite)
        })
        .await?;

        let public_url = self.backend.public_url(bucket, key.as_str());

        Ok(UploadedObject {
            file_name,
            object_key: key.into(),
            size_bytes,
            content_type,
            public_url,
        })
    }

    /// Upload several files into `folder`, one after another in input order.
    ///
    /// A failed upload does not stop the rest; the result has one outcome per input
    /// path, in the same order.
    pub async fn upload_many<I, P>(
        &self,
        local_paths: I,
        folder: Option<&str>,
    ) -> Vec<UploadOutcome>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut outcomes = Vec::new();
        for path in local_paths {
            outcomes.push(self.upload(path, None, folder, false).await);
        }

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        tracing::info!(
            bucket = %self.config.bucket,
            total = outcomes.len(),
            failed = failed,
            "Batch upload finished"
        );

        outcomes
    }

    /// List at most `limit` entries directly under `folder` (`""` for the bucket
    /// root). An empty folder is an empty list; a backend failure is an error.
    pub async fn list(&self, folder: &str, limit: usize) -> StoreResult<Vec<ListedObject>> {
        let prefix = ObjectKey::normalize_prefix(folder)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let bucket = self.config.bucket.as_str();
        let result = self
            .call("list", true, || self.backend.list(bucket, &prefix, limit))
            .await;

        match result {
            Ok(mut objects) => {
                objects.truncate(limit);
                tracing::info!(
                    bucket = %bucket,
                    prefix = %prefix,
                    count = objects.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Listing successful"
                );
                Ok(objects)
            }
            Err(e) => {
                tracing::error!(error = %e, bucket = %bucket, prefix = %prefix, "Listing failed");
                Err(e)
            }
        }
    }

    /// Download an object to `local_path`, creating missing parent directories.
    /// Returns the number of bytes written.
    pub async fn download(
        &self,
        remote_key: &str,
        local_path: impl AsRef<Path>,
    ) -> StoreResult<u64> {
        let local_path = local_path.as_ref();
        let start = Instant::now();

        let result = self.download_to(remote_key, local_path).await;

        match &result {
            Ok(size) => tracing::info!(
                bucket = %self.config.bucket,
                key = %remote_key,
                path = %local_path.display(),
                size_bytes = *size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Download successful"
            ),
            Err(e) => tracing::error!(
                error = %e,
                bucket = %self.config.bucket,
                key = %remote_key,
                "Download failed"
            ),
        }

        result
    }

    async fn download_to(&self, remote_key: &str, local_path: &Path) -> StoreResult<u64> {
        let key = ObjectKey::parse(remote_key)?;
        let bucket = self.config.bucket.as_str();

        let data = self
            .call("download", true, || self.backend.download(bucket, &key))
            .await?;

        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(local_path, &data).await?;

        Ok(data.len() as u64)
    }

    /// Delete an object.
    pub async fn delete(&self, remote_key: &str) -> StoreResult<()> {
        let key = ObjectKey::parse(remote_key)?;
        let bucket = self.config.bucket.as_str();

        let result = self
            .call("delete", true, || self.backend.remove(bucket, &key))
            .await;

        match &result {
            Ok(()) => tracing::info!(bucket = %bucket, key = %key, "Delete successful"),
            Err(e) => tracing::error!(error = %e, bucket = %bucket, key = %key, "Delete failed"),
        }
        result
    }

    /// Move an object to another key in the same bucket.
    pub async fn move_object(&self, from_key: &str, to_key: &str) -> StoreResult<()> {
        let from = ObjectKey::parse(from_key)?;
        let to = ObjectKey::parse(to_key)?;
        let bucket = self.config.bucket.as_str();

        let result = self
            .call("move", false, || self.backend.move_object(bucket, &from, &to))
            .await;

        match &result {
            Ok(()) => tracing::info!(
                bucket = %bucket,
                from_key = %from,
                to_key = %to,
                "Move successful"
            ),
            Err(e) => tracing::error!(
                error = %e,
                bucket = %bucket,
                from_key = %from,
                to_key = %to,
                "Move failed"
            ),
        }
        result
    }

    /// Public URL of `remote_key`. Pure: no network access, no existence check.
    pub fn public_url(&self, remote_key: &str) -> String {
        let key = ObjectKey::parse(remote_key)
            .map(String::from)
            .unwrap_or_else(|_| remote_key.trim_start_matches('/').to_string());
        self.backend.public_url(&self.config.bucket, &key)
    }

    /// Time-limited URL granting read access to `remote_key`.
    pub async fn signed_url(&self, remote_key: &str, expires_in: Duration) -> StoreResult<String> {
        let key = ObjectKey::parse(remote_key)?;
        let bucket = self.config.bucket.as_str();

        let result = self
            .call("signed_url", true, || self.backend.signed_url(bucket, &key, expires_in))
            .await;

        match &result {
            Ok(_) => tracing::debug!(
                bucket = %bucket,
                key = %key,
                expires_in_secs = expires_in.as_secs(),
                "Signed URL created"
            ),
            Err(e) => {
                tracing::error!(error = %e, bucket = %bucket, key = %key, "Signed URL failed")
            }
        }
        result
    }

    /// Create a bucket on the backend. This is an administrative call and does not
    /// change the bucket this client operates on.
    pub async fn create_bucket(&self, name: &str, public: bool) -> StoreResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Configuration(
                "bucket name must not be empty".to_string(),
            ));
        }

        let result = self
            .call("create_bucket", false, || self.backend.create_bucket(name, public))
            .await;

        match &result {
            Ok(()) => tracing::info!(bucket = %name, public = public, "Bucket created"),
            Err(e) => tracing::error!(error = %e, bucket = %name, "Bucket creation failed"),
        }
        result
    }

    /// Run one backend call under the configured timeout. Only `idempotent` calls
    /// are retried: create-only uploads, moves and bucket creation run once.
    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        idempotent: bool,
        call: F,
    ) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let config = &self.config;
        run_with_policy(operation, config.retry, config.timeout, idempotent, call).await
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use stowage_core::{BackendConfig, BackendErrorKind};
    use tempfile::{tempdir, TempDir};

    const BASE_URL: &str = "http://localhost:8080/files";

    async fn local_client(root: &TempDir) -> ObjectStoreClient {
        let config = ClientConfig::new(
            BackendConfig::Local {
                root: root.path().join("store").to_string_lossy().into_owned(),
                base_url: BASE_URL.to_string(),
                signing_secret: "secret".to_string(),
            },
            "videos",
        );
        let client = ObjectStoreClient::new(config).await.unwrap();
        client.create_bucket("videos", true).await.unwrap();
        client
    }

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn empty_bucket_name_fails_construction() {
        let config = ClientConfig::new(
            BackendConfig::Local {
                root: "/tmp/unused".to_string(),
                base_url: BASE_URL.to_string(),
                signing_secret: "secret".to_string(),
            },
            "",
        );
        assert!(matches!(
            ObjectStoreClient::new(config).await,
            Err(StoreError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let root = tempdir().unwrap();
        let client = local_client(&root).await;
        let source = write_file(root.path(), "clip.mp4", b"frame data");

        let uploaded = client
            .upload(&source, None, Some("uploads3"), false)
            .await
            .unwrap();
        assert_eq!(uploaded.file_name, "clip.mp4");
        assert_eq!(uploaded.object_key, "uploads3/clip.mp4");
        assert_eq!(uploaded.size_bytes, 10);
        assert_eq!(uploaded.content_type, "video/mp4");
        assert_eq!(uploaded.public_url, format!("{}/videos/uploads3/clip.mp4", BASE_URL));

        let target = root.path().join("downloads/nested/clip.mp4");
        let written = client.download("uploads3/clip.mp4", &target).await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&target).unwrap(), b"frame data");
    }

    #[tokio::test]
    async fn overwrite_flag_controls_replacement() {
        let root = tempdir().unwrap();
        let client = local_client(&root).await;
        let source = write_file(root.path(), "clip.mp4", b"v1");

        client.upload(&source, None, None, false).await.unwrap();
        let err = client.upload(&source, None, None, false).await.unwrap_err();
        assert_eq!(err.kind(), Some(BackendErrorKind::Conflict));

        std::fs::write(&source, b"v2").unwrap();
        client.upload(&source, None, None, true).await.unwrap();

        let target = root.path().join("out.mp4");
        client.download("clip.mp4", &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn list_distinguishes_empty_from_failure() {
        let root = tempdir().unwrap();
        let client = local_client(&root).await;

        assert!(client.list("emptyfolder", DEFAULT_LIST_LIMIT).await.unwrap().is_empty());

        let config = ClientConfig::new(client.config().backend.clone(), "no-such-bucket");
        let missing = ObjectStoreClient::with_backend(config, client.backend().clone()).unwrap();
        let err = missing.list("", DEFAULT_LIST_LIMIT).await.unwrap_err();
        assert_eq!(err.kind(), Some(BackendErrorKind::NotFound));
    }

    #[tokio::test]
    async fn delete_and_move() {
        let root = tempdir().unwrap();
        let client = local_client(&root).await;
        let source = write_file(root.path(), "clip.mp4", b"data");
        client.upload(&source, None, Some("uploads"), false).await.unwrap();

        client
            .move_object("uploads/clip.mp4", "archive/clip.mp4")
            .await
            .unwrap();
        let names: Vec<String> = client
            .list("archive", DEFAULT_LIST_LIMIT)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["clip.mp4".to_string()]);

        client.delete("archive/clip.mp4").await.unwrap();
        assert!(client.list("archive", DEFAULT_LIST_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_of_missing_object_fails() {
        let root = tempdir().unwrap();
        let client = local_client(&root).await;

        let target = root.path().join("missing.mp4");
        let err = client.download("missing.mp4", &target).await.unwrap_err();
        assert_eq!(err.kind(), Some(BackendErrorKind::NotFound));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn invalid_remote_keys_are_rejected() {
        let root = tempdir().unwrap();
        let client = local_client(&root).await;

        assert!(matches!(
            client.delete("../outside.mp4").await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            client.signed_url("", DEFAULT_SIGNED_URL_TTL).await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn create_bucket_requires_a_name() {
        let root = tempdir().unwrap();
        let client = local_client(&root).await;

        assert!(matches!(
            client.create_bucket("  ", true).await,
            Err(StoreError::Configuration(_))
        ));
    }
}
