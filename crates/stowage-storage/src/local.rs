use crate::keys::encode_key_path;
use crate::traits::Storage;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use stowage_core::{
    infer_content_type, BackendErrorKind, ListedObject, ObjectKey, StoreError, StoreResult,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Name prefix of in-progress uploads; such files are never listed
const PARTIAL_PREFIX: &str = ".stowage-upload-";

static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// An upload being written beside its target. Removed on drop unless it was
/// renamed into place, so failed or cancelled uploads leave nothing behind.
struct PartialFile {
    path: PathBuf,
}

impl PartialFile {
    fn beside(target: &Path) -> Self {
        let seq = UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}{}-{}.part", PARTIAL_PREFIX, std::process::id(), seq);
        PartialFile {
            path: target.with_file_name(name),
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Local filesystem storage implementation
///
/// Each bucket is a directory under `base_path`; objects are files at
/// `{base_path}/{bucket}/{key}`. Files are expected to be served from `base_url`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    signing_secret: Vec<u8>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for buckets (e.g., "/var/lib/stowage")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:8080/files")
    /// * `signing_secret` - HMAC key for signed URLs
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        signing_secret: &str,
    ) -> StoreResult<Self> {
        let base_path = base_path.into();

        if signing_secret.is_empty() {
            return Err(StoreError::Configuration(
                "Local storage signing secret must be set".to_string(),
            ));
        }

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::Configuration(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
            signing_secret: signing_secret.as_bytes().to_vec(),
        })
    }

    fn bucket_path(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty()
            || bucket == "."
            || bucket == ".."
            || bucket.contains('/')
            || bucket.contains('\\')
        {
            return Err(StoreError::InvalidKey(format!(
                "Invalid bucket name: {}",
                bucket
            )));
        }
        Ok(self.base_path.join(bucket))
    }

    /// Directory of an existing bucket
    async fn existing_bucket(&self, bucket: &str) -> StoreResult<PathBuf> {
        let path = self.bucket_path(bucket)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::backend(
                BackendErrorKind::NotFound,
                format!("Bucket not found: {}", bucket),
            ));
        }
        Ok(path)
    }

    /// Convert an object key to a filesystem path inside the bucket.
    ///
    /// `ObjectKey` already rules out `..` segments; the key must additionally not
    /// contain backslashes, which some platforms treat as separators.
    fn key_to_path(bucket_path: &Path, key: &str) -> StoreResult<PathBuf> {
        if key.contains('\\') {
            return Err(StoreError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(bucket_path.join(key))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(e, &parent.display().to_string()))?;
        }
        Ok(())
    }

    fn signature(&self, bucket: &str, key: &str, expires_at: i64) -> StoreResult<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.signing_secret)
            .map_err(|e| StoreError::Configuration(format!("Invalid signing secret: {}", e)))?;
        mac.update(format!("{}/{}:{}", bucket, key, expires_at).as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Check a token produced by `signed_url` for `bucket`/`key` that expires at
    /// `expires_at` (unix seconds). Expired or tampered tokens are rejected.
    pub fn verify_signature(&self, bucket: &str, key: &str, expires_at: i64, token: &str) -> bool {
        if Utc::now().timestamp() > expires_at {
            return false;
        }
        let Ok(provided) = hex::decode(token) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&self.signing_secret) else {
            return false;
        };
        mac.update(format!("{}/{}:{}", bucket, key, expires_at).as_bytes());
        mac.verify_slice(&provided).is_ok()
    }
}

fn map_io_error(e: std::io::Error, context: &str) -> StoreError {
    let kind = match e.kind() {
        ErrorKind::NotFound => BackendErrorKind::NotFound,
        ErrorKind::AlreadyExists => BackendErrorKind::Conflict,
        ErrorKind::PermissionDenied => BackendErrorKind::Unauthorized,
        _ => BackendErrorKind::Other,
    };
    StoreError::backend(kind, format!("{}: {}", context, e))
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        data: Bytes,
        _content_type: &str,
        upsert: bool,
    ) -> StoreResult<()> {
        let bucket_path = self.existing_bucket(bucket).await?;
        let path = Self::key_to_path(&bucket_path, key.as_str())?;

        let conflict = || {
            StoreError::backend(
                BackendErrorKind::Conflict,
                format!("Object already exists: {}/{}", bucket, key),
            )
        };

        if !upsert && fs::try_exists(&path).await.unwrap_or(false) {
            return Err(conflict());
        }

        self.ensure_parent_dir(&path).await?;

        // The target only ever appears complete: write beside it, then move it in.
        let partial = PartialFile::beside(&path);
        let mut file = fs::File::create(&partial.path).await.map_err(|e| {
            map_io_error(e, &format!("Failed to create file {}", partial.path.display()))
        })?;

        file.write_all(&data)
            .await
            .map_err(|e| map_io_error(e, &format!("Failed to write file {}", path.display())))?;

        file.sync_all()
            .await
            .map_err(|e| map_io_error(e, &format!("Failed to sync file {}", path.display())))?;
        drop(file);

        if upsert {
            fs::rename(&partial.path, &path).await.map_err(|e| {
                map_io_error(e, &format!("Failed to replace file {}", path.display()))
            })?;
        } else {
            // Linking fails when the key appeared in the meantime.
            fs::hard_link(&partial.path, &path).await.map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    conflict()
                } else {
                    map_io_error(e, &format!("Failed to create file {}", path.display()))
                }
            })?;
        }

        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<ListedObject>> {
        let bucket_path = self.existing_bucket(bucket).await?;
        let dir = if prefix.is_empty() {
            bucket_path
        } else {
            Self::key_to_path(&bucket_path, prefix)?
        };

        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| map_io_error(e, &format!("Failed to read {}", dir.display())))?;

        let mut objects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| map_io_error(e, &format!("Failed to read {}", dir.display())))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(PARTIAL_PREFIX) {
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| map_io_error(e, &format!("Failed to stat {}", name)))?;

            if meta.is_dir() {
                objects.push(ListedObject {
                    name,
                    size: None,
                    last_modified: None,
                    metadata: None,
                });
                continue;
            }

            let last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
            let metadata = serde_json::json!({
                "size": meta.len(),
                "mimetype": infer_content_type(&name, "application/octet-stream"),
            });
            objects.push(ListedObject {
                name,
                size: Some(meta.len()),
                last_modified,
                metadata: Some(metadata),
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        objects.truncate(limit);
        Ok(objects)
    }

    async fn download(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes> {
        let bucket_path = self.existing_bucket(bucket).await?;
        let path = Self::key_to_path(&bucket_path, key.as_str())?;

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::backend(
                    BackendErrorKind::NotFound,
                    format!("Object not found: {}/{}", bucket, key),
                )
            } else {
                map_io_error(e, &format!("Failed to read file {}", path.display()))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn remove(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()> {
        let bucket_path = self.existing_bucket(bucket).await?;
        let path = Self::key_to_path(&bucket_path, key.as_str())?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path)
            .await
            .map_err(|e| map_io_error(e, &format!("Failed to delete file {}", path.display())))
    }

    async fn move_object(
        &self,
        bucket: &str,
        from: &ObjectKey,
        to: &ObjectKey,
    ) -> StoreResult<()> {
        let bucket_path = self.existing_bucket(bucket).await?;
        let from_path = Self::key_to_path(&bucket_path, from.as_str())?;
        let to_path = Self::key_to_path(&bucket_path, to.as_str())?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StoreError::backend(
                BackendErrorKind::NotFound,
                format!("Object not found: {}/{}", bucket, from),
            ));
        }
        if fs::try_exists(&to_path).await.unwrap_or(false) {
            return Err(StoreError::backend(
                BackendErrorKind::Conflict,
                format!("Object already exists: {}/{}", bucket, to),
            ));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::rename(&from_path, &to_path).await.map_err(|e| {
            map_io_error(
                e,
                &format!(
                    "Failed to move {} to {}",
                    from_path.display(),
                    to_path.display()
                ),
            )
        })
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_key_path(key)
        )
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let bucket_path = self.existing_bucket(bucket).await?;
        let path = Self::key_to_path(&bucket_path, key.as_str())?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::backend(
                BackendErrorKind::NotFound,
                format!("Object not found: {}/{}", bucket, key),
            ));
        }

        let lifetime = i64::try_from(expires_in.as_secs().max(1)).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(lifetime);
        let token = hex::encode(self.signature(bucket, key.as_str(), expires_at)?);

        Ok(format!(
            "{}?expires={}&token={}",
            self.public_url(bucket, key.as_str()),
            expires_at,
            token
        ))
    }

    async fn create_bucket(&self, name: &str, public: bool) -> StoreResult<()> {
        let path = self.bucket_path(name)?;

        fs::create_dir(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StoreError::backend(
                    BackendErrorKind::Conflict,
                    format!("Bucket already exists: {}", name),
                )
            } else {
                map_io_error(e, &format!("Failed to create bucket {}", path.display()))
            }
        })?;

        tracing::debug!(bucket = %name, public = public, "Local bucket directory created");
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
