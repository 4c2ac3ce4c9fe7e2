use crate::traits::Storage;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::time::Duration;
use stowage_core::{BackendErrorKind, ListedObject, ObjectKey, StoreError, StoreResult};

/// S3 storage implementation
///
/// An `AmazonS3` store is bound to one bucket, so calls naming any other bucket
/// are rejected.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> StoreResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::Configuration(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
        })
    }

    fn check_bucket(&self, bucket: &str) -> StoreResult<()> {
        if bucket != self.bucket {
            return Err(StoreError::backend(
                BackendErrorKind::Unsupported,
                format!(
                    "S3 store is bound to bucket '{}', not '{}'",
                    self.bucket, bucket
                ),
            ));
        }
        Ok(())
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style: {endpoint}/{bucket}/{key}
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
        } else {
            format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key)
        }
    }
}

fn map_object_store_error(e: ObjectStoreError) -> StoreError {
    let kind = match &e {
        ObjectStoreError::NotFound { .. } => BackendErrorKind::NotFound,
        ObjectStoreError::AlreadyExists { .. } | ObjectStoreError::Precondition { .. } => {
            BackendErrorKind::Conflict
        }
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            BackendErrorKind::Unauthorized
        }
        ObjectStoreError::NotSupported { .. } => BackendErrorKind::Unsupported,
        _ => BackendErrorKind::Other,
    };
    StoreError::backend(kind, e.to_string())
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> StoreResult<()> {
        self.check_bucket(bucket)?;
        let location = Path::from(key.as_str());

        let mode = if upsert {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };
        let mut options = PutOptions::from(mode);
        options
            .attributes
            .insert(Attribute::ContentType, content_type.to_string().into());

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await;

        result.map_err(map_object_store_error)?;
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<ListedObject>> {
        self.check_bucket(bucket)?;
        let prefix_path = (!prefix.is_empty()).then(|| Path::from(prefix));

        let listing = self
            .store
            .list_with_delimiter(prefix_path.as_ref())
            .await
            .map_err(map_object_store_error)?;

        let folders = listing.common_prefixes.iter().map(|p| ListedObject {
            name: p.filename().unwrap_or_default().to_string(),
            size: None,
            last_modified: None,
            metadata: None,
        });

        let files = listing.objects.iter().map(|meta| ListedObject {
            name: meta.location.filename().unwrap_or_default().to_string(),
            size: Some(meta.size as u64),
            last_modified: Some(meta.last_modified),
            metadata: Some(serde_json::json!({
                "size": meta.size as u64,
                "eTag": meta.e_tag,
            })),
        });

        Ok(folders.chain(files).take(limit).collect())
    }

    async fn download(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes> {
        self.check_bucket(bucket)?;
        let location = Path::from(key.as_str());

        let result = self
            .store
            .get(&location)
            .await
            .map_err(map_object_store_error)?;

        result.bytes().await.map_err(map_object_store_error)
    }

    async fn remove(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()> {
        self.check_bucket(bucket)?;
        let location = Path::from(key.as_str());

        self.store
            .delete(&location)
            .await
            .map_err(map_object_store_error)
    }

    async fn move_object(
        &self,
        bucket: &str,
        from: &ObjectKey,
        to: &ObjectKey,
    ) -> StoreResult<()> {
        self.check_bucket(bucket)?;
        let from = Path::from(from.as_str());
        let to = Path::from(to.as_str());

        self.store
            .rename(&from, &to)
            .await
            .map_err(map_object_store_error)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.generate_url(bucket, key.trim_start_matches('/'))
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> StoreResult<String> {
        self.check_bucket(bucket)?;
        let location = Path::from(key.as_str());

        let url = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(map_object_store_error)?;

        Ok(url.to_string())
    }

    async fn create_bucket(&self, name: &str, _public: bool) -> StoreResult<()> {
        Err(StoreError::backend(
            BackendErrorKind::Unsupported,
            format!("Creating bucket '{}' is not supported by the S3 backend", name),
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(endpoint: Option<&str>) -> S3Storage {
        S3Storage::new(
            "videos".to_string(),
            "eu-west-1".to_string(),
            endpoint.map(String::from),
        )
        .unwrap()
    }

    #[test]
    fn aws_public_url_uses_virtual_host_style() {
        assert_eq!(
            storage(None).public_url("videos", "uploads/clip.mp4"),
            "https://videos.s3.eu-west-1.amazonaws.com/uploads/clip.mp4"
        );
    }

    #[test]
    fn custom_endpoint_uses_path_style() {
        assert_eq!(
            storage(Some("http://localhost:9000/")).public_url("videos", "clip.mp4"),
            "http://localhost:9000/videos/clip.mp4"
        );
    }

    #[tokio::test]
    async fn other_buckets_are_rejected() {
        let err = storage(None)
            .download("other", &ObjectKey::parse("clip.mp4").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(BackendErrorKind::Unsupported));
    }

    #[tokio::test]
    async fn bucket_creation_is_unsupported() {
        let err = storage(None).create_bucket("clips", true).await.unwrap_err();
        assert_eq!(err.kind(), Some(BackendErrorKind::Unsupported));
    }
}
