#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
#[cfg(feature = "storage-supabase")]
use crate::SupabaseStorage;
#[cfg(not(all(
    feature = "storage-supabase",
    feature = "storage-local",
    feature = "storage-s3"
)))]
use crate::StoreError;
use crate::{Storage, StoreResult};
use std::sync::Arc;
use stowage_core::{BackendConfig, ClientConfig};

/// Create a storage backend based on configuration
pub async fn create_storage(config: &ClientConfig) -> StoreResult<Arc<dyn Storage>> {
    config.backend.validate()?;

    match &config.backend {
        #[cfg(feature = "storage-supabase")]
        BackendConfig::Supabase { url, api_key } => {
            let storage = SupabaseStorage::new(url, api_key, config.timeout)?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-supabase"))]
        BackendConfig::Supabase { .. } => Err(StoreError::Configuration(
            "Supabase storage backend not available (storage-supabase feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-local")]
        BackendConfig::Local {
            root,
            base_url,
            signing_secret,
        } => {
            let storage = LocalStorage::new(root, base_url.clone(), signing_secret).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        BackendConfig::Local { .. } => Err(StoreError::Configuration(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        BackendConfig::S3 { region, endpoint } => {
            let storage = S3Storage::new(config.bucket.clone(), region.clone(), endpoint.clone())?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        BackendConfig::S3 { .. } => Err(StoreError::Configuration(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    #[cfg(any(feature = "storage-local", feature = "storage-supabase"))]
    use crate::StorageBackend;

    #[cfg(feature = "storage-local")]
    #[tokio::test]
    async fn creates_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new(
            BackendConfig::Local {
                root: dir.path().to_string_lossy().into_owned(),
                base_url: "http://localhost:8080/files".to_string(),
                signing_secret: "secret".to_string(),
            },
            "videos",
        );

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[cfg(feature = "storage-supabase")]
    #[tokio::test]
    async fn creates_supabase_backend() {
        let config = ClientConfig::new(
            BackendConfig::Supabase {
                url: "https://project.supabase.co".to_string(),
                api_key: "key".to_string(),
            },
            "videos",
        );

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Supabase);
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let config = ClientConfig::new(
            BackendConfig::Supabase {
                url: "https://project.supabase.co".to_string(),
                api_key: String::new(),
            },
            "videos",
        );

        assert!(matches!(
            create_storage(&config).await,
            Err(StoreError::Configuration(_))
        ));
    }
}
