use crate::keys::encode_key_path;
use crate::traits::Storage;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use stowage_core::{BackendErrorKind, ListedObject, ObjectKey, StoreError, StoreResult};

/// Supabase Storage implementation over its REST API
/// Limit on establishing a connection; the whole request is only bounded when a
/// timeout is configured
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    name: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "statusCode", default)]
    status_code: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SupabaseStorage {
    /// Create a new SupabaseStorage instance
    ///
    /// # Arguments
    /// * `url` - Project URL (e.g., "https://abcd.supabase.co")
    /// * `api_key` - Service or anon key, sent as both `apikey` and bearer token
    /// * `timeout` - Optional total request timeout
    pub fn new(url: &str, api_key: &str, timeout: Option<Duration>) -> StoreResult<Self> {
        if url.trim().is_empty() || api_key.trim().is_empty() {
            return Err(StoreError::Configuration(
                "Supabase URL and key must be set".to_string(),
            ));
        }

        let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            StoreError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(SupabaseStorage {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1{}", self.base_url, path)
    }

    /// `{bucket}/{key}` with every segment percent-encoded
    fn object_path(bucket: &str, key: &str) -> String {
        let mut path = urlencoding::encode(bucket).into_owned();
        let key = encode_key_path(key);
        if !key.is_empty() {
            path.push('/');
            path.push_str(&key);
        }
        path
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.api_key.as_str())
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status.as_u16(), &body))
    }
}

fn map_transport_error(e: reqwest::Error) -> StoreError {
    let kind = if e.is_timeout() {
        BackendErrorKind::Timeout
    } else if e.is_decode() {
        BackendErrorKind::Other
    } else {
        BackendErrorKind::Transport
    };
    StoreError::backend(kind, e.to_string())
}

/// Storage API errors sometimes arrive as HTTP 400 with the real status in the
/// `statusCode` field of the body, so that field wins when present.
fn error_from_response(status: u16, body: &str) -> StoreError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();

    let effective_status = parsed
        .as_ref()
        .and_then(|b| b.status_code.as_ref())
        .and_then(|code| match code {
            Value::String(s) => s.parse::<u16>().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            _ => None,
        })
        .unwrap_or(status);

    let message = parsed
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body.to_string()
            }
        });

    StoreError::backend(
        BackendErrorKind::from_status(effective_status),
        format!("HTTP {}: {}", status, message),
    )
}

fn listed_object(file: FileObject) -> ListedObject {
    let size = file
        .metadata
        .as_ref()
        .and_then(|m| m.get("size"))
        .and_then(Value::as_u64);

    ListedObject {
        name: file.name,
        size,
        last_modified: file.updated_at.or(file.created_at),
        metadata: file.metadata.filter(|m| !m.is_null()),
    }
}

#[async_trait]
impl Storage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> StoreResult<()> {
        let url = self.storage_url(&format!("/object/{}", Self::object_path(bucket, key.as_str())));
        let request = self
            .client
            .post(&url)
            .header("content-type", content_type)
            .header("cache-control", "max-age=3600")
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(data);

        self.send(request).await?;
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<ListedObject>> {
        let url = self.storage_url(&format!("/object/list/{}", urlencoding::encode(bucket)));
        let body = json!({
            "prefix": prefix,
            "limit": limit,
            "offset": 0,
            "sortBy": { "column": "name", "order": "asc" },
        });

        let response = self.send(self.client.post(&url).json(&body)).await?;
        let files: Vec<FileObject> = response.json().await.map_err(|e| {
            StoreError::backend(
                BackendErrorKind::Other,
                format!("Failed to parse listing: {}", e),
            )
        })?;

        Ok(files.into_iter().map(listed_object).collect())
    }

    async fn download(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes> {
        let url = self.storage_url(&format!("/object/{}", Self::object_path(bucket, key.as_str())));
        let response = self.send(self.client.get(&url)).await?;
        response.bytes().await.map_err(map_transport_error)
    }

    async fn remove(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()> {
        let url = self.storage_url(&format!("/object/{}", urlencoding::encode(bucket)));
        let body = json!({ "prefixes": [key.as_str()] });

        self.send(self.client.delete(&url).json(&body)).await?;
        Ok(())
    }

    async fn move_object(
        &self,
        bucket: &str,
        from: &ObjectKey,
        to: &ObjectKey,
    ) -> StoreResult<()> {
        let url = self.storage_url("/object/move");
        let body = json!({
            "bucketId": bucket,
            "sourceKey": from.as_str(),
            "destinationKey": to.as_str(),
        });

        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.storage_url(&format!("/object/public/{}", Self::object_path(bucket, key)))
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let url = self.storage_url(&format!(
            "/object/sign/{}",
            Self::object_path(bucket, key.as_str())
        ));
        // The API rejects a zero lifetime
        let body = json!({ "expiresIn": expires_in.as_secs().max(1) });

        let response = self.send(self.client.post(&url).json(&body)).await?;
        let signed: SignedUrlResponse = response.json().await.map_err(|e| {
            StoreError::backend(
                BackendErrorKind::Other,
                format!("Failed to parse signed URL response: {}", e),
            )
        })?;

        if signed.signed_url.starts_with("http://") || signed.signed_url.starts_with("https://") {
            Ok(signed.signed_url)
        } else {
            Ok(self.storage_url(&signed.signed_url))
        }
    }

    async fn create_bucket(&self, name: &str, public: bool) -> StoreResult<()> {
        let url = self.storage_url("/bucket");
        let body = json!({ "id": name, "name": name, "public": public });

        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Supabase
    }
}
