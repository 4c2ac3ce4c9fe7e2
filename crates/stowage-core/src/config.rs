//! Configuration module
//!
//! [`ClientConfig`] is built explicitly by the caller (or parsed from environment-style
//! key/value pairs) and handed to the client constructor. Nothing is read at import
//! time, so tests can build configurations in memory.

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::content_type::DEFAULT_CONTENT_TYPE;
use crate::error::{StoreError, StoreResult};
use crate::storage_types::StorageBackend;

const DEFAULT_BUCKET: &str = "videos";
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

/// Backend selection plus the opaque credentials it needs.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Supabase Storage REST API
    Supabase { url: String, api_key: String },
    /// Buckets as directories under `root`, served from `base_url`
    Local {
        root: String,
        base_url: String,
        signing_secret: String,
    },
    /// S3 or an S3-compatible provider; credentials come from the AWS environment
    S3 {
        region: String,
        endpoint: Option<String>,
    },
}

impl BackendConfig {
    pub fn backend_type(&self) -> StorageBackend {
        match self {
            BackendConfig::Supabase { .. } => StorageBackend::Supabase,
            BackendConfig::Local { .. } => StorageBackend::Local,
            BackendConfig::S3 { .. } => StorageBackend::S3,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        match self {
            BackendConfig::Supabase { url, api_key } => {
                require("SUPABASE_URL", url)?;
                require("SUPABASE_KEY", api_key)?;
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(StoreError::Configuration(format!(
                        "SUPABASE_URL must be an http(s) URL, got '{}'",
                        url
                    )));
                }
            }
            BackendConfig::Local {
                root,
                base_url,
                signing_secret,
            } => {
                require("LOCAL_STORAGE_PATH", root)?;
                require("LOCAL_STORAGE_BASE_URL", base_url)?;
                require("LOCAL_STORAGE_SIGNING_SECRET", signing_secret)?;
            }
            BackendConfig::S3 { region, .. } => {
                require("S3_REGION", region)?;
            }
        }
        Ok(())
    }
}

// Secrets stay out of logs.
impl Debug for BackendConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BackendConfig::Supabase { url, .. } => f
                .debug_struct("Supabase")
                .field("url", url)
                .field("api_key", &"<redacted>")
                .finish(),
            BackendConfig::Local { root, base_url, .. } => f
                .debug_struct("Local")
                .field("root", root)
                .field("base_url", base_url)
                .field("signing_secret", &"<redacted>")
                .finish(),
            BackendConfig::S3 { region, endpoint } => f
                .debug_struct("S3")
                .field("region", region)
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

/// Retry behaviour for backend calls. The default performs no retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }

    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_delay,
        }
    }

    /// Delay before the given retry attempt (1-based), growing linearly.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Client configuration. Immutable once handed to the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    pub bucket: String,
    /// Used when the file extension does not identify a content type
    pub default_content_type: String,
    /// Per-call limit on backend operations; `None` (the default) disables it
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(backend: BackendConfig, bucket: impl Into<String>) -> Self {
        ClientConfig {
            backend,
            bucket: bucket.into(),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            timeout: None,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load configuration from process environment variables, after loading a
    /// `.env` file from the working directory if one exists.
    pub fn from_env() -> StoreResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from any key/value source using the environment variable
    /// names. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let backend_type = match get("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Supabase,
        };

        let backend = match backend_type {
            StorageBackend::Supabase => BackendConfig::Supabase {
                url: get("SUPABASE_URL").unwrap_or_default(),
                api_key: get("SUPABASE_KEY").unwrap_or_default(),
            },
            StorageBackend::Local => BackendConfig::Local {
                root: get("LOCAL_STORAGE_PATH").unwrap_or_default(),
                base_url: get("LOCAL_STORAGE_BASE_URL").unwrap_or_default(),
                signing_secret: get("LOCAL_STORAGE_SIGNING_SECRET").unwrap_or_default(),
            },
            StorageBackend::S3 => BackendConfig::S3 {
                region: get("S3_REGION")
                    .or_else(|| get("AWS_REGION"))
                    .unwrap_or_default(),
                endpoint: get("S3_ENDPOINT"),
            },
        };

        let bucket = get("BUCKET_NAME").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let mut config = ClientConfig::new(backend, bucket);

        if let Some(content_type) = get("STORAGE_DEFAULT_CONTENT_TYPE") {
            config.default_content_type = content_type;
        }

        if let Some(secs) = get("STORAGE_TIMEOUT_SECS") {
            let secs: u64 = parse_number("STORAGE_TIMEOUT_SECS", &secs)?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(retries) = get("STORAGE_MAX_RETRIES") {
            config.retry.max_retries = parse_number("STORAGE_MAX_RETRIES", &retries)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        self.backend.validate()?;
        require("BUCKET_NAME", &self.bucket)?;
        if self.bucket.contains('/') {
            return Err(StoreError::Configuration(format!(
                "BUCKET_NAME must not contain '/', got '{}'",
                self.bucket
            )));
        }
        require("default content type", &self.default_content_type)?;
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(StoreError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn require(name: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Configuration(format!("{} must be set", name)));
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> StoreResult<T> {
    value.trim().parse().map_err(|_| {
        StoreError::Configuration(format!(
            "{} must be a non-negative integer, got '{}'",
            name, value
        ))
    })
}
