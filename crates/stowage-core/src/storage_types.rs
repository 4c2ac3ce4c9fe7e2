use crate::error::StoreError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend types
///
/// Selects which backend implementation a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Supabase,
    Local,
    S3,
}

impl FromStr for StorageBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(StoreError::Configuration(format!(
                "Invalid storage backend: {}",
                s
            ))),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Supabase => write!(f, "supabase"),
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}
