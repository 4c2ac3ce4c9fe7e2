use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Description of a successfully uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    /// Base name of the local source file
    pub file_name: String,
    pub object_key: String,
    pub size_bytes: u64,
    pub content_type: String,
    /// Public URL of the object; not checked for accessibility
    pub public_url: String,
}

/// Result of one upload: the uploaded object or the reason it failed.
pub type UploadOutcome = StoreResult<UploadedObject>;

/// An entry returned by a listing, as reported by the backend.
///
/// Folder placeholders have neither size nor metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedObject {
    pub name: String,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
}

impl ListedObject {
    pub fn is_folder(&self) -> bool {
        self.size.is_none() && self.metadata.is_none()
    }
}
