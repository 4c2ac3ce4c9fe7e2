//! Object key normalization and derivation.
//!
//! Key format: non-empty segments joined by `/`, no leading or trailing slash, no
//! `.` or `..` segments.

use crate::error::{StoreError, StoreResult};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A normalized remote object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Normalize a raw key. Repeated, leading and trailing slashes are collapsed.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments = Self::segments_of(raw)?;
        if segments.is_empty() {
            return Err(StoreError::InvalidKey(format!(
                "'{}' does not contain any path segment",
                raw
            )));
        }
        Ok(ObjectKey(segments.join("/")))
    }

    /// Derive the destination key for an uploaded file.
    ///
    /// An explicit destination wins and the folder is ignored. Otherwise the key is
    /// `{folder}/{file_name}` when the folder is non-empty, else `{file_name}`.
    pub fn derive(
        file_name: &str,
        explicit: Option<&str>,
        folder: Option<&str>,
    ) -> StoreResult<Self> {
        if let Some(explicit) = explicit {
            return Self::parse(explicit);
        }

        let folder = match folder {
            Some(folder) => Self::normalize_prefix(folder)?,
            None => String::new(),
        };

        if folder.is_empty() {
            Self::parse(file_name)
        } else {
            Self::parse(&format!("{}/{}", folder, file_name))
        }
    }

    /// Normalize a folder prefix for listing. The empty string means the bucket root.
    pub fn normalize_prefix(folder: &str) -> StoreResult<String> {
        Ok(Self::segments_of(folder)?.join("/"))
    }

    fn segments_of(raw: &str) -> StoreResult<Vec<&str>> {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(bad) = segments.iter().find(|s| **s == "." || **s == "..") {
            return Err(StoreError::InvalidKey(format!(
                "'{}' contains a '{}' segment",
                raw, bad
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(StoreError::InvalidKey(format!(
                "'{}' contains control characters",
                raw.escape_default()
            )));
        }

        Ok(segments)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the last segment, empty at the bucket root.
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}
