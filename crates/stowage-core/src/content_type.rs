//! Content-type inference from file names.

use std::path::Path;

/// Fallback used when the extension does not identify a MIME type.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Guess the MIME type from the file extension, or return `fallback`.
pub fn infer_content_type(path: impl AsRef<Path>, fallback: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}
