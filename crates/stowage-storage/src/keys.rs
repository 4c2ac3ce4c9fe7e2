//! Object key helpers shared by the URL-producing backends.

/// Percent-encode every `/`-separated segment of `key`, dropping empty segments.
pub(crate) fn encode_key_path(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
