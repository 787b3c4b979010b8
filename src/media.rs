//! Media URL resolution for storage-hosted assets.
//!
//! Class thumbnails and maestro photos are stored either as objects in the
//! backend's public `media` bucket, as absolute URLs, or as local assets.
//! Seed data is inconsistent about prefixes and extensions, so paths are
//! normalized before building the public object URL.

#[cfg(test)]
#[path = "media_test.rs"]
mod tests;

use crate::services::config::BackendConfig;

/// Strip accidental `public/` / `media/` prefixes and fix the common
/// `.jpg`-for-`.png` seed mismatch.
#[must_use]
pub fn normalize_storage_path(path: &str) -> String {
    let p = path.strip_prefix("public/").unwrap_or(path);
    let p = p
        .strip_prefix("/media/")
        .or_else(|| p.strip_prefix("media/"))
        .unwrap_or(p);
    if let Some(stem) = p.strip_suffix(".jpg") {
        return format!("{stem}.png");
    }
    p.to_owned()
}

/// Resolve a stored media path to a URL the UI can render.
///
/// Absolute `http(s)` URLs and root-relative local assets pass through
/// unchanged. Anything else is treated as an object in the public `media`
/// bucket; without a configured backend it falls back to `/media/<path>`.
#[must_use]
pub fn resolve_media_url(config: Option<&BackendConfig>, path: Option<&str>) -> Option<String> {
    let path = path.filter(|p| !p.is_empty())?;
    if path.starts_with("http") || path.starts_with('/') {
        return Some(path.to_owned());
    }
    let object_path = normalize_storage_path(path);
    Some(match config {
        Some(config) => format!("{}/storage/v1/object/public/media/{object_path}", config.base_url),
        None => format!("/media/{object_path}"),
    })
}
