//! Output filename derivation.
//!
//! A job only names a destination directory; the file name comes from the
//! response's `Content-Disposition` header when present, otherwise from the
//! last segment of the URL path.

use std::path::{Component, Path};

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tracing::debug;
use url::Url;

use super::constants::FALLBACK_FILENAME;

/// Derives the file name for a download.
///
/// Order of preference:
/// 1. `filename*=` / `filename=` parameter of `Content-Disposition`
/// 2. last non-empty segment of the URL path (percent-decoded; query never
///    included)
/// 3. the URL host, when the path is just `/`
/// 4. [`FALLBACK_FILENAME`]
///
/// Only the basename of the chosen value is used, so a header cannot direct
/// the write outside the job's destination directory.
#[must_use]
pub fn derive_filename(headers: &HeaderMap, url: &Url) -> String {
    let from_header = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_disposition);

    from_header
        .as_deref()
        .and_then(usable_basename)
        .or_else(|| url_path_filename(url))
        .or_else(|| url.host_str().and_then(usable_basename))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

fn url_path_filename(url: &Url) -> Option<String> {
    // A trailing slash does not hide the last directory name.
    let last = url.path_segments()?.rfind(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    usable_basename(&decoded)
}

/// Returns the sanitized final path component of `raw`, or `None` when
/// nothing usable is left.
fn usable_basename(raw: &str) -> Option<String> {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw).trim();
    if base.is_empty() {
        return None;
    }
    let sanitized = sanitize_filename(base);
    is_safe_filename_segment(&sanitized).then_some(sanitized)
}

/// Parses Content-Disposition header to extract filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987, preferred)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `header`.
    let lower = header.to_ascii_lowercase();

    if let Some(pos) = lower.find("filename*=") {
        let value = header[pos + 10..].trim();
        // Format: charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name)
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = lower.find("filename=")?;
    let value = header[pos + 9..].trim_start();

    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        let filename = &stripped[..end];
        return (!filename.is_empty()).then(|| filename.to_string());
    }
    if let Some(stripped) = value.strip_prefix('\'') {
        let end = stripped.find('\'')?;
        let filename = &stripped[..end];
        return (!filename.is_empty()).then(|| filename.to_string());
    }

    let end = value.find(';').unwrap_or(value.len());
    let filename = value[..end].trim();
    (!filename.is_empty()).then(|| filename.to_string())
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn is_safe_filename_segment(name: &str) -> bool {
    !name.is_empty()
        && !Path::new(name).components().any(|component| {
            matches!(
                component,
                Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}
