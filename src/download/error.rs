//! Error types for the download module.
//!
//! Every variant's `Display` output is what ends up in a failed job's
//! `state` field, so messages are kept short and self-contained.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a job's file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Transport failure reported by a non-reqwest transport.
    #[error("transport error downloading {url}: {message}")]
    Transport {
        /// The URL that failed to download.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Response status outside the 2xx range.
    #[error("{}", status_line(*status, reason))]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The status reason phrase, possibly empty.
        reason: String,
    },

    /// File system error while creating or writing the output file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The job URL is malformed or uses a scheme other than http/https.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
        /// Why the URL was rejected.
        reason: String,
    },
}

fn status_line(status: u16, reason: &str) -> String {
    if reason.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status} {reason}")
    }
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a transport error from a plain message.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(status: u16, reason: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the url
// or path the source error lacks, so callers go through the constructors.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status(404, "Not Found");
        assert_eq!(error.to_string(), "HTTP 404 Not Found");
    }

    #[test]
    fn test_download_error_http_status_without_reason() {
        let error = DownloadError::http_status(599, "");
        assert_eq!(error.to_string(), "HTTP 599");
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.pdf"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/test.pdf"), "Expected path in: {msg}");
        assert!(msg.contains("access denied"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_download_error_transport_display() {
        let error = DownloadError::transport("http://h/f.bin", "connection reset");
        let msg = error.to_string();
        assert!(msg.contains("http://h/f.bin"), "Expected URL in: {msg}");
        assert!(msg.contains("connection reset"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url", "relative URL without a base");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("not-a-url"), "Expected URL in: {msg}");
    }
}
