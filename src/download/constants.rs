//! Constants for the download module.

/// Upper bound accepted for configured connect/read timeouts (1 hour).
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Filename used when neither the response nor the URL names the file.
pub const FALLBACK_FILENAME: &str = "download";

/// Default User-Agent for download requests (identifies the tool).
#[must_use]
pub fn default_user_agent() -> String {
    format!("download-manager/{}", env!("CARGO_PKG_VERSION"))
}
