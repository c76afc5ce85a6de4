//! Job types and the `state` wire format.
//!
//! A job is one entry of the declarative download list: a source URL, a
//! destination directory, and the status string the manager writes back.
//! [`JobState`] is the typed form of that status; the string form only
//! exists at the Job Store boundary.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const STARTED: &str = "started";
const DONE: &str = "done";

/// A desired download, as read from the job list for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Source URL; also the job's identity.
    pub url: String,
    /// Directory the downloaded file is written into.
    pub dest: PathBuf,
}

impl JobSpec {
    /// Creates a job spec.
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
        }
    }
}

/// Persisted status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobState {
    /// No status recorded yet.
    #[default]
    Idle,
    /// A worker was started; headers not received yet.
    Started,
    /// Download in progress, percent in `0..=100`.
    Progress(u8),
    /// File fully written. Terminal.
    Done,
    /// Download failed. Sticky until the job is removed or moved.
    Error(String),
}

impl JobState {
    /// Parses the wire form of the `state` field.
    ///
    /// Absent maps to [`JobState::Idle`]; any string that is not one of the
    /// reserved forms is an error message.
    #[must_use]
    pub fn from_wire(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Idle;
        };
        match raw {
            STARTED => Self::Started,
            DONE => Self::Done,
            other => match parse_percent(other) {
                Some(percent) => Self::Progress(percent),
                None => Self::Error(other.to_string()),
            },
        }
    }

    /// Returns the wire form, `None` for [`JobState::Idle`].
    #[must_use]
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Self::Idle => None,
            other => Some(other.to_string()),
        }
    }

    /// Returns true for [`JobState::Done`].
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true when no worker will make further progress on its own.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => Ok(()),
            Self::Started => f.write_str(STARTED),
            Self::Progress(percent) => write!(f, "{percent}%"),
            Self::Done => f.write_str(DONE),
            Self::Error(message) => f.write_str(message),
        }
    }
}

fn parse_percent(raw: &str) -> Option<u8> {
    let digits = raw.strip_suffix('%')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok().filter(|percent| *percent <= 100)
}

/// One entry of the job list as stored by a [`JobStore`](crate::store::JobStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    /// Source URL.
    pub url: String,
    /// Destination directory.
    pub dest: String,
    /// Wire-format status; absent until the job is first started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl JobEntry {
    /// Creates an entry with no recorded state.
    pub fn new(url: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            state: None,
        }
    }

    /// Returns the desired-job view of this entry.
    #[must_use]
    pub fn spec(&self) -> JobSpec {
        JobSpec::new(self.url.clone(), PathBuf::from(&self.dest))
    }

    /// Returns the typed state.
    #[must_use]
    pub fn job_state(&self) -> JobState {
        JobState::from_wire(self.state.as_deref())
    }

    /// Returns a copy with only the state replaced.
    #[must_use]
    pub fn with_state(&self, state: &JobState) -> Self {
        Self {
            state: state.to_wire(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_wire_forms() {
        assert_eq!(JobState::Idle.to_wire(), None);
        assert_eq!(JobState::Started.to_wire().as_deref(), Some("started"));
        assert_eq!(JobState::Progress(42).to_wire().as_deref(), Some("42%"));
        assert_eq!(JobState::Done.to_wire().as_deref(), Some("done"));
        assert_eq!(
            JobState::Error("HTTP 404 Not Found".into())
                .to_wire()
                .as_deref(),
            Some("HTTP 404 Not Found")
        );
    }

    #[test]
    fn test_job_state_from_wire_reserved_forms() {
        assert_eq!(JobState::from_wire(None), JobState::Idle);
        assert_eq!(JobState::from_wire(Some("started")), JobState::Started);
        assert_eq!(JobState::from_wire(Some("0%")), JobState::Progress(0));
        assert_eq!(JobState::from_wire(Some("100%")), JobState::Progress(100));
        assert_eq!(JobState::from_wire(Some("done")), JobState::Done);
    }

    #[test]
    fn test_job_state_from_wire_unknown_string_is_error() {
        assert_eq!(
            JobState::from_wire(Some("connection refused")),
            JobState::Error("connection refused".into())
        );
        // Out-of-range or malformed percentages are not progress.
        assert_eq!(
            JobState::from_wire(Some("101%")),
            JobState::Error("101%".into())
        );
        assert_eq!(
            JobState::from_wire(Some("-1%")),
            JobState::Error("-1%".into())
        );
        assert_eq!(JobState::from_wire(Some("%")), JobState::Error("%".into()));
    }

    #[test]
    fn test_job_state_settled() {
        assert!(JobState::Done.is_settled());
        assert!(JobState::Error("x".into()).is_settled());
        assert!(!JobState::Started.is_settled());
        assert!(!JobState::Progress(99).is_settled());
        assert!(!JobState::Idle.is_settled());
    }

    #[test]
    fn test_job_entry_serde_omits_absent_state() {
        let entry = JobEntry::new("http://h/f.bin", "/out");
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"url":"http://h/f.bin","dest":"/out"}"#);

        let parsed: JobEntry =
            serde_json::from_str(r#"{"url":"http://h/f.bin","dest":"/out","state":"7%"}"#)
                .unwrap();
        assert_eq!(parsed.job_state(), JobState::Progress(7));
    }

    #[test]
    fn test_job_entry_with_state_keeps_url_and_dest() {
        let entry = JobEntry::new("http://h/f.bin", "/out");
        let updated = entry.with_state(&JobState::Done);
        assert_eq!(updated.url, entry.url);
        assert_eq!(updated.dest, entry.dest);
        assert_eq!(updated.state.as_deref(), Some("done"));
        assert_eq!(updated.with_state(&JobState::Idle).state, None);
    }
}
