//! Byte counters to throttled percentage updates.

/// Tracks bytes received against a known total and reports a percentage
/// only when it changes.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: u64,
    downloaded: u64,
    last_reported: u8,
}

impl ProgressTracker {
    /// Creates a tracker for `total` bytes.
    ///
    /// Returns `None` when the total is zero: there is no meaningful
    /// percentage to report.
    #[must_use]
    pub fn new(total: u64) -> Option<Self> {
        (total > 0).then_some(Self {
            total,
            downloaded: 0,
            last_reported: 0,
        })
    }

    /// Records `bytes` more and returns the new percentage if it differs
    /// from the last one reported.
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.downloaded = self.downloaded.saturating_add(bytes);
        let percent = self.percent();
        if percent == self.last_reported {
            return None;
        }
        self.last_reported = percent;
        Some(percent)
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Expected total bytes.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Current percentage, floored and clamped to 100.
    #[must_use]
    pub fn percent(&self) -> u8 {
        let percent = u128::from(self.downloaded) * 100 / u128::from(self.total);
        u8::try_from(percent.min(100)).unwrap_or(100)
    }
}
