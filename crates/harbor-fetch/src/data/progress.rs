use crate::core::round_percent;
use crate::data::FetchPhase;

/// Snapshot of a transfer attempt, passed to progress callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub phase: FetchPhase,

    /// Bytes written to the staging file so far.
    pub bytes_downloaded: u64,

    /// Expected size from the manifest or Content-Length, if either is known.
    pub total_bytes: Option<u64>,
}

impl Progress {
    /// Completion percentage rounded to two decimals, `None` if indeterminate.
    pub fn percent(&self) -> Option<f64> {
        if self.phase == FetchPhase::Completed {
            return Some(100.0);
        }
        round_percent(self.bytes_downloaded, self.total_bytes)
    }
}
