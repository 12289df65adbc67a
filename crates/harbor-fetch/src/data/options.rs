use std::fmt;
use std::sync::Arc;

use harbor_verify::ContentHash;

use super::progress::Progress;

/// Phases of a single transfer attempt.
///
/// Attempts progress through these phases in order:
/// Connecting → Downloading → Verifying → Committing → Completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    /// Waiting for response headers.
    #[default]
    Connecting,

    /// Streaming the body into the staging file.
    Downloading,

    /// Finalizing the digest and comparing it (if a checksum was given).
    Verifying,

    /// Renaming the staging file onto the destination.
    Committing,

    /// Terminal state for a successful attempt.
    Completed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPhase::Connecting => write!(f, "Connecting"),
            FetchPhase::Downloading => write!(f, "Downloading"),
            FetchPhase::Verifying => write!(f, "Verifying"),
            FetchPhase::Committing => write!(f, "Committing"),
            FetchPhase::Completed => write!(f, "Completed"),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Per-attempt transfer options.
///
/// # Examples
///
/// ```
/// use harbor_fetch::FetchOptions;
///
/// let options = FetchOptions::default()
///     .checksum("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed".parse().unwrap())
///     .expected_size(11);
/// ```
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Expected digest. When absent the body is written without verification.
    pub checksum: Option<ContentHash>,

    /// Size announced by the manifest. Takes precedence over Content-Length
    /// for progress reporting; neither being known yields indeterminate
    /// progress.
    pub expected_size: Option<u64>,

    /// Invoked on phase transitions and after every chunk write.
    ///
    /// Runs inline on the transfer task, so it must return quickly.
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("checksum", &self.checksum)
            .field("expected_size", &self.expected_size)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl FetchOptions {
    pub fn checksum(mut self, checksum: ContentHash) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}
