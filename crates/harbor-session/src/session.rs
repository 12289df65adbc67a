use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::platform::Platform;
use crate::unit::{DownloadUnit, UnitProgress, UnitSnapshot, UnitStatus};

type CompletionHook<D> = Box<dyn FnOnce(&D) + Send>;

/// Per-session knobs supplied to
/// [`Orchestrator::start_session`](crate::Orchestrator::start_session).
pub struct SessionOptions<D> {
    pub(crate) cancel:       Option<CancellationToken>,
    pub(crate) platform:     Option<Platform>,
    pub(crate) timeout:      Option<Duration>,
    pub(crate) on_completed: Option<CompletionHook<D>>,
}

impl<D> Default for SessionOptions<D> {
    fn default() -> Self {
        Self {
            cancel:       None,
            platform:     None,
            timeout:      None,
            on_completed: None,
        }
    }
}

impl<D> std::fmt::Debug for SessionOptions<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("cancel", &self.cancel)
            .field("platform", &self.platform)
            .field("timeout", &self.timeout)
            .field("on_completed", &self.on_completed.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl<D> SessionOptions<D> {
    /// Cancel the session when `token` fires.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Select core files for `platform` instead of the host.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Override the configured session timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `hook` with the version descriptor once every unit has completed.
    pub fn on_completed(mut self, hook: impl FnOnce(&D) + Send + 'static) -> Self {
        self.on_completed = Some(Box::new(hook));
        self
    }
}

/// Rolled-up status of a session.
///
/// When units disagree the precedence is failed, cancelled, downloading,
/// completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AggregateStatus {
    /// No units, or none has started.
    #[default]
    None,
    Downloading,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateProgress {
    /// Mean unit percent, rounded to two decimals. Indeterminate units count
    /// as zero until they complete.
    pub percent:   f64,
    pub status:    AggregateStatus,
    pub total:     usize,
    pub completed: usize,
    pub failed:    usize,
    pub cancelled: usize,
}

impl AggregateProgress {
    pub(crate) fn from_units(units: impl IntoIterator<Item = (UnitStatus, UnitProgress)>) -> Self {
        let mut out = AggregateProgress::default();
        let mut sum = 0.0;
        let mut in_flight = 0usize;

        for (status, progress) in units {
            out.total += 1;
            match status {
                UnitStatus::Completed => {
                    out.completed += 1;
                    sum += 100.0;
                    continue;
                }
                UnitStatus::Failed => out.failed += 1,
                UnitStatus::Cancelled => out.cancelled += 1,
                UnitStatus::Downloading | UnitStatus::Retrying => in_flight += 1,
                UnitStatus::NotStarted => {}
            }
            if let UnitProgress::Percent(p) = progress {
                sum += p;
            }
        }

        if out.total == 0 {
            return out;
        }

        out.percent = (sum / out.total as f64 * 100.0).round() / 100.0;
        out.status = if out.failed > 0 {
            AggregateStatus::Failed
        } else if out.cancelled > 0 {
            AggregateStatus::Cancelled
        } else if out.completed == out.total {
            AggregateStatus::Completed
        } else if in_flight > 0 || out.completed > 0 {
            AggregateStatus::Downloading
        } else {
            AggregateStatus::None
        };
        out
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub version:   String,
    pub succeeded: bool,
    pub completed: Vec<UnitSnapshot>,
    pub failed:    Vec<UnitSnapshot>,
    pub cancelled: Vec<UnitSnapshot>,
    pub elapsed:   Duration,
}

/// State of one running install.
pub(crate) struct Session {
    version:    String,
    cancel:     CancellationToken,
    units:      Mutex<Vec<Arc<DownloadUnit>>>,
    started_at: Instant,
}

impl Session {
    pub(crate) fn new(version: &str, cancel: CancellationToken) -> Self {
        Self {
            version: version.to_string(),
            cancel,
            units: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn version(&self) -> &str { &self.version }

    pub(crate) fn cancel_token(&self) -> &CancellationToken { &self.cancel }

    pub(crate) fn is_cancelled(&self) -> bool { self.cancel.is_cancelled() }

    pub(crate) fn add_units(&self, units: &[Arc<DownloadUnit>]) {
        self.units.lock().unwrap_or_else(PoisonError::into_inner).extend(units.iter().cloned());
    }

    pub(crate) fn units(&self) -> Vec<Arc<DownloadUnit>> {
        self.units.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn snapshots(&self) -> Vec<UnitSnapshot> { self.units().iter().map(|u| u.snapshot()).collect() }

    pub(crate) fn progress(&self) -> AggregateProgress {
        AggregateProgress::from_units(self.units().iter().map(|u| (u.status(), u.progress())))
    }

    pub(crate) fn has_failures(&self) -> bool { self.units().iter().any(|u| u.status() == UnitStatus::Failed) }

    pub(crate) fn report(&self) -> SessionReport {
        let snapshots = self.snapshots();
        let total = snapshots.len();
        let (mut completed, mut failed, mut cancelled) = (Vec::new(), Vec::new(), Vec::new());
        for snapshot in snapshots {
            match snapshot.status {
                UnitStatus::Completed => completed.push(snapshot),
                UnitStatus::Failed => failed.push(snapshot),
                _ => cancelled.push(snapshot),
            }
        }

        SessionReport {
            version: self.version.clone(),
            succeeded: !self.is_cancelled() && completed.len() == total,
            completed,
            failed,
            cancelled,
            elapsed: self.started_at.elapsed(),
        }
    }
}
