use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::event::{DownloadEvent, EventSink};
use crate::resolver::{FileSpec, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unit-{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitStatus {
    NotStarted,
    Downloading,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Completed | UnitStatus::Failed | UnitStatus::Cancelled)
    }

    fn can_become(self, next: UnitStatus) -> bool {
        use UnitStatus::*;
        match (self, next) {
            (NotStarted, Downloading | Completed | Failed | Cancelled) => true,
            (Downloading, Retrying | Completed | Failed | Cancelled) => true,
            (Retrying, Downloading | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitProgress {
    /// Size unknown, only byte counts are available.
    Indeterminate,
    Percent(f64),
}

impl UnitProgress {
    /// Percent complete, or `-1.0` when indeterminate.
    pub fn as_f64(&self) -> f64 {
        match self {
            UnitProgress::Indeterminate => -1.0,
            UnitProgress::Percent(p) => *p,
        }
    }
}

/// Point-in-time copy of a unit, as published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSnapshot {
    pub id:          UnitId,
    pub version:     String,
    pub phase:       Phase,
    pub url:         String,
    pub destination: std::path::PathBuf,
    pub status:      UnitStatus,
    pub progress:    UnitProgress,
    pub attempts:    u32,
    pub last_error:  Option<String>,
}

struct UnitState {
    status:     UnitStatus,
    progress:   UnitProgress,
    attempts:   u32,
    last_error: Option<String>,
}

/// A single file transfer inside a session.
///
/// Status only ever moves forward: once a unit is completed, failed or
/// cancelled every further mutation is ignored. Each accepted mutation is
/// published as a [`DownloadEvent::Unit`].
pub struct DownloadUnit {
    id:      UnitId,
    version: String,
    phase:   Phase,
    spec:    FileSpec,
    state:   Mutex<UnitState>,
    events:  EventSink,
}

impl fmt::Debug for DownloadUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadUnit")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("url", &self.spec.url)
            .field("status", &self.status())
            .finish()
    }
}

impl DownloadUnit {
    pub(crate) fn new(id: UnitId, version: &str, phase: Phase, spec: FileSpec, events: EventSink) -> Self {
        Self {
            id,
            version: version.to_string(),
            phase,
            spec,
            state: Mutex::new(UnitState {
                status:     UnitStatus::NotStarted,
                progress:   UnitProgress::Percent(0.0),
                attempts:   0,
                last_error: None,
            }),
            events,
        }
    }

    pub fn id(&self) -> UnitId { self.id }

    pub fn phase(&self) -> Phase { self.phase }

    pub fn spec(&self) -> &FileSpec { &self.spec }

    pub fn destination(&self) -> &Path { &self.spec.path }

    pub fn status(&self) -> UnitStatus { self.lock().status }

    pub fn progress(&self) -> UnitProgress { self.lock().progress }

    pub fn snapshot(&self) -> UnitSnapshot { self.snapshot_of(&self.lock()) }

    fn snapshot_of(&self, state: &UnitState) -> UnitSnapshot {
        UnitSnapshot {
            id:          self.id,
            version:     self.version.clone(),
            phase:       self.phase,
            url:         self.spec.url.clone(),
            destination: self.spec.path.clone(),
            status:      state.status,
            progress:    state.progress,
            attempts:    state.attempts,
            last_error:  state.last_error.clone(),
        }
    }

    /// Progress of an attempt that has not received any bytes yet.
    fn restart_progress(&self) -> UnitProgress {
        match self.spec.size {
            Some(_) => UnitProgress::Percent(0.0),
            None => UnitProgress::Indeterminate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, UnitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut UnitState) -> bool) -> bool {
        let snapshot = {
            let mut state = self.lock();
            if !f(&mut state) {
                return false;
            }
            self.snapshot_of(&state)
        };
        self.events.emit(DownloadEvent::Unit(snapshot));
        true
    }

    fn transition(&self, next: UnitStatus, error: Option<String>) -> bool {
        let id = self.id;
        let restart = self.restart_progress();
        self.update(|state| {
            if !state.status.can_become(next) {
                trace!(unit = %id, from = ?state.status, to = ?next, "ignored status change");
                return false;
            }
            state.status = next;
            match next {
                UnitStatus::Completed => state.progress = UnitProgress::Percent(100.0),
                UnitStatus::Retrying => state.progress = restart,
                _ => {}
            }
            if error.is_some() {
                state.last_error = error;
            }
            true
        })
    }

    /// Start a network attempt. Progress from an earlier attempt is dropped.
    pub(crate) fn begin_attempt(&self) -> bool {
        let restart = self.restart_progress();
        self.update(|state| {
            if !state.status.can_become(UnitStatus::Downloading) {
                return false;
            }
            state.status = UnitStatus::Downloading;
            state.progress = restart;
            state.attempts += 1;
            true
        })
    }

    pub(crate) fn retrying(&self, error: String) -> bool { self.transition(UnitStatus::Retrying, Some(error)) }

    pub(crate) fn complete(&self) -> bool { self.transition(UnitStatus::Completed, None) }

    pub(crate) fn fail(&self, error: String) -> bool { self.transition(UnitStatus::Failed, Some(error)) }

    pub(crate) fn cancel(&self) -> bool { self.transition(UnitStatus::Cancelled, None) }

    /// Record transfer progress; ignored unless a transfer is running.
    pub(crate) fn set_progress(&self, progress: UnitProgress) {
        self.update(|state| {
            if state.status != UnitStatus::Downloading || state.progress == progress {
                return false;
            }
            state.progress = progress;
            true
        });
    }
}
