use std::sync::Arc;

use tokio::sync::broadcast;

use crate::resolver::Phase;
use crate::session::SessionReport;
use crate::unit::UnitSnapshot;

/// Notifications published by an [`Orchestrator`](crate::Orchestrator).
///
/// Delivery is best effort: a subscriber that falls behind skips events
/// rather than slowing transfers down.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// A unit changed status or progress.
    Unit(UnitSnapshot),
    PhaseStarted {
        version: String,
        phase:   Phase,
        units:   usize,
    },
    SessionCompleted(Arc<SessionReport>),
}

#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: broadcast::Sender<DownloadEvent>,
}

impl EventSink {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn emit(&self, event: DownloadEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> { self.tx.subscribe() }
}
