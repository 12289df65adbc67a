use std::sync::Arc;

use harbor_session::{DownloadEvent, SessionReport};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

const PB_STYLE: &str =
    "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} files {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    ProgressStyle::with_template(PB_STYLE)
        .ok()
        .map(|style| style.tick_chars(TICK).progress_chars(PB_CHARS))
});

/// Follows a session until its report arrives. When drawing, one bar grows as
/// phases announce their units and advances whenever a unit reaches a final
/// status.
pub struct SessionProgress {
    task: JoinHandle<Option<Arc<SessionReport>>>,
}

impl SessionProgress {
    pub fn spawn(mut events: broadcast::Receiver<DownloadEvent>, version: &str, draw: bool) -> Self {
        let pb = match (draw, PB_TEMPLATE.as_ref()) {
            (false, _) => ProgressBar::hidden(),
            (true, Some(style)) => ProgressBar::new(0).with_style(style.clone()),
            (true, None) => ProgressBar::new(0),
        };
        pb.set_prefix(version.to_string());

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(DownloadEvent::PhaseStarted { phase, units, .. }) => {
                        pb.inc_length(units as u64);
                        pb.set_message(phase.to_string());
                    }
                    Ok(DownloadEvent::Unit(unit)) if unit.status.is_terminal() => pb.inc(1),
                    Ok(DownloadEvent::Unit(_)) => {}
                    Ok(DownloadEvent::SessionCompleted(report)) => {
                        let msg = if report.succeeded { "done" } else { "incomplete" };
                        pb.finish_with_message(msg);
                        return Some(report);
                    }
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress display fell behind"),
                    Err(RecvError::Closed) => {
                        pb.abandon();
                        return None;
                    }
                }
            }
        });

        Self { task }
    }

    /// Wait for the session to end and return its report, if one was seen.
    pub async fn finish(self) -> Option<Arc<SessionReport>> { self.task.await.ok().flatten() }
}
