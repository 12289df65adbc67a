use std::sync::Arc;
use std::time::Duration;

use harbor_fetch::{ErrorKind, FetchOptions, Fetcher, HttpClient, UrlRewriter, retry_delay};
use harbor_verify::file_matches;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::TransferError;
use crate::unit::{DownloadUnit, UnitProgress};

/// Retry settings sampled when a unit starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) base_delay:   Duration,
}

impl From<&EngineConfig> for RetryPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_retry_count,
            base_delay:   config.retry_delay_base(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Canonical,
    Fallback,
}

/// Drives a unit from "maybe already on disk" to a terminal outcome.
pub(crate) struct Transfer<C: HttpClient> {
    fetcher:  Fetcher<C>,
    rewriter: Arc<dyn UrlRewriter>,
}

impl<C: HttpClient> Transfer<C> {
    pub(crate) fn new(client: C, rewriter: Arc<dyn UrlRewriter>) -> Self {
        Self {
            fetcher: Fetcher::new(client),
            rewriter,
        }
    }

    pub(crate) fn client(&self) -> &C { self.fetcher.client() }

    /// Place `unit` on disk, retrying transient failures with exponential
    /// backoff.
    ///
    /// A missing primary URL switches to the origin once without spending an
    /// attempt. The origin is the unit's fallback, or its un-rewritten
    /// canonical URL when a mirror is in play. On success the unit is marked completed; every
    /// other outcome is returned for the caller to record.
    pub(crate) async fn run(
        &self,
        unit: &Arc<DownloadUnit>,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        if self.already_placed(unit).await {
            unit.complete();
            return Ok(());
        }

        let spec = unit.spec();
        let origin = spec.fallback_url.as_deref().unwrap_or(&spec.url);
        let mut source = Source::Canonical;
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let url = match source {
                Source::Fallback => origin.to_string(),
                Source::Canonical => self.rewriter.rewrite(&spec.url),
            };

            unit.begin_attempt();
            let err = match self.attempt(unit, &url, cancel).await {
                Ok(bytes) => {
                    debug!(unit = %unit.id(), url = %url, bytes, "unit placed");
                    unit.complete();
                    return Ok(());
                }
                Err(e) => e,
            };

            match err.kind() {
                ErrorKind::Cancelled => return Err(TransferError::Cancelled),
                ErrorKind::Missing if source == Source::Canonical && url != origin => {
                    warn!(unit = %unit.id(), url = %url, origin, error = %err, "primary url missing, switching to origin");
                    source = Source::Fallback;
                }
                ErrorKind::Missing => {
                    return Err(TransferError::Missing { url, source: err });
                }
                ErrorKind::Transient | ErrorKind::Integrity => {
                    failures += 1;
                    if failures >= policy.max_attempts {
                        warn!(unit = %unit.id(), url = %url, attempts = failures, error = %err, "giving up");
                        return Err(TransferError::Exhausted {
                            url,
                            attempts: failures,
                            source: err,
                        });
                    }

                    let delay = retry_delay(failures - 1, policy.base_delay);
                    warn!(unit = %unit.id(), url = %url, attempt = failures, ?delay, error = %err, "retrying");
                    unit.retrying(err.to_string());

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Whether the destination already holds the expected content. A stale
    /// file is removed so the transfer starts clean.
    async fn already_placed(&self, unit: &DownloadUnit) -> bool {
        let Some(expected) = unit.spec().hash.as_ref() else {
            return false;
        };
        let path = unit.destination();

        match file_matches(path, expected).await {
            Ok(true) => {
                debug!(unit = %unit.id(), path = %path.display(), "already on disk, skipping");
                true
            }
            Ok(false) => {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => debug!(unit = %unit.id(), path = %path.display(), "removed stale file"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(unit = %unit.id(), path = %path.display(), error = %e, "cannot remove stale file"),
                }
                false
            }
            Err(e) => {
                warn!(unit = %unit.id(), path = %path.display(), error = %e, "cannot check existing file");
                false
            }
        }
    }

    async fn attempt(
        &self,
        unit: &Arc<DownloadUnit>,
        url: &str,
        cancel: &CancellationToken,
    ) -> harbor_fetch::Result<u64> {
        let spec = unit.spec();
        if let Some(parent) = spec.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = FetchOptions::default();
        if let Some(hash) = spec.hash.clone() {
            options = options.checksum(hash);
        }
        if let Some(size) = spec.size {
            options = options.expected_size(size);
        }
        let progress_unit = Arc::clone(unit);
        options = options.on_progress(move |p| {
            let progress = p.percent().map_or(UnitProgress::Indeterminate, UnitProgress::Percent);
            progress_unit.set_progress(progress);
        });

        self.fetcher.fetch(url, &spec.path, &options, cancel).await
    }
}
