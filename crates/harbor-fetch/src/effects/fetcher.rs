use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use harbor_verify::Hasher;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::data::{FetchOptions, FetchPhase, Progress};
use crate::effects::http::HttpClient;
use crate::error::{FetchError, Result};

/// Staging location used while `destination` is being written.
pub fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Performs one transfer attempt: stream, hash, verify, place.
///
/// The fetcher never retries; a failed attempt leaves neither a staging file
/// nor a partially written destination behind.
pub struct Fetcher<C: HttpClient> {
    client: C,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C) -> Self { Self { client } }

    pub fn client(&self) -> &C { &self.client }

    /// Download `url` into `destination`, returning the number of bytes written.
    ///
    /// Cancellation is observed while connecting and between body chunks and
    /// surfaces as [`FetchError::Cancelled`].
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let staging = staging_path(destination);

        let result = match self.stream_to_staging(url, &staging, options, cancel).await {
            Ok(bytes) => self.commit(&staging, destination, options, bytes).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            discard(&staging).await;
        }
        result
    }

    async fn stream_to_staging(
        &self,
        url: &str,
        staging: &Path,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        report(options, FetchPhase::Connecting, 0, options.expected_size);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.client.stream(url) => response?,
        };
        let total_bytes = options.expected_size.or(response.content_length);
        let mut body = response.body;

        let mut file = tokio::fs::File::create(staging).await?;
        let mut hasher = options.checksum.as_ref().map(|c| c.hasher());
        let mut bytes_downloaded = 0u64;

        report(options, FetchPhase::Downloading, 0, total_bytes);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            if let Some(h) = hasher.as_mut() {
                h.update(&chunk);
            }
            file.write_all(&chunk).await?;
            bytes_downloaded += chunk.len() as u64;

            report(options, FetchPhase::Downloading, bytes_downloaded, total_bytes);
        }

        file.flush().await?;
        drop(file);

        report(options, FetchPhase::Verifying, bytes_downloaded, total_bytes);
        if let (Some(expected), Some(h)) = (options.checksum.as_ref(), hasher) {
            expected.verify(&h.finalize())?;
        }

        trace!(url, bytes = bytes_downloaded, "body streamed");
        Ok(bytes_downloaded)
    }

    async fn commit(
        &self,
        staging: &Path,
        destination: &Path,
        options: &FetchOptions,
        bytes: u64,
    ) -> Result<u64> {
        report(options, FetchPhase::Committing, bytes, Some(bytes));
        tokio::fs::rename(staging, destination).await?;
        report(options, FetchPhase::Completed, bytes, Some(bytes));

        debug!(destination = %destination.display(), bytes, "file placed");
        Ok(bytes)
    }
}

fn report(options: &FetchOptions, phase: FetchPhase, bytes_downloaded: u64, total_bytes: Option<u64>) {
    if let Some(callback) = options.on_progress.as_ref() {
        callback(&Progress {
            phase,
            bytes_downloaded,
            total_bytes,
        });
    }
}

async fn discard(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => trace!(path = %staging.display(), "removed staging file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %staging.display(), error = %e, "failed to remove staging file"),
    }
}
