use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;

use crate::error::Result;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// An opened response whose body has not been read yet.
pub struct Response {
    /// Content-Length, if the server sent one.
    pub content_length: Option<u64>,
    pub body:           BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Asynchronous streaming GET.
///
/// Implementations follow redirects, enforce their own timeout and map
/// failures onto [`FetchError`](crate::FetchError) variants: non-2xx responses
/// must become `FetchError::Status` so a 403/404 can be told apart from a
/// transient failure. Cancellation is by dropping the returned future or
/// body stream.
pub trait HttpClient: Send + Sync {
    /// Open `url` and return its body as a stream of chunks.
    fn stream(&self, url: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Adjust the per-request timeout for requests started from now on.
    fn set_timeout(&self, _timeout: Duration) {}
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::sync::atomic::{AtomicU64, Ordering};

    use futures_util::StreamExt;

    use super::*;
    use crate::error::FetchError;

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Production HTTP client implementation using reqwest.
    pub struct ReqwestClient {
        client:     reqwest::Client,
        timeout_ms: AtomicU64,
    }

    impl ReqwestClient {
        pub fn new() -> Result<Self> { Self::with_timeout(DEFAULT_TIMEOUT) }

        pub fn with_timeout(timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("harbor/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| FetchError::Network(e.to_string()))?;

            Ok(Self {
                client,
                timeout_ms: AtomicU64::new(timeout.as_millis() as u64),
            })
        }

        pub fn timeout(&self) -> Duration {
            Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
        }
    }

    fn map_error(url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url:    url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(e.to_string())
        }
    }

    impl HttpClient for ReqwestClient {
        async fn stream(&self, url: &str) -> Result<Response> {
            let response = self
                .client
                .get(url)
                .timeout(self.timeout())
                .send()
                .await
                .map_err(|e| map_error(url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url:    url.to_string(),
                    status: status.as_u16(),
                });
            }

            let content_length = response.content_length();
            let url = url.to_string();
            let body = response.bytes_stream().map(move |chunk| chunk.map_err(|e| map_error(&url, e)));

            Ok(Response {
                content_length,
                body: Box::pin(body),
            })
        }

        fn set_timeout(&self, timeout: Duration) {
            self.timeout_ms.store(timeout.as_millis() as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
