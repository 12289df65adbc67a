//! I/O operations for HTTP fetching.
//!
//! Network access goes through the [`HttpClient`] trait so the fetcher can be
//! driven by scripted clients in tests.

mod fetcher;
mod http;

pub use fetcher::{Fetcher, staging_path};
pub use http::{BoxStream, HttpClient, Response};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
