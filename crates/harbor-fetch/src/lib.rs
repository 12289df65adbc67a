//! Single-file HTTP transfers with streaming verification and staged placement.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and types
//! - [`core`] - Pure transformations
//! - [`effects`] - I/O operations with trait abstraction
//!
//! # Key Features
//!
//! - **Single-Pass**: bytes are hashed while they are written, never re-read
//! - **Staged Placement**: transfers land in `<dest>.part` and are renamed into
//!   place only after verification
//! - **Typed Failures**: [`FetchError::kind`] tells retry logic whether a failure
//!   is a missing resource, transient, an integrity problem or a cancellation
//! - **Mechanism-Only**: one attempt per call; the caller owns retry policy

pub mod core;
pub mod data;
pub mod effects;
mod error;
mod mirror;

pub use self::core::{is_missing, retry_delay, round_percent};
pub use self::data::{FetchOptions, FetchPhase, Progress};
pub use self::effects::{BoxStream, Fetcher, HttpClient, Response, staging_path};

#[cfg(feature = "reqwest")]
pub use self::effects::ReqwestClient;

pub use error::{ErrorKind, FetchError, Result};
pub use mirror::{NoMirror, PrefixMirror, UrlRewriter};
