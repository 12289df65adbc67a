//! Immutable configuration and progress types.

mod options;
mod progress;

pub use options::{FetchOptions, FetchPhase, ProgressCallback};
pub use progress::Progress;
