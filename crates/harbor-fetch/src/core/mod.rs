//! Pure transformations for HTTP fetching.
//!
//! Nothing in here performs I/O, which keeps the backoff schedule and status
//! classification testable without a runtime.

mod progress;
mod retry;
mod status;

pub use progress::round_percent;
pub use retry::retry_delay;
pub use status::is_missing;
