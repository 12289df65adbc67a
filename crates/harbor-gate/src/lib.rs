//! Fair admission control for asynchronous operations.
//!
//! A [`Gate`] admits at most `limit` operations at once. Callers that cannot
//! be admitted immediately wait in a FIFO queue, each behind its own one-shot
//! signal, and are handed a slot in arrival order as running operations
//! finish or the limit is raised.
//!
//! # Key Features
//!
//! - **Lock-free fast path**: admission is a single atomic increment and check
//! - **FIFO fairness**: queued callers are admitted strictly in enqueue order
//! - **Live reconfiguration**: [`Gate::set_limit`] wakes waiters immediately on
//!   increase and never preempts running work on decrease
//! - **Cancellation-safe**: a waiter that goes away after being handed a slot
//!   passes the slot on instead of stranding it
//!
//! # Example
//!
//! ```
//! use harbor_gate::Gate;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> harbor_gate::Result<()> {
//! let gate = Gate::new(4)?;
//! let cancel = CancellationToken::new();
//!
//! let answer = gate.execute(&cancel, || async { 40 + 2 }).await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

mod error;
mod gate;
mod queue;

pub use error::{GateError, Result};
pub use gate::{Gate, Permit};
