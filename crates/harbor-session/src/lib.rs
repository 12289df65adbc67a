//! Multi-phase download orchestration for game launcher version installs.
//!
//! An [`Orchestrator`] installs a version in three phases: the version
//! manifest, the core client and library files for the current platform, and
//! finally the per-asset resource files. Every file becomes a
//! [`DownloadUnit`] whose transfer runs behind a shared
//! [`Gate`](harbor_gate::Gate), with hash verification, fallback-URL
//! substitution and exponential backoff handled per unit.
//!
//! # Key Features
//!
//! - **Instance-owned state**: sessions live in the orchestrator, not in globals
//! - **Layered cancellation**: per session, per caller token, session timeout
//!   and a cancel-everything scope
//! - **Live reconfiguration**: [`ConfigHandle`] updates reach the gate and the
//!   transport without restarting running sessions
//! - **Observable**: [`DownloadEvent`]s are broadcast without ever blocking a
//!   transfer

mod config;
mod error;
mod event;
mod orchestrator;
mod platform;
mod resolver;
mod session;
mod transfer;
mod unit;

pub use config::{ConfigHandle, EngineConfig};
pub use error::{Result, SessionError, TransferError};
pub use event::DownloadEvent;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use platform::{Arch, Os, Platform};
pub use resolver::{FileSpec, MetadataResolver, Phase};
pub use session::{AggregateProgress, AggregateStatus, SessionOptions, SessionReport};
pub use unit::{DownloadUnit, UnitId, UnitProgress, UnitSnapshot, UnitStatus};
