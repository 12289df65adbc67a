use harbor_fetch::FetchError;
use harbor_gate::GateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session for version '{0}' is already running")]
    AlreadyActive(String),

    #[error("orchestrator has been disposed")]
    Disposed,

    #[error("failed to resolve metadata: {0}")]
    Metadata(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for SessionError {
    fn from(e: figment::Error) -> Self { SessionError::Config(Box::new(e)) }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Why a single unit did not complete.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer cancelled")]
    Cancelled,

    #[error("{url} is not available: {source}")]
    Missing {
        url:    String,
        #[source]
        source: FetchError,
    },

    #[error("{url} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        url:      String,
        attempts: u32,
        #[source]
        source:   FetchError,
    },
}
