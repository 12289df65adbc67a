#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("concurrency limit must be greater than zero, got {0}")]
    InvalidLimit(usize),

    #[error("admission cancelled")]
    Cancelled,

    #[error("gate has been disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, GateError>;
