use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CullError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Destruction failed: {0}")]
    Destruction(String),

    #[error("Activation failed: {0}")]
    Activation(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Lifecycle entity '{0}' not found")]
    UnknownEntity(String),

    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, CullError>;

impl<T> From<std::sync::PoisonError<T>> for CullError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
