//! Error taxonomy and retry helpers shared by the connection manager

pub mod error;
pub mod retry;

pub use error::{
    BackendError, ConnectionError, DatabaseError, DatabaseResult, OperationError, QueryError,
};
pub use retry::{RetryConfig, retry_with_backoff, retry_with_backoff_if};
