//! Processor construction errors

use thiserror::Error;

/// Errors surfaced when creating a [`crate::Processor`]
///
/// Steady-state failures (fetching, handling, reporting) are never returned;
/// they are logged and the pool keeps running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("poll_interval must be greater than 0")]
    InvalidPollInterval,

    #[error("max_backoff must not be shorter than poll_interval")]
    InvalidBackoff,

    #[error("handler_timeout must be greater than 0")]
    InvalidHandlerTimeout,

    #[error("a processor must be started from within a tokio runtime")]
    NoRuntime,
}
