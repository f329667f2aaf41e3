//! Processor configuration
//!
//! Defines the topic a processor serves, how many workers it runs, and the
//! timing knobs of its control loop.

use std::time::Duration;

use crate::error::ProcessorError;

/// Default time between two polls of the errands service
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Suggested upper bound for the fetch backoff, see
/// [`ProcessorConfig::with_max_backoff`]
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Processor configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Errand type served by this processor
    pub topic: String,

    /// Number of workers; fixed for the processor's lifetime
    pub concurrency: usize,

    /// How often the control loop considers fetching an errand
    pub poll_interval: Duration,

    /// Upper bound for the fetch backoff. `None` retries a failed fetch on
    /// the very next tick.
    pub max_backoff: Option<Duration>,

    /// Maximum time a handler may run before the errand is failed
    pub handler_timeout: Option<Duration>,
}

impl ProcessorConfig {
    /// Creates a configuration with default timings
    pub fn new(topic: impl Into<String>, concurrency: usize) -> Self {
        Self {
            topic: topic.into(),
            concurrency,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_backoff: None,
            handler_timeout: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Spaces out fetches exponentially while the service keeps failing,
    /// never waiting longer than `max_backoff`
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.concurrency == 0 {
            return Err(ProcessorError::InvalidConcurrency);
        }

        if self.topic.is_empty() {
            return Err(ProcessorError::EmptyTopic);
        }

        if self.poll_interval.is_zero() {
            return Err(ProcessorError::InvalidPollInterval);
        }

        if self.max_backoff.is_some_and(|max| max < self.poll_interval) {
            return Err(ProcessorError::InvalidBackoff);
        }

        if self.handler_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ProcessorError::InvalidHandlerTimeout);
        }

        Ok(())
    }
}
