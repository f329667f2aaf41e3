//! Echo worker configuration
//!
//! Where the errands service lives, which topic to serve, and how the
//! processor should be sized and timed.

use anyhow::Context;
use errands_processor::ProcessorConfig;
use errands_processor::config::DEFAULT_MAX_BACKOFF;
use std::time::Duration;

/// Echo worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Errands service base URL (e.g., "http://localhost:5555")
    pub errands_url: String,

    /// Errand type to process
    pub topic: String,

    /// Number of concurrent workers
    pub concurrency: usize,

    /// How often to poll the service for new errands
    pub poll_interval: Duration,

    /// Maximum time a single errand may take
    pub handler_timeout: Option<Duration>,

    /// Ceiling for the delay between fetches while the service is failing;
    /// `None` retries on every tick
    pub max_backoff: Option<Duration>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(errands_url: String) -> Self {
        Self {
            errands_url,
            topic: "echo".to_string(),
            concurrency: 1,
            poll_interval: Duration::from_secs(4),
            handler_timeout: None,
            max_backoff: Some(DEFAULT_MAX_BACKOFF),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - ERRANDS_URL (required)
    /// - ERRANDS_TOPIC (optional, default: echo)
    /// - ERRANDS_CONCURRENCY (optional, default: 1)
    /// - ERRANDS_POLL_INTERVAL (optional, seconds, default: 4)
    /// - ERRANDS_HANDLER_TIMEOUT (optional, seconds, default: none)
    /// - ERRANDS_MAX_BACKOFF (optional, seconds, default: 60, 0 disables backoff)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let errands_url = lookup("ERRANDS_URL")
            .ok_or_else(|| anyhow::anyhow!("ERRANDS_URL environment variable not set"))?;

        let mut config = Self::new(errands_url);

        if let Some(topic) = lookup("ERRANDS_TOPIC") {
            config.topic = topic;
        }

        if let Some(raw) = lookup("ERRANDS_CONCURRENCY") {
            config.concurrency = raw
                .parse()
                .with_context(|| format!("invalid ERRANDS_CONCURRENCY: {}", raw))?;
        }

        if let Some(raw) = lookup("ERRANDS_POLL_INTERVAL") {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("invalid ERRANDS_POLL_INTERVAL: {}", raw))?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("ERRANDS_HANDLER_TIMEOUT") {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("invalid ERRANDS_HANDLER_TIMEOUT: {}", raw))?;
            config.handler_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(raw) = lookup("ERRANDS_MAX_BACKOFF") {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("invalid ERRANDS_MAX_BACKOFF: {}", raw))?;
            config.max_backoff = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.errands_url.is_empty() {
            anyhow::bail!("errands_url cannot be empty");
        }

        if !self.errands_url.starts_with("http://") && !self.errands_url.starts_with("https://") {
            anyhow::bail!("errands_url must start with http:// or https://");
        }

        self.processor_config().validate()?;

        Ok(())
    }

    /// Processor settings derived from this configuration
    pub fn processor_config(&self) -> ProcessorConfig {
        let mut config = ProcessorConfig::new(self.topic.clone(), self.concurrency)
            .with_poll_interval(self.poll_interval);

        // Keep the backoff ceiling meaningful for long poll intervals.
        if let Some(max_backoff) = self.max_backoff {
            config = config.with_max_backoff(max_backoff.max(self.poll_interval));
        }

        if let Some(timeout) = self.handler_timeout {
            config = config.with_handler_timeout(timeout);
        }

        config
    }
}
