//! Configuration module
//!
//! Handles CLI configuration such as the errands service endpoint.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the errands service
    pub endpoint: String,
}
