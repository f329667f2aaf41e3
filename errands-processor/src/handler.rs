//! Errand handlers
//!
//! A handler is the application code that executes one errand. It returns
//! the results to report on success, or an error whose text becomes the
//! failure reason.

use anyhow::{Context, Result};
use async_trait::async_trait;
use errands_core::domain::errand::{Errand, ResultMap};
use std::sync::Arc;

/// Executes errands handed out by a [`crate::Processor`]
///
/// Handlers must not rely on the order errands arrive in, must not expect a
/// failed errand to be retried locally, and must not assume the errand is of
/// the processor's topic.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, errand: &Errand) -> Result<ResultMap>;
}

/// Adapter running a synchronous closure on tokio's blocking pool
pub struct FnHandler<F> {
    func: Arc<F>,
}

/// Wraps a synchronous closure into a [`Handler`]
///
/// The closure may block freely; it never runs on a runtime worker thread.
pub fn handler_fn<F>(func: F) -> FnHandler<F>
where
    F: Fn(&Errand) -> Result<ResultMap> + Send + Sync + 'static,
{
    FnHandler {
        func: Arc::new(func),
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&Errand) -> Result<ResultMap> + Send + Sync + 'static,
{
    async fn handle(&self, errand: &Errand) -> Result<ResultMap> {
        let func = Arc::clone(&self.func);
        let errand = errand.clone();

        tokio::task::spawn_blocking(move || func(&errand))
            .await
            .context("blocking handler did not finish")?
    }
}
