//! Queue service seam
//!
//! The processor needs exactly three operations from the errands service:
//! claim the next errand of a topic, mark one completed, mark one failed.
//! They sit behind [`ErrandQueue`] so the pool can run against a fake in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use errands_client::ErrandsClient;
use errands_core::domain::errand::{Errand, ResultMap};

/// Operations the processor consumes from the errands service
#[async_trait]
pub trait ErrandQueue: Send + Sync {
    /// Claims at most one pending errand of `topic`
    ///
    /// Returns `Ok(None)` when nothing is queued.
    async fn fetch_next(&self, topic: &str) -> Result<Option<Errand>>;

    /// Marks an errand completed with the handler's results
    async fn report_complete(&self, errand_id: &str, results: ResultMap) -> Result<()>;

    /// Marks an errand failed with a human-readable reason
    async fn report_failed(&self, errand_id: &str, reason: &str) -> Result<()>;
}

#[async_trait]
impl ErrandQueue for ErrandsClient {
    async fn fetch_next(&self, topic: &str) -> Result<Option<Errand>> {
        match self.process_errand(topic).await {
            Ok(errand) => Ok(errand),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) if e.is_server_error() => Err(e).context(format!(
                "Errands service failed while handing out an errand for topic {}",
                topic
            )),
            Err(e) => Err(e).context(format!("Failed to fetch errand for topic {}", topic)),
        }
    }

    async fn report_complete(&self, errand_id: &str, results: ResultMap) -> Result<()> {
        self.complete_errand(errand_id, results)
            .await
            .context(format!("Failed to complete errand {}", errand_id))?;
        Ok(())
    }

    async fn report_failed(&self, errand_id: &str, reason: &str) -> Result<()> {
        self.fail_errand(errand_id, reason)
            .await
            .context(format!("Failed to fail errand {}", errand_id))?;
        Ok(())
    }
}
