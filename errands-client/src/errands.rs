//! Errand-related API endpoints

use crate::ErrandsClient;
use crate::error::{ClientError, Result};
use errands_core::domain::errand::{Errand, ResultMap};
use errands_core::dto::errand::{
    CompleteErrandRequest, CreateErrand, ErrandFilter, ErrandResponse, ErrandsResponse,
    FailErrandRequest,
};
use tracing::debug;

impl ErrandsClient {
    // =============================================================================
    // Errand Queries
    // =============================================================================

    /// List every errand the service knows about
    pub async fn list_errands(&self) -> Result<Vec<Errand>> {
        let url = format!("{}/v1/errands/", self.base_url);
        let response = self.client.get(&url).send().await?;

        let envelope: ErrandsResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    /// List errands matching a status or type filter
    ///
    /// # Example
    /// ```no_run
    /// # use errands_client::{ErrandsClient, ErrandFilter};
    /// # async fn example() -> errands_client::Result<()> {
    /// let client = ErrandsClient::new("http://localhost:5555");
    /// let failed = client
    ///     .list_errands_by(&ErrandFilter::Status("failed".to_string()))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_errands_by(&self, filter: &ErrandFilter) -> Result<Vec<Errand>> {
        if filter.value().is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "empty value for {} filter",
                filter.key()
            )));
        }

        let url = format!(
            "{}/v1/errands/list/{}/{}",
            self.base_url,
            filter.key(),
            filter.value()
        );
        let response = self.client.get(&url).send().await?;

        let envelope: ErrandsResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    // =============================================================================
    // Errand Lifecycle
    // =============================================================================

    /// Create a new errand
    pub async fn create_errand(&self, req: &CreateErrand) -> Result<Errand> {
        let url = format!("{}/v1/errands/", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        let envelope: ErrandResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    /// Claim the next pending errand of `topic`
    ///
    /// Returns `None` when the service has nothing queued for the topic.
    pub async fn process_errand(&self, topic: &str) -> Result<Option<Errand>> {
        let url = format!("{}/v1/errands/process/{}", self.base_url, topic);
        let response = self.client.post(&url).send().await?;

        let envelope: ErrandResponse = self.handle_response(response).await?;
        if envelope.results.is_present() {
            Ok(Some(envelope.results))
        } else {
            debug!("No errand available for topic {} ({})", topic, envelope.status);
            Ok(None)
        }
    }

    /// Mark an errand failed with a human-readable reason
    pub async fn fail_errand(&self, errand_id: &str, reason: &str) -> Result<Errand> {
        let url = format!("{}/v1/errand/{}/failed", self.base_url, errand_id);
        let response = self
            .client
            .put(&url)
            .json(&FailErrandRequest {
                reason: reason.to_string(),
            })
            .send()
            .await?;

        let envelope: ErrandResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    /// Mark an errand completed with its results
    pub async fn complete_errand(&self, errand_id: &str, results: ResultMap) -> Result<Errand> {
        let url = format!("{}/v1/errand/{}/completed", self.base_url, errand_id);
        let response = self
            .client
            .put(&url)
            .json(&CompleteErrandRequest { results })
            .send()
            .await?;

        let envelope: ErrandResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    /// Delete an errand
    pub async fn delete_errand(&self, errand_id: &str) -> Result<()> {
        let url = format!("{}/v1/errand/{}", self.base_url, errand_id);
        let response = self.client.delete(&url).send().await?;

        let _: ErrandResponse = self.handle_response(response).await?;
        Ok(())
    }
}
