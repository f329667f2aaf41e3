//! Pipeline-related API endpoints

use crate::ErrandsClient;
use crate::error::Result;
use errands_core::dto::pipeline::{
    Pipeline, PipelineResponse, PipelinesResponse, StatusResponse,
};

impl ErrandsClient {
    /// Create a pipeline from its JSON definition
    pub async fn create_pipeline(&self, pipeline: &Pipeline) -> Result<Pipeline> {
        let url = format!("{}/v1/pipeline/", self.base_url);
        let response = self.client.post(&url).json(pipeline).send().await?;

        let envelope: PipelineResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    /// Get a pipeline, including its errands and dependencies
    pub async fn get_pipeline(&self, pipeline_id: &str) -> Result<Pipeline> {
        let url = format!("{}/v1/pipeline/{}", self.base_url, pipeline_id);
        let response = self.client.get(&url).send().await?;

        let envelope: PipelineResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    /// List pipelines, optionally only those with `status`
    pub async fn list_pipelines(&self, status: Option<&str>) -> Result<Vec<Pipeline>> {
        let url = format!("{}/v1/pipelines/", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(status) = status.filter(|s| !s.is_empty()) {
            request = request.query(&[("status", status)]);
        }
        let response = request.send().await?;

        let envelope: PipelinesResponse = self.handle_response(response).await?;
        Ok(envelope.results)
    }

    /// Delete a pipeline
    pub async fn delete_pipeline(&self, pipeline_id: &str) -> Result<()> {
        let url = format!("{}/v1/pipeline/{}", self.base_url, pipeline_id);
        let response = self.client.delete(&url).send().await?;

        let _: StatusResponse = self.handle_response(response).await?;
        Ok(())
    }
}
