//! Pipeline DTOs
//!
//! The client does not interpret pipeline records; they travel as raw JSON.

use serde::{Deserialize, Serialize};

/// A pipeline record as stored by the service
pub type Pipeline = serde_json::Value;

/// Envelope wrapping a single pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResponse {
    #[serde(default)]
    pub results: Pipeline,
    #[serde(default)]
    pub status: String,
}

/// Envelope wrapping a list of pipelines
///
/// Listed pipelines come without their errands and dependencies; fetch a
/// single pipeline to see those.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelinesResponse {
    #[serde(default)]
    pub results: Vec<Pipeline>,
    #[serde(default)]
    pub status: String,
}

/// Envelope without results, as returned by deletes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
}
