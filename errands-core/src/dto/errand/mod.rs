//! Errand DTOs for talking to the errands service

use serde::{Deserialize, Serialize};

use crate::domain::errand::{Errand, ErrandOptions, Payload, ResultMap};

/// Envelope wrapping a single errand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrandResponse {
    #[serde(default)]
    pub results: Errand,
    #[serde(default)]
    pub status: String,
}

/// Envelope wrapping a list of errands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrandsResponse {
    #[serde(default)]
    pub results: Vec<Errand>,
    #[serde(default)]
    pub status: String,
}

/// Request to create a new errand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateErrand {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: ErrandOptions,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub data: Payload,
}

/// Marks an errand failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailErrandRequest {
    pub reason: String,
}

/// Marks an errand completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteErrandRequest {
    pub results: ResultMap,
}

/// Filter accepted by the list endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrandFilter {
    Status(String),
    Type(String),
}

impl ErrandFilter {
    /// Path key used by `/v1/errands/list/{key}/{value}`
    pub fn key(&self) -> &'static str {
        match self {
            ErrandFilter::Status(_) => "status",
            ErrandFilter::Type(_) => "type",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ErrandFilter::Status(v) | ErrandFilter::Type(v) => v,
        }
    }
}
