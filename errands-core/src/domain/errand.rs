//! Errand domain types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arbitrary key-value payload attached to an errand
pub type Payload = HashMap<String, serde_json::Value>;

/// Key-value results reported back when an errand completes
pub type ResultMap = HashMap<String, serde_json::Value>;

/// One unit of work owned by the errands service
///
/// The `kind` field is the errand's topic; it is called `type` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Errand {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub options: ErrandOptions,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub data: Payload,
    /// Creation time in unix milliseconds
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub status: ErrandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultMap>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<ErrandLog>,
    #[serde(rename = "pipeline", default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
}

impl Errand {
    /// Creation time as a UTC timestamp, if the service reported one
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.created)
    }

    /// Whether the service actually handed out an errand
    ///
    /// The process endpoint answers with an empty record when nothing is queued.
    pub fn is_present(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Per-errand options set by whoever created it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrandOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(rename = "deleteOnCompleted", default)]
    pub delete_on_completed: bool,
}

/// Errand lifecycle status
///
/// The service calls pending errands `inactive` and errands being processed
/// `active`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrandStatus {
    #[default]
    #[serde(alias = "pending")]
    Inactive,
    #[serde(alias = "processing")]
    Active,
    Completed,
    Failed,
    Blocked,
}

impl ErrandStatus {
    /// Whether the service will hand this errand out again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErrandStatus::Completed | ErrandStatus::Failed)
    }
}

impl std::fmt::Display for ErrandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrandStatus::Inactive => write!(f, "inactive"),
            ErrandStatus::Active => write!(f, "active"),
            ErrandStatus::Completed => write!(f, "completed"),
            ErrandStatus::Failed => write!(f, "failed"),
            ErrandStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for ErrandStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inactive" | "pending" => Ok(ErrandStatus::Inactive),
            "active" | "processing" => Ok(ErrandStatus::Active),
            "completed" => Ok(ErrandStatus::Completed),
            "failed" => Ok(ErrandStatus::Failed),
            "blocked" => Ok(ErrandStatus::Blocked),
            other => Err(format!("unknown errand status: {}", other)),
        }
    }
}

/// A log line the service recorded against an errand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrandLog {
    pub severity: String,
    pub message: String,
    /// Unix milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl ErrandLog {
    pub fn logged_at(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.timestamp)
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    if millis <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}
