//! Asynchronous job lifecycle types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::response::RiskAnalysisResponse;

/// Lifecycle state of an asynchronous analysis job
///
/// `Completed` and `Failed` are terminal. Marked non-exhaustive so that
/// further terminal states (cancelled, timed out) can be added without
/// breaking store consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum WorkflowStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Queued => "queued",
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    /// Parse the persisted string form back into a status
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(WorkflowStatus::Queued),
            "in_progress" => Some(WorkflowStatus::InProgress),
            "completed" => Some(WorkflowStatus::Completed),
            "failed" => Some(WorkflowStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Poll response for an asynchronous job
///
/// `report` is absent until the job completes; status and logs are observable
/// the whole way through.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusReport {
    pub request_id: Uuid,
    pub last_updated: DateTime<Utc>,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub logs: Vec<String>,
    pub report: Option<RiskAnalysisResponse>,
}
