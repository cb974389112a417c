use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis_client::SkillsProfile;

/// Processing state of an assessment row.
///
/// `absent → PENDING → PROCESSING → {COMPLETED, FAILED}`, and `FAILED → PROCESSING`
/// on an explicit re-trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ProcessingStatus::Pending),
            "PROCESSING" => Some(ProcessingStatus::Processing),
            "COMPLETED" => Some(ProcessingStatus::Completed),
            "FAILED" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }

    /// States from which a `process` call may claim the row.
    pub fn is_claimable(&self) -> bool {
        matches!(self, ProcessingStatus::Pending | ProcessingStatus::Failed)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cycle_id: Uuid,
    pub processing_status: String,
    pub ai_profile: Option<Json<SkillsProfile>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentRow {
    pub fn status(&self) -> Option<ProcessingStatus> {
        ProcessingStatus::parse(&self.processing_status)
    }

    pub fn profile(&self) -> Option<&SkillsProfile> {
        self.ai_profile.as_ref().map(|p| &p.0)
    }

    /// A PROCESSING row whose claim predates `cutoff` belongs to a worker that
    /// never finished; it may be claimed again.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status() == Some(ProcessingStatus::Processing)
            && self.processing_started_at.map_or(true, |t| t < cutoff)
    }
}
