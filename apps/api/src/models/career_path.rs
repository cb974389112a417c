use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a generated career path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStatus {
    Generated,
    InProgress,
    Completed,
    Archived,
}

impl PathStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathStatus::Generated => "GENERATED",
            PathStatus::InProgress => "IN_PROGRESS",
            PathStatus::Completed => "COMPLETED",
            PathStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GENERATED" => Some(PathStatus::Generated),
            "IN_PROGRESS" => Some(PathStatus::InProgress),
            "COMPLETED" => Some(PathStatus::Completed),
            "ARCHIVED" => Some(PathStatus::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for PathStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A competency a step asks for. The generator emits either a bare name or an
/// object carrying the current and target levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequiredCompetency {
    Simple(String),
    Detailed {
        name: String,
        #[serde(default)]
        current_level: Option<u8>,
        #[serde(default)]
        required_level: Option<u8>,
    },
}

impl RequiredCompetency {
    pub fn name(&self) -> &str {
        match self {
            RequiredCompetency::Simple(name) => name,
            RequiredCompetency::Detailed { name, .. } => name,
        }
    }
}

pub const DEFAULT_ACTION_KIND: &str = "training";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CareerPathRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assessment_id: Option<Uuid>,
    pub path_name: String,
    pub recommended: bool,
    pub total_duration_months: f64,
    pub feasibility_score: Option<f64>,
    pub status: String,
    pub generated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CareerPathRow {
    pub fn status(&self) -> Option<PathStatus> {
        PathStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CareerPathStepRow {
    pub id: Uuid,
    pub career_path_id: Uuid,
    pub step_order: i32,
    pub title: String,
    pub target_role: String,
    pub duration_months: i32,
    pub required_competencies: Json<Vec<RequiredCompetency>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DevelopmentActionRow {
    pub id: Uuid,
    pub step_id: Uuid,
    /// 1-based position within the step, in generator order.
    pub action_order: i32,
    pub action_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepWithActions {
    #[serde(flatten)]
    pub step: CareerPathStepRow,
    pub development_actions: Vec<DevelopmentActionRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CareerPathDetail {
    #[serde(flatten)]
    pub path: CareerPathRow,
    pub steps: Vec<StepWithActions>,
}

/// A path ready to be written, already normalized and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCareerPath {
    pub path_name: String,
    pub recommended: bool,
    pub total_duration_months: f64,
    pub feasibility_score: Option<f64>,
    pub steps: Vec<NewCareerPathStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCareerPathStep {
    pub step_order: i32,
    pub title: String,
    pub target_role: String,
    pub duration_months: i32,
    pub required_competencies: Vec<RequiredCompetency>,
    pub actions: Vec<NewDevelopmentAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDevelopmentAction {
    pub action_type: String,
    pub description: String,
}
