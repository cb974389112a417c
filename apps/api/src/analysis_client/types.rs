//! Request and response bodies exchanged with the analysis service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::career_path::RequiredCompetency;
use crate::models::evaluation::Relationship;

// ────────────────────────────────────────────────────────────────────────────
// POST /skills-assessment
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillsAssessmentRequest {
    pub user_id: Uuid,
    pub cycle_id: Uuid,
    pub evaluations: Vec<EvaluationInput>,
}

/// Every competency rating one evaluator gave, tagged with their relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub relationship: Relationship,
    pub competencies: Vec<CompetencyScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyScore {
    pub competency_name: String,
    pub score: i32,
    pub comments: Option<String>,
}

/// The skills profile derived from a completed cycle. Persisted verbatim as
/// the assessment payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillsProfile {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub growth_areas: Vec<String>,
    #[serde(default)]
    pub hidden_talents: Vec<String>,
    #[serde(default)]
    pub readiness_for_roles: Vec<RoleReadiness>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleReadiness {
    pub role_name: String,
    pub readiness_percentage: u32,
    #[serde(default)]
    pub reasoning: String,
}

// ────────────────────────────────────────────────────────────────────────────
// POST /career-path-generator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub current_position: Option<String>,
    pub department: Option<String>,
    pub years_experience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathGenerationRequest {
    pub user_profile: UserProfile,
    pub ai_profile: SkillsProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPathSet {
    #[serde(default)]
    pub generated_paths: Vec<GeneratedPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPath {
    pub path_name: String,
    #[serde(default)]
    pub recommended: bool,
    pub total_duration_months: f64,
    #[serde(default)]
    pub feasibility_score: Option<f64>,
    #[serde(default)]
    pub steps: Vec<GeneratedStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedStep {
    pub step_number: u32,
    #[serde(default)]
    pub title: String,
    pub target_role: String,
    pub duration_months: u32,
    #[serde(default)]
    pub required_competencies: Vec<RequiredCompetency>,
    #[serde(default)]
    pub development_actions: Vec<RawAction>,
}

/// Development actions arrive either as `{type, description}` objects or as
/// plain strings. Normalized into one shape before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAction {
    Text(String),
    Structured {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        description: String,
    },
}
