use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::evaluation::Relationship;

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 10;

/// Body of `POST /api/v1/evaluations`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitEvaluationRequest {
    pub evaluator_id: Uuid,
    #[serde(alias = "employee_id")]
    pub subject_id: Uuid,
    pub cycle_id: Uuid,
    #[serde(alias = "evaluator_relationship")]
    pub relationship: String,
    pub answers: Vec<AnswerInput>,
    #[serde(default)]
    pub general_feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    #[serde(alias = "competency_name")]
    pub competency: String,
    pub score: i32,
    #[serde(default)]
    pub comments: Option<String>,
}

/// Checks everything that can be decided from the body alone. Runs before
/// any lookup or write.
pub fn validate_submission(request: &SubmitEvaluationRequest) -> Result<Relationship, AppError> {
    let relationship: Relationship = request
        .relationship
        .parse()
        .map_err(|e: crate::models::evaluation::UnknownRelationship| {
            AppError::Validation(e.to_string())
        })?;

    if relationship == Relationship::SelfReview && request.evaluator_id != request.subject_id {
        return Err(AppError::Validation(
            "Invalid relationship: a SELF evaluation requires evaluator_id and subject_id to match"
                .to_string(),
        ));
    }

    if request.answers.is_empty() {
        return Err(AppError::Validation("At least one answer is required".to_string()));
    }

    let mut seen = HashSet::new();
    for answer in &request.answers {
        let name = answer.competency.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Answer is missing its competency".to_string()));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&answer.score) {
            return Err(AppError::Validation(format!(
                "Score {} for '{}' must be between {} and {}",
                answer.score, name, MIN_SCORE, MAX_SCORE
            )));
        }
        if !seen.insert(name) {
            return Err(AppError::Validation(format!(
                "Competency '{name}' is rated more than once"
            )));
        }
    }

    Ok(relationship)
}
