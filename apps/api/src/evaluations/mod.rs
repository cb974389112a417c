//! 360° evaluation intake.
//!
//! Flow: validate body → resolve cycle, people and competencies →
//!       insert evaluation with details → hand off to the completion detector.

pub mod handlers;
pub mod validation;

use tracing::info;

use crate::errors::AppError;
use crate::models::evaluation::{EvaluationRow, NewEvaluation, NewEvaluationDetail};
use crate::store::Store;

use validation::{validate_submission, SubmitEvaluationRequest};

/// Validates and stores one submission. Unknown cycle, people or competencies
/// are `NotFound`; nothing is written unless every reference resolves.
pub async fn record_evaluation(
    store: &dyn Store,
    request: &SubmitEvaluationRequest,
) -> Result<EvaluationRow, AppError> {
    let relationship = validate_submission(request)?;

    store
        .fetch_cycle(request.cycle_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Evaluation cycle {} not found", request.cycle_id)))?;
    store
        .fetch_user(request.evaluator_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Evaluator {} not found", request.evaluator_id)))?;
    store
        .fetch_user(request.subject_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", request.subject_id)))?;

    let mut details = Vec::with_capacity(request.answers.len());
    for answer in &request.answers {
        let name = answer.competency.trim();
        let competency = store
            .fetch_competency_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Competency '{name}' not found")))?;
        details.push(NewEvaluationDetail {
            competency_id: competency.id,
            competency_name: competency.name,
            score: answer.score,
            comments: answer.comments.clone(),
        });
    }

    let row = store
        .create_evaluation(&NewEvaluation {
            evaluator_id: request.evaluator_id,
            subject_id: request.subject_id,
            cycle_id: request.cycle_id,
            relationship,
            general_feedback: request.general_feedback.clone(),
            details,
        })
        .await?;

    info!(
        "Evaluation {} submitted ({} answers)",
        row.id,
        request.answers.len()
    );
    Ok(row)
}
