//! Axum route handlers for the Evaluations API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluations::record_evaluation;
use crate::evaluations::validation::SubmitEvaluationRequest;
use crate::models::evaluation::{EvaluationRow, EvaluationWithDetails};
use crate::state::AppState;

/// POST /api/v1/evaluations
///
/// Responds as soon as the evaluation is stored. The completion check runs on
/// its own task.
pub async fn handle_submit_evaluation(
    State(state): State<AppState>,
    Json(request): Json<SubmitEvaluationRequest>,
) -> Result<(StatusCode, Json<EvaluationRow>), AppError> {
    let row = record_evaluation(state.store.as_ref(), &request).await?;

    let detector = state.detector.clone();
    let (subject_id, cycle_id) = (row.subject_id, row.cycle_id);
    tokio::spawn(async move {
        if let Err(e) = detector.on_submission(subject_id, cycle_id).await {
            warn!(
                "Completion check for subject {} cycle {} failed: {}",
                subject_id, cycle_id, e
            );
        }
    });

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/evaluations/:id
pub async fn handle_get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EvaluationWithDetails>, AppError> {
    let evaluation = state
        .store
        .fetch_evaluation(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Evaluation {id} not found")))?;
    Ok(Json(evaluation))
}
