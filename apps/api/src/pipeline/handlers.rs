//! Axum route handlers for skills assessments and career paths.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::assessment::{AssessmentRow, ProcessingStatus};
use crate::models::career_path::{CareerPathDetail, CareerPathRow};
use crate::pipeline::{AssessmentJob, JobOrigin};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub user_id: Uuid,
    pub cycle_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CareerPathsResponse {
    pub user_id: Uuid,
    pub career_paths: Vec<CareerPathRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Skills assessments
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/users/:user_id/skills-assessment
///
/// The most recent completed assessment across cycles.
pub async fn handle_latest_assessment(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AssessmentRow>, AppError> {
    state
        .store
        .fetch_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    let row = state
        .store
        .latest_completed_assessment(user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Skills assessment for user {user_id} has not been processed yet"
            ))
        })?;
    Ok(Json(row))
}

/// GET /api/v1/users/:user_id/cycles/:cycle_id/skills-assessment
pub async fn handle_assessment_status(
    State(state): State<AppState>,
    Path((user_id, cycle_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AssessmentRow>, AppError> {
    let row = state
        .store
        .find_assessment(user_id, cycle_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No skills assessment for user {user_id} in cycle {cycle_id}"
            ))
        })?;
    Ok(Json(row))
}

/// POST /api/v1/users/:user_id/cycles/:cycle_id/skills-assessment/process
///
/// Explicit (re)trigger. Queues the job and returns 202; a completed
/// assessment is reported with 200 and left alone.
pub async fn handle_trigger_assessment(
    State(state): State<AppState>,
    Path((user_id, cycle_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<TriggerResponse>), AppError> {
    state
        .store
        .fetch_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    state
        .store
        .fetch_cycle(cycle_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Evaluation cycle {cycle_id} not found")))?;

    state.detector.require_coverage(user_id, cycle_id).await?;
    state.assessments.ensure_not_running(user_id, cycle_id).await?;

    let existing = state.store.find_assessment(user_id, cycle_id).await?;
    if let Some(row) = existing.filter(|r| r.status() == Some(ProcessingStatus::Completed)) {
        return Ok((
            StatusCode::OK,
            Json(TriggerResponse {
                user_id,
                cycle_id,
                status: row.processing_status,
            }),
        ));
    }

    state
        .detector
        .queue()
        .submit(AssessmentJob {
            subject_id: user_id,
            cycle_id,
            origin: JobOrigin::Explicit,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            user_id,
            cycle_id,
            status: "QUEUED".to_string(),
        }),
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Career paths
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/users/:user_id/career-paths
pub async fn handle_list_career_paths(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CareerPathsResponse>, AppError> {
    let career_paths = state.career_paths.live_or_generate(user_id).await?;
    Ok(Json(CareerPathsResponse {
        user_id,
        career_paths,
    }))
}

/// POST /api/v1/users/:user_id/career-paths/generate
pub async fn handle_generate_career_paths(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<(StatusCode, Json<CareerPathsResponse>), AppError> {
    let career_paths = state.career_paths.generate(user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CareerPathsResponse {
            user_id,
            career_paths,
        }),
    ))
}

/// GET /api/v1/career-paths/:path_id/steps
pub async fn handle_career_path_steps(
    State(state): State<AppState>,
    Path(path_id): Path<Uuid>,
) -> Result<Json<CareerPathDetail>, AppError> {
    let detail = state
        .store
        .fetch_path_detail(path_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Career path {path_id} not found")))?;
    Ok(Json(detail))
}

/// POST /api/v1/career-paths/:path_id/accept
pub async fn handle_accept_career_path(
    State(state): State<AppState>,
    Path(path_id): Path<Uuid>,
) -> Result<Json<CareerPathRow>, AppError> {
    let row = state.lifecycle.accept(path_id).await?;
    Ok(Json(row))
}
