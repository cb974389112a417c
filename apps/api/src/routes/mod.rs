pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::evaluations::handlers as evaluations;
use crate::pipeline::handlers as pipeline;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Evaluations
        .route(
            "/api/v1/evaluations",
            post(evaluations::handle_submit_evaluation),
        )
        .route(
            "/api/v1/evaluations/:id",
            get(evaluations::handle_get_evaluation),
        )
        // Skills assessments
        .route(
            "/api/v1/users/:user_id/skills-assessment",
            get(pipeline::handle_latest_assessment),
        )
        .route(
            "/api/v1/users/:user_id/cycles/:cycle_id/skills-assessment",
            get(pipeline::handle_assessment_status),
        )
        .route(
            "/api/v1/users/:user_id/cycles/:cycle_id/skills-assessment/process",
            post(pipeline::handle_trigger_assessment),
        )
        // Career paths
        .route(
            "/api/v1/users/:user_id/career-paths",
            get(pipeline::handle_list_career_paths),
        )
        .route(
            "/api/v1/users/:user_id/career-paths/generate",
            post(pipeline::handle_generate_career_paths),
        )
        .route(
            "/api/v1/career-paths/:path_id/steps",
            get(pipeline::handle_career_path_steps),
        )
        .route(
            "/api/v1/career-paths/:path_id/accept",
            post(pipeline::handle_accept_career_path),
        )
        .with_state(state)
}
