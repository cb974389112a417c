//! Career Path Orchestrator — turns the latest completed assessment into a
//! fresh live set of career paths.
//!
//! Flow: latest COMPLETED assessment → user profile → generate_paths →
//!       normalize + validate → archive-then-insert (one transaction).
//!
//! A malformed set is rejected before anything is written, so the previous
//! live set survives a bad generation.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis_client::types::{GeneratedPath, GeneratedStep, RawAction, UserProfile};
use crate::analysis_client::{AnalysisError, AnalysisService, GeneratedPathSet, PathGenerationRequest};
use crate::errors::AppError;
use crate::models::career_path::{
    CareerPathRow, NewCareerPath, NewCareerPathStep, NewDevelopmentAction, DEFAULT_ACTION_KIND,
};
use crate::models::user::User;
use crate::store::Store;

pub struct CareerPathOrchestrator {
    store: Arc<dyn Store>,
    analysis: Arc<dyn AnalysisService>,
}

impl CareerPathOrchestrator {
    pub fn new(store: Arc<dyn Store>, analysis: Arc<dyn AnalysisService>) -> Self {
        Self { store, analysis }
    }

    pub async fn generate(&self, user_id: Uuid) -> Result<Vec<CareerPathRow>, AppError> {
        let user = self
            .store
            .fetch_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
        let assessment = self
            .store
            .latest_completed_assessment(user_id)
            .await?
            .ok_or(AppError::NoAnalysisAvailable(user_id))?;
        let profile = assessment.profile().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "completed assessment {} has no stored profile",
                assessment.id
            ))
        })?;

        info!(
            "Generating career paths for user {} from assessment {}",
            user_id, assessment.id
        );
        let request = PathGenerationRequest {
            user_profile: user_profile(&user),
            ai_profile: profile,
        };
        let generated = self
            .analysis
            .generate_paths(&request)
            .await
            .map_err(|e| AppError::Analysis(e.to_string()))?;

        let paths = normalize_path_set(generated).map_err(|e| {
            warn!("Rejected generated path set for user {}: {}", user_id, e);
            AppError::Analysis(e.to_string())
        })?;

        self.store
            .replace_live_paths(user_id, assessment.id, &paths)
            .await
    }

    /// Live paths, generating them first if none exist yet.
    pub async fn live_or_generate(&self, user_id: Uuid) -> Result<Vec<CareerPathRow>, AppError> {
        let live = self.store.live_paths(user_id).await?;
        if !live.is_empty() {
            return Ok(live);
        }
        self.generate(user_id).await
    }
}

pub fn user_profile(user: &User) -> UserProfile {
    UserProfile {
        user_id: user.id,
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        current_position: user.current_position.clone(),
        department: user.department.clone(),
        years_experience: user.years_experience.clone(),
    }
}

pub fn normalize_path_set(set: GeneratedPathSet) -> Result<Vec<NewCareerPath>, AnalysisError> {
    if set.generated_paths.is_empty() {
        return Err(AnalysisError::Protocol("generator returned no paths".to_string()));
    }
    set.generated_paths.into_iter().map(normalize_path).collect()
}

fn normalize_path(path: GeneratedPath) -> Result<NewCareerPath, AnalysisError> {
    let name = path.path_name.trim().to_string();
    if name.is_empty() {
        return Err(AnalysisError::Protocol("path without a name".to_string()));
    }
    if path.steps.is_empty() {
        return Err(AnalysisError::Protocol(format!("path '{name}' has no steps")));
    }
    if let Some(score) = path.feasibility_score {
        if !(0.0..=1.0).contains(&score) {
            return Err(AnalysisError::Protocol(format!(
                "path '{name}' has feasibility {score} outside [0, 1]"
            )));
        }
    }
    if !path.total_duration_months.is_finite() || path.total_duration_months < 0.0 {
        return Err(AnalysisError::Protocol(format!(
            "path '{name}' has invalid total duration {}",
            path.total_duration_months
        )));
    }

    let mut numbers: Vec<u32> = path.steps.iter().map(|s| s.step_number).collect();
    numbers.sort_unstable();
    let contiguous = numbers.iter().zip(1u32..).all(|(n, expected)| *n == expected);
    if !contiguous {
        return Err(AnalysisError::Protocol(format!(
            "path '{name}' step numbers {numbers:?} are not 1..{}",
            numbers.len()
        )));
    }

    let steps = path
        .steps
        .into_iter()
        .map(normalize_step)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NewCareerPath {
        path_name: name,
        recommended: path.recommended,
        total_duration_months: path.total_duration_months,
        feasibility_score: path.feasibility_score,
        steps,
    })
}

fn normalize_step(step: GeneratedStep) -> Result<NewCareerPathStep, AnalysisError> {
    let out_of_range = |field: &str, value: u32| {
        AnalysisError::Protocol(format!("step {field} {value} out of range"))
    };
    Ok(NewCareerPathStep {
        step_order: i32::try_from(step.step_number)
            .map_err(|_| out_of_range("number", step.step_number))?,
        title: step.title,
        target_role: step.target_role,
        duration_months: i32::try_from(step.duration_months)
            .map_err(|_| out_of_range("duration", step.duration_months))?,
        required_competencies: step
            .required_competencies
            .into_iter()
            .filter(|c| !c.name().trim().is_empty())
            .collect(),
        actions: step.development_actions.into_iter().map(normalize_action).collect(),
    })
}

/// Plain strings and structured actions without a usable type get the
/// default kind. Kinds are stored lower-case.
pub fn normalize_action(action: RawAction) -> NewDevelopmentAction {
    let (kind, description) = match action {
        RawAction::Text(description) => (None, description),
        RawAction::Structured { kind, description } => (kind, description),
    };
    let action_type = kind
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| DEFAULT_ACTION_KIND.to_string());
    NewDevelopmentAction {
        action_type,
        description: description.trim().to_string(),
    }
}
