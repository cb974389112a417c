//! In-memory doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::analysis_client::types::{
    GeneratedPath, GeneratedStep, RawAction, RoleReadiness,
};
use crate::analysis_client::{
    AnalysisError, AnalysisService, GeneratedPathSet, PathGenerationRequest,
    SkillsAssessmentRequest, SkillsProfile,
};
use crate::errors::AppError;
use crate::models::assessment::{AssessmentRow, ProcessingStatus};
use crate::models::career_path::{
    CareerPathDetail, CareerPathRow, CareerPathStepRow, DevelopmentActionRow, NewCareerPath,
    PathStatus, RequiredCompetency, StepWithActions,
};
use crate::models::evaluation::{
    EvaluationDetailRow, EvaluationRow, EvaluationWithDetails, NewEvaluation,
    NewEvaluationDetail, Relationship, STATUS_SUBMITTED,
};
use crate::models::user::{Competency, EvaluationCycle, User};
use crate::store::{AssessmentStore, CareerPathStore, ClaimScope, EvaluationStore};

// ────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
    users: Vec<User>,
    cycles: Vec<EvaluationCycle>,
    competencies: Vec<Competency>,
    evaluations: Vec<EvaluationRow>,
    details: Vec<EvaluationDetailRow>,
    assessments: Vec<AssessmentRow>,
    paths: Vec<CareerPathRow>,
    steps: Vec<CareerPathStepRow>,
    actions: Vec<DevelopmentActionRow>,
}

/// Store double with the same uniqueness rules and atomic claims as the
/// Postgres schema. One lock guards everything, so each call is a transaction.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, full_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let email = format!(
            "{}@example.com",
            full_name.to_lowercase().replace(' ', ".")
        );
        self.state.lock().await.users.push(User {
            id,
            email,
            full_name: full_name.to_string(),
            current_position: Some("Software Engineer".to_string()),
            department: Some("Engineering".to_string()),
            years_experience: Some("4".to_string()),
            created_at: Utc::now(),
        });
        id
    }

    pub async fn add_cycle(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.cycles.push(EvaluationCycle {
            id,
            name: name.to_string(),
            start_date: Utc::now(),
            end_date: None,
            status: "ACTIVE".to_string(),
            created_at: Utc::now(),
        });
        id
    }

    pub async fn add_competency(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.competencies.push(Competency {
            id,
            name: name.to_string(),
            description: None,
        });
        id
    }

    pub async fn assessment_count(&self) -> usize {
        self.state.lock().await.assessments.len()
    }

    pub async fn path_count(&self) -> usize {
        self.state.lock().await.paths.len()
    }

    /// Rewrites a row's claim timestamp, for exercising stale reclaims.
    pub async fn backdate_claim(&self, assessment_id: Uuid, started_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some(row) = state.assessments.iter_mut().find(|a| a.id == assessment_id) {
            row.processing_started_at = Some(started_at);
        }
    }

    pub async fn paths_with_status(&self, user_id: Uuid, status: PathStatus) -> Vec<CareerPathRow> {
        self.state
            .lock()
            .await
            .paths
            .iter()
            .filter(|p| p.user_id == user_id && p.status == status.as_str())
            .cloned()
            .collect()
    }
}

fn with_details(state: &State, evaluation: &EvaluationRow) -> EvaluationWithDetails {
    EvaluationWithDetails {
        evaluation: evaluation.clone(),
        details: state
            .details
            .iter()
            .filter(|d| d.evaluation_id == evaluation.id)
            .cloned()
            .collect(),
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn fetch_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn fetch_cycle(&self, cycle_id: Uuid) -> Result<Option<EvaluationCycle>, AppError> {
        let state = self.state.lock().await;
        Ok(state.cycles.iter().find(|c| c.id == cycle_id).cloned())
    }

    async fn fetch_competency_by_name(&self, name: &str) -> Result<Option<Competency>, AppError> {
        let state = self.state.lock().await;
        Ok(state.competencies.iter().find(|c| c.name == name).cloned())
    }

    async fn create_evaluation(&self, evaluation: &NewEvaluation) -> Result<EvaluationRow, AppError> {
        let mut state = self.state.lock().await;

        if evaluation.relationship == Relationship::SelfReview
            && evaluation.evaluator_id != evaluation.subject_id
        {
            return Err(AppError::Validation(
                "Evaluation rejected by storage: ck_self_evaluation".to_string(),
            ));
        }
        let duplicate = state.evaluations.iter().any(|e| {
            e.evaluator_id == evaluation.evaluator_id
                && e.subject_id == evaluation.subject_id
                && e.cycle_id == evaluation.cycle_id
                && e.relationship == evaluation.relationship.as_str()
        });
        if duplicate {
            return Err(AppError::Conflict("Duplicate evaluation".to_string()));
        }

        let now = Utc::now();
        let row = EvaluationRow {
            id: Uuid::new_v4(),
            evaluator_id: evaluation.evaluator_id,
            subject_id: evaluation.subject_id,
            cycle_id: evaluation.cycle_id,
            relationship: evaluation.relationship.as_str().to_string(),
            general_feedback: evaluation.general_feedback.clone(),
            status: STATUS_SUBMITTED.to_string(),
            created_at: now,
            updated_at: now,
        };
        for detail in &evaluation.details {
            state.details.push(EvaluationDetailRow {
                id: Uuid::new_v4(),
                evaluation_id: row.id,
                competency_id: detail.competency_id,
                competency_name: detail.competency_name.clone(),
                score: detail.score,
                comments: detail.comments.clone(),
            });
        }
        state.evaluations.push(row.clone());
        Ok(row)
    }

    async fn fetch_evaluation(
        &self,
        evaluation_id: Uuid,
    ) -> Result<Option<EvaluationWithDetails>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .evaluations
            .iter()
            .find(|e| e.id == evaluation_id)
            .map(|e| with_details(&state, e)))
    }

    async fn evaluations_for(
        &self,
        subject_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Vec<EvaluationWithDetails>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .evaluations
            .iter()
            .filter(|e| e.subject_id == subject_id && e.cycle_id == cycle_id)
            .map(|e| with_details(&state, e))
            .collect())
    }
}

fn holds_claim(row: &AssessmentRow, claimed_at: DateTime<Utc>) -> bool {
    row.status() == Some(ProcessingStatus::Processing)
        && row.processing_started_at == Some(claimed_at)
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn find_assessment(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Option<AssessmentRow>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .assessments
            .iter()
            .find(|a| a.user_id == user_id && a.cycle_id == cycle_id)
            .cloned())
    }

    async fn ensure_pending(&self, user_id: Uuid, cycle_id: Uuid) -> Result<AssessmentRow, AppError> {
        let mut state = self.state.lock().await;
        if let Some(row) = state
            .assessments
            .iter()
            .find(|a| a.user_id == user_id && a.cycle_id == cycle_id)
        {
            return Ok(row.clone());
        }
        let now = Utc::now();
        let row = AssessmentRow {
            id: Uuid::new_v4(),
            user_id,
            cycle_id,
            processing_status: ProcessingStatus::Pending.as_str().to_string(),
            ai_profile: None,
            processing_started_at: None,
            processing_completed_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        state.assessments.push(row.clone());
        Ok(row)
    }

    async fn claim_for_processing(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
        scope: ClaimScope,
    ) -> Result<Option<AssessmentRow>, AppError> {
        let mut state = self.state.lock().await;
        let Some(row) = state
            .assessments
            .iter_mut()
            .find(|a| a.user_id == user_id && a.cycle_id == cycle_id)
        else {
            return Ok(None);
        };

        let claimable = match scope {
            ClaimScope::PendingOnly => row.status() == Some(ProcessingStatus::Pending),
            ClaimScope::Recover { stale_before } => {
                row.status().is_some_and(|s| s.is_claimable()) || row.is_stale(stale_before)
            }
        };
        if !claimable {
            return Ok(None);
        }
        let now = Utc::now();
        row.processing_status = ProcessingStatus::Processing.as_str().to_string();
        row.processing_started_at = Some(now);
        row.processing_completed_at = None;
        row.error_message = None;
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn complete_assessment(
        &self,
        assessment_id: Uuid,
        claimed_at: DateTime<Utc>,
        profile: &SkillsProfile,
    ) -> Result<Option<AssessmentRow>, AppError> {
        let mut state = self.state.lock().await;
        let Some(row) = state
            .assessments
            .iter_mut()
            .find(|a| a.id == assessment_id && holds_claim(a, claimed_at))
        else {
            return Ok(None);
        };
        let now = Utc::now();
        row.processing_status = ProcessingStatus::Completed.as_str().to_string();
        row.ai_profile = Some(Json(profile.clone()));
        row.processing_completed_at = Some(now);
        row.error_message = None;
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn fail_assessment(
        &self,
        assessment_id: Uuid,
        claimed_at: DateTime<Utc>,
        error_message: &str,
    ) -> Result<Option<AssessmentRow>, AppError> {
        let mut state = self.state.lock().await;
        let Some(row) = state
            .assessments
            .iter_mut()
            .find(|a| a.id == assessment_id && holds_claim(a, claimed_at))
        else {
            return Ok(None);
        };
        let now = Utc::now();
        row.processing_status = ProcessingStatus::Failed.as_str().to_string();
        row.error_message = Some(error_message.to_string());
        row.processing_completed_at = Some(now);
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn latest_completed_assessment(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AssessmentRow>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .assessments
            .iter()
            .filter(|a| {
                a.user_id == user_id && a.status() == Some(ProcessingStatus::Completed)
            })
            .max_by_key(|a| a.processing_completed_at)
            .cloned())
    }
}

#[async_trait]
impl CareerPathStore for MemoryStore {
    async fn replace_live_paths(
        &self,
        user_id: Uuid,
        assessment_id: Uuid,
        paths: &[NewCareerPath],
    ) -> Result<Vec<CareerPathRow>, AppError> {
        let mut state = self.state.lock().await;
        for path in state.paths.iter_mut() {
            if path.user_id == user_id && path.status == PathStatus::Generated.as_str() {
                path.status = PathStatus::Archived.as_str().to_string();
            }
        }

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(paths.len());
        for path in paths {
            let row = CareerPathRow {
                id: Uuid::new_v4(),
                user_id,
                assessment_id: Some(assessment_id),
                path_name: path.path_name.clone(),
                recommended: path.recommended,
                total_duration_months: path.total_duration_months,
                feasibility_score: path.feasibility_score,
                status: PathStatus::Generated.as_str().to_string(),
                generated_at: now,
                started_at: None,
                completed_at: None,
            };
            for step in &path.steps {
                let step_id = Uuid::new_v4();
                state.steps.push(CareerPathStepRow {
                    id: step_id,
                    career_path_id: row.id,
                    step_order: step.step_order,
                    title: step.title.clone(),
                    target_role: step.target_role.clone(),
                    duration_months: step.duration_months,
                    required_competencies: Json(step.required_competencies.clone()),
                });
                for (position, action) in (1_i32..).zip(&step.actions) {
                    state.actions.push(DevelopmentActionRow {
                        id: Uuid::new_v4(),
                        step_id,
                        action_order: position,
                        action_type: action.action_type.clone(),
                        description: action.description.clone(),
                    });
                }
            }
            state.paths.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn live_paths(&self, user_id: Uuid) -> Result<Vec<CareerPathRow>, AppError> {
        let state = self.state.lock().await;
        let mut live: Vec<CareerPathRow> = state
            .paths
            .iter()
            .filter(|p| p.user_id == user_id && p.status != PathStatus::Archived.as_str())
            .cloned()
            .collect();
        live.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(live)
    }

    async fn fetch_path(&self, path_id: Uuid) -> Result<Option<CareerPathRow>, AppError> {
        let state = self.state.lock().await;
        Ok(state.paths.iter().find(|p| p.id == path_id).cloned())
    }

    async fn fetch_path_detail(
        &self,
        path_id: Uuid,
    ) -> Result<Option<CareerPathDetail>, AppError> {
        let state = self.state.lock().await;
        let Some(path) = state.paths.iter().find(|p| p.id == path_id).cloned() else {
            return Ok(None);
        };
        let mut steps: Vec<StepWithActions> = state
            .steps
            .iter()
            .filter(|s| s.career_path_id == path_id)
            .map(|s| StepWithActions {
                step: s.clone(),
                development_actions: state
                    .actions
                    .iter()
                    .filter(|a| a.step_id == s.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        steps.sort_by_key(|s| s.step.step_order);
        for step in &mut steps {
            step.development_actions.sort_by_key(|a| a.action_order);
        }
        Ok(Some(CareerPathDetail { path, steps }))
    }

    async fn mark_path_in_progress(
        &self,
        path_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<Option<CareerPathRow>, AppError> {
        let mut state = self.state.lock().await;
        let Some(path) = state
            .paths
            .iter_mut()
            .find(|p| p.id == path_id && p.status == PathStatus::Generated.as_str())
        else {
            return Ok(None);
        };
        path.status = PathStatus::InProgress.as_str().to_string();
        path.started_at = Some(started_at);
        Ok(Some(path.clone()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedAnalysis
// ────────────────────────────────────────────────────────────────────────────

/// Replays queued results in order. An empty queue answers with a protocol
/// error so a test never silently gets a default.
#[derive(Default)]
pub struct ScriptedAnalysis {
    profiles: StdMutex<VecDeque<Result<SkillsProfile, AnalysisError>>>,
    path_sets: StdMutex<VecDeque<Result<GeneratedPathSet, AnalysisError>>>,
    analyze_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    last_skills_request: StdMutex<Option<SkillsAssessmentRequest>>,
    delay: Option<Duration>,
}

impl ScriptedAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` on the tokio clock before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push_profile(&self, result: Result<SkillsProfile, AnalysisError>) {
        self.profiles.lock().unwrap().push_back(result);
    }

    pub fn push_path_set(&self, result: Result<GeneratedPathSet, AnalysisError>) {
        self.path_sets.lock().unwrap().push_back(result);
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn last_skills_request(&self) -> Option<SkillsAssessmentRequest> {
        self.last_skills_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze_skills(
        &self,
        request: &SkillsAssessmentRequest,
    ) -> Result<SkillsProfile, AnalysisError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_skills_request.lock().unwrap() = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.profiles.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(AnalysisError::Protocol("no scripted profile".to_string())))
    }

    async fn generate_paths(
        &self,
        _request: &PathGenerationRequest,
    ) -> Result<GeneratedPathSet, AnalysisError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.path_sets.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(AnalysisError::Protocol("no scripted path set".to_string())))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

pub fn unavailable() -> AnalysisError {
    AnalysisError::Api {
        status: 503,
        message: "service unavailable".to_string(),
    }
}

pub fn sample_profile() -> SkillsProfile {
    SkillsProfile {
        strengths: vec!["Communication".to_string()],
        growth_areas: vec!["Strategic Thinking".to_string()],
        hidden_talents: vec!["Mentoring".to_string()],
        readiness_for_roles: vec![RoleReadiness {
            role_name: "Tech Lead".to_string(),
            readiness_percentage: 72,
            reasoning: "Consistently rated highly by peers".to_string(),
        }],
    }
}

pub fn sample_path_set() -> GeneratedPathSet {
    GeneratedPathSet {
        generated_paths: vec![
            GeneratedPath {
                path_name: "Technical Leadership".to_string(),
                recommended: true,
                total_duration_months: 18.0,
                feasibility_score: Some(0.8),
                steps: vec![
                    GeneratedStep {
                        step_number: 1,
                        title: "Own a subsystem".to_string(),
                        target_role: "Senior Engineer".to_string(),
                        duration_months: 6,
                        required_competencies: vec![RequiredCompetency::Simple(
                            "Communication".to_string(),
                        )],
                        development_actions: vec![
                            RawAction::Text("Lead design reviews".to_string()),
                            RawAction::Structured {
                                kind: Some("Mentoring".to_string()),
                                description: "Pair with a staff engineer".to_string(),
                            },
                        ],
                    },
                    GeneratedStep {
                        step_number: 2,
                        title: "Lead a team".to_string(),
                        target_role: "Tech Lead".to_string(),
                        duration_months: 12,
                        required_competencies: vec![RequiredCompetency::Detailed {
                            name: "Strategic Thinking".to_string(),
                            current_level: Some(5),
                            required_level: Some(8),
                        }],
                        development_actions: vec![RawAction::Structured {
                            kind: None,
                            description: "Leadership fundamentals course".to_string(),
                        }],
                    },
                ],
            },
            GeneratedPath {
                path_name: "Product Track".to_string(),
                recommended: false,
                total_duration_months: 12.0,
                feasibility_score: Some(0.55),
                steps: vec![GeneratedStep {
                    step_number: 1,
                    title: "Shadow a product manager".to_string(),
                    target_role: "Associate PM".to_string(),
                    duration_months: 12,
                    required_competencies: vec![],
                    development_actions: vec![RawAction::Structured {
                        kind: Some("project".to_string()),
                        description: "Run a discovery sprint".to_string(),
                    }],
                }],
            },
        ],
    }
}

/// A subject with SELF, MANAGER and PEER evaluations over two competencies.
pub struct SeededCycle {
    pub subject_id: Uuid,
    pub manager_id: Uuid,
    pub peer_id: Uuid,
    pub cycle_id: Uuid,
}

pub async fn seed_users_and_cycle(store: &MemoryStore) -> SeededCycle {
    store.add_competency("Communication").await;
    store.add_competency("Leadership").await;
    SeededCycle {
        subject_id: store.add_user("Ana Ruiz").await,
        manager_id: store.add_user("Marta Gil").await,
        peer_id: store.add_user("Pablo Sanz").await,
        cycle_id: store.add_cycle("2026 H1").await,
    }
}

pub async fn submit(
    store: &MemoryStore,
    seeded: &SeededCycle,
    evaluator_id: Uuid,
    relationship: Relationship,
    scores: [i32; 2],
) -> EvaluationRow {
    let mut details = Vec::new();
    for (name, score) in ["Communication", "Leadership"].into_iter().zip(scores) {
        let competency = store
            .fetch_competency_by_name(name)
            .await
            .unwrap()
            .unwrap();
        details.push(NewEvaluationDetail {
            competency_id: competency.id,
            competency_name: competency.name,
            score,
            comments: None,
        });
    }
    store
        .create_evaluation(&NewEvaluation {
            evaluator_id,
            subject_id: seeded.subject_id,
            cycle_id: seeded.cycle_id,
            relationship,
            general_feedback: Some("Solid cycle".to_string()),
            details,
        })
        .await
        .unwrap()
}

/// Seeds the SELF[7,8] / MANAGER[8,9] / PEER[8,9] scenario.
pub async fn seed_complete_cycle(store: &MemoryStore) -> SeededCycle {
    let seeded = seed_users_and_cycle(store).await;
    submit(store, &seeded, seeded.subject_id, Relationship::SelfReview, [7, 8]).await;
    submit(store, &seeded, seeded.manager_id, Relationship::Manager, [8, 9]).await;
    submit(store, &seeded, seeded.peer_id, Relationship::Peer, [8, 9]).await;
    seeded
}
