//! Persistence seam for the pipeline.
//!
//! `PgStore` is the production backend. Orchestrators and handlers only see
//! `Arc<dyn Store>`, the same way `AppState` carries the analysis client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::analysis_client::SkillsProfile;
use crate::errors::AppError;
use crate::models::assessment::AssessmentRow;
use crate::models::career_path::{CareerPathDetail, CareerPathRow, NewCareerPath};
use crate::models::evaluation::{EvaluationRow, EvaluationWithDetails, NewEvaluation};
use crate::models::user::{Competency, EvaluationCycle, User};

pub mod postgres;

pub use postgres::PgStore;

/// Evaluation data owned by the surrounding CRUD application.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn fetch_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn fetch_cycle(&self, cycle_id: Uuid) -> Result<Option<EvaluationCycle>, AppError>;

    async fn fetch_competency_by_name(&self, name: &str) -> Result<Option<Competency>, AppError>;

    /// Inserts an evaluation and its details atomically. A second submission for
    /// the same (evaluator, subject, cycle, relationship) is a `Conflict`.
    async fn create_evaluation(&self, evaluation: &NewEvaluation) -> Result<EvaluationRow, AppError>;

    async fn fetch_evaluation(
        &self,
        evaluation_id: Uuid,
    ) -> Result<Option<EvaluationWithDetails>, AppError>;

    async fn evaluations_for(
        &self,
        subject_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Vec<EvaluationWithDetails>, AppError>;
}

/// Which rows `claim_for_processing` may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimScope {
    /// A row nobody has started yet.
    PendingOnly,
    /// PENDING, FAILED, or a PROCESSING claim started before `stale_before`.
    Recover { stale_before: DateTime<Utc> },
}

/// Assessment rows, one per (user, cycle).
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn find_assessment(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Option<AssessmentRow>, AppError>;

    /// Returns the existing row for the pair, inserting a PENDING one if absent.
    async fn ensure_pending(&self, user_id: Uuid, cycle_id: Uuid) -> Result<AssessmentRow, AppError>;

    /// Atomic check-and-set to PROCESSING. `None` means another worker holds
    /// the row, or its status is outside `scope`.
    async fn claim_for_processing(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
        scope: ClaimScope,
    ) -> Result<Option<AssessmentRow>, AppError>;

    /// Writes the profile only while the claim stamped `claimed_at` still
    /// holds the row. `None` means the claim was taken over.
    async fn complete_assessment(
        &self,
        assessment_id: Uuid,
        claimed_at: DateTime<Utc>,
        profile: &SkillsProfile,
    ) -> Result<Option<AssessmentRow>, AppError>;

    /// Fenced like `complete_assessment`.
    async fn fail_assessment(
        &self,
        assessment_id: Uuid,
        claimed_at: DateTime<Utc>,
        error_message: &str,
    ) -> Result<Option<AssessmentRow>, AppError>;

    async fn latest_completed_assessment(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AssessmentRow>, AppError>;
}

/// Career paths with their steps and development actions.
#[async_trait]
pub trait CareerPathStore: Send + Sync {
    /// Archives every GENERATED path of the user and inserts `paths` in one
    /// transaction. Returns the inserted rows in input order.
    async fn replace_live_paths(
        &self,
        user_id: Uuid,
        assessment_id: Uuid,
        paths: &[NewCareerPath],
    ) -> Result<Vec<CareerPathRow>, AppError>;

    /// Non-archived paths, newest generation first.
    async fn live_paths(&self, user_id: Uuid) -> Result<Vec<CareerPathRow>, AppError>;

    async fn fetch_path(&self, path_id: Uuid) -> Result<Option<CareerPathRow>, AppError>;

    async fn fetch_path_detail(&self, path_id: Uuid)
        -> Result<Option<CareerPathDetail>, AppError>;

    /// GENERATED → IN_PROGRESS check-and-set. `None` if the path is missing or
    /// not GENERATED.
    async fn mark_path_in_progress(
        &self,
        path_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<Option<CareerPathRow>, AppError>;
}

pub trait Store: EvaluationStore + AssessmentStore + CareerPathStore {}

impl<T> Store for T where T: EvaluationStore + AssessmentStore + CareerPathStore {}
