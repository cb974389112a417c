//! Assessment Orchestrator — drives one (subject, cycle) through
//! `PENDING → PROCESSING → {COMPLETED, FAILED}`.
//!
//! Flow: ensure row → claim (atomic check-and-set) → gather evaluations →
//!       analyze under a deadline → persist profile or failure.
//!
//! A FAILED row is only re-entered through an explicit trigger. A PROCESSING
//! row older than `stale_after` is considered abandoned and an explicit
//! trigger may reclaim it. Results are written only while the claim still
//! holds the row.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis_client::types::{CompetencyScore, EvaluationInput};
use crate::analysis_client::{AnalysisError, AnalysisService, SkillsAssessmentRequest, SkillsProfile};
use crate::errors::AppError;
use crate::models::assessment::{AssessmentRow, ProcessingStatus};
use crate::models::evaluation::EvaluationWithDetails;
use crate::store::{ClaimScope, Store};

/// Who asked for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    /// The completion detector. Only a PENDING row is taken.
    Detected,
    /// An explicit trigger. FAILED and abandoned rows are re-entered.
    Explicit,
}

#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Completed(AssessmentRow),
    /// Nothing to do; the stored profile is returned untouched.
    AlreadyCompleted(AssessmentRow),
    /// A detected job found a FAILED row; it waits for an explicit trigger.
    AlreadyFailed(AssessmentRow),
    Failed(AssessmentRow),
}

pub struct AssessmentOrchestrator {
    store: Arc<dyn Store>,
    analysis: Arc<dyn AnalysisService>,
    deadline: Duration,
    stale_after: Duration,
}

impl AssessmentOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        analysis: Arc<dyn AnalysisService>,
        deadline: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            analysis,
            deadline,
            stale_after,
        }
    }

    fn stale_cutoff(&self) -> DateTime<Utc> {
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .unwrap_or_else(|_| chrono::Duration::weeks(52));
        Utc::now()
            .checked_sub_signed(stale_after)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `Conflict` if a live worker currently holds the pair.
    pub async fn ensure_not_running(&self, subject_id: Uuid, cycle_id: Uuid) -> Result<(), AppError> {
        match self.store.find_assessment(subject_id, cycle_id).await? {
            Some(row) if in_flight(&row, self.stale_cutoff()) => Err(already_running(subject_id, cycle_id)),
            _ => Ok(()),
        }
    }

    pub async fn process(
        &self,
        subject_id: Uuid,
        cycle_id: Uuid,
        origin: JobOrigin,
    ) -> Result<ProcessOutcome, AppError> {
        let existing = self.store.ensure_pending(subject_id, cycle_id).await?;
        let cutoff = self.stale_cutoff();

        match existing.status() {
            Some(ProcessingStatus::Completed) => {
                info!("Assessment {} already completed; skipping", existing.id);
                return Ok(ProcessOutcome::AlreadyCompleted(existing));
            }
            Some(ProcessingStatus::Failed) if origin == JobOrigin::Detected => {
                info!(
                    "Assessment {} failed earlier; waiting for an explicit trigger",
                    existing.id
                );
                return Ok(ProcessOutcome::AlreadyFailed(existing));
            }
            Some(ProcessingStatus::Processing)
                if origin == JobOrigin::Detected || !existing.is_stale(cutoff) =>
            {
                return Err(already_running(subject_id, cycle_id));
            }
            Some(ProcessingStatus::Processing) => {
                warn!(
                    "Reclaiming abandoned assessment {} (claimed at {:?})",
                    existing.id, existing.processing_started_at
                );
            }
            _ => {}
        }

        let scope = match origin {
            JobOrigin::Detected => ClaimScope::PendingOnly,
            JobOrigin::Explicit => ClaimScope::Recover {
                stale_before: cutoff,
            },
        };
        let Some(claimed) = self
            .store
            .claim_for_processing(subject_id, cycle_id, scope)
            .await?
        else {
            return Err(already_running(subject_id, cycle_id));
        };
        let claimed_at = claimed.processing_started_at.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "claimed assessment {} has no claim timestamp",
                claimed.id
            ))
        })?;

        info!(
            "Processing assessment {} for subject {} cycle {}",
            claimed.id, subject_id, cycle_id
        );

        let result = match tokio::time::timeout(self.deadline, self.analyze(subject_id, cycle_id)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Analysis(
                AnalysisError::DeadlineExceeded(self.deadline).to_string(),
            )),
        };

        match result {
            Ok(profile) => {
                let row = self
                    .store
                    .complete_assessment(claimed.id, claimed_at, &profile)
                    .await?
                    .ok_or_else(|| claim_lost(claimed.id))?;
                info!(
                    "Assessment {} completed: {} strengths, {} growth areas",
                    row.id,
                    profile.strengths.len(),
                    profile.growth_areas.len()
                );
                Ok(ProcessOutcome::Completed(row))
            }
            Err(e) => {
                let message = failure_message(&e);
                warn!("Assessment {} failed: {}", claimed.id, message);
                let row = self
                    .store
                    .fail_assessment(claimed.id, claimed_at, &message)
                    .await?
                    .ok_or_else(|| claim_lost(claimed.id))?;
                Ok(ProcessOutcome::Failed(row))
            }
        }
    }

    async fn analyze(&self, subject_id: Uuid, cycle_id: Uuid) -> Result<SkillsProfile, AppError> {
        let evaluations = self.store.evaluations_for(subject_id, cycle_id).await?;
        let request = build_payload(subject_id, cycle_id, &evaluations);
        self.analysis
            .analyze_skills(&request)
            .await
            .map_err(|e| AppError::Analysis(e.to_string()))
    }
}

fn in_flight(row: &AssessmentRow, cutoff: DateTime<Utc>) -> bool {
    row.status() == Some(ProcessingStatus::Processing) && !row.is_stale(cutoff)
}

fn already_running(subject_id: Uuid, cycle_id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "Skills assessment for user {subject_id} in cycle {cycle_id} is already in progress"
    ))
}

fn claim_lost(assessment_id: Uuid) -> AppError {
    warn!("Claim on assessment {assessment_id} was taken over; discarding result");
    AppError::Conflict(format!(
        "Assessment {assessment_id} was reclaimed by another worker"
    ))
}

fn failure_message(error: &AppError) -> String {
    match error {
        AppError::Analysis(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Groups every submitted evaluation by relationship with its per-competency
/// scores. Rows with an unrecognised relationship are skipped.
pub fn build_payload(
    subject_id: Uuid,
    cycle_id: Uuid,
    evaluations: &[EvaluationWithDetails],
) -> SkillsAssessmentRequest {
    let evaluations = evaluations
        .iter()
        .filter_map(|e| {
            let Some(relationship) = e.evaluation.relationship() else {
                warn!(
                    "Evaluation {} has unknown relationship '{}'",
                    e.evaluation.id, e.evaluation.relationship
                );
                return None;
            };
            Some(EvaluationInput {
                relationship,
                competencies: e
                    .details
                    .iter()
                    .map(|d| CompetencyScore {
                        competency_name: d.competency_name.clone(),
                        score: d.score,
                        comments: d.comments.clone(),
                    })
                    .collect(),
            })
        })
        .collect();

    SkillsAssessmentRequest {
        user_id: subject_id,
        cycle_id,
        evaluations,
    }
}
