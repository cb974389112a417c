//! Completion Detector — decides after each submission whether a subject's
//! cycle has enough perspectives to be analyzed.
//!
//! Read-then-decide only. The assessment row is created by the orchestrator
//! when the queued job runs.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::assessment::ProcessingStatus;
use crate::models::evaluation::{EvaluationWithDetails, Relationship};
use crate::pipeline::{AssessmentJob, AssessmentQueue, JobOrigin};
use crate::store::Store;

/// DIRECT_REPORT is optional.
pub const REQUIRED_RELATIONSHIPS: [Relationship; 3] = [
    Relationship::SelfReview,
    Relationship::Manager,
    Relationship::Peer,
];

pub fn coverage(evaluations: &[EvaluationWithDetails]) -> HashSet<Relationship> {
    evaluations
        .iter()
        .filter_map(|e| e.evaluation.relationship())
        .collect()
}

pub fn missing_relationships(coverage: &HashSet<Relationship>) -> Vec<Relationship> {
    REQUIRED_RELATIONSHIPS
        .into_iter()
        .filter(|r| !coverage.contains(r))
        .collect()
}

pub fn has_required_coverage(coverage: &HashSet<Relationship>) -> bool {
    missing_relationships(coverage).is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Enqueued,
    Incomplete(Vec<Relationship>),
    AlreadyTracked(Option<ProcessingStatus>),
}

pub struct CompletionDetector {
    store: Arc<dyn Store>,
    queue: AssessmentQueue,
}

impl CompletionDetector {
    pub fn new(store: Arc<dyn Store>, queue: AssessmentQueue) -> Self {
        Self { store, queue }
    }

    /// Called after every successful evaluation submission. Redundant calls
    /// are harmless: once a row exists for the pair nothing is queued.
    pub async fn on_submission(&self, subject_id: Uuid, cycle_id: Uuid) -> Result<Decision, AppError> {
        let evaluations = self.store.evaluations_for(subject_id, cycle_id).await?;
        let missing = missing_relationships(&coverage(&evaluations));
        if !missing.is_empty() {
            debug!(
                "Cycle {} for subject {} still missing {:?}",
                cycle_id, subject_id, missing
            );
            return Ok(Decision::Incomplete(missing));
        }

        if let Some(existing) = self.store.find_assessment(subject_id, cycle_id).await? {
            debug!(
                "Assessment {} already exists ({})",
                existing.id, existing.processing_status
            );
            return Ok(Decision::AlreadyTracked(existing.status()));
        }

        info!(
            "Cycle {} complete for subject {}; queueing skills assessment",
            cycle_id, subject_id
        );
        self.queue
            .submit(AssessmentJob {
                subject_id,
                cycle_id,
                origin: JobOrigin::Detected,
            })
            .await?;
        Ok(Decision::Enqueued)
    }

    /// Gate for explicit triggers: an incomplete cycle is unprocessable.
    pub async fn require_coverage(&self, subject_id: Uuid, cycle_id: Uuid) -> Result<(), AppError> {
        let evaluations = self.store.evaluations_for(subject_id, cycle_id).await?;
        let missing = missing_relationships(&coverage(&evaluations));
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|r| r.as_str()).collect();
        Err(AppError::UnprocessableEntity(format!(
            "Evaluation cycle is incomplete; missing {} evaluations",
            names.join(", ")
        )))
    }

    pub fn queue(&self) -> &AssessmentQueue {
        &self.queue
    }
}
