//! Background assessment work: a bounded job channel and the worker that
//! drains it. Jobs for different (subject, cycle) pairs run concurrently up
//! to the configured limit; exclusion within a pair comes from the claim.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::assessment::{AssessmentOrchestrator, JobOrigin, ProcessOutcome};
use crate::pipeline::career_path::CareerPathOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentJob {
    pub subject_id: Uuid,
    pub cycle_id: Uuid,
    pub origin: JobOrigin,
}

/// Producer side of the job channel. Cheap to clone into request handlers.
#[derive(Clone)]
pub struct AssessmentQueue {
    sender: mpsc::Sender<AssessmentJob>,
}

impl AssessmentQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AssessmentJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Waits for room when the channel is full.
    pub async fn submit(&self, job: AssessmentJob) -> Result<(), AppError> {
        self.sender.send(job).await.map_err(|_| {
            AppError::Internal(anyhow::anyhow!("assessment worker is not running"))
        })?;
        debug!(
            "Queued {:?} assessment for subject {} cycle {}",
            job.origin, job.subject_id, job.cycle_id
        );
        Ok(())
    }
}

/// Spawns the worker loop. It ends once every `AssessmentQueue` is dropped.
pub fn spawn_assessment_worker(
    mut receiver: mpsc::Receiver<AssessmentJob>,
    assessments: Arc<AssessmentOrchestrator>,
    career_paths: Option<Arc<CareerPathOrchestrator>>,
    concurrency: usize,
) -> JoinHandle<()> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    tokio::spawn(async move {
        info!("Assessment worker started (concurrency: {})", concurrency.max(1));
        while let Some(job) = receiver.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let assessments = assessments.clone();
            let career_paths = career_paths.clone();
            tokio::spawn(async move {
                let _permit = permit;
                run_job(job, &assessments, career_paths.as_deref()).await;
            });
        }
        info!("Assessment worker stopped");
    })
}

async fn run_job(
    job: AssessmentJob,
    assessments: &AssessmentOrchestrator,
    career_paths: Option<&CareerPathOrchestrator>,
) {
    let AssessmentJob {
        subject_id,
        cycle_id,
        origin,
    } = job;

    match assessments.process(subject_id, cycle_id, origin).await {
        Ok(ProcessOutcome::Completed(row)) => {
            let Some(career_paths) = career_paths else {
                return;
            };
            match career_paths.generate(subject_id).await {
                Ok(paths) => info!(
                    "Generated {} career paths for user {} from assessment {}",
                    paths.len(),
                    subject_id,
                    row.id
                ),
                Err(e) => warn!("Career path generation for user {} failed: {}", subject_id, e),
            }
        }
        Ok(ProcessOutcome::AlreadyCompleted(_)) => {
            debug!(
                "Assessment for subject {} cycle {} already completed",
                subject_id, cycle_id
            );
        }
        Ok(ProcessOutcome::AlreadyFailed(row)) => {
            debug!("Assessment {} stays FAILED until triggered explicitly", row.id);
        }
        Ok(ProcessOutcome::Failed(row)) => {
            warn!(
                "Assessment {} failed: {}",
                row.id,
                row.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        Err(AppError::Conflict(msg)) => debug!("Skipping job: {}", msg),
        Err(e) => error!(
            "Assessment job for subject {} cycle {} aborted: {}",
            subject_id, cycle_id, e
        ),
    }
}
