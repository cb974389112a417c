use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::career_path::{CareerPathRow, PathStatus};
use crate::store::Store;

pub fn allowed_transitions(from: PathStatus) -> Vec<PathStatus> {
    use PathStatus::*;
    match from {
        Generated => vec![InProgress, Archived],
        InProgress => vec![Completed],
        Completed => vec![],
        Archived => vec![],
    }
}

pub fn can_transition(from: PathStatus, to: PathStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Moves a user's path through its lifecycle. Every transition is a
/// compare-and-set on the stored status.
pub struct PathLifecycle {
    store: Arc<dyn Store>,
}

impl PathLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// GENERATED → IN_PROGRESS. `started_at` is written exactly once.
    pub async fn accept(&self, path_id: Uuid) -> Result<CareerPathRow, AppError> {
        if let Some(row) = self.store.mark_path_in_progress(path_id, Utc::now()).await? {
            info!("Career path {} accepted by user {}", row.id, row.user_id);
            return Ok(row);
        }

        let path = self
            .store
            .fetch_path(path_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Career path {path_id} not found")))?;

        Err(match path.status() {
            Some(PathStatus::InProgress) => {
                AppError::Conflict(format!("Career path {path_id} is already underway"))
            }
            Some(status) if !can_transition(status, PathStatus::InProgress) => AppError::Conflict(
                format!("Career path {path_id} cannot be accepted from status {status}"),
            ),
            _ => AppError::Conflict(format!(
                "Career path {path_id} changed while being accepted ({})",
                path.status
            )),
        })
    }
}
