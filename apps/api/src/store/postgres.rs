use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AssessmentStore, CareerPathStore, ClaimScope, EvaluationStore};
use crate::analysis_client::SkillsProfile;
use crate::errors::AppError;
use crate::models::assessment::AssessmentRow;
use crate::models::career_path::{
    CareerPathDetail, CareerPathRow, CareerPathStepRow, DevelopmentActionRow, NewCareerPath,
    StepWithActions,
};
use crate::models::evaluation::{
    EvaluationDetailRow, EvaluationRow, EvaluationWithDetails, NewEvaluation, STATUS_SUBMITTED,
};
use crate::models::user::{Competency, EvaluationCycle, User};

/// PostgreSQL implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn details_for(
        &self,
        evaluation_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<EvaluationDetailRow>>, AppError> {
        let rows = sqlx::query_as::<_, EvaluationDetailRow>(
            r#"
            SELECT d.id, d.evaluation_id, d.competency_id, c.name AS competency_name,
                   d.score, d.comments
            FROM evaluation_details d
            JOIN competencies c ON c.id = d.competency_id
            WHERE d.evaluation_id = ANY($1)
            ORDER BY d.evaluation_id, c.name
            "#,
        )
        .bind(evaluation_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<EvaluationDetailRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.evaluation_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

/// Translates constraint violations on `evaluations` into client errors.
fn map_evaluation_insert_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict(
                "Duplicate evaluation: this evaluator already submitted this relationship for \
                 the subject in the current cycle"
                    .to_string(),
            );
        }
        if db.is_check_violation() {
            return AppError::Validation(format!("Evaluation rejected by storage: {}", db.message()));
        }
    }
    AppError::Database(e)
}

#[async_trait]
impl EvaluationStore for PgStore {
    async fn fetch_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn fetch_cycle(&self, cycle_id: Uuid) -> Result<Option<EvaluationCycle>, AppError> {
        Ok(
            sqlx::query_as::<_, EvaluationCycle>("SELECT * FROM evaluation_cycles WHERE id = $1")
                .bind(cycle_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn fetch_competency_by_name(&self, name: &str) -> Result<Option<Competency>, AppError> {
        Ok(
            sqlx::query_as::<_, Competency>("SELECT * FROM competencies WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_evaluation(&self, evaluation: &NewEvaluation) -> Result<EvaluationRow, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, EvaluationRow>(
            r#"
            INSERT INTO evaluations
                (evaluator_id, subject_id, cycle_id, relationship, general_feedback, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(evaluation.evaluator_id)
        .bind(evaluation.subject_id)
        .bind(evaluation.cycle_id)
        .bind(evaluation.relationship.as_str())
        .bind(evaluation.general_feedback.as_deref())
        .bind(STATUS_SUBMITTED)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_evaluation_insert_error)?;

        for detail in &evaluation.details {
            sqlx::query(
                r#"
                INSERT INTO evaluation_details (evaluation_id, competency_id, score, comments)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(row.id)
            .bind(detail.competency_id)
            .bind(detail.score)
            .bind(detail.comments.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(map_evaluation_insert_error)?;
        }

        tx.commit().await?;

        info!(
            "Stored {} evaluation {} for subject {} in cycle {}",
            evaluation.relationship, row.id, row.subject_id, row.cycle_id
        );
        Ok(row)
    }

    async fn fetch_evaluation(
        &self,
        evaluation_id: Uuid,
    ) -> Result<Option<EvaluationWithDetails>, AppError> {
        let evaluation =
            sqlx::query_as::<_, EvaluationRow>("SELECT * FROM evaluations WHERE id = $1")
                .bind(evaluation_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(evaluation) = evaluation else {
            return Ok(None);
        };
        let mut details = self.details_for(&[evaluation.id]).await?;
        Ok(Some(EvaluationWithDetails {
            details: details.remove(&evaluation.id).unwrap_or_default(),
            evaluation,
        }))
    }

    async fn evaluations_for(
        &self,
        subject_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Vec<EvaluationWithDetails>, AppError> {
        let evaluations = sqlx::query_as::<_, EvaluationRow>(
            r#"
            SELECT * FROM evaluations
            WHERE subject_id = $1 AND cycle_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(subject_id)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = evaluations.iter().map(|e| e.id).collect();
        let mut details = self.details_for(&ids).await?;

        Ok(evaluations
            .into_iter()
            .map(|evaluation| EvaluationWithDetails {
                details: details.remove(&evaluation.id).unwrap_or_default(),
                evaluation,
            })
            .collect())
    }
}

#[async_trait]
impl AssessmentStore for PgStore {
    async fn find_assessment(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Option<AssessmentRow>, AppError> {
        Ok(sqlx::query_as::<_, AssessmentRow>(
            "SELECT * FROM assessments WHERE user_id = $1 AND cycle_id = $2",
        )
        .bind(user_id)
        .bind(cycle_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn ensure_pending(&self, user_id: Uuid, cycle_id: Uuid) -> Result<AssessmentRow, AppError> {
        sqlx::query(
            r#"
            INSERT INTO assessments (user_id, cycle_id, processing_status)
            VALUES ($1, $2, 'PENDING')
            ON CONFLICT (user_id, cycle_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(cycle_id)
        .execute(&self.pool)
        .await?;

        self.find_assessment(user_id, cycle_id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "assessment for user {user_id} cycle {cycle_id} vanished after insert"
            ))
        })
    }

    async fn claim_for_processing(
        &self,
        user_id: Uuid,
        cycle_id: Uuid,
        scope: ClaimScope,
    ) -> Result<Option<AssessmentRow>, AppError> {
        let (recover, stale_before) = match scope {
            ClaimScope::PendingOnly => (false, None),
            ClaimScope::Recover { stale_before } => (true, Some(stale_before)),
        };

        // Concurrent claimers serialize on the row lock; the loser re-evaluates
        // the WHERE clause against the winner's PROCESSING status and gets no row.
        let claimed = sqlx::query_as::<_, AssessmentRow>(
            r#"
            UPDATE assessments
            SET processing_status = 'PROCESSING',
                processing_started_at = now(),
                processing_completed_at = NULL,
                error_message = NULL,
                updated_at = now()
            WHERE user_id = $1 AND cycle_id = $2
              AND (processing_status = 'PENDING'
                   OR ($3 AND (processing_status = 'FAILED'
                               OR (processing_status = 'PROCESSING'
                                   AND (processing_started_at IS NULL
                                        OR processing_started_at < $4)))))
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(cycle_id)
        .bind(recover)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = &claimed {
            debug!("Claimed assessment {} for processing", row.id);
        }
        Ok(claimed)
    }

    async fn complete_assessment(
        &self,
        assessment_id: Uuid,
        claimed_at: DateTime<Utc>,
        profile: &SkillsProfile,
    ) -> Result<Option<AssessmentRow>, AppError> {
        Ok(sqlx::query_as::<_, AssessmentRow>(
            r#"
            UPDATE assessments
            SET processing_status = 'COMPLETED',
                ai_profile = $3,
                processing_completed_at = now(),
                error_message = NULL,
                updated_at = now()
            WHERE id = $1
              AND processing_status = 'PROCESSING'
              AND processing_started_at = $2
            RETURNING *
            "#,
        )
        .bind(assessment_id)
        .bind(claimed_at)
        .bind(Json(profile))
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn fail_assessment(
        &self,
        assessment_id: Uuid,
        claimed_at: DateTime<Utc>,
        error_message: &str,
    ) -> Result<Option<AssessmentRow>, AppError> {
        Ok(sqlx::query_as::<_, AssessmentRow>(
            r#"
            UPDATE assessments
            SET processing_status = 'FAILED',
                error_message = $3,
                processing_completed_at = now(),
                updated_at = now()
            WHERE id = $1
              AND processing_status = 'PROCESSING'
              AND processing_started_at = $2
            RETURNING *
            "#,
        )
        .bind(assessment_id)
        .bind(claimed_at)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn latest_completed_assessment(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AssessmentRow>, AppError> {
        Ok(sqlx::query_as::<_, AssessmentRow>(
            r#"
            SELECT * FROM assessments
            WHERE user_id = $1 AND processing_status = 'COMPLETED'
            ORDER BY processing_completed_at DESC NULLS LAST, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[async_trait]
impl CareerPathStore for PgStore {
    async fn replace_live_paths(
        &self,
        user_id: Uuid,
        assessment_id: Uuid,
        paths: &[NewCareerPath],
    ) -> Result<Vec<CareerPathRow>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent generations for the same user.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let archived = sqlx::query(
            r#"
            UPDATE career_paths
            SET status = 'ARCHIVED', updated_at = now()
            WHERE user_id = $1 AND status = 'GENERATED'
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let mut inserted = Vec::with_capacity(paths.len());
        for path in paths {
            let row = sqlx::query_as::<_, CareerPathRow>(
                r#"
                INSERT INTO career_paths
                    (user_id, assessment_id, path_name, recommended,
                     total_duration_months, feasibility_score, status)
                VALUES ($1, $2, $3, $4, $5, $6, 'GENERATED')
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(assessment_id)
            .bind(&path.path_name)
            .bind(path.recommended)
            .bind(path.total_duration_months)
            .bind(path.feasibility_score)
            .fetch_one(&mut *tx)
            .await?;

            for step in &path.steps {
                let step_id: Uuid = sqlx::query_scalar(
                    r#"
                    INSERT INTO career_path_steps
                        (career_path_id, step_order, title, target_role,
                         duration_months, required_competencies)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING id
                    "#,
                )
                .bind(row.id)
                .bind(step.step_order)
                .bind(&step.title)
                .bind(&step.target_role)
                .bind(step.duration_months)
                .bind(Json(&step.required_competencies))
                .fetch_one(&mut *tx)
                .await?;

                for (position, action) in (1_i32..).zip(&step.actions) {
                    sqlx::query(
                        r#"
                        INSERT INTO development_actions
                            (step_id, action_order, action_type, description)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(step_id)
                    .bind(position)
                    .bind(&action.action_type)
                    .bind(&action.description)
                    .execute(&mut *tx)
                    .await?;
                }
            }
            inserted.push(row);
        }

        tx.commit().await?;

        info!(
            "Archived {} and stored {} career paths for user {}",
            archived,
            inserted.len(),
            user_id
        );
        Ok(inserted)
    }

    async fn live_paths(&self, user_id: Uuid) -> Result<Vec<CareerPathRow>, AppError> {
        Ok(sqlx::query_as::<_, CareerPathRow>(
            r#"
            SELECT * FROM career_paths
            WHERE user_id = $1 AND status <> 'ARCHIVED'
            ORDER BY generated_at DESC, recommended DESC, path_name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn fetch_path(&self, path_id: Uuid) -> Result<Option<CareerPathRow>, AppError> {
        Ok(
            sqlx::query_as::<_, CareerPathRow>("SELECT * FROM career_paths WHERE id = $1")
                .bind(path_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn fetch_path_detail(
        &self,
        path_id: Uuid,
    ) -> Result<Option<CareerPathDetail>, AppError> {
        let Some(path) = self.fetch_path(path_id).await? else {
            return Ok(None);
        };

        let steps = sqlx::query_as::<_, CareerPathStepRow>(
            "SELECT * FROM career_path_steps WHERE career_path_id = $1 ORDER BY step_order ASC",
        )
        .bind(path_id)
        .fetch_all(&self.pool)
        .await?;

        let step_ids: Vec<Uuid> = steps.iter().map(|s| s.id).collect();
        let actions = sqlx::query_as::<_, DevelopmentActionRow>(
            "SELECT * FROM development_actions WHERE step_id = ANY($1) ORDER BY step_id, action_order ASC",
        )
        .bind(&step_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_step: HashMap<Uuid, Vec<DevelopmentActionRow>> = HashMap::new();
        for action in actions {
            by_step.entry(action.step_id).or_default().push(action);
        }

        Ok(Some(CareerPathDetail {
            path,
            steps: steps
                .into_iter()
                .map(|step| StepWithActions {
                    development_actions: by_step.remove(&step.id).unwrap_or_default(),
                    step,
                })
                .collect(),
        }))
    }

    async fn mark_path_in_progress(
        &self,
        path_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<Option<CareerPathRow>, AppError> {
        Ok(sqlx::query_as::<_, CareerPathRow>(
            r#"
            UPDATE career_paths
            SET status = 'IN_PROGRESS', started_at = $2, updated_at = now()
            WHERE id = $1 AND status = 'GENERATED'
            RETURNING *
            "#,
        )
        .bind(path_id)
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await?)
    }
}
