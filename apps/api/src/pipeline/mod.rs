//! Evaluation-completion-to-insight pipeline.
//!
//! Flow: evaluation submitted → `CompletionDetector` → `AssessmentQueue` →
//!       worker → `AssessmentOrchestrator` → `CareerPathOrchestrator`.
//!
//! Users then move a generated path through `PathLifecycle`.

pub mod assessment;
pub mod career_path;
pub mod detector;
pub mod handlers;
pub mod lifecycle;
pub mod worker;

pub use assessment::{AssessmentOrchestrator, JobOrigin};
pub use career_path::CareerPathOrchestrator;
pub use detector::CompletionDetector;
pub use lifecycle::PathLifecycle;
pub use worker::{spawn_assessment_worker, AssessmentJob, AssessmentQueue};
