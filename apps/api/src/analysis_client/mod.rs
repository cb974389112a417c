/// Analysis Client — the single point of entry for calls to the external
/// skills-analysis and path-generation service.
///
/// No other module talks to the analysis service over HTTP. Callers hold an
/// `Arc<dyn AnalysisService>` so the transport can be swapped for a fake in tests.
///
/// The remote side is unreliable by contract: multi-second latency and
/// intermittent 5xx responses are normal. Transient failures are retried by
/// `RetryingAnalysis`; everything else surfaces on the first attempt.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod retry;
pub mod types;

pub use http::HttpAnalysisClient;
pub use retry::{RetryPolicy, RetryingAnalysis};
pub use types::{
    GeneratedPathSet, PathGenerationRequest, SkillsAssessmentRequest, SkillsProfile,
};

pub const SKILLS_ASSESSMENT_PATH: &str = "skills-assessment";
pub const CAREER_PATH_GENERATOR_PATH: &str = "career-path-generator";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis service returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("analysis timed out after {0:?}")]
    DeadlineExceeded(Duration),
}

impl AnalysisError {
    /// Network-class failures worth another attempt. Decoding and 4xx
    /// responses are answers, not outages, and are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AnalysisError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AnalysisError::Api { status, .. } => *status == 429 || *status >= 500,
            AnalysisError::DeadlineExceeded(_) => true,
            AnalysisError::Parse(_) | AnalysisError::Protocol(_) => false,
        }
    }
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze_skills(
        &self,
        request: &SkillsAssessmentRequest,
    ) -> Result<SkillsProfile, AnalysisError>;

    async fn generate_paths(
        &self,
        request: &PathGenerationRequest,
    ) -> Result<GeneratedPathSet, AnalysisError>;
}
