use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{GeneratedPathSet, PathGenerationRequest, SkillsAssessmentRequest, SkillsProfile};
use super::{AnalysisError, AnalysisService, CAREER_PATH_GENERATOR_PATH, SKILLS_ASSESSMENT_PATH};

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    detail: String,
}

/// reqwest transport for the analysis service. Makes exactly one attempt per
/// call; wrap it in `RetryingAnalysis` for the retry policy.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, AnalysisError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ServiceErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            if status.as_u16() == 429 || status.is_server_error() {
                warn!("Analysis service returned {} for {}: {}", status, path, message);
            }
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        debug!("Analysis call to {} succeeded ({} bytes)", path, text.len());
        serde_json::from_str(&text).map_err(AnalysisError::Parse)
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze_skills(
        &self,
        request: &SkillsAssessmentRequest,
    ) -> Result<SkillsProfile, AnalysisError> {
        self.post_json(SKILLS_ASSESSMENT_PATH, request).await
    }

    async fn generate_paths(
        &self,
        request: &PathGenerationRequest,
    ) -> Result<GeneratedPathSet, AnalysisError> {
        self.post_json(CAREER_PATH_GENERATOR_PATH, request).await
    }
}
