use std::sync::Arc;

use crate::analysis_client::AnalysisService;
use crate::config::Config;
use crate::pipeline::{
    AssessmentOrchestrator, AssessmentQueue, CareerPathOrchestrator, CompletionDetector,
    PathLifecycle,
};
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub detector: Arc<CompletionDetector>,
    pub assessments: Arc<AssessmentOrchestrator>,
    pub career_paths: Arc<CareerPathOrchestrator>,
    pub lifecycle: Arc<PathLifecycle>,
}

impl AppState {
    /// Wires every pipeline component over one store and one analysis
    /// service. `queue` feeds the assessment worker.
    pub fn new(
        store: Arc<dyn Store>,
        analysis: Arc<dyn AnalysisService>,
        queue: AssessmentQueue,
        config: &Config,
    ) -> Self {
        Self {
            detector: Arc::new(CompletionDetector::new(store.clone(), queue)),
            assessments: Arc::new(AssessmentOrchestrator::new(
                store.clone(),
                analysis.clone(),
                config.assessment_deadline,
                config.assessment_stale_after,
            )),
            career_paths: Arc::new(CareerPathOrchestrator::new(store.clone(), analysis)),
            lifecycle: Arc::new(PathLifecycle::new(store.clone())),
            store,
        }
    }
}
