// ABOUTME: Application-level store holding one processing controller per analysis kind
// ABOUTME: Runs validate -> submit -> start and surfaces every failure on the kind's error field

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::controller::{CrossValidationKind, FactorAnalysisKind, ProcessingController};
use crate::error::Result;
use crate::model::SelectableOption;
use crate::poller::PollOptions;
use crate::remote::TaskApi;
use crate::submission::{
    submit_cross_validation, submit_factor_analysis, CrossValidationRequest,
    FactorAnalysisRequest,
};

/// Lives above the views. Views receive clones of the controllers, so a view
/// can be dropped and recreated without losing a running job.
#[derive(Clone)]
pub struct AnalysisStore {
    api: Arc<dyn TaskApi>,
    pub factor_analysis: ProcessingController<FactorAnalysisKind>,
    pub cross_validation: ProcessingController<CrossValidationKind>,
}

impl AnalysisStore {
    pub fn new(api: Arc<dyn TaskApi>, poll: PollOptions) -> Self {
        Self {
            factor_analysis: ProcessingController::new(FactorAnalysisKind, api.clone(), poll),
            cross_validation: ProcessingController::new(CrossValidationKind, api.clone(), poll),
            api,
        }
    }

    /// `known_factors` is the full factor list for the database; it is used
    /// to turn factor codes in the result back into labels.
    pub async fn run_factor_analysis(
        &self,
        request: &FactorAnalysisRequest,
        known_factors: Vec<SelectableOption>,
    ) -> Result<JoinHandle<()>> {
        let controller = &self.factor_analysis;
        controller.clear_error();

        match submit_factor_analysis(self.api.as_ref(), request).await {
            Ok(job_id) => Ok(controller.start(job_id, known_factors)),
            Err(e) => {
                warn!(error = %e, "Factor analysis was not started");
                controller.report_error(e.user_message());
                Err(e)
            }
        }
    }

    pub async fn run_cross_validation(
        &self,
        request: &CrossValidationRequest,
    ) -> Result<JoinHandle<()>> {
        let controller = &self.cross_validation;
        controller.clear_error();

        match submit_cross_validation(self.api.as_ref(), request).await {
            Ok(job_id) => Ok(controller.start(job_id, ())),
            Err(e) => {
                warn!(error = %e, "Cross-validation was not started");
                controller.report_error(e.user_message());
                Err(e)
            }
        }
    }
}
