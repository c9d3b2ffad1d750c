// ABOUTME: Per-analysis-kind processing state machine: idle -> polling -> success/error
// ABOUTME: Poll loops commit only while their generation token is current

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, Result};
use crate::model::{AnalysisResult, CrossValidationResult, JobId, SelectableOption, TaskState};
use crate::poller::{poll_until_complete, PollOptions};
use crate::remote::TaskApi;
use crate::transform::{transform_cross_validation, transform_factor_analysis, FactorLabels};

/// What the view renders for one analysis kind. `is_processing` is true
/// exactly when `job_id` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingState {
    pub job_id: Option<JobId>,
    pub is_processing: bool,
    pub error: Option<String>,
}

impl ProcessingState {
    fn running(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            is_processing: true,
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            job_id: None,
            is_processing: false,
            error: Some(message),
        }
    }
}

/// One slice of the application store.
#[derive(Debug, Clone)]
pub struct KindState<R> {
    pub processing: ProcessingState,
    pub result: Option<R>,
    /// Last status reported by the service for the running job.
    pub server_status: Option<TaskState>,
    generation: u64,
}

impl<R> Default for KindState<R> {
    fn default() -> Self {
        Self {
            processing: ProcessingState::default(),
            result: None,
            server_status: None,
            generation: 0,
        }
    }
}

impl<R> KindState<R> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Kind-specific part of finishing a job: how to fetch and shape its result.
#[async_trait]
pub trait AnalysisKind: Send + Sync + 'static {
    type Context: Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Used when the service reports an error without a message.
    fn default_error(&self) -> &'static str;

    async fn fetch_result(
        &self,
        api: &dyn TaskApi,
        job_id: &JobId,
        ctx: &Self::Context,
    ) -> Result<Self::Output>;
}

pub struct FactorAnalysisKind;

#[async_trait]
impl AnalysisKind for FactorAnalysisKind {
    /// Every factor available for the database, used to relabel codes.
    type Context = Vec<SelectableOption>;
    type Output = AnalysisResult;

    fn name(&self) -> &'static str {
        "factor_analysis"
    }

    fn default_error(&self) -> &'static str {
        "Analysis failed"
    }

    async fn fetch_result(
        &self,
        api: &dyn TaskApi,
        job_id: &JobId,
        known_factors: &Self::Context,
    ) -> Result<AnalysisResult> {
        let raw = api.factor_analysis_result(job_id).await?;
        let labels = FactorLabels::from_options(known_factors);
        Ok(transform_factor_analysis(raw, job_id, &labels))
    }
}

pub struct CrossValidationKind;

#[async_trait]
impl AnalysisKind for CrossValidationKind {
    type Context = ();
    type Output = CrossValidationResult;

    fn name(&self) -> &'static str {
        "cross_validation"
    }

    fn default_error(&self) -> &'static str {
        "Cross-validation failed"
    }

    async fn fetch_result(
        &self,
        api: &dyn TaskApi,
        job_id: &JobId,
        _ctx: &(),
    ) -> Result<CrossValidationResult> {
        let raw = api.cross_validation_result(job_id).await?;
        Ok(transform_cross_validation(raw, job_id))
    }
}

/// Owns one kind's state. Clones share the same state, so the controller can
/// be handed to any number of views while poll loops run in the background.
pub struct ProcessingController<K: AnalysisKind> {
    kind: Arc<K>,
    api: Arc<dyn TaskApi>,
    poll: PollOptions,
    state: Arc<watch::Sender<KindState<K::Output>>>,
}

impl<K: AnalysisKind> Clone for ProcessingController<K> {
    fn clone(&self) -> Self {
        Self {
            kind: Arc::clone(&self.kind),
            api: Arc::clone(&self.api),
            poll: self.poll,
            state: Arc::clone(&self.state),
        }
    }
}

impl<K: AnalysisKind> ProcessingController<K> {
    pub fn new(kind: K, api: Arc<dyn TaskApi>, poll: PollOptions) -> Self {
        let (state, _) = watch::channel(KindState::default());
        Self {
            kind: Arc::new(kind),
            api,
            poll,
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<KindState<K::Output>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> KindState<K::Output> {
        self.state.borrow().clone()
    }

    pub fn processing(&self) -> ProcessingState {
        self.state.borrow().processing.clone()
    }

    pub fn result(&self) -> Option<K::Output> {
        self.state.borrow().result.clone()
    }

    /// Records `job_id` as the running job and starts polling it in the
    /// background. Any loop started earlier for this kind is superseded: its
    /// outcome will never reach the state.
    pub fn start(&self, job_id: JobId, ctx: K::Context) -> JoinHandle<()> {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.result = None;
            s.server_status = None;
            s.processing = ProcessingState::running(job_id.clone());
        });
        info!(kind = self.kind.name(), %job_id, generation, "Processing started");

        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.drive(&job_id, &ctx, generation).await;
            this.commit(&job_id, generation, outcome);
        })
    }

    async fn drive(&self, job_id: &JobId, ctx: &K::Context, generation: u64) -> Result<K::Output> {
        let status = poll_until_complete(self.api.as_ref(), job_id, self.poll, |status| {
            self.state.send_if_modified(|s| {
                if s.generation != generation || s.server_status == Some(status.status) {
                    return false;
                }
                s.server_status = Some(status.status);
                true
            });
        })
        .await?;

        if status.status == TaskState::Error {
            let message = status
                .msg
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| self.kind.default_error().to_string());
            return Err(AnalysisError::JobFailed(message));
        }

        self.kind.fetch_result(self.api.as_ref(), job_id, ctx).await
    }

    fn commit(&self, job_id: &JobId, generation: u64, outcome: Result<K::Output>) {
        let kind = self.kind.name();
        let committed = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            match outcome {
                Ok(result) => {
                    info!(kind, %job_id, "Processing succeeded");
                    s.result = Some(result);
                    s.processing = ProcessingState::default();
                }
                Err(e) => {
                    warn!(kind, %job_id, error = %e, "Processing failed");
                    s.processing = ProcessingState::failed(e.user_message());
                }
            }
            true
        });

        if !committed {
            debug!(kind, %job_id, generation, "Discarding outcome of superseded job");
        }
    }

    /// Dismisses the error banner; a running job is left alone.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.processing.error.take().is_some());
    }

    /// Shows an error raised outside the poll loop (validation, submission)
    /// on the same banner, without touching the running job.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_modify(|s| s.processing.error = Some(message));
    }

    /// Drops the visible result, e.g. when the user switches analysis kind.
    pub fn clear_result(&self) {
        self.state.send_if_modified(|s| s.result.take().is_some());
    }

    /// Stops caring about the running job; its loop finishes on its own but
    /// whatever it produces is discarded. Returns whether a job was running.
    pub fn abandon(&self) -> bool {
        let mut was_running = false;
        self.state.send_modify(|s| {
            was_running = s.processing.is_processing;
            s.generation += 1;
            s.server_status = None;
            s.processing.job_id = None;
            s.processing.is_processing = false;
        });
        if was_running {
            info!(kind = self.kind.name(), "Processing abandoned");
        }
        was_running
    }
}
