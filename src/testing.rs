// ABOUTME: In-memory TaskApi for unit tests; scripts job statuses and results per job id
// ABOUTME: Records submitted payloads and counts status checks so tests can assert on traffic

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{AnalysisError, Result};
use crate::model::{CrossValidationResult, JobId, JobStatus, TaskState};
use crate::remote::models::{RawFactorAnalysisResult, TaskPayload};
use crate::remote::TaskApi;

pub fn status(job_id: &JobId, state: TaskState) -> JobStatus {
    JobStatus {
        id: job_id.to_string(),
        status: state,
        msg: None,
    }
}

pub fn raw_result(json: serde_json::Value) -> RawFactorAnalysisResult {
    serde_json::from_value(json).unwrap()
}

#[derive(Default)]
struct Script {
    statuses: VecDeque<Result<JobStatus>>,
    last: Option<Result<JobStatus>>,
    status_calls: u32,
    fa_result: Option<RawFactorAnalysisResult>,
    cv_result: Option<CrossValidationResult>,
}

/// Applied to job ids that were not scripted explicitly, e.g. ids generated
/// during submission.
#[derive(Default)]
struct Template {
    states: Vec<TaskState>,
    fa_result: Option<RawFactorAnalysisResult>,
    cv_result: Option<CrossValidationResult>,
}

#[derive(Default)]
pub struct ScriptedApi {
    template: Template,
    scripts: Mutex<HashMap<String, Script>>,
    submitted: Mutex<Vec<TaskPayload>>,
    submit_errors: Mutex<VecDeque<AnalysisError>>,
}

impl ScriptedApi {
    pub fn new(submit_errors: Vec<AnalysisError>) -> Self {
        Self {
            submit_errors: Mutex::new(submit_errors.into()),
            ..Default::default()
        }
    }

    fn script<R>(&self, job_id: &JobId, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(job_id.to_string()).or_insert_with(|| Script {
            statuses: self
                .template
                .states
                .iter()
                .map(|state| Ok(status(job_id, *state)))
                .collect(),
            fa_result: self.template.fa_result.clone(),
            cv_result: self.template.cv_result.clone(),
            ..Default::default()
        });
        f(script)
    }

    /// Scripts every job id that has no explicit script.
    pub fn for_any_job(
        mut self,
        states: Vec<TaskState>,
        fa_result: Option<RawFactorAnalysisResult>,
        cv_result: Option<CrossValidationResult>,
    ) -> Self {
        self.template = Template {
            states,
            fa_result,
            cv_result,
        };
        self
    }

    /// Statuses returned in order; the last one repeats once exhausted.
    pub fn with_statuses(self, job_id: &JobId, statuses: Vec<JobStatus>) -> Self {
        self.script(job_id, |s| s.statuses.extend(statuses.into_iter().map(Ok)));
        self
    }

    pub fn with_status_error(self, job_id: &JobId, err: AnalysisError) -> Self {
        self.script(job_id, |s| s.statuses.push_back(Err(err)));
        self
    }

    pub fn with_fa_result(self, job_id: &JobId, result: RawFactorAnalysisResult) -> Self {
        self.script(job_id, |s| s.fa_result = Some(result));
        self
    }

    pub fn with_cv_result(self, job_id: &JobId, result: CrossValidationResult) -> Self {
        self.script(job_id, |s| s.cv_result = Some(result));
        self
    }

    pub fn status_calls(&self, job_id: &JobId) -> u32 {
        self.script(job_id, |s| s.status_calls)
    }

    pub fn submitted(&self) -> Vec<TaskPayload> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskApi for ScriptedApi {
    async fn send_task(&self, payload: &TaskPayload) -> Result<()> {
        if let Some(err) = self.submit_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.submitted.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn task_status(&self, job_id: &JobId) -> Result<JobStatus> {
        self.script(job_id, |s| {
            s.status_calls += 1;
            match s.statuses.pop_front() {
                Some(next) => {
                    s.last = Some(next.clone());
                    next
                }
                None => s
                    .last
                    .clone()
                    .unwrap_or_else(|| Ok(status(job_id, TaskState::Queued))),
            }
        })
    }

    async fn factor_analysis_result(&self, job_id: &JobId) -> Result<RawFactorAnalysisResult> {
        self.script(job_id, |s| s.fa_result.clone()).ok_or(AnalysisError::Transport {
            status: 404,
            body: "result not found".to_string(),
        })
    }

    async fn cross_validation_result(&self, job_id: &JobId) -> Result<CrossValidationResult> {
        self.script(job_id, |s| s.cv_result.clone()).ok_or(AnalysisError::Transport {
            status: 404,
            body: "result not found".to_string(),
        })
    }
}
