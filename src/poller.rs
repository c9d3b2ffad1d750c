// ABOUTME: Polls a submitted job until the service reports a terminal status
// ABOUTME: Fixed interval, bounded attempts; no cancellation of its own

use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};
use crate::model::{JobId, JobStatus};
use crate::remote::TaskApi;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollOptions {
    /// 150 checks two seconds apart: a five minute ceiling per job.
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Queries the job status until it is `success` or `error`, returning that
/// status. Fails with `PollingTimeout` after `max_attempts` non-terminal
/// answers, and propagates any transport error immediately.
pub async fn poll_until_complete(
    api: &dyn TaskApi,
    job_id: &JobId,
    options: PollOptions,
    callback: impl Fn(&JobStatus),
) -> Result<JobStatus> {
    for attempt in 1..=options.max_attempts {
        let status = api.task_status(job_id).await?;
        callback(&status);

        if status.status.is_terminal() {
            info!(%job_id, status = ?status.status, attempt, "Task finished");
            return Ok(status);
        }

        debug!(%job_id, status = ?status.status, attempt, "Task not finished yet");
        if attempt < options.max_attempts {
            tokio::time::sleep(options.interval).await;
        }
    }

    Err(AnalysisError::PollingTimeout {
        attempts: options.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskState;
    use crate::testing::{status, ScriptedApi};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_returns_on_success_after_three_checks() {
        let job = JobId::from("job-1");
        let api = ScriptedApi::new(vec![]).with_statuses(
            &job,
            vec![
                status(&job, TaskState::Queued),
                status(&job, TaskState::Running),
                status(&job, TaskState::Success),
            ],
        );

        let seen = AtomicU32::new(0);
        let result = poll_until_complete(&api, &job, PollOptions::default(), |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert_eq!(result.status, TaskState::Success);
        assert_eq!(api.status_calls(&job), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_is_returned_not_raised() {
        let job = JobId::from("job-2");
        let mut failed = status(&job, TaskState::Error);
        failed.msg = Some("Not enough data".to_string());
        let api = ScriptedApi::new(vec![]).with_statuses(&job, vec![failed]);

        let result = poll_until_complete(&api, &job, PollOptions::default(), |_| {})
            .await
            .unwrap();

        assert_eq!(result.status, TaskState::Error);
        assert_eq!(result.msg.as_deref(), Some("Not enough data"));
        assert_eq!(api.status_calls(&job), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_max_attempts() {
        let job = JobId::from("job-3");
        let api =
            ScriptedApi::new(vec![]).with_statuses(&job, vec![status(&job, TaskState::Running)]);
        let options = PollOptions {
            max_attempts: 5,
            interval: Duration::from_millis(2000),
        };

        let err = poll_until_complete(&api, &job, options, |_| {})
            .await
            .unwrap_err();

        assert_eq!(err, AnalysisError::PollingTimeout { attempts: 5 });
        assert_eq!(api.status_calls(&job), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_fixed_interval_between_checks() {
        let job = JobId::from("job-4");
        let api = ScriptedApi::new(vec![]).with_statuses(
            &job,
            vec![
                status(&job, TaskState::Queued),
                status(&job, TaskState::Queued),
                status(&job, TaskState::Success),
            ],
        );

        let started = tokio::time::Instant::now();
        poll_until_complete(&api, &job, PollOptions::default(), |_| {})
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_propagates() {
        let job = JobId::from("job-5");
        let api = ScriptedApi::new(vec![]).with_status_error(
            &job,
            AnalysisError::Transport {
                status: 503,
                body: String::new(),
            },
        );

        let err = poll_until_complete(&api, &job, PollOptions::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Transport { status: 503, .. }));
    }
}
