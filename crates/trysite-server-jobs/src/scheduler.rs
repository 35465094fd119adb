// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::health::{determine_health_state, HealthState, JobHealthStatus, JobsHealthStatus};
use crate::history::RunHistory;
use crate::job::Job;
use crate::types::{JobRun, JobStatus, JobType, TriggerSource};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_FACTOR: f64 = 2.0;
const MAX_RETRIES: u32 = 3;

struct RegisteredJob {
	job: Arc<dyn Job>,
	job_type: JobType,
	cancellation_token: CancellationToken,
}

/// Runs registered jobs on their own tasks.
///
/// A periodic job fires once at start and then every `interval`. Each job's
/// loop awaits its run before waiting for the next tick, and ticks missed
/// meanwhile are dropped rather than replayed. Manual triggers bypass the
/// loop, so jobs that must not overlap with themselves guard their own runs.
pub struct JobScheduler {
	jobs: HashMap<String, RegisteredJob>,
	history: Arc<RunHistory>,
	shutdown: CancellationToken,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
	pub fn new(history: Arc<RunHistory>) -> Self {
		Self {
			jobs: HashMap::new(),
			history,
			shutdown: CancellationToken::new(),
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		self.register(job, JobType::Periodic { interval });
	}

	pub fn register_one_shot(&mut self, job: Arc<dyn Job>) {
		self.register(job, JobType::OneShot);
	}

	fn register(&mut self, job: Arc<dyn Job>, job_type: JobType) {
		let id = job.id().to_string();
		self.jobs.insert(
			id,
			RegisteredJob {
				job,
				job_type,
				cancellation_token: self.shutdown.child_token(),
			},
		);
	}

	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;

		for (job_id, registered) in &self.jobs {
			let JobType::Periodic { interval } = registered.job_type else {
				continue;
			};

			let job = Arc::clone(&registered.job);
			let history = Arc::clone(&self.history);
			let cancellation_token = registered.cancellation_token.clone();
			let job_id = job_id.clone();

			handles.push(tokio::spawn(async move {
				let mut ticker = tokio::time::interval(interval);
				ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

				loop {
					tokio::select! {
						_ = ticker.tick() => {
							let _ = run_job_with_retry(
								&job,
								&history,
								TriggerSource::Schedule,
								&cancellation_token,
							)
							.await;
						}
						_ = cancellation_token.cancelled() => {
							info!(job_id = %job_id, "Stopping periodic job");
							break;
						}
					}
				}
			}));
		}

		info!(job_count = handles.len(), "Job scheduler started");
	}

	#[instrument(skip(self))]
	pub async fn trigger_job(&self, job_id: &str, triggered_by: TriggerSource) -> Result<String> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		run_job_with_retry(
			&registered.job,
			&self.history,
			triggered_by,
			&registered.cancellation_token,
		)
		.await
	}

	pub fn cancel_job(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		registered.cancellation_token.cancel();
		Ok(())
	}

	/// Stops every periodic loop and waits for in-flight runs to return.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		self.shutdown.cancel();

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job scheduler shut down");
	}

	pub fn job_ids(&self) -> Vec<String> {
		self.jobs.keys().cloned().collect()
	}

	pub fn history(&self) -> &Arc<RunHistory> {
		&self.history
	}

	pub async fn job_status(&self, job_id: &str) -> Option<JobHealthStatus> {
		let registered = self.jobs.get(job_id)?;

		let last_run = self.history.last_run(job_id).await;
		let consecutive_failures = self.history.consecutive_failures(job_id).await;

		Some(JobHealthStatus {
			job_id: job_id.to_string(),
			name: registered.job.name().to_string(),
			status: determine_health_state(last_run.as_ref(), consecutive_failures),
			last_run: last_run.map(Into::into),
			consecutive_failures,
		})
	}

	pub async fn health_status(&self) -> JobsHealthStatus {
		let mut jobs = Vec::new();
		for job_id in self.jobs.keys() {
			if let Some(status) = self.job_status(job_id).await {
				jobs.push(status);
			}
		}

		let status = jobs
			.iter()
			.map(|j| j.status)
			.max()
			.unwrap_or(HealthState::Healthy);

		JobsHealthStatus { status, jobs }
	}
}

async fn run_job_with_retry(
	job: &Arc<dyn Job>,
	history: &RunHistory,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
) -> Result<String> {
	let run_id = uuid::Uuid::new_v4().to_string();
	let mut retry_count = 0u32;

	history
		.record_run_start(JobRun {
			id: run_id.clone(),
			job_id: job.id().to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count,
			triggered_by,
			metadata: None,
		})
		.await;

	loop {
		let ctx = JobContext {
			run_id: run_id.clone(),
			triggered_by: if retry_count > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			cancellation_token: cancellation_token.clone(),
		};

		match job.run(&ctx).await {
			Ok(output) => {
				history
					.record_run_complete(&run_id, JobStatus::Succeeded, retry_count, None, output.metadata)
					.await;
				info!(job_id = %job.id(), run_id = %run_id, output = %output.message, "Job completed");
				return Ok(run_id);
			}
			Err(JobError::Cancelled) => {
				history
					.record_run_complete(&run_id, JobStatus::Cancelled, retry_count, None, None)
					.await;
				info!(job_id = %job.id(), run_id = %run_id, "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(JobError::Failed { message, retryable })
				if retryable && retry_count < MAX_RETRIES && !cancellation_token.is_cancelled() =>
			{
				retry_count += 1;
				let delay_secs = calculate_backoff_delay(retry_count);
				warn!(
					job_id = %job.id(),
					run_id = %run_id,
					retry_count,
					delay_secs,
					error = %message,
					"Job failed, retrying"
				);
				tokio::select! {
					_ = tokio::time::sleep(Duration::from_secs(delay_secs)) => {}
					_ = cancellation_token.cancelled() => {}
				}
			}
			Err(e) => {
				let message = e.to_string();
				history
					.record_run_complete(&run_id, JobStatus::Failed, retry_count, Some(message.clone()), None)
					.await;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed");
				return Err(e);
			}
		}
	}
}

pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let delay = BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(retry_count as i32 - 1);
	(delay as u64).min(MAX_RETRY_DELAY_SECS)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::JobOutput;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicU32, Ordering};

	/// Fails with a retryable error for the first `failures` runs.
	struct CountingJob {
		id: String,
		runs: AtomicU32,
		failures: u32,
		retryable: bool,
	}

	impl CountingJob {
		fn new(id: &str) -> Self {
			Self::failing(id, 0, true)
		}

		fn failing(id: &str, failures: u32, retryable: bool) -> Self {
			Self {
				id: id.to_string(),
				runs: AtomicU32::new(0),
				failures,
				retryable,
			}
		}

		fn runs(&self) -> u32 {
			self.runs.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl Job for CountingJob {
		fn id(&self) -> &str {
			&self.id
		}

		fn name(&self) -> &str {
			"Counting Job"
		}

		fn description(&self) -> &str {
			"Counts its runs"
		}

		async fn run(&self, ctx: &JobContext) -> std::result::Result<JobOutput, JobError> {
			if ctx.cancellation_token.is_cancelled() {
				return Err(JobError::Cancelled);
			}
			let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
			if n <= self.failures {
				return Err(JobError::Failed {
					message: format!("failure {n}"),
					retryable: self.retryable,
				});
			}
			Ok(JobOutput {
				message: "ok".to_string(),
				metadata: None,
			})
		}
	}

	fn scheduler() -> JobScheduler {
		JobScheduler::new(Arc::new(RunHistory::new()))
	}

	mod backoff {
		use super::*;

		#[test]
		fn doubles_from_base() {
			assert_eq!(calculate_backoff_delay(1), BASE_RETRY_DELAY_SECS);
			assert_eq!(calculate_backoff_delay(2), 2);
			assert_eq!(calculate_backoff_delay(3), 4);
		}

		#[test]
		fn caps_at_max() {
			assert_eq!(calculate_backoff_delay(10), MAX_RETRY_DELAY_SECS);
			assert_eq!(calculate_backoff_delay(100), MAX_RETRY_DELAY_SECS);
		}
	}

	#[tokio::test]
	async fn registered_jobs_are_listed() {
		let mut scheduler = scheduler();
		scheduler.register_periodic(Arc::new(CountingJob::new("periodic")), Duration::from_secs(60));
		scheduler.register_one_shot(Arc::new(CountingJob::new("one-shot")));

		let mut ids = scheduler.job_ids();
		ids.sort();
		assert_eq!(ids, vec!["one-shot", "periodic"]);
	}

	#[tokio::test]
	async fn trigger_unknown_job_is_not_found() {
		let scheduler = scheduler();
		match scheduler.trigger_job("missing", TriggerSource::Manual).await {
			Err(JobError::NotFound(id)) => assert_eq!(id, "missing"),
			other => panic!("expected NotFound, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn manual_trigger_records_success() {
		let mut scheduler = scheduler();
		scheduler.register_one_shot(Arc::new(CountingJob::new("manual")));

		let run_id = scheduler.trigger_job("manual", TriggerSource::Manual).await.unwrap();

		let last = scheduler.history().last_run("manual").await.unwrap();
		assert_eq!(last.id, run_id);
		assert_eq!(last.status, JobStatus::Succeeded);
		assert_eq!(last.triggered_by, TriggerSource::Manual);
		let status = scheduler.job_status("manual").await.unwrap();
		assert_eq!(status.status, HealthState::Healthy);
	}

	#[tokio::test(start_paused = true)]
	async fn retryable_failures_are_retried_with_backoff() {
		let job = Arc::new(CountingJob::failing("flaky", 2, true));
		let mut scheduler = scheduler();
		scheduler.register_one_shot(job.clone());

		scheduler.trigger_job("flaky", TriggerSource::Manual).await.unwrap();

		assert_eq!(job.runs(), 3);
		let last = scheduler.history().last_run("flaky").await.unwrap();
		assert_eq!(last.status, JobStatus::Succeeded);
		assert_eq!(last.retry_count, 2);
	}

	#[tokio::test]
	async fn non_retryable_failure_is_recorded_once() {
		let job = Arc::new(CountingJob::failing("broken", 1, false));
		let mut scheduler = scheduler();
		scheduler.register_one_shot(job.clone());

		let result = scheduler.trigger_job("broken", TriggerSource::Manual).await;

		assert!(matches!(result, Err(JobError::Failed { retryable: false, .. })));
		assert_eq!(job.runs(), 1);
		let status = scheduler.job_status("broken").await.unwrap();
		assert_eq!(status.status, HealthState::Degraded);
		assert_eq!(status.consecutive_failures, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn periodic_job_runs_immediately_and_on_interval() {
		let job = Arc::new(CountingJob::new("ticker"));
		let mut scheduler = scheduler();
		scheduler.register_periodic(job.clone(), Duration::from_secs(10));

		scheduler.start().await;
		tokio::time::sleep(Duration::from_secs(25)).await;
		scheduler.shutdown().await;

		let runs = job.runs();
		assert!((3..=4).contains(&runs), "unexpected run count {runs}");
	}

	#[tokio::test]
	async fn cancelled_job_reports_cancelled() {
		let mut scheduler = scheduler();
		scheduler.register_one_shot(Arc::new(CountingJob::new("cancel-me")));
		scheduler.cancel_job("cancel-me").unwrap();

		let result = scheduler.trigger_job("cancel-me", TriggerSource::Manual).await;
		assert!(matches!(result, Err(JobError::Cancelled)));
	}
}
