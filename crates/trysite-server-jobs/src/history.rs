// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory record of recent job runs.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::types::{JobRun, JobStatus};

const DEFAULT_RUNS_PER_JOB: usize = 50;

/// Keeps the most recent runs of every job, newest last.
#[derive(Debug)]
pub struct RunHistory {
	runs: Mutex<HashMap<String, VecDeque<JobRun>>>,
	capacity: usize,
}

impl Default for RunHistory {
	fn default() -> Self {
		Self::with_capacity(DEFAULT_RUNS_PER_JOB)
	}
}

impl RunHistory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			runs: Mutex::new(HashMap::new()),
			capacity: capacity.max(1),
		}
	}

	pub async fn record_run_start(&self, run: JobRun) {
		let mut runs = self.runs.lock().await;
		let entries = runs.entry(run.job_id.clone()).or_default();
		if entries.len() == self.capacity {
			entries.pop_front();
		}
		entries.push_back(run);
	}

	/// Marks run `run_id` finished. Unknown ids are ignored.
	pub async fn record_run_complete(
		&self,
		run_id: &str,
		status: JobStatus,
		retry_count: u32,
		error_message: Option<String>,
		metadata: Option<serde_json::Value>,
	) {
		let mut runs = self.runs.lock().await;
		let Some(run) = runs
			.values_mut()
			.flat_map(|entries| entries.iter_mut())
			.find(|r| r.id == run_id)
		else {
			return;
		};

		let now = Utc::now();
		run.status = status;
		run.retry_count = retry_count;
		run.completed_at = Some(now);
		run.duration_ms = Some((now - run.started_at).num_milliseconds());
		run.error_message = error_message;
		run.metadata = metadata;
	}

	pub async fn last_run(&self, job_id: &str) -> Option<JobRun> {
		let runs = self.runs.lock().await;
		runs.get(job_id).and_then(|entries| entries.back().cloned())
	}

	/// Number of failed runs since the most recent non-failed one.
	pub async fn consecutive_failures(&self, job_id: &str) -> u32 {
		let runs = self.runs.lock().await;
		runs.get(job_id)
			.map(|entries| {
				entries
					.iter()
					.rev()
					.take_while(|r| r.status == JobStatus::Failed)
					.count() as u32
			})
			.unwrap_or(0)
	}

	pub async fn runs(&self, job_id: &str) -> Vec<JobRun> {
		let runs = self.runs.lock().await;
		runs.get(job_id)
			.map(|entries| entries.iter().cloned().collect())
			.unwrap_or_default()
	}
}
