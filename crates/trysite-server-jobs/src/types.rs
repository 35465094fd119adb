// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum JobType {
	Periodic { interval: Duration },
	OneShot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutput {
	pub message: String,
	pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	Schedule,
	Manual,
	Retry,
}

/// One execution of a job, including its retries.
#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
	pub id: String,
	pub job_id: String,
	pub status: JobStatus,
	pub started_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
	pub duration_ms: Option<i64>,
	pub error_message: Option<String>,
	pub retry_count: u32,
	pub triggered_by: TriggerSource,
	pub metadata: Option<serde_json::Value>,
}
