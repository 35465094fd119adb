// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tokio_util::sync::CancellationToken;

use crate::types::TriggerSource;

/// Per-run information handed to [`Job::run`](crate::Job::run).
#[derive(Debug, Clone)]
pub struct JobContext {
	pub run_id: String,
	pub triggered_by: TriggerSource,
	/// Cancelled when the job is cancelled or the scheduler shuts down.
	pub cancellation_token: CancellationToken,
}
