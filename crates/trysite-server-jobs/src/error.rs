// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("job not found: {0}")]
	NotFound(String),

	#[error("job cancelled")]
	Cancelled,

	#[error("job failed: {message}")]
	Failed { message: String, retryable: bool },
}
