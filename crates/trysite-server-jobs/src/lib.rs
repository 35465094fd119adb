// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for the trysite server.
//!
//! Jobs are registered as periodic or one-shot, run on their own tokio task,
//! retried with exponential backoff when they fail with a retryable error,
//! and tracked in an in-memory run history that backs health reporting.
//! Nothing is persisted; a restart starts with an empty history.

pub mod context;
pub mod error;
pub mod health;
pub mod history;
pub mod job;
pub mod scheduler;
pub mod types;

pub use context::JobContext;
pub use error::{JobError, Result};
pub use health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo};
pub use history::RunHistory;
pub use job::Job;
pub use scheduler::JobScheduler;
pub use tokio_util::sync::CancellationToken;
pub use types::{JobOutput, JobRun, JobStatus, JobType, TriggerSource};
