// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tracing::instrument;
use trysite_server_jobs::{Job, JobContext, JobError, JobOutput};
use trysite_server_pool::{MaintenanceOutcome, PoolManager};

/// Reaps expired leases and replaces the sites.
pub struct PoolMaintenanceJob {
	pool: PoolManager,
}

impl PoolMaintenanceJob {
	pub fn new(pool: PoolManager) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl Job for PoolMaintenanceJob {
	fn id(&self) -> &str {
		"pool-maintenance"
	}

	fn name(&self) -> &str {
		"Pool Maintenance"
	}

	fn description(&self) -> &str {
		"Delete sites whose lease expired and provision replacements"
	}

	#[instrument(skip(self, ctx), fields(job_id = "pool-maintenance"))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		match self.pool.run_maintenance().await {
			MaintenanceOutcome::Skipped => Ok(JobOutput {
				message: "Previous maintenance run still in progress, skipped".to_string(),
				metadata: Some(serde_json::json!({ "skipped": true })),
			}),
			MaintenanceOutcome::Completed(report) => {
				let stats = self.pool.stats().await;
				tracing::info!(
					expired = report.expired.len(),
					failures = report.failures(),
					free = stats.free,
					in_use = stats.in_use,
					"Pool maintenance completed"
				);
				Ok(JobOutput {
					message: format!(
						"Reclaimed {} expired sites ({} with errors)",
						report.expired.len(),
						report.failures()
					),
					metadata: Some(serde_json::json!({
						"scanned": report.scanned,
						"expired": report.expired.len(),
						"failures": report.failures(),
						"free": stats.free,
						"in_use": stats.in_use,
					})),
				})
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::time::Duration;
	use trysite_server_jobs::{CancellationToken, TriggerSource};
	use trysite_server_pool::mock::{self, MockConnector, MockContentDeploy, MockControlPlane};
	use trysite_server_pool::{Collaborators, ManualClock, PoolSettings};

	async fn pool(clock: Arc<ManualClock>) -> PoolManager {
		let shard = mock::shard("westus");
		let plane = Arc::new(MockControlPlane::new(shard.clone()).with_free_sites("s", 1));
		let collaborators = Collaborators::new(
			Arc::new(MockConnector::new().with_plane(plane)),
			Arc::new(MockContentDeploy::new()),
		)
		.with_clock(clock);
		let settings = PoolSettings {
			shards: vec![shard],
			lease_ttl: Duration::from_secs(60),
			..Default::default()
		};
		PoolManager::initialize(settings, collaborators).await.unwrap()
	}

	fn ctx() -> JobContext {
		JobContext {
			run_id: "run-1".to_string(),
			triggered_by: TriggerSource::Manual,
			cancellation_token: CancellationToken::new(),
		}
	}

	#[tokio::test]
	async fn reports_reclaimed_sites() {
		let clock = Arc::new(ManualClock::default());
		let pool = pool(clock.clone()).await;
		pool.acquire(None, "u").await.unwrap();
		clock.advance(Duration::from_secs(61));

		let job = PoolMaintenanceJob::new(pool.clone());
		let output = job.run(&ctx()).await.unwrap();

		let metadata = output.metadata.unwrap();
		assert_eq!(metadata["expired"], 1);
		assert_eq!(metadata["failures"], 0);
		assert_eq!(metadata["free"], 1);
		assert_eq!(metadata["in_use"], 0);
	}

	#[tokio::test]
	async fn cancelled_context_does_nothing() {
		let pool = pool(Arc::new(ManualClock::default())).await;
		let job = PoolMaintenanceJob::new(pool);
		let ctx = ctx();
		ctx.cancellation_token.cancel();

		assert!(matches!(job.run(&ctx).await, Err(JobError::Cancelled)));
	}
}
