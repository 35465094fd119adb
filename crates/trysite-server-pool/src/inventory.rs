// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Startup discovery of existing sites across shards.
//!
//! The pool owns no durable state. Free and in-use membership is rebuilt on
//! every start from what the control plane reports, using the owner marker
//! that activation writes onto each leased site.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::client::{ControlPlaneClient, ShardConnector};
use crate::clock::Clock;
use crate::error::PoolError;
use crate::naming::SiteNameGenerator;
use crate::types::{keys, Resource, ResourceState, Shard, ShardKey};

/// One shard that loaded successfully.
pub struct LoadedShard {
	pub shard: Shard,
	pub client: Arc<dyn ControlPlaneClient>,
	pub resources: Vec<Resource>,
	/// Sites created at load time to reach the target size.
	pub provisioned: usize,
}

#[derive(Debug)]
pub struct ShardLoadFailure {
	pub shard: ShardKey,
	pub error: PoolError,
}

#[derive(Default)]
pub struct InventoryReport {
	pub shards: Vec<LoadedShard>,
	pub failures: Vec<ShardLoadFailure>,
}

impl InventoryReport {
	pub fn resources(&self) -> impl Iterator<Item = &Resource> {
		self.shards.iter().flat_map(|s| s.resources.iter())
	}

	pub fn resource_count(&self) -> usize {
		self.shards.iter().map(|s| s.resources.len()).sum()
	}
}

/// Mark `resource` free or in use from the lease marker it carries.
///
/// A leased site without a readable lease start is treated as leased `now`.
pub fn classify(resource: &mut Resource, now: DateTime<Utc>) {
	if resource.is_leased() {
		resource.state = ResourceState::InUse;
		resource.lease_start = Some(resource.recorded_lease_start().unwrap_or(now));
	} else {
		resource.state = ResourceState::Free;
		resource.lease_start = None;
	}
}

/// Ensure a free site carries the trial markers. Failures leave the site
/// usable and are only logged.
pub(crate) async fn normalize_trial_settings(
	client: &dyn ControlPlaneClient,
	resource: &mut Resource,
	default_ttl: Duration,
) {
	let lifetime = (default_ttl.as_secs() / 60).max(1).to_string();
	let wanted = [
		(keys::LIFETIME_SETTING, lifetime.as_str()),
		(keys::TRY_MODE_SETTING, "1"),
	];
	if wanted
		.iter()
		.all(|(k, v)| resource.app_settings.get(*k).map(String::as_str) == Some(*v))
	{
		return;
	}

	let mut settings = resource.app_settings.clone();
	for (k, v) in wanted {
		settings.insert(k.to_string(), v.to_string());
	}
	match client.update_app_settings(&resource.id, &settings).await {
		Ok(()) => resource.app_settings = settings,
		Err(e) => warn!(resource = %resource.id, error = %e, "failed to normalize trial settings"),
	}
}

pub struct ShardInventory {
	connector: Arc<dyn ShardConnector>,
	clock: Arc<dyn Clock>,
	default_ttl: Duration,
	target_size: usize,
	names: Option<SiteNameGenerator>,
}

impl ShardInventory {
	pub fn new(connector: Arc<dyn ShardConnector>, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
		Self {
			connector,
			clock,
			default_ttl,
			target_size: 0,
			names: None,
		}
	}

	/// Provision sites until each shard holds `target_size`.
	pub fn with_target_size(mut self, target_size: usize, names: SiteNameGenerator) -> Self {
		self.target_size = target_size;
		self.names = Some(names);
		self
	}

	/// Load every shard concurrently. A failing shard contributes nothing
	/// and is reported; the others are unaffected.
	#[instrument(skip_all, fields(shards = shards.len()))]
	pub async fn load(&self, shards: &[Shard]) -> InventoryReport {
		let results = join_all(shards.iter().map(|shard| self.load_shard(shard))).await;

		let mut report = InventoryReport::default();
		for (shard, result) in shards.iter().zip(results) {
			match result {
				Ok(loaded) => report.shards.push(loaded),
				Err(error) => {
					warn!(shard = %shard.key, error = %error, "shard load failed");
					report.failures.push(ShardLoadFailure {
						shard: shard.key.clone(),
						error,
					});
				}
			}
		}

		info!(
			loaded = report.shards.len(),
			failed = report.failures.len(),
			resources = report.resource_count(),
			"inventory loaded"
		);
		report
	}

	async fn load_shard(&self, shard: &Shard) -> Result<LoadedShard, PoolError> {
		let load_failed = |source| PoolError::ShardLoadFailed {
			shard: shard.key.clone(),
			source,
		};
		let client = self.connector.connect(shard).map_err(load_failed)?;
		let mut resources = client.list_resources().await.map_err(load_failed)?;

		let now = self.clock.now();
		for resource in &mut resources {
			classify(resource, now);
		}
		join_all(
			resources
				.iter_mut()
				.filter(|r| r.state == ResourceState::Free)
				.map(|r| normalize_trial_settings(client.as_ref(), r, self.default_ttl)),
		)
		.await;

		let provisioned = self.top_up(shard, client.as_ref(), &mut resources).await;

		debug!(
			shard = %shard.key,
			resources = resources.len(),
			in_use = resources.iter().filter(|r| r.state == ResourceState::InUse).count(),
			provisioned,
			"shard loaded"
		);
		Ok(LoadedShard {
			shard: shard.clone(),
			client,
			resources,
			provisioned,
		})
	}

	async fn top_up(
		&self,
		shard: &Shard,
		client: &dyn ControlPlaneClient,
		resources: &mut Vec<Resource>,
	) -> usize {
		let Some(names) = &self.names else {
			return 0;
		};
		let missing = self.target_size.saturating_sub(resources.len());
		if missing == 0 {
			return 0;
		}

		let created = join_all((0..missing).map(|_| async {
			let name = names.next_name();
			let mut resource = client.create_resource(&name).await?;
			resource.state = ResourceState::Free;
			resource.lease_start = None;
			normalize_trial_settings(client, &mut resource, self.default_ttl).await;
			Ok::<_, crate::error::ClientError>(resource)
		}))
		.await;

		let mut provisioned = 0;
		for result in created {
			match result {
				Ok(resource) => {
					provisioned += 1;
					resources.push(resource);
				}
				Err(e) => warn!(shard = %shard.key, error = %e, "failed to provision site during top-up"),
			}
		}
		provisioned
	}
}
