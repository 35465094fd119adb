// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deletion and replacement of retired sites.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::client::ShardClients;
use crate::config::ReplacementPolicy;
use crate::error::{ClientError, PoolError};
use crate::inventory::normalize_trial_settings;
use crate::naming::SiteNameGenerator;
use crate::types::{Resource, ResourceId, ResourceState, ShardKey};

/// What happened to one retired site.
#[derive(Debug)]
pub struct ReclaimOutcome {
	pub retired: ResourceId,
	pub deleted: Result<(), PoolError>,
	/// Id of the new free site, or why none was created.
	pub replacement: Result<ResourceId, PoolError>,
}

impl ReclaimOutcome {
	pub fn is_success(&self) -> bool {
		self.deleted.is_ok() && self.replacement.is_ok()
	}
}

/// Deletes a site and provisions one replacement in the same shard.
pub struct Reclaimer {
	clients: Arc<ShardClients>,
	names: SiteNameGenerator,
	policy: ReplacementPolicy,
	default_ttl: Duration,
}

impl Reclaimer {
	pub fn new(
		clients: Arc<ShardClients>,
		names: SiteNameGenerator,
		policy: ReplacementPolicy,
		default_ttl: Duration,
	) -> Self {
		Self {
			clients,
			names,
			policy,
			default_ttl,
		}
	}

	/// Delete `resource`, then provision its replacement whatever the delete
	/// returned. The new site is handed back for the caller to enqueue.
	#[instrument(skip_all, fields(resource = %resource.id))]
	pub async fn reclaim(&self, mut resource: Resource) -> (ReclaimOutcome, Option<Resource>) {
		resource.state = ResourceState::Deleting;
		let shard = resource.id.shard_key();

		let deleted = self.delete(&resource.id).await;
		if let Err(e) = &deleted {
			warn!(error = %e, "delete failed, replacing anyway");
		}

		let (replacement, created) = match self.provision(&shard).await {
			Ok(site) => {
				info!(replacement = %site.id, "replacement provisioned");
				(Ok(site.id.clone()), Some(site))
			}
			Err(e) => {
				error!(shard = %shard, error = %e, "replacement failed, pool capacity reduced");
				(Err(e), None)
			}
		};

		let outcome = ReclaimOutcome {
			retired: resource.id,
			deleted,
			replacement,
		};
		(outcome, created)
	}

	async fn delete(&self, id: &ResourceId) -> Result<(), PoolError> {
		let client = self
			.clients
			.get(&id.shard_key())
			.ok_or_else(|| PoolError::UnknownShard(id.shard_key()))?;
		match client.delete_resource(id).await {
			Ok(()) => Ok(()),
			Err(ClientError::NotFound(_)) => {
				debug!("site already gone");
				Ok(())
			}
			Err(source) => Err(PoolError::DeleteFailed {
				id: id.clone(),
				source,
			}),
		}
	}

	async fn provision(&self, shard: &ShardKey) -> Result<Resource, PoolError> {
		let client = self
			.clients
			.get(shard)
			.ok_or_else(|| PoolError::UnknownShard(shard.clone()))?;

		let mut attempt = 0;
		loop {
			let name = self.names.next_name();
			match client.create_resource(&name).await {
				Ok(mut site) => {
					site.state = ResourceState::Free;
					site.lease_start = None;
					normalize_trial_settings(client.as_ref(), &mut site, self.default_ttl).await;
					return Ok(site);
				}
				Err(e) if attempt < self.policy.max_retries => {
					attempt += 1;
					let delay = self.policy.delay_for(attempt);
					warn!(
						shard = %shard,
						attempt,
						delay_ms = delay.as_millis() as u64,
						error = %e,
						"replacement attempt failed, retrying"
					);
					tokio::time::sleep(delay).await;
				}
				Err(source) => {
					return Err(PoolError::ReplacementFailed {
						shard: shard.clone(),
						attempts: attempt + 1,
						source,
					});
				}
			}
		}
	}
}
