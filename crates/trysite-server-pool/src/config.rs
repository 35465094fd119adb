// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime settings and collaborators handed to the pool at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::client::{ContentDeployClient, ShardConnector};
use crate::clock::{Clock, SystemClock};
use crate::error::PoolError;
use crate::types::Shard;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry policy for provisioning a replacement after a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPolicy {
	/// Retries after the first attempt.
	pub max_retries: u32,
	pub base_delay: Duration,
}

impl ReplacementPolicy {
	pub fn none() -> Self {
		Self {
			max_retries: 0,
			base_delay: Duration::ZERO,
		}
	}

	/// Exponential delay before retry `attempt` (1-based), doubling from
	/// `base_delay`, capped at 60s, with up to 25% random jitter.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exp = attempt.saturating_sub(1).min(16);
		let delay = self.base_delay.saturating_mul(1 << exp).min(MAX_BACKOFF);
		let jitter_ms = (delay.as_millis() as u64) / 4;
		if jitter_ms == 0 {
			return delay;
		}
		delay + Duration::from_millis(fastrand::u64(0..=jitter_ms))
	}
}

impl Default for ReplacementPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			base_delay: Duration::from_secs(1),
		}
	}
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
	pub shards: Vec<Shard>,
	/// Sites each shard is topped up to at startup. Zero disables top-up.
	pub target_size_per_shard: usize,
	pub lease_ttl: Duration,
	pub deploy_timeout: Duration,
	pub deploy_poll_interval: Duration,
	pub replacement: ReplacementPolicy,
	pub site_name_prefix: String,
}

impl PoolSettings {
	pub fn validate(&self) -> Result<(), PoolError> {
		if self.shards.is_empty() {
			return Err(PoolError::Configuration("at least one shard is required".to_string()));
		}
		if self.lease_ttl.is_zero() {
			return Err(PoolError::Configuration("lease ttl must be positive".to_string()));
		}
		// Sites record their lifetime in whole minutes.
		if self.lease_ttl.subsec_nanos() != 0 || self.lease_ttl.as_secs() % 60 != 0 {
			return Err(PoolError::Configuration(format!(
				"lease ttl must be a whole number of minutes, got {:?}",
				self.lease_ttl
			)));
		}
		if self.deploy_poll_interval.is_zero() {
			return Err(PoolError::Configuration(
				"deploy poll interval must be positive".to_string(),
			));
		}
		if self.site_name_prefix.is_empty() {
			return Err(PoolError::Configuration("site name prefix must not be empty".to_string()));
		}
		Ok(())
	}
}

impl Default for PoolSettings {
	fn default() -> Self {
		Self {
			shards: Vec::new(),
			target_size_per_shard: 0,
			lease_ttl: Duration::from_secs(60 * 60),
			deploy_timeout: Duration::from_secs(120),
			deploy_poll_interval: Duration::from_secs(2),
			replacement: ReplacementPolicy::default(),
			site_name_prefix: "trysite".to_string(),
		}
	}
}

/// External services the pool drives.
#[derive(Clone)]
pub struct Collaborators {
	pub connector: Arc<dyn ShardConnector>,
	pub content: Arc<dyn ContentDeployClient>,
	pub clock: Arc<dyn Clock>,
}

impl Collaborators {
	pub fn new(connector: Arc<dyn ShardConnector>, content: Arc<dyn ContentDeployClient>) -> Self {
		Self {
			connector,
			content,
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}
}
