// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Site pool configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_TARGET_SIZE_PER_SHARD: u32 = 4;
const DEFAULT_LEASE_TTL_MINUTES: u32 = 60;
const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 60;
const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DEPLOY_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_REPLACEMENT_MAX_RETRIES: u32 = 3;
const DEFAULT_REPLACEMENT_BACKOFF_BASE_MS: u64 = 1000;
const DEFAULT_SITE_NAME_PREFIX: &str = "trysite";

/// A shard as written in config. The resource group defaults to
/// `<prefix>-<region>` with the region lowercased and spaces removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfigLayer {
	pub subscription_id: Option<String>,
	pub region: Option<String>,
	pub resource_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
	pub subscription_id: String,
	pub region: String,
	pub resource_group: String,
}

impl ShardConfigLayer {
	fn resolve(self, prefix: &str) -> Result<ShardConfig, ConfigError> {
		let subscription_id = self
			.subscription_id
			.filter(|s| !s.trim().is_empty())
			.ok_or_else(|| ConfigError::Validation("shard subscription_id is required".to_string()))?;
		let region = self
			.region
			.filter(|s| !s.trim().is_empty())
			.ok_or_else(|| ConfigError::Validation("shard region is required".to_string()))?;
		let resource_group = self
			.resource_group
			.unwrap_or_else(|| default_resource_group(prefix, &region));

		Ok(ShardConfig {
			subscription_id,
			region,
			resource_group,
		})
	}
}

fn default_resource_group(prefix: &str, region: &str) -> String {
	let region: String = region
		.chars()
		.filter(|c| !c.is_whitespace())
		.flat_map(char::to_lowercase)
		.collect();
	format!("{prefix}-{region}")
}

/// Pool configuration layer (for merging).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolConfigLayer {
	pub shards: Option<Vec<ShardConfigLayer>>,
	pub target_size_per_shard: Option<u32>,
	pub lease_ttl_minutes: Option<u32>,
	pub maintenance_interval_secs: Option<u64>,
	pub deploy_timeout_secs: Option<u64>,
	pub deploy_poll_interval_ms: Option<u64>,
	pub replacement_max_retries: Option<u32>,
	pub replacement_backoff_base_ms: Option<u64>,
	pub site_name_prefix: Option<String>,
}

impl PoolConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.shards.is_some() {
			self.shards = other.shards;
		}
		if other.target_size_per_shard.is_some() {
			self.target_size_per_shard = other.target_size_per_shard;
		}
		if other.lease_ttl_minutes.is_some() {
			self.lease_ttl_minutes = other.lease_ttl_minutes;
		}
		if other.maintenance_interval_secs.is_some() {
			self.maintenance_interval_secs = other.maintenance_interval_secs;
		}
		if other.deploy_timeout_secs.is_some() {
			self.deploy_timeout_secs = other.deploy_timeout_secs;
		}
		if other.deploy_poll_interval_ms.is_some() {
			self.deploy_poll_interval_ms = other.deploy_poll_interval_ms;
		}
		if other.replacement_max_retries.is_some() {
			self.replacement_max_retries = other.replacement_max_retries;
		}
		if other.replacement_backoff_base_ms.is_some() {
			self.replacement_backoff_base_ms = other.replacement_backoff_base_ms;
		}
		if other.site_name_prefix.is_some() {
			self.site_name_prefix = other.site_name_prefix;
		}
	}

	pub fn resolve(self) -> Result<PoolConfig, ConfigError> {
		let site_name_prefix = self
			.site_name_prefix
			.unwrap_or_else(|| DEFAULT_SITE_NAME_PREFIX.to_string());

		let shards = self
			.shards
			.unwrap_or_default()
			.into_iter()
			.map(|s| s.resolve(&site_name_prefix))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(PoolConfig {
			shards,
			target_size_per_shard: self
				.target_size_per_shard
				.unwrap_or(DEFAULT_TARGET_SIZE_PER_SHARD),
			lease_ttl_minutes: self.lease_ttl_minutes.unwrap_or(DEFAULT_LEASE_TTL_MINUTES),
			maintenance_interval_secs: self
				.maintenance_interval_secs
				.unwrap_or(DEFAULT_MAINTENANCE_INTERVAL_SECS),
			deploy_timeout_secs: self.deploy_timeout_secs.unwrap_or(DEFAULT_DEPLOY_TIMEOUT_SECS),
			deploy_poll_interval_ms: self
				.deploy_poll_interval_ms
				.unwrap_or(DEFAULT_DEPLOY_POLL_INTERVAL_MS),
			replacement_max_retries: self
				.replacement_max_retries
				.unwrap_or(DEFAULT_REPLACEMENT_MAX_RETRIES),
			replacement_backoff_base_ms: self
				.replacement_backoff_base_ms
				.unwrap_or(DEFAULT_REPLACEMENT_BACKOFF_BASE_MS),
			site_name_prefix,
		})
	}
}

/// Pool configuration (runtime, resolved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
	pub shards: Vec<ShardConfig>,
	/// Shards holding fewer resources than this at startup are topped up.
	pub target_size_per_shard: u32,
	pub lease_ttl_minutes: u32,
	pub maintenance_interval_secs: u64,
	/// Upper bound on waiting for a content deployment to settle.
	pub deploy_timeout_secs: u64,
	pub deploy_poll_interval_ms: u64,
	pub replacement_max_retries: u32,
	pub replacement_backoff_base_ms: u64,
	pub site_name_prefix: String,
}

impl PoolConfig {
	pub fn lease_ttl(&self) -> Duration {
		Duration::from_secs(u64::from(self.lease_ttl_minutes) * 60)
	}

	pub fn maintenance_interval(&self) -> Duration {
		Duration::from_secs(self.maintenance_interval_secs)
	}

	pub fn deploy_timeout(&self) -> Duration {
		Duration::from_secs(self.deploy_timeout_secs)
	}

	pub fn deploy_poll_interval(&self) -> Duration {
		Duration::from_millis(self.deploy_poll_interval_ms)
	}

	pub fn replacement_backoff_base(&self) -> Duration {
		Duration::from_millis(self.replacement_backoff_base_ms)
	}

	/// Checks the rules that make a pool runnable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.shards.is_empty() {
			return Err(ConfigError::Validation(
				"at least one shard (subscription + region) must be configured".to_string(),
			));
		}
		if self.lease_ttl_minutes == 0 {
			return Err(ConfigError::Validation(
				"pool.lease_ttl_minutes must be greater than zero".to_string(),
			));
		}
		if self.maintenance_interval_secs == 0 {
			return Err(ConfigError::Validation(
				"pool.maintenance_interval_secs must be greater than zero".to_string(),
			));
		}
		if self.deploy_poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"pool.deploy_poll_interval_ms must be greater than zero".to_string(),
			));
		}
		Ok(())
	}
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			shards: Vec::new(),
			target_size_per_shard: DEFAULT_TARGET_SIZE_PER_SHARD,
			lease_ttl_minutes: DEFAULT_LEASE_TTL_MINUTES,
			maintenance_interval_secs: DEFAULT_MAINTENANCE_INTERVAL_SECS,
			deploy_timeout_secs: DEFAULT_DEPLOY_TIMEOUT_SECS,
			deploy_poll_interval_ms: DEFAULT_DEPLOY_POLL_INTERVAL_MS,
			replacement_max_retries: DEFAULT_REPLACEMENT_MAX_RETRIES,
			replacement_backoff_base_ms: DEFAULT_REPLACEMENT_BACKOFF_BASE_MS,
			site_name_prefix: DEFAULT_SITE_NAME_PREFIX.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn shard(sub: &str, region: &str) -> ShardConfigLayer {
		ShardConfigLayer {
			subscription_id: Some(sub.to_string()),
			region: Some(region.to_string()),
			resource_group: None,
		}
	}

	mod resolve {
		use super::*;

		#[test]
		fn resolve_uses_defaults() {
			let config = PoolConfigLayer::default().resolve().unwrap();
			assert_eq!(config, PoolConfig::default());
			assert_eq!(config.lease_ttl(), Duration::from_secs(3600));
			assert_eq!(config.maintenance_interval(), Duration::from_secs(60));
		}

		#[test]
		fn shard_resource_group_defaults_from_region() {
			let layer = PoolConfigLayer {
				shards: Some(vec![shard("sub-1", "West US")]),
				..Default::default()
			};
			let config = layer.resolve().unwrap();
			assert_eq!(config.shards[0].resource_group, "trysite-westus");
		}

		#[test]
		fn explicit_resource_group_is_kept() {
			let mut s = shard("sub-1", "North Europe");
			s.resource_group = Some("custom-rg".to_string());
			let config = PoolConfigLayer {
				shards: Some(vec![s]),
				site_name_prefix: Some("demo".to_string()),
				..Default::default()
			}
			.resolve()
			.unwrap();
			assert_eq!(config.shards[0].resource_group, "custom-rg");
			assert_eq!(config.site_name_prefix, "demo");
		}

		#[test]
		fn shard_without_region_fails() {
			let layer = PoolConfigLayer {
				shards: Some(vec![ShardConfigLayer {
					subscription_id: Some("sub-1".to_string()),
					region: None,
					resource_group: None,
				}]),
				..Default::default()
			};
			assert!(layer.resolve().is_err());
		}
	}

	mod validate {
		use super::*;

		fn valid() -> PoolConfig {
			PoolConfigLayer {
				shards: Some(vec![shard("sub-1", "West US")]),
				..Default::default()
			}
			.resolve()
			.unwrap()
		}

		#[test]
		fn valid_config_passes() {
			assert!(valid().validate().is_ok());
		}

		#[test]
		fn no_shards_fails() {
			let config = PoolConfig::default();
			let err = config.validate().unwrap_err();
			assert!(err.to_string().contains("shard"));
		}

		#[test]
		fn zero_ttl_fails() {
			let config = PoolConfig {
				lease_ttl_minutes: 0,
				..valid()
			};
			assert!(config.validate().is_err());
		}

		#[test]
		fn zero_interval_fails() {
			let config = PoolConfig {
				maintenance_interval_secs: 0,
				..valid()
			};
			assert!(config.validate().is_err());
		}
	}

	#[test]
	fn merge_replaces_shard_list_entirely() {
		let mut base = PoolConfigLayer {
			shards: Some(vec![shard("a", "West US"), shard("b", "East US")]),
			target_size_per_shard: Some(2),
			..Default::default()
		};
		base.merge(PoolConfigLayer {
			shards: Some(vec![shard("c", "Japan East")]),
			..Default::default()
		});
		assert_eq!(base.shards.as_ref().unwrap().len(), 1);
		assert_eq!(base.target_size_per_shard, Some(2));
	}
}
