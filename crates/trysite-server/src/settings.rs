// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mapping resolved configuration onto the runtime types of each crate.

use std::time::Duration;

use trysite_server_config::{ControlPlaneConfig, PoolConfig};
use trysite_server_csm::CsmSettings;
use trysite_server_pool::{PoolSettings, ReplacementPolicy, Shard};

pub fn pool_settings(config: &PoolConfig) -> PoolSettings {
	PoolSettings {
		shards: config
			.shards
			.iter()
			.map(|s| Shard::new(&s.subscription_id, &s.region, &s.resource_group))
			.collect(),
		target_size_per_shard: config.target_size_per_shard as usize,
		lease_ttl: config.lease_ttl(),
		deploy_timeout: config.deploy_timeout(),
		deploy_poll_interval: config.deploy_poll_interval(),
		replacement: ReplacementPolicy {
			max_retries: config.replacement_max_retries,
			base_delay: config.replacement_backoff_base(),
		},
		site_name_prefix: config.site_name_prefix.clone(),
	}
}

pub fn csm_settings(config: &ControlPlaneConfig) -> CsmSettings {
	CsmSettings {
		base_url: config.base_url.clone(),
		api_version: config.api_version.clone(),
		token: config.token.clone(),
		request_timeout: Duration::from_secs(config.request_timeout_secs),
	}
}
