// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use trysite_common_config::SecretString;
use trysite_server_pool::{ClientError, ControlPlaneClient, Shard, ShardConnector};

use crate::client::CsmClient;
use crate::error::CsmError;
use crate::http;
use crate::paths::ArmPaths;

/// Connection settings shared by every shard.
#[derive(Debug, Clone)]
pub struct CsmSettings {
	pub base_url: String,
	pub api_version: String,
	pub token: Option<SecretString>,
	pub request_timeout: Duration,
}

/// Builds a [`CsmClient`] per shard over one shared connection pool.
pub struct HttpShardConnector {
	http: Client,
	paths: ArmPaths,
	token: Option<SecretString>,
}

impl HttpShardConnector {
	pub fn new(settings: CsmSettings) -> Result<Self, CsmError> {
		let http = http::new_client_with_timeout(settings.request_timeout)?;
		Ok(Self {
			http,
			paths: ArmPaths::new(settings.base_url, settings.api_version),
			token: settings.token,
		})
	}
}

impl ShardConnector for HttpShardConnector {
	fn connect(&self, shard: &Shard) -> Result<Arc<dyn ControlPlaneClient>, ClientError> {
		if shard.key.subscription_id.trim().is_empty() {
			return Err(ClientError::Request(format!(
				"shard {} has no subscription id",
				shard.key
			)));
		}
		Ok(Arc::new(CsmClient::new(
			self.http.clone(),
			self.paths.clone(),
			self.token.clone(),
			shard.clone(),
		)))
	}
}
