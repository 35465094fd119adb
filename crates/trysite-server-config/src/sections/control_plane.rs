// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control-plane endpoint configuration section.

use serde::{Deserialize, Serialize};
use trysite_common_config::SecretString;

const DEFAULT_BASE_URL: &str = "https://management.azure.com";
const DEFAULT_API_VERSION: &str = "2014-11-01";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlPlaneConfigLayer {
	pub base_url: Option<String>,
	pub api_version: Option<String>,
	pub token: Option<SecretString>,
	pub request_timeout_secs: Option<u64>,
}

impl ControlPlaneConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.api_version.is_some() {
			self.api_version = other.api_version;
		}
		if other.token.is_some() {
			self.token = other.token;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self) -> ControlPlaneConfig {
		ControlPlaneConfig {
			base_url: self
				.base_url
				.map(|u| u.trim_end_matches('/').to_string())
				.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
			api_version: self
				.api_version
				.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
			token: self.token,
			request_timeout_secs: self
				.request_timeout_secs
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
		}
	}
}

/// Control-plane configuration (runtime, resolved).
///
/// How the bearer token is obtained is outside this crate; it is passed
/// through verbatim on every request when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
	pub base_url: String,
	pub api_version: String,
	pub token: Option<SecretString>,
	pub request_timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
	fn default() -> Self {
		ControlPlaneConfigLayer::default().finalize()
	}
}
