// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control-plane URL layout.

use trysite_server_pool::{ResourceId, Shard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmPaths {
	base_url: String,
	api_version: String,
}

impl ArmPaths {
	pub fn new(base_url: impl Into<String>, api_version: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
			api_version: api_version.into(),
		}
	}

	/// All sites in the shard's resource group.
	pub fn sites(&self, shard: &Shard) -> String {
		format!(
			"{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites?api-version={}",
			self.base_url, shard.key.subscription_id, shard.resource_group, self.api_version
		)
	}

	pub fn site(&self, id: &ResourceId) -> String {
		self.under(id, "")
	}

	/// A config document, e.g. `appsettings` or `web`.
	pub fn config(&self, id: &ResourceId, name: &str) -> String {
		self.under(id, &format!("/config/{name}"))
	}

	/// The POST endpoint that reads a config document back.
	pub fn config_list(&self, id: &ResourceId, name: &str) -> String {
		self.under(id, &format!("/config/{name}/list"))
	}

	pub fn deployments(&self, id: &ResourceId) -> String {
		self.under(id, "/deployments")
	}

	fn under(&self, id: &ResourceId, suffix: &str) -> String {
		format!(
			"{}{}{}?api-version={}",
			self.base_url,
			id.path(),
			suffix,
			self.api_version
		)
	}
}

/// Kudu endpoints are relative to the site's source-control URL.
pub fn kudu_zip(scm_url: &str, target_dir: &str) -> String {
	format!("{}zip/{}/", with_slash(scm_url), target_dir.trim_matches('/'))
}

pub fn kudu_vfs(scm_url: &str, path: &str) -> String {
	format!("{}vfs/{}", with_slash(scm_url), path.trim_start_matches('/'))
}

fn with_slash(url: &str) -> String {
	if url.ends_with('/') {
		url.to_string()
	} else {
		format!("{url}/")
	}
}
