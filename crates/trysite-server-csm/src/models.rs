// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wire shapes of control-plane responses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trysite_server_pool::{DeployStatus, Resource, ResourceId, Shard};

use crate::error::CsmError;

#[derive(Debug, Deserialize, Serialize)]
pub struct Wrapper<T> {
	pub properties: T,
}

#[derive(Debug, Deserialize)]
pub struct ArrayWrapper<T> {
	#[serde(default = "Vec::new")]
	pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct CsmSite {
	pub name: String,
	#[serde(default)]
	pub location: String,
	pub properties: SiteProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteProperties {
	#[serde(default)]
	pub host_names: Vec<String>,
	#[serde(default)]
	pub enabled_host_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishingCredentials {
	pub publishing_user_name: String,
	pub publishing_password: String,
}

#[derive(Debug, Deserialize)]
pub struct Deployment {
	pub status: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateSite<'a> {
	pub location: &'a str,
	pub properties: serde_json::Map<String, serde_json::Value>,
}

pub type NameValues = Wrapper<BTreeMap<String, String>>;

impl CsmSite {
	/// Whether the site lives in `region`. Regions compare case- and
	/// whitespace-insensitively ("West US" == "westus").
	pub fn in_region(&self, region: &str) -> bool {
		normalize_region(&self.location) == normalize_region(region)
	}

	pub fn into_resource(self, shard: &Shard) -> Resource {
		let mut resource = Resource::new(ResourceId::new(shard, self.name));
		resource.host_name = self.properties.host_names.into_iter().next();
		resource.scm_host_name = self
			.properties
			.enabled_host_names
			.into_iter()
			.find(|h| h.to_ascii_lowercase().contains(".scm."));
		resource
	}
}

pub fn normalize_region(region: &str) -> String {
	region
		.chars()
		.filter(|c| !c.is_whitespace())
		.flat_map(char::to_lowercase)
		.collect()
}

/// Kudu reports deployment state as an integer.
pub fn deploy_status(code: i64) -> Result<DeployStatus, CsmError> {
	match code {
		0 => Ok(DeployStatus::Pending),
		1 => Ok(DeployStatus::Building),
		2 => Ok(DeployStatus::Deploying),
		3 => Ok(DeployStatus::Failed),
		4 => Ok(DeployStatus::Success),
		other => Err(CsmError::InvalidResponse(format!(
			"unknown deployment status {other}"
		))),
	}
}
