// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core pool types: resources, shards, templates and leases.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trysite_common_config::SecretString;

/// Keys under which lease bookkeeping is stored on the resource itself.
///
/// The pool keeps no local state, so these are also what a restarted process
/// reads back to rebuild the in-use set.
pub mod keys {
	/// Metadata: owner of the current lease. Its presence marks a site in use.
	pub const OWNER_METADATA: &str = "USERID";
	/// Metadata: which kind of app the lease was created for.
	pub const APP_KIND_METADATA: &str = "APP_SERVICE_METADATA";
	/// App setting: owner of the current lease.
	pub const OWNER_SETTING: &str = "USER_ID";
	/// App setting: RFC 3339 timestamp of the activation.
	pub const LEASE_START_SETTING: &str = "LAST_MODIFIED_TIME_UTC";
	/// App setting: lease length in minutes, overriding the pool default.
	pub const LIFETIME_SETTING: &str = "SITE_LIFE_TIME_IN_MINUTES";
	/// App setting: marks the site as a trial site.
	pub const TRY_MODE_SETTING: &str = "WEBSITE_TRY_MODE";
	/// App setting: the template deployed by the current lease.
	pub const TEMPLATE_SETTING: &str = "TRYSITE_TEMPLATE";

	/// Deployment root on the content target.
	pub const CONTENT_ROOT: &str = "site/wwwroot";
	/// Placeholder page every fresh site ships with.
	pub const PLACEHOLDER_PATH: &str = "site/wwwroot/hostingstart.html";
}

/// A (subscription, region) pair. Shards own disjoint sets of resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardKey {
	pub subscription_id: String,
	pub region: String,
}

impl fmt::Display for ShardKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.subscription_id, self.region)
	}
}

/// A shard plus the resource group new resources are provisioned into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
	pub key: ShardKey,
	pub resource_group: String,
}

impl Shard {
	pub fn new(
		subscription_id: impl Into<String>,
		region: impl Into<String>,
		resource_group: impl Into<String>,
	) -> Self {
		Self {
			key: ShardKey {
				subscription_id: subscription_id.into(),
				region: region.into(),
			},
			resource_group: resource_group.into(),
		}
	}
}

/// Globally unique identity of a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
	pub subscription_id: String,
	pub resource_group: String,
	pub region: String,
	pub name: String,
}

impl ResourceId {
	pub fn new(shard: &Shard, name: impl Into<String>) -> Self {
		Self {
			subscription_id: shard.key.subscription_id.clone(),
			resource_group: shard.resource_group.clone(),
			region: shard.key.region.clone(),
			name: name.into(),
		}
	}

	pub fn shard_key(&self) -> ShardKey {
		ShardKey {
			subscription_id: self.subscription_id.clone(),
			region: self.region.clone(),
		}
	}

	/// Control-plane path of the site.
	pub fn path(&self) -> String {
		format!(
			"/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}",
			self.subscription_id, self.resource_group, self.name
		)
	}
}

impl fmt::Display for ResourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.path())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
	Free,
	Activating,
	InUse,
	/// Terminal for this identity.
	Deleting,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublishingCredentials {
	pub user_name: String,
	pub password: SecretString,
}

/// A leasable site.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
	pub id: ResourceId,
	pub host_name: Option<String>,
	pub scm_host_name: Option<String>,
	pub publishing: PublishingCredentials,
	pub app_settings: BTreeMap<String, String>,
	pub metadata: BTreeMap<String, String>,
	pub state: ResourceState,
	/// Set while `Activating` or `InUse`.
	pub lease_start: Option<DateTime<Utc>>,
}

impl Resource {
	pub fn new(id: ResourceId) -> Self {
		Self {
			id,
			host_name: None,
			scm_host_name: None,
			publishing: PublishingCredentials::default(),
			app_settings: BTreeMap::new(),
			metadata: BTreeMap::new(),
			state: ResourceState::Free,
			lease_start: None,
		}
	}

	pub fn url(&self) -> Option<String> {
		self.host_name.as_ref().map(|h| format!("https://{h}/"))
	}

	pub fn scm_url(&self) -> Option<String> {
		self.scm_host_name.as_ref().map(|h| format!("https://{h}/"))
	}

	pub fn content_download_url(&self) -> Option<String> {
		self.scm_url().map(|u| format!("{u}zip/{}", keys::CONTENT_ROOT))
	}

	pub fn owner(&self) -> Option<&str> {
		self.metadata.get(keys::OWNER_METADATA).map(String::as_str)
	}

	/// Whether the site carries the owner marker written by activation.
	pub fn is_leased(&self) -> bool {
		self.owner().is_some_and(|o| !o.is_empty())
	}

	/// Lease start as recorded on the site, if present and well formed.
	pub fn recorded_lease_start(&self) -> Option<DateTime<Utc>> {
		self.app_settings
			.get(keys::LEASE_START_SETTING)
			.and_then(|v| DateTime::parse_from_rfc3339(v).ok())
			.map(|dt| dt.with_timezone(&Utc))
	}

	/// Per-site lease length, if the site overrides the pool default.
	///
	/// Values that are zero, malformed or too large to represent are ignored.
	pub fn ttl_override(&self) -> Option<Duration> {
		self.app_settings
			.get(keys::LIFETIME_SETTING)
			.and_then(|v| v.trim().parse::<u64>().ok())
			.filter(|minutes| *minutes > 0)
			.and_then(|minutes| minutes.checked_mul(60))
			.map(Duration::from_secs)
	}

	/// The current lease, if the site is leased.
	pub fn lease(&self, default_ttl: Duration) -> Option<Lease> {
		self.lease_start.map(|acquired_at| Lease {
			resource: self.id.clone(),
			acquired_at,
			ttl: self.ttl_override().unwrap_or(default_ttl),
		})
	}
}

/// Derived view of a resource's current lease; never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
	pub resource: ResourceId,
	pub acquired_at: DateTime<Utc>,
	pub ttl: Duration,
}

impl Lease {
	/// Expired strictly after `ttl`; a lease exactly `ttl` old is still live.
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
			return false;
		};
		now.signed_duration_since(self.acquired_at) > ttl
	}
}

/// A deployable code template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
	pub name: String,
	pub language: String,
	/// Location of the content package (a zip file).
	pub package_path: PathBuf,
	pub icon_class: Option<String>,
}

/// State of the most recent content deployment on a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
	Pending,
	Building,
	Deploying,
	Failed,
	Success,
}

impl DeployStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, DeployStatus::Failed | DeployStatus::Success)
	}
}

/// Partial update of a site's web configuration. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfigPatch {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub http_logging_enabled: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scm_type: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn resource() -> Resource {
		let shard = Shard::new("sub-1", "West US", "trysite-westus");
		Resource::new(ResourceId::new(&shard, "trysite-abc"))
	}

	#[test]
	fn resource_id_renders_control_plane_path() {
		let r = resource();
		assert_eq!(
			r.id.to_string(),
			"/subscriptions/sub-1/resourceGroups/trysite-westus/providers/Microsoft.Web/sites/trysite-abc"
		);
		assert_eq!(r.id.shard_key().to_string(), "sub-1/West US");
	}

	#[test]
	fn urls_derive_from_hosts() {
		let mut r = resource();
		assert!(r.url().is_none());

		r.host_name = Some("trysite-abc.azurewebsites.net".to_string());
		r.scm_host_name = Some("trysite-abc.scm.azurewebsites.net".to_string());
		assert_eq!(r.url().unwrap(), "https://trysite-abc.azurewebsites.net/");
		assert_eq!(
			r.content_download_url().unwrap(),
			"https://trysite-abc.scm.azurewebsites.net/zip/site/wwwroot"
		);
	}

	#[test]
	fn leased_requires_non_empty_owner() {
		let mut r = resource();
		assert!(!r.is_leased());
		r.metadata.insert(keys::OWNER_METADATA.to_string(), String::new());
		assert!(!r.is_leased());
		r.metadata.insert(keys::OWNER_METADATA.to_string(), "user-1".to_string());
		assert!(r.is_leased());
	}

	#[test]
	fn ttl_override_ignores_garbage_and_zero() {
		let mut r = resource();
		r.app_settings.insert(keys::LIFETIME_SETTING.to_string(), "abc".to_string());
		assert_eq!(r.ttl_override(), None);
		r.app_settings.insert(keys::LIFETIME_SETTING.to_string(), "0".to_string());
		assert_eq!(r.ttl_override(), None);
		r.app_settings.insert(keys::LIFETIME_SETTING.to_string(), "30".to_string());
		assert_eq!(r.ttl_override(), Some(Duration::from_secs(1800)));
	}

	#[test]
	fn ttl_override_too_large_to_represent_is_ignored() {
		let mut r = resource();
		r.app_settings
			.insert(keys::LIFETIME_SETTING.to_string(), "400000000000000000".to_string());
		assert_eq!(r.ttl_override(), None);
		r.app_settings
			.insert(keys::LIFETIME_SETTING.to_string(), u64::MAX.to_string());
		assert_eq!(r.ttl_override(), None);
	}

	#[test]
	fn recorded_lease_start_parses_rfc3339() {
		let mut r = resource();
		r.app_settings.insert(
			keys::LEASE_START_SETTING.to_string(),
			"2025-03-01T10:00:00+00:00".to_string(),
		);
		assert_eq!(
			r.recorded_lease_start(),
			Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
		);

		r.app_settings
			.insert(keys::LEASE_START_SETTING.to_string(), "3/1/2025 10:00 AM".to_string());
		assert_eq!(r.recorded_lease_start(), None);
	}

	#[test]
	fn lease_expiry_is_strictly_after_ttl() {
		let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
		let lease = Lease {
			resource: resource().id,
			acquired_at: start,
			ttl: Duration::from_secs(3600),
		};

		assert!(!lease.is_expired_at(start + chrono::Duration::seconds(3600)));
		assert!(lease.is_expired_at(start + chrono::Duration::milliseconds(3_600_001)));
	}

	#[test]
	fn site_config_patch_skips_unset_fields() {
		let patch = SiteConfigPatch {
			http_logging_enabled: Some(true),
			scm_type: None,
		};
		assert_eq!(
			serde_json::to_string(&patch).unwrap(),
			r#"{"httpLoggingEnabled":true}"#
		);
	}
}
