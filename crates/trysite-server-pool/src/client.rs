// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Contracts for the collaborators the pool drives.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{DeployStatus, Resource, ResourceId, Shard, ShardKey, SiteConfigPatch};

/// Control-plane access scoped to one shard.
///
/// Writes have PUT semantics: each call replaces the whole collection, so
/// repeating one is harmless.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
	/// Every site in the shard with endpoints, settings, metadata and
	/// publishing credentials populated.
	async fn list_resources(&self) -> Result<Vec<Resource>, ClientError>;

	/// Provision a new site named `name` and return it fully populated.
	async fn create_resource(&self, name: &str) -> Result<Resource, ClientError>;

	async fn delete_resource(&self, id: &ResourceId) -> Result<(), ClientError>;

	async fn update_app_settings(
		&self,
		id: &ResourceId,
		settings: &BTreeMap<String, String>,
	) -> Result<(), ClientError>;

	async fn update_metadata(
		&self,
		id: &ResourceId,
		metadata: &BTreeMap<String, String>,
	) -> Result<(), ClientError>;

	async fn update_site_config(
		&self,
		id: &ResourceId,
		patch: &SiteConfigPatch,
	) -> Result<(), ClientError>;

	/// Status of the latest content deployment, `None` if there is none yet.
	async fn deployment_status(&self, id: &ResourceId) -> Result<Option<DeployStatus>, ClientError>;
}

/// Builds shard-scoped control-plane clients.
pub trait ShardConnector: Send + Sync {
	fn connect(&self, shard: &Shard) -> Result<Arc<dyn ControlPlaneClient>, ClientError>;
}

/// Pushes content onto a site's deployment target, authenticating with the
/// site's own publishing credentials.
#[async_trait]
pub trait ContentDeployClient: Send + Sync {
	/// Extract the zip at `package` into `target_dir` on the site.
	async fn deploy_package(
		&self,
		resource: &Resource,
		target_dir: &str,
		package: &Path,
	) -> Result<(), ClientError>;

	async fn delete_path(&self, resource: &Resource, path: &str) -> Result<(), ClientError>;
}

/// Connected control-plane clients keyed by shard.
#[derive(Clone, Default)]
pub struct ShardClients {
	clients: HashMap<ShardKey, (Shard, Arc<dyn ControlPlaneClient>)>,
}

impl ShardClients {
	pub fn insert(&mut self, shard: Shard, client: Arc<dyn ControlPlaneClient>) {
		self.clients.insert(shard.key.clone(), (shard, client));
	}

	pub fn get(&self, key: &ShardKey) -> Option<&Arc<dyn ControlPlaneClient>> {
		self.clients.get(key).map(|(_, client)| client)
	}

	pub fn shard(&self, key: &ShardKey) -> Option<&Shard> {
		self.clients.get(key).map(|(shard, _)| shard)
	}

	pub fn len(&self) -> usize {
		self.clients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clients.is_empty()
	}
}
