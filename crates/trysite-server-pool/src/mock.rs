// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory collaborators for testing code that drives the pool.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::client::{ContentDeployClient, ControlPlaneClient, ShardConnector};
use crate::error::ClientError;
use crate::types::{
	DeployStatus, PublishingCredentials, Resource, ResourceId, Shard, ShardKey, SiteConfigPatch,
};

/// A shard in the test subscription. The resource group is derived from the region.
pub fn shard(region: &str) -> Shard {
	Shard::new("sub-test", region, format!("rg-{region}"))
}

/// A fully populated free site in `shard`.
pub fn resource(shard: &Shard, name: &str) -> Resource {
	let mut r = Resource::new(ResourceId::new(shard, name));
	r.host_name = Some(format!("{name}.azurewebsites.net"));
	r.scm_host_name = Some(format!("{name}.scm.azurewebsites.net"));
	r.publishing = PublishingCredentials {
		user_name: format!("${name}"),
		password: format!("pw-{name}").into(),
	};
	r
}

fn injected(what: &str) -> ClientError {
	ClientError::Request(format!("injected {what} failure"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlPlaneCall {
	ListResources,
	CreateResource {
		name: String,
	},
	DeleteResource {
		id: ResourceId,
	},
	UpdateAppSettings {
		id: ResourceId,
		settings: BTreeMap<String, String>,
	},
	UpdateMetadata {
		id: ResourceId,
		metadata: BTreeMap<String, String>,
	},
	UpdateSiteConfig {
		id: ResourceId,
		patch: SiteConfigPatch,
	},
	DeploymentStatus {
		id: ResourceId,
	},
}

/// Control plane for one shard, holding its sites in memory.
pub struct MockControlPlane {
	shard: Shard,
	sites: Mutex<BTreeMap<String, Resource>>,
	calls: Arc<Mutex<Vec<ControlPlaneCall>>>,
	fail_list: AtomicBool,
	fail_deletes: AtomicBool,
	fail_settings: AtomicBool,
	failing_creates: AtomicU32,
	deploy_statuses: Mutex<VecDeque<DeployStatus>>,
	deploy_fallback: Mutex<Option<DeployStatus>>,
	delete_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockControlPlane {
	pub fn new(shard: Shard) -> Self {
		Self {
			shard,
			sites: Mutex::new(BTreeMap::new()),
			calls: Arc::new(Mutex::new(Vec::new())),
			fail_list: AtomicBool::new(false),
			fail_deletes: AtomicBool::new(false),
			fail_settings: AtomicBool::new(false),
			failing_creates: AtomicU32::new(0),
			deploy_statuses: Mutex::new(VecDeque::new()),
			deploy_fallback: Mutex::new(Some(DeployStatus::Success)),
			delete_gate: Mutex::new(None),
		}
	}

	pub fn with_resource(self, resource: Resource) -> Self {
		self.sites
			.lock()
			.unwrap()
			.insert(resource.id.name.clone(), resource);
		self
	}

	/// Seed `count` free sites named `{prefix}-{n}`.
	pub fn with_free_sites(self, prefix: &str, count: usize) -> Self {
		(0..count).fold(self, |mock, n| {
			let site = resource(&mock.shard, &format!("{prefix}-{n}"));
			mock.with_resource(site)
		})
	}

	pub fn shard(&self) -> &Shard {
		&self.shard
	}

	pub fn calls(&self) -> Vec<ControlPlaneCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn clear_calls(&self) {
		self.calls.lock().unwrap().clear();
	}

	pub fn site_names(&self) -> Vec<String> {
		self.sites.lock().unwrap().keys().cloned().collect()
	}

	pub fn site(&self, name: &str) -> Option<Resource> {
		self.sites.lock().unwrap().get(name).cloned()
	}

	pub fn created_names(&self) -> Vec<String> {
		self.calls()
			.into_iter()
			.filter_map(|c| match c {
				ControlPlaneCall::CreateResource { name } => Some(name),
				_ => None,
			})
			.collect()
	}

	pub fn deleted_ids(&self) -> Vec<ResourceId> {
		self.calls()
			.into_iter()
			.filter_map(|c| match c {
				ControlPlaneCall::DeleteResource { id } => Some(id),
				_ => None,
			})
			.collect()
	}

	pub fn set_fail_list(&self, fail: bool) {
		self.fail_list.store(fail, Ordering::SeqCst);
	}

	pub fn set_fail_deletes(&self, fail: bool) {
		self.fail_deletes.store(fail, Ordering::SeqCst);
	}

	pub fn set_fail_settings(&self, fail: bool) {
		self.fail_settings.store(fail, Ordering::SeqCst);
	}

	/// The next `count` create calls fail.
	pub fn fail_next_creates(&self, count: u32) {
		self.failing_creates.store(count, Ordering::SeqCst);
	}

	/// Queue statuses returned by successive `deployment_status` calls.
	pub fn push_deploy_status(&self, status: DeployStatus) {
		self.deploy_statuses.lock().unwrap().push_back(status);
	}

	/// Status returned once the queue is empty.
	pub fn set_deploy_fallback(&self, status: Option<DeployStatus>) {
		*self.deploy_fallback.lock().unwrap() = status;
	}

	/// Make every delete wait on the returned notify before completing.
	pub fn gate_deletes(&self) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());
		*self.delete_gate.lock().unwrap() = Some(Arc::clone(&gate));
		gate
	}

	fn record(&self, call: ControlPlaneCall) {
		self.calls.lock().unwrap().push(call);
	}

	fn update_site(
		&self,
		id: &ResourceId,
		apply: impl FnOnce(&mut Resource),
	) -> Result<(), ClientError> {
		let mut sites = self.sites.lock().unwrap();
		let site = sites
			.get_mut(&id.name)
			.ok_or_else(|| ClientError::NotFound(id.to_string()))?;
		apply(site);
		Ok(())
	}
}

#[async_trait]
impl ControlPlaneClient for MockControlPlane {
	async fn list_resources(&self) -> Result<Vec<Resource>, ClientError> {
		self.record(ControlPlaneCall::ListResources);
		if self.fail_list.load(Ordering::SeqCst) {
			return Err(injected("list"));
		}
		Ok(self.sites.lock().unwrap().values().cloned().collect())
	}

	async fn create_resource(&self, name: &str) -> Result<Resource, ClientError> {
		self.record(ControlPlaneCall::CreateResource {
			name: name.to_string(),
		});
		let failing = self
			.failing_creates
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok();
		if failing {
			return Err(injected("create"));
		}
		let site = resource(&self.shard, name);
		self.sites
			.lock()
			.unwrap()
			.insert(name.to_string(), site.clone());
		Ok(site)
	}

	async fn delete_resource(&self, id: &ResourceId) -> Result<(), ClientError> {
		self.record(ControlPlaneCall::DeleteResource { id: id.clone() });
		let gate = self.delete_gate.lock().unwrap().clone();
		if let Some(gate) = gate {
			gate.notified().await;
		}
		if self.fail_deletes.load(Ordering::SeqCst) {
			return Err(injected("delete"));
		}
		self.sites
			.lock()
			.unwrap()
			.remove(&id.name)
			.map(|_| ())
			.ok_or_else(|| ClientError::NotFound(id.to_string()))
	}

	async fn update_app_settings(
		&self,
		id: &ResourceId,
		settings: &BTreeMap<String, String>,
	) -> Result<(), ClientError> {
		self.record(ControlPlaneCall::UpdateAppSettings {
			id: id.clone(),
			settings: settings.clone(),
		});
		if self.fail_settings.load(Ordering::SeqCst) {
			return Err(injected("settings"));
		}
		self.update_site(id, |site| site.app_settings = settings.clone())
	}

	async fn update_metadata(
		&self,
		id: &ResourceId,
		metadata: &BTreeMap<String, String>,
	) -> Result<(), ClientError> {
		self.record(ControlPlaneCall::UpdateMetadata {
			id: id.clone(),
			metadata: metadata.clone(),
		});
		if self.fail_settings.load(Ordering::SeqCst) {
			return Err(injected("metadata"));
		}
		self.update_site(id, |site| site.metadata = metadata.clone())
	}

	async fn update_site_config(
		&self,
		id: &ResourceId,
		patch: &SiteConfigPatch,
	) -> Result<(), ClientError> {
		self.record(ControlPlaneCall::UpdateSiteConfig {
			id: id.clone(),
			patch: patch.clone(),
		});
		if self.fail_settings.load(Ordering::SeqCst) {
			return Err(injected("site config"));
		}
		self.update_site(id, |_| ())
	}

	async fn deployment_status(&self, id: &ResourceId) -> Result<Option<DeployStatus>, ClientError> {
		self.record(ControlPlaneCall::DeploymentStatus { id: id.clone() });
		let queued = self.deploy_statuses.lock().unwrap().pop_front();
		Ok(queued.or(*self.deploy_fallback.lock().unwrap()))
	}
}

/// Hands out registered [`MockControlPlane`]s by shard.
#[derive(Default)]
pub struct MockConnector {
	planes: HashMap<ShardKey, Arc<MockControlPlane>>,
	failing: HashSet<ShardKey>,
	connects: AtomicUsize,
}

impl MockConnector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_plane(mut self, plane: Arc<MockControlPlane>) -> Self {
		self.planes.insert(plane.shard().key.clone(), plane);
		self
	}

	/// Connecting to `shard` fails.
	pub fn with_failing_shard(mut self, shard: &Shard) -> Self {
		self.failing.insert(shard.key.clone());
		self
	}

	pub fn connect_count(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}
}

impl ShardConnector for MockConnector {
	fn connect(&self, shard: &Shard) -> Result<Arc<dyn ControlPlaneClient>, ClientError> {
		self.connects.fetch_add(1, Ordering::SeqCst);
		if self.failing.contains(&shard.key) {
			return Err(injected("connect"));
		}
		self.planes
			.get(&shard.key)
			.map(|plane| Arc::clone(plane) as Arc<dyn ControlPlaneClient>)
			.ok_or_else(|| ClientError::NotFound(format!("shard {}", shard.key)))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentCall {
	DeployPackage {
		site: ResourceId,
		target_dir: String,
		package: PathBuf,
	},
	DeletePath {
		site: ResourceId,
		path: String,
	},
}

#[derive(Default)]
pub struct MockContentDeploy {
	calls: Arc<Mutex<Vec<ContentCall>>>,
	fail_deploys: AtomicBool,
	fail_deletes: AtomicBool,
	panic_deploys: AtomicBool,
}

impl MockContentDeploy {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn calls(&self) -> Vec<ContentCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn set_fail_deploys(&self, fail: bool) {
		self.fail_deploys.store(fail, Ordering::SeqCst);
	}

	pub fn set_fail_deletes(&self, fail: bool) {
		self.fail_deletes.store(fail, Ordering::SeqCst);
	}

	/// Deploys panic instead of returning, as a crashed task would.
	pub fn set_panic_deploys(&self, enabled: bool) {
		self.panic_deploys.store(enabled, Ordering::SeqCst);
	}
}

#[async_trait]
impl ContentDeployClient for MockContentDeploy {
	async fn deploy_package(
		&self,
		resource: &Resource,
		target_dir: &str,
		package: &Path,
	) -> Result<(), ClientError> {
		self.calls.lock().unwrap().push(ContentCall::DeployPackage {
			site: resource.id.clone(),
			target_dir: target_dir.to_string(),
			package: package.to_path_buf(),
		});
		if self.panic_deploys.load(Ordering::SeqCst) {
			panic!("injected deploy panic");
		}
		if self.fail_deploys.load(Ordering::SeqCst) {
			return Err(injected("deploy"));
		}
		Ok(())
	}

	async fn delete_path(&self, resource: &Resource, path: &str) -> Result<(), ClientError> {
		self.calls.lock().unwrap().push(ContentCall::DeletePath {
			site: resource.id.clone(),
			path: path.to_string(),
		});
		if self.fail_deletes.load(Ordering::SeqCst) {
			return Err(injected("delete path"));
		}
		Ok(())
	}
}
