// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The pool: free/in-use partition, leasing and maintenance.
//!
//! Every change to the partition happens under one lock, and the lock is never
//! held across a network call. A site being activated or reclaimed is in
//! neither set; a site that is `Free` or `InUse` is in exactly one.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::activator::LeaseActivator;
use crate::client::ShardClients;
use crate::clock::Clock;
use crate::config::{Collaborators, PoolSettings};
use crate::error::{ActivationError, PoolError, Result};
use crate::inventory::{ShardInventory, ShardLoadFailure};
use crate::naming::SiteNameGenerator;
use crate::reaper::ExpiryReaper;
use crate::reclaim::{ReclaimOutcome, Reclaimer};
use crate::types::{Resource, ResourceId, ResourceState, ShardKey, Template};

#[derive(Default)]
struct PoolState {
	free: VecDeque<Resource>,
	in_use: HashMap<ResourceId, Resource>,
	activating: usize,
}

impl PoolState {
	fn contains(&self, id: &ResourceId) -> bool {
		self.in_use.contains_key(id) || self.free.iter().any(|r| &r.id == id)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
	pub free: usize,
	pub in_use: usize,
	pub activating: usize,
	pub reclaiming: usize,
}

/// Point-in-time copy of partition membership.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
	pub free: Vec<ResourceId>,
	pub in_use: Vec<ResourceId>,
}

/// What initialization found.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupSummary {
	pub loaded_shards: Vec<ShardKey>,
	pub failed_shards: Vec<(ShardKey, String)>,
	pub free: usize,
	pub in_use: usize,
	pub provisioned: usize,
}

#[derive(Debug, Default)]
pub struct MaintenanceReport {
	pub scanned: usize,
	pub expired: Vec<ResourceId>,
	pub outcomes: Vec<ReclaimOutcome>,
}

impl MaintenanceReport {
	pub fn failures(&self) -> usize {
		self.outcomes.iter().filter(|o| !o.is_success()).count()
	}
}

#[derive(Debug)]
pub enum MaintenanceOutcome {
	/// Another run was still in progress; nothing was done.
	Skipped,
	Completed(MaintenanceReport),
}

/// Per-site results of [`PoolManager::reset_all`]. Failures of one site do
/// not hide the others.
#[derive(Debug, Default)]
pub struct ResetReport {
	pub outcomes: Vec<ReclaimOutcome>,
}

impl ResetReport {
	pub fn deleted(&self) -> usize {
		self.outcomes.iter().filter(|o| o.deleted.is_ok()).count()
	}

	pub fn replaced(&self) -> usize {
		self.outcomes.iter().filter(|o| o.replacement.is_ok()).count()
	}

	pub fn errors(&self) -> impl Iterator<Item = &PoolError> {
		self.outcomes.iter().flat_map(|o| {
			o.deleted
				.as_ref()
				.err()
				.into_iter()
				.chain(o.replacement.as_ref().err())
		})
	}
}

/// Clears the maintenance flag when a run ends, however it ends.
struct MaintenanceGuard<'a>(&'a AtomicBool);

impl<'a> MaintenanceGuard<'a> {
	fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| Self(flag))
	}
}

impl Drop for MaintenanceGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

struct PoolInner {
	state: Mutex<PoolState>,
	clients: Arc<ShardClients>,
	activator: LeaseActivator,
	reaper: ExpiryReaper,
	reclaimer: Reclaimer,
	clock: Arc<dyn Clock>,
	maintenance_running: AtomicBool,
	reclaiming: AtomicUsize,
	background: StdMutex<Vec<JoinHandle<()>>>,
	startup: StartupSummary,
}

/// Handle to the pool. Cheap to clone; all clones share one partition.
#[derive(Clone)]
pub struct PoolManager {
	inner: Arc<PoolInner>,
}

impl PoolManager {
	/// Load every shard and build the first partition. Serving may start
	/// once this returns.
	#[instrument(skip_all, fields(shards = settings.shards.len()))]
	pub async fn initialize(settings: PoolSettings, collaborators: Collaborators) -> Result<Self> {
		settings.validate()?;

		let names = SiteNameGenerator::new(settings.site_name_prefix.clone());
		let report = ShardInventory::new(
			Arc::clone(&collaborators.connector),
			Arc::clone(&collaborators.clock),
			settings.lease_ttl,
		)
		.with_target_size(settings.target_size_per_shard, names.clone())
		.load(&settings.shards)
		.await;

		let mut startup = StartupSummary {
			failed_shards: report
				.failures
				.iter()
				.map(|ShardLoadFailure { shard, error }| (shard.clone(), error.to_string()))
				.collect(),
			..Default::default()
		};
		let mut clients = ShardClients::default();
		let mut state = PoolState::default();
		for loaded in report.shards {
			startup.loaded_shards.push(loaded.shard.key.clone());
			startup.provisioned += loaded.provisioned;
			clients.insert(loaded.shard, loaded.client);
			for resource in loaded.resources {
				match resource.state {
					ResourceState::InUse => {
						state.in_use.insert(resource.id.clone(), resource);
					}
					_ => state.free.push_back(resource),
				}
			}
		}
		startup.free = state.free.len();
		startup.in_use = state.in_use.len();

		if clients.is_empty() {
			warn!("no shard loaded, the pool starts empty");
		}
		info!(
			free = startup.free,
			in_use = startup.in_use,
			failed_shards = startup.failed_shards.len(),
			"pool initialized"
		);

		let clients = Arc::new(clients);
		let inner = PoolInner {
			state: Mutex::new(state),
			activator: LeaseActivator::new(
				collaborators.content,
				Arc::clone(&collaborators.clock),
				settings.lease_ttl,
				settings.deploy_timeout,
				settings.deploy_poll_interval,
			),
			reaper: ExpiryReaper::new(settings.lease_ttl),
			reclaimer: Reclaimer::new(
				Arc::clone(&clients),
				names,
				settings.replacement.clone(),
				settings.lease_ttl,
			),
			clients,
			clock: collaborators.clock,
			maintenance_running: AtomicBool::new(false),
			reclaiming: AtomicUsize::new(0),
			background: StdMutex::new(Vec::new()),
			startup,
		};
		Ok(Self {
			inner: Arc::new(inner),
		})
	}

	/// Take a free site and lease it to `owner`, deploying `template` first
	/// when given.
	///
	/// Never waits for capacity: an empty pool is [`PoolError::PoolExhausted`].
	/// A site whose activation fails is discarded and replaced, never reused.
	/// Activation runs on its own task, so dropping this future does not
	/// strand the site.
	#[instrument(skip_all, fields(template = template.map(|t| t.name.as_str())))]
	pub async fn acquire(&self, template: Option<&Template>, owner: &str) -> Result<Resource> {
		let mut resource = {
			let mut state = self.inner.state.lock().await;
			let Some(resource) = state.free.pop_front() else {
				debug!("pool exhausted");
				return Err(PoolError::PoolExhausted);
			};
			state.activating += 1;
			resource
		};
		resource.state = ResourceState::Activating;
		resource.lease_start = Some(self.inner.clock.now());

		let inner = Arc::clone(&self.inner);
		let template = template.cloned();
		let owner = owner.to_string();
		tokio::spawn(async move { inner.activate(resource, template, owner).await })
			.await
			.map_err(|e| PoolError::Task(e.to_string()))?
	}

	/// A leased site by id. Free sites are not addressable.
	pub async fn lookup(&self, id: &ResourceId) -> Result<Resource> {
		let state = self.inner.state.lock().await;
		state
			.in_use
			.get(id)
			.cloned()
			.ok_or_else(|| PoolError::NotFound { id: id.clone() })
	}

	/// End a lease. The id stops resolving immediately; deletion and
	/// replacement continue in the background.
	#[instrument(skip_all, fields(resource = %id))]
	pub async fn release(&self, id: &ResourceId) -> Result<()> {
		let resource = {
			let mut state = self.inner.state.lock().await;
			state.in_use.remove(id)
		}
		.ok_or_else(|| PoolError::NotFound { id: id.clone() })?;

		info!("lease released");
		self.inner.spawn_reclaim(resource);
		Ok(())
	}

	/// Retire every free site, replacing each with a fresh one.
	#[instrument(skip(self))]
	pub async fn reset_all(&self) -> ResetReport {
		let now = self.inner.clock.now();
		let drained: Vec<Resource> = {
			let mut state = self.inner.state.lock().await;
			state.free.drain(..).collect()
		};
		info!(count = drained.len(), "resetting free sites");

		let outcomes = join_all(drained.into_iter().map(|mut resource| {
			resource.lease_start = Some(now);
			self.inner.reclaim(resource)
		}))
		.await;

		let report = ResetReport { outcomes };
		info!(
			deleted = report.deleted(),
			replaced = report.replaced(),
			errors = report.errors().count(),
			"reset complete"
		);
		report
	}

	/// Add a newly provisioned site to the free set.
	pub async fn on_resource_created(&self, resource: Resource) {
		self.inner.insert_free(resource).await;
	}

	/// One maintenance pass: find expired leases and reclaim them.
	///
	/// Runs never overlap. A call made while another is in progress returns
	/// [`MaintenanceOutcome::Skipped`] at once.
	#[instrument(skip(self))]
	pub async fn run_maintenance(&self) -> MaintenanceOutcome {
		let Some(_guard) = MaintenanceGuard::try_acquire(&self.inner.maintenance_running) else {
			debug!("maintenance already running, skipping");
			return MaintenanceOutcome::Skipped;
		};

		let snapshot: Vec<Resource> = {
			let state = self.inner.state.lock().await;
			state.in_use.values().cloned().collect()
		};
		let now = self.inner.clock.now();
		let expired = self.inner.reaper.find_expired(&snapshot, now);

		// Released since the snapshot means someone else already reclaims it.
		let claimed: Vec<Resource> = {
			let mut state = self.inner.state.lock().await;
			expired.iter().filter_map(|id| state.in_use.remove(id)).collect()
		};
		for resource in &claimed {
			info!(resource = %resource.id, "lease expired");
		}

		let outcomes = join_all(claimed.into_iter().map(|r| self.inner.reclaim(r))).await;
		let report = MaintenanceReport {
			scanned: snapshot.len(),
			expired,
			outcomes,
		};
		info!(
			scanned = report.scanned,
			expired = report.expired.len(),
			failures = report.failures(),
			"maintenance complete"
		);
		MaintenanceOutcome::Completed(report)
	}

	pub async fn stats(&self) -> PoolStats {
		let state = self.inner.state.lock().await;
		PoolStats {
			free: state.free.len(),
			in_use: state.in_use.len(),
			activating: state.activating,
			reclaiming: self.inner.reclaiming.load(Ordering::SeqCst),
		}
	}

	pub async fn snapshot(&self) -> PoolSnapshot {
		let state = self.inner.state.lock().await;
		PoolSnapshot {
			free: state.free.iter().map(|r| r.id.clone()).collect(),
			in_use: state.in_use.keys().cloned().collect(),
		}
	}

	pub fn startup_summary(&self) -> &StartupSummary {
		&self.inner.startup
	}

	pub fn shard_count(&self) -> usize {
		self.inner.clients.len()
	}

	/// Wait until every background reclaim started so far has finished.
	pub async fn wait_for_background(&self) {
		loop {
			let handles = std::mem::take(
				&mut *self
					.inner
					.background
					.lock()
					.unwrap_or_else(PoisonError::into_inner),
			);
			if handles.is_empty() {
				return;
			}
			for handle in handles {
				if let Err(e) = handle.await {
					warn!(error = %e, "background reclaim task failed");
				}
			}
		}
	}
}

/// Keeps an activating site accounted for if its task panics or is aborted
/// before the outcome is recorded.
struct ActivationGuard {
	inner: Arc<PoolInner>,
	resource: Option<Resource>,
}

impl ActivationGuard {
	fn new(inner: Arc<PoolInner>, resource: Resource) -> Self {
		Self {
			inner,
			resource: Some(resource),
		}
	}

	fn disarm(&mut self) {
		self.resource = None;
	}
}

impl Drop for ActivationGuard {
	fn drop(&mut self) {
		let Some(resource) = self.resource.take() else {
			return;
		};
		if tokio::runtime::Handle::try_current().is_err() {
			error!(resource = %resource.id, "activation abandoned outside the runtime, site not reclaimed");
			return;
		}
		error!(resource = %resource.id, "activation ended abruptly, discarding site");
		self.inner.spawn_abandoned(resource);
	}
}

impl PoolInner {
	async fn activate(
		self: Arc<Self>,
		mut resource: Resource,
		template: Option<Template>,
		owner: String,
	) -> Result<Resource> {
		let mut guard = ActivationGuard::new(Arc::clone(&self), resource.clone());
		let key = resource.id.shard_key();
		let result = match self.clients.get(&key) {
			Some(client) => {
				self.activator
					.activate(client.as_ref(), &mut resource, template.as_ref(), &owner)
					.await
			}
			None => Err(ActivationError::NoShardClient(key)),
		};

		let mut state = self.state.lock().await;
		guard.disarm();
		state.activating = state.activating.saturating_sub(1);
		match result {
			Ok(started) => {
				resource.state = ResourceState::InUse;
				resource.lease_start = Some(started);
				state.in_use.insert(resource.id.clone(), resource.clone());
				drop(state);
				info!(resource = %resource.id, owner = %owner, "site leased");
				Ok(resource)
			}
			Err(source) => {
				drop(state);
				warn!(resource = %resource.id, error = %source, "activation failed, discarding site");
				let id = resource.id.clone();
				self.spawn_reclaim(resource);
				Err(PoolError::ActivationFailed { id, source })
			}
		}
	}

	async fn reclaim(&self, resource: Resource) -> ReclaimOutcome {
		self.reclaiming.fetch_add(1, Ordering::SeqCst);
		let (outcome, created) = self.reclaimer.reclaim(resource).await;
		if let Some(site) = created {
			self.insert_free(site).await;
		}
		self.reclaiming.fetch_sub(1, Ordering::SeqCst);
		outcome
	}

	fn spawn_reclaim(self: &Arc<Self>, resource: Resource) {
		let inner = Arc::clone(self);
		self.track(tokio::spawn(async move {
			inner.reclaim(resource).await;
		}));
	}

	/// Reclaim a site whose activation never reported back.
	fn spawn_abandoned(self: &Arc<Self>, resource: Resource) {
		let inner = Arc::clone(self);
		self.track(tokio::spawn(async move {
			{
				let mut state = inner.state.lock().await;
				state.activating = state.activating.saturating_sub(1);
			}
			inner.reclaim(resource).await;
		}));
	}

	fn track(&self, handle: JoinHandle<()>) {
		let mut background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
		background.retain(|h| !h.is_finished());
		background.push(handle);
	}

	async fn insert_free(&self, mut resource: Resource) {
		resource.state = ResourceState::Free;
		resource.lease_start = None;
		let mut state = self.state.lock().await;
		if state.contains(&resource.id) {
			warn!(resource = %resource.id, "site already pooled, ignoring");
			return;
		}
		debug!(resource = %resource.id, "site added to free set");
		state.free.push_back(resource);
	}
}
