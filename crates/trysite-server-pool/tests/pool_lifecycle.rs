// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use trysite_server_pool::mock::{self, ContentCall, MockConnector, MockContentDeploy, MockControlPlane};
use trysite_server_pool::{
	keys, Collaborators, MaintenanceOutcome, ManualClock, PoolError, PoolManager, PoolSettings,
	ReplacementPolicy, Shard, Template,
};

const TTL: Duration = Duration::from_secs(60 * 60);

struct Harness {
	shards: Vec<Shard>,
	planes: Vec<Arc<MockControlPlane>>,
	failing: Vec<Shard>,
	content: Arc<MockContentDeploy>,
	clock: Arc<ManualClock>,
	ttl: Duration,
}

impl Harness {
	fn new() -> Self {
		Self {
			shards: Vec::new(),
			planes: Vec::new(),
			failing: Vec::new(),
			content: Arc::new(MockContentDeploy::new()),
			clock: Arc::new(ManualClock::new(
				Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap(),
			)),
			ttl: TTL,
		}
	}

	fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;
		self
	}

	fn with_shard(mut self, region: &str, free: usize) -> Self {
		let shard = mock::shard(region);
		let plane = MockControlPlane::new(shard.clone()).with_free_sites(region, free);
		self.shards.push(shard);
		self.planes.push(Arc::new(plane));
		self
	}

	fn with_failing_shard(mut self, region: &str) -> Self {
		let shard = mock::shard(region);
		self.shards.push(shard.clone());
		self.failing.push(shard);
		self
	}

	fn plane(&self) -> &Arc<MockControlPlane> {
		&self.planes[0]
	}

	async fn start(&self) -> PoolManager {
		self.try_start().await.expect("pool initializes")
	}

	async fn try_start(&self) -> Result<PoolManager, PoolError> {
		let mut connector = MockConnector::new();
		for plane in &self.planes {
			connector = connector.with_plane(Arc::clone(plane));
		}
		for shard in &self.failing {
			connector = connector.with_failing_shard(shard);
		}
		let collaborators = Collaborators::new(Arc::new(connector), self.content.clone())
			.with_clock(self.clock.clone());
		let settings = PoolSettings {
			shards: self.shards.clone(),
			lease_ttl: self.ttl,
			replacement: ReplacementPolicy::none(),
			..Default::default()
		};
		PoolManager::initialize(settings, collaborators).await
	}
}

fn template_x() -> Template {
	Template {
		name: "TemplateX".to_string(),
		language: "Node".to_string(),
		package_path: PathBuf::from("/var/lib/trysite/templates/Node/TemplateX.zip"),
		icon_class: None,
	}
}

#[tokio::test]
async fn acquire_on_empty_pool_is_exhausted_and_changes_nothing() {
	let harness = Harness::new().with_shard("westus", 1);
	let pool = harness.start().await;
	let leased = pool.acquire(None, "first").await.unwrap();

	let before = pool.snapshot().await;
	let err = pool.acquire(Some(&template_x()), "second").await.unwrap_err();
	assert!(matches!(err, PoolError::PoolExhausted));
	assert!(err.is_exhausted());

	let after = pool.snapshot().await;
	assert_eq!(before.free, after.free);
	assert_eq!(before.in_use, after.in_use);
	assert_eq!(after.in_use, vec![leased.id]);
	assert!(harness.content.calls().is_empty());
}

#[tokio::test]
async fn failed_activation_discards_and_replaces_the_site() {
	let harness = Harness::new().with_shard("westus", 1);
	harness.content.set_fail_deploys(true);
	let pool = harness.start().await;

	let err = pool.acquire(Some(&template_x()), "user").await.unwrap_err();
	let id = match &err {
		PoolError::ActivationFailed { id, .. } => id.clone(),
		other => panic!("expected activation failure, got {other:?}"),
	};

	let snapshot = pool.snapshot().await;
	assert!(!snapshot.free.contains(&id));

	pool.wait_for_background().await;
	let snapshot = pool.snapshot().await;
	assert!(!snapshot.free.contains(&id));
	assert!(!snapshot.in_use.contains(&id));
	assert!(pool.lookup(&id).await.is_err());
	assert_eq!(snapshot.free.len(), 1);
	assert_eq!(harness.plane().deleted_ids(), vec![id]);
}

#[tokio::test]
async fn panicked_activation_is_reclaimed_and_replaced() {
	let harness = Harness::new().with_shard("westus", 1);
	harness.content.set_panic_deploys(true);
	let pool = harness.start().await;
	let id = pool.snapshot().await.free[0].clone();

	let err = pool.acquire(Some(&template_x()), "user").await.unwrap_err();
	assert!(matches!(err, PoolError::Task(_)), "got {err:?}");

	pool.wait_for_background().await;
	let stats = pool.stats().await;
	assert_eq!(stats.activating, 0);
	assert_eq!((stats.free, stats.in_use), (1, 0));
	assert!(!pool.snapshot().await.free.contains(&id));
	assert_eq!(harness.plane().deleted_ids(), vec![id]);
}

#[tokio::test]
async fn acquire_and_release_round_trip_yields_new_identity() {
	let harness = Harness::new().with_shard("westus", 1);
	let pool = harness.start().await;
	let template = template_x();

	let site = pool.acquire(Some(&template), "user-1").await.unwrap();
	let stats = pool.stats().await;
	assert_eq!((stats.free, stats.in_use), (0, 1));

	assert_eq!(site.app_settings.get(keys::TEMPLATE_SETTING).unwrap(), "TemplateX");
	assert_eq!(site.owner(), Some("user-1"));
	let calls = harness.content.calls();
	assert!(calls.contains(&ContentCall::DeployPackage {
		site: site.id.clone(),
		target_dir: keys::CONTENT_ROOT.to_string(),
		package: template.package_path.clone(),
	}));
	assert!(calls.contains(&ContentCall::DeletePath {
		site: site.id.clone(),
		path: keys::PLACEHOLDER_PATH.to_string(),
	}));

	pool.release(&site.id).await.unwrap();
	pool.wait_for_background().await;

	let snapshot = pool.snapshot().await;
	assert_eq!(snapshot.free.len(), 1);
	assert!(snapshot.in_use.is_empty());
	assert_ne!(snapshot.free[0], site.id);
	assert_eq!(pool.stats().await.reclaiming, 0);
}

#[tokio::test]
async fn overlapping_maintenance_is_skipped() {
	let harness = Harness::new().with_shard("westus", 1);
	let pool = harness.start().await;
	let site = pool.acquire(None, "user").await.unwrap();

	harness.clock.advance(TTL + Duration::from_secs(1));
	let gate = harness.plane().gate_deletes();

	let slow = tokio::spawn({
		let pool = pool.clone();
		async move { pool.run_maintenance().await }
	});
	for _ in 0..200 {
		if !harness.plane().deleted_ids().is_empty() {
			break;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	assert_eq!(harness.plane().deleted_ids(), vec![site.id.clone()]);

	assert!(matches!(pool.run_maintenance().await, MaintenanceOutcome::Skipped));

	gate.notify_one();
	match slow.await.unwrap() {
		MaintenanceOutcome::Completed(report) => {
			assert_eq!(report.expired, vec![site.id.clone()]);
			assert_eq!(report.failures(), 0);
		}
		MaintenanceOutcome::Skipped => panic!("first run must not be skipped"),
	}

	assert!(matches!(
		pool.run_maintenance().await,
		MaintenanceOutcome::Completed(_)
	));
	assert_eq!(harness.plane().deleted_ids().len(), 1);
}

#[tokio::test]
async fn expiry_respects_the_ttl_boundary() {
	let harness = Harness::new().with_shard("westus", 1);
	let pool = harness.start().await;
	let site = pool.acquire(None, "user").await.unwrap();

	harness.clock.advance(TTL);
	let MaintenanceOutcome::Completed(report) = pool.run_maintenance().await else {
		panic!("maintenance skipped");
	};
	assert!(report.expired.is_empty());
	assert!(pool.lookup(&site.id).await.is_ok());

	harness.clock.advance(Duration::from_millis(1));
	let MaintenanceOutcome::Completed(report) = pool.run_maintenance().await else {
		panic!("maintenance skipped");
	};
	assert_eq!(report.expired, vec![site.id.clone()]);
	assert!(pool.lookup(&site.id).await.is_err());

	let stats = pool.stats().await;
	assert_eq!((stats.free, stats.in_use), (1, 0));
}

#[tokio::test]
async fn lease_ttl_must_be_whole_minutes() {
	let harness = Harness::new()
		.with_shard("westus", 1)
		.with_ttl(Duration::from_secs(150));
	assert!(matches!(
		harness.try_start().await,
		Err(PoolError::Configuration(_))
	));
}

#[tokio::test]
async fn lease_lasts_the_full_configured_ttl() {
	let ttl = Duration::from_secs(2 * 60);
	let harness = Harness::new().with_shard("westus", 1).with_ttl(ttl);
	let pool = harness.start().await;
	let site = pool.acquire(None, "user").await.unwrap();

	let stamped = harness.plane().site(&site.id.name).unwrap();
	assert_eq!(
		stamped.app_settings.get(keys::LIFETIME_SETTING).map(String::as_str),
		Some("2")
	);

	harness.clock.advance(ttl - Duration::from_secs(1));
	let MaintenanceOutcome::Completed(report) = pool.run_maintenance().await else {
		panic!("maintenance skipped");
	};
	assert!(report.expired.is_empty());

	harness.clock.advance(Duration::from_secs(2));
	let MaintenanceOutcome::Completed(report) = pool.run_maintenance().await else {
		panic!("maintenance skipped");
	};
	assert_eq!(report.expired, vec![site.id]);
}

#[tokio::test]
async fn failing_shard_does_not_block_startup() {
	let harness = Harness::new()
		.with_shard("westus", 2)
		.with_failing_shard("eastus");
	let pool = harness.start().await;

	let summary = pool.startup_summary();
	assert_eq!(summary.free, 2);
	assert_eq!(summary.loaded_shards, vec![mock::shard("westus").key]);
	assert_eq!(summary.failed_shards.len(), 1);
	assert_eq!(summary.failed_shards[0].0, mock::shard("eastus").key);
	assert_eq!(pool.stats().await.free, 2);
}

#[tokio::test]
async fn restart_rebuilds_leases_from_the_control_plane() {
	let harness = Harness::new().with_shard("westus", 2);
	let pool = harness.start().await;
	let site = pool.acquire(Some(&template_x()), "user").await.unwrap();
	drop(pool);

	let restarted = harness.start().await;
	let stats = restarted.stats().await;
	assert_eq!((stats.free, stats.in_use), (1, 1));

	let reloaded = restarted.lookup(&site.id).await.unwrap();
	assert_eq!(reloaded.lease_start, site.lease_start);

	harness.clock.advance(TTL + Duration::from_secs(1));
	let MaintenanceOutcome::Completed(report) = restarted.run_maintenance().await else {
		panic!("maintenance skipped");
	};
	assert_eq!(report.expired, vec![site.id]);
}

#[tokio::test]
async fn replacement_failure_shrinks_the_pool() {
	let harness = Harness::new().with_shard("westus", 1);
	let pool = harness.start().await;
	let site = pool.acquire(None, "user").await.unwrap();

	harness.plane().fail_next_creates(1);
	pool.release(&site.id).await.unwrap();
	pool.wait_for_background().await;

	let stats = pool.stats().await;
	assert_eq!((stats.free, stats.in_use), (0, 0));
	assert!(matches!(
		pool.acquire(None, "next").await,
		Err(PoolError::PoolExhausted)
	));
}
