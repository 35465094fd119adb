// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Free and in-use sets stay disjoint under any mix of operations.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use trysite_server_pool::mock::{self, MockConnector, MockContentDeploy, MockControlPlane};
use trysite_server_pool::{
	Collaborators, ManualClock, PoolManager, PoolSettings, ReplacementPolicy, ResourceId,
};

const TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
enum Op {
	Acquire { fail: bool },
	Release(usize),
	Advance(u64),
	Maintain,
	Reset,
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		4 => any::<bool>().prop_map(|fail| Op::Acquire { fail }),
		3 => (0usize..8).prop_map(Op::Release),
		2 => (0u64..900).prop_map(Op::Advance),
		2 => Just(Op::Maintain),
		1 => Just(Op::Reset),
	]
}

async fn run(ops: Vec<Op>, initial: usize) -> Result<(), TestCaseError> {
	let shard = mock::shard("westus");
	let plane = Arc::new(MockControlPlane::new(shard.clone()).with_free_sites("s", initial));
	let content = Arc::new(MockContentDeploy::new());
	let clock = Arc::new(ManualClock::default());
	let collaborators = Collaborators::new(
		Arc::new(MockConnector::new().with_plane(plane)),
		content.clone(),
	)
	.with_clock(clock.clone());
	let settings = PoolSettings {
		shards: vec![shard],
		lease_ttl: TTL,
		replacement: ReplacementPolicy::none(),
		..Default::default()
	};
	let pool = PoolManager::initialize(settings, collaborators)
		.await
		.map_err(|e| TestCaseError::fail(e.to_string()))?;

	let mut leased: Vec<ResourceId> = Vec::new();
	for op in ops {
		match op {
			Op::Acquire { fail } => {
				content.set_fail_deletes(fail);
				let template = fail.then(|| trysite_server_pool::Template {
					name: "t".to_string(),
					language: "Node".to_string(),
					package_path: "/t.zip".into(),
					icon_class: None,
				});
				if let Ok(site) = pool.acquire(template.as_ref(), "u").await {
					leased.push(site.id);
				}
			}
			Op::Release(i) if !leased.is_empty() => {
				let id = leased.remove(i % leased.len());
				let _ = pool.release(&id).await;
			}
			Op::Release(_) => {}
			Op::Advance(secs) => clock.advance(Duration::from_secs(secs)),
			Op::Maintain => {
				pool.run_maintenance().await;
			}
			Op::Reset => {
				pool.reset_all().await;
			}
		}
		pool.wait_for_background().await;

		let snapshot = pool.snapshot().await;
		let free: HashSet<_> = snapshot.free.iter().collect();
		let in_use: HashSet<_> = snapshot.in_use.iter().collect();
		prop_assert_eq!(free.len(), snapshot.free.len(), "duplicate in free set");
		prop_assert!(free.is_disjoint(&in_use), "site in both sets");
		prop_assert_eq!(free.len() + in_use.len(), initial, "capacity drifted");
	}
	Ok(())
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn free_and_in_use_stay_disjoint(
		ops in proptest::collection::vec(op(), 1..40),
		initial in 0usize..5,
	) {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.unwrap();
		runtime.block_on(run(ops, initial))?;
	}
}
