// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tokio::sync::OnceCell;

use crate::config::{Collaborators, PoolSettings};
use crate::error::PoolError;
use crate::manager::PoolManager;

/// Process-wide owner of the pool.
///
/// The first caller of [`PoolContext::get`] runs initialization; concurrent
/// callers wait for that same run instead of starting their own. A failed
/// initialization is not cached and the next call tries again.
pub struct PoolContext {
	cell: OnceCell<PoolManager>,
	settings: PoolSettings,
	collaborators: Collaborators,
}

impl PoolContext {
	pub fn new(settings: PoolSettings, collaborators: Collaborators) -> Self {
		Self {
			cell: OnceCell::new(),
			settings,
			collaborators,
		}
	}

	pub async fn get(&self) -> Result<&PoolManager, PoolError> {
		self.cell
			.get_or_try_init(|| {
				PoolManager::initialize(self.settings.clone(), self.collaborators.clone())
			})
			.await
	}

	/// The pool, if already initialized.
	pub fn try_get(&self) -> Option<&PoolManager> {
		self.cell.get()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::{self, MockConnector, MockContentDeploy, MockControlPlane};
	use futures::future::join_all;
	use std::sync::Arc;

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_first_access_initializes_once() {
		let shard = mock::shard("westus");
		let plane = Arc::new(MockControlPlane::new(shard.clone()).with_free_sites("s", 2));
		let connector = Arc::new(MockConnector::new().with_plane(Arc::clone(&plane)));
		let collaborators = Collaborators::new(connector.clone(), Arc::new(MockContentDeploy::new()));
		let context = Arc::new(PoolContext::new(
			PoolSettings {
				shards: vec![shard],
				..Default::default()
			},
			collaborators,
		));
		assert!(context.try_get().is_none());

		let tasks = (0..16).map(|_| {
			let context = Arc::clone(&context);
			tokio::spawn(async move { context.get().await.map(|m| m.shard_count()) })
		});
		for result in join_all(tasks).await {
			assert_eq!(result.unwrap().unwrap(), 1);
		}

		assert_eq!(connector.connect_count(), 1);
		let lists = plane
			.calls()
			.into_iter()
			.filter(|c| *c == mock::ControlPlaneCall::ListResources)
			.count();
		assert_eq!(lists, 1);
		assert_eq!(context.try_get().unwrap().stats().await.free, 2);
	}

	#[tokio::test]
	async fn failed_initialization_is_retried() {
		let context = PoolContext::new(
			PoolSettings::default(),
			Collaborators::new(
				Arc::new(MockConnector::new()),
				Arc::new(MockContentDeploy::new()),
			),
		);
		assert!(context.get().await.is_err());
		assert!(context.get().await.is_err());
		assert!(context.try_get().is_none());
	}
}
