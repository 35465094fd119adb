// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pool of pre-provisioned disposable sites.
//!
//! Sites are loaded from every shard at startup, leased to callers with a
//! template deployed onto them, and deleted and replaced once their lease
//! runs out or is released. All lease state lives on the sites themselves.

pub mod activator;
pub mod catalog;
pub mod client;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod inventory;
pub mod manager;
pub mod mock;
pub mod naming;
pub mod reaper;
pub mod reclaim;
pub mod types;

pub use activator::LeaseActivator;
pub use catalog::{DirectoryCatalog, TemplateCatalog};
pub use client::{ContentDeployClient, ControlPlaneClient, ShardClients, ShardConnector};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Collaborators, PoolSettings, ReplacementPolicy};
pub use context::PoolContext;
pub use error::{ActivationError, ClientError, PoolError, Result};
pub use inventory::{InventoryReport, LoadedShard, ShardInventory, ShardLoadFailure};
pub use manager::{
	MaintenanceOutcome, MaintenanceReport, PoolManager, PoolSnapshot, PoolStats, ResetReport,
	StartupSummary,
};
pub use naming::SiteNameGenerator;
pub use reaper::ExpiryReaper;
pub use reclaim::{ReclaimOutcome, Reclaimer};
pub use types::{
	keys, DeployStatus, Lease, PublishingCredentials, Resource, ResourceId, ResourceState, Shard,
	ShardKey, SiteConfigPatch, Template,
};
