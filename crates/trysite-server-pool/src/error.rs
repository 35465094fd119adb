// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pool error types.

use std::time::Duration;

use crate::types::{ResourceId, ShardKey};

pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors returned by the control-plane and content-deploy collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	#[error("resource not found: {0}")]
	NotFound(String),

	#[error("request failed: {0}")]
	Request(String),

	#[error("unexpected status {status}: {message}")]
	Status { status: u16, message: String },

	#[error("invalid response: {0}")]
	Decode(String),
}

/// Why activating a site failed. The site is discarded in every case.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
	#[error("content upload failed: {0}")]
	ContentDeploy(#[source] ClientError),

	#[error("placeholder removal failed: {0}")]
	PlaceholderRemoval(#[source] ClientError),

	#[error("reading deployment status failed: {0}")]
	DeploymentStatus(#[source] ClientError),

	#[error("deployment finished in failed state")]
	DeploymentFailed,

	/// The deployment never reached a terminal state within the poll bound.
	#[error("deployment stuck: no terminal status after {waited:?}")]
	DeploymentStuck { waited: Duration },

	#[error("stamping lease configuration failed: {0}")]
	ConfigurationStamp(#[source] ClientError),

	#[error("no control-plane client for shard {0}")]
	NoShardClient(ShardKey),
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
	/// No free site is available right now; retry later.
	#[error("no free sites are available, try again later")]
	PoolExhausted,

	#[error("activation of {id} failed: {source}")]
	ActivationFailed {
		id: ResourceId,
		#[source]
		source: ActivationError,
	},

	#[error("site not found: {id}")]
	NotFound { id: ResourceId },

	#[error("loading shard {shard} failed: {source}")]
	ShardLoadFailed {
		shard: ShardKey,
		#[source]
		source: ClientError,
	},

	#[error("deleting {id} failed: {source}")]
	DeleteFailed {
		id: ResourceId,
		#[source]
		source: ClientError,
	},

	/// Provisioning a replacement failed after all retries; the pool is one
	/// site smaller until corrected externally.
	#[error("replacement in shard {shard} failed after {attempts} attempts: {source}")]
	ReplacementFailed {
		shard: ShardKey,
		attempts: u32,
		#[source]
		source: ClientError,
	},

	#[error("no control-plane client for shard {0}")]
	UnknownShard(ShardKey),

	#[error("invalid pool configuration: {0}")]
	Configuration(String),

	#[error("background task failed: {0}")]
	Task(String),
}

impl PoolError {
	/// Whether a caller of `acquire` can act on this error.
	pub fn is_exhausted(&self) -> bool {
		matches!(self, PoolError::PoolExhausted)
	}
}
