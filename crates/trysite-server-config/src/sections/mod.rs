// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod control_plane;
mod logging;
mod paths;
mod pool;

pub use control_plane::{ControlPlaneConfig, ControlPlaneConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use paths::{PathsConfig, PathsConfigLayer};
pub use pool::{PoolConfig, PoolConfigLayer, ShardConfig, ShardConfigLayer};
