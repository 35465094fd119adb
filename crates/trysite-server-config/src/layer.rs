// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::sections::{ControlPlaneConfigLayer, LoggingConfigLayer, PathsConfigLayer, PoolConfigLayer};

/// One partially specified view of the server configuration, as produced by a
/// single [`ConfigSource`](crate::ConfigSource).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigLayer {
	pub pool: Option<PoolConfigLayer>,
	pub control_plane: Option<ControlPlaneConfigLayer>,
	pub paths: Option<PathsConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.pool, other.pool, PoolConfigLayer::merge);
		merge_section(
			&mut self.control_plane,
			other.control_plane,
			ControlPlaneConfigLayer::merge,
		);
		merge_section(&mut self.paths, other.paths, PathsConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}
