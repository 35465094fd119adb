// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filesystem paths configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfigLayer {
	pub templates_dir: Option<PathBuf>,
	pub icons_dir: Option<PathBuf>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.templates_dir.is_some() {
			self.templates_dir = other.templates_dir;
		}
		if other.icons_dir.is_some() {
			self.icons_dir = other.icons_dir;
		}
	}

	pub fn finalize(self) -> PathsConfig {
		PathsConfig {
			templates_dir: self
				.templates_dir
				.unwrap_or_else(|| PathBuf::from("/var/lib/trysite/templates")),
			icons_dir: self
				.icons_dir
				.unwrap_or_else(|| PathBuf::from("/var/lib/trysite/icons")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
	/// Laid out as `<templates_dir>/<language>/<package>`.
	pub templates_dir: PathBuf,
	pub icons_dir: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		PathsConfigLayer::default().finalize()
	}
}
