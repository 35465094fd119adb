// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

/// Errors raised while loading or validating server configuration.
///
/// All of these are fatal at startup: the pool never starts serving on a
/// configuration it could not fully resolve.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("configuration invalid: {0}")]
	Validation(String),

	#[error("secret error: {0}")]
	Secret(String),
}
