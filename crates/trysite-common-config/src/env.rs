// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loading secrets from the environment.
//!
//! `load_secret_env("X")` reads the file named by `X_FILE` when set (the form
//! used for mounted secrets), otherwise the value of `X` itself.

use std::path::PathBuf;
use std::{env, fs};

use thiserror::Error;

use crate::secret::SecretString;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

#[derive(Debug, Error)]
pub enum RequiredSecretError {
	#[error("required secret not found: set either {var} or {file_var}")]
	Missing { var: String, file_var: String },

	#[error(transparent)]
	Load(#[from] SecretEnvError),
}

/// Load an optional secret. `{var}_FILE` wins over `{var}`; one trailing
/// newline is stripped from file contents.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path) = env::var(&file_var) {
		if path.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}
		let path = PathBuf::from(path);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;
		let value = content.strip_suffix('\n').unwrap_or(&content);
		return Ok(Some(SecretString::new(value.to_string())));
	}

	Ok(env::var(var).ok().map(SecretString::new))
}

pub fn require_secret_env(var: &str) -> Result<SecretString, RequiredSecretError> {
	load_secret_env(var)?.ok_or_else(|| RequiredSecretError::Missing {
		var: var.to_string(),
		file_var: format!("{var}_FILE"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	// Each test uses its own variable name; the process environment is shared
	// between test threads.

	#[test]
	fn reads_direct_value() {
		env::set_var("TRYSITE_TEST_DIRECT_TOKEN", "direct-value");
		let secret = load_secret_env("TRYSITE_TEST_DIRECT_TOKEN").unwrap().unwrap();
		assert_eq!(secret.expose(), "direct-value");
		env::remove_var("TRYSITE_TEST_DIRECT_TOKEN");
	}

	#[test]
	fn file_variant_takes_precedence_and_strips_newline() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();

		env::set_var("TRYSITE_TEST_FILE_TOKEN", "from-env");
		env::set_var("TRYSITE_TEST_FILE_TOKEN_FILE", file.path());
		let secret = load_secret_env("TRYSITE_TEST_FILE_TOKEN").unwrap().unwrap();
		assert_eq!(secret.expose(), "from-file");

		env::remove_var("TRYSITE_TEST_FILE_TOKEN");
		env::remove_var("TRYSITE_TEST_FILE_TOKEN_FILE");
	}

	#[test]
	fn empty_file_path_is_an_error() {
		env::set_var("TRYSITE_TEST_EMPTY_TOKEN_FILE", "");
		let result = load_secret_env("TRYSITE_TEST_EMPTY_TOKEN");
		assert!(matches!(result, Err(SecretEnvError::EmptyPath { .. })));
		env::remove_var("TRYSITE_TEST_EMPTY_TOKEN_FILE");
	}

	#[test]
	fn missing_file_is_io_error() {
		env::set_var("TRYSITE_TEST_MISSING_TOKEN_FILE", "/nonexistent/trysite/token");
		let result = load_secret_env("TRYSITE_TEST_MISSING_TOKEN");
		assert!(matches!(result, Err(SecretEnvError::Io { .. })));
		env::remove_var("TRYSITE_TEST_MISSING_TOKEN_FILE");
	}

	#[test]
	fn require_reports_both_names() {
		let err = require_secret_env("TRYSITE_TEST_ABSENT_TOKEN").unwrap_err();
		let message = err.to_string();
		assert!(message.contains("TRYSITE_TEST_ABSENT_TOKEN"));
		assert!(message.contains("TRYSITE_TEST_ABSENT_TOKEN_FILE"));
	}
}
