// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file, environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};
use trysite_common_config::load_secret_env;

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	ControlPlaneConfigLayer, LogFormat, LoggingConfigLayer, PathsConfigLayer, PoolConfigLayer,
	ShardConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
	required: bool,
}

impl TomlSource {
	/// A file the operator pointed at explicitly; missing is an error.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
		}
	}

	/// The system-wide file; skipped when absent.
	pub fn system() -> Self {
		Self {
			path: PathBuf::from("/etc/trysite/server.toml"),
			required: false,
		}
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.required && !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `TRYSITE_SERVER_<SECTION>_<FIELD>`. Shards come from the
/// comma-separated `TRYSITE_SERVER_POOL_SUBSCRIPTIONS` and
/// `TRYSITE_SERVER_POOL_REGIONS`; every subscription is paired with every
/// region.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			pool: Some(load_pool_from_env()?),
			control_plane: Some(load_control_plane_from_env()?),
			paths: Some(load_paths_from_env()),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(str::to_string)
			.collect()
	})
}

/// Cross product of subscriptions and regions.
pub(crate) fn shards_from_lists(
	subscriptions: &[String],
	regions: &[String],
	resource_group: Option<&str>,
) -> Vec<ShardConfigLayer> {
	subscriptions
		.iter()
		.flat_map(|sub| {
			regions.iter().map(move |region| ShardConfigLayer {
				subscription_id: Some(sub.clone()),
				region: Some(region.clone()),
				resource_group: resource_group.map(str::to_string),
			})
		})
		.collect()
}

fn load_pool_from_env() -> Result<PoolConfigLayer, ConfigError> {
	let shards = match (
		env_list("TRYSITE_SERVER_POOL_SUBSCRIPTIONS"),
		env_list("TRYSITE_SERVER_POOL_REGIONS"),
	) {
		(Some(subs), Some(regions)) => Some(shards_from_lists(
			&subs,
			&regions,
			env_var("TRYSITE_SERVER_POOL_RESOURCE_GROUP").as_deref(),
		)),
		(None, None) => None,
		_ => {
			return Err(ConfigError::Validation(
				"TRYSITE_SERVER_POOL_SUBSCRIPTIONS and TRYSITE_SERVER_POOL_REGIONS must be set together"
					.to_string(),
			))
		}
	};

	Ok(PoolConfigLayer {
		shards,
		target_size_per_shard: env_parse("TRYSITE_SERVER_POOL_TARGET_SIZE_PER_SHARD")?,
		lease_ttl_minutes: env_parse("TRYSITE_SERVER_POOL_LEASE_TTL_MINUTES")?,
		maintenance_interval_secs: env_parse("TRYSITE_SERVER_POOL_MAINTENANCE_INTERVAL_SECS")?,
		deploy_timeout_secs: env_parse("TRYSITE_SERVER_POOL_DEPLOY_TIMEOUT_SECS")?,
		deploy_poll_interval_ms: env_parse("TRYSITE_SERVER_POOL_DEPLOY_POLL_INTERVAL_MS")?,
		replacement_max_retries: env_parse("TRYSITE_SERVER_POOL_REPLACEMENT_MAX_RETRIES")?,
		replacement_backoff_base_ms: env_parse("TRYSITE_SERVER_POOL_REPLACEMENT_BACKOFF_BASE_MS")?,
		site_name_prefix: env_var("TRYSITE_SERVER_POOL_SITE_NAME_PREFIX"),
	})
}

fn load_control_plane_from_env() -> Result<ControlPlaneConfigLayer, ConfigError> {
	let token = load_secret_env("TRYSITE_SERVER_CONTROL_PLANE_TOKEN")
		.map_err(|e| ConfigError::Secret(e.to_string()))?;

	Ok(ControlPlaneConfigLayer {
		base_url: env_var("TRYSITE_SERVER_CONTROL_PLANE_BASE_URL"),
		api_version: env_var("TRYSITE_SERVER_CONTROL_PLANE_API_VERSION"),
		token,
		request_timeout_secs: env_parse("TRYSITE_SERVER_CONTROL_PLANE_REQUEST_TIMEOUT_SECS")?,
	})
}

fn load_paths_from_env() -> PathsConfigLayer {
	PathsConfigLayer {
		templates_dir: env_var("TRYSITE_SERVER_TEMPLATES_DIR").map(Into::into),
		icons_dir: env_var("TRYSITE_SERVER_ICONS_DIR").map(Into::into),
	}
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("TRYSITE_SERVER_LOG_LEVEL"),
		format: env_parse::<LogFormat>("TRYSITE_SERVER_LOG_FORMAT")?,
	})
}
