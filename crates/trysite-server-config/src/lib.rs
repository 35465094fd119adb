// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the trysite server.
//!
//! Configuration is read once at startup from layered sources and never
//! re-read while the pool runs:
//!
//! 1. Environment variables (`TRYSITE_SERVER_*`)
//! 2. A TOML file (`/etc/trysite/server.toml`, or one given explicitly)
//! 3. Built-in defaults

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub pool: PoolConfig,
	pub control_plane: ControlPlaneConfig,
	pub paths: PathsConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from defaults, the system TOML file and the environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with an explicit config file in place of the system one.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let pool = layer.pool.unwrap_or_default().resolve()?;
	let control_plane = layer.control_plane.unwrap_or_default().finalize();
	let paths = layer.paths.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	pool.validate()?;

	info!(
		shards = pool.shards.len(),
		lease_ttl_minutes = pool.lease_ttl_minutes,
		maintenance_interval_secs = pool.maintenance_interval_secs,
		control_plane = %control_plane.base_url,
		control_plane_token = control_plane.token.is_some(),
		templates_dir = %paths.templates_dir.display(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		pool,
		control_plane,
		paths,
		logging,
	})
}
