// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! trysite server binary: runs the disposable site pool.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use trysite_server::jobs::PoolMaintenanceJob;
use trysite_server::{settings, telemetry, version};
use trysite_server_csm::{HttpShardConnector, KuduClient};
use trysite_server_jobs::{JobScheduler, RunHistory};
use trysite_server_pool::{Collaborators, DirectoryCatalog, PoolContext, TemplateCatalog};

/// trysite server - hands out disposable sites and reclaims them.
#[derive(Parser, Debug)]
#[command(name = "trysite-server", about = "Disposable site pool server", version)]
struct Args {
	/// Configuration file used instead of /etc/trysite/server.toml
	#[arg(long, short, env = "TRYSITE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
	/// Delete and replace every free site, then exit
	Reset,
	/// List the templates found in the templates directory
	Templates,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => trysite_server_config::load_config_with_file(path)?,
		None => trysite_server_config::load_config()?,
	};

	telemetry::init_tracing(&config.logging);

	let catalog = DirectoryCatalog::load(&config.paths.templates_dir, &config.paths.icons_dir);
	if let Some(Command::Templates) = args.command {
		for template in catalog.templates() {
			println!(
				"{:<12} {:<32} {}",
				template.language,
				template.name,
				template.package_path.display()
			);
		}
		return Ok(());
	}

	tracing::info!(
		shards = config.pool.shards.len(),
		templates = catalog.templates().len(),
		control_plane = %config.control_plane.base_url,
		"starting trysite-server"
	);

	let csm = settings::csm_settings(&config.control_plane);
	let content = KuduClient::new(csm.request_timeout)?;
	let connector = HttpShardConnector::new(csm)?;
	let context = PoolContext::new(
		settings::pool_settings(&config.pool),
		Collaborators::new(Arc::new(connector), Arc::new(content)),
	);
	let pool = context.get().await?.clone();

	let summary = pool.startup_summary();
	for (shard, error) in &summary.failed_shards {
		tracing::warn!(shard = %shard, error = %error, "shard unavailable at startup");
	}

	if let Some(Command::Reset) = args.command {
		let report = pool.reset_all().await;
		for error in report.errors() {
			tracing::error!(error = %error, "reset error");
		}
		pool.wait_for_background().await;
		println!(
			"reset {} sites: {} deleted, {} replaced",
			report.outcomes.len(),
			report.deleted(),
			report.replaced()
		);
		return Ok(());
	}

	let mut scheduler = JobScheduler::new(Arc::new(RunHistory::new()));
	scheduler.register_periodic(
		Arc::new(PoolMaintenanceJob::new(pool.clone())),
		config.pool.maintenance_interval(),
	);
	let scheduler = Arc::new(scheduler);
	scheduler.start().await;

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");

	tracing::info!("Shutting down job scheduler...");
	scheduler.shutdown().await;

	tracing::info!("Waiting for background reclaims...");
	pool.wait_for_background().await;

	tracing::info!("Server shutdown complete");
	Ok(())
}
