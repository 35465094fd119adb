// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trysite_server_config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match config.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json().with_current_span(true))
			.init(),
		LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}
