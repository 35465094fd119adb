// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turning a free site into a leased one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::client::{ContentDeployClient, ControlPlaneClient};
use crate::clock::Clock;
use crate::error::{ActivationError, ClientError};
use crate::types::{keys, DeployStatus, Resource, ResourceId, SiteConfigPatch, Template};

/// Owner recorded when the caller supplies none, so the lease marker is
/// always present.
pub const ANONYMOUS_OWNER: &str = "anonymous";

const APP_KIND: &str = "Web";

pub struct LeaseActivator {
	content: Arc<dyn ContentDeployClient>,
	clock: Arc<dyn Clock>,
	lease_ttl: Duration,
	deploy_timeout: Duration,
	poll_interval: Duration,
}

impl LeaseActivator {
	pub fn new(
		content: Arc<dyn ContentDeployClient>,
		clock: Arc<dyn Clock>,
		lease_ttl: Duration,
		deploy_timeout: Duration,
		poll_interval: Duration,
	) -> Self {
		Self {
			content,
			clock,
			lease_ttl,
			deploy_timeout,
			poll_interval,
		}
	}

	/// Deploy `template` (if any) and stamp the lease onto `resource`.
	///
	/// Returns the lease start. On error the site's content and configuration
	/// are in an unknown state and it must not be handed out again.
	#[instrument(
		skip_all,
		fields(resource = %resource.id, template = template.map(|t| t.name.as_str()))
	)]
	pub async fn activate(
		&self,
		control: &dyn ControlPlaneClient,
		resource: &mut Resource,
		template: Option<&Template>,
		owner: &str,
	) -> Result<DateTime<Utc>, ActivationError> {
		if let Some(template) = template {
			self.deploy(control, resource, template).await?;
		}

		let started = self.clock.now();
		self.stamp(control, resource, template, owner, started).await?;
		debug!("activation complete");
		Ok(started)
	}

	async fn deploy(
		&self,
		control: &dyn ControlPlaneClient,
		resource: &Resource,
		template: &Template,
	) -> Result<(), ActivationError> {
		let upload = async {
			self.content
				.deploy_package(resource, keys::CONTENT_ROOT, &template.package_path)
				.await
				.map_err(ActivationError::ContentDeploy)
		};
		let placeholder = async {
			match self.content.delete_path(resource, keys::PLACEHOLDER_PATH).await {
				Ok(()) | Err(ClientError::NotFound(_)) => Ok(()),
				Err(e) => Err(ActivationError::PlaceholderRemoval(e)),
			}
		};
		tokio::try_join!(upload, placeholder)?;

		match tokio::time::timeout(self.deploy_timeout, self.poll_deployment(control, &resource.id)).await {
			Ok(result) => result,
			Err(_) => Err(ActivationError::DeploymentStuck {
				waited: self.deploy_timeout,
			}),
		}
	}

	async fn poll_deployment(
		&self,
		control: &dyn ControlPlaneClient,
		id: &ResourceId,
	) -> Result<(), ActivationError> {
		loop {
			let status = control
				.deployment_status(id)
				.await
				.map_err(ActivationError::DeploymentStatus)?;
			match status {
				Some(DeployStatus::Success) => return Ok(()),
				Some(DeployStatus::Failed) => return Err(ActivationError::DeploymentFailed),
				pending => {
					debug!(status = ?pending, "deployment not finished");
					tokio::time::sleep(self.poll_interval).await;
				}
			}
		}
	}

	async fn stamp(
		&self,
		control: &dyn ControlPlaneClient,
		resource: &mut Resource,
		template: Option<&Template>,
		owner: &str,
		started: DateTime<Utc>,
	) -> Result<(), ActivationError> {
		let owner = match owner.trim() {
			"" => ANONYMOUS_OWNER,
			owner => owner,
		};
		let ttl = resource.ttl_override().unwrap_or(self.lease_ttl);

		let mut settings = resource.app_settings.clone();
		settings.insert(keys::OWNER_SETTING.to_string(), owner.to_string());
		settings.insert(keys::LEASE_START_SETTING.to_string(), started.to_rfc3339());
		settings.insert(
			keys::LIFETIME_SETTING.to_string(),
			(ttl.as_secs() / 60).max(1).to_string(),
		);
		settings.insert(keys::TRY_MODE_SETTING.to_string(), "1".to_string());
		if let Some(template) = template {
			settings.insert(keys::TEMPLATE_SETTING.to_string(), template.name.clone());
		}

		let mut metadata = resource.metadata.clone();
		metadata.insert(keys::OWNER_METADATA.to_string(), owner.to_string());
		metadata.insert(keys::APP_KIND_METADATA.to_string(), APP_KIND.to_string());

		let patch = SiteConfigPatch {
			http_logging_enabled: Some(true),
			scm_type: None,
		};

		control
			.update_app_settings(&resource.id, &settings)
			.await
			.map_err(ActivationError::ConfigurationStamp)?;
		control
			.update_site_config(&resource.id, &patch)
			.await
			.map_err(ActivationError::ConfigurationStamp)?;
		// Written last: the owner marker is what makes the site count as leased.
		control
			.update_metadata(&resource.id, &metadata)
			.await
			.map_err(ActivationError::ConfigurationStamp)?;

		resource.app_settings = settings;
		resource.metadata = metadata;
		Ok(())
	}
}
