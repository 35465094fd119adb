// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control-plane client for one shard.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use trysite_common_config::SecretString;
use trysite_server_pool::{
	ClientError, ControlPlaneClient, DeployStatus, PublishingCredentials, Resource, ResourceId,
	Shard, SiteConfigPatch,
};

use crate::error::CsmError;
use crate::http;
use crate::models::{
	self, ArrayWrapper, CreateSite, CsmSite, Deployment, NameValues, Wrapper,
};
use crate::paths::ArmPaths;

#[derive(Clone)]
pub struct CsmClient {
	http: Client,
	paths: ArmPaths,
	token: Option<SecretString>,
	shard: Shard,
}

impl CsmClient {
	pub fn new(http: Client, paths: ArmPaths, token: Option<SecretString>, shard: Shard) -> Self {
		Self {
			http,
			paths,
			token,
			shard,
		}
	}

	pub fn shard(&self) -> &Shard {
		&self.shard
	}

	fn request(&self, method: Method, url: &str) -> RequestBuilder {
		let builder = self.http.request(method, url);
		match &self.token {
			Some(token) => builder.bearer_auth(token.expose()),
			None => builder,
		}
	}

	async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, CsmError> {
		let response = builder.send().await.map_err(CsmError::from_reqwest)?;
		http::check(response).await
	}

	async fn send_json<T: serde::de::DeserializeOwned>(
		&self,
		builder: RequestBuilder,
	) -> Result<T, CsmError> {
		let response = builder.send().await.map_err(CsmError::from_reqwest)?;
		http::json(response).await
	}

	async fn put<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<(), CsmError> {
		self.send(self.request(Method::PUT, url).json(body))
			.await
			.map(|_| ())
	}

	async fn read_config(&self, id: &ResourceId, name: &str) -> Result<BTreeMap<String, String>, CsmError> {
		let url = self.paths.config_list(id, name);
		let values: NameValues = self.send_json(self.request(Method::POST, &url)).await?;
		Ok(values.properties)
	}

	async fn read_credentials(&self, id: &ResourceId) -> Result<PublishingCredentials, CsmError> {
		let url = self.paths.config_list(id, "publishingcredentials");
		let creds: Wrapper<models::PublishingCredentials> =
			self.send_json(self.request(Method::POST, &url)).await?;
		Ok(PublishingCredentials {
			user_name: creds.properties.publishing_user_name,
			password: SecretString::new(creds.properties.publishing_password),
		})
	}

	/// Fill in settings, metadata and publishing credentials.
	async fn populate(&self, site: CsmSite) -> Result<Resource, CsmError> {
		let mut resource = site.into_resource(&self.shard);
		let (app_settings, metadata, publishing) = tokio::try_join!(
			self.read_config(&resource.id, "appsettings"),
			self.read_config(&resource.id, "metadata"),
			self.read_credentials(&resource.id),
		)?;
		resource.app_settings = app_settings;
		resource.metadata = metadata;
		resource.publishing = publishing;
		Ok(resource)
	}
}

#[async_trait]
impl ControlPlaneClient for CsmClient {
	#[instrument(skip(self), fields(shard = %self.shard.key))]
	async fn list_resources(&self) -> Result<Vec<Resource>, ClientError> {
		let url = self.paths.sites(&self.shard);
		let sites: ArrayWrapper<CsmSite> = self.send_json(self.request(Method::GET, &url)).await?;
		let region = &self.shard.key.region;
		let sites: Vec<CsmSite> = sites.value.into_iter().filter(|s| s.in_region(region)).collect();
		debug!(count = sites.len(), "listed sites");

		let mut resources = Vec::with_capacity(sites.len());
		for result in join_all(sites.into_iter().map(|s| self.populate(s))).await {
			match result {
				Ok(resource) => resources.push(resource),
				// A site deleted between list and read is simply gone.
				Err(CsmError::NotFound(what)) => warn!(site = %what, "site vanished while loading"),
				Err(e) => return Err(e.into()),
			}
		}
		Ok(resources)
	}

	#[instrument(skip(self), fields(shard = %self.shard.key))]
	async fn create_resource(&self, name: &str) -> Result<Resource, ClientError> {
		let id = ResourceId::new(&self.shard, name);
		let body = CreateSite {
			location: &self.shard.key.region,
			properties: serde_json::Map::new(),
		};
		let site: CsmSite = self
			.send_json(self.request(Method::PUT, &self.paths.site(&id)).json(&body))
			.await?;
		Ok(self.populate(site).await?)
	}

	#[instrument(skip(self), fields(resource = %id))]
	async fn delete_resource(&self, id: &ResourceId) -> Result<(), ClientError> {
		self.send(self.request(Method::DELETE, &self.paths.site(id)))
			.await?;
		Ok(())
	}

	async fn update_app_settings(
		&self,
		id: &ResourceId,
		settings: &BTreeMap<String, String>,
	) -> Result<(), ClientError> {
		let body = Wrapper {
			properties: settings,
		};
		Ok(self.put(&self.paths.config(id, "appsettings"), &body).await?)
	}

	async fn update_metadata(
		&self,
		id: &ResourceId,
		metadata: &BTreeMap<String, String>,
	) -> Result<(), ClientError> {
		let body = Wrapper {
			properties: metadata,
		};
		Ok(self.put(&self.paths.config(id, "metadata"), &body).await?)
	}

	async fn update_site_config(
		&self,
		id: &ResourceId,
		patch: &SiteConfigPatch,
	) -> Result<(), ClientError> {
		let body = Wrapper { properties: patch };
		Ok(self.put(&self.paths.config(id, "web"), &body).await?)
	}

	async fn deployment_status(&self, id: &ResourceId) -> Result<Option<DeployStatus>, ClientError> {
		let url = self.paths.deployments(id);
		let list: ArrayWrapper<Wrapper<Deployment>> =
			self.send_json(self.request(Method::GET, &url)).await?;
		match list.value.first() {
			Some(latest) => Ok(Some(models::deploy_status(latest.properties.status)?)),
			None => Ok(None),
		}
	}
}
