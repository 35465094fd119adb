// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Content deployment through a site's Kudu endpoint.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Body, Client, Method, RequestBuilder};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};
use trysite_server_pool::{ClientError, ContentDeployClient, Resource};

use crate::error::CsmError;
use crate::http;
use crate::paths::{kudu_vfs, kudu_zip};

/// Deploys content with each site's own publishing credentials.
#[derive(Clone)]
pub struct KuduClient {
	http: Client,
}

impl KuduClient {
	pub fn new(timeout: Duration) -> Result<Self, CsmError> {
		Ok(Self {
			http: http::new_client_with_timeout(timeout)?,
		})
	}

	fn request(&self, method: Method, resource: &Resource, url: &str) -> RequestBuilder {
		self.http.request(method, url).basic_auth(
			&resource.publishing.user_name,
			Some(resource.publishing.password.expose()),
		)
	}

	fn scm_url(resource: &Resource) -> Result<String, CsmError> {
		resource
			.scm_url()
			.ok_or_else(|| CsmError::MissingScmHost(resource.id.name.clone()))
	}

	async fn upload(&self, resource: &Resource, target_dir: &str, package: &Path) -> Result<(), CsmError> {
		let url = kudu_zip(&Self::scm_url(resource)?, target_dir);
		let file = tokio::fs::File::open(package).await?;
		let length = file.metadata().await?.len();
		debug!(url = %url, bytes = length, "uploading package");

		let response = self
			.request(Method::PUT, resource, &url)
			.header(reqwest::header::CONTENT_LENGTH, length)
			.body(Body::wrap_stream(ReaderStream::new(file)))
			.send()
			.await
			.map_err(CsmError::from_reqwest)?;
		http::check(response).await.map(|_| ())
	}

	async fn remove(&self, resource: &Resource, path: &str) -> Result<(), CsmError> {
		let url = kudu_vfs(&Self::scm_url(resource)?, path);
		let response = self
			.request(Method::DELETE, resource, &url)
			.header(reqwest::header::IF_MATCH, "*")
			.send()
			.await
			.map_err(CsmError::from_reqwest)?;
		http::check(response).await.map(|_| ())
	}
}

#[async_trait]
impl ContentDeployClient for KuduClient {
	#[instrument(skip(self, resource), fields(resource = %resource.id))]
	async fn deploy_package(
		&self,
		resource: &Resource,
		target_dir: &str,
		package: &Path,
	) -> Result<(), ClientError> {
		Ok(self.upload(resource, target_dir, package).await?)
	}

	#[instrument(skip(self, resource), fields(resource = %resource.id))]
	async fn delete_path(&self, resource: &Resource, path: &str) -> Result<(), ClientError> {
		Ok(self.remove(resource, path).await?)
	}
}
