// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP plumbing.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::error::CsmError;

pub fn user_agent() -> String {
	format!("trysite/{}", env!("CARGO_PKG_VERSION"))
}

pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, CsmError> {
	builder().timeout(timeout).build().map_err(CsmError::Build)
}

/// Pass successful responses through, turn the rest into errors.
pub(crate) async fn check(response: Response) -> Result<Response, CsmError> {
	let status = response.status();
	debug!(status = %status, url = %response.url(), "response received");
	if status.is_success() {
		return Ok(response);
	}
	let body = response.text().await.unwrap_or_default();
	error!(status = status.as_u16(), body = %body, "request rejected");
	Err(CsmError::from_status(status, body))
}

pub(crate) async fn json<T: DeserializeOwned>(response: Response) -> Result<T, CsmError> {
	let body = check(response).await?.text().await.map_err(CsmError::from_reqwest)?;
	serde_json::from_str(&body).map_err(|e| CsmError::InvalidResponse(format!("JSON parse error: {e}")))
}
