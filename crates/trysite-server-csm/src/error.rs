// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use reqwest::StatusCode;
use trysite_server_pool::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum CsmError {
	#[error("network error: {0}")]
	Network(#[source] reqwest::Error),

	#[error("request timed out")]
	Timeout,

	#[error("unauthorized: {0}")]
	Unauthorized(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("api error {status}: {message}")]
	Api { status: u16, message: String },

	#[error("invalid response: {0}")]
	InvalidResponse(String),

	#[error("site {0} has no source-control host")]
	MissingScmHost(String),

	#[error("reading package failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("building http client failed: {0}")]
	Build(#[source] reqwest::Error),
}

impl CsmError {
	pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			CsmError::Timeout
		} else {
			CsmError::Network(e)
		}
	}

	/// Classify a non-success response.
	pub(crate) fn from_status(status: StatusCode, body: String) -> Self {
		match status {
			StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CsmError::Unauthorized(body),
			StatusCode::NOT_FOUND => CsmError::NotFound(body),
			_ => CsmError::Api {
				status: status.as_u16(),
				message: body,
			},
		}
	}
}

impl From<CsmError> for ClientError {
	fn from(e: CsmError) -> Self {
		match e {
			CsmError::NotFound(what) => ClientError::NotFound(what),
			CsmError::Api { status, message } => ClientError::Status { status, message },
			CsmError::Unauthorized(message) => ClientError::Status {
				status: 401,
				message,
			},
			CsmError::InvalidResponse(message) => ClientError::Decode(message),
			other => ClientError::Request(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_classification() {
		assert!(matches!(
			CsmError::from_status(StatusCode::FORBIDDEN, String::new()),
			CsmError::Unauthorized(_)
		));
		assert!(matches!(
			CsmError::from_status(StatusCode::NOT_FOUND, "gone".to_string()),
			CsmError::NotFound(_)
		));
		assert!(matches!(
			CsmError::from_status(StatusCode::CONFLICT, String::new()),
			CsmError::Api { status: 409, .. }
		));
	}

	#[test]
	fn not_found_survives_conversion() {
		let client: ClientError = CsmError::NotFound("site".to_string()).into();
		assert!(matches!(client, ClientError::NotFound(_)));

		let client: ClientError = CsmError::InvalidResponse("bad json".to_string()).into();
		assert!(matches!(client, ClientError::Decode(_)));

		let client: ClientError = CsmError::Timeout.into();
		assert!(matches!(client, ClientError::Request(_)));
	}
}
