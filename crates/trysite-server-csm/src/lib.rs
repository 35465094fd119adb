// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP implementations of the pool's collaborators: a control-plane client
//! speaking the resource-manager REST layout, and a content-deploy client for
//! the per-site Kudu endpoint.

pub mod client;
pub mod connector;
pub mod error;
pub mod http;
pub mod kudu;
pub mod models;
pub mod paths;

pub use client::CsmClient;
pub use connector::{CsmSettings, HttpShardConnector};
pub use error::CsmError;
pub use kudu::KuduClient;
pub use paths::ArmPaths;
