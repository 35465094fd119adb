// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared configuration primitives for trysite.
//!
//! - [`Secret<T>`]: holds credential material (control-plane tokens, publishing
//!   passwords) so it cannot end up in logs or config dumps by accident
//! - [`load_secret_env`]: reads a secret from `VAR` or from the file named by
//!   `VAR_FILE`

pub mod env;
pub mod secret;

pub use env::{load_secret_env, require_secret_env, RequiredSecretError, SecretEnvError};
pub use secret::{Secret, SecretString, REDACTED};
