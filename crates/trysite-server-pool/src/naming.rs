// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use uuid::Uuid;

const SUFFIX_LEN: usize = 12;

/// Generates fresh site names. Names are never reused, so every replacement
/// is a new identity.
#[derive(Debug, Clone)]
pub struct SiteNameGenerator {
	prefix: String,
}

impl SiteNameGenerator {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	pub fn next_name(&self) -> String {
		let id = Uuid::new_v4().simple().to_string();
		format!("{}-{}", self.prefix, &id[..SUFFIX_LEN])
	}
}
