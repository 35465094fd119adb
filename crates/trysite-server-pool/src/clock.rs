// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of "now" for lease bookkeeping.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to. Millisecond resolution.
#[derive(Debug)]
pub struct ManualClock {
	millis: AtomicI64,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			millis: AtomicI64::new(start.timestamp_millis()),
		}
	}

	pub fn set(&self, at: DateTime<Utc>) {
		self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
	}

	pub fn advance(&self, by: Duration) {
		let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
		self.millis.fetch_add(by, Ordering::SeqCst);
	}
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::new(Utc::now())
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
			.unwrap_or(DateTime::<Utc>::MIN_UTC)
	}
}
