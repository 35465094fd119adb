// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{Resource, ResourceId};

/// Selects leases that have run past their TTL.
///
/// Works over a copy of the in-use set, so a lease taken or released while a
/// scan runs is at worst seen one tick late.
#[derive(Debug, Clone)]
pub struct ExpiryReaper {
	default_ttl: Duration,
}

impl ExpiryReaper {
	pub fn new(default_ttl: Duration) -> Self {
		Self { default_ttl }
	}

	/// Ids whose lease is strictly older than its TTL at `now`.
	pub fn find_expired<'a>(
		&self,
		in_use: impl IntoIterator<Item = &'a Resource>,
		now: DateTime<Utc>,
	) -> Vec<ResourceId> {
		in_use
			.into_iter()
			.filter_map(|r| r.lease(self.default_ttl))
			.filter(|lease| lease.is_expired_at(now))
			.map(|lease| lease.resource)
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock;
	use crate::types::keys;
	use chrono::TimeZone;

	fn leased(name: &str, start: DateTime<Utc>) -> Resource {
		let mut r = mock::resource(&mock::shard("westus"), name);
		r.lease_start = Some(start);
		r
	}

	fn start() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
	}

	#[test]
	fn lease_at_exact_ttl_is_not_expired() {
		let reaper = ExpiryReaper::new(Duration::from_secs(3600));
		let sites = [leased("a", start())];

		let at_boundary = start() + chrono::Duration::seconds(3600);
		assert!(reaper.find_expired(&sites, at_boundary).is_empty());

		let just_past = at_boundary + chrono::Duration::milliseconds(1);
		assert_eq!(reaper.find_expired(&sites, just_past), vec![sites[0].id.clone()]);
	}

	#[test]
	fn per_site_override_wins() {
		let reaper = ExpiryReaper::new(Duration::from_secs(3600));
		let mut short = leased("short", start());
		short
			.app_settings
			.insert(keys::LIFETIME_SETTING.to_string(), "10".to_string());
		let long = leased("long", start());

		let now = start() + chrono::Duration::minutes(11);
		assert_eq!(reaper.find_expired([&short, &long], now), vec![short.id.clone()]);
	}

	#[test]
	fn oversized_override_falls_back_to_default_ttl() {
		let reaper = ExpiryReaper::new(Duration::from_secs(3600));
		let mut huge = leased("huge", start());
		huge.app_settings.insert(
			keys::LIFETIME_SETTING.to_string(),
			"400000000000000000".to_string(),
		);
		let sites = [huge];

		assert!(reaper
			.find_expired(&sites, start() + chrono::Duration::minutes(59))
			.is_empty());
		assert_eq!(
			reaper.find_expired(&sites, start() + chrono::Duration::minutes(61)),
			vec![sites[0].id.clone()]
		);
	}

	#[test]
	fn sites_without_lease_start_are_skipped() {
		let reaper = ExpiryReaper::new(Duration::from_secs(1));
		let free = mock::resource(&mock::shard("westus"), "free");
		let now = start() + chrono::Duration::days(365);
		assert!(reaper.find_expired([&free], now).is_empty());
	}

	#[test]
	fn lease_started_in_future_is_live() {
		let reaper = ExpiryReaper::new(Duration::from_secs(60));
		let sites = [leased("a", start() + chrono::Duration::hours(1))];
		assert!(reaper.find_expired(&sites, start()).is_empty());
	}
}
