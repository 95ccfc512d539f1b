// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduler and per-job settings read from the `jobsScheduler` substore.
//!
//! ```text
//! jobsScheduler.enabled=true
//! jobsScheduler.interval=1
//! jobsScheduler.timeZone=Europe/Berlin
//! jobsScheduler.impl.AclFlushJob.class=org.tessera.jobs.AclFlushJob
//! jobsScheduler.job.aclFlush.pluginName=AclFlushJob
//! jobsScheduler.job.aclFlush.cron=*/5 * * * *
//! jobsScheduler.job.aclFlush.enabled=true
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono_tz::Tz;
use tessera_common_config::ConfigStore;

use crate::error::{JobError, Result};

pub const SCHEDULER_SUBSTORE: &str = "jobsScheduler";
pub const DEFAULT_INTERVAL_MINUTES: i64 = 1;

const RESERVED_KEYS: [&str; 4] = ["pluginName", "cron", "enabled", "owner"];

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
	pub enabled: bool,
	pub interval: Duration,
	pub time_zone: Tz,
}

impl SchedulerSettings {
	/// Reads settings from the `jobsScheduler` substore.
	pub fn from_store(store: &ConfigStore) -> Result<Self> {
		let minutes = store.get_integer_or("interval", DEFAULT_INTERVAL_MINUTES)?;
		if minutes <= 0 {
			return Err(JobError::Configuration(
				tessera_common_config::ConfigStoreError::InvalidValue {
					key: format!("{}.interval", store.path()),
					value: minutes.to_string(),
					expected: "a positive number of minutes",
				},
			));
		}

		let zone = store.get_string_or("timeZone", "UTC");
		let time_zone: Tz = zone
			.trim()
			.parse()
			.map_err(|_| JobError::InvalidTimezone(zone.clone()))?;

		Ok(Self {
			enabled: store.get_bool_or("enabled", false)?,
			interval: Duration::from_secs(minutes as u64 * 60),
			time_zone,
		})
	}
}

impl Default for SchedulerSettings {
	fn default() -> Self {
		Self {
			enabled: false,
			interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES as u64 * 60),
			time_zone: Tz::UTC,
		}
	}
}

/// One job's configuration, read once when the job is registered. Only
/// `enabled` is looked up again on each scheduler wake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
	pub id: String,
	pub enabled: bool,
	pub cron: Option<String>,
	pub plugin_name: String,
	pub owner: Option<String>,
	/// Plugin-specific keys, i.e. everything but the reserved ones.
	pub properties: BTreeMap<String, String>,
}

impl JobConfig {
	/// Reads `jobsScheduler.job.<id>` given that substore.
	pub fn from_store(id: &str, store: &ConfigStore) -> Result<Self> {
		let properties = store
			.properties()
			.into_iter()
			.filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
			.collect();

		Ok(Self {
			id: id.to_string(),
			enabled: store.get_bool_or("enabled", false)?,
			cron: store
				.get("cron")
				.map(|c| c.trim().to_string())
				.filter(|c| !c.is_empty()),
			plugin_name: store.get_string("pluginName")?,
			owner: store.get("owner").filter(|o| !o.is_empty()),
			properties,
		})
	}

	pub fn property(&self, key: &str) -> Option<&str> {
		self.properties.get(key).map(String::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> ConfigStore {
		ConfigStore::parse(
			r#"
jobsScheduler.enabled=true
jobsScheduler.interval=5
jobsScheduler.timeZone=America/New_York
jobsScheduler.job.prune.pluginName=PruneJob
jobsScheduler.job.prune.cron=0 3 * * *
jobsScheduler.job.prune.enabled=true
jobsScheduler.job.prune.owner=admin
jobsScheduler.job.prune.maxAge=30
jobsScheduler.job.bare.pluginName=PruneJob
"#,
		)
		.substore(SCHEDULER_SUBSTORE)
	}

	#[test]
	fn reads_scheduler_settings() {
		let settings = SchedulerSettings::from_store(&store()).unwrap();
		assert!(settings.enabled);
		assert_eq!(settings.interval, Duration::from_secs(300));
		assert_eq!(settings.time_zone, chrono_tz::America::New_York);
	}

	#[test]
	fn scheduler_defaults() {
		let settings = SchedulerSettings::from_store(&ConfigStore::new()).unwrap();
		assert!(!settings.enabled);
		assert_eq!(settings.interval, Duration::from_secs(60));
		assert_eq!(settings.time_zone, Tz::UTC);
	}

	#[test]
	fn rejects_bad_scheduler_settings() {
		let bad_zone = ConfigStore::from_entries([("timeZone", "Mars/Olympus")]);
		assert!(matches!(
			SchedulerSettings::from_store(&bad_zone),
			Err(JobError::InvalidTimezone(_))
		));
		let bad_interval = ConfigStore::from_entries([("interval", "0")]);
		assert!(matches!(
			SchedulerSettings::from_store(&bad_interval),
			Err(JobError::Configuration(_))
		));
	}

	#[test]
	fn reads_job_config_with_properties() {
		let jobs = store().substore("job");
		let prune = JobConfig::from_store("prune", &jobs.substore("prune")).unwrap();
		assert!(prune.enabled);
		assert_eq!(prune.cron.as_deref(), Some("0 3 * * *"));
		assert_eq!(prune.plugin_name, "PruneJob");
		assert_eq!(prune.owner.as_deref(), Some("admin"));
		assert_eq!(prune.property("maxAge"), Some("30"));
		assert_eq!(prune.properties.len(), 1);

		let bare = JobConfig::from_store("bare", &jobs.substore("bare")).unwrap();
		assert!(!bare.enabled);
		assert!(bare.cron.is_none());
	}

	#[test]
	fn plugin_name_is_required() {
		let store = ConfigStore::from_entries([("enabled", "true")]);
		assert!(matches!(
			JobConfig::from_store("x", &store),
			Err(JobError::Configuration(_))
		));
	}
}
