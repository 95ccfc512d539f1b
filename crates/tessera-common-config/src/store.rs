// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hierarchical configuration store.
//!
//! Keys are dot-separated paths (`jobsScheduler.job.prune.cron`). A
//! [`ConfigStore`] is a view over a shared map rooted at a prefix; calling
//! [`ConfigStore::substore`] narrows the prefix without copying, so writes
//! made through any view are visible through every other view.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{ConfigStoreError, Result};
use crate::properties::{parse_properties, to_properties_string};

#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
	entries: Arc<RwLock<BTreeMap<String, String>>>,
	prefix: String,
}

impl ConfigStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_entries<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let map = entries
			.into_iter()
			.map(|(k, v)| (k.into(), v.into()))
			.collect();
		Self {
			entries: Arc::new(RwLock::new(map)),
			prefix: String::new(),
		}
	}

	/// Builds a root store from `CS.cfg`-style property text.
	pub fn parse(text: &str) -> Self {
		Self::from_entries(parse_properties(text))
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|source| ConfigStoreError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let store = Self::parse(&text);
		debug!(path = %path.display(), keys = store.len(), "loaded configuration store");
		Ok(store)
	}

	/// Writes every entry under this view's prefix (with full keys) to `path`.
	pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		std::fs::write(path, self.to_properties_string()).map_err(|source| {
			ConfigStoreError::Write {
				path: path.to_path_buf(),
				source,
			}
		})
	}

	pub fn to_properties_string(&self) -> String {
		let entries = self.read();
		let scoped: Vec<(&String, &String)> = entries
			.iter()
			.filter(|(k, _)| k.starts_with(&self.prefix))
			.collect();
		to_properties_string(scoped)
	}

	/// Name of this substore (last path segment), empty for the root.
	pub fn name(&self) -> &str {
		let trimmed = self.prefix.trim_end_matches('.');
		trimmed.rsplit('.').next().unwrap_or_default()
	}

	/// Full dotted path of this view, empty for the root.
	pub fn path(&self) -> &str {
		self.prefix.trim_end_matches('.')
	}

	pub fn substore(&self, name: &str) -> ConfigStore {
		ConfigStore {
			entries: Arc::clone(&self.entries),
			prefix: format!("{}{}.", self.prefix, name),
		}
	}

	pub fn len(&self) -> usize {
		self.read().keys().filter(|k| k.starts_with(&self.prefix)).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, key: &str) -> bool {
		self.read().contains_key(&self.full_key(key))
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.read().get(&self.full_key(key)).cloned()
	}

	pub fn get_string(&self, key: &str) -> Result<String> {
		self.get(key).ok_or_else(|| ConfigStoreError::MissingKey {
			key: self.full_key(key),
		})
	}

	pub fn get_string_or(&self, key: &str, default: &str) -> String {
		self.get(key).unwrap_or_else(|| default.to_string())
	}

	pub fn get_bool(&self, key: &str) -> Result<bool> {
		let value = self.get_string(key)?;
		self.parse_bool(key, &value)
	}

	pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
		match self.get(key) {
			Some(value) => self.parse_bool(key, &value),
			None => Ok(default),
		}
	}

	pub fn get_integer(&self, key: &str) -> Result<i64> {
		let value = self.get_string(key)?;
		self.parse_integer(key, &value)
	}

	pub fn get_integer_or(&self, key: &str, default: i64) -> Result<i64> {
		match self.get(key) {
			Some(value) => self.parse_integer(key, &value),
			None => Ok(default),
		}
	}

	pub fn put_string(&self, key: &str, value: impl Into<String>) {
		let full = self.full_key(key);
		self.write().insert(full, value.into());
	}

	pub fn put_bool(&self, key: &str, value: bool) {
		self.put_string(key, value.to_string());
	}

	pub fn put_integer(&self, key: &str, value: i64) {
		self.put_string(key, value.to_string());
	}

	pub fn remove(&self, key: &str) -> Option<String> {
		let full = self.full_key(key);
		self.write().remove(&full)
	}

	/// Names of the child substores directly below this view, sorted.
	///
	/// For keys `job.a.cron` and `job.b.enabled` under `jobsScheduler`,
	/// `substore("job").substore_names()` yields `["a", "b"]`.
	pub fn substore_names(&self) -> Vec<String> {
		let names: BTreeSet<String> = self
			.read()
			.keys()
			.filter_map(|k| k.strip_prefix(&self.prefix))
			.filter_map(|rest| rest.split_once('.').map(|(head, _)| head.to_string()))
			.collect();
		names.into_iter().collect()
	}

	/// Leaf keys directly below this view (no further dots), sorted.
	pub fn property_names(&self) -> Vec<String> {
		self
			.read()
			.keys()
			.filter_map(|k| k.strip_prefix(&self.prefix))
			.filter(|rest| !rest.contains('.'))
			.map(str::to_string)
			.collect()
	}

	/// Every entry below this view, keyed relative to the view.
	pub fn properties(&self) -> BTreeMap<String, String> {
		self
			.read()
			.iter()
			.filter_map(|(k, v)| {
				k.strip_prefix(&self.prefix)
					.map(|rest| (rest.to_string(), v.clone()))
			})
			.collect()
	}

	fn full_key(&self, key: &str) -> String {
		format!("{}{}", self.prefix, key)
	}

	fn parse_bool(&self, key: &str, value: &str) -> Result<bool> {
		match value.trim().to_ascii_lowercase().as_str() {
			"true" | "1" | "yes" | "on" => Ok(true),
			"false" | "0" | "no" | "off" => Ok(false),
			_ => Err(ConfigStoreError::InvalidValue {
				key: self.full_key(key),
				value: value.to_string(),
				expected: "a boolean",
			}),
		}
	}

	fn parse_integer(&self, key: &str, value: &str) -> Result<i64> {
		value
			.trim()
			.parse()
			.map_err(|_| ConfigStoreError::InvalidValue {
				key: self.full_key(key),
				value: value.to_string(),
				expected: "an integer",
			})
	}

	fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
		self.entries.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>> {
		self.entries.write().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> ConfigStore {
		ConfigStore::parse(
			r#"
jobsScheduler.enabled=true
jobsScheduler.interval=2
jobsScheduler.job.prune.cron=0 3 * * *
jobsScheduler.job.prune.enabled=false
jobsScheduler.job.flush.cron=*/5 * * * *
authz.instance.BasicAuthz.group=Administrators
"#,
		)
	}

	#[test]
	fn typed_getters_read_values() {
		let store = sample().substore("jobsScheduler");
		assert!(store.get_bool("enabled").unwrap());
		assert_eq!(store.get_integer("interval").unwrap(), 2);
		assert_eq!(store.get_integer_or("missing", 7).unwrap(), 7);
	}

	#[test]
	fn missing_key_reports_full_path() {
		let store = sample().substore("jobsScheduler");
		match store.get_string("nope") {
			Err(ConfigStoreError::MissingKey { key }) => assert_eq!(key, "jobsScheduler.nope"),
			other => panic!("expected MissingKey, got {other:?}"),
		}
	}

	#[test]
	fn invalid_bool_is_an_error() {
		let store = ConfigStore::from_entries([("flag", "maybe")]);
		assert!(matches!(
			store.get_bool("flag"),
			Err(ConfigStoreError::InvalidValue { .. })
		));
	}

	#[test]
	fn substore_names_lists_children() {
		let jobs = sample().substore("jobsScheduler").substore("job");
		assert_eq!(jobs.substore_names(), vec!["flush", "prune"]);
		assert_eq!(jobs.substore("prune").name(), "prune");
		assert_eq!(jobs.path(), "jobsScheduler.job");
	}

	#[test]
	fn property_names_only_lists_leaves() {
		let sched = sample().substore("jobsScheduler");
		assert_eq!(sched.property_names(), vec!["enabled", "interval"]);
	}

	#[test]
	fn writes_through_substore_are_shared() {
		let root = sample();
		let prune = root.substore("jobsScheduler").substore("job").substore("prune");
		prune.put_bool("enabled", true);
		assert!(root.get_bool("jobsScheduler.job.prune.enabled").unwrap());
	}

	#[test]
	fn properties_are_relative_to_view() {
		let prune = sample().substore("jobsScheduler").substore("job").substore("prune");
		let props = prune.properties();
		assert_eq!(props.get("cron").map(String::as_str), Some("0 3 * * *"));
		assert_eq!(props.len(), 2);
	}

	#[test]
	fn save_and_load_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("CS.cfg");
		let store = sample();
		store.save(&path).unwrap();

		let loaded = ConfigStore::load(&path).unwrap();
		assert_eq!(loaded.len(), store.len());
		assert_eq!(
			loaded.get_string("authz.instance.BasicAuthz.group").unwrap(),
			"Administrators"
		);
	}

	#[test]
	fn load_missing_file_fails() {
		let err = ConfigStore::load("/nonexistent/CS.cfg").unwrap_err();
		assert!(matches!(err, ConfigStoreError::Read { .. }));
	}
}
