// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit logging configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_QUEUE_CAPACITY: usize = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueOverflowPolicy {
	#[default]
	DropNewest,
	DropOldest,
	Block,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfigLayer {
	pub enabled: Option<bool>,
	pub queue_capacity: Option<usize>,
	pub queue_overflow_policy: Option<QueueOverflowPolicy>,
	pub min_severity: Option<String>,
	pub file_path: Option<String>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.queue_capacity.is_some() {
			self.queue_capacity = other.queue_capacity;
		}
		if other.queue_overflow_policy.is_some() {
			self.queue_overflow_policy = other.queue_overflow_policy;
		}
		if other.min_severity.is_some() {
			self.min_severity = other.min_severity;
		}
		if other.file_path.is_some() {
			self.file_path = other.file_path;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			enabled: self.enabled.unwrap_or(true),
			queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
			queue_overflow_policy: self.queue_overflow_policy.unwrap_or_default(),
			min_severity: self.min_severity.unwrap_or_else(|| "info".to_string()),
			file_path: self.file_path,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
	pub enabled: bool,
	pub queue_capacity: usize,
	pub queue_overflow_policy: QueueOverflowPolicy,
	pub min_severity: String,
	/// JSON-lines audit file; tracing is always a sink.
	pub file_path: Option<String>,
}

impl Default for AuditConfig {
	fn default() -> Self {
		AuditConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = AuditConfig::default();
		assert!(config.enabled);
		assert_eq!(config.queue_capacity, 10000);
		assert_eq!(
			config.queue_overflow_policy,
			QueueOverflowPolicy::DropNewest
		);
		assert_eq!(config.min_severity, "info");
		assert!(config.file_path.is_none());
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = AuditConfigLayer {
			enabled: Some(true),
			queue_capacity: Some(100),
			..Default::default()
		};
		base.merge(AuditConfigLayer {
			enabled: Some(false),
			file_path: Some("/var/log/tessera/audit.jsonl".to_string()),
			..Default::default()
		});
		let config = base.finalize();
		assert!(!config.enabled);
		assert_eq!(config.queue_capacity, 100);
		assert_eq!(config.file_path.as_deref(), Some("/var/log/tessera/audit.jsonl"));
	}

	#[test]
	fn test_queue_overflow_policy_serde() {
		let drop_oldest: QueueOverflowPolicy = serde_json::from_str(r#""drop_oldest""#).unwrap();
		assert_eq!(drop_oldest, QueueOverflowPolicy::DropOldest);

		let block: QueueOverflowPolicy = serde_json::from_str(r#""block""#).unwrap();
		assert_eq!(block, QueueOverflowPolicy::Block);
	}
}
