// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process sink that retains every entry, for tests and diagnostics.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{AuditSink, AuditSinkError};
use crate::event::{AuditEventType, AuditLogEntry};
use crate::filter::AuditFilterConfig;

#[derive(Default)]
pub struct MemoryAuditSink {
	filter: AuditFilterConfig,
	entries: Mutex<Vec<Arc<AuditLogEntry>>>,
}

impl MemoryAuditSink {
	pub fn new(filter: AuditFilterConfig) -> Self {
		Self {
			filter,
			entries: Mutex::new(Vec::new()),
		}
	}

	pub fn entries(&self) -> Vec<Arc<AuditLogEntry>> {
		self
			.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn of_type(&self, event_type: AuditEventType) -> Vec<Arc<AuditLogEntry>> {
		self
			.entries()
			.into_iter()
			.filter(|e| e.event_type == event_type)
			.collect()
	}

	pub fn len(&self) -> usize {
		self
			.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Poll until at least `count` entries arrived or `timeout` elapsed.
	///
	/// Returns whether the count was reached.
	pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			if self.len() >= count {
				return true;
			}
			if tokio::time::Instant::now() >= deadline {
				return false;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	}
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
	fn name(&self) -> &str {
		"memory"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		self
			.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(entry);
		Ok(())
	}
}
