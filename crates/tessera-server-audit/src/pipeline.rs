// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{instrument, warn};

use crate::error::{AuditError, AuditResult};
use crate::event::AuditLogEntry;
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;
use tessera_server_config::QueueOverflowPolicy;

/// Bounded audit queue drained by one background task.
///
/// Entries reach every sink in submission order. A failing sink is logged
/// and does not stop delivery to the others.
pub struct AuditService {
	tx: mpsc::Sender<AuditLogEntry>,
	overflow_policy: QueueOverflowPolicy,
}

impl AuditService {
	pub fn new(
		global_filter: AuditFilterConfig,
		queue_capacity: usize,
		overflow_policy: QueueOverflowPolicy,
		sinks: Vec<Arc<dyn AuditSink>>,
	) -> Self {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));

		tokio::spawn(Self::background_task(rx, global_filter, sinks));

		Self {
			tx,
			overflow_policy,
		}
	}

	async fn background_task(
		mut rx: mpsc::Receiver<AuditLogEntry>,
		global_filter: AuditFilterConfig,
		sinks: Vec<Arc<dyn AuditSink>>,
	) {
		while let Some(entry) = rx.recv().await {
			if !global_filter.allows(&entry) {
				continue;
			}

			let entry = Arc::new(entry);

			for sink in &sinks {
				if !sink.filter().allows(&entry) {
					continue;
				}
				if let Err(e) = sink.publish(Arc::clone(&entry)).await {
					warn!(sink = sink.name(), error = %e, "audit sink publish failed");
				}
			}
		}
	}

	/// Queue an entry according to the configured overflow policy.
	///
	/// - `Block`: waits for queue space, so entries are never lost
	/// - `DropNewest`: fails with [`AuditError::Dropped`] when the queue is full
	/// - `DropOldest`: same as `DropNewest`, the queue cannot evict from the
	///   sending side
	#[instrument(skip(self, entry), fields(event_type = %entry.event_type))]
	pub async fn log(&self, entry: AuditLogEntry) -> AuditResult<()> {
		match self.overflow_policy {
			QueueOverflowPolicy::Block => self.tx.send(entry).await.map_err(|_| AuditError::Closed),
			QueueOverflowPolicy::DropNewest | QueueOverflowPolicy::DropOldest => {
				self.tx.try_send(entry).map_err(|e| match e {
					TrySendError::Full(_) => AuditError::Dropped,
					TrySendError::Closed(_) => AuditError::Closed,
				})
			}
		}
	}
}
