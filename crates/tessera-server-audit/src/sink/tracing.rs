// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Level;

use super::{AuditSink, AuditSinkError};
use crate::event::{AuditLogEntry, AuditSeverity};
use crate::filter::AuditFilterConfig;

pub struct TracingAuditSink {
	filter: AuditFilterConfig,
}

impl TracingAuditSink {
	pub fn new(filter: AuditFilterConfig) -> Self {
		Self { filter }
	}
}

pub fn severity_to_level(severity: AuditSeverity) -> Level {
	match severity {
		AuditSeverity::Debug => Level::DEBUG,
		AuditSeverity::Info | AuditSeverity::Notice => Level::INFO,
		AuditSeverity::Warning => Level::WARN,
		AuditSeverity::Error | AuditSeverity::Critical => Level::ERROR,
	}
}

macro_rules! emit_audit {
	($macro:ident, $entry:expr, $details:expr) => {
		tracing::$macro!(
			target: "tessera_audit",
			id = %$entry.id,
			timestamp = %$entry.timestamp.to_rfc3339(),
			event_type = %$entry.event_type,
			severity = %$entry.severity,
			outcome = %$entry.outcome,
			subject = $entry.subject_id.as_deref(),
			resource = $entry.resource.as_deref(),
			operation = $entry.operation.as_deref(),
			action = %$entry.action,
			request_id = $entry.request_id.as_deref(),
			details = $details.as_deref(),
			"audit event"
		)
	};
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		let details = if entry.details.is_null() {
			None
		} else {
			Some(entry.details.to_string())
		};

		match severity_to_level(entry.severity) {
			Level::DEBUG => emit_audit!(debug, entry, details),
			Level::INFO => emit_audit!(info, entry, details),
			Level::WARN => emit_audit!(warn, entry, details),
			_ => emit_audit!(error, entry, details),
		}

		Ok(())
	}
}
