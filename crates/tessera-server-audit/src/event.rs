// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit logging.
//!
//! - [`AuditEventType`]: the auditable authorization events
//! - [`AuditSeverity`]: RFC 5424-compatible severity levels
//! - [`AuditOutcome`]: success or failure of the audited action
//! - [`AuditLogEntry`]: a complete audit record
//! - [`AuditLogBuilder`]: fluent API for constructing entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Request decisions
	AccessGranted,
	AccessDenied,
	RoleAssumed,

	// Rule store changes
	AclUpdated,
	AclWriteDeferred,
	AclFlushed,
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditEventType::AccessGranted => "access_granted",
			AuditEventType::AccessDenied => "access_denied",
			AuditEventType::RoleAssumed => "role_assumed",
			AuditEventType::AclUpdated => "acl_updated",
			AuditEventType::AclWriteDeferred => "acl_write_deferred",
			AuditEventType::AclFlushed => "acl_flushed",
		};
		write!(f, "{s}")
	}
}

impl AuditEventType {
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditEventType::AccessGranted | AuditEventType::RoleAssumed => AuditSeverity::Info,
			AuditEventType::AccessDenied => AuditSeverity::Warning,
			AuditEventType::AclUpdated | AuditEventType::AclFlushed => AuditSeverity::Notice,
			AuditEventType::AclWriteDeferred => AuditSeverity::Error,
		}
	}

	pub fn default_outcome(&self) -> AuditOutcome {
		match self {
			AuditEventType::AccessDenied | AuditEventType::AclWriteDeferred => AuditOutcome::Failure,
			_ => AuditOutcome::Success,
		}
	}
}

/// Severity levels following RFC 5424.
///
/// The numeric values are syslog severity codes; ordering treats a lower
/// code as more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	#[default]
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl AuditSeverity {
	pub fn as_syslog_code(&self) -> u8 {
		*self as u8
	}
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

impl FromStr for AuditSeverity {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"debug" => Ok(AuditSeverity::Debug),
			"info" => Ok(AuditSeverity::Info),
			"notice" => Ok(AuditSeverity::Notice),
			"warning" | "warn" => Ok(AuditSeverity::Warning),
			"error" => Ok(AuditSeverity::Error),
			"critical" => Ok(AuditSeverity::Critical),
			other => Err(format!("unknown audit severity '{other}'")),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
	Success,
	Failure,
}

impl fmt::Display for AuditOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuditOutcome::Success => f.write_str("success"),
			AuditOutcome::Failure => f.write_str("failure"),
		}
	}
}

/// An entry in the audit log recording a security-relevant event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub severity: AuditSeverity,
	pub outcome: AuditOutcome,

	/// User id of the subject, when one was presented.
	pub subject_id: Option<String>,
	/// Protected resource name (e.g. `certServer.ca.certs`).
	pub resource: Option<String>,
	/// Operation requested on the resource (e.g. `read`).
	pub operation: Option<String>,

	/// Human-readable description of the action.
	pub action: String,
	pub details: serde_json::Value,
	pub request_id: Option<String>,
}

impl AuditLogEntry {
	pub fn builder(event_type: AuditEventType) -> AuditLogBuilder {
		AuditLogBuilder::new(event_type)
	}
}

#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
	event_type: AuditEventType,
	severity: Option<AuditSeverity>,
	outcome: Option<AuditOutcome>,
	subject_id: Option<String>,
	resource: Option<String>,
	operation: Option<String>,
	action: Option<String>,
	details: serde_json::Value,
	request_id: Option<String>,
}

impl AuditLogBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			severity: None,
			outcome: None,
			subject_id: None,
			resource: None,
			operation: None,
			action: None,
			details: serde_json::Value::Null,
			request_id: None,
		}
	}

	/// Set the severity level. Defaults to the event type's default severity.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
		self.outcome = Some(outcome);
		self
	}

	pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
		self.subject_id = Some(subject_id.into());
		self
	}

	/// Set the subject only when one is known.
	pub fn subject_opt(mut self, subject_id: Option<impl Into<String>>) -> Self {
		self.subject_id = subject_id.map(Into::into);
		self
	}

	pub fn resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());
		self
	}

	pub fn operation(mut self, operation: impl Into<String>) -> Self {
		self.operation = Some(operation.into());
		self
	}

	pub fn action(mut self, action: impl Into<String>) -> Self {
		self.action = Some(action.into());
		self
	}

	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
		self.request_id = Some(request_id.into());
		self
	}

	pub fn build(self) -> AuditLogEntry {
		AuditLogEntry {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			severity: self
				.severity
				.unwrap_or_else(|| self.event_type.default_severity()),
			outcome: self
				.outcome
				.unwrap_or_else(|| self.event_type.default_outcome()),
			subject_id: self.subject_id,
			resource: self.resource,
			operation: self.operation,
			action: self.action.unwrap_or_else(|| self.event_type.to_string()),
			details: self.details,
			request_id: self.request_id,
		}
	}
}
