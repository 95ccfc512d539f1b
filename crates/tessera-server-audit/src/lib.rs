// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit logging for Tessera.
//!
//! Authorization decisions and ACL changes are recorded as
//! [`AuditLogEntry`] values, queued on an [`AuditService`] and fanned out to
//! one or more [`AuditSink`]s (structured `tracing` events, JSON-lines files,
//! or an in-memory capture).

pub mod error;
pub mod event;
pub mod filter;
pub mod pipeline;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{AuditEventType, AuditLogBuilder, AuditLogEntry, AuditOutcome, AuditSeverity};
pub use filter::AuditFilterConfig;
pub use pipeline::AuditService;
pub use sink::file::FileAuditSink;
pub use sink::memory::MemoryAuditSink;
pub use sink::tracing::TracingAuditSink;
pub use sink::AuditSink;

pub use tessera_server_config::{AuditConfig, QueueOverflowPolicy};
