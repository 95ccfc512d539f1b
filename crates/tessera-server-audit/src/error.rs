// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

/// Why an entry did not make it onto the audit queue.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuditError {
	#[error("audit queue full, entry dropped")]
	Dropped,

	#[error("audit service stopped")]
	Closed,
}

/// Returned by a sink that could not write an entry.
#[derive(Error, Debug)]
pub enum AuditSinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}
