// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON-lines audit file sink.
//!
//! The path may contain `%Y`, `%m`, `%d` and `%H` placeholders; a new file
//! is opened whenever the expanded path changes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::AuditSinkError;
use crate::event::AuditLogEntry;
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

struct FileHandle {
	path: String,
	file: tokio::fs::File,
}

pub struct FileAuditSink {
	path: String,
	filter: AuditFilterConfig,
	handle: Mutex<Option<FileHandle>>,
}

impl FileAuditSink {
	pub fn new(path: impl Into<String>, filter: AuditFilterConfig) -> Self {
		Self {
			path: path.into(),
			filter,
			handle: Mutex::new(None),
		}
	}

	async fn write_line(&self, expanded_path: &str, line: &str) -> Result<(), AuditSinkError> {
		let mut guard = self.handle.lock().await;

		let needs_reopen = match &*guard {
			Some(handle) => handle.path != expanded_path,
			None => true,
		};

		if needs_reopen {
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(expanded_path)
				.await
				.map_err(|e| AuditSinkError::Transient(format!("failed to open file: {e}")))?;

			*guard = Some(FileHandle {
				path: expanded_path.to_string(),
				file,
			});
		}

		let handle = guard
			.as_mut()
			.ok_or_else(|| AuditSinkError::Permanent("file handle not initialized".to_string()))?;

		handle
			.file
			.write_all(line.as_bytes())
			.await
			.map_err(|e| AuditSinkError::Transient(format!("failed to write to file: {e}")))?;

		handle
			.file
			.flush()
			.await
			.map_err(|e| AuditSinkError::Transient(format!("failed to flush file: {e}")))
	}
}

#[async_trait]
impl AuditSink for FileAuditSink {
	fn name(&self) -> &str {
		"file"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditLogEntry>) -> Result<(), AuditSinkError> {
		let expanded_path = expand_path(&self.path, entry.timestamp);
		let line = format_json_line(&entry)?;
		self.write_line(&expanded_path, &line).await
	}
}

pub fn format_json_line(entry: &AuditLogEntry) -> Result<String, AuditSinkError> {
	let json = serde_json::to_string(entry)
		.map_err(|e| AuditSinkError::Permanent(format!("JSON serialization failed: {e}")))?;
	Ok(format!("{json}\n"))
}

pub fn expand_path(path: &str, at: DateTime<Utc>) -> String {
	path
		.replace("%Y", &format!("{:04}", at.year()))
		.replace("%m", &format!("{:02}", at.month()))
		.replace("%d", &format!("{:02}", at.day()))
		.replace("%H", &format!("{:02}", at.hour()))
}
