// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tessera_common_config::ConfigStoreError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("Job failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("Job not found: {0}")]
	NotFound(String),

	#[error("Job already running: {0}")]
	AlreadyRunning(String),

	#[error("Invalid cron expression '{expression}': {message}")]
	InvalidCron { expression: String, message: String },

	#[error("Invalid time zone: {0}")]
	InvalidTimezone(String),

	#[error("Unknown job plugin: {0}")]
	UnknownPlugin(String),

	#[error("Configuration error: {0}")]
	Configuration(#[from] ConfigStoreError),

	#[error("Scheduler is shut down")]
	ShutDown,
}

impl JobError {
	pub fn failed(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: false,
		}
	}
}

pub type Result<T> = std::result::Result<T, JobError>;
