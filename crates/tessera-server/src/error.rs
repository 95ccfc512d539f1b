// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tessera_common_config::ConfigStoreError;
use tessera_server_config::ConfigError;
use tessera_server_directory::DirectoryError;
use tessera_server_jobs::JobError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("server configuration: {0}")]
	Config(#[from] ConfigError),

	#[error("subsystem configuration: {0}")]
	ConfigStore(#[from] ConfigStoreError),

	#[error("directory: {0}")]
	Directory(#[from] DirectoryError),

	#[error("jobs: {0}")]
	Jobs(#[from] JobError),

	#[error("invalid setting {key}: {message}")]
	InvalidSetting { key: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, ServerError>;
