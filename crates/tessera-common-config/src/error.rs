// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigStoreError>;

#[derive(Debug, Error)]
pub enum ConfigStoreError {
	#[error("missing configuration key: {key}")]
	MissingKey { key: String },

	#[error("invalid value '{value}' for {key}: expected {expected}")]
	InvalidValue {
		key: String,
		value: String,
		expected: &'static str,
	},

	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}
