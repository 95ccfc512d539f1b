// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("No such entry: {0}")]
	NoSuchEntry(String),

	#[error("Entry already exists: {0}")]
	AlreadyExists(String),

	#[error("Invalid search filter '{filter}': {message}")]
	InvalidFilter { filter: String, message: String },

	#[error("Directory unavailable: {0}")]
	Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
