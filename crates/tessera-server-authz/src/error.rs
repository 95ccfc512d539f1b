// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::acl::AclParseError;
use crate::expression::ExpressionError;

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, Error)]
pub enum AuthzError {
	/// Routine rejection: the subject lacks the right.
	#[error("access denied by {manager}: {operation} on {resource}")]
	AccessDenied {
		manager: String,
		resource: String,
		operation: String,
	},

	#[error("authorization manager not found: {0}")]
	ManagerNotFound(String),

	#[error("no authorization manager serves realm: {0}")]
	UnknownRealm(String),

	/// Directory unreachable or timed out, unparsable rule set, or a failed plugin.
	#[error("internal authorization error: {0}")]
	Internal(String),

	#[error("authorization configuration error: {0}")]
	Configuration(String),

	#[error("authorization subsystem is shutting down")]
	ShuttingDown,
}

impl AuthzError {
	pub fn access_denied(manager: &str, resource: &str, operation: &str) -> Self {
		AuthzError::AccessDenied {
			manager: manager.to_string(),
			resource: resource.to_string(),
			operation: operation.to_string(),
		}
	}

	/// Whether this is a routine rejection rather than a failure to decide.
	pub fn is_denial(&self) -> bool {
		matches!(self, AuthzError::AccessDenied { .. })
	}
}

impl From<AclParseError> for AuthzError {
	fn from(e: AclParseError) -> Self {
		AuthzError::Internal(e.to_string())
	}
}

impl From<ExpressionError> for AuthzError {
	fn from(e: ExpressionError) -> Self {
		AuthzError::Internal(e.to_string())
	}
}

impl From<tessera_server_directory::DirectoryError> for AuthzError {
	fn from(e: tessera_server_directory::DirectoryError) -> Self {
		AuthzError::Internal(format!("directory: {e}"))
	}
}

impl From<tessera_common_config::ConfigStoreError> for AuthzError {
	fn from(e: tessera_common_config::ConfigStoreError) -> Self {
		AuthzError::Configuration(e.to_string())
	}
}
