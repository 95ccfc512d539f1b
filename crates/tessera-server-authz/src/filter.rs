// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request access decision point.
//!
//! Maps the request route to a protected (resource, operation), resolves the
//! caller to an [`AuthToken`] and asks the [`AuthzSubsystem`]. Every outcome
//! is audited before the decision is returned; grants additionally record
//! the roles the subject acted under.

use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;
use serde_json::json;
use tessera_common_config::ConfigStore;
use tessera_server_audit::{AuditEventType, AuditLogEntry, AuditService};
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument, warn};

use crate::error::{AuthzError, Result};
use crate::mapping::{AclMapping, AclTarget};
use crate::subsystem::AuthzSubsystem;
use crate::token::{AuthToken, AuthzToken, Principal};

pub const DEFAULT_MANAGER_KEY: &str = "authz.defaultManager";
pub const DEFAULT_MANAGER: &str = "DirAclAuthz";

const MISSING_TOKEN: &str = "missing auth token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
	Granted {
		/// Absent for unprotected routes.
		authz: Option<AuthzToken>,
	},
	Rejected {
		status: StatusCode,
		reason: String,
	},
}

impl FilterDecision {
	pub fn is_granted(&self) -> bool {
		matches!(self, FilterDecision::Granted { .. })
	}

	fn forbidden(reason: impl Into<String>) -> Self {
		FilterDecision::Rejected {
			status: StatusCode::FORBIDDEN,
			reason: reason.into(),
		}
	}
}

#[derive(Debug, Clone)]
enum MappingSource {
	Files { default: PathBuf, override_path: PathBuf },
	Fixed,
}

pub struct AuthzFilter {
	subsystem: Arc<AuthzSubsystem>,
	audit: Arc<AuditService>,
	default_manager: String,
	source: MappingSource,
	mapping: OnceCell<AclMapping>,
}

impl AuthzFilter {
	/// Filter whose mapping is read from disk on the first request.
	pub fn new(
		subsystem: Arc<AuthzSubsystem>,
		audit: Arc<AuditService>,
		default_mapping: impl Into<PathBuf>,
		override_mapping: impl Into<PathBuf>,
	) -> Self {
		Self {
			subsystem,
			audit,
			default_manager: DEFAULT_MANAGER.to_string(),
			source: MappingSource::Files {
				default: default_mapping.into(),
				override_path: override_mapping.into(),
			},
			mapping: OnceCell::new(),
		}
	}

	pub fn with_mapping(subsystem: Arc<AuthzSubsystem>, audit: Arc<AuditService>, mapping: AclMapping) -> Self {
		Self {
			subsystem,
			audit,
			default_manager: DEFAULT_MANAGER.to_string(),
			source: MappingSource::Fixed,
			mapping: OnceCell::new_with(Some(mapping)),
		}
	}

	pub fn with_default_manager(mut self, manager: impl Into<String>) -> Self {
		self.default_manager = manager.into();
		self
	}

	/// Applies `authz.defaultManager` when set.
	pub fn configure(self, config: &ConfigStore) -> Self {
		match config.get(DEFAULT_MANAGER_KEY) {
			Some(manager) if !manager.trim().is_empty() => self.with_default_manager(manager.trim()),
			_ => self,
		}
	}

	pub fn default_manager(&self) -> &str {
		&self.default_manager
	}

	async fn mapping(&self) -> Result<&AclMapping> {
		self.mapping
			.get_or_try_init(|| async {
				match &self.source {
					MappingSource::Files {
						default,
						override_path,
					} => AclMapping::load(default, override_path).await,
					MappingSource::Fixed => Ok(AclMapping::new()),
				}
			})
			.await
	}

	#[instrument(skip(self, principal, request_id))]
	pub async fn check(
		&self,
		route: &str,
		principal: Option<&Principal>,
		request_id: Option<&str>,
	) -> FilterDecision {
		let subject = principal.map(Principal::name);
		let audit = |event: AuditEventType| {
			let mut builder = AuditLogEntry::builder(event).subject_opt(subject);
			if let Some(id) = request_id {
				builder = builder.request_id(id);
			}
			builder
		};

		let target = match self.mapping().await.and_then(|m| m.lookup(route)) {
			Ok(Some(target)) => target,
			Ok(None) => {
				debug!(route, "route has no ACL mapping");
				self.record(
					audit(AuditEventType::AccessGranted)
						.details(json!({ "route": route, "reason": "no ACL mapping" }))
						.build(),
				)
				.await;
				return FilterDecision::Granted { authz: None };
			}
			Err(e) => {
				error!(route, error = %e, "ACL mapping unusable");
				self.record(
					audit(AuditEventType::AccessDenied)
						.details(json!({ "route": route, "reason": e.to_string() }))
						.build(),
				)
				.await;
				return FilterDecision::forbidden(e.to_string());
			}
		};
		let AclTarget {
			resource,
			operation,
		} = target;
		let denied = |reason: &str| {
			audit(AuditEventType::AccessDenied)
				.resource(resource.as_str())
				.operation(operation.as_str())
				.details(json!({ "route": route, "reason": reason }))
				.build()
		};

		let (manager, token) = match self.resolve(principal) {
			Ok(resolved) => resolved,
			Err(reason) => {
				warn!(route, %resource, %operation, reason = %reason, "rejecting request");
				self.record(denied(&reason)).await;
				return FilterDecision::forbidden(reason);
			}
		};

		match self
			.subsystem
			.authorize(&manager, &token, &resource, &operation)
			.await
		{
			Ok(authz) => {
				self.record(
					audit(AuditEventType::AccessGranted)
						.resource(resource.as_str())
						.operation(operation.as_str())
						.details(json!({ "route": route, "manager": manager }))
						.build(),
				)
				.await;
				self.record(
					audit(AuditEventType::RoleAssumed)
						.resource(resource.as_str())
						.operation(operation.as_str())
						.details(json!({ "roles": token.groups() }))
						.build(),
				)
				.await;
				FilterDecision::Granted { authz: Some(authz) }
			}
			Err(e) => {
				match &e {
					AuthzError::AccessDenied { .. } => debug!(%resource, %operation, "access denied"),
					other => error!(%resource, %operation, error = %other, "authorization failed"),
				}
				self.record(denied(&e.to_string())).await;
				FilterDecision::forbidden(e.to_string())
			}
		}
	}

	/// Picks the manager and token for a caller, or the rejection reason.
	fn resolve(&self, principal: Option<&Principal>) -> std::result::Result<(String, AuthToken), String> {
		match principal {
			None | Some(Principal::Internal { token: None, .. }) => Err(MISSING_TOKEN.to_string()),
			Some(Principal::Internal {
				token: Some(token), ..
			}) => Ok((self.default_manager.clone(), token.clone())),
			Some(Principal::External(external)) => self
				.subsystem
				.manager_for_realm(&external.realm)
				.map(|m| (m.name().to_string(), external.to_token()))
				.map_err(|e| e.to_string()),
		}
	}

	async fn record(&self, entry: AuditLogEntry) {
		if let Err(e) = self.audit.log(entry).await {
			warn!(error = %e, "failed to queue audit entry");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn forbidden_uses_403() {
		match FilterDecision::forbidden("nope") {
			FilterDecision::Rejected { status, reason } => {
				assert_eq!(status, StatusCode::FORBIDDEN);
				assert_eq!(reason, "nope");
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[tokio::test]
	async fn configure_reads_default_manager() {
		let audit = Arc::new(AuditService::new(
			Default::default(),
			16,
			Default::default(),
			Vec::new(),
		));
		let subsystem = Arc::new(AuthzSubsystem::new());
		let filter = AuthzFilter::with_mapping(subsystem.clone(), audit.clone(), AclMapping::new());
		assert_eq!(filter.default_manager(), DEFAULT_MANAGER);

		let config = ConfigStore::from_entries([(DEFAULT_MANAGER_KEY, "aclMgr")]);
		let filter = AuthzFilter::with_mapping(subsystem, audit, AclMapping::new()).configure(&config);
		assert_eq!(filter.default_manager(), "aclMgr");
	}
}
