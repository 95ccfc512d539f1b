// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::acl::Acl;
use crate::error::{AuthzError, Result};
use crate::manager::{AuthzManager, ManagerInit};
use crate::rule_store::{EvaluationOrder, RuleStore};
use crate::token::{AuthToken, AuthzToken};

/// Authorizes principals from an external realm against ACLs held in
/// configuration (`acl.<n>` keys). A resource without an ACL is denied.
#[derive(Debug)]
pub struct ExternalAuthz {
	name: String,
	realm: String,
	order: EvaluationOrder,
	rules: RuleStore,
}

impl ExternalAuthz {
	pub fn new(name: impl Into<String>, realm: impl Into<String>, rules: RuleStore) -> Self {
		Self {
			name: name.into(),
			realm: realm.into(),
			order: EvaluationOrder::default(),
			rules,
		}
	}

	pub fn with_order(mut self, order: EvaluationOrder) -> Self {
		self.order = order;
		self
	}

	pub fn factory(init: ManagerInit) -> Result<Arc<dyn AuthzManager>> {
		let realm = init.config.get_string("realm")?;
		if realm.trim().is_empty() {
			return Err(AuthzError::Configuration(format!(
				"{}.realm must not be empty",
				init.config.path()
			)));
		}
		let order = super::evaluation_order(&init.config)?;

		let acls = init.config.substore("acl");
		let values: Vec<String> = acls
			.property_names()
			.iter()
			.filter_map(|key| acls.get(key))
			.collect();
		let rules = RuleStore::from_values(&values);
		info!(manager = %init.name, realm = %realm, acls = rules.len(), "loaded external realm ACLs");

		Ok(Arc::new(Self::new(init.name, realm.trim(), rules).with_order(order)))
	}
}

#[async_trait]
impl AuthzManager for ExternalAuthz {
	fn name(&self) -> &str {
		&self.name
	}

	fn realm(&self) -> Option<&str> {
		Some(&self.realm)
	}

	async fn authorize(&self, token: &AuthToken, resource: &str, operation: &str) -> Result<AuthzToken> {
		let Some(acl) = self.rules.get(resource) else {
			debug!(manager = %self.name, resource, "no ACL for resource in external realm");
			return Err(AuthzError::access_denied(&self.name, resource, operation));
		};

		if acl.evaluate(token, operation, self.order) {
			Ok(AuthzToken::granted(&self.name, resource, operation))
		} else {
			Err(AuthzError::access_denied(&self.name, resource, operation))
		}
	}

	async fn acls(&self) -> Result<Vec<Acl>> {
		Ok(self.rules.iter().cloned().collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::token::ExternalPrincipal;
	use tessera_common_config::ConfigStore;

	fn init() -> ManagerInit {
		let root = ConfigStore::from_entries([
			("authz.instance.ext.realm", "corp"),
			(
				"authz.instance.ext.acl.0",
				"certServer.ca.certs:read,approve:allow (read) role=\"Auditors\";allow (approve) role=\"Agents\"",
			),
			("authz.instance.ext.acl.1", "not an acl"),
		]);
		ManagerInit {
			name: "ext".into(),
			config: root.substore("authz").substore("instance").substore("ext"),
			directory: None,
		}
	}

	#[tokio::test]
	async fn evaluates_roles_from_realm_claims() {
		let mgr = ExternalAuthz::factory(init()).unwrap();
		assert_eq!(mgr.realm(), Some("corp"));
		assert_eq!(mgr.acls().await.unwrap().len(), 1);

		let auditor = ExternalPrincipal::new("eve", "corp", ["Auditors"]).to_token();
		mgr.authorize(&auditor, "certServer.ca.certs", "read").await.unwrap();
		assert!(mgr
			.authorize(&auditor, "certServer.ca.certs", "approve")
			.await
			.unwrap_err()
			.is_denial());
	}

	#[tokio::test]
	async fn missing_acl_denies() {
		let mgr = ExternalAuthz::factory(init()).unwrap();
		let agent = ExternalPrincipal::new("ann", "corp", ["Agents"]).to_token();
		assert!(mgr
			.authorize(&agent, "certServer.ca.profiles", "read")
			.await
			.unwrap_err()
			.is_denial());
	}

	#[test]
	fn realm_is_required() {
		let init = ManagerInit {
			name: "ext".into(),
			config: ConfigStore::new(),
			directory: None,
		};
		assert!(matches!(
			ExternalAuthz::factory(init).err().unwrap(),
			AuthzError::Configuration(_)
		));
	}
}
