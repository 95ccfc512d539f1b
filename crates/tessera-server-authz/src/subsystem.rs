// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registry of named authorization manager instances.
//!
//! Built once from configuration:
//!
//! ```text
//! authz.impl.DirAclAuthz.class=com.netscape.cms.authorization.DirAclAuthz
//! authz.instance.DirAclAuthz.pluginName=DirAclAuthz
//! authz.instance.DirAclAuthz.basedn=o=tessera
//! authz.instance.DirAclAuthz.enable=true
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tessera_common_config::ConfigStore;
use tessera_server_audit::{AuditEventType, AuditLogEntry, AuditService};
use tessera_server_directory::DirectoryStore;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{AuthzError, Result};
use crate::manager::{AclWriteOutcome, AuthzManager, AuthzPluginRegistry, ManagerInit, ManagerSlot};
use crate::token::{AuthToken, AuthzToken};

/// Result of [`AuthzSubsystem::flush_pending`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
	pub flushed: Vec<String>,
	pub failed: Vec<(String, String)>,
}

impl FlushReport {
	pub fn is_clean(&self) -> bool {
		self.failed.is_empty()
	}
}

pub struct AuthzSubsystem {
	managers: BTreeMap<String, ManagerSlot>,
	audit: Option<Arc<AuditService>>,
	shutting_down: AtomicBool,
}

impl AuthzSubsystem {
	pub fn new() -> Self {
		Self {
			managers: BTreeMap::new(),
			audit: None,
			shutting_down: AtomicBool::new(false),
		}
	}

	pub fn with_audit(mut self, audit: Arc<AuditService>) -> Self {
		self.audit = Some(audit);
		self
	}

	pub fn register(&mut self, name: impl Into<String>, slot: ManagerSlot) {
		self.managers.insert(name.into(), slot);
	}

	/// Builds every configured instance. Instances that fail to build are
	/// logged and left out; the rest of the subsystem still starts.
	#[instrument(skip_all)]
	pub fn init(
		config: &ConfigStore,
		registry: &AuthzPluginRegistry,
		directory: Option<Arc<dyn DirectoryStore>>,
	) -> Self {
		let authz = config.substore("authz");
		let impls = authz.substore("impl");
		let instances = authz.substore("instance");
		let mut subsystem = Self::new();

		for name in instances.substore_names() {
			let instance = instances.substore(&name);
			match build_slot(&name, &instance, &impls, registry, directory.clone()) {
				Ok(slot) => {
					match &slot {
						ManagerSlot::Active(_) => info!(manager = %name, "authorization manager started"),
						ManagerSlot::Disabled => info!(manager = %name, "authorization manager disabled"),
					}
					subsystem.register(name, slot);
				}
				Err(e) => error!(manager = %name, error = %e, "failed to start authorization manager"),
			}
		}

		subsystem
	}

	pub fn manager_names(&self) -> Vec<String> {
		self.managers.keys().cloned().collect()
	}

	/// Active manager by instance name; disabled and unknown names both
	/// yield `ManagerNotFound`.
	pub fn manager(&self, name: &str) -> Result<Arc<dyn AuthzManager>> {
		self.managers
			.get(name)
			.and_then(ManagerSlot::active)
			.cloned()
			.ok_or_else(|| AuthzError::ManagerNotFound(name.to_string()))
	}

	pub fn manager_for_realm(&self, realm: &str) -> Result<Arc<dyn AuthzManager>> {
		self.ensure_running()?;
		self.managers
			.values()
			.filter_map(ManagerSlot::active)
			.find(|m| m.realm() == Some(realm))
			.cloned()
			.ok_or_else(|| AuthzError::UnknownRealm(realm.to_string()))
	}

	#[instrument(skip(self, token), fields(user = token.user_id()))]
	pub async fn authorize(
		&self,
		manager: &str,
		token: &AuthToken,
		resource: &str,
		operation: &str,
	) -> Result<AuthzToken> {
		self.ensure_running()?;
		self.manager(manager)?.authorize(token, resource, operation).await
	}

	#[instrument(skip(self, token), fields(user = token.user_id()))]
	pub async fn authorize_expression(
		&self,
		manager: &str,
		token: &AuthToken,
		expression: &str,
	) -> Result<AuthzToken> {
		self.ensure_running()?;
		self.manager(manager)?
			.authorize_expression(token, expression)
			.await
	}

	/// Replaces the ACL for `resource` on `manager` and records the change.
	#[instrument(skip(self, acl_string, description))]
	pub async fn update_acls(
		&self,
		manager: &str,
		resource: &str,
		rights: &str,
		acl_string: &str,
		description: Option<&str>,
	) -> Result<AclWriteOutcome> {
		self.ensure_running()?;
		let outcome = self
			.manager(manager)?
			.update_acls(resource, rights, acl_string, description)
			.await?;

		self.audit(
			AuditLogEntry::builder(AuditEventType::AclUpdated)
				.resource(resource)
				.details(json!({ "manager": manager, "rights": rights }))
				.build(),
		)
		.await;
		if outcome == AclWriteOutcome::Deferred {
			self.audit(
				AuditLogEntry::builder(AuditEventType::AclWriteDeferred)
					.resource(resource)
					.details(json!({ "manager": manager }))
					.build(),
			)
			.await;
		}

		Ok(outcome)
	}

	/// Retries pending ACL write-backs on every active manager.
	pub async fn flush_pending(&self) -> Result<FlushReport> {
		self.ensure_running()?;
		let mut report = FlushReport::default();

		for (name, manager) in self.active() {
			match manager.flush_pending().await {
				Ok(true) => {
					self.audit(
						AuditLogEntry::builder(AuditEventType::AclFlushed)
							.details(json!({ "manager": name }))
							.build(),
					)
					.await;
					report.flushed.push(name.clone());
				}
				Ok(false) => {}
				Err(e) => {
					warn!(manager = %name, error = %e, "pending ACL flush failed");
					report.failed.push((name.clone(), e.to_string()));
				}
			}
		}

		Ok(report)
	}

	/// Shuts every manager down once; later calls on the subsystem fail with
	/// `ShuttingDown`.
	pub async fn shutdown(&self) {
		if self.shutting_down.swap(true, Ordering::SeqCst) {
			debug!("authorization subsystem already shut down");
			return;
		}
		for (name, manager) in self.active() {
			debug!(manager = %name, "shutting down authorization manager");
			manager.shutdown().await;
		}
		info!("authorization subsystem shut down");
	}

	pub fn is_shut_down(&self) -> bool {
		self.shutting_down.load(Ordering::SeqCst)
	}

	fn active(&self) -> impl Iterator<Item = (&String, &Arc<dyn AuthzManager>)> {
		self.managers
			.iter()
			.filter_map(|(name, slot)| slot.active().map(|m| (name, m)))
	}

	fn ensure_running(&self) -> Result<()> {
		if self.is_shut_down() {
			Err(AuthzError::ShuttingDown)
		} else {
			Ok(())
		}
	}

	async fn audit(&self, entry: AuditLogEntry) {
		if let Some(audit) = &self.audit {
			if let Err(e) = audit.log(entry).await {
				warn!(error = %e, "failed to queue audit entry");
			}
		}
	}
}

impl Default for AuthzSubsystem {
	fn default() -> Self {
		Self::new()
	}
}

fn build_slot(
	name: &str,
	instance: &ConfigStore,
	impls: &ConfigStore,
	registry: &AuthzPluginRegistry,
	directory: Option<Arc<dyn DirectoryStore>>,
) -> Result<ManagerSlot> {
	let plugin = instance.get_string("pluginName")?;
	if !instance.get_bool_or("enable", true)? {
		return Ok(ManagerSlot::Disabled);
	}
	let class = impls
		.substore(&plugin)
		.get_string("class")
		.map_err(|_| AuthzError::Configuration(format!("no authz.impl.{plugin}.class for instance {name}")))?;

	let manager = registry.build(
		&class,
		ManagerInit {
			name: name.to_string(),
			config: instance.clone(),
			directory,
		},
	)?;
	Ok(ManagerSlot::Active(manager))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::managers::BasicGroupAuthz;

	fn config() -> ConfigStore {
		ConfigStore::parse(
			r#"
authz.impl.BasicGroupAuthz.class=com.netscape.cms.authorization.BasicGroupAuthz
authz.impl.ExternalAuthz.class=org.tessera.ExternalAuthz
authz.instance.admins.pluginName=BasicGroupAuthz
authz.instance.admins.group=Administrators
authz.instance.off.pluginName=BasicGroupAuthz
authz.instance.off.group=Administrators
authz.instance.off.enable=false
authz.instance.broken.pluginName=BasicGroupAuthz
authz.instance.orphan.pluginName=LdapAuthz
authz.instance.corp.pluginName=ExternalAuthz
authz.instance.corp.realm=corp
"#,
		)
	}

	fn subsystem() -> AuthzSubsystem {
		AuthzSubsystem::init(&config(), &AuthzPluginRegistry::with_builtins(), None)
	}

	#[test]
	fn init_skips_failing_instances() {
		let subsystem = subsystem();
		assert_eq!(subsystem.manager_names(), vec!["admins", "corp", "off"]);
	}

	#[tokio::test]
	async fn disabled_and_unknown_names_are_not_found() {
		let subsystem = subsystem();
		let token = AuthToken::new("root", "m").with_groups(["Administrators"]);

		subsystem.authorize("admins", &token, "certs", "read").await.unwrap();
		for name in ["off", "broken", "nope"] {
			let err = subsystem.authorize(name, &token, "certs", "read").await.unwrap_err();
			assert!(matches!(err, AuthzError::ManagerNotFound(n) if n == name));
		}
	}

	#[test]
	fn realm_lookup() {
		let subsystem = subsystem();
		assert_eq!(subsystem.manager_for_realm("corp").unwrap().name(), "corp");
		assert!(matches!(
			subsystem.manager_for_realm("other"),
			Err(AuthzError::UnknownRealm(_))
		));
	}

	#[tokio::test]
	async fn expression_dispatch() {
		let mut subsystem = AuthzSubsystem::new();
		subsystem.register(
			"basic",
			ManagerSlot::Active(Arc::new(BasicGroupAuthz::new("basic", "Administrators"))),
		);
		let token = AuthToken::new("admin", "m");
		subsystem
			.authorize_expression("basic", &token, "user=\"admin\"")
			.await
			.unwrap();
		assert!(subsystem
			.authorize_expression("basic", &token, "user=\"other\"")
			.await
			.unwrap_err()
			.is_denial());
	}

	#[tokio::test]
	async fn calls_fail_after_shutdown() {
		let subsystem = subsystem();
		subsystem.shutdown().await;
		subsystem.shutdown().await;
		let token = AuthToken::new("root", "m").with_groups(["Administrators"]);
		assert!(matches!(
			subsystem.authorize("admins", &token, "certs", "read").await,
			Err(AuthzError::ShuttingDown)
		));
		assert!(matches!(subsystem.flush_pending().await, Err(AuthzError::ShuttingDown)));
	}
}
