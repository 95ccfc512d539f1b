// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authorization manager contract and the plugin registry that builds
//! managers from configured class names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tessera_common_config::ConfigStore;
use tessera_server_directory::DirectoryStore;

use crate::acl::Acl;
use crate::error::{AuthzError, Result};
use crate::expression::Expression;
use crate::token::{AuthToken, AuthzToken};

/// Where an accepted ACL update ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclWriteOutcome {
	/// Applied in memory and written to the directory.
	Persisted,
	/// Applied in memory; the directory write failed and is pending a flush.
	Deferred,
}

/// A named evaluator answering "may this subject do this operation on this
/// resource?".
#[async_trait]
pub trait AuthzManager: Send + Sync {
	fn name(&self) -> &str;

	/// Realm served by managers that authorize externally authenticated
	/// principals.
	fn realm(&self) -> Option<&str> {
		None
	}

	async fn authorize(&self, token: &AuthToken, resource: &str, operation: &str) -> Result<AuthzToken>;

	async fn authorize_expression(&self, token: &AuthToken, expression: &str) -> Result<AuthzToken> {
		evaluate_expression(self.name(), token, expression)
	}

	async fn update_acls(
		&self,
		resource: &str,
		_rights: &str,
		_acl_string: &str,
		_description: Option<&str>,
	) -> Result<AclWriteOutcome> {
		Err(AuthzError::Internal(format!(
			"manager {} does not support ACL updates (resource {resource})",
			self.name()
		)))
	}

	/// Retries pending ACL writes; `Ok(true)` when something was written.
	async fn flush_pending(&self) -> Result<bool> {
		Ok(false)
	}

	async fn acls(&self) -> Result<Vec<Acl>> {
		Ok(Vec::new())
	}

	async fn shutdown(&self) {}
}

/// Shared `authorize_expression` behaviour: parse, evaluate, grant or deny.
pub fn evaluate_expression(manager: &str, token: &AuthToken, expression: &str) -> Result<AuthzToken> {
	let parsed = Expression::parse(expression)?;
	if parsed.evaluate(token) {
		Ok(AuthzToken::granted(manager, expression, "evaluate"))
	} else {
		Err(AuthzError::access_denied(manager, expression, "evaluate"))
	}
}

/// A registered manager instance. Disabled instances are indistinguishable
/// from unregistered names to callers.
#[derive(Clone)]
pub enum ManagerSlot {
	Active(Arc<dyn AuthzManager>),
	Disabled,
}

impl ManagerSlot {
	pub fn active(&self) -> Option<&Arc<dyn AuthzManager>> {
		match self {
			ManagerSlot::Active(manager) => Some(manager),
			ManagerSlot::Disabled => None,
		}
	}
}

impl fmt::Debug for ManagerSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ManagerSlot::Active(m) => f.debug_tuple("Active").field(&m.name()).finish(),
			ManagerSlot::Disabled => f.write_str("Disabled"),
		}
	}
}

/// Everything a factory gets to build one manager instance.
#[derive(Clone)]
pub struct ManagerInit {
	pub name: String,
	/// The instance's own substore (`authz.instance.<name>`).
	pub config: ConfigStore,
	pub directory: Option<Arc<dyn DirectoryStore>>,
}

pub type ManagerFactory = fn(ManagerInit) -> Result<Arc<dyn AuthzManager>>;

/// Maps plugin class names to manager factories.
///
/// Lookup uses the last dot-separated segment, so
/// `com.netscape.cms.authorization.DirAclAuthz` and `DirAclAuthz` resolve to
/// the same factory.
#[derive(Clone, Default)]
pub struct AuthzPluginRegistry {
	factories: HashMap<String, ManagerFactory>,
}

impl AuthzPluginRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_builtins() -> Self {
		let mut registry = Self::new();
		registry.register("DirAclAuthz", crate::managers::dir_acl::DirAclAuthz::factory);
		registry.register("BasicGroupAuthz", crate::managers::basic_group::BasicGroupAuthz::factory);
		registry.register("ExternalAuthz", crate::managers::external::ExternalAuthz::factory);
		registry
	}

	pub fn register(&mut self, class: &str, factory: ManagerFactory) {
		self.factories.insert(short_name(class).to_string(), factory);
	}

	pub fn contains(&self, class: &str) -> bool {
		self.factories.contains_key(short_name(class))
	}

	pub fn build(&self, class: &str, init: ManagerInit) -> Result<Arc<dyn AuthzManager>> {
		let factory = self
			.factories
			.get(short_name(class))
			.ok_or_else(|| AuthzError::Configuration(format!("unknown authorization plugin class: {class}")))?;
		factory(init)
	}
}

fn short_name(class: &str) -> &str {
	class.rsplit('.').next().unwrap_or(class)
}
