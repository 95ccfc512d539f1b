// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory-backed ACL manager.
//!
//! ACLs live in one multi-valued attribute (`resourceACLS`) of the entry
//! `cn=aclResources,<basedn>`. They are loaded on first use, kept in memory
//! and written back whole whenever an ACL is updated.
//!
//! State moves `Uninitialized -> Ready -> ShutDown` under a single lock; the
//! directory is searched at most once unless [`DirAclAuthz::invalidate`] is
//! called. A failed write-back keeps the in-memory change and marks the store
//! dirty so [`AuthzManager::flush_pending`] or shutdown can retry it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tessera_server_directory::{
	DirectoryEntry, DirectoryError, DirectoryStore, Modification, SearchFilter, SearchScope,
};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, instrument, warn};

use crate::acl::Acl;
use crate::error::{AuthzError, Result};
use crate::manager::{AclWriteOutcome, AuthzManager, ManagerInit};
use crate::rule_store::{EvaluationOrder, RuleStore};
use crate::token::{AuthToken, AuthzToken};

pub const ACL_RESOURCES_RDN: &str = "cn=aclResources";
pub const ACL_ATTRIBUTE: &str = "resourceACLS";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum ManagerState {
	Uninitialized,
	Ready(RuleStore),
	ShutDown,
}

impl ManagerState {
	fn rules(&self) -> Option<&RuleStore> {
		match self {
			ManagerState::Ready(rules) => Some(rules),
			_ => None,
		}
	}
}

pub struct DirAclAuthz {
	name: String,
	acl_dn: String,
	timeout: Duration,
	order: EvaluationOrder,
	directory: Arc<dyn DirectoryStore>,
	state: RwLock<ManagerState>,
	flush_lock: Mutex<()>,
	needs_flush: AtomicBool,
}

impl DirAclAuthz {
	pub fn new(name: impl Into<String>, base_dn: &str, directory: Arc<dyn DirectoryStore>) -> Self {
		Self {
			name: name.into(),
			acl_dn: format!("{ACL_RESOURCES_RDN},{base_dn}"),
			timeout: DEFAULT_TIMEOUT,
			order: EvaluationOrder::default(),
			directory,
			state: RwLock::new(ManagerState::Uninitialized),
			flush_lock: Mutex::new(()),
			needs_flush: AtomicBool::new(false),
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn with_order(mut self, order: EvaluationOrder) -> Self {
		self.order = order;
		self
	}

	/// Reads `basedn` (required), `timeout_ms` and `evaluateOrder`.
	pub fn factory(init: ManagerInit) -> Result<Arc<dyn AuthzManager>> {
		let directory = init.directory.clone().ok_or_else(|| {
			AuthzError::Configuration(format!("manager {} requires a directory store", init.name))
		})?;
		let base_dn = init.config.get_string("basedn")?;
		let timeout_ms = init
			.config
			.get_integer_or("timeout_ms", DEFAULT_TIMEOUT.as_millis() as i64)?;
		if timeout_ms <= 0 {
			return Err(AuthzError::Configuration(format!(
				"{}.timeout_ms must be positive",
				init.config.path()
			)));
		}
		let order = super::evaluation_order(&init.config)?;

		Ok(Arc::new(
			Self::new(init.name, base_dn.trim(), directory)
				.with_timeout(Duration::from_millis(timeout_ms as u64))
				.with_order(order),
		))
	}

	pub fn acl_dn(&self) -> &str {
		&self.acl_dn
	}

	pub fn needs_flush(&self) -> bool {
		self.needs_flush.load(Ordering::SeqCst)
	}

	/// Drops the loaded rules so the next call reloads them from the
	/// directory. Refused (returns `false`) while a write-back is pending,
	/// since reloading would discard the unsaved change.
	pub async fn invalidate(&self) -> bool {
		if self.needs_flush() {
			warn!(manager = %self.name, "not invalidating ACLs with a pending write-back");
			return false;
		}
		let mut state = self.state.write().await;
		if matches!(*state, ManagerState::Ready(_)) {
			*state = ManagerState::Uninitialized;
			debug!(manager = %self.name, "ACL cache invalidated");
		}
		true
	}

	/// Returns the loaded rules, loading them first if needed.
	async fn rules(&self) -> Result<RwLockReadGuard<'_, RuleStore>> {
		let guard = self.state.read().await;
		match RwLockReadGuard::try_map(guard, ManagerState::rules) {
			Ok(rules) => return Ok(rules),
			Err(guard) => {
				if matches!(*guard, ManagerState::ShutDown) {
					return Err(AuthzError::ShuttingDown);
				}
			}
		}

		let mut state = self.state.write().await;
		self.ensure_loaded(&mut state).await?;
		RwLockReadGuard::try_map(RwLockWriteGuard::downgrade(state), ManagerState::rules)
			.map_err(|_| AuthzError::ShuttingDown)
	}

	/// Second half of the double check, run under the write lock.
	async fn ensure_loaded(&self, state: &mut ManagerState) -> Result<()> {
		match *state {
			ManagerState::Ready(_) => Ok(()),
			ManagerState::ShutDown => Err(AuthzError::ShuttingDown),
			ManagerState::Uninitialized => {
				let rules = self.load().await?;
				*state = ManagerState::Ready(rules);
				Ok(())
			}
		}
	}

	#[instrument(skip(self), fields(manager = %self.name, dn = %self.acl_dn))]
	async fn load(&self) -> Result<RuleStore> {
		let entries = self
			.bounded(
				"search",
				self.directory
					.search(&self.acl_dn, SearchScope::Base, &SearchFilter::any()),
			)
			.await?;

		let values: Vec<String> = entries
			.iter()
			.filter_map(|e| e.get(ACL_ATTRIBUTE))
			.flatten()
			.cloned()
			.collect();

		if entries.is_empty() {
			warn!("ACL entry not found in directory, starting with no ACLs");
		}
		let rules = RuleStore::from_values(&values);
		info!(acls = rules.len(), values = values.len(), "loaded ACLs from directory");
		Ok(rules)
	}

	/// Overwrites the directory attribute with `values`, creating the entry
	/// when it does not exist yet.
	async fn write_back(&self, values: Vec<String>) -> Result<()> {
		let modification = [Modification::replace(ACL_ATTRIBUTE, values.clone())];
		match self
			.timed("modify", self.directory.modify(&self.acl_dn, &modification))
			.await?
		{
			Ok(()) => Ok(()),
			Err(DirectoryError::NoSuchEntry(_)) => {
				debug!(manager = %self.name, dn = %self.acl_dn, "creating ACL entry");
				let entry = DirectoryEntry::new(&self.acl_dn)
					.with_attribute("objectClass", ["top", "CertACLS"])
					.with_attribute("cn", ["aclResources"])
					.with_attribute(ACL_ATTRIBUTE, values);
				self.bounded("add", self.directory.add(entry)).await
			}
			Err(e) => Err(AuthzError::Internal(format!("directory modify failed: {e}"))),
		}
	}

	/// Runs a directory call under the configured timeout; only the timeout
	/// itself is mapped to an error here.
	async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<std::result::Result<T, DirectoryError>>
	where
		F: Future<Output = std::result::Result<T, DirectoryError>>,
	{
		tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
			AuthzError::Internal(format!(
				"directory {op} timed out after {}ms",
				self.timeout.as_millis()
			))
		})
	}

	async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
	where
		F: Future<Output = std::result::Result<T, DirectoryError>>,
	{
		self.timed(op, fut)
			.await?
			.map_err(|e| AuthzError::Internal(format!("directory {op} failed: {e}")))
	}

	/// Serializes the current rules and writes them back; caller holds the
	/// flush lock.
	async fn flush_locked(&self) -> Result<bool> {
		let values = {
			let state = self.state.read().await;
			match state.rules() {
				Some(rules) => rules.serialize(),
				None => return Ok(false),
			}
		};
		self.write_back(values).await?;
		self.needs_flush.store(false, Ordering::SeqCst);
		Ok(true)
	}
}

#[async_trait]
impl AuthzManager for DirAclAuthz {
	fn name(&self) -> &str {
		&self.name
	}

	#[instrument(skip(self, token), fields(manager = %self.name, user = token.user_id()))]
	async fn authorize(&self, token: &AuthToken, resource: &str, operation: &str) -> Result<AuthzToken> {
		let rules = self.rules().await?;
		let Some(acl) = rules.get(resource) else {
			// Kept permissive for compatibility with existing deployments.
			warn!("no ACL defined for resource, allowing");
			return Ok(AuthzToken::granted(&self.name, resource, operation));
		};

		if acl.evaluate(token, operation, self.order) {
			debug!("access granted");
			Ok(AuthzToken::granted(&self.name, resource, operation))
		} else {
			debug!("access denied");
			Err(AuthzError::access_denied(&self.name, resource, operation))
		}
	}

	#[instrument(skip(self, acl_string, description), fields(manager = %self.name))]
	async fn update_acls(
		&self,
		resource: &str,
		rights: &str,
		acl_string: &str,
		description: Option<&str>,
	) -> Result<AclWriteOutcome> {
		let acl = Acl::from_parts(resource, rights, acl_string, description)?;

		let _flush = self.flush_lock.lock().await;
		{
			let mut state = self.state.write().await;
			self.ensure_loaded(&mut state).await?;
			if let ManagerState::Ready(rules) = &mut *state {
				rules.insert(acl);
			}
		}
		self.needs_flush.store(true, Ordering::SeqCst);

		match self.flush_locked().await {
			Ok(_) => {
				info!("ACL updated and written to directory");
				Ok(AclWriteOutcome::Persisted)
			}
			Err(e) => {
				error!(error = %e, "ACL updated in memory; directory write deferred");
				Ok(AclWriteOutcome::Deferred)
			}
		}
	}

	async fn flush_pending(&self) -> Result<bool> {
		if !self.needs_flush() {
			return Ok(false);
		}
		let _flush = self.flush_lock.lock().await;
		if !self.needs_flush() {
			return Ok(false);
		}
		let flushed = self.flush_locked().await?;
		if flushed {
			info!(manager = %self.name, "pending ACL changes written to directory");
		}
		Ok(flushed)
	}

	async fn acls(&self) -> Result<Vec<Acl>> {
		Ok(self.rules().await?.iter().cloned().collect())
	}

	async fn shutdown(&self) {
		if let Err(e) = self.flush_pending().await {
			error!(manager = %self.name, error = %e, "ACL changes could not be written at shutdown and are lost");
		}
		*self.state.write().await = ManagerState::ShutDown;
		debug!(manager = %self.name, "shut down");
	}
}
