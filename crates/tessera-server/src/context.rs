// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide services, built once at startup and passed by reference.

use std::sync::Arc;

use tessera_common_config::ConfigStore;
use tessera_server_audit::{AuditFilterConfig, AuditService, AuditSeverity, AuditSink, FileAuditSink, TracingAuditSink};
use tessera_server_authz::{AuthzFilter, AuthzPluginRegistry, AuthzSubsystem};
use tessera_server_config::{AuditConfig, DirectoryConfig, ServerConfig};
use tessera_server_directory::{DirectoryStore, MemoryDirectory, SqliteDirectory};
use tessera_server_jobs::{JobPluginRegistry, JobsScheduler};
use tracing::{debug, info, instrument};

use crate::error::{Result, ServerError};
use crate::jobs::AclFlushJob;

const DIR_ACL_CLASS: &str = "DirAclAuthz";

pub struct ServerContext {
	pub config: ServerConfig,
	/// `CS.cfg`-style store shared by the authz subsystem and the scheduler.
	pub cs_config: ConfigStore,
	pub directory: Arc<dyn DirectoryStore>,
	pub audit: Arc<AuditService>,
	pub authz: Arc<AuthzSubsystem>,
	pub filter: Arc<AuthzFilter>,
	pub scheduler: Arc<JobsScheduler>,
}

impl ServerContext {
	/// Loads the subsystem configuration named by `paths.cs_config` and opens
	/// the configured directory.
	#[instrument(skip_all)]
	pub async fn build(config: ServerConfig) -> Result<Self> {
		let cs_config = ConfigStore::load(&config.paths.cs_config)?;
		let directory = open_directory(&config.directory).await?;
		Self::assemble(config, cs_config, directory, Vec::new())
	}

	/// Wires every service from already-loaded parts. `extra_sinks` receive
	/// audit entries in addition to the configured ones.
	pub fn assemble(
		config: ServerConfig,
		cs_config: ConfigStore,
		directory: Arc<dyn DirectoryStore>,
		extra_sinks: Vec<Arc<dyn AuditSink>>,
	) -> Result<Self> {
		apply_directory_defaults(&cs_config, &config.directory);

		let audit = Arc::new(build_audit(&config.audit, extra_sinks)?);

		let authz = Arc::new(
			AuthzSubsystem::init(
				&cs_config,
				&AuthzPluginRegistry::with_builtins(),
				Some(Arc::clone(&directory)),
			)
			.with_audit(Arc::clone(&audit)),
		);

		let filter = Arc::new(
			AuthzFilter::new(
				Arc::clone(&authz),
				Arc::clone(&audit),
				config.paths.acl_mapping_default.clone(),
				config.paths.acl_mapping_override.clone(),
			)
			.configure(&cs_config),
		);

		let mut jobs = JobPluginRegistry::new();
		AclFlushJob::register(&mut jobs, Arc::clone(&authz));
		let scheduler = Arc::new(JobsScheduler::init(&cs_config, &jobs)?);

		info!(
			managers = ?authz.manager_names(),
			default_manager = filter.default_manager(),
			"server context ready"
		);

		Ok(Self {
			config,
			cs_config,
			directory,
			audit,
			authz,
			filter,
			scheduler,
		})
	}

	pub async fn start(&self) -> Result<()> {
		self.scheduler.start().await?;
		Ok(())
	}

	/// Stops scheduling, then lets the authz managers flush pending writes.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		self.scheduler.shutdown().await;
		self.authz.shutdown().await;
		info!("server context shut down");
	}
}

pub async fn open_directory(config: &DirectoryConfig) -> Result<Arc<dyn DirectoryStore>> {
	if config.is_memory() {
		debug!("using in-memory directory");
		return Ok(Arc::new(MemoryDirectory::new()));
	}
	let directory = SqliteDirectory::connect(&config.url, config.max_connections).await?;
	Ok(Arc::new(directory))
}

fn build_audit(config: &AuditConfig, extra_sinks: Vec<Arc<dyn AuditSink>>) -> Result<AuditService> {
	let min_severity: AuditSeverity = config
		.min_severity
		.parse()
		.map_err(|message| ServerError::InvalidSetting {
			key: "audit.min_severity",
			message,
		})?;
	let filter = AuditFilterConfig::with_min_severity(min_severity);

	let mut sinks = extra_sinks;
	if config.enabled {
		sinks.push(Arc::new(TracingAuditSink::new(filter.clone())));
		if let Some(path) = &config.file_path {
			sinks.push(Arc::new(FileAuditSink::new(path.clone(), filter.clone())));
		}
	}

	Ok(AuditService::new(
		filter,
		config.queue_capacity,
		config.queue_overflow_policy,
		sinks,
	))
}

/// Fills `basedn` and `timeout_ms` of directory-backed authz instances from
/// the server's directory settings when the instance leaves them out.
fn apply_directory_defaults(cs_config: &ConfigStore, directory: &DirectoryConfig) {
	let impls = cs_config.substore("authz").substore("impl");
	let instances = cs_config.substore("authz").substore("instance");

	for name in instances.substore_names() {
		let instance = instances.substore(&name);
		let Some(plugin) = instance.get("pluginName") else {
			continue;
		};
		let class = impls.substore(&plugin).get("class").unwrap_or(plugin);
		if class.rsplit('.').next() != Some(DIR_ACL_CLASS) {
			continue;
		}
		if !instance.contains("basedn") {
			instance.put_string("basedn", directory.base_dn.clone());
		}
		if !instance.contains("timeout_ms") {
			instance.put_integer("timeout_ms", directory.timeout_ms as i64);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn directory_defaults_only_touch_dir_acl_instances() {
		let store = ConfigStore::parse(
			r#"
authz.impl.DirAclAuthz.class=com.netscape.cms.authorization.DirAclAuthz
authz.impl.BasicGroupAuthz.class=com.netscape.cms.authorization.BasicGroupAuthz
authz.instance.acl.pluginName=DirAclAuthz
authz.instance.pinned.pluginName=DirAclAuthz
authz.instance.pinned.basedn=o=elsewhere
authz.instance.group.pluginName=BasicGroupAuthz
"#,
		);
		let directory = DirectoryConfig {
			url: "memory:".to_string(),
			base_dn: "o=tessera".to_string(),
			timeout_ms: 750,
			max_connections: 1,
		};
		apply_directory_defaults(&store, &directory);

		assert_eq!(store.get("authz.instance.acl.basedn").as_deref(), Some("o=tessera"));
		assert_eq!(store.get("authz.instance.acl.timeout_ms").as_deref(), Some("750"));
		assert_eq!(store.get("authz.instance.pinned.basedn").as_deref(), Some("o=elsewhere"));
		assert!(store.get("authz.instance.group.basedn").is_none());
	}

	#[tokio::test]
	async fn rejects_unknown_audit_severity() {
		let config = AuditConfig {
			min_severity: "loud".to_string(),
			..Default::default()
		};
		assert!(matches!(
			build_audit(&config, Vec::new()),
			Err(ServerError::InvalidSetting { key: "audit.min_severity", .. })
		));
	}
}
