// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retries ACL write-backs that a manager deferred after a directory error.
//!
//! ```text
//! jobsScheduler.impl.AclFlushJob.class=org.tessera.jobs.AclFlushJob
//! jobsScheduler.job.aclFlush.pluginName=AclFlushJob
//! jobsScheduler.job.aclFlush.cron=*/5 * * * *
//! jobsScheduler.job.aclFlush.enabled=true
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tessera_server_authz::AuthzSubsystem;
use tessera_server_jobs::{Job, JobConfig, JobContext, JobError, JobOutput, JobPluginRegistry};
use tracing::{info, instrument};

pub const ACL_FLUSH_CLASS: &str = "AclFlushJob";

pub struct AclFlushJob {
	id: String,
	authz: Arc<AuthzSubsystem>,
}

impl AclFlushJob {
	pub fn new(id: impl Into<String>, authz: Arc<AuthzSubsystem>) -> Self {
		Self {
			id: id.into(),
			authz,
		}
	}

	/// Makes the job available to `jobsScheduler.impl.*.class` entries.
	pub fn register(registry: &mut JobPluginRegistry, authz: Arc<AuthzSubsystem>) {
		registry.register(ACL_FLUSH_CLASS, move |config: &JobConfig| {
			Ok(Arc::new(AclFlushJob::new(config.id.clone(), Arc::clone(&authz))) as Arc<dyn Job>)
		});
	}
}

#[async_trait]
impl Job for AclFlushJob {
	fn id(&self) -> &str {
		&self.id
	}

	fn description(&self) -> &str {
		"Write pending ACL changes back to the directory"
	}

	#[instrument(skip(self, ctx), fields(job_id = %self.id, run_id = %ctx.run_id))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		let report = self.authz.flush_pending().await.map_err(|e| JobError::Failed {
			message: e.to_string(),
			retryable: false,
		})?;

		if !report.is_clean() {
			let failed: Vec<String> = report
				.failed
				.iter()
				.map(|(manager, error)| format!("{manager}: {error}"))
				.collect();
			return Err(JobError::Failed {
				message: format!("ACL flush failed for {}", failed.join("; ")),
				retryable: true,
			});
		}

		if !report.flushed.is_empty() {
			info!(managers = ?report.flushed, "flushed pending ACL writes");
		}
		Ok(JobOutput {
			message: format!("{} manager(s) flushed", report.flushed.len()),
			metadata: Some(json!({ "flushed": report.flushed })),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tessera_server_jobs::TriggerSource;

	fn config(id: &str) -> JobConfig {
		JobConfig {
			id: id.to_string(),
			enabled: true,
			cron: None,
			plugin_name: ACL_FLUSH_CLASS.to_string(),
			owner: None,
			properties: Default::default(),
		}
	}

	#[tokio::test]
	async fn nothing_pending_is_a_clean_run() {
		let job = AclFlushJob::new("aclFlush", Arc::new(AuthzSubsystem::new()));
		let ctx = JobContext::new(TriggerSource::Manual, config("aclFlush"));
		let output = job.run(&ctx).await.unwrap();
		assert_eq!(output.message, "0 manager(s) flushed");
	}

	#[tokio::test]
	async fn fails_once_the_subsystem_is_shut_down() {
		let authz = Arc::new(AuthzSubsystem::new());
		authz.shutdown().await;
		let job = AclFlushJob::new("aclFlush", authz);
		let ctx = JobContext::new(TriggerSource::Schedule, config("aclFlush"));
		assert!(matches!(job.run(&ctx).await, Err(JobError::Failed { .. })));
	}

	#[test]
	fn registers_under_its_class_name() {
		let mut registry = JobPluginRegistry::new();
		AclFlushJob::register(&mut registry, Arc::new(AuthzSubsystem::new()));
		let job = registry
			.build("org.tessera.jobs.AclFlushJob", &config("nightly"))
			.unwrap();
		assert_eq!(job.id(), "nightly");
	}
}
