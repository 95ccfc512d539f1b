// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduler behaviour driven through explicit ticks and the polling loop.
//!
//! Tests cover:
//! - A job is never started while its previous run is live
//! - Cron specs are evaluated in the configured time zone
//! - Cron specs are fixed at registration
//! - Disabled and misconfigured jobs are skipped for one tick only
//! - Manual triggers honour single-flight
//! - The polling loop ticks on its own and stops once disabled
//! - Shutdown clears the registry without aborting runs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tessera_common_config::ConfigStore;
use tessera_server_jobs::{
	HealthState, Job, JobConfig, JobContext, JobError, JobOutput, JobPluginRegistry, JobsScheduler,
	TriggerSource,
};
use tokio::sync::Semaphore;

const WAIT: Duration = Duration::from_secs(2);
/// Upper bound on virtual time for tests that run the polling loop.
const LOOP_WAIT: Duration = Duration::from_secs(600);

const CS_CFG: &str = r#"
jobsScheduler.enabled=true
jobsScheduler.interval=1
jobsScheduler.impl.GatedJob.class=org.tessera.test.GatedJob
jobsScheduler.impl.FailingJob.class=org.tessera.test.FailingJob
jobsScheduler.job.gated.pluginName=GatedJob
jobsScheduler.job.gated.cron=* * * * *
jobsScheduler.job.gated.enabled=true
jobsScheduler.job.weekly.pluginName=GatedJob
jobsScheduler.job.weekly.cron=0 7 * * tue
jobsScheduler.job.weekly.enabled=true
jobsScheduler.job.idle.pluginName=GatedJob
jobsScheduler.job.idle.cron=* * * * *
jobsScheduler.job.idle.enabled=false
"#;

/// Blocks in `run` until a permit is released.
struct GatedJob {
	id: String,
	gate: Arc<Semaphore>,
	started: AtomicUsize,
	completed: AtomicBool,
}

impl GatedJob {
	fn new(id: &str, gate: Arc<Semaphore>) -> Self {
		Self {
			id: id.to_string(),
			gate,
			started: AtomicUsize::new(0),
			completed: AtomicBool::new(false),
		}
	}

	fn started(&self) -> usize {
		self.started.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Job for GatedJob {
	fn id(&self) -> &str {
		&self.id
	}

	fn description(&self) -> &str {
		"waits for a permit"
	}

	async fn run(&self, _ctx: &JobContext) -> Result<JobOutput, JobError> {
		self.started.fetch_add(1, Ordering::SeqCst);
		let permit = self
			.gate
			.acquire()
			.await
			.map_err(|e| JobError::failed(e.to_string()))?;
		permit.forget();
		self.completed.store(true, Ordering::SeqCst);
		Ok(JobOutput::message("released"))
	}
}

struct FailingJob {
	id: String,
}

#[async_trait]
impl Job for FailingJob {
	fn id(&self) -> &str {
		&self.id
	}

	fn description(&self) -> &str {
		"always fails"
	}

	async fn run(&self, _ctx: &JobContext) -> Result<JobOutput, JobError> {
		Err(JobError::failed("boom"))
	}
}

struct Harness {
	config: ConfigStore,
	gate: Arc<Semaphore>,
	jobs: Arc<std::sync::Mutex<Vec<Arc<GatedJob>>>>,
	scheduler: Arc<JobsScheduler>,
}

impl Harness {
	fn new(cfg: &str) -> Self {
		let config = ConfigStore::parse(cfg);
		let gate = Arc::new(Semaphore::new(0));
		let jobs: Arc<std::sync::Mutex<Vec<Arc<GatedJob>>>> = Arc::default();

		let mut registry = JobPluginRegistry::new();
		{
			let gate = gate.clone();
			let jobs = jobs.clone();
			registry.register("GatedJob", move |cfg: &JobConfig| {
				let job = Arc::new(GatedJob::new(&cfg.id, gate.clone()));
				jobs.lock().unwrap().push(job.clone());
				Ok(job as Arc<dyn Job>)
			});
		}
		registry.register("FailingJob", |cfg: &JobConfig| {
			Ok(Arc::new(FailingJob { id: cfg.id.clone() }) as Arc<dyn Job>)
		});

		let scheduler = Arc::new(JobsScheduler::init(&config, &registry).unwrap());
		Self {
			config,
			gate,
			jobs,
			scheduler,
		}
	}

	fn job(&self, id: &str) -> Arc<GatedJob> {
		self.jobs
			.lock()
			.unwrap()
			.iter()
			.find(|j| j.id == id)
			.cloned()
			.unwrap()
	}

	async fn wait_idle(&self, id: &str) {
		tokio::time::timeout(WAIT, async {
			loop {
				let health = self.scheduler.health().await;
				if !health.job(id).unwrap().running {
					return;
				}
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.unwrap();
	}
}

async fn wait_until(cond: impl Fn() -> bool) {
	wait_until_within(WAIT, cond).await;
}

async fn wait_until_within(limit: Duration, cond: impl Fn() -> bool) {
	tokio::time::timeout(limit, async {
		while !cond() {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap();
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
	Utc.with_ymd_and_hms(y, mo, d, h, mi, 1).unwrap()
}

// 2026-10-20 is a Tuesday.
fn tuesday_seven() -> DateTime<Utc> {
	utc(2026, 10, 20, 7, 0)
}

#[tokio::test]
async fn init_registers_configured_jobs_in_id_order() {
	let h = Harness::new(CS_CFG);
	assert_eq!(h.scheduler.job_ids().await, vec!["gated", "idle", "weekly"]);
	assert!(h.scheduler.settings().enabled);
}

#[tokio::test]
async fn init_skips_unbuildable_jobs() {
	let cfg = format!(
		"{CS_CFG}
jobsScheduler.job.ghost.pluginName=NoSuchPlugin
jobsScheduler.job.ghost.enabled=true
jobsScheduler.job.typo.pluginName=GatedJob
jobsScheduler.job.typo.cron=61 * * * *
"
	);
	let h = Harness::new(&cfg);
	let ids = h.scheduler.job_ids().await;
	assert!(!ids.contains(&"ghost".to_string()));
	assert!(!ids.contains(&"typo".to_string()));
	assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn running_job_is_not_started_twice() {
	let h = Harness::new(CS_CFG);
	let now = utc(2026, 10, 19, 12, 30);

	let first = h.scheduler.tick(now).await;
	assert_eq!(first.started, vec!["gated"]);
	let gated = h.job("gated");
	wait_until(|| gated.started() == 1).await;

	let second = h.scheduler.tick(now + chrono::Duration::minutes(1)).await;
	assert!(second.started.is_empty());
	assert_eq!(second.still_running, vec!["gated"]);
	assert_eq!(gated.started(), 1);

	let health = h.scheduler.health().await;
	let status = health.job("gated").unwrap();
	assert!(status.running);
	assert_eq!(status.runs, 1);
	assert_eq!(status.skipped_ticks, 1);

	h.gate.add_permits(1);
	h.wait_idle("gated").await;

	let third = h.scheduler.tick(now + chrono::Duration::minutes(2)).await;
	assert_eq!(third.started, vec!["gated"]);
	wait_until(|| gated.started() == 2).await;
	h.gate.add_permits(1);
}

#[tokio::test]
async fn disabled_job_is_never_started() {
	let h = Harness::new(CS_CFG);
	let report = h.scheduler.tick(utc(2026, 10, 19, 9, 15)).await;
	assert!(!report.started.contains(&"idle".to_string()));
	assert!(report.errors.is_empty());

	h.config.put_bool("jobsScheduler.job.idle.enabled", true);
	let report = h.scheduler.tick(utc(2026, 10, 19, 9, 16)).await;
	assert!(report.started.contains(&"idle".to_string()));
	h.gate.add_permits(2);
}

#[tokio::test]
async fn weekly_job_fires_only_on_its_minute() {
	let h = Harness::new(CS_CFG);

	let report = h.scheduler.tick(tuesday_seven()).await;
	assert!(report.started.contains(&"weekly".to_string()));
	h.gate.add_permits(2);
	h.wait_idle("weekly").await;
	h.wait_idle("gated").await;

	for miss in [
		utc(2026, 10, 20, 7, 1),
		utc(2026, 10, 21, 7, 0),
		utc(2026, 10, 19, 7, 0),
	] {
		let report = h.scheduler.tick(miss).await;
		assert!(!report.started.contains(&"weekly".to_string()), "{miss}");
		h.gate.add_permits(1);
		h.wait_idle("gated").await;
	}
}

#[tokio::test]
async fn cron_is_evaluated_in_the_configured_zone() {
	let cfg = CS_CFG.replace(
		"jobsScheduler.interval=1",
		"jobsScheduler.interval=1\njobsScheduler.timeZone=America/New_York",
	);
	let h = Harness::new(&cfg);

	// 07:00 in New York is 11:00 UTC while daylight saving time is in effect.
	let report = h.scheduler.tick(tuesday_seven()).await;
	assert!(!report.started.contains(&"weekly".to_string()));

	let report = h.scheduler.tick(utc(2026, 10, 20, 11, 0)).await;
	assert!(report.started.contains(&"weekly".to_string()));
	h.gate.add_permits(3);
}

#[tokio::test]
async fn unreadable_enabled_flag_skips_only_that_job_for_one_tick() {
	let h = Harness::new(CS_CFG);
	h.config.put_string("jobsScheduler.job.weekly.enabled", "maybe");

	let report = h.scheduler.tick(tuesday_seven()).await;
	assert_eq!(report.errors.len(), 1);
	assert_eq!(report.errors[0].0, "weekly");
	assert!(report.errors[0].1.contains("maybe"));
	assert_eq!(report.started, vec!["gated"]);
	h.gate.add_permits(1);
	h.wait_idle("gated").await;

	h.config.put_bool("jobsScheduler.job.weekly.enabled", true);
	let report = h.scheduler.tick(tuesday_seven()).await;
	assert!(report.errors.is_empty());
	assert!(report.started.contains(&"weekly".to_string()));
	h.gate.add_permits(2);
}

#[tokio::test]
async fn cron_edits_after_registration_are_ignored() {
	let h = Harness::new(CS_CFG);
	h.config.put_string("jobsScheduler.job.weekly.cron", "0 8 * * tue");

	let report = h.scheduler.tick(tuesday_seven()).await;
	assert!(report.started.contains(&"weekly".to_string()));
	h.gate.add_permits(2);
	h.wait_idle("weekly").await;
	h.wait_idle("gated").await;

	let report = h.scheduler.tick(utc(2026, 10, 20, 8, 0)).await;
	assert!(!report.started.contains(&"weekly".to_string()));
	assert!(report.errors.is_empty());
	h.gate.add_permits(1);
	h.wait_idle("gated").await;

	// An unparseable edit is not even looked at.
	h.config.put_string("jobsScheduler.job.weekly.cron", "0 7 * * someday");
	let report = h.scheduler.tick(utc(2026, 10, 27, 7, 0)).await;
	assert!(report.errors.is_empty());
	assert!(report.started.contains(&"weekly".to_string()));
	h.gate.add_permits(2);
}

#[tokio::test]
async fn register_rejects_invalid_cron() {
	let h = Harness::new(CS_CFG);
	h.config.put_string("jobsScheduler.job.late.pluginName", "GatedJob");
	h.config.put_string("jobsScheduler.job.late.cron", "0 25 * * *");
	h.config.put_bool("jobsScheduler.job.late.enabled", true);
	let late = Arc::new(GatedJob::new("late", h.gate.clone()));

	assert!(matches!(
		h.scheduler.register(late.clone()).await,
		Err(JobError::InvalidCron { .. })
	));
	assert!(!h.scheduler.job_ids().await.contains(&"late".to_string()));

	h.config.put_string("jobsScheduler.job.late.cron", "30 9 * * *");
	h.scheduler.register(late.clone()).await.unwrap();
	let report = h.scheduler.tick(utc(2026, 10, 19, 9, 30)).await;
	assert!(report.started.contains(&"late".to_string()));
	wait_until(|| late.started() == 1).await;
	h.gate.add_permits(2);
}

#[tokio::test]
async fn manual_trigger_honours_single_flight() {
	let h = Harness::new(CS_CFG);

	assert!(matches!(
		h.scheduler.trigger_job("nope").await,
		Err(JobError::NotFound(id)) if id == "nope"
	));

	let run_id = h.scheduler.trigger_job("weekly").await.unwrap();
	assert!(matches!(
		h.scheduler.trigger_job("weekly").await,
		Err(JobError::AlreadyRunning(_))
	));

	let health = h.scheduler.health().await;
	let last = health.job("weekly").unwrap().last_run.clone().unwrap();
	assert_eq!(last.run_id, run_id);
	assert_eq!(last.triggered_by, TriggerSource::Manual);

	// Scheduled ticks see the manual run too.
	let report = h.scheduler.tick(tuesday_seven()).await;
	assert!(report.still_running.contains(&"weekly".to_string()));
	h.gate.add_permits(2);
}

#[tokio::test]
async fn repeated_failures_degrade_health() {
	let cfg = format!(
		"{CS_CFG}
jobsScheduler.job.flaky.pluginName=FailingJob
jobsScheduler.job.flaky.enabled=true
"
	);
	let h = Harness::new(&cfg);

	for expected in 1..=3u32 {
		h.scheduler.trigger_job("flaky").await.unwrap();
		h.wait_idle("flaky").await;
		let health = h.scheduler.health().await;
		let flaky = health.job("flaky").unwrap();
		assert_eq!(flaky.consecutive_failures, expected);
		assert_eq!(flaky.last_run.as_ref().unwrap().error.as_deref(), Some("Job failed: boom"));
	}

	let health = h.scheduler.health().await;
	assert_eq!(health.job("flaky").unwrap().status, HealthState::Unhealthy);
	assert_eq!(health.status, HealthState::Unhealthy);
}

#[tokio::test]
async fn shutdown_clears_jobs_without_aborting_runs() {
	let h = Harness::new(CS_CFG);
	h.scheduler.start().await.unwrap();
	h.scheduler.trigger_job("gated").await.unwrap();
	let gated = h.job("gated");
	wait_until(|| gated.started() == 1).await;

	h.scheduler.shutdown().await;
	assert!(h.scheduler.is_shut_down());
	assert!(h.scheduler.job_ids().await.is_empty());
	assert!(matches!(
		h.scheduler.trigger_job("gated").await,
		Err(JobError::ShutDown)
	));
	assert!(h.scheduler.tick(tuesday_seven()).await.started.is_empty());

	h.gate.add_permits(1);
	wait_until(|| gated.completed.load(Ordering::SeqCst)).await;

	// Idempotent.
	h.scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn polling_loop_ticks_and_stops_once_disabled() {
	let h = Harness::new(CS_CFG);
	h.scheduler.start().await.unwrap();
	assert!(h.scheduler.is_looping().await);

	// One interval plus at most a minute of realignment.
	let gated = h.job("gated");
	wait_until_within(LOOP_WAIT, || gated.started() == 1).await;
	assert_eq!(
		h.scheduler.health().await.job("gated").unwrap().last_run.as_ref().unwrap().triggered_by,
		TriggerSource::Schedule
	);

	h.config.put_bool("jobsScheduler.enabled", false);
	h.gate.add_permits(1);
	h.wait_idle("gated").await;

	tokio::time::timeout(LOOP_WAIT, async {
		while h.scheduler.is_looping().await {
			tokio::time::sleep(Duration::from_secs(1)).await;
		}
	})
	.await
	.unwrap();

	tokio::time::sleep(Duration::from_secs(300)).await;
	assert_eq!(gated.started(), 1);
	assert_eq!(h.scheduler.health().await.job("gated").unwrap().runs, 1);
}
