// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tessera_common_config::ConfigStore;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::config::{JobConfig, SchedulerSettings, SCHEDULER_SUBSTORE};
use crate::context::{JobContext, TriggerSource};
use crate::cron::JobCron;
use crate::error::{JobError, Result};
use crate::health::{determine_health_state, worst_state, JobHealthStatus, JobStats, SchedulerHealth};
use crate::job::Job;
use crate::registry::JobPluginRegistry;

/// Wakes are aligned to this second of the minute.
const WAKE_SECOND: u32 = 1;

struct JobEntry {
	id: String,
	job: Arc<dyn Job>,
	/// Configuration as read at registration.
	config: JobConfig,
	/// Parsed once at registration; `None` for trigger-only jobs.
	cron: Option<JobCron>,
	handle: Option<JoinHandle<()>>,
	stats: Arc<Mutex<JobStats>>,
}

impl JobEntry {
	fn new(job: Arc<dyn Job>, config: JobConfig, cron: Option<JobCron>) -> Self {
		Self {
			id: config.id.clone(),
			job,
			config,
			cron,
			handle: None,
			stats: Arc::new(Mutex::new(JobStats::default())),
		}
	}

	fn is_due(&self, at: &DateTime<Tz>) -> bool {
		self.cron.as_ref().is_some_and(|cron| cron.is_show_time(at))
	}

	fn is_running(&self) -> bool {
		self.handle.as_ref().is_some_and(|h| !h.is_finished())
	}
}

/// What one scheduler wake did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
	pub started: Vec<String>,
	/// Due jobs whose previous run had not finished.
	pub still_running: Vec<String>,
	/// Jobs skipped this tick because their `enabled` flag was unreadable.
	pub errors: Vec<(String, String)>,
}

/// Polling cron scheduler.
///
/// Wakes every `interval`, evaluates each job's cron spec against the wall
/// clock in the configured zone and starts due jobs on their own task. A job
/// is never started while its previous run is still going.
pub struct JobsScheduler {
	config: ConfigStore,
	settings: SchedulerSettings,
	jobs: Mutex<Vec<JobEntry>>,
	shutdown_tx: watch::Sender<bool>,
	loop_handle: Mutex<Option<JoinHandle<()>>>,
	shut_down: AtomicBool,
}

impl JobsScheduler {
	/// Scheduler with no jobs over the `jobsScheduler` part of `config`.
	pub fn new(config: &ConfigStore) -> Result<Self> {
		Self::with_entries(config.substore(SCHEDULER_SUBSTORE), Vec::new())
	}

	fn with_entries(config: ConfigStore, entries: Vec<JobEntry>) -> Result<Self> {
		let settings = SchedulerSettings::from_store(&config)?;
		let (shutdown_tx, _) = watch::channel(false);
		Ok(Self {
			config,
			settings,
			jobs: Mutex::new(entries),
			shutdown_tx,
			loop_handle: Mutex::new(None),
			shut_down: AtomicBool::new(false),
		})
	}

	/// Builds every configured job through `registry`.
	///
	/// Jobs with an unknown plugin, a missing class or an invalid cron spec are
	/// logged and left out; the remaining jobs are registered in id order.
	/// Cron specs are fixed from here on, later edits to `cron` are ignored.
	pub fn init(config: &ConfigStore, registry: &JobPluginRegistry) -> Result<Self> {
		let config = config.substore(SCHEDULER_SUBSTORE);
		let job_store = config.substore("job");
		let impls = config.substore("impl");

		let mut entries = Vec::new();
		for id in job_store.substore_names() {
			match build_job(&id, &job_store, &impls, registry) {
				Ok(entry) => {
					debug!(job_id = %id, cron = ?entry.config.cron, "registered job");
					entries.push(entry);
				}
				Err(e) => error!(job_id = %id, error = %e, "skipping job"),
			}
		}
		let job_count = entries.len();

		let scheduler = Self::with_entries(config, entries)?;
		info!(
			job_count,
			enabled = scheduler.settings.enabled,
			interval_secs = scheduler.settings.interval.as_secs(),
			time_zone = %scheduler.settings.time_zone,
			"jobs scheduler initialized"
		);
		Ok(scheduler)
	}

	pub fn settings(&self) -> &SchedulerSettings {
		&self.settings
	}

	/// Adds a job whose configuration lives under `jobsScheduler.job.<id>`,
	/// replacing any job with the same id. Fails on an invalid cron spec.
	pub async fn register(&self, job: Arc<dyn Job>) -> Result<()> {
		if self.is_shut_down() {
			return Err(JobError::ShutDown);
		}
		let id = job.id().to_string();
		let config = JobConfig::from_store(&id, &self.config.substore("job").substore(&id))?;
		let cron = parse_cron(&config)?;
		let entry = JobEntry::new(job, config, cron);

		let mut jobs = self.jobs.lock().await;
		jobs.retain(|e| e.id != id);
		jobs.push(entry);
		debug!(job_id = %id, "registered job");
		Ok(())
	}

	pub async fn job_ids(&self) -> Vec<String> {
		self.jobs.lock().await.iter().map(|e| e.id.clone()).collect()
	}

	/// Spawns the polling loop unless the scheduler is disabled.
	#[instrument(skip(self))]
	pub async fn start(self: &Arc<Self>) -> Result<()> {
		if self.is_shut_down() {
			return Err(JobError::ShutDown);
		}
		if !self.settings.enabled {
			info!("jobs scheduler disabled");
			return Ok(());
		}

		let mut loop_handle = self.loop_handle.lock().await;
		if loop_handle.is_some() {
			return Ok(());
		}
		let scheduler = Arc::clone(self);
		let shutdown_rx = self.shutdown_tx.subscribe();
		*loop_handle = Some(tokio::spawn(
			scheduler.run_loop(shutdown_rx).instrument(info_span!("jobs_scheduler")),
		));
		info!("jobs scheduler started");
		Ok(())
	}

	/// Whether the polling loop is alive.
	pub async fn is_looping(&self) -> bool {
		self.loop_handle
			.lock()
			.await
			.as_ref()
			.is_some_and(|h| !h.is_finished())
	}

	async fn run_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
		let interval = self.settings.interval;
		let mut last_wake = Instant::now();
		let mut aligned = false;

		loop {
			// Wakes stay on the `last_wake + n * interval` grid so timer
			// overshoot does not accumulate.
			let deadline = Instant::now() + next_sleep(interval, last_wake.elapsed());
			tokio::select! {
				_ = tokio::time::sleep_until(deadline) => {}
				_ = shutdown_rx.changed() => break,
			}
			last_wake = deadline;

			let second = Utc::now().second();
			if let Some(delay) = alignment_delay(second) {
				if aligned && second > WAKE_SECOND {
					// This minute's tick is skipped.
					warn!(second, delay_secs = delay.as_secs(), "wake landed late, realigning");
				} else {
					debug!(second, delay_ms = delay.as_millis() as u64, "realigning wake");
				}
				tokio::select! {
					_ = tokio::time::sleep(delay) => {}
					_ = shutdown_rx.changed() => break,
				}
				last_wake = Instant::now();
			}
			aligned = true;

			match self.config.get_bool_or("enabled", false) {
				Ok(true) => {}
				Ok(false) => {
					info!("jobs scheduler disabled, stopping");
					break;
				}
				Err(e) => {
					error!(error = %e, "unreadable scheduler setting, stopping");
					break;
				}
			}

			self.tick(Utc::now()).await;
		}
		debug!("jobs scheduler loop exited");
	}

	/// Evaluates every registered job against `now` and starts the due ones.
	#[instrument(skip(self))]
	pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
		let mut report = TickReport::default();
		if self.is_shut_down() {
			return report;
		}

		let local = now.with_timezone(&self.settings.time_zone);
		let job_store = self.config.substore("job");
		let mut jobs = self.jobs.lock().await;

		for entry in jobs.iter_mut() {
			let enabled = match job_store.substore(&entry.id).get_bool_or("enabled", false) {
				Ok(enabled) => enabled,
				Err(e) => {
					warn!(job_id = %entry.id, error = %e, "cannot read job enabled flag");
					report.errors.push((entry.id.clone(), e.to_string()));
					continue;
				}
			};
			if !enabled || !entry.is_due(&local) {
				continue;
			}

			if entry.is_running() {
				warn!(job_id = %entry.id, "job still running, skipping this tick");
				entry.stats.lock().await.skipped_ticks += 1;
				report.still_running.push(entry.id.clone());
				continue;
			}

			let config = JobConfig {
				enabled,
				..entry.config.clone()
			};
			let run_id = spawn_run(entry, config, TriggerSource::Schedule).await;
			debug!(job_id = %entry.id, %run_id, "job started");
			report.started.push(entry.id.clone());
		}

		report
	}

	/// Starts a job now regardless of its schedule. Returns the run id.
	#[instrument(skip(self))]
	pub async fn trigger_job(&self, job_id: &str) -> Result<String> {
		if self.is_shut_down() {
			return Err(JobError::ShutDown);
		}

		let mut jobs = self.jobs.lock().await;
		let entry = jobs
			.iter_mut()
			.find(|e| e.id == job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
		if entry.is_running() {
			return Err(JobError::AlreadyRunning(job_id.to_string()));
		}

		let config = entry.config.clone();
		let run_id = spawn_run(entry, config, TriggerSource::Manual).await;
		info!(job_id, %run_id, "job triggered manually");
		Ok(run_id)
	}

	pub async fn health(&self) -> SchedulerHealth {
		let job_store = self.config.substore("job");
		let jobs = self.jobs.lock().await;

		let mut statuses = Vec::with_capacity(jobs.len());
		for entry in jobs.iter() {
			let stats = entry.stats.lock().await.clone();
			statuses.push(JobHealthStatus {
				job_id: entry.id.clone(),
				description: entry.job.description().to_string(),
				enabled: job_store
					.substore(&entry.id)
					.get_bool_or("enabled", false)
					.unwrap_or(false),
				running: entry.is_running(),
				status: determine_health_state(stats.consecutive_failures),
				last_run: stats.last_run,
				runs: stats.runs,
				skipped_ticks: stats.skipped_ticks,
				consecutive_failures: stats.consecutive_failures,
			});
		}

		SchedulerHealth {
			enabled: self.config.get_bool_or("enabled", false).unwrap_or(false),
			status: worst_state(&statuses),
			jobs: statuses,
		}
	}

	/// Stops the polling loop and forgets all jobs. Runs in progress are left
	/// to finish on their own.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		if self.shut_down.swap(true, Ordering::SeqCst) {
			return;
		}
		let _ = self.shutdown_tx.send(true);

		if let Some(handle) = self.loop_handle.lock().await.take() {
			if let Err(e) = handle.await {
				warn!(error = %e, "scheduler loop ended abnormally");
			}
		}

		let mut jobs = self.jobs.lock().await;
		let running = jobs.iter().filter(|e| e.is_running()).count();
		jobs.clear();
		info!(running, "jobs scheduler shut down");
	}

	pub fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::SeqCst)
	}
}

fn build_job(
	id: &str,
	job_store: &ConfigStore,
	impls: &ConfigStore,
	registry: &JobPluginRegistry,
) -> Result<JobEntry> {
	let config = JobConfig::from_store(id, &job_store.substore(id))?;
	let cron = parse_cron(&config)?;
	let class = impls
		.substore(&config.plugin_name)
		.get("class")
		.ok_or_else(|| JobError::UnknownPlugin(config.plugin_name.clone()))?;
	let job = registry.build(&class, &config)?;
	Ok(JobEntry::new(job, config, cron))
}

fn parse_cron(config: &JobConfig) -> Result<Option<JobCron>> {
	config.cron.as_deref().map(JobCron::parse).transpose()
}

async fn spawn_run(entry: &mut JobEntry, config: JobConfig, triggered_by: TriggerSource) -> String {
	let ctx = JobContext::new(triggered_by, config);
	let run_id = ctx.run_id.clone();
	entry
		.stats
		.lock()
		.await
		.started(&run_id, triggered_by, ctx.started_at);

	let job = Arc::clone(&entry.job);
	let stats = Arc::clone(&entry.stats);
	let span = info_span!("job", job_id = %entry.id, run_id = %run_id);
	entry.handle = Some(tokio::spawn(
		async move {
			let error = match job.run(&ctx).await {
				Ok(output) => {
					info!(output = %output.message, "job completed");
					None
				}
				Err(e) => {
					warn!(error = %e, "job failed");
					Some(e.to_string())
				}
			};
			stats.lock().await.finished(&ctx.run_id, Utc::now(), error);
		}
		.instrument(span),
	));
	run_id
}

/// Time left until the next wake. Overruns are absorbed by skipping whole
/// intervals rather than replaying them.
pub fn next_sleep(interval: Duration, elapsed: Duration) -> Duration {
	if interval.is_zero() {
		return Duration::ZERO;
	}
	if elapsed <= interval {
		return interval - elapsed;
	}
	let overrun = elapsed - interval;
	let rem = overrun.as_nanos() % interval.as_nanos();
	if rem == 0 {
		Duration::ZERO
	} else {
		Duration::from_nanos((interval.as_nanos() - rem) as u64)
	}
}

/// Extra sleep needed to land on second 1 of a minute, if any.
pub fn alignment_delay(second: u32) -> Option<Duration> {
	match second {
		WAKE_SECOND => None,
		0 => Some(Duration::from_secs(1)),
		s => Some(Duration::from_secs(u64::from(60 + WAKE_SECOND - s.min(59)))),
	}
}
