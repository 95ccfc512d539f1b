// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::TriggerSource;

const UNHEALTHY_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRunInfo {
	pub run_id: String,
	pub triggered_by: TriggerSource,
	pub started_at: DateTime<Utc>,
	pub finished_at: Option<DateTime<Utc>>,
	pub duration_ms: Option<i64>,
	pub error: Option<String>,
}

/// Bookkeeping kept by the scheduler for one job id.
#[derive(Debug, Clone, Default)]
pub(crate) struct JobStats {
	pub last_run: Option<LastRunInfo>,
	pub runs: u64,
	pub skipped_ticks: u64,
	pub consecutive_failures: u32,
}

impl JobStats {
	pub fn started(&mut self, run_id: &str, triggered_by: TriggerSource, at: DateTime<Utc>) {
		self.runs += 1;
		self.last_run = Some(LastRunInfo {
			run_id: run_id.to_string(),
			triggered_by,
			started_at: at,
			finished_at: None,
			duration_ms: None,
			error: None,
		});
	}

	pub fn finished(&mut self, run_id: &str, at: DateTime<Utc>, error: Option<String>) {
		if let Some(last) = self.last_run.as_mut().filter(|r| r.run_id == run_id) {
			last.finished_at = Some(at);
			last.duration_ms = Some((at - last.started_at).num_milliseconds());
			last.error = error.clone();
		}
		match error {
			Some(_) => self.consecutive_failures += 1,
			None => self.consecutive_failures = 0,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct JobHealthStatus {
	pub job_id: String,
	pub description: String,
	pub enabled: bool,
	pub running: bool,
	pub status: HealthState,
	pub last_run: Option<LastRunInfo>,
	pub runs: u64,
	pub skipped_ticks: u64,
	pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerHealth {
	pub enabled: bool,
	pub status: HealthState,
	pub jobs: Vec<JobHealthStatus>,
}

impl SchedulerHealth {
	pub fn job(&self, job_id: &str) -> Option<&JobHealthStatus> {
		self.jobs.iter().find(|j| j.job_id == job_id)
	}
}

pub(crate) fn determine_health_state(consecutive_failures: u32) -> HealthState {
	if consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
		HealthState::Unhealthy
	} else if consecutive_failures >= 1 {
		HealthState::Degraded
	} else {
		HealthState::Healthy
	}
}

pub(crate) fn worst_state<'a>(jobs: impl IntoIterator<Item = &'a JobHealthStatus>) -> HealthState {
	jobs.into_iter()
		.map(|j| j.status)
		.max()
		.unwrap_or(HealthState::Healthy)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn failure_thresholds() {
		assert_eq!(determine_health_state(0), HealthState::Healthy);
		assert_eq!(determine_health_state(1), HealthState::Degraded);
		assert_eq!(determine_health_state(2), HealthState::Degraded);
		assert_eq!(determine_health_state(3), HealthState::Unhealthy);
	}

	#[test]
	fn stats_track_runs_and_failures() {
		let mut stats = JobStats::default();
		let start = Utc::now();
		stats.started("r1", TriggerSource::Schedule, start);
		stats.finished("r1", start + chrono::Duration::milliseconds(250), Some("boom".into()));
		assert_eq!(stats.runs, 1);
		assert_eq!(stats.consecutive_failures, 1);
		let last = stats.last_run.as_ref().unwrap();
		assert_eq!(last.duration_ms, Some(250));
		assert_eq!(last.error.as_deref(), Some("boom"));

		stats.started("r2", TriggerSource::Manual, start);
		stats.finished("r2", start, None);
		assert_eq!(stats.runs, 2);
		assert_eq!(stats.consecutive_failures, 0);
	}

	#[test]
	fn unhealthy_dominates() {
		let status = |state| JobHealthStatus {
			job_id: "j".into(),
			description: String::new(),
			enabled: true,
			running: false,
			status: state,
			last_run: None,
			runs: 0,
			skipped_ticks: 0,
			consecutive_failures: 0,
		};
		let jobs = [
			status(HealthState::Degraded),
			status(HealthState::Unhealthy),
			status(HealthState::Healthy),
		];
		assert_eq!(worst_state(&jobs), HealthState::Unhealthy);
		assert_eq!(worst_state(std::iter::empty()), HealthState::Healthy);
	}
}
