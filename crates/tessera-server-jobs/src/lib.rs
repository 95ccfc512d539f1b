// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron-driven background jobs for Tessera server.
//!
//! Jobs are plugins built from `jobsScheduler.*` configuration through a
//! [`JobPluginRegistry`]. The [`JobsScheduler`] polls on a fixed interval,
//! matches each job's [`JobCron`] against the clock and runs due jobs on
//! their own task, never overlapping two runs of the same job.

pub mod config;
pub mod context;
pub mod cron;
pub mod error;
pub mod health;
pub mod job;
pub mod registry;
pub mod scheduler;

pub use config::{JobConfig, SchedulerSettings, DEFAULT_INTERVAL_MINUTES, SCHEDULER_SUBSTORE};
pub use context::{JobContext, JobOutput, TriggerSource};
pub use cron::JobCron;
pub use error::{JobError, Result};
pub use health::{HealthState, JobHealthStatus, LastRunInfo, SchedulerHealth};
pub use job::Job;
pub use registry::{JobFactory, JobPluginRegistry};
pub use scheduler::{alignment_delay, next_sleep, JobsScheduler, TickReport};
