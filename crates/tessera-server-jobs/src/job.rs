// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::context::{JobContext, JobOutput};
use crate::error::JobError;

/// A unit of scheduled work. One instance exists per configured job id and
/// the scheduler never runs two invocations of it at once.
#[async_trait]
pub trait Job: Send + Sync {
	fn id(&self) -> &str;
	fn description(&self) -> &str;
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError>;
}
