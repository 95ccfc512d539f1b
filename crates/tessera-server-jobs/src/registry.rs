// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::JobConfig;
use crate::error::{JobError, Result};
use crate::job::Job;

pub type JobFactory = Arc<dyn Fn(&JobConfig) -> Result<Arc<dyn Job>> + Send + Sync>;

/// Maps job plugin class names to factories. Factories may capture the
/// services their jobs need.
///
/// Lookup uses the last dot-separated segment of the class name.
#[derive(Clone, Default)]
pub struct JobPluginRegistry {
	factories: HashMap<String, JobFactory>,
}

impl JobPluginRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register<F>(&mut self, class: &str, factory: F)
	where
		F: Fn(&JobConfig) -> Result<Arc<dyn Job>> + Send + Sync + 'static,
	{
		self.factories
			.insert(short_name(class).to_string(), Arc::new(factory));
	}

	pub fn contains(&self, class: &str) -> bool {
		self.factories.contains_key(short_name(class))
	}

	pub fn build(&self, class: &str, config: &JobConfig) -> Result<Arc<dyn Job>> {
		let factory = self
			.factories
			.get(short_name(class))
			.ok_or_else(|| JobError::UnknownPlugin(class.to_string()))?;
		factory(config)
	}
}

impl fmt::Debug for JobPluginRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut classes: Vec<&String> = self.factories.keys().collect();
		classes.sort();
		f.debug_struct("JobPluginRegistry")
			.field("classes", &classes)
			.finish()
	}
}

fn short_name(class: &str) -> &str {
	class.rsplit('.').next().unwrap_or(class)
}
