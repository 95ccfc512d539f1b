// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Route to (resource, operation) mapping from `acl.properties`.
//!
//! Two layers are read: the packaged defaults and a site override. Keys in
//! the override replace keys in the defaults.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use tessera_common_config::parse_properties;
use tracing::{debug, info};

use crate::error::{AuthzError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclTarget {
	pub resource: String,
	pub operation: String,
}

#[derive(Debug, Clone, Default)]
pub struct AclMapping {
	entries: BTreeMap<String, String>,
}

impl AclMapping {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a mapping from property texts, lowest precedence first.
	pub fn from_layers<'a>(layers: impl IntoIterator<Item = &'a str>) -> Self {
		let mut entries = BTreeMap::new();
		for layer in layers {
			entries.extend(parse_properties(layer));
		}
		Self { entries }
	}

	/// Reads the default and override files. A missing file is an empty
	/// layer; any other read error is a configuration error.
	pub async fn load(default: &Path, override_path: &Path) -> Result<Self> {
		let default_text = read_layer(default).await?;
		let override_text = read_layer(override_path).await?;
		let mapping = Self::from_layers([default_text.as_str(), override_text.as_str()]);
		info!(
			default = %default.display(),
			override_path = %override_path.display(),
			routes = mapping.len(),
			"loaded ACL mapping"
		);
		Ok(mapping)
	}

	pub fn insert(&mut self, route: impl Into<String>, value: impl Into<String>) {
		self.entries.insert(route.into(), value.into());
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// `Ok(None)` for unprotected routes; an entry that is not exactly
	/// `resource,operation` is a configuration error.
	pub fn lookup(&self, route: &str) -> Result<Option<AclTarget>> {
		let Some(value) = self.entries.get(route) else {
			return Ok(None);
		};

		let parts: Vec<&str> = value.split(',').map(str::trim).collect();
		match parts.as_slice() {
			[resource, operation] if !resource.is_empty() && !operation.is_empty() => {
				Ok(Some(AclTarget {
					resource: resource.to_string(),
					operation: operation.to_string(),
				}))
			}
			_ => Err(AuthzError::Configuration(format!(
				"malformed ACL mapping for route {route}: '{value}'"
			))),
		}
	}
}

async fn read_layer(path: &Path) -> Result<String> {
	match tokio::fs::read_to_string(path).await {
		Ok(text) => Ok(text),
		Err(e) if e.kind() == io::ErrorKind::NotFound => {
			debug!(path = %path.display(), "ACL mapping layer not present");
			Ok(String::new())
		}
		Err(e) => Err(AuthzError::Configuration(format!(
			"cannot read ACL mapping {}: {e}",
			path.display()
		))),
	}
}
