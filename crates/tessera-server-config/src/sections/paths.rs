// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filesystem locations of the subsystem configuration and ACL mappings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_CS_CONFIG: &str = "/etc/tessera/CS.cfg";
const DEFAULT_ACL_MAPPING: &str = "/usr/share/tessera/acl.properties";
const DEFAULT_ACL_MAPPING_OVERRIDE: &str = "/etc/tessera/acl.properties";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathsConfigLayer {
	pub cs_config: Option<String>,
	pub acl_mapping_default: Option<String>,
	pub acl_mapping_override: Option<String>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.cs_config.is_some() {
			self.cs_config = other.cs_config;
		}
		if other.acl_mapping_default.is_some() {
			self.acl_mapping_default = other.acl_mapping_default;
		}
		if other.acl_mapping_override.is_some() {
			self.acl_mapping_override = other.acl_mapping_override;
		}
	}

	pub fn finalize(self) -> PathsConfig {
		PathsConfig {
			cs_config: PathBuf::from(self.cs_config.unwrap_or_else(|| DEFAULT_CS_CONFIG.to_string())),
			acl_mapping_default: PathBuf::from(
				self
					.acl_mapping_default
					.unwrap_or_else(|| DEFAULT_ACL_MAPPING.to_string()),
			),
			acl_mapping_override: PathBuf::from(
				self
					.acl_mapping_override
					.unwrap_or_else(|| DEFAULT_ACL_MAPPING_OVERRIDE.to_string()),
			),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
	/// `CS.cfg`-style subsystem configuration (authz instances, jobs).
	pub cs_config: PathBuf,
	/// Route mapping shipped with the server.
	pub acl_mapping_default: PathBuf,
	/// Operator override of the route mapping; entries here win.
	pub acl_mapping_override: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		PathsConfigLayer::default().finalize()
	}
}
