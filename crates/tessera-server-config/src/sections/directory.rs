// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

const DEFAULT_DIRECTORY_URL: &str = "sqlite:/var/lib/tessera/directory.db";
const DEFAULT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_BASE_DN: &str = "o=tessera";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DirectoryConfigLayer {
	pub url: Option<String>,
	pub base_dn: Option<String>,
	pub timeout_ms: Option<u64>,
	pub max_connections: Option<u32>,
}

impl DirectoryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.base_dn.is_some() {
			self.base_dn = other.base_dn;
		}
		if other.timeout_ms.is_some() {
			self.timeout_ms = other.timeout_ms;
		}
		if other.max_connections.is_some() {
			self.max_connections = other.max_connections;
		}
	}

	pub fn finalize(self) -> DirectoryConfig {
		DirectoryConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string()),
			base_dn: self.base_dn.unwrap_or_else(|| DEFAULT_BASE_DN.to_string()),
			timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
			max_connections: self.max_connections.unwrap_or(5),
		}
	}
}

/// Connection settings for the directory store holding ACL entries.
///
/// `url` is either `memory:` for a process-local store or an sqlx SQLite URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryConfig {
	pub url: String,
	pub base_dn: String,
	pub timeout_ms: u64,
	pub max_connections: u32,
}

impl DirectoryConfig {
	pub fn is_memory(&self) -> bool {
		self.url == "memory:"
	}
}

impl Default for DirectoryConfig {
	fn default() -> Self {
		DirectoryConfigLayer::default().finalize()
	}
}
