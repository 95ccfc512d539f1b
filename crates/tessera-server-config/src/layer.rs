// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::sections::{
	AuditConfigLayer, DirectoryConfigLayer, LoggingConfigLayer, PathsConfigLayer,
};

/// Partial server configuration produced by a single source.
///
/// Every section is optional so that a TOML file or the environment only
/// needs to mention what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfigLayer {
	pub logging: Option<LoggingConfigLayer>,
	pub paths: Option<PathsConfigLayer>,
	pub directory: Option<DirectoryConfigLayer>,
	pub audit: Option<AuditConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge `other` on top of `self`; values present in `other` win.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.paths, other.paths, PathsConfigLayer::merge);
		merge_section(
			&mut self.directory,
			other.directory,
			DirectoryConfigLayer::merge,
		);
		merge_section(&mut self.audit, other.audit, AuditConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, overlay: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), overlay) {
		(Some(existing), Some(overlay)) => merge(existing, overlay),
		(None, Some(overlay)) => *base = Some(overlay),
		(_, None) => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_fills_missing_sections() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			logging: Some(LoggingConfigLayer {
				level: Some("debug".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(
			base.logging.and_then(|l| l.level).as_deref(),
			Some("debug")
		);
	}

	#[test]
	fn merge_combines_fields_within_section() {
		let mut base = ServerConfigLayer {
			directory: Some(DirectoryConfigLayer {
				url: Some("sqlite::memory:".to_string()),
				timeout_ms: Some(1000),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(ServerConfigLayer {
			directory: Some(DirectoryConfigLayer {
				timeout_ms: Some(250),
				..Default::default()
			}),
			..Default::default()
		});

		let dir = base.directory.unwrap();
		assert_eq!(dir.url.as_deref(), Some("sqlite::memory:"));
		assert_eq!(dir.timeout_ms, Some(250));
	}
}
