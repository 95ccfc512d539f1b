// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server settings for Tessera.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`TESSERA_SERVER_*`)
//!
//! Subsystem settings (authz instances, scheduled jobs) live in the
//! `CS.cfg`-style store from `tessera-common-config`; this crate only knows
//! where that file is.

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub logging: LoggingConfig,
	pub paths: PathsConfig,
	pub directory: DirectoryConfig,
	pub audit: AuditConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TESSERA_SERVER_*`)
/// 2. Config file (`/etc/tessera/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let logging = layer.logging.unwrap_or_default().finalize();
	let paths = layer.paths.unwrap_or_default().finalize();
	let directory = layer.directory.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();

	validate_config(&directory, &audit)?;

	info!(
		cs_config = %paths.cs_config.display(),
		directory = %directory.url,
		directory_timeout_ms = directory.timeout_ms,
		audit_enabled = audit.enabled,
		audit_file = audit.file_path.as_deref().unwrap_or("-"),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		logging,
		paths,
		directory,
		audit,
	})
}

fn validate_config(directory: &DirectoryConfig, audit: &AuditConfig) -> Result<(), ConfigError> {
	if directory.timeout_ms == 0 {
		return Err(ConfigError::Validation(
			"directory.timeout_ms must be greater than zero".to_string(),
		));
	}
	if audit.queue_capacity == 0 {
		return Err(ConfigError::Validation(
			"audit.queue_capacity must be greater than zero".to_string(),
		));
	}
	Ok(())
}
