// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tessera server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tessera_server::ServerContext;
use tessera_server_authz::parse_acl;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tessera - ACL authorization and scheduled jobs for a PKI server.
#[derive(Parser, Debug)]
#[command(name = "tessera-server", about = "Tessera authorization server", version)]
struct Args {
	/// Server configuration file (TOML).
	#[arg(long, env = "TESSERA_SERVER_CONFIG", global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the authorization subsystem and job scheduler until interrupted
	Serve,
	/// Parse an ACL string and print its normalized form
	CheckAcl {
		/// `resource:rights:entries[:description]`
		acl: String,
	},
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	match args.command.unwrap_or(Command::Serve) {
		Command::Version => {
			println!("tessera-server version: {}", env!("CARGO_PKG_VERSION"));
			Ok(())
		}
		Command::CheckAcl { acl } => check_acl(&acl),
		Command::Serve => serve(args.config).await,
	}
}

fn check_acl(text: &str) -> Result<(), Box<dyn std::error::Error>> {
	let acl = parse_acl(text)?;
	println!("{acl}");
	println!("  resource: {}", acl.resource);
	println!("  rights:   {}", acl.rights.join(","));
	for entry in &acl.entries {
		println!("  entry:    {entry}");
	}
	if let Some(description) = &acl.description {
		println!("  description: {description}");
	}
	Ok(())
}

async fn serve(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
	let config = match config_path {
		Some(path) => tessera_server_config::load_config_with_file(path)?,
		None => tessera_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		cs_config = %config.paths.cs_config.display(),
		directory = %config.directory.url,
		"starting tessera-server"
	);

	let context = ServerContext::build(config).await?;
	if let Err(e) = context.start().await {
		tracing::error!(error = %e, "Failed to start job scheduler");
	}

	tokio::signal::ctrl_c().await?;
	tracing::info!("Received shutdown signal");
	context.shutdown().await;

	tracing::info!("Server shutdown complete");
	Ok(())
}
