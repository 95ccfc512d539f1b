// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed directory for single-node deployments.
//!
//! Each entry is one row; attributes are stored as a JSON object of
//! multi-valued arrays. Scope and filter evaluation happen in process after
//! a prefix-narrowed query.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::instrument;

use crate::entry::{normalize_dn, DirectoryEntry, Modification, SearchScope};
use crate::error::{DirectoryError, Result};
use crate::filter::SearchFilter;
use crate::store::DirectoryStore;

#[derive(Clone)]
pub struct SqliteDirectory {
	pool: SqlitePool,
}

impl SqliteDirectory {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Open (creating if missing) the database at `url` and ensure the schema.
	#[instrument(skip(url))]
	pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(url)?
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.create_if_missing(true);

		let pool = SqlitePoolOptions::new()
			.max_connections(max_connections.max(1))
			.connect_with(options)
			.await?;

		let directory = Self::new(pool);
		directory.migrate().await?;
		tracing::debug!("directory database ready");
		Ok(directory)
	}

	pub async fn migrate(&self) -> Result<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS directory_entries (
				dn_norm TEXT PRIMARY KEY,
				dn TEXT NOT NULL,
				attributes TEXT NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	fn decode(dn: String, attributes: &str) -> Result<DirectoryEntry> {
		let attributes: BTreeMap<String, Vec<String>> = serde_json::from_str(attributes)?;
		Ok(DirectoryEntry { dn, attributes })
	}
}

#[async_trait]
impl DirectoryStore for SqliteDirectory {
	#[instrument(skip(self))]
	async fn get(&self, dn: &str) -> Result<Option<DirectoryEntry>> {
		let row: Option<(String, String)> =
			sqlx::query_as("SELECT dn, attributes FROM directory_entries WHERE dn_norm = ?")
				.bind(normalize_dn(dn))
				.fetch_optional(&self.pool)
				.await?;

		row.map(|(dn, attrs)| Self::decode(dn, &attrs)).transpose()
	}

	#[instrument(skip(self, filter), fields(filter = %filter))]
	async fn search(
		&self,
		base: &str,
		scope: SearchScope,
		filter: &SearchFilter,
	) -> Result<Vec<DirectoryEntry>> {
		let base_norm = normalize_dn(base);
		let suffix = format!(",{base_norm}");

		let rows: Vec<(String, String)> = sqlx::query_as(
			r#"
			SELECT dn, attributes FROM directory_entries
			WHERE dn_norm = ?1 OR substr(dn_norm, -length(?2)) = ?2
			ORDER BY dn_norm
			"#,
		)
		.bind(&base_norm)
		.bind(&suffix)
		.fetch_all(&self.pool)
		.await?;

		let mut found = Vec::new();
		for (dn, attrs) in rows {
			let entry = Self::decode(dn, &attrs)?;
			if scope.contains(&base_norm, &entry.dn) && filter.matches(&entry) {
				found.push(entry);
			}
		}
		Ok(found)
	}

	#[instrument(skip(self, entry), fields(dn = %entry.dn))]
	async fn add(&self, entry: DirectoryEntry) -> Result<()> {
		let attributes = serde_json::to_string(&entry.attributes)?;
		let result = sqlx::query(
			"INSERT OR IGNORE INTO directory_entries (dn_norm, dn, attributes) VALUES (?, ?, ?)",
		)
		.bind(entry.normalized_dn())
		.bind(&entry.dn)
		.bind(attributes)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DirectoryError::AlreadyExists(entry.dn));
		}
		Ok(())
	}

	#[instrument(skip(self, modifications), fields(count = modifications.len()))]
	async fn modify(&self, dn: &str, modifications: &[Modification]) -> Result<()> {
		let dn_norm = normalize_dn(dn);
		let mut tx = self.pool.begin().await?;

		let row: Option<(String, String)> =
			sqlx::query_as("SELECT dn, attributes FROM directory_entries WHERE dn_norm = ?")
				.bind(&dn_norm)
				.fetch_optional(&mut *tx)
				.await?;
		let (stored_dn, attrs) = row.ok_or_else(|| DirectoryError::NoSuchEntry(dn.to_string()))?;

		let mut entry = Self::decode(stored_dn, &attrs)?;
		for modification in modifications {
			entry.apply(modification);
		}

		sqlx::query("UPDATE directory_entries SET attributes = ? WHERE dn_norm = ?")
			.bind(serde_json::to_string(&entry.attributes)?)
			.bind(&dn_norm)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn delete(&self, dn: &str) -> Result<()> {
		let result = sqlx::query("DELETE FROM directory_entries WHERE dn_norm = ?")
			.bind(normalize_dn(dn))
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DirectoryError::NoSuchEntry(dn.to_string()));
		}
		Ok(())
	}
}
