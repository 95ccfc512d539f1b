// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::entry::{normalize_dn, DirectoryEntry, Modification, SearchScope};
use crate::error::{DirectoryError, Result};
use crate::filter::SearchFilter;
use crate::store::DirectoryStore;

/// Process-local directory keyed by normalized DN.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
	entries: RwLock<BTreeMap<String, DirectoryEntry>>,
}

impl MemoryDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
		let map = entries
			.into_iter()
			.map(|e| (e.normalized_dn(), e))
			.collect();
		Self {
			entries: RwLock::new(map),
		}
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
	async fn get(&self, dn: &str) -> Result<Option<DirectoryEntry>> {
		Ok(self.entries.read().await.get(&normalize_dn(dn)).cloned())
	}

	#[instrument(skip(self, filter), fields(filter = %filter))]
	async fn search(
		&self,
		base: &str,
		scope: SearchScope,
		filter: &SearchFilter,
	) -> Result<Vec<DirectoryEntry>> {
		let entries = self.entries.read().await;
		Ok(entries
			.values()
			.filter(|e| scope.contains(base, &e.dn) && filter.matches(e))
			.cloned()
			.collect())
	}

	async fn add(&self, entry: DirectoryEntry) -> Result<()> {
		let key = entry.normalized_dn();
		let mut entries = self.entries.write().await;
		if entries.contains_key(&key) {
			return Err(DirectoryError::AlreadyExists(entry.dn));
		}
		entries.insert(key, entry);
		Ok(())
	}

	async fn modify(&self, dn: &str, modifications: &[Modification]) -> Result<()> {
		let mut entries = self.entries.write().await;
		let entry = entries
			.get_mut(&normalize_dn(dn))
			.ok_or_else(|| DirectoryError::NoSuchEntry(dn.to_string()))?;
		for modification in modifications {
			entry.apply(modification);
		}
		Ok(())
	}

	async fn delete(&self, dn: &str) -> Result<()> {
		self
			.entries
			.write()
			.await
			.remove(&normalize_dn(dn))
			.map(|_| ())
			.ok_or_else(|| DirectoryError::NoSuchEntry(dn.to_string()))
	}
}
