// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Instrumented directory wrapper for tests of code built on [`DirectoryStore`].

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::entry::{DirectoryEntry, Modification, SearchScope};
use crate::error::{DirectoryError, Result};
use crate::filter::SearchFilter;
use crate::store::DirectoryStore;

/// Wraps a store, counting calls and optionally failing or stalling them.
pub struct InstrumentedDirectory {
	inner: Arc<dyn DirectoryStore>,
	searches: AtomicUsize,
	modifies: AtomicUsize,
	fail_writes: AtomicBool,
	fail_reads: AtomicBool,
	delay_ms: AtomicU64,
}

impl InstrumentedDirectory {
	pub fn new(inner: Arc<dyn DirectoryStore>) -> Self {
		Self {
			inner,
			searches: AtomicUsize::new(0),
			modifies: AtomicUsize::new(0),
			fail_writes: AtomicBool::new(false),
			fail_reads: AtomicBool::new(false),
			delay_ms: AtomicU64::new(0),
		}
	}

	pub fn search_count(&self) -> usize {
		self.searches.load(Ordering::SeqCst)
	}

	pub fn modify_count(&self) -> usize {
		self.modifies.load(Ordering::SeqCst)
	}

	pub fn set_fail_writes(&self, fail: bool) {
		self.fail_writes.store(fail, Ordering::SeqCst);
	}

	pub fn set_fail_reads(&self, fail: bool) {
		self.fail_reads.store(fail, Ordering::SeqCst);
	}

	/// Delay every call by `delay` before delegating.
	pub fn set_delay(&self, delay: Duration) {
		self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
	}

	async fn stall(&self) {
		let ms = self.delay_ms.load(Ordering::SeqCst);
		if ms > 0 {
			tokio::time::sleep(Duration::from_millis(ms)).await;
		}
	}

	fn check_reads(&self) -> Result<()> {
		if self.fail_reads.load(Ordering::SeqCst) {
			return Err(DirectoryError::Unavailable("injected read failure".to_string()));
		}
		Ok(())
	}

	fn check_writes(&self) -> Result<()> {
		if self.fail_writes.load(Ordering::SeqCst) {
			return Err(DirectoryError::Unavailable("injected write failure".to_string()));
		}
		Ok(())
	}
}

#[async_trait]
impl DirectoryStore for InstrumentedDirectory {
	async fn get(&self, dn: &str) -> Result<Option<DirectoryEntry>> {
		self.stall().await;
		self.check_reads()?;
		self.inner.get(dn).await
	}

	async fn search(
		&self,
		base: &str,
		scope: SearchScope,
		filter: &SearchFilter,
	) -> Result<Vec<DirectoryEntry>> {
		self.searches.fetch_add(1, Ordering::SeqCst);
		self.stall().await;
		self.check_reads()?;
		self.inner.search(base, scope, filter).await
	}

	async fn add(&self, entry: DirectoryEntry) -> Result<()> {
		self.stall().await;
		self.check_writes()?;
		self.inner.add(entry).await
	}

	async fn modify(&self, dn: &str, modifications: &[Modification]) -> Result<()> {
		self.modifies.fetch_add(1, Ordering::SeqCst);
		self.stall().await;
		self.check_writes()?;
		self.inner.modify(dn, modifications).await
	}

	async fn delete(&self, dn: &str) -> Result<()> {
		self.stall().await;
		self.check_writes()?;
		self.inner.delete(dn).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryDirectory;

	#[tokio::test]
	async fn counts_and_injects_failures() {
		let dir = InstrumentedDirectory::new(Arc::new(MemoryDirectory::with_entries([
			DirectoryEntry::new("o=tessera"),
		])));

		dir
			.search("o=tessera", SearchScope::Base, &SearchFilter::any())
			.await
			.unwrap();
		assert_eq!(dir.search_count(), 1);

		dir.set_fail_writes(true);
		let err = dir
			.modify("o=tessera", &[Modification::replace("cn", ["x"])])
			.await
			.unwrap_err();
		assert!(matches!(err, DirectoryError::Unavailable(_)));
		assert_eq!(dir.modify_count(), 1);

		dir.set_fail_writes(false);
		dir
			.modify("o=tessera", &[Modification::replace("cn", ["x"])])
			.await
			.unwrap();
	}
}
