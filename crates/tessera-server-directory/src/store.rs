// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::entry::{DirectoryEntry, Modification, SearchScope};
use crate::error::Result;
use crate::filter::SearchFilter;

/// Opaque directory the authorization managers read ACLs from.
///
/// Implementations own connection handling; callers bound each call with
/// their own timeout.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
	async fn get(&self, dn: &str) -> Result<Option<DirectoryEntry>>;

	async fn search(
		&self,
		base: &str,
		scope: SearchScope,
		filter: &SearchFilter,
	) -> Result<Vec<DirectoryEntry>>;

	async fn add(&self, entry: DirectoryEntry) -> Result<()>;

	async fn modify(&self, dn: &str, modifications: &[Modification]) -> Result<()>;

	async fn delete(&self, dn: &str) -> Result<()>;
}
