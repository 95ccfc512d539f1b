// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory store abstraction for Tessera.
//!
//! The authorization managers keep their ACL rule sets in a directory entry
//! (`cn=aclResources,<basedn>`, attribute `resourceACLS`). This crate models
//! that directory as an opaque store with get/search/add/modify/delete:
//!
//! - [`DirectoryStore`]: the async trait managers depend on
//! - [`MemoryDirectory`]: process-local store for tests and ephemeral servers
//! - [`SqliteDirectory`]: sqlx/SQLite store for single-node deployments
//! - [`SearchFilter`]: LDAP-style filter parsing and matching

pub mod entry;
pub mod error;
pub mod filter;
pub mod memory;
pub mod sqlite;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use entry::{normalize_dn, parent_dn, DirectoryEntry, Modification, SearchScope};
pub use error::{DirectoryError, Result};
pub use filter::SearchFilter;
pub use memory::MemoryDirectory;
pub use sqlite::SqliteDirectory;
pub use store::DirectoryStore;
