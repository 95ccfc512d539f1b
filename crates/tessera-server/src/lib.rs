// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tessera server wiring: the [`ServerContext`] that owns the directory,
//! audit pipeline, authorization subsystem, request filter and job
//! scheduler, plus the built-in job plugins.

pub mod context;
pub mod error;
pub mod jobs;

pub use context::{open_directory, ServerContext};
pub use error::{Result, ServerError};
pub use jobs::{AclFlushJob, ACL_FLUSH_CLASS};
