// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in job plugins.

pub mod acl_flush;

pub use acl_flush::{AclFlushJob, ACL_FLUSH_CLASS};
