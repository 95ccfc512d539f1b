// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Common configuration primitives for Tessera.
//!
//! This crate provides the configuration plumbing shared by the authorization
//! and jobs subsystems:
//!
//! - [`ConfigStore`]: a hierarchical, dot-separated key/value store with
//!   substore navigation (the `CS.cfg` layout, e.g. `authz.instance.foo.group`)
//! - [`parse_properties`]: a parser for `key=value` property files, used both
//!   for `CS.cfg` and for the route-to-ACL mapping files

pub mod error;
pub mod properties;
pub mod store;

pub use error::{ConfigStoreError, Result};
pub use properties::{parse_properties, to_properties_string};
pub use store::ConfigStore;
