// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ACL-based authorization for Tessera.
//!
//! - [`AuthzManager`]: pluggable evaluators (`DirAclAuthz`, `BasicGroupAuthz`,
//!   `ExternalAuthz`) built from configuration through
//!   [`AuthzPluginRegistry`]
//! - [`AuthzSubsystem`]: named manager instances and dispatch
//! - [`AuthzFilter`]: per-request decision point with auditing
//! - [`Acl`] / [`Expression`]: the rule format and its subject predicates

pub mod acl;
pub mod error;
pub mod expression;
pub mod filter;
pub mod manager;
pub mod managers;
pub mod mapping;
pub mod rule_store;
pub mod subsystem;
pub mod token;

pub use acl::{parse_acl, Acl, AclEntry, AclEntryType, AclParseError};
pub use error::{AuthzError, Result};
pub use expression::{CompareOp, Expression, ExpressionError};
pub use filter::{AuthzFilter, FilterDecision, DEFAULT_MANAGER, DEFAULT_MANAGER_KEY};
pub use manager::{
	evaluate_expression, AclWriteOutcome, AuthzManager, AuthzPluginRegistry, ManagerFactory,
	ManagerInit, ManagerSlot,
};
pub use managers::{BasicGroupAuthz, DirAclAuthz, ExternalAuthz};
pub use mapping::{AclMapping, AclTarget};
pub use rule_store::{EvaluationOrder, RuleStore};
pub use subsystem::{AuthzSubsystem, FlushReport};
pub use token::{AuthToken, AuthzStatus, AuthzToken, ExternalPrincipal, Principal};
