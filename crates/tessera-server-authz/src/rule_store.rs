// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::acl::{parse_acl, Acl, AclEntryType};
use crate::token::AuthToken;

/// How ACL entries are combined when deciding an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationOrder {
	/// First entry (in declaration order) covering the operation and
	/// matching the subject decides.
	#[default]
	Declared,
	/// Any matching deny rejects; otherwise a matching allow is required.
	/// Deny entries are evaluated first.
	DenyAllow,
	/// Same outcome as `DenyAllow`, with allow entries evaluated first.
	AllowDeny,
}

impl FromStr for EvaluationOrder {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized: String = s.chars().filter(|c| !c.is_whitespace()).collect();
		match normalized.to_ascii_lowercase().as_str() {
			"declared" | "" => Ok(EvaluationOrder::Declared),
			"deny,allow" | "deny" => Ok(EvaluationOrder::DenyAllow),
			"allow,deny" | "allow" => Ok(EvaluationOrder::AllowDeny),
			other => Err(format!("unknown ACL evaluation order '{other}'")),
		}
	}
}

impl fmt::Display for EvaluationOrder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EvaluationOrder::Declared => f.write_str("declared"),
			EvaluationOrder::DenyAllow => f.write_str("deny,allow"),
			EvaluationOrder::AllowDeny => f.write_str("allow,deny"),
		}
	}
}

impl Acl {
	/// Decides whether `token` may perform `operation` on this resource.
	pub fn evaluate(&self, token: &AuthToken, operation: &str, order: EvaluationOrder) -> bool {
		if !self.declares(operation) {
			debug!(resource = %self.resource, operation, "operation not declared on ACL");
			return false;
		}

		let mut applicable = self
			.entries
			.iter()
			.filter(|e| e.covers(operation) && e.matches(token));

		match order {
			EvaluationOrder::Declared => applicable
				.next()
				.map(|e| e.entry_type == AclEntryType::Allow)
				.unwrap_or(false),
			EvaluationOrder::DenyAllow => {
				let applicable: Vec<_> = applicable.collect();
				!applicable.iter().any(|e| e.entry_type == AclEntryType::Deny)
					&& applicable.iter().any(|e| e.entry_type == AclEntryType::Allow)
			}
			EvaluationOrder::AllowDeny => {
				let applicable: Vec<_> = applicable.collect();
				applicable.iter().any(|e| e.entry_type == AclEntryType::Allow)
					&& !applicable.iter().any(|e| e.entry_type == AclEntryType::Deny)
			}
		}
	}
}

/// In-memory ACLs of one manager, keyed by resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleStore {
	acls: BTreeMap<String, Acl>,
}

impl RuleStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses serialized ACLs; values that fail to parse are logged and skipped.
	pub fn from_values<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut store = Self::new();
		for value in values {
			match parse_acl(value.as_ref()) {
				Ok(acl) => {
					store.insert(acl);
				}
				Err(e) => warn!(error = %e, "skipping unparsable ACL"),
			}
		}
		store
	}

	pub fn get(&self, resource: &str) -> Option<&Acl> {
		self.acls.get(resource)
	}

	/// Replaces any ACL for the same resource, returning the previous one.
	pub fn insert(&mut self, acl: Acl) -> Option<Acl> {
		self.acls.insert(acl.resource.clone(), acl)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Acl> {
		self.acls.values()
	}

	pub fn len(&self) -> usize {
		self.acls.len()
	}

	pub fn is_empty(&self) -> bool {
		self.acls.is_empty()
	}

	/// Serialized ACLs, one per resource, ready for the directory attribute.
	pub fn serialize(&self) -> Vec<String> {
		self.acls.values().map(ToString::to_string).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn alice() -> AuthToken {
		AuthToken::new("alice", "passwdUserDBAuthMgr").with_groups(["Agents"])
	}

	#[test]
	fn declaration_order_decides_in_declared_mode() {
		let allow_first = parse_acl("certs:read:allow (read) group=Agents;deny (read) user=alice").unwrap();
		let deny_first = parse_acl("certs:read:deny (read) user=alice;allow (read) group=Agents").unwrap();

		assert!(allow_first.evaluate(&alice(), "read", EvaluationOrder::Declared));
		assert!(!deny_first.evaluate(&alice(), "read", EvaluationOrder::Declared));
	}

	#[test]
	fn deny_wins_in_combined_modes_regardless_of_position() {
		let allow_first = parse_acl("certs:read:allow (read) group=Agents;deny (read) user=alice").unwrap();
		assert!(!allow_first.evaluate(&alice(), "read", EvaluationOrder::DenyAllow));
		assert!(!allow_first.evaluate(&alice(), "read", EvaluationOrder::AllowDeny));

		let only_allow = parse_acl("certs:read:allow (read) group=Agents").unwrap();
		assert!(only_allow.evaluate(&alice(), "read", EvaluationOrder::DenyAllow));
		assert!(only_allow.evaluate(&alice(), "read", EvaluationOrder::AllowDeny));
	}

	#[test]
	fn undeclared_operation_is_denied() {
		let acl = parse_acl("certs:read:allow (read,approve) user=anybody").unwrap();
		assert!(acl.evaluate(&alice(), "read", EvaluationOrder::Declared));
		assert!(!acl.evaluate(&alice(), "approve", EvaluationOrder::Declared));
	}

	#[test]
	fn no_matching_entry_denies() {
		let acl = parse_acl("certs:read,write:allow (read) group=Agents").unwrap();
		assert!(!acl.evaluate(&alice(), "write", EvaluationOrder::Declared));
		assert!(!acl.evaluate(&AuthToken::new("bob", "m"), "read", EvaluationOrder::Declared));
	}

	#[test]
	fn parses_evaluation_order() {
		assert_eq!("deny, allow".parse::<EvaluationOrder>().unwrap(), EvaluationOrder::DenyAllow);
		assert_eq!("allow,deny".parse::<EvaluationOrder>().unwrap(), EvaluationOrder::AllowDeny);
		assert_eq!("Declared".parse::<EvaluationOrder>().unwrap(), EvaluationOrder::Declared);
		assert!("random".parse::<EvaluationOrder>().is_err());
	}

	#[test]
	fn bulk_load_skips_bad_values() {
		let store = RuleStore::from_values([
			"certs:read:allow (read) user=anybody",
			"broken",
			"profiles:read,modify:allow (read) group=Agents",
		]);
		assert_eq!(store.len(), 2);
		assert!(store.get("certs").is_some());
		assert!(store.get("broken").is_none());
	}

	#[test]
	fn insert_replaces_and_serializes_sorted() {
		let mut store = RuleStore::from_values(["b:read:allow (read) user=x"]);
		store.insert(parse_acl("a:read:allow (read) user=y").unwrap());
		let previous = store.insert(parse_acl("b:read,write:allow (write) user=z").unwrap());
		assert!(previous.is_some());
		assert_eq!(
			store.serialize(),
			vec![
				"a:read:allow (read) user=\"y\"".to_string(),
				"b:read,write:allow (write) user=\"z\"".to_string(),
			]
		);
	}
}
