// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ACL model and its serialized form.
//!
//! ```text
//! resource:op1,op2:entry1;entry2[:description]
//! entry := ( allow | deny ) ( opA,opB ) <expression>
//! ```
//!
//! Separators inside double-quoted expression values are not significant.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::expression::{Expression, ExpressionError};
use crate::token::AuthToken;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclParseError {
	#[error("ACL '{text}' is missing its {field}")]
	MissingField { field: &'static str, text: String },

	#[error("ACL '{0}' has an empty resource name")]
	EmptyResource(String),

	#[error("ACL for '{resource}' declares an empty operation")]
	EmptyOperation { resource: String },

	#[error("invalid ACL entry '{entry}': {reason}")]
	InvalidEntry { entry: String, reason: String },

	#[error("invalid expression in ACL entry '{entry}': {source}")]
	Expression {
		entry: String,
		#[source]
		source: ExpressionError,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclEntryType {
	Allow,
	Deny,
}

impl fmt::Display for AclEntryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AclEntryType::Allow => f.write_str("allow"),
			AclEntryType::Deny => f.write_str("deny"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
	pub entry_type: AclEntryType,
	pub operations: Vec<String>,
	pub expression: Expression,
}

impl AclEntry {
	pub fn covers(&self, operation: &str) -> bool {
		self.operations.iter().any(|op| op == operation)
	}

	pub fn matches(&self, token: &AuthToken) -> bool {
		self.expression.evaluate(token)
	}
}

impl fmt::Display for AclEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} ({}) {}",
			self.entry_type,
			self.operations.join(","),
			self.expression
		)
	}
}

impl FromStr for AclEntry {
	type Err = AclParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let text = s.trim();
		let invalid = |reason: &str| AclParseError::InvalidEntry {
			entry: text.to_string(),
			reason: reason.to_string(),
		};

		let (keyword, rest) = text
			.split_once(|c: char| c.is_whitespace() || c == '(')
			.map(|(k, _)| (k, &text[k.len()..]))
			.ok_or_else(|| invalid("expected 'allow' or 'deny' followed by operations"))?;

		let entry_type = match keyword.to_ascii_lowercase().as_str() {
			"allow" => AclEntryType::Allow,
			"deny" => AclEntryType::Deny,
			_ => return Err(invalid("expected 'allow' or 'deny'")),
		};

		let rest = rest
			.trim_start()
			.strip_prefix('(')
			.ok_or_else(|| invalid("expected '(' before operations"))?;
		let (ops, expr) = rest
			.split_once(')')
			.ok_or_else(|| invalid("expected ')' after operations"))?;

		let operations: Vec<String> = ops.split(',').map(|o| o.trim().to_string()).collect();
		if operations.iter().any(String::is_empty) {
			return Err(invalid("empty operation name"));
		}

		let expression = Expression::parse(expr).map_err(|source| AclParseError::Expression {
			entry: text.to_string(),
			source,
		})?;

		Ok(AclEntry {
			entry_type,
			operations,
			expression,
		})
	}
}

/// Access rules for one protected resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
	pub resource: String,
	/// Operations the resource declares; anything else is implicitly denied.
	pub rights: Vec<String>,
	pub entries: Vec<AclEntry>,
	pub description: Option<String>,
}

impl Acl {
	pub fn declares(&self, operation: &str) -> bool {
		self.rights.iter().any(|r| r == operation)
	}

	/// Builds an ACL from the pieces `update_acls` receives.
	pub fn from_parts(
		resource: &str,
		rights: &str,
		entries: &str,
		description: Option<&str>,
	) -> Result<Self, AclParseError> {
		let mut acl = parse_acl(&format!("{resource}:{rights}:{entries}"))?;
		acl.description = description
			.map(str::trim)
			.filter(|d| !d.is_empty())
			.map(str::to_string);
		Ok(acl)
	}
}

impl fmt::Display for Acl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:", self.resource, self.rights.join(","))?;
		for (i, entry) in self.entries.iter().enumerate() {
			if i > 0 {
				f.write_str(";")?;
			}
			write!(f, "{entry}")?;
		}
		if let Some(description) = &self.description {
			write!(f, ":{description}")?;
		}
		Ok(())
	}
}

impl FromStr for Acl {
	type Err = AclParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_acl(s)
	}
}

pub fn parse_acl(text: &str) -> Result<Acl, AclParseError> {
	let fields = split_unquoted(text, ':', 4);
	let missing = |field| AclParseError::MissingField {
		field,
		text: text.to_string(),
	};

	let resource = fields.first().map(|r| r.trim()).unwrap_or_default();
	if resource.is_empty() {
		return Err(AclParseError::EmptyResource(text.to_string()));
	}
	let rights_field = fields.get(1).ok_or_else(|| missing("rights"))?;
	let entries_field = fields.get(2).ok_or_else(|| missing("entries"))?;

	let rights: Vec<String> = rights_field
		.split(',')
		.map(|r| r.trim().to_string())
		.collect();
	if rights.iter().any(String::is_empty) {
		return Err(AclParseError::EmptyOperation {
			resource: resource.to_string(),
		});
	}

	let entries = split_unquoted(entries_field, ';', usize::MAX)
		.into_iter()
		.filter(|e| !e.trim().is_empty())
		.map(str::parse)
		.collect::<Result<Vec<AclEntry>, _>>()?;

	let description = fields
		.get(3)
		.map(|d| d.trim())
		.filter(|d| !d.is_empty())
		.map(str::to_string);

	Ok(Acl {
		resource: resource.to_string(),
		rights,
		entries,
		description,
	})
}

/// Splits on `sep` outside double quotes into at most `max` pieces; the last
/// piece keeps any remaining separators.
fn split_unquoted(text: &str, sep: char, max: usize) -> Vec<&str> {
	let mut pieces = Vec::new();
	let mut start = 0;
	let mut in_quotes = false;
	let mut escaped = false;

	for (i, ch) in text.char_indices() {
		if pieces.len() + 1 == max {
			break;
		}
		if escaped {
			escaped = false;
			continue;
		}
		match ch {
			'\\' if in_quotes => escaped = true,
			'"' => in_quotes = !in_quotes,
			c if c == sep && !in_quotes => {
				pieces.push(&text[start..i]);
				start = i + c.len_utf8();
			}
			_ => {}
		}
	}

	pieces.push(&text[start..]);
	pieces
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::expression::CompareOp;
	use proptest::prelude::*;

	const CERTS: &str = "certServer.ca.certs:execute,read:allow (execute,read) group=\"Certificate Manager Agents\";deny (execute) user=\"bob\":Agents may read and execute";

	#[test]
	fn parses_full_acl() {
		let acl = parse_acl(CERTS).unwrap();
		assert_eq!(acl.resource, "certServer.ca.certs");
		assert_eq!(acl.rights, vec!["execute", "read"]);
		assert_eq!(acl.entries.len(), 2);
		assert_eq!(acl.entries[0].entry_type, AclEntryType::Allow);
		assert_eq!(acl.entries[0].operations, vec!["execute", "read"]);
		assert_eq!(acl.entries[1].entry_type, AclEntryType::Deny);
		assert_eq!(
			acl.entries[1].expression,
			Expression::compare("user", CompareOp::Eq, "bob")
		);
		assert_eq!(acl.description.as_deref(), Some("Agents may read and execute"));
	}

	#[test]
	fn description_is_optional_and_may_contain_colons() {
		let acl = parse_acl("certs:read:allow (read) user=anybody").unwrap();
		assert!(acl.description.is_none());

		let acl = parse_acl("certs:read:allow (read) user=anybody:see: RFC 5280").unwrap();
		assert_eq!(acl.description.as_deref(), Some("see: RFC 5280"));
	}

	#[test]
	fn separators_inside_quotes_are_literal() {
		let acl = parse_acl("certs:read:allow (read) ou=\"a;b:c\";deny (read) user=x").unwrap();
		assert_eq!(acl.entries.len(), 2);
		assert_eq!(
			acl.entries[0].expression,
			Expression::compare("ou", CompareOp::Eq, "a;b:c")
		);
	}

	#[test]
	fn rejects_malformed_acls() {
		assert!(matches!(
			parse_acl(":read:allow (read) user=x"),
			Err(AclParseError::EmptyResource(_))
		));
		assert!(matches!(
			parse_acl("certs:read"),
			Err(AclParseError::MissingField { field: "entries", .. })
		));
		assert!(matches!(
			parse_acl("certs:read,,write:allow (read) user=x"),
			Err(AclParseError::EmptyOperation { .. })
		));
		assert!(matches!(
			parse_acl("certs:read:permit (read) user=x"),
			Err(AclParseError::InvalidEntry { .. })
		));
		assert!(matches!(
			parse_acl("certs:read:allow read user=x"),
			Err(AclParseError::InvalidEntry { .. })
		));
		assert!(matches!(
			parse_acl("certs:read:allow (read) user="),
			Err(AclParseError::Expression { .. })
		));
	}

	#[test]
	fn entry_keyword_is_case_insensitive() {
		let entry: AclEntry = "DENY(read) user=x".parse().unwrap();
		assert_eq!(entry.entry_type, AclEntryType::Deny);
		assert!(entry.covers("read"));
		assert!(!entry.covers("write"));
	}

	#[test]
	fn from_parts_sets_description() {
		let acl = Acl::from_parts("certs", "read", "allow (read) user=anybody", Some("  ")).unwrap();
		assert!(acl.description.is_none());
		let acl = Acl::from_parts("certs", "read", "allow (read) user=anybody", Some("public")).unwrap();
		assert_eq!(acl.description.as_deref(), Some("public"));
	}

	fn arb_op() -> impl Strategy<Value = String> {
		"[a-z]{1,8}"
	}

	fn arb_entry() -> impl Strategy<Value = AclEntry> {
		(
			prop_oneof![Just(AclEntryType::Allow), Just(AclEntryType::Deny)],
			proptest::collection::vec(arb_op(), 1..4),
			prop_oneof![Just("user"), Just("group"), Just("role")],
			"[a-zA-Z0-9 ;:\"]{0,16}",
		)
			.prop_map(|(entry_type, operations, attr, value)| AclEntry {
				entry_type,
				operations,
				expression: Expression::compare(attr, CompareOp::Eq, &value),
			})
	}

	fn arb_acl() -> impl Strategy<Value = Acl> {
		(
			"[a-zA-Z][a-zA-Z0-9.]{0,20}",
			proptest::collection::vec(arb_op(), 1..4),
			proptest::collection::vec(arb_entry(), 0..4),
			proptest::option::of("[a-zA-Z0-9][a-zA-Z0-9 :;,]{0,20}[a-zA-Z0-9]"),
		)
			.prop_map(|(resource, rights, entries, description)| Acl {
				resource,
				rights,
				entries,
				description,
			})
	}

	proptest! {
		#[test]
		fn serialized_acl_parses_back(acl in arb_acl()) {
			let text = acl.to_string();
			prop_assert_eq!(parse_acl(&text).unwrap(), acl);
		}
	}
}
