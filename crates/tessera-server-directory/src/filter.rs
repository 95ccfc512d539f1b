// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! LDAP-style search filters.
//!
//! Supported syntax:
//!
//! ```text
//! (attr=value)     equality, case-insensitive
//! (attr=*)         presence
//! (&(f1)(f2)...)   conjunction
//! (|(f1)(f2)...)   disjunction
//! (!(f))           negation
//! ```

use std::fmt;
use std::str::FromStr;

use crate::entry::DirectoryEntry;
use crate::error::{DirectoryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
	Equals { attribute: String, value: String },
	Present { attribute: String },
	And(Vec<SearchFilter>),
	Or(Vec<SearchFilter>),
	Not(Box<SearchFilter>),
}

impl SearchFilter {
	/// `(objectclass=*)`, the conventional "match everything" filter.
	pub fn any() -> Self {
		SearchFilter::Present {
			attribute: "objectclass".to_string(),
		}
	}

	pub fn equals(attribute: &str, value: &str) -> Self {
		SearchFilter::Equals {
			attribute: attribute.to_string(),
			value: value.to_string(),
		}
	}

	pub fn parse(input: &str) -> Result<Self> {
		let mut parser = Parser {
			input,
			chars: input.char_indices().peekable(),
		};
		let filter = parser.filter()?;
		parser.skip_ws();
		if parser.chars.peek().is_some() {
			return Err(parser.error("trailing characters after filter"));
		}
		Ok(filter)
	}

	pub fn matches(&self, entry: &DirectoryEntry) -> bool {
		match self {
			SearchFilter::Equals { attribute, value } => entry
				.get(attribute)
				.map(|values| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
				.unwrap_or(false),
			SearchFilter::Present { attribute } => {
				// Entries here carry no schema; treat objectclass as always present.
				attribute.eq_ignore_ascii_case("objectclass") || entry.get(attribute).is_some()
			}
			SearchFilter::And(filters) => filters.iter().all(|f| f.matches(entry)),
			SearchFilter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
			SearchFilter::Not(filter) => !filter.matches(entry),
		}
	}
}

impl FromStr for SearchFilter {
	type Err = DirectoryError;

	fn from_str(s: &str) -> Result<Self> {
		SearchFilter::parse(s)
	}
}

impl fmt::Display for SearchFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SearchFilter::Equals { attribute, value } => write!(f, "({attribute}={value})"),
			SearchFilter::Present { attribute } => write!(f, "({attribute}=*)"),
			SearchFilter::And(filters) => {
				f.write_str("(&")?;
				for filter in filters {
					write!(f, "{filter}")?;
				}
				f.write_str(")")
			}
			SearchFilter::Or(filters) => {
				f.write_str("(|")?;
				for filter in filters {
					write!(f, "{filter}")?;
				}
				f.write_str(")")
			}
			SearchFilter::Not(filter) => write!(f, "(!{filter})"),
		}
	}
}

struct Parser<'a> {
	input: &'a str,
	chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
	fn filter(&mut self) -> Result<SearchFilter> {
		self.skip_ws();
		self.expect('(')?;
		self.skip_ws();

		let filter = match self.chars.peek().map(|(_, c)| *c) {
			Some('&') => {
				self.chars.next();
				SearchFilter::And(self.filter_list()?)
			}
			Some('|') => {
				self.chars.next();
				SearchFilter::Or(self.filter_list()?)
			}
			Some('!') => {
				self.chars.next();
				SearchFilter::Not(Box::new(self.filter()?))
			}
			Some(_) => self.item()?,
			None => return Err(self.error("unexpected end of filter")),
		};

		self.skip_ws();
		self.expect(')')?;
		Ok(filter)
	}

	fn filter_list(&mut self) -> Result<Vec<SearchFilter>> {
		let mut filters = Vec::new();
		loop {
			self.skip_ws();
			match self.chars.peek() {
				Some((_, '(')) => filters.push(self.filter()?),
				_ => break,
			}
		}
		if filters.is_empty() {
			return Err(self.error("empty filter list"));
		}
		Ok(filters)
	}

	fn item(&mut self) -> Result<SearchFilter> {
		let mut attribute = String::new();
		while let Some((_, c)) = self.chars.peek() {
			if *c == '=' || *c == ')' {
				break;
			}
			attribute.push(*c);
			self.chars.next();
		}
		let attribute = attribute.trim().to_string();
		if attribute.is_empty() {
			return Err(self.error("missing attribute name"));
		}
		self.expect('=')?;

		let mut value = String::new();
		while let Some((_, c)) = self.chars.peek() {
			if *c == ')' {
				break;
			}
			value.push(*c);
			self.chars.next();
		}

		if value == "*" {
			Ok(SearchFilter::Present { attribute })
		} else {
			Ok(SearchFilter::Equals { attribute, value })
		}
	}

	fn expect(&mut self, expected: char) -> Result<()> {
		match self.chars.next() {
			Some((_, c)) if c == expected => Ok(()),
			Some((pos, c)) => Err(self.error(&format!(
				"expected '{expected}' at position {pos}, found '{c}'"
			))),
			None => Err(self.error(&format!("expected '{expected}' at end of filter"))),
		}
	}

	fn skip_ws(&mut self) {
		while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
			self.chars.next();
		}
	}

	fn error(&self, message: &str) -> DirectoryError {
		DirectoryError::InvalidFilter {
			filter: self.input.to_string(),
			message: message.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn acl_entry() -> DirectoryEntry {
		DirectoryEntry::new("cn=aclResources,o=tessera")
			.with_attribute("cn", ["aclResources"])
			.with_attribute("resourceACLS", ["certServer.ca.certs:read:allow (read) user=\"anybody\""])
	}

	#[test]
	fn parses_equality_and_presence() {
		assert_eq!(
			SearchFilter::parse("(cn=aclResources)").unwrap(),
			SearchFilter::equals("cn", "aclResources")
		);
		assert_eq!(
			SearchFilter::parse("(resourceACLS=*)").unwrap(),
			SearchFilter::Present {
				attribute: "resourceACLS".to_string()
			}
		);
	}

	#[test]
	fn parses_nested_boolean_filters() {
		let filter = SearchFilter::parse("(&(cn=aclResources)(|(resourceACLS=*)(!(ou=x))))").unwrap();
		assert!(filter.matches(&acl_entry()));
	}

	#[test]
	fn equality_is_case_insensitive() {
		assert!(SearchFilter::parse("(CN=ACLRESOURCES)").unwrap().matches(&acl_entry()));
		assert!(!SearchFilter::parse("(cn=other)").unwrap().matches(&acl_entry()));
	}

	#[test]
	fn objectclass_presence_matches_everything() {
		assert!(SearchFilter::any().matches(&DirectoryEntry::new("o=tessera")));
	}

	#[test]
	fn rejects_malformed_filters() {
		for bad in ["cn=x", "(cn=x", "(=x)", "(&)", "(cn=x))", ""] {
			assert!(
				matches!(SearchFilter::parse(bad), Err(DirectoryError::InvalidFilter { .. })),
				"expected {bad:?} to be rejected"
			);
		}
	}

	fn leaf() -> impl Strategy<Value = SearchFilter> {
		prop_oneof![
			("[a-z]{1,8}", "[a-zA-Z0-9 .]{1,8}")
				.prop_filter("value must not be a wildcard", |(_, v)| v.trim() != "*")
				.prop_map(|(a, v)| SearchFilter::equals(&a, &v)),
			"[a-z]{1,8}".prop_map(|a| SearchFilter::Present { attribute: a }),
		]
	}

	fn filter() -> impl Strategy<Value = SearchFilter> {
		leaf().prop_recursive(3, 16, 4, |inner| {
			prop_oneof![
				proptest::collection::vec(inner.clone(), 1..4).prop_map(SearchFilter::And),
				proptest::collection::vec(inner.clone(), 1..4).prop_map(SearchFilter::Or),
				inner.prop_map(|f| SearchFilter::Not(Box::new(f))),
			]
		})
	}

	proptest! {
		#[test]
		fn display_output_parses_back(f in filter()) {
			let rendered = f.to_string();
			prop_assert_eq!(SearchFilter::parse(&rendered).unwrap(), f);
		}
	}
}
