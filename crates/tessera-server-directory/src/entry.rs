// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory entries, distinguished names and modifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical form of a distinguished name used for comparisons.
///
/// RDN components are trimmed and lowercased: `CN=aclResources, O=Tessera`
/// and `cn=aclresources,o=tessera` name the same entry.
pub fn normalize_dn(dn: &str) -> String {
	dn.split(',')
		.map(|rdn| rdn.trim().to_ascii_lowercase())
		.filter(|rdn| !rdn.is_empty())
		.collect::<Vec<_>>()
		.join(",")
}

/// Normalized DN of the parent entry, or `None` for a single-RDN name.
pub fn parent_dn(dn: &str) -> Option<String> {
	let normalized = normalize_dn(dn);
	normalized.split_once(',').map(|(_, parent)| parent.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
	/// Only the base entry itself.
	Base,
	/// Immediate children of the base, excluding the base.
	OneLevel,
	/// The base and everything below it.
	Subtree,
}

impl SearchScope {
	/// Whether `dn` falls in this scope relative to `base`.
	pub fn contains(self, base: &str, dn: &str) -> bool {
		let base = normalize_dn(base);
		let dn = normalize_dn(dn);
		match self {
			SearchScope::Base => dn == base,
			SearchScope::OneLevel => parent_dn(&dn).as_deref() == Some(base.as_str()),
			SearchScope::Subtree => dn == base || dn.ends_with(&format!(",{base}")),
		}
	}
}

/// A named entry with multi-valued attributes.
///
/// Attribute names compare case-insensitively; the spelling of the first
/// write is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
	pub dn: String,
	pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
	pub fn new(dn: impl Into<String>) -> Self {
		Self {
			dn: dn.into(),
			attributes: BTreeMap::new(),
		}
	}

	pub fn with_attribute<I, V>(mut self, name: &str, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<String>,
	{
		self.set(name, values.into_iter().map(Into::into).collect());
		self
	}

	pub fn normalized_dn(&self) -> String {
		normalize_dn(&self.dn)
	}

	pub fn get(&self, name: &str) -> Option<&[String]> {
		self
			.attributes
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_slice())
	}

	pub fn first(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(|v| v.first()).map(String::as_str)
	}

	pub fn set(&mut self, name: &str, values: Vec<String>) {
		let key = self.key_for(name);
		if values.is_empty() {
			self.attributes.remove(&key);
		} else {
			self.attributes.insert(key, values);
		}
	}

	pub fn apply(&mut self, modification: &Modification) {
		match modification {
			Modification::Replace { name, values } => self.set(name, values.clone()),
			Modification::Add { name, values } => {
				let key = self.key_for(name);
				let existing = self.attributes.entry(key).or_default();
				for value in values {
					if !existing.contains(value) {
						existing.push(value.clone());
					}
				}
			}
			Modification::Delete { name } => {
				let key = self.key_for(name);
				self.attributes.remove(&key);
			}
		}
	}

	fn key_for(&self, name: &str) -> String {
		self
			.attributes
			.keys()
			.find(|k| k.eq_ignore_ascii_case(name))
			.cloned()
			.unwrap_or_else(|| name.to_string())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Modification {
	/// Replace every value of the attribute; an empty list removes it.
	Replace { name: String, values: Vec<String> },
	/// Append values not already present.
	Add { name: String, values: Vec<String> },
	Delete { name: String },
}

impl Modification {
	pub fn replace<I, V>(name: &str, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<String>,
	{
		Modification::Replace {
			name: name.to_string(),
			values: values.into_iter().map(Into::into).collect(),
		}
	}
}
