// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parsing and rendering of `key=value` property files.
//!
//! The accepted syntax is the subset used by `CS.cfg` and `acl.properties`:
//!
//! - one `key=value` pair per line, split at the first `=`
//! - leading/trailing whitespace around keys and values is trimmed
//! - blank lines and lines starting with `#` or `!` are comments
//! - a trailing `\` joins the next line onto the current one
//! - a line without `=` is a key with an empty value

/// Parses property text into `(key, value)` pairs in file order.
///
/// Duplicate keys are all returned; callers that build maps get
/// "last one wins" for free.
pub fn parse_properties(input: &str) -> Vec<(String, String)> {
	let mut pairs = Vec::new();
	let mut pending = String::new();

	for raw in input.lines() {
		let line = raw.trim();

		if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
			continue;
		}

		if let Some(stripped) = line.strip_suffix('\\') {
			pending.push_str(stripped);
			continue;
		}

		pending.push_str(line);
		let logical = std::mem::take(&mut pending);
		if let Some(pair) = split_pair(&logical) {
			pairs.push(pair);
		}
	}

	if !pending.is_empty() {
		if let Some(pair) = split_pair(&pending) {
			pairs.push(pair);
		}
	}

	pairs
}

fn split_pair(line: &str) -> Option<(String, String)> {
	let (key, value) = match line.split_once('=') {
		Some((k, v)) => (k.trim(), v.trim()),
		None => (line.trim(), ""),
	};

	if key.is_empty() {
		return None;
	}

	Some((key.to_string(), value.to_string()))
}

/// Renders pairs back into property text, one `key=value` per line.
pub fn to_properties_string<'a, I>(pairs: I) -> String
where
	I: IntoIterator<Item = (&'a String, &'a String)>,
{
	let mut out = String::new();
	for (key, value) in pairs {
		out.push_str(key);
		out.push('=');
		out.push_str(value);
		out.push('\n');
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::BTreeMap;

	#[test]
	fn parses_simple_pairs() {
		let pairs = parse_properties("a=1\nb = two \n");
		assert_eq!(
			pairs,
			vec![
				("a".to_string(), "1".to_string()),
				("b".to_string(), "two".to_string()),
			]
		);
	}

	#[test]
	fn skips_comments_and_blank_lines() {
		let input = "# comment\n! also a comment\n\n  \nkey=value\n";
		let pairs = parse_properties(input);
		assert_eq!(pairs, vec![("key".to_string(), "value".to_string())]);
	}

	#[test]
	fn splits_at_first_equals_only() {
		let pairs = parse_properties("expr=group=\"Agents\"");
		assert_eq!(pairs[0].1, "group=\"Agents\"");
	}

	#[test]
	fn joins_continuation_lines() {
		let input = "acl=certs:read,\\\n  approve:allow (read) user=\"anybody\"\nnext=1";
		let pairs = parse_properties(input);
		assert_eq!(pairs.len(), 2);
		assert_eq!(pairs[0].1, "certs:read,approve:allow (read) user=\"anybody\"");
		assert_eq!(pairs[1], ("next".to_string(), "1".to_string()));
	}

	#[test]
	fn line_without_equals_is_empty_value() {
		let pairs = parse_properties("lonely");
		assert_eq!(pairs, vec![("lonely".to_string(), String::new())]);
	}

	#[test]
	fn empty_key_is_dropped() {
		assert!(parse_properties("=value").is_empty());
	}

	#[test]
	fn duplicates_are_preserved_in_order() {
		let pairs = parse_properties("k=1\nk=2");
		assert_eq!(pairs.len(), 2);
		let map: BTreeMap<_, _> = pairs.into_iter().collect();
		assert_eq!(map["k"], "2");
	}

	proptest! {
		#[test]
		fn rendered_pairs_parse_back(
			entries in proptest::collection::btree_map("[a-z][a-z0-9.]{0,12}", "[a-zA-Z0-9 ,:;]{0,20}", 0..10)
		) {
			let text = to_properties_string(&entries);
			let parsed: BTreeMap<String, String> = parse_properties(&text).into_iter().collect();
			let expected: BTreeMap<String, String> = entries
				.iter()
				.map(|(k, v)| (k.clone(), v.trim().to_string()))
				.collect();
			prop_assert_eq!(parsed, expected);
		}
	}
}
