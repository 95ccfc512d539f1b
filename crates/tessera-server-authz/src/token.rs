// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity and decision tokens.
//!
//! - [`AuthToken`]: immutable identity attributes produced by authentication
//! - [`AuthzToken`]: the result of a successful authorization check
//! - [`Principal`]: who is calling, as seen by the request filter

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token attribute holding the realm an external principal authenticated in.
pub const REALM_ATTRIBUTE: &str = "realm";
/// Token attribute holding the roles of an external principal.
pub const ROLES_ATTRIBUTE: &str = "roles";

/// Identity attributes of an authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
	user_id: String,
	groups: Vec<String>,
	auth_manager: String,
	attributes: BTreeMap<String, Vec<String>>,
}

impl AuthToken {
	pub fn new(user_id: impl Into<String>, auth_manager: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			groups: Vec::new(),
			auth_manager: auth_manager.into(),
			attributes: BTreeMap::new(),
		}
	}

	pub fn with_groups<I, S>(mut self, groups: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.groups = groups.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_attribute<I, S>(mut self, name: &str, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self
			.attributes
			.insert(name.to_string(), values.into_iter().map(Into::into).collect());
		self
	}

	pub fn user_id(&self) -> &str {
		&self.user_id
	}

	pub fn groups(&self) -> &[String] {
		&self.groups
	}

	pub fn auth_manager(&self) -> &str {
		&self.auth_manager
	}

	pub fn attribute(&self, name: &str) -> Option<&[String]> {
		self.attributes.get(name).map(Vec::as_slice)
	}

	/// Group names compare case-insensitively, as directory group CNs do.
	pub fn is_member_of(&self, group: &str) -> bool {
		self.groups.iter().any(|g| g.eq_ignore_ascii_case(group))
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.is_member_of(role)
			|| self
				.attribute(ROLES_ATTRIBUTE)
				.map(|roles| roles.iter().any(|r| r.eq_ignore_ascii_case(role)))
				.unwrap_or(false)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthzStatus {
	Success,
}

/// Proof that `manager` granted `operation` on `resource`. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzToken {
	pub manager: String,
	pub resource: String,
	pub operation: String,
	pub status: AuthzStatus,
	pub granted_at: DateTime<Utc>,
}

impl AuthzToken {
	pub fn granted(manager: &str, resource: &str, operation: &str) -> Self {
		Self {
			manager: manager.to_string(),
			resource: resource.to_string(),
			operation: operation.to_string(),
			status: AuthzStatus::Success,
			granted_at: Utc::now(),
		}
	}
}

/// A principal authenticated by an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPrincipal {
	pub name: String,
	pub realm: String,
	pub roles: Vec<String>,
}

impl ExternalPrincipal {
	pub fn new<I, S>(name: impl Into<String>, realm: impl Into<String>, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			name: name.into(),
			realm: realm.into(),
			roles: roles.into_iter().map(Into::into).collect(),
		}
	}

	/// Synthesizes an [`AuthToken`] from realm claims; roles become groups.
	pub fn to_token(&self) -> AuthToken {
		AuthToken::new(&self.name, format!("external:{}", self.realm))
			.with_groups(self.roles.iter().cloned())
			.with_attribute(REALM_ATTRIBUTE, [self.realm.clone()])
			.with_attribute(ROLES_ATTRIBUTE, self.roles.iter().cloned())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
	/// Authenticated by one of the server's own authentication managers.
	/// The token is absent when authentication did not attach one.
	Internal { name: String, token: Option<AuthToken> },
	External(ExternalPrincipal),
}

impl Principal {
	pub fn internal(token: AuthToken) -> Self {
		Principal::Internal {
			name: token.user_id().to_string(),
			token: Some(token),
		}
	}

	pub fn name(&self) -> &str {
		match self {
			Principal::Internal { name, .. } => name,
			Principal::External(p) => &p.name,
		}
	}
}
