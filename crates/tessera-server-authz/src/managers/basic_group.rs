// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::manager::{AuthzManager, ManagerInit};
use crate::token::{AuthToken, AuthzToken};

/// Grants every operation to members of one configured group.
#[derive(Debug)]
pub struct BasicGroupAuthz {
	name: String,
	group: String,
}

impl BasicGroupAuthz {
	pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			group: group.into(),
		}
	}

	pub fn factory(init: ManagerInit) -> Result<Arc<dyn AuthzManager>> {
		let group = init.config.get_string("group")?;
		if group.trim().is_empty() {
			return Err(AuthzError::Configuration(format!(
				"{}.group must not be empty",
				init.config.path()
			)));
		}
		Ok(Arc::new(Self::new(init.name, group.trim())))
	}

	pub fn group(&self) -> &str {
		&self.group
	}
}

#[async_trait]
impl AuthzManager for BasicGroupAuthz {
	fn name(&self) -> &str {
		&self.name
	}

	async fn authorize(&self, token: &AuthToken, resource: &str, operation: &str) -> Result<AuthzToken> {
		if token.is_member_of(&self.group) {
			Ok(AuthzToken::granted(&self.name, resource, operation))
		} else {
			debug!(manager = %self.name, user = token.user_id(), group = %self.group, "subject is not in required group");
			Err(AuthzError::access_denied(&self.name, resource, operation))
		}
	}
}
