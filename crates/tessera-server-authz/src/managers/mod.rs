// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod basic_group;
pub mod dir_acl;
pub mod external;

pub use basic_group::BasicGroupAuthz;
pub use dir_acl::DirAclAuthz;
pub use external::ExternalAuthz;

use tessera_common_config::ConfigStore;

use crate::error::{AuthzError, Result};
use crate::rule_store::EvaluationOrder;

pub(crate) const EVALUATE_ORDER_KEY: &str = "evaluateOrder";

pub(crate) fn evaluation_order(config: &ConfigStore) -> Result<EvaluationOrder> {
	match config.get(EVALUATE_ORDER_KEY) {
		Some(value) => value.parse().map_err(|e: String| {
			AuthzError::Configuration(format!("{}.{EVALUATE_ORDER_KEY}: {e}", config.path()))
		}),
		None => Ok(EvaluationOrder::default()),
	}
}
