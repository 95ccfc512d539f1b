// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod audit;
mod directory;
mod logging;
mod paths;

pub use audit::*;
pub use directory::*;
pub use logging::*;
pub use paths::*;
