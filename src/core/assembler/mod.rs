// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Engine-facing pieces that do not depend on the pass driver.
//!
//! - [`scope`] - Routine reassembly scopes
//! - [`error`] - Error types and diagnostics

pub mod error;
pub mod scope;
