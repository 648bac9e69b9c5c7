// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Re-exported from `buckley-tools`: `Tool::execute` needs to race against
//! cancellation too, and `buckley-tools` sits below this crate in the
//! dependency graph, so the type is defined there and surfaced here under
//! its established name.

pub use buckley_tools::CancellationToken;
