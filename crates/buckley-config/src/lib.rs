// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Typed configuration for the Buckley tool-use orchestration engine.

mod schema;

pub use schema::{
    AgentConfig, CompactionStrategy, Config, ModelConfig, ToolRunnerConfig,
};
