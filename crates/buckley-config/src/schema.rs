// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolRunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier forwarded to the model crate's driver registry.
    pub provider: String,
    /// Model name forwarded to the provider API.
    pub name: String,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Dollars per input token, used by the Cost Ledger.
    #[serde(default = "default_rate_in")]
    pub rate_in: f64,
    /// Dollars per output token, used by the Cost Ledger.
    #[serde(default = "default_rate_out")]
    pub rate_out: f64,
}

fn default_rate_in() -> f64 {
    0.000_003
}
fn default_rate_out() -> f64 {
    0.000_015
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "mock".into(),
            name: "mock-model".into(),
            api_key_env: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            rate_in: default_rate_in(),
            rate_out: default_rate_out(),
        }
    }
}

/// Strategy used when compacting a conversation.
///
/// `Structured` produces a typed Markdown checkpoint with fixed sections;
/// `Narrative` uses a free-form summarisation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompactionStrategy {
    #[default]
    Structured,
    Narrative,
}

impl std::fmt::Display for CompactionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompactionStrategy::Structured => write!(f, "structured"),
            CompactionStrategy::Narrative => write!(f, "narrative"),
        }
    }
}

fn default_max_iterations() -> u32 {
    25
}
fn default_compaction_threshold() -> f32 {
    0.9
}
fn default_max_compactions() -> u32 {
    2
}
fn default_compaction_keep_recent() -> usize {
    6
}
fn default_tool_batch_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum completion/tool-batch round-trips before `BudgetExhausted`.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Token fraction of the model's context window at which compaction
    /// triggers, compared against `current_tokens / max_context`.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f32,
    /// Number of compactions permitted for one conversation before the
    /// Conversation Store stops triggering new ones.
    #[serde(default = "default_max_compactions")]
    pub max_compactions: u32,
    /// Number of most-recent messages left untouched by compaction.
    #[serde(default = "default_compaction_keep_recent")]
    pub compaction_keep_recent: usize,
    #[serde(default)]
    pub compaction_strategy: CompactionStrategy,
    /// Upper bound on concurrent tool executions within one iteration's batch.
    #[serde(default = "default_tool_batch_concurrency")]
    pub tool_batch_concurrency: usize,
    #[serde(default = "default_true")]
    pub prefer_provider_reasoning_tokens: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            compaction_threshold: default_compaction_threshold(),
            max_compactions: default_max_compactions(),
            compaction_keep_recent: default_compaction_keep_recent(),
            compaction_strategy: CompactionStrategy::default(),
            tool_batch_concurrency: default_tool_batch_concurrency(),
            prefer_provider_reasoning_tokens: true,
        }
    }
}

fn default_bus_buffer_size() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRunnerConfig {
    /// Per-subscriber bounded delivery buffer on the Event Bus.
    #[serde(default = "default_bus_buffer_size")]
    pub event_bus_buffer_size: usize,
    /// Maximum nesting depth for the Sub-Agent Orchestrator.
    #[serde(default = "default_max_sub_agent_depth")]
    pub max_sub_agent_depth: usize,
}

fn default_max_sub_agent_depth() -> usize {
    3
}

impl Default for ToolRunnerConfig {
    fn default() -> Self {
        Self {
            event_bus_buffer_size: default_bus_buffer_size(),
            max_sub_agent_depth: default_max_sub_agent_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_round_trips_through_json() {
        let cfg = Config::default();
        let s = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&s).unwrap();
        assert_eq!(back.agent.max_iterations, cfg.agent.max_iterations);
    }

    #[test]
    fn agent_config_defaults_match_design_values() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.max_iterations, 25);
        assert_eq!(cfg.max_compactions, 2);
        assert_eq!(cfg.compaction_keep_recent, 6);
        assert!((cfg.compaction_threshold - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_json_deserializes_to_defaults_via_missing_fields() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.tools.event_bus_buffer_size, 100);
    }
}
