// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prompt/response snapshots attached to a trace are truncated to this
/// length; secrets and full file contents are never logged beyond it.
pub const TRACE_SNAPSHOT_CHARS: usize = 500;

pub fn truncate_snapshot(text: &str) -> String {
    if text.chars().count() <= TRACE_SNAPSHOT_CHARS {
        text.to_string()
    } else {
        text.chars().take(TRACE_SNAPSHOT_CHARS).collect()
    }
}

/// An immutable record of one invocation: request snapshot, response,
/// usage, cost, duration, and any error.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub id: String,
    pub model_id: String,
    pub provider: String,
    pub request_snapshot: String,
    pub response_content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls_emitted: Vec<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub reasoning_tokens: u32,
    pub cost: f64,
    #[serde(skip)]
    pub duration: Duration,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Trace {
    pub fn new(id: impl Into<String>, model_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model_id: model_id.into(),
            provider: provider.into(),
            request_snapshot: String::new(),
            response_content: None,
            reasoning: None,
            tool_calls_emitted: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            reasoning_tokens: 0,
            cost: 0.0,
            duration: Duration::ZERO,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// One entry in the append-only Cost Ledger.
#[derive(Debug, Clone, Serialize)]
pub struct CostEntry {
    pub model_id: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: f64,
    pub latency: Duration,
    pub invocation_id: String,
}

/// Append-only log of cost entries across all invocations. Appends take a
/// mutex; reads return a snapshot copy.
#[derive(Default)]
pub struct Ledger {
    entries: std::sync::Mutex<Vec<CostEntry>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: CostEntry) {
        self.entries.lock().expect("ledger lock poisoned").push(entry);
    }

    pub fn snapshot(&self) -> Vec<CostEntry> {
        self.entries.lock().expect("ledger lock poisoned").clone()
    }

    pub fn total_cost(&self) -> f64 {
        self.entries.lock().expect("ledger lock poisoned").iter().map(|e| e.cost).sum()
    }
}

/// cost = input * rate_in + output * rate_out
pub fn compute_cost(input_tokens: u32, output_tokens: u32, rate_in: f64, rate_out: f64) -> f64 {
    input_tokens as f64 * rate_in + output_tokens as f64 * rate_out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_snapshot_keeps_short_strings_intact() {
        assert_eq!(truncate_snapshot("hello"), "hello");
    }

    #[test]
    fn truncate_snapshot_caps_long_strings_at_500_chars() {
        let long = "x".repeat(1000);
        assert_eq!(truncate_snapshot(&long).chars().count(), 500);
    }

    #[test]
    fn compute_cost_applies_separate_rates() {
        let cost = compute_cost(1000, 500, 0.000_003, 0.000_015);
        assert!((cost - (1000.0 * 0.000_003 + 500.0 * 0.000_015)).abs() < 1e-12);
    }

    #[test]
    fn ledger_accumulates_total_cost() {
        let ledger = Ledger::new();
        ledger.record(CostEntry {
            model_id: "m".into(),
            input_tokens: 10,
            output_tokens: 5,
            cost: 1.0,
            latency: Duration::from_millis(10),
            invocation_id: "1".into(),
        });
        ledger.record(CostEntry {
            model_id: "m".into(),
            input_tokens: 10,
            output_tokens: 5,
            cost: 2.0,
            latency: Duration::from_millis(10),
            invocation_id: "2".into(),
        });
        assert_eq!(ledger.total_cost(), 3.0);
        assert_eq!(ledger.snapshot().len(), 2);
    }
}
