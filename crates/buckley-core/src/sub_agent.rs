// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Sub-Agent Orchestrator: a bounded, nested tool-use session spawned from
//! inside a running tool call. Shares the depth guard across every nested
//! spawn so a runaway chain of sub-agents cannot recurse unboundedly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use buckley_model::CompletionClient;
use buckley_tools::ToolRegistry;

use crate::cancellation::CancellationToken;
use crate::conversation::Conversation;
use crate::errors::BuckleyError;
use crate::runner::{RunOutcome, ToolRunner, ToolRunnerConfig};
use crate::trace::Trace;

pub struct SubAgentResult {
    pub summary: String,
    pub tool_calls_invoked: usize,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub trace: Trace,
}

/// Spawns nested tool-use sessions under a shared depth guard. One instance
/// is created per top-level run and handed down to every "task"-shaped
/// tool so depth is tracked across the whole invocation tree, not just one
/// branch of it.
pub struct SubAgentOrchestrator {
    client: Arc<dyn CompletionClient>,
    model_id: String,
    rate_in: f64,
    rate_out: f64,
    max_depth: usize,
    depth: Arc<AtomicUsize>,
}

impl SubAgentOrchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, model_id: impl Into<String>, rate_in: f64, rate_out: f64, max_depth: usize) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            rate_in,
            rate_out,
            max_depth,
            depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a child orchestrator sharing this one's depth counter, for
    /// handing to a nested tool runner that may itself spawn sub-agents.
    pub fn child(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            model_id: self.model_id.clone(),
            rate_in: self.rate_in,
            rate_out: self.rate_out,
            max_depth: self.max_depth,
            depth: Arc::clone(&self.depth),
        }
    }

    pub async fn spawn(
        &self,
        system_prompt: &str,
        task_prompt: &str,
        allowed_tools: &[&str],
        full_registry: &ToolRegistry,
        max_iterations: u32,
    ) -> Result<SubAgentResult, BuckleyError> {
        let current = self.depth.load(Ordering::SeqCst);
        if current >= self.max_depth {
            return Err(BuckleyError::InvalidInput(format!(
                "maximum sub-agent depth ({}) reached",
                self.max_depth
            )));
        }
        self.depth.fetch_add(1, Ordering::SeqCst);

        let sub_registry = full_registry.subset(allowed_tools);
        let mut conversation = Conversation::new(format!("sub-{current}"), usize::MAX);
        conversation.add_system(system_prompt);
        conversation.add_user(task_prompt);

        let runner = ToolRunner::new(
            Arc::clone(&self.client),
            self.model_id.clone(),
            ToolRunnerConfig { max_iterations, ..ToolRunnerConfig::default() },
        )
        .with_rates(self.rate_in, self.rate_out);

        let cancel = CancellationToken::new();
        let result = runner.run(&mut conversation, &sub_registry, &cancel).await;

        self.depth.fetch_sub(1, Ordering::SeqCst);

        let summary = match &result.outcome {
            RunOutcome::NaturalStop => result.final_text.clone().unwrap_or_else(|| "(sub-agent produced no text output)".to_string()),
            RunOutcome::MaxIterations => return Err(BuckleyError::BudgetExhausted { iterations: max_iterations }),
            RunOutcome::ContextCancelled => return Err(BuckleyError::ContextCancelled),
            RunOutcome::TransportError(e) => return Err(BuckleyError::TransportError(e.clone())),
        };

        Ok(SubAgentResult {
            summary,
            tool_calls_invoked: result.tool_calls_invoked.len(),
            input_tokens: result.usage.input_tokens,
            output_tokens: result.usage.output_tokens,
            trace: result.trace,
        })
    }
}
