// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The iterative Tool Runner: the multi-turn loop, tool dispatch, budget
//! enforcement, and duplicate-call suppression. The hard part.

use std::collections::HashMap;
use std::sync::Arc;

use buckley_model::{
    CompletionClient, CompletionRequest, Message, ToolCallRequest, ToolChoice, Usage as ModelUsage,
};
use buckley_tools::{to_openai_format, ToolCall as RegistryToolCall, ToolRegistry};
use chrono::Utc;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::conversation::Conversation;
use crate::dedup::dedup_key;
use crate::errors::BuckleyError;
use crate::invoker::ModelInvoker;
use crate::trace::{compute_cost, truncate_snapshot, CostEntry, Ledger, Trace};

/// System prompt handed to the Model Invoker when compacting a conversation
/// that has crossed its context-fraction threshold.
const COMPACTION_SYSTEM_PROMPT: &str = "Summarize the preceding conversation for an AI agent that will continue the task. \
Preserve decisions made, file paths touched, and any unresolved question. Be terse.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NaturalStop,
    MaxIterations,
    ContextCancelled,
    TransportError(String),
}

pub struct RunResult {
    pub outcome: RunOutcome,
    pub final_text: Option<String>,
    pub tool_calls_invoked: Vec<ToolCallRequest>,
    pub usage: ModelUsage,
    pub trace: Trace,
}

pub struct ToolRunnerConfig {
    pub max_iterations: u32,
    pub tool_batch_concurrency: usize,
    /// Context fraction (`token_count / max_context_tokens`) at or above
    /// which the conversation is compacted before the next request.
    pub compaction_threshold: f32,
    /// Upper bound on compactions performed for one conversation; once
    /// reached, the conversation is sent as-is even past the threshold.
    pub max_compactions: u32,
    /// Most-recent messages left untouched by compaction.
    pub compaction_keep_recent: usize,
}

impl Default for ToolRunnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tool_batch_concurrency: 4,
            compaction_threshold: 0.9,
            max_compactions: 2,
            compaction_keep_recent: 6,
        }
    }
}

impl From<&buckley_config::AgentConfig> for ToolRunnerConfig {
    fn from(cfg: &buckley_config::AgentConfig) -> Self {
        Self {
            max_iterations: cfg.max_iterations,
            tool_batch_concurrency: cfg.tool_batch_concurrency,
            compaction_threshold: cfg.compaction_threshold,
            max_compactions: cfg.max_compactions,
            compaction_keep_recent: cfg.compaction_keep_recent,
        }
    }
}

pub struct ToolRunner {
    client: Arc<dyn CompletionClient>,
    model_id: String,
    rate_in: f64,
    rate_out: f64,
    config: ToolRunnerConfig,
    ledger: Option<Arc<Ledger>>,
}

impl ToolRunner {
    pub fn new(client: Arc<dyn CompletionClient>, model_id: impl Into<String>, config: ToolRunnerConfig) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            rate_in: 0.0,
            rate_out: 0.0,
            config,
            ledger: None,
        }
    }

    pub fn with_rates(mut self, rate_in: f64, rate_out: f64) -> Self {
        self.rate_in = rate_in;
        self.rate_out = rate_out;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Summarize `conversation` and apply the result, if it has crossed the
    /// configured context-fraction threshold and compaction budget remains.
    /// No-op otherwise.
    async fn compact(&self, conversation: &mut Conversation) {
        if !conversation.should_compact(self.config.compaction_threshold, self.config.max_compactions) {
            return;
        }
        let transcript = conversation
            .messages()
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.as_text()))
            .collect::<Vec<_>>()
            .join("\n");
        let invoker = ModelInvoker::new(Arc::clone(&self.client), self.model_id.clone(), self.rate_in, self.rate_out);
        let (result, _trace) = invoker.invoke_text(COMPACTION_SYSTEM_PROMPT, &transcript).await;
        match result {
            Ok(summary) => conversation.apply_compaction(summary, self.config.compaction_keep_recent),
            Err(e) => {
                tracing::warn!(error = %e, "compaction summarization failed, continuing with uncompacted conversation");
            }
        }
    }

    pub async fn run(
        &self,
        conversation: &mut Conversation,
        registry: &ToolRegistry,
        cancel: &CancellationToken,
    ) -> RunResult {
        let mut trace = Trace::new(Uuid::new_v4().to_string(), self.model_id.clone(), self.client.name());
        let mut usage = ModelUsage::default();
        let mut tool_calls_invoked: Vec<ToolCallRequest> = Vec::new();
        // Keyed by (tool_name, canonicalized arguments) -> (content, is_error,
        // is_truncated) of the first execution, fed back verbatim on any repeat.
        let mut dedup_cache: HashMap<String, (String, bool, bool)> = HashMap::new();

        let tool_wire: Vec<serde_json::Value> = registry.list().iter().map(to_openai_format).collect();

        let mut iteration: u32 = 0;
        loop {
            if iteration >= self.config.max_iterations {
                return RunResult {
                    outcome: RunOutcome::MaxIterations,
                    final_text: None,
                    tool_calls_invoked,
                    usage,
                    trace,
                };
            }

            if cancel.is_cancelled() {
                return RunResult {
                    outcome: RunOutcome::ContextCancelled,
                    final_text: None,
                    tool_calls_invoked,
                    usage,
                    trace,
                };
            }

            self.compact(conversation).await;

            let req = CompletionRequest {
                messages: conversation.messages().to_vec(),
                tools: tool_wire.clone(),
                tool_choice: ToolChoice::Auto,
                temperature: None,
                max_tokens: None,
            };
            trace.request_snapshot = truncate_snapshot(&format!("{} messages", req.messages.len()));

            let resp = tokio::select! {
                _ = cancel.cancelled() => {
                    return RunResult {
                        outcome: RunOutcome::ContextCancelled,
                        final_text: None,
                        tool_calls_invoked,
                        usage,
                        trace,
                    };
                }
                resp = self.client.chat_completion(req) => resp,
            };

            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(error = %e, iteration, "model completion request failed");
                    trace.error = Some(e.to_string());
                    return RunResult {
                        outcome: RunOutcome::TransportError(e.to_string()),
                        final_text: None,
                        tool_calls_invoked,
                        usage,
                        trace,
                    };
                }
            };

            usage.input_tokens += resp.usage.input_tokens;
            usage.output_tokens += resp.usage.output_tokens;
            if let Some(r) = resp.usage.reasoning_tokens {
                usage.reasoning_tokens = Some(usage.reasoning_tokens.unwrap_or(0) + r);
            }
            trace.input_tokens += resp.usage.input_tokens;
            trace.output_tokens += resp.usage.output_tokens;

            let choice = match resp.first_choice() {
                Some(c) => c,
                None => {
                    tracing::warn!(iteration, "model response carried no choices");
                    return RunResult {
                        outcome: RunOutcome::NaturalStop,
                        final_text: None,
                        tool_calls_invoked,
                        usage,
                        trace,
                    };
                }
            };

            if let Some(reasoning) = &choice.reasoning {
                trace.reasoning = Some(reasoning.clone());
                if resp.usage.reasoning_tokens.is_none() {
                    trace.reasoning_tokens += buckley_model::approx_tokens(&Message::assistant(
                        reasoning.clone(),
                        Utc::now(),
                    )) as u32;
                }
            }

            if choice.tool_calls.is_empty() {
                let text = choice.content.clone().unwrap_or_default();
                conversation.add_assistant(text.clone());
                trace.response_content = Some(text.clone());
                if let Some(ledger) = &self.ledger {
                    ledger.record(CostEntry {
                        model_id: self.model_id.clone(),
                        input_tokens: trace.input_tokens,
                        output_tokens: trace.output_tokens,
                        cost: compute_cost(trace.input_tokens, trace.output_tokens, self.rate_in, self.rate_out),
                        latency: std::time::Duration::ZERO,
                        invocation_id: trace.id.clone(),
                    });
                }
                trace.cost = compute_cost(trace.input_tokens, trace.output_tokens, self.rate_in, self.rate_out);
                return RunResult {
                    outcome: RunOutcome::NaturalStop,
                    final_text: Some(text),
                    tool_calls_invoked,
                    usage,
                    trace,
                };
            }

            conversation.add_tool_calls(choice.tool_calls.clone());
            tool_calls_invoked.extend(choice.tool_calls.clone());

            // Split the batch into calls already answered by the dedup cache
            // and calls that need dispatch, then run the latter concurrently
            // (bounded by `tool_batch_concurrency`) while still appending
            // every result in the original call order.
            let mut pending_calls = Vec::new();
            let mut ordered_results: Vec<Option<(String, String, bool, bool)>> =
                vec![None; choice.tool_calls.len()];

            for (idx, call) in choice.tool_calls.iter().enumerate() {
                let args: serde_json::Value =
                    serde_json::from_str(&call.arguments).unwrap_or(serde_json::Value::Null);
                let key = dedup_key(&call.name, &args);
                if let Some((cached, is_error, is_truncated)) = dedup_cache.get(&key) {
                    ordered_results[idx] = Some((call.id.clone(), cached.clone(), *is_error, *is_truncated));
                } else {
                    pending_calls.push((idx, key, RegistryToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        raw_arguments: call.arguments.clone(),
                        args,
                    }));
                }
            }

            let dispatch = futures::stream::iter(pending_calls)
                .map(|(idx, key, registry_call)| async move {
                    let result = registry.execute(&registry_call, cancel).await;
                    (idx, key, result.content, result.is_error, result.is_truncated)
                })
                .buffer_unordered(self.config.tool_batch_concurrency.max(1))
                .collect::<Vec<_>>();

            let dispatched: Vec<(usize, String, String, bool, bool)> = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(iteration, "cancelled mid tool-call batch dispatch");
                    return RunResult {
                        outcome: RunOutcome::ContextCancelled,
                        final_text: None,
                        tool_calls_invoked,
                        usage,
                        trace,
                    };
                }
                dispatched = dispatch => dispatched,
            };

            for (idx, key, content, is_error, is_truncated) in dispatched {
                dedup_cache.insert(key, (content.clone(), is_error, is_truncated));
                let call_id = choice.tool_calls[idx].id.clone();
                ordered_results[idx] = Some((call_id, content, is_error, is_truncated));
            }

            for (idx, entry) in ordered_results.into_iter().enumerate() {
                let (call_id, content, is_error, is_truncated) = entry.expect("every tool call produces a result");
                let tool_name = choice.tool_calls[idx].name.clone();
                if conversation
                    .add_tool_response(call_id, tool_name, content, is_error, is_truncated)
                    .is_err()
                {
                    // Should not happen: the append above always mirrors the
                    // call list just recorded via add_tool_calls.
                    tracing::error!(iteration, "tool-call/tool-result pairing violated");
                    trace.error = Some("tool-call/tool-result pairing violated".to_string());
                }
            }

            iteration += 1;
        }
    }
}
