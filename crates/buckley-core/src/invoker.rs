// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Single-shot Model Invoker: one request, one response, tool-call
//! extraction, and retry-for-tool-call.

use std::sync::Arc;

use buckley_model::{CompletionClient, CompletionRequest, Message, ToolChoice, ToolCallRequest};
use chrono::Utc;
use uuid::Uuid;

use crate::errors::BuckleyError;
use crate::trace::{compute_cost, truncate_snapshot, Ledger, CostEntry, Trace};

/// Outcome of a single-shot invocation.
#[derive(Debug, Clone)]
pub enum InvokeResult {
    Text(String),
    ToolCall(ToolCallRequest),
}

pub struct ModelInvoker {
    client: Arc<dyn CompletionClient>,
    model_id: String,
    rate_in: f64,
    rate_out: f64,
    ledger: Option<Arc<Ledger>>,
}

impl ModelInvoker {
    pub fn new(client: Arc<dyn CompletionClient>, model_id: impl Into<String>, rate_in: f64, rate_out: f64) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            rate_in,
            rate_out,
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Build a request with exactly two messages (system, user) and a
    /// single tool in `auto` mode.
    async fn invoke_inner(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: Option<&serde_json::Value>,
    ) -> (Result<InvokeResult, BuckleyError>, Trace) {
        let mut trace = Trace::new(Uuid::new_v4().to_string(), self.model_id.clone(), self.client.name());
        trace.request_snapshot = format!(
            "system: {}\nuser: {}",
            truncate_snapshot(system_prompt),
            truncate_snapshot(user_prompt)
        );

        let req = CompletionRequest {
            messages: vec![
                Message::system(system_prompt, Utc::now()),
                Message::user(user_prompt, Utc::now()),
            ],
            tools: tool.cloned().into_iter().collect(),
            tool_choice: if tool.is_some() { ToolChoice::Auto } else { ToolChoice::None },
            temperature: None,
            max_tokens: None,
        };

        let resp = match self.client.chat_completion(req).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, model = %self.model_id, "model completion request failed");
                trace.error = Some(e.to_string());
                return (Err(BuckleyError::TransportError(e.to_string())), trace);
            }
        };

        trace.input_tokens = resp.usage.input_tokens;
        trace.output_tokens = resp.usage.output_tokens;
        trace.reasoning_tokens = resp.usage.reasoning_tokens.unwrap_or(0);
        trace.cost = compute_cost(trace.input_tokens, trace.output_tokens, self.rate_in, self.rate_out);

        if let Some(ledger) = &self.ledger {
            ledger.record(CostEntry {
                model_id: self.model_id.clone(),
                input_tokens: trace.input_tokens,
                output_tokens: trace.output_tokens,
                cost: trace.cost,
                latency: std::time::Duration::ZERO,
                invocation_id: trace.id.clone(),
            });
        }

        let choice = match resp.first_choice() {
            Some(c) => c,
            None => {
                tracing::warn!(model = %self.model_id, "model response carried no choices");
                return (Err(BuckleyError::TransportError("empty response".into())), trace);
            }
        };

        trace.reasoning = choice.reasoning.clone();
        trace.response_content = choice.content.clone();
        trace.tool_calls_emitted = choice.tool_calls.iter().map(|c| c.name.clone()).collect();

        if let Some(call) = choice.tool_calls.first() {
            (Ok(InvokeResult::ToolCall(call.clone())), trace)
        } else {
            (Ok(InvokeResult::Text(choice.content.clone().unwrap_or_default())), trace)
        }
    }

    pub async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &serde_json::Value,
    ) -> (Result<InvokeResult, BuckleyError>, Trace) {
        self.invoke_inner(system_prompt, user_prompt, Some(tool)).await
    }

    /// If the first call returned no tool call, append a stronger directive
    /// and retry exactly once.
    pub async fn invoke_with_retry(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool_name: &str,
        tool: &serde_json::Value,
    ) -> (Result<InvokeResult, BuckleyError>, Trace) {
        let (result, trace) = self.invoke(system_prompt, user_prompt, tool).await;
        match &result {
            Ok(InvokeResult::ToolCall(_)) | Err(_) => (result, trace),
            Ok(InvokeResult::Text(_)) => {
                let stronger = format!(
                    "{user_prompt}\n\nYou MUST use tool `{tool_name}` to respond; do not reply with plain text."
                );
                self.invoke(system_prompt, &stronger, tool).await
            }
        }
    }

    /// Pure text generation, no tools, used by the summarizer.
    pub async fn invoke_text(&self, system_prompt: &str, user_prompt: &str) -> (Result<String, BuckleyError>, Trace) {
        let (result, trace) = self.invoke_inner(system_prompt, user_prompt, None).await;
        let text = result.map(|r| match r {
            InvokeResult::Text(t) => t,
            InvokeResult::ToolCall(c) => c.arguments,
        });
        (text, trace)
    }
}
