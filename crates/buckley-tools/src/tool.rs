// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

use crate::cancellation::CancellationToken;
use crate::schema::ParameterSchema;

/// A single tool invocation requested by the model.
///
/// One `ToolCall` produces exactly one [`ToolResult`]; the pairing is
/// enforced by the conversation store, not by this type.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier issued by the model, forwarded verbatim.
    pub id: String,
    pub name: String,
    /// Raw argument payload, opaque until decoded against the schema.
    pub raw_arguments: String,
    /// Parsed JSON arguments, once decoded.
    pub args: Value,
}

/// The executor's response to a [`ToolCall`].
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
    /// Set once the registry has shortened `content` per the tool's
    /// [`OutputCategory`]; carried through to the transcript message.
    pub is_truncated: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
            is_truncated: false,
        }
    }

    pub fn err(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
            is_truncated: false,
        }
    }
}

/// Describes the shape of a tool's text output for context-aware truncation
/// of oversized results before they enter the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// Terminal / process output: keep head and tail lines.
    HeadTail,
    /// Ordered match list: keep the leading matches.
    MatchList,
    /// File content: keep a head/tail window around a separator.
    FileContent,
    /// Hard character-boundary truncation.
    #[default]
    Generic,
}

/// Trait implemented by every tool the registry can dispatch to.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> ParameterSchema;
    /// Describes this tool's output shape for context-aware truncation.
    /// Default is [`OutputCategory::Generic`] (hard truncation).
    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }
    /// Execute the tool. Errors are reported via `ToolResult::err`, never
    /// propagated out of the loop (see error-handling design, §7). `cancel`
    /// is the same token the dispatching runner races requests against;
    /// long-running tools should poll `cancel.is_cancelled()` at their own
    /// suspension points.
    async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult;
}
