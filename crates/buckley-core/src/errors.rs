// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Error kinds surfaced by the core. Per-tool execution errors are recovered
/// locally (fed back to the model as tool-role content, see
/// [`crate::runner::ToolRunner`]); everything here is surfaced to the caller
/// with the latest trace attached.
#[derive(Debug, Error)]
pub enum BuckleyError {
    /// Empty tool name, unknown session id, empty topic. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Completion client failure. The loop terminates with an error outcome;
    /// the partial transcript is preserved.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Max-iterations reached. Soft failure: accumulated tool calls and the
    /// last text (if any) are still returned to the caller.
    #[error("budget exhausted after {iterations} iterations")]
    BudgetExhausted { iterations: u32 },

    /// Propagated from cancellation; the loop terminates at the next
    /// suspension point.
    #[error("context cancelled")]
    ContextCancelled,

    /// Surfaced back into the transcript as tool-role content with the error
    /// flag set; the model is expected to recover. Raised out of the loop
    /// only when no conversation exists to append to.
    #[error("tool `{tool}` failed: {message}")]
    ToolExecutionError { tool: String, message: String },

    /// One-shot runner only: argument JSON failed schema validation.
    #[error("invalid arguments for `{tool}`, field `{field}`: {message}")]
    InvalidArguments {
        tool: String,
        field: String,
        message: String,
    },

    /// One-shot runner only: the model replied with text after retry instead
    /// of the required tool call.
    #[error("model did not emit the required tool call after retry")]
    MissingToolCall,

    /// The `ContextCollector` failed to gather material for the command
    /// before any model call was made.
    #[error("context collection failed: {0}")]
    ContextCollectionFailed(String),
}
