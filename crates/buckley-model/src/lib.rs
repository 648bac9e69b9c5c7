// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Message/conversation data types and the completion-client interface
//! consumed by the orchestration engine.

pub mod mock;
mod provider;
mod types;

pub use provider::{CompletionClient, ResponseStream};
pub use types::{
    approx_tokens, ApproxTokenCounter, CompletionChoice, CompletionRequest, CompletionResponse,
    ContentPart, Message, MessageContent, ResponseEvent, Role, TokenCounter, ToolCallRequest,
    ToolChoice, Usage,
};
