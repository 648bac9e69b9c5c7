// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single content part in a multi-part message. Text parts concatenate;
/// image parts pass through opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image_url: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(image_url: impl Into<String>) -> Self {
        Self::Image { image_url: image_url.into() }
    }
}

/// A message's content: either a single string or an ordered list of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenate all text, ignoring image parts. Used for token
    /// approximation and for the 500-char trace truncation.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn char_len(&self) -> usize {
        match self {
            MessageContent::Text(t) => t.len(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.len(),
                    // OpenAI vision estimate for a non-"low"-detail image,
                    // expressed in the same 4-chars-per-token units as text.
                    ContentPart::Image { .. } => 765 * 4,
                })
                .sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One tool call carried by an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded argument object, opaque until decoded against the
    /// tool's schema.
    pub arguments: String,
}

/// A single entry in the append-only conversation transcript.
///
/// `tool_calls` is populated only on assistant messages; `tool_call_id` and
/// `tool_name` only on tool-role messages; `reasoning` only on assistant
/// messages from a model that exposes extended thinking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Cached token count, computed once at append time using the
    /// 4-chars-per-token default; a [`TokenCounter`] recomputes this for
    /// aggregate accounting if the conversation is built with one.
    pub token_count: usize,
    #[serde(default)]
    pub is_summary: bool,
    #[serde(default)]
    pub is_truncated: bool,
    /// Set only on tool-role messages: the underlying tool call failed.
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    fn base(role: Role, content: MessageContent, now: DateTime<Utc>) -> Self {
        let mut m = Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            reasoning: None,
            timestamp: now,
            token_count: 0,
            is_summary: false,
            is_truncated: false,
            is_error: false,
        };
        m.token_count = approx_tokens(&m);
        m
    }

    pub fn system(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::base(Role::System, MessageContent::Text(text.into()), now)
    }

    pub fn user(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::base(Role::User, MessageContent::Text(text.into()), now)
    }

    pub fn assistant(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::base(Role::Assistant, MessageContent::Text(text.into()), now)
    }

    pub fn assistant_with_reasoning(
        text: impl Into<String>,
        reasoning: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut m = Self::base(Role::Assistant, MessageContent::Text(text.into()), now);
        m.reasoning = Some(reasoning.into());
        m.token_count = approx_tokens(&m);
        m
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>, now: DateTime<Utc>) -> Self {
        let mut m = Self::base(Role::Assistant, MessageContent::Text(String::new()), now);
        m.tool_calls = Some(calls);
        m.token_count = approx_tokens(&m);
        m
    }

    pub fn tool_response(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
        is_truncated: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let mut m = Self::base(Role::Tool, MessageContent::Text(content.into()), now);
        m.tool_call_id = Some(call_id.into());
        m.tool_name = Some(tool_name.into());
        m.is_error = is_error;
        m.is_truncated = is_truncated;
        m.token_count = approx_tokens(&m);
        m
    }

    pub fn as_text(&self) -> String {
        self.content.as_text()
    }
}

/// 4-characters-per-token fallback heuristic, floored at 1. Used whenever
/// no pluggable tokenizer is configured.
pub fn approx_tokens(message: &Message) -> usize {
    let mut chars = message.content.char_len();
    if let Some(calls) = &message.tool_calls {
        chars += calls
            .iter()
            .map(|c| c.name.len() + c.arguments.len())
            .sum::<usize>();
    }
    if let Some(reasoning) = &message.reasoning {
        chars += reasoning.len();
    }
    (chars / 4).max(1)
}

/// Pluggable tokenizer for the Conversation Store's aggregate accounting.
/// A provider-accurate tokenizer can be substituted for the default
/// character heuristic without the Conversation type itself changing.
pub trait TokenCounter: Send + Sync + std::fmt::Debug {
    fn count(&self, message: &Message) -> usize;
}

/// The 4-chars-per-token heuristic, wrapped as the default [`TokenCounter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, message: &Message) -> usize {
        approx_tokens(message)
    }
}

/// Request sent to a model provider for one completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// Already provider-formatted tool definitions (see
    /// `buckley_tools::{to_openai_format, to_anthropic_format}`).
    pub tools: Vec<serde_json::Value>,
    pub tool_choice: ToolChoice,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

/// Token usage reported by (or estimated for) one invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Provider-reported reasoning tokens, when available. Preferred over
    /// the 4-char heuristic (see design notes on reasoning tokens).
    pub reasoning_tokens: Option<u32>,
}

/// One choice returned by a non-streaming completion response.
#[derive(Debug, Clone, Default)]
pub struct CompletionChoice {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<String>,
}

/// The response to one [`CompletionRequest`].
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn first_choice(&self) -> Option<&CompletionChoice> {
        self.choices.first()
    }
}

/// A single streamed event from the model, the optional streaming variant
/// of the completion client interface.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    TextDelta(String),
    ToolCall {
        index: usize,
        id: String,
        name: String,
        arguments: String,
    },
    ThinkingDelta(String),
    Usage(Usage),
    Done,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn user_message_sets_role_and_text() {
        let m = Message::user("hello", now());
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), "hello");
    }

    #[test]
    fn approx_tokens_divides_by_four_and_floors_at_one() {
        let m = Message::user("12345678", now());
        assert_eq!(m.token_count, 2);
        let empty = Message::user("", now());
        assert_eq!(empty.token_count, 1);
    }

    #[test]
    fn assistant_tool_calls_token_count_includes_name_and_arguments() {
        let m = Message::assistant_tool_calls(
            vec![ToolCallRequest {
                id: "1".into(),
                name: "aaaa".into(),
                arguments: "bbbbbbbb".into(),
            }],
            now(),
        );
        assert_eq!(m.token_count, 3);
    }

    #[test]
    fn message_round_trips_through_json() {
        let m = Message::user("payload", now());
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_text(), "payload");
        assert_eq!(back.role, Role::User);
    }

    #[test]
    fn tool_response_carries_call_id_and_tool_name() {
        let m = Message::tool_response("call-1", "calculator", "391", false, false, now());
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(m.tool_name.as_deref(), Some("calculator"));
        assert!(!m.is_error);
    }

    #[test]
    fn tool_response_carries_error_and_truncated_flags() {
        let m = Message::tool_response("call-1", "calculator", "boom", true, true, now());
        assert!(m.is_error);
        assert!(m.is_truncated);
    }

    #[test]
    fn approx_token_counter_matches_free_function() {
        let m = Message::user("12345678", now());
        let counter = ApproxTokenCounter;
        assert_eq!(counter.count(&m), approx_tokens(&m));
    }
}
