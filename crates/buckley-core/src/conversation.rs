// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The append-only transcript: derived token accounting, tool-call /
//! tool-result pairing, and the compaction trigger.

use std::sync::Arc;

use buckley_model::{ApproxTokenCounter, Message, Role, TokenCounter, ToolCallRequest};
use chrono::Utc;

use crate::errors::BuckleyError;

/// Fixed per-message overhead added to the sum of cached message token
/// counts when computing the conversation's aggregate total.
pub const PER_MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// A message as it should be sent to the provider: content is omitted
/// (rather than sent as an empty string) when tool-calls are present,
/// since some providers reject a request carrying both.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExportedMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// The append-only message log for one session.
///
/// Single-writer per session (the owning runner); concurrent reads take a
/// snapshot of primitives rather than a reference into live state, so
/// callers holding a `Conversation` by value already have an isolated copy.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub session_id: String,
    messages: Vec<Message>,
    token_count: usize,
    compaction_count: u32,
    max_context_tokens: usize,
    /// Call-ids from the most recent assistant tool-calls message that have
    /// not yet been paired with a tool-role response, in call order.
    pending_call_ids: Vec<String>,
    counter: Arc<dyn TokenCounter>,
}

impl Conversation {
    pub fn new(session_id: impl Into<String>, max_context_tokens: usize) -> Self {
        Self::with_token_counter(session_id, max_context_tokens, Arc::new(ApproxTokenCounter))
    }

    /// Construct with an explicit tokenizer in place of the 4-chars-per-token
    /// default, e.g. a provider-accurate counter.
    pub fn with_token_counter(
        session_id: impl Into<String>,
        max_context_tokens: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            token_count: 0,
            compaction_count: 0,
            max_context_tokens,
            pending_call_ids: Vec::new(),
            counter,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn compaction_count(&self) -> u32 {
        self.compaction_count
    }

    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    fn push(&mut self, message: Message) {
        self.token_count += self.counter.count(&message) + PER_MESSAGE_OVERHEAD_TOKENS;
        self.messages.push(message);
    }

    pub fn add_system(&mut self, text: impl Into<String>) {
        self.push(Message::system(text, Utc::now()));
    }

    pub fn add_user(&mut self, text: impl Into<String>) {
        self.push(Message::user(text, Utc::now()));
    }

    pub fn add_assistant(&mut self, text: impl Into<String>) {
        self.push(Message::assistant(text, Utc::now()));
    }

    pub fn add_assistant_with_reasoning(
        &mut self,
        text: impl Into<String>,
        reasoning: impl Into<String>,
    ) {
        self.push(Message::assistant_with_reasoning(text, reasoning, Utc::now()));
    }

    /// Append an assistant message carrying a tool-call batch. Every call-id
    /// in `calls` must be paired with a matching `add_tool_response` before
    /// the next request is built, a guarantee enforced by `add_tool_response`,
    /// not by this method.
    pub fn add_tool_calls(&mut self, calls: Vec<ToolCallRequest>) {
        self.pending_call_ids = calls.iter().map(|c| c.id.clone()).collect();
        self.push(Message::assistant_tool_calls(calls, Utc::now()));
    }

    /// Append a tool-role response. Errors if `call_id` does not match a
    /// call-id from the preceding unresolved assistant tool-calls message.
    /// The pairing invariant is enforced here, not left to convention.
    /// `is_error` records whether the underlying tool call failed; the model
    /// sees it the same way either way, as tool-role content, but the flag
    /// survives into the transcript rather than being silently discarded.
    /// `is_truncated` records whether the registry shortened the result.
    pub fn add_tool_response(
        &mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
        is_truncated: bool,
    ) -> Result<(), BuckleyError> {
        let call_id = call_id.into();
        let pos = self
            .pending_call_ids
            .iter()
            .position(|id| id == &call_id)
            .ok_or_else(|| {
                BuckleyError::InvalidInput(format!(
                    "tool response call-id `{call_id}` does not match a pending tool call"
                ))
            })?;
        self.pending_call_ids.remove(pos);
        self.push(Message::tool_response(call_id, tool_name, content, is_error, is_truncated, Utc::now()));
        Ok(())
    }

    /// `true` once every call-id from the last tool-calls message has a
    /// matching response; the model may be invoked again once this holds.
    pub fn tool_calls_resolved(&self) -> bool {
        self.pending_call_ids.is_empty()
    }

    pub fn context_fraction(&self) -> f32 {
        if self.max_context_tokens == 0 {
            return 1.0;
        }
        self.token_count as f32 / self.max_context_tokens as f32
    }

    pub fn should_compact(&self, threshold: f32, max_compactions: u32) -> bool {
        self.context_fraction() >= threshold && self.compaction_count < max_compactions
    }

    /// Replace `messages` with a single synthetic `[Summary]` system message
    /// and bump the compaction counter. The caller is responsible for having
    /// produced `summary_text` (typically via the Model Invoker).
    pub fn apply_compaction(&mut self, summary_text: impl Into<String>, keep_recent: usize) {
        let keep = keep_recent.min(self.messages.len());
        let tail: Vec<Message> = self.messages[self.messages.len() - keep..].to_vec();
        let mut summary = Message::system(format!("[Summary] {}", summary_text.into()), Utc::now());
        summary.is_summary = true;
        self.messages = vec![summary];
        self.messages.extend(tail);
        self.compaction_count += 1;
        self.recalculate_tokens();
    }

    pub fn recalculate_tokens(&mut self) {
        self.token_count = self
            .messages
            .iter()
            .map(|m| self.counter.count(m) + PER_MESSAGE_OVERHEAD_TOKENS)
            .sum();
    }

    /// Restore a conversation from persisted messages, using the default
    /// tokenizer. The compaction counter is inferred from the number of
    /// summary-flagged messages found, per the design note on
    /// restore-from-persistence.
    pub fn restore(session_id: impl Into<String>, max_context_tokens: usize, messages: Vec<Message>) -> Self {
        Self::restore_with_token_counter(
            session_id,
            max_context_tokens,
            messages,
            Arc::new(ApproxTokenCounter),
        )
    }

    /// As [`Conversation::restore`], with an explicit tokenizer in place of
    /// the 4-chars-per-token default.
    pub fn restore_with_token_counter(
        session_id: impl Into<String>,
        max_context_tokens: usize,
        messages: Vec<Message>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        let compaction_count = messages.iter().filter(|m| m.is_summary).count() as u32;
        let mut conv = Self {
            session_id: session_id.into(),
            messages,
            token_count: 0,
            compaction_count,
            max_context_tokens,
            pending_call_ids: Vec::new(),
            counter,
        };
        conv.recalculate_tokens();
        conv
    }

    /// Export the transcript into the shape sent to the model provider.
    pub fn export_for_request(&self) -> Vec<ExportedMessage> {
        self.messages
            .iter()
            .map(|m| {
                let has_tool_calls = m.tool_calls.is_some();
                let text = m.as_text();
                ExportedMessage {
                    role: m.role,
                    content: if has_tool_calls && text.is_empty() {
                        None
                    } else {
                        Some(text)
                    },
                    tool_calls: m.tool_calls.clone(),
                    tool_call_id: m.tool_call_id.clone(),
                    tool_name: m.tool_name.clone(),
                }
            })
            .collect()
    }

    /// Verify the tool-call/tool-result pairing invariant over the full
    /// transcript: every assistant message carrying tool-calls is
    /// immediately followed by matching tool-role messages, in order.
    pub fn verify_pairing_invariant(&self) -> bool {
        let mut i = 0;
        while i < self.messages.len() {
            let m = &self.messages[i];
            if m.role == Role::Assistant {
                if let Some(calls) = &m.tool_calls {
                    for (offset, call) in calls.iter().enumerate() {
                        let idx = i + 1 + offset;
                        match self.messages.get(idx) {
                            Some(tm) if tm.role == Role::Tool && tm.tool_call_id.as_deref() == Some(call.id.as_str()) => {}
                            _ => return false,
                        }
                    }
                    i += calls.len();
                }
            }
            i += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> Conversation {
        Conversation::new("s1", 10_000)
    }

    #[test]
    fn add_user_and_system_updates_aggregate() {
        let mut c = conv();
        c.add_system("sys");
        c.add_user("hello world");
        assert!(c.token_count() > 0);
        assert_eq!(c.messages().len(), 2);
    }

    #[test]
    fn tool_calls_then_matching_response_resolves_pairing() {
        let mut c = conv();
        c.add_user("What is 17*23?");
        c.add_tool_calls(vec![ToolCallRequest {
            id: "call-1".into(),
            name: "calculator".into(),
            arguments: "{\"expr\":\"17*23\"}".into(),
        }]);
        assert!(!c.tool_calls_resolved());
        c.add_tool_response("call-1", "calculator", "391", false, false).unwrap();
        assert!(c.tool_calls_resolved());
        assert!(c.verify_pairing_invariant());
    }

    #[test]
    fn tool_response_with_unknown_call_id_errors() {
        let mut c = conv();
        c.add_tool_calls(vec![ToolCallRequest {
            id: "call-1".into(),
            name: "calculator".into(),
            arguments: "{}".into(),
        }]);
        let err = c.add_tool_response("wrong-id", "calculator", "x", false, false).unwrap_err();
        assert!(matches!(err, BuckleyError::InvalidInput(_)));
    }

    #[test]
    fn export_for_request_omits_empty_content_when_tool_calls_present() {
        let mut c = conv();
        c.add_tool_calls(vec![ToolCallRequest {
            id: "call-1".into(),
            name: "calculator".into(),
            arguments: "{}".into(),
        }]);
        let exported = c.export_for_request();
        assert!(exported[0].content.is_none());
        assert!(exported[0].tool_calls.is_some());
    }

    #[test]
    fn should_compact_triggers_at_threshold_not_before() {
        let mut c = Conversation::new("s1", 10_000);
        // push messages until fraction just under 0.9
        for _ in 0..10 {
            c.add_user(&"x".repeat(3560)); // ~890 tokens + overhead each
        }
        let frac_before = c.context_fraction();
        if frac_before < 0.9 {
            assert!(!c.should_compact(0.9, 2));
        }
        c.add_user(&"x".repeat(4000));
        if c.context_fraction() >= 0.9 {
            assert!(c.should_compact(0.9, 2));
        }
    }

    #[test]
    fn should_compact_respects_max_compactions() {
        let mut c = Conversation::new("s1", 100);
        c.add_user(&"x".repeat(1000));
        assert!(c.should_compact(0.9, 2));
        c.apply_compaction("summary", 1);
        c.apply_compaction("summary2", 1);
        assert_eq!(c.compaction_count(), 2);
        assert!(!c.should_compact(0.9, 2));
    }

    #[test]
    fn apply_compaction_marks_first_message_as_summary() {
        let mut c = conv();
        c.add_user("first");
        c.add_assistant("second");
        c.apply_compaction("condensed history", 1);
        assert!(c.messages()[0].is_summary);
        assert_eq!(c.compaction_count(), 1);
    }

    #[test]
    fn apply_compaction_decreases_aggregate_tokens() {
        let mut c = conv();
        for i in 0..20 {
            c.add_user(format!("message number {i} with some padding text"));
        }
        let before = c.token_count();
        c.apply_compaction("short summary", 2);
        assert!(c.token_count() < before);
    }

    #[test]
    fn restore_infers_compaction_count_from_summary_messages() {
        let mut seed = conv();
        seed.add_user("a");
        seed.add_assistant("b");
        seed.apply_compaction("summary one", 1);
        let messages = seed.messages().to_vec();
        let restored = Conversation::restore("s1", 10_000, messages);
        assert_eq!(restored.compaction_count(), 1);
    }

    #[test]
    fn tool_response_error_and_truncated_flags_reach_the_message() {
        let mut c = conv();
        c.add_tool_calls(vec![ToolCallRequest {
            id: "call-1".into(),
            name: "t".into(),
            arguments: "{}".into(),
        }]);
        c.add_tool_response("call-1", "t", "boom", true, true).unwrap();
        let m = &c.messages()[c.messages().len() - 1];
        assert!(m.is_error);
        assert!(m.is_truncated);
    }

    #[test]
    fn pairing_invariant_fails_when_response_missing() {
        let mut c = conv();
        c.add_tool_calls(vec![ToolCallRequest {
            id: "call-1".into(),
            name: "t".into(),
            arguments: "{}".into(),
        }]);
        assert!(!c.verify_pairing_invariant());
    }
}
