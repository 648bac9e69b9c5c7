// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::types::{CompletionRequest, CompletionResponse, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// The completion client: the remote model provider, consumed by the
/// Model Invoker and Tool Runner. Never implemented by this crate in
/// production; only `MockCompletionClient` / `ScriptedCompletionClient`
/// below, for tests.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> &str;

    /// One request, one response. The primary interface used by the
    /// single-shot Model Invoker and the iterative Tool Runner.
    async fn chat_completion(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse>;

    /// Optional streaming variant. Default falls back to `chat_completion`
    /// and replays it as a single batch of events.
    async fn stream(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let resp = self.chat_completion(req).await?;
        let mut events = Vec::new();
        if let Some(choice) = resp.choices.into_iter().next() {
            if let Some(reasoning) = choice.reasoning {
                events.push(Ok(ResponseEvent::ThinkingDelta(reasoning)));
            }
            if let Some(content) = choice.content {
                events.push(Ok(ResponseEvent::TextDelta(content)));
            }
            for (index, call) in choice.tool_calls.into_iter().enumerate() {
                events.push(Ok(ResponseEvent::ToolCall {
                    index,
                    id: call.id,
                    name: call.name,
                    arguments: call.arguments,
                }));
            }
        }
        events.push(Ok(ResponseEvent::Usage(resp.usage)));
        events.push(Ok(ResponseEvent::Done));
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
