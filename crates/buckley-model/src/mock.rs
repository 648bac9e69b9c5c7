// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::CompletionClient;
use crate::types::{CompletionChoice, CompletionRequest, CompletionResponse, Role, Usage};

/// Deterministic mock client. Echoes the last user message back as the
/// assistant response. Useful where the exact reply text does not matter.
#[derive(Default)]
pub struct MockCompletionClient;

#[async_trait]
impl CompletionClient for MockCompletionClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat_completion(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.as_text())
            .unwrap_or_else(|| "[no input]".to_string());

        Ok(CompletionResponse {
            choices: vec![CompletionChoice {
                content: Some(format!("MOCK: {reply}")),
                ..Default::default()
            }],
            usage: Usage {
                input_tokens: 10,
                output_tokens: 10,
                reasoning_tokens: None,
            },
        })
    }
}

/// A pre-scripted client. Each call to `chat_completion` pops the next
/// response from the front of the queue, letting tests specify exact
/// response sequences, including tool calls, without network access.
pub struct ScriptedCompletionClient {
    scripts: Mutex<Vec<CompletionResponse>>,
    name: String,
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    pub fn new(scripts: Vec<CompletionResponse>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            name: "scripted-mock".into(),
            last_request: Mutex::new(None),
        }
    }

    /// Convenience: client that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![CompletionResponse {
            choices: vec![CompletionChoice {
                content: Some(reply.into()),
                ..Default::default()
            }],
            usage: Usage {
                input_tokens: 5,
                output_tokens: 5,
                reasoning_tokens: None,
            },
        }])
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        *self.last_request.lock().unwrap() = Some(req);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            return Ok(CompletionResponse {
                choices: vec![CompletionChoice {
                    content: Some("[no more scripts]".into()),
                    ..Default::default()
                }],
                usage: Usage::default(),
            });
        }
        Ok(scripts.remove(0))
    }
}
