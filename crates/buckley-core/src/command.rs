// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! One-shot Command Runner: a command is a name, a single tool definition,
//! and a system prompt. Running it collects context, forces the model to
//! call that tool, and decodes the result against the tool's schema.

use std::collections::HashMap;
use std::sync::Arc;

use buckley_tools::ToolDefinition;
use jsonschema_lite::validate_against;
use uuid::Uuid;

use crate::context_collector::ContextCollector;
use crate::errors::BuckleyError;
use crate::invoker::{InvokeResult, ModelInvoker};
use crate::trace::Trace;

/// A registered one-shot command: a name, its forced tool shape, and the
/// system prompt used to steer the model toward it.
pub struct Command {
    pub name: String,
    pub description: String,
    pub tool: ToolDefinition,
    pub system_prompt: String,
    pub builtin: bool,
}

impl Command {
    pub fn new(name: impl Into<String>, description: impl Into<String>, tool: ToolDefinition, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tool,
            system_prompt: system_prompt.into(),
            builtin: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandRegistryError {
    #[error("a command named `{0}` is already registered")]
    DuplicateName(String),
    #[error("no command named `{0}` is registered")]
    NotFound(String),
    #[error("builtin command `{0}` cannot be replaced")]
    BuiltinProtected(String),
}

/// Process-wide registry of commands. Duplicate names are rejected rather
/// than silently overwritten, and builtins are protected from replacement.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Result<(), CommandRegistryError> {
        if let Some(existing) = self.commands.get(&command.name) {
            if existing.builtin {
                return Err(CommandRegistryError::BuiltinProtected(command.name));
            }
            return Err(CommandRegistryError::DuplicateName(command.name));
        }
        self.commands.insert(command.name.clone(), Arc::new(command));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Runs a single [`Command`] end to end: gather context, force the tool
/// call (retrying once), decode the arguments against the tool's schema.
pub struct CommandRunner {
    invoker: ModelInvoker,
    collector: Arc<dyn ContextCollector>,
}

impl CommandRunner {
    pub fn new(invoker: ModelInvoker, collector: Arc<dyn ContextCollector>) -> Self {
        Self { invoker, collector }
    }

    pub async fn execute(
        &self,
        command: &Command,
        user_input: &str,
    ) -> (Result<serde_json::Value, BuckleyError>, Trace) {
        let bundle = match self.collector.collect(user_input).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(command = %command.name, error = %e, "context collection failed");
                let trace = Trace::new(Uuid::new_v4().to_string(), "unknown", "unknown");
                return (Err(e), trace);
            }
        };
        let user_prompt = bundle.render();
        let tool_wire = serde_json::json!({
            "type": "function",
            "function": {
                "name": command.tool.name,
                "description": command.tool.description,
                "parameters": command.tool.parameters.to_json_schema(),
            }
        });

        let (result, trace) = self
            .invoker
            .invoke_with_retry(&command.system_prompt, &user_prompt, &command.tool.name, &tool_wire)
            .await;

        let decoded = result.and_then(|outcome| match outcome {
            InvokeResult::Text(_) => {
                tracing::warn!(command = %command.name, "model did not emit the required tool call after retry");
                Err(BuckleyError::MissingToolCall)
            }
            InvokeResult::ToolCall(call) => {
                let value: serde_json::Value = serde_json::from_str(&call.arguments).map_err(|e| {
                    BuckleyError::InvalidArguments {
                        tool: command.tool.name.clone(),
                        field: "<root>".to_string(),
                        message: e.to_string(),
                    }
                })?;
                validate_against(&command.tool.parameters, &value).map_err(|(field, message)| {
                    BuckleyError::InvalidArguments { tool: command.tool.name.clone(), field, message }
                })?;
                Ok(value)
            }
        });

        if let Err(e) = &decoded {
            if !matches!(e, BuckleyError::MissingToolCall) {
                tracing::warn!(command = %command.name, error = %e, "command execution failed");
            }
        }

        (decoded, trace)
    }
}

/// Minimal structural validation against a [`ParameterSchema`]: every
/// required field of an object schema must be present. Deep type-checking
/// is left to the tool's own `execute`, which already reports
/// [`BuckleyError::InvalidArguments`] for malformed input.
mod jsonschema_lite {
    use buckley_tools::ParameterSchema;
    use serde_json::Value;

    pub fn validate_against(schema: &ParameterSchema, value: &Value) -> Result<(), (String, String)> {
        let obj = value.as_object().ok_or_else(|| ("<root>".to_string(), "expected an object".to_string()))?;
        for field in &schema.required {
            if !obj.contains_key(field) {
                return Err((field.clone(), "missing required field".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buckley_model::mock::ScriptedCompletionClient;
    use buckley_model::{CompletionChoice, CompletionResponse, ToolCallRequest, Usage};
    use buckley_tools::ParameterSchema;
    use std::collections::BTreeMap;

    struct StubCollector;
    #[async_trait::async_trait]
    impl ContextCollector for StubCollector {
        async fn collect(&self, user_input: &str) -> Result<crate::context_collector::ContextBundle, BuckleyError> {
            Ok(crate::context_collector::ContextBundle::new(user_input.to_string()))
        }
    }

    fn commit_tool() -> ToolDefinition {
        let mut properties = BTreeMap::new();
        properties.insert("message".to_string(), ParameterSchema::string());
        let schema = ParameterSchema::object(properties, vec!["message".to_string()]);
        ToolDefinition::new("commit_message", "produce a commit message", schema)
    }

    #[tokio::test]
    async fn registering_duplicate_command_name_fails() {
        let mut reg = CommandRegistry::new();
        reg.register(Command::new("x", "d", commit_tool(), "sys")).unwrap();
        let err = reg.register(Command::new("x", "d2", commit_tool(), "sys2")).unwrap_err();
        assert!(matches!(err, CommandRegistryError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn builtin_command_cannot_be_replaced() {
        let mut reg = CommandRegistry::new();
        let mut builtin = Command::new("x", "d", commit_tool(), "sys");
        builtin.builtin = true;
        reg.register(builtin).unwrap();
        let err = reg.register(Command::new("x", "d2", commit_tool(), "sys2")).unwrap_err();
        assert!(matches!(err, CommandRegistryError::BuiltinProtected(_)));
    }

    #[tokio::test]
    async fn execute_decodes_tool_arguments_on_success() {
        let client = Arc::new(ScriptedCompletionClient::new(vec![CompletionResponse {
            choices: vec![CompletionChoice {
                tool_calls: vec![ToolCallRequest {
                    id: "1".into(),
                    name: "commit_message".into(),
                    arguments: "{\"message\":\"fix bug\"}".into(),
                }],
                ..Default::default()
            }],
            usage: Usage::default(),
        }]));
        let invoker = ModelInvoker::new(client, "mock-model", 0.0, 0.0);
        let runner = CommandRunner::new(invoker, Arc::new(StubCollector));
        let command = Command::new("commit", "write a commit message", commit_tool(), "sys");
        let (result, _trace) = runner.execute(&command, "diff goes here").await;
        assert_eq!(result.unwrap()["message"], "fix bug");
    }

    #[tokio::test]
    async fn execute_reports_missing_tool_call_when_model_replies_with_text_twice() {
        let client = Arc::new(ScriptedCompletionClient::always_text("I refuse to call tools"));
        let invoker = ModelInvoker::new(client, "mock-model", 0.0, 0.0);
        let runner = CommandRunner::new(invoker, Arc::new(StubCollector));
        let command = Command::new("commit", "write a commit message", commit_tool(), "sys");
        let (result, _trace) = runner.execute(&command, "diff goes here").await;
        assert!(matches!(result.unwrap_err(), BuckleyError::MissingToolCall));
    }

    struct FailingCollector;
    #[async_trait::async_trait]
    impl ContextCollector for FailingCollector {
        async fn collect(&self, _user_input: &str) -> Result<crate::context_collector::ContextBundle, BuckleyError> {
            Err(BuckleyError::ContextCollectionFailed("diff command not found".to_string()))
        }
    }

    #[tokio::test]
    async fn execute_surfaces_context_collection_failure_without_calling_model() {
        let client = Arc::new(ScriptedCompletionClient::always_text("should not be reached"));
        let invoker = ModelInvoker::new(client, "mock-model", 0.0, 0.0);
        let runner = CommandRunner::new(invoker, Arc::new(FailingCollector));
        let command = Command::new("commit", "write a commit message", commit_tool(), "sys");
        let (result, _trace) = runner.execute(&command, "diff goes here").await;
        assert!(matches!(result.unwrap_err(), BuckleyError::ContextCollectionFailed(_)));
    }

    #[tokio::test]
    async fn execute_reports_invalid_arguments_when_required_field_missing() {
        let client = Arc::new(ScriptedCompletionClient::new(vec![CompletionResponse {
            choices: vec![CompletionChoice {
                tool_calls: vec![ToolCallRequest { id: "1".into(), name: "commit_message".into(), arguments: "{}".into() }],
                ..Default::default()
            }],
            usage: Usage::default(),
        }]));
        let invoker = ModelInvoker::new(client, "mock-model", 0.0, 0.0);
        let runner = CommandRunner::new(invoker, Arc::new(StubCollector));
        let command = Command::new("commit", "write a commit message", commit_tool(), "sys");
        let (result, _trace) = runner.execute(&command, "diff").await;
        match result.unwrap_err() {
            BuckleyError::InvalidArguments { field, .. } => assert_eq!(field, "message"),
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }
}
