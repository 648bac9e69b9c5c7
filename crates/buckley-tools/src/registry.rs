// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::cancellation::CancellationToken;
use crate::error::RegistryError;
use crate::schema::ToolDefinition;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolResult};

/// Tool output longer than this is shortened per the tool's
/// [`OutputCategory`] before it is handed back to the caller.
const MAX_TOOL_RESULT_CHARS: usize = 8_000;

struct Entry {
    def: ToolDefinition,
    tool: Arc<dyn Tool>,
}

/// Central registry of tool definitions and their executors.
///
/// Read-heavy, many-reader/one-writer: readers take a shared lock, the
/// single `register` path takes the exclusive lock. Subsetting copies
/// entries into a brand-new registry rather than filtering a view, so the
/// subset's lifetime is independent of the parent's.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Entry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. Rejects an empty name and rejects a name that is
    /// already registered; the first registration is never overwritten.
    pub fn register(&self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        let def = ToolDefinition::new(name.clone(), tool.description(), tool.parameters_schema());
        tools.insert(name, Entry { def, tool: Arc::new(tool) });
        Ok(())
    }

    /// Register a tool, panicking on error. For static initialization only.
    pub fn must_register(&self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.register(tool)
            .unwrap_or_else(|e| panic!("must_register({name}) failed: {e}"));
    }

    pub fn get(&self, name: &str) -> Option<ToolDefinition> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .map(|e| e.def.clone())
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut defs: Vec<ToolDefinition> = tools.values().map(|e| e.def.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build an independent registry containing only the named tools.
    /// Names not present in `self` are silently skipped.
    pub fn subset(&self, names: &[&str]) -> ToolRegistry {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let subset = ToolRegistry::new();
        let mut out = subset.tools.write().expect("tool registry lock poisoned");
        for name in names {
            if let Some(entry) = tools.get(*name) {
                out.insert(
                    name.to_string(),
                    Entry {
                        def: entry.def.clone(),
                        tool: Arc::clone(&entry.tool),
                    },
                );
            }
        }
        drop(out);
        subset
    }

    pub async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        let tool = {
            let tools = self.tools.read().expect("tool registry lock poisoned");
            tools.get(&call.name).map(|e| Arc::clone(&e.tool))
        };
        match tool {
            Some(tool) => {
                let category = tool.output_category();
                let mut result = tool.execute(call, cancel).await;
                truncate_for_category(&mut result, category);
                result
            }
            None => ToolResult::err(&call.id, format!("unknown tool: {}", call.name)),
        }
    }
}

/// Shorten an over-long result per its tool's declared output shape,
/// setting `is_truncated` so the transcript can record what happened.
fn truncate_for_category(result: &mut ToolResult, category: OutputCategory) {
    if result.content.len() <= MAX_TOOL_RESULT_CHARS {
        return;
    }
    let half = MAX_TOOL_RESULT_CHARS / 2;
    result.content = match category {
        OutputCategory::HeadTail | OutputCategory::FileContent => {
            let head: String = result.content.chars().take(half).collect();
            let tail: String = result
                .content
                .chars()
                .rev()
                .take(half)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("{head}\n...[truncated]...\n{tail}")
        }
        OutputCategory::MatchList => {
            let head: String = result.content.chars().take(MAX_TOOL_RESULT_CHARS).collect();
            format!("{head}\n...[truncated]")
        }
        OutputCategory::Generic => {
            let head: String = result.content.chars().take(MAX_TOOL_RESULT_CHARS).collect();
            format!("{head}\n...[truncated]")
        }
    };
    result.is_truncated = true;
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: OnceLock<ToolRegistry> = OnceLock::new();

/// Process-wide default registry. Every operation that needs a registry
/// also accepts one explicitly; this default exists only for callers that
/// have no reason to construct their own (see design note on global
/// registries with an injectable override).
pub fn default_registry() -> &'static ToolRegistry {
    DEFAULT_REGISTRY.get_or_init(ToolRegistry::new)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::schema::ParameterSchema;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::object(Default::default(), vec![])
        }
        async fn execute(&self, call: &ToolCall, _cancel: &CancellationToken) -> ToolResult {
            ToolResult::ok(&call.id, format!("echo:{}", call.args))
        }
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "1".into(),
            name: name.into(),
            raw_arguments: args.to_string(),
            args,
        }
    }

    #[test]
    fn register_and_get() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" }).unwrap();
        assert!(reg.get("echo").is_some());
    }

    #[test]
    fn register_rejects_empty_name() {
        let reg = ToolRegistry::new();
        let err = reg.register(EchoTool { name: "" }).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyName));
    }

    #[test]
    fn registering_same_name_twice_fails_and_keeps_first() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "t" }).unwrap();
        let err = reg.register(EchoTool { name: "t" }).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
        assert_eq!(reg.names(), vec!["t".to_string()]);
    }

    #[test]
    fn get_unknown_returns_none() {
        let reg = ToolRegistry::new();
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn subset_names_are_contained_in_source() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "a" }).unwrap();
        reg.register(EchoTool { name: "b" }).unwrap();
        reg.register(EchoTool { name: "c" }).unwrap();
        let sub = reg.subset(&["a", "b", "missing"]);
        let sub_names: std::collections::HashSet<_> = sub.names().into_iter().collect();
        let src_names: std::collections::HashSet<_> = reg.names().into_iter().collect();
        assert!(sub_names.is_subset(&src_names));
        assert_eq!(sub_names.len(), 2);
    }

    #[tokio::test]
    async fn execute_known_tool_succeeds() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" }).unwrap();
        let out = reg.execute(&call("echo", serde_json::json!({"x": 1})), &CancellationToken::new()).await;
        assert!(!out.is_error);
        assert!(out.content.starts_with("echo:"));
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error() {
        let reg = ToolRegistry::new();
        let out = reg.execute(&call("missing", serde_json::json!({})), &CancellationToken::new()).await;
        assert!(out.is_error);
        assert!(out.content.contains("unknown tool"));
    }

    struct HugeTool;

    #[async_trait]
    impl Tool for HugeTool {
        fn name(&self) -> &str {
            "huge"
        }
        fn description(&self) -> &str {
            "produces an oversized result"
        }
        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::object(Default::default(), vec![])
        }
        fn output_category(&self) -> OutputCategory {
            OutputCategory::Generic
        }
        async fn execute(&self, call: &ToolCall, _cancel: &CancellationToken) -> ToolResult {
            ToolResult::ok(&call.id, "x".repeat(MAX_TOOL_RESULT_CHARS * 2))
        }
    }

    #[tokio::test]
    async fn oversized_result_is_truncated_and_flagged() {
        let reg = ToolRegistry::new();
        reg.register(HugeTool).unwrap();
        let out = reg.execute(&call("huge", serde_json::json!({})), &CancellationToken::new()).await;
        assert!(out.is_truncated);
        assert!(out.content.len() < MAX_TOOL_RESULT_CHARS * 2);
    }

    #[tokio::test]
    async fn small_result_is_not_truncated() {
        let reg = ToolRegistry::new();
        reg.register(EchoTool { name: "echo" }).unwrap();
        let out = reg.execute(&call("echo", serde_json::json!({"x": 1})), &CancellationToken::new()).await;
        assert!(!out.is_truncated);
    }
}
