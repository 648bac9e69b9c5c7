// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! A minimal demo tool used by integration tests and examples. Real tool
//! executors (shell, file I/O, web search, ...) are out of scope, named
//! external collaborators behind the `Tool` trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::cancellation::CancellationToken;
use crate::schema::ParameterSchema;
use crate::tool::{Tool, ToolCall, ToolResult};

/// Evaluates a tiny subset of arithmetic: `"<number> <+|-|*|/> <number>"`.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates a simple arithmetic expression of the form 'A op B'."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        let mut props = BTreeMap::new();
        props.insert(
            "expr".to_string(),
            ParameterSchema::string().with_description("expression, e.g. \"17*23\""),
        );
        ParameterSchema::object(props, vec!["expr".to_string()])
    }

    async fn execute(&self, call: &ToolCall, _cancel: &CancellationToken) -> ToolResult {
        let expr = match call.args.get("expr").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => return ToolResult::err(&call.id, "missing `expr` argument"),
        };
        match evaluate(expr) {
            Some(result) => ToolResult::ok(&call.id, result.to_string()),
            None => ToolResult::err(&call.id, format!("could not evaluate: {expr}")),
        }
    }
}

fn evaluate(expr: &str) -> Option<f64> {
    let expr = expr.trim();
    for op in ['+', '-', '*', '/'] {
        if let Some(idx) = expr.find(op) {
            let (lhs, rhs) = expr.split_at(idx);
            let lhs: f64 = lhs.trim().parse().ok()?;
            let rhs: f64 = rhs[1..].trim().parse().ok()?;
            return Some(match op {
                '+' => lhs + rhs,
                '-' => lhs - rhs,
                '*' => lhs * rhs,
                '/' => lhs / rhs,
                _ => unreachable!(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "1".into(),
            name: "calculator".into(),
            raw_arguments: args.to_string(),
            args,
        }
    }

    #[tokio::test]
    async fn multiplies_two_integers() {
        let out = CalculatorTool.execute(&call(json!({"expr": "17*23"})), &CancellationToken::new()).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "391");
    }

    #[tokio::test]
    async fn missing_expr_is_an_error() {
        let out = CalculatorTool.execute(&call(json!({})), &CancellationToken::new()).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn unparseable_expr_is_an_error() {
        let out = CalculatorTool.execute(&call(json!({"expr": "banana"})), &CancellationToken::new()).await;
        assert!(out.is_error);
    }
}
