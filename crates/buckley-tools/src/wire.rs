// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Pure projections from a [`ToolDefinition`] into the wire shape a given
//! provider expects. The core never mixes the two dialects within one
//! request.

use serde_json::{json, Value};

use crate::schema::ToolDefinition;

/// Project a tool definition into the OpenAI `tools[]` function shape.
pub fn to_openai_format(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.parameters.to_json_schema(),
        }
    })
}

/// Project a tool definition into the Anthropic `tools[]` shape.
pub fn to_anthropic_format(def: &ToolDefinition) -> Value {
    json!({
        "name": def.name,
        "description": def.description,
        "input_schema": def.parameters.to_json_schema(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParameterSchema;
    use std::collections::BTreeMap;

    fn sample() -> ToolDefinition {
        let mut props = BTreeMap::new();
        props.insert("expr".to_string(), ParameterSchema::string());
        ToolDefinition::new(
            "calculator",
            "evaluates an arithmetic expression",
            ParameterSchema::object(props, vec!["expr".to_string()]),
        )
    }

    #[test]
    fn openai_format_round_trips_name_description_required_and_types() {
        let def = sample();
        let wire = to_openai_format(&def);
        assert_eq!(wire["function"]["name"], "calculator");
        assert_eq!(wire["function"]["description"], def.description);
        assert_eq!(wire["function"]["parameters"]["required"][0], "expr");
        assert_eq!(wire["function"]["parameters"]["properties"]["expr"]["type"], "string");
    }

    #[test]
    fn anthropic_format_uses_input_schema_key() {
        let def = sample();
        let wire = to_anthropic_format(&def);
        assert_eq!(wire["name"], "calculator");
        assert_eq!(wire["input_schema"]["type"], "object");
    }
}
