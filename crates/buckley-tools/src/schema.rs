// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Typed tool definitions and their JSON-Schema-like parameter shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The JSON type of one parameter (or nested property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    String,
    Number,
    Integer,
    Boolean,
    Array,
}

/// A JSON-Schema-like description of one parameter, or of the whole
/// parameters object.
///
/// Mirrors the subset of JSON Schema the model providers understand: type,
/// an object's properties/required list, an array's item schema, an enum of
/// allowed string values, and numeric/string bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ParameterSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "enum")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl ParameterSchema {
    pub fn object(properties: BTreeMap<String, ParameterSchema>, required: Vec<String>) -> Self {
        Self {
            schema_type: SchemaType::Object,
            description: None,
            properties,
            required,
            items: None,
            enum_values: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
        }
    }

    pub fn string() -> Self {
        Self::leaf(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::leaf(SchemaType::Number)
    }

    pub fn array(items: ParameterSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::leaf(SchemaType::Array)
        }
    }

    fn leaf(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            description: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            items: None,
            enum_values: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Project this schema into a plain JSON Schema document, recursively.
    pub fn to_json_schema(&self) -> Value {
        serde_json::to_value(self).unwrap_or(json!({"type": "object"}))
    }
}

/// A named, schema-typed operation the model can request.
///
/// Immutable after registration: no operation mutates a `ToolDefinition`
/// in place, only `ToolRegistry::register` installs new ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_schema_round_trips_properties_and_required() {
        let mut props = BTreeMap::new();
        props.insert("expr".to_string(), ParameterSchema::string());
        let schema = ParameterSchema::object(props, vec!["expr".to_string()]);
        let def = ToolDefinition::new("calculator", "evaluates an expression", schema);
        let json = def.parameters.to_json_schema();
        assert_eq!(json["type"], "object");
        assert_eq!(json["required"][0], "expr");
        assert_eq!(json["properties"]["expr"]["type"], "string");
    }

    #[test]
    fn array_schema_carries_item_type() {
        let schema = ParameterSchema::array(ParameterSchema::number());
        let json = schema.to_json_schema();
        assert_eq!(json["type"], "array");
        assert_eq!(json["items"]["type"], "number");
    }

    #[test]
    fn enum_values_are_serialized_under_enum_key() {
        let schema = ParameterSchema::string().with_enum(vec!["a".into(), "b".into()]);
        let json = schema.to_json_schema();
        assert_eq!(json["enum"], json!(["a", "b"]));
    }
}
