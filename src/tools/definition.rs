// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool definition types
//!
//! A tool's declared name, description and JSON input schema, plus the
//! argument checks tools run in [`Tool::build`](super::Tool::build).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON schema for a tool's arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Value,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolInputSchema {
    /// Check that `args` is an object carrying every required property with
    /// the declared primitive type.
    pub fn check(&self, args: &Value) -> Result<()> {
        let object = args
            .as_object()
            .ok_or_else(|| AgentError::InvalidInput("arguments must be an object".to_string()))?;

        for name in &self.required {
            if !object.contains_key(name) {
                return Err(AgentError::InvalidInput(format!("{} is required", name)));
            }
        }

        for (name, value) in object {
            let Some(expected) = self.properties.get(name).and_then(|p| p["type"].as_str()) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_u64() || value.is_i64(),
                "boolean" => value.is_boolean(),
                _ => true,
            };
            if !matches {
                return Err(AgentError::InvalidInput(format!(
                    "{} must be of type {}",
                    name, expected
                )));
            }
        }

        Ok(())
    }
}

/// Helper to create a tool input schema
pub struct SchemaBuilder {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            properties: serde_json::Map::new(),
            required: vec![],
        }
    }

    /// Add a string property
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, "string", description, required)
    }

    /// Add an integer property
    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, "integer", description, required)
    }

    /// Add a boolean property
    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(name, "boolean", description, required)
    }

    fn property(mut self, name: &str, kind: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({
                "type": kind,
                "description": description
            }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Build the schema
    pub fn build(self) -> ToolInputSchema {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: Value::Object(self.properties),
            required: self.required,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path_schema() -> ToolInputSchema {
        SchemaBuilder::new()
            .string("path", "File path", true)
            .integer("limit", "Max lines", false)
            .boolean("hidden", "Include hidden entries", false)
            .build()
    }

    #[test]
    fn test_schema_builder_build() {
        let schema = path_schema();

        assert_eq!(schema.schema_type, "object");
        assert_eq!(schema.required, vec!["path".to_string()]);
        assert_eq!(schema.properties["limit"]["type"], "integer");
        assert_eq!(schema.properties["path"]["description"], "File path");
    }

    #[test]
    fn test_schema_serializes_with_type_key() {
        let value = serde_json::to_value(path_schema()).unwrap();
        assert_eq!(value["type"], "object");
    }

    #[test]
    fn test_check_accepts_valid_args() {
        let schema = path_schema();
        assert!(schema.check(&json!({"path": "src", "limit": 5})).is_ok());
        // Undeclared properties are tolerated
        assert!(schema.check(&json!({"path": "src", "extra": [1]})).is_ok());
    }

    #[test]
    fn test_check_missing_required() {
        let err = path_schema().check(&json!({"limit": 5})).unwrap_err();
        assert!(err.to_string().contains("path is required"));
    }

    #[test]
    fn test_check_wrong_type() {
        let err = path_schema()
            .check(&json!({"path": "src", "hidden": "yes"}))
            .unwrap_err();
        assert!(err.to_string().contains("hidden must be of type boolean"));
    }

    #[test]
    fn test_check_non_object() {
        assert!(path_schema().check(&json!(["src"])).is_err());
    }
}
