// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool descriptors advertised to the model.
//!
//! The adapter never executes tools itself: it only tells the provider which
//! functions exist and hands requested calls back to the caller. A descriptor
//! serializes directly into the provider's function-tool shape:
//!
//! ```json
//! {"type": "function",
//!  "function": {"name": "get_weather", "description": "...",
//!               "parameters": {"type": "object", "properties": {...}, "required": []}}}
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use parley::tools::ToolDescriptor;
//! use serde_json::json;
//!
//! let tool = ToolDescriptor::function("get_weather", "Current weather for a city")
//!     .with_property("city", json!({"type": "string"}))
//!     .with_required(["city"]);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON Schema for a function's parameters. Always an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl ParameterSchema {
    /// Create an object schema with the given properties and no required fields.
    pub fn object(properties: Map<String, Value>) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties,
            required: Vec::new(),
        }
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::object(Map::new())
    }
}

/// Function part of a tool descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

/// Provider-shaped tool descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDescriptor,
}

impl ToolDescriptor {
    /// Start a function descriptor with no parameters.
    pub fn function(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDescriptor {
                name: name.into(),
                description: description.into(),
                parameters: ParameterSchema::default(),
            },
        }
    }

    /// Add a parameter property.
    pub fn with_property(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.function.parameters.properties.insert(name.into(), schema);
        self
    }

    /// Mark properties as required.
    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.function.parameters.required = required.into_iter().map(Into::into).collect();
        self
    }

    /// Tool name.
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Build a provider-shaped tool descriptor.
///
/// `required` defaults to an empty list when `None`.
pub fn describe_tool(
    name: impl Into<String>,
    description: impl Into<String>,
    properties: Map<String, Value>,
    required: Option<Vec<String>>,
) -> ToolDescriptor {
    let mut descriptor = ToolDescriptor::function(name, description);
    descriptor.function.parameters = ParameterSchema {
        required: required.unwrap_or_default(),
        ..ParameterSchema::object(properties)
    };
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn city_properties() -> Map<String, Value> {
        json!({"city": {"type": "string", "description": "City name"}})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_describe_tool_shape() {
        let tool = describe_tool(
            "get_weather",
            "Current weather",
            city_properties(),
            Some(vec!["city".to_string()]),
        );
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "Current weather",
                    "parameters": {
                        "type": "object",
                        "properties": {"city": {"type": "string", "description": "City name"}},
                        "required": ["city"]
                    }
                }
            })
        );
    }

    #[test]
    fn test_describe_tool_required_defaults_to_empty() {
        let tool = describe_tool("noop", "Does nothing", Map::new(), None);
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["function"]["parameters"]["required"], json!([]));
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_builder_matches_function_form() {
        let built = ToolDescriptor::function("get_weather", "Current weather")
            .with_property("city", json!({"type": "string", "description": "City name"}))
            .with_required(["city"]);
        let described = describe_tool(
            "get_weather",
            "Current weather",
            city_properties(),
            Some(vec!["city".to_string()]),
        );
        assert_eq!(built, described);
        assert_eq!(built.name(), "get_weather");
    }
}
