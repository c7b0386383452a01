use super::Operation;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An MCP-style tool description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolSpec {
    /// Names of the required parameters
    pub fn required(&self) -> Vec<&str> {
        self.input_schema["required"]
            .as_array()
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

fn number(description: &str) -> Value {
    json!({"type": "number", "description": description})
}

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn describe(op: Operation) -> (&'static str, Value) {
    match op {
        Operation::Add => (
            "Add two numbers together",
            schema(
                json!({"a": number("First number"), "b": number("Second number")}),
                &["a", "b"],
            ),
        ),
        Operation::Subtract => (
            "Subtract second number from first number",
            schema(
                json!({"a": number("First number"), "b": number("Second number to subtract")}),
                &["a", "b"],
            ),
        ),
        Operation::Multiply => (
            "Multiply two numbers together",
            schema(
                json!({"a": number("First number"), "b": number("Second number")}),
                &["a", "b"],
            ),
        ),
        Operation::Divide => (
            "Divide first number by second number",
            schema(
                json!({"a": number("Numerator"), "b": number("Denominator (cannot be zero)")}),
                &["a", "b"],
            ),
        ),
        Operation::Power => (
            "Raise first number to the power of second number",
            schema(
                json!({"base": number("Base number"), "exponent": number("Exponent")}),
                &["base", "exponent"],
            ),
        ),
        Operation::Sqrt => (
            "Calculate square root of a number",
            schema(
                json!({"value": number("Number to calculate square root of (must be non-negative)")}),
                &["value"],
            ),
        ),
        Operation::Abs => (
            "Calculate absolute value of a number",
            schema(
                json!({"value": number("Number to calculate absolute value of")}),
                &["value"],
            ),
        ),
        Operation::Factorial => (
            "Calculate factorial of a non-negative integer",
            schema(
                json!({"n": {
                    "type": "integer",
                    "description": "Non-negative integer to calculate factorial of"
                }}),
                &["n"],
            ),
        ),
    }
}

/// One tool per supported operation, in a stable order
pub fn tool_catalog() -> Vec<ToolSpec> {
    Operation::ALL
        .into_iter()
        .map(|op| {
            let (description, input_schema) = describe(op);
            ToolSpec {
                name: op.name().to_string(),
                description: description.to_string(),
                input_schema,
            }
        })
        .collect()
}
