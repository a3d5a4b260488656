//! Structured-output delegation contract.

use serde::{Deserialize, Serialize};

/// Request sent to an external structured-output agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredOutputPrompt {
    pub prompt: String,
    /// JSON Schema describing the fields expected back.
    pub output_schema: serde_json::Value,
}

/// Reply from an external structured-output agent.
///
/// Weakly typed: any field may be missing or carry an unexpected type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuredOutputResponse {
    #[serde(default)]
    pub output: serde_json::Map<String, serde_json::Value>,
}

impl StructuredOutputResponse {
    pub fn new(output: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { output }
    }
}
