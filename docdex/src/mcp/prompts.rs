//! Prompt templates offered to MCP clients

use super::protocol::{JsonRpcError, PromptArgument, PromptDefinition, PromptMessage, ToolContent};
use serde_json::Value;

const DOCUMENTATION_QUERY: &str = "documentation_query";

/// How much detail a documentation query asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetailLevel {
    Brief,
    #[default]
    Medium,
    Comprehensive,
}

impl DetailLevel {
    /// Parse a level name; anything unrecognized means `Medium`
    pub fn parse(level: &str) -> Self {
        match level.trim().to_lowercase().as_str() {
            "brief" => DetailLevel::Brief,
            "comprehensive" => DetailLevel::Comprehensive,
            _ => DetailLevel::Medium,
        }
    }

    /// Prompt text asking about `topic` at this level of detail
    pub fn render(self, topic: &str) -> String {
        match self {
            DetailLevel::Brief => format!("Provide a brief summary of {} from the documentation.", topic),
            DetailLevel::Medium => format!(
                "Explain {} with examples and key points from the documentation.",
                topic
            ),
            DetailLevel::Comprehensive => format!(
                "Provide a comprehensive explanation of {} including all details, examples, and related concepts from the documentation.",
                topic
            ),
        }
    }
}

/// All prompt definitions
pub fn get_prompt_definitions() -> Vec<PromptDefinition> {
    vec![PromptDefinition {
        name: DOCUMENTATION_QUERY.to_string(),
        description: "Generate a prompt for querying the documentation about a topic".to_string(),
        arguments: vec![
            PromptArgument {
                name: "topic".to_string(),
                description: "The topic to ask about".to_string(),
                required: true,
            },
            PromptArgument {
                name: "detail_level".to_string(),
                description: "brief, medium (default) or comprehensive".to_string(),
                required: false,
            },
        ],
    }]
}

/// Render the named prompt with `arguments`
pub fn get_prompt(name: &str, arguments: &Value) -> Result<Vec<PromptMessage>, JsonRpcError> {
    if name != DOCUMENTATION_QUERY {
        return Err(JsonRpcError::invalid_params(format!("Unknown prompt: {}", name)));
    }

    let topic = arguments
        .get("topic")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| JsonRpcError::invalid_params("Missing topic argument"))?;

    let level = arguments
        .get("detail_level")
        .and_then(|v| v.as_str())
        .map(DetailLevel::parse)
        .unwrap_or_default();

    Ok(vec![PromptMessage {
        role: "user".to_string(),
        content: ToolContent::text(level.render(topic)),
    }])
}
