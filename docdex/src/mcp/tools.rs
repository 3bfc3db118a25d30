//! MCP tool definitions and dispatch
//!
//! Tool calls arrive as a name plus a JSON arguments object. They are
//! parsed into a [`ToolCall`] up front so that malformed arguments are
//! rejected before reaching the service.

use super::answer::{self, Answerer, AskRequest};
use super::protocol::{JsonRpcError, ToolDefinition, ToolResult};
use crate::service::DocService;
use serde::Deserialize;
use serde_json::{json, Value};

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ListDocs {
        directory: Option<String>,
    },
    SearchDocs {
        query: String,
        max_results: Option<usize>,
    },
    GetDoc {
        path: String,
        from_line: Option<usize>,
        max_lines: Option<usize>,
        line_numbers: bool,
    },
    RefreshIndex,
    AskDocs(AskRequest),
}

#[derive(Deserialize)]
struct ListDocsArgs {
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Deserialize)]
struct SearchDocsArgs {
    query: String,
    #[serde(default, alias = "limit")]
    max_results: Option<i64>,
}

#[derive(Deserialize)]
struct GetDocArgs {
    path: String,
    #[serde(default)]
    from_line: Option<usize>,
    #[serde(default)]
    max_lines: Option<usize>,
    #[serde(default)]
    line_numbers: bool,
}

impl ToolCall {
    /// Validate a `tools/call` name and arguments
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, JsonRpcError> {
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };

        match name {
            "list_docs" => {
                let args: ListDocsArgs = parse_args(name, arguments)?;
                Ok(ToolCall::ListDocs {
                    directory: args.directory,
                })
            }
            "search_docs" => {
                let args: SearchDocsArgs = parse_args(name, arguments)?;
                let max_results = args.max_results.map(positive_limit).transpose()?;
                Ok(ToolCall::SearchDocs {
                    query: args.query,
                    max_results,
                })
            }
            "get_doc" => {
                let args: GetDocArgs = parse_args(name, arguments)?;
                let (path, suffix_line) = crate::split_line_suffix(&args.path);
                Ok(ToolCall::GetDoc {
                    path: path.to_string(),
                    from_line: args.from_line.or(suffix_line),
                    max_lines: args.max_lines,
                    line_numbers: args.line_numbers,
                })
            }
            "refresh_index" | "index_docs" => Ok(ToolCall::RefreshIndex),
            "ask_docs" => Ok(ToolCall::AskDocs(parse_args(name, arguments)?)),
            _ => Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", name))),
        }
    }

    /// Canonical tool name
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ListDocs { .. } => "list_docs",
            ToolCall::SearchDocs { .. } => "search_docs",
            ToolCall::GetDoc { .. } => "get_doc",
            ToolCall::RefreshIndex => "refresh_index",
            ToolCall::AskDocs(_) => "ask_docs",
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(arguments)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid arguments for {}: {}", tool, e)))
}

fn positive_limit(value: i64) -> Result<usize, JsonRpcError> {
    usize::try_from(value)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            JsonRpcError::invalid_params(format!(
                "Invalid argument: max_results must be greater than 0, got {}",
                value
            ))
        })
}

/// Get all tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_docs".to_string(),
            description: "List available documentation files with their titles and sizes, sorted by path.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Optional subdirectory to list (relative to the docs root)"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "search_docs".to_string(),
            description: "Keyword search across the documentation with TF-IDF ranking. Returns matching paths, scores and excerpts.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query text"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 10)",
                        "default": 10,
                        "minimum": 1
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "get_doc".to_string(),
            description: "Get a documentation file by path. Supports line range extraction.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Document path relative to the docs root, optionally with a :linenum suffix"
                    },
                    "from_line": {
                        "type": "integer",
                        "description": "Start from this line number (1-indexed)"
                    },
                    "max_lines": {
                        "type": "integer",
                        "description": "Maximum number of lines to return"
                    },
                    "line_numbers": {
                        "type": "boolean",
                        "description": "Add line numbers to output (format: 'N: content')",
                        "default": false
                    }
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: "refresh_index".to_string(),
            description: "Rescan the documentation folder and rebuild the search index. Reports files that could not be read.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: "ask_docs".to_string(),
            description: "Answer a question from the documentation. Gathers relevant documents as context and answers with the configured model, or returns the context when none is configured.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to answer"
                    },
                    "context_docs": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Optional document paths to use as context (default: top search results)"
                    },
                    "max_context_length": {
                        "type": "integer",
                        "description": "Maximum characters of context to include (default: 4000)",
                        "default": 4000
                    }
                },
                "required": ["question"]
            }),
        },
    ]
}

/// Execute a validated tool call
pub fn handle_tool_call(
    service: &DocService,
    answerer: Option<&dyn Answerer>,
    call: ToolCall,
) -> Result<ToolResult, JsonRpcError> {
    match call {
        ToolCall::ListDocs { directory } => ToolResult::json(&service.list_docs(directory.as_deref())),
        ToolCall::SearchDocs { query, max_results } => {
            let hits = service.search_docs(&query, max_results)?;
            ToolResult::json(&hits)
        }
        ToolCall::GetDoc {
            path,
            from_line,
            max_lines,
            line_numbers,
        } => tool_get(service, &path, from_line, max_lines, line_numbers),
        ToolCall::RefreshIndex => {
            let stats = service.refresh_index()?;
            ToolResult::json(&stats)
        }
        ToolCall::AskDocs(request) => {
            let result = answer::ask(service, answerer, &request)?;
            ToolResult::json(&result)
        }
    }
}

fn tool_get(
    service: &DocService,
    path: &str,
    from_line: Option<usize>,
    max_lines: Option<usize>,
    line_numbers: bool,
) -> Result<ToolResult, JsonRpcError> {
    let doc = service.get_doc(path)?;

    let mut content = doc.lines(from_line, max_lines);
    if line_numbers {
        content = crate::number_lines(&content, from_line.unwrap_or(1));
    }

    let mut result = json!({
        "path": doc.path,
        "title": doc.title,
        "size": doc.size,
        "modifiedAt": doc.modified_at,
        "hash": doc.hash,
        "lineCount": content.lines().count(),
        "content": content,
    });
    if let Some(from) = from_line {
        result["fromLine"] = json!(from);
    }

    ToolResult::json(&result)
}
