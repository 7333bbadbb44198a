//! Static catalog of the actions the agent can plan.
//!
//! The registry is pure data: each tool carries a name, a description and a
//! JSON schema for its arguments, in the shape the reasoning service expects
//! for function calling. Argument validation happens here, before dispatch,
//! so a malformed plan never reaches a side effect.

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Schema validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool {tool} is missing required argument '{field}'")]
    MissingArgument { tool: String, field: String },
    #[error("Tool {tool} argument '{field}' must be a {expected}")]
    WrongKind {
        tool: String,
        field: String,
        expected: String,
    },
}

/// The closed set of action kinds the agent knows how to perform.
///
/// Dispatch on tool names goes through this enum so that every call site
/// matches exhaustively; an unregistered name is rejected at validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SendGmail,
    CreateGoogleDoc,
    BrowserNavigate,
    BrowserClick,
    BrowserType,
    ReadPageContent,
    Wait,
    TaskComplete,
}

impl ToolKind {
    /// Canonical tool name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::SendGmail => "send_gmail",
            ToolKind::CreateGoogleDoc => "create_google_doc",
            ToolKind::BrowserNavigate => "browser_navigate",
            ToolKind::BrowserClick => "browser_click",
            ToolKind::BrowserType => "browser_type",
            ToolKind::ReadPageContent => "read_page_content",
            ToolKind::Wait => "wait",
            ToolKind::TaskComplete => "task_complete",
        }
    }

    /// Resolve a wire name to a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "send_gmail" => Some(ToolKind::SendGmail),
            "create_google_doc" => Some(ToolKind::CreateGoogleDoc),
            "browser_navigate" => Some(ToolKind::BrowserNavigate),
            "browser_click" => Some(ToolKind::BrowserClick),
            "browser_type" => Some(ToolKind::BrowserType),
            "read_page_content" => Some(ToolKind::ReadPageContent),
            "wait" => Some(ToolKind::Wait),
            "task_complete" => Some(ToolKind::TaskComplete),
            _ => None,
        }
    }
}

/// Immutable description of one tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub description: &'static str,
    /// JSON schema for the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    /// Render this spec as an OpenAI-style function definition.
    pub fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.kind.name(),
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Read-only catalog of tool specs. Names are unique.
#[derive(Debug)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Build the standard registry for this agent.
    pub fn standard() -> Self {
        let specs = vec![
            ToolSpec {
                kind: ToolKind::SendGmail,
                description: "Sends an email using the user's Gmail account.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "recipient": {
                            "type": "string",
                            "description": "The email address of the recipient."
                        },
                        "subject": {
                            "type": "string",
                            "description": "The subject line of the email."
                        },
                        "body": {
                            "type": "string",
                            "description": "The body content of the email."
                        }
                    },
                    "required": ["recipient", "subject", "body"]
                }),
            },
            ToolSpec {
                kind: ToolKind::CreateGoogleDoc,
                description: "Creates a new Google Document in the user's Drive.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "title": {
                            "type": "string",
                            "description": "The title of the new document."
                        },
                        "content": {
                            "type": "string",
                            "description": "The initial content to write into the document."
                        }
                    },
                    "required": ["title", "content"]
                }),
            },
            ToolSpec {
                kind: ToolKind::BrowserNavigate,
                description: "Navigates the browser to a specific URL.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "The full URL to navigate to (e.g., https://www.google.com)."
                        }
                    },
                    "required": ["url"]
                }),
            },
            ToolSpec {
                kind: ToolKind::BrowserClick,
                description: "Clicks a specific element on the current page using a CSS selector.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "The CSS selector of the element to click (e.g., #submit-button, .nav-link)."
                        }
                    },
                    "required": ["selector"]
                }),
            },
            ToolSpec {
                kind: ToolKind::BrowserType,
                description: "Types text into an input field identified by a CSS selector.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "The CSS selector of the input field."
                        },
                        "text": {
                            "type": "string",
                            "description": "The text to type into the field."
                        }
                    },
                    "required": ["selector", "text"]
                }),
            },
            ToolSpec {
                kind: ToolKind::ReadPageContent,
                description: "Reads the visible text of the current page, truncated to a few \
                              thousand characters.",
                parameters: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            ToolSpec {
                kind: ToolKind::Wait,
                description: "Pauses for the given number of seconds, e.g. while a page loads.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "seconds": {
                            "type": "number",
                            "description": "How long to wait, in seconds."
                        }
                    },
                    "required": ["seconds"]
                }),
            },
            ToolSpec {
                kind: ToolKind::TaskComplete,
                description: "Call this when the task is finished. The final_answer is shown to \
                              the user as the result.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "final_answer": {
                            "type": "string",
                            "description": "A short summary of what was accomplished."
                        }
                    },
                    "required": ["final_answer"]
                }),
            },
        ];

        Self { specs }
    }

    /// All registered specs.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Planner-facing function definitions for every registered tool.
    pub fn definitions(&self) -> Vec<Value> {
        self.specs.iter().map(|s| s.definition()).collect()
    }

    /// Look up a spec by wire name.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        let kind = ToolKind::from_name(name)?;
        self.specs.iter().find(|s| s.kind == kind)
    }

    /// Validate an argument object against the named tool's schema.
    ///
    /// Checks that the tool exists, that every required field is present and
    /// that present fields have the declared JSON kind. Returns the resolved
    /// kind so dispatch never re-parses the name.
    pub fn validate(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolKind, SchemaError> {
        let spec = self
            .get(tool_name)
            .ok_or_else(|| SchemaError::UnknownTool(tool_name.to_string()))?;

        let properties = spec
            .parameters
            .get("properties")
            .and_then(|v| v.as_object());
        let required = spec
            .parameters
            .get("required")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        for field in required {
            if !arguments.contains_key(field) {
                return Err(SchemaError::MissingArgument {
                    tool: tool_name.to_string(),
                    field: field.to_string(),
                });
            }
        }

        if let Some(props) = properties {
            for (field, value) in arguments {
                let Some(declared) = props.get(field).and_then(|p| p.get("type")) else {
                    continue;
                };
                let ok = match declared.as_str() {
                    Some("string") => value.is_string(),
                    Some("number") => value.is_number(),
                    Some("boolean") => value.is_boolean(),
                    _ => true,
                };
                if !ok {
                    return Err(SchemaError::WrongKind {
                        tool: tool_name.to_string(),
                        field: field.clone(),
                        expected: declared.as_str().unwrap_or("value").to_string(),
                    });
                }
            }
        }

        Ok(spec.kind)
    }
}

static STANDARD_REGISTRY: Lazy<ToolRegistry> = Lazy::new(ToolRegistry::standard);

/// Process-wide default registry, built once.
pub fn default_registry() -> &'static ToolRegistry {
    &STANDARD_REGISTRY
}
