//! Conversation context accumulated over one task.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One structured action requested by the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    /// Planner-assigned id, echoed back in the matching tool observation.
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl ActionCall {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Fetch a string argument by name.
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(|v| v.as_str())
    }

    /// Fetch a numeric argument by name.
    pub fn f64_arg(&self, name: &str) -> Option<f64> {
        self.arguments.get(name).and_then(|v| v.as_f64())
    }

    /// Wire representation in the chat-completions tool_call shape.
    fn to_wire(&self) -> Value {
        json!({
            "id": self.call_id,
            "type": "function",
            "function": {
                "name": self.tool_name,
                "arguments": Value::Object(self.arguments.clone()).to_string(),
            }
        })
    }
}

/// A message in the planner conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a plain text message.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn recording the calls the planner asked for.
    pub fn assistant_plan(calls: &[ActionCall]) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(calls.iter().map(ActionCall::to_wire).collect()),
            tool_call_id: None,
        }
    }

    /// Tool turn carrying the observation for one dispatched call.
    pub fn tool_observation(call_id: impl Into<String>, result_text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result_text.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Append-only sequence of turns for one task.
///
/// Owned exclusively by one loop controller; it only ever grows, up to the
/// step bound, and is dropped with the task.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Seed a conversation with the system instructions and user request.
    pub fn seeded(system_prompt: &str, user_request: &str) -> Self {
        Self {
            messages: vec![
                ChatMessage::text(Role::System, system_prompt),
                ChatMessage::text(Role::User, user_request),
            ],
        }
    }

    /// Record the planner's action plan for this step.
    pub fn push_plan(&mut self, calls: &[ActionCall]) {
        self.messages.push(ChatMessage::assistant_plan(calls));
    }

    /// Record one observation produced by a dispatched call.
    pub fn push_observation(&mut self, call_id: &str, result_text: &str) {
        self.messages
            .push(ChatMessage::tool_observation(call_id, result_text));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ActionCall {
        let mut args = Map::new();
        args.insert("url".to_string(), json!("https://example.com"));
        ActionCall::new("call_1", "browser_navigate", args)
    }

    #[test]
    fn test_seeded_conversation() {
        let conv = Conversation::seeded("be helpful", "book a flight");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[1].role, Role::User);
    }

    #[test]
    fn test_plan_then_observation_grows_monotonically() {
        let mut conv = Conversation::seeded("sys", "task");
        let before = conv.len();
        conv.push_plan(&[call()]);
        conv.push_observation("call_1", "Navigated to https://example.com");
        assert_eq!(conv.len(), before + 2);

        let tool_turn = conv.messages().last().unwrap();
        assert_eq!(tool_turn.role, Role::Tool);
        assert_eq!(tool_turn.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_assistant_plan_wire_shape() {
        let msg = ChatMessage::assistant_plan(&[call()]);
        let wire = &msg.tool_calls.unwrap()[0];
        assert_eq!(wire["id"], "call_1");
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "browser_navigate");
        // arguments travel as a JSON-encoded string
        let args: Value =
            serde_json::from_str(wire["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["url"], "https://example.com");
    }

    #[test]
    fn test_action_call_arg_accessors() {
        let c = call();
        assert_eq!(c.str_arg("url"), Some("https://example.com"));
        assert_eq!(c.str_arg("missing"), None);
        assert_eq!(c.f64_arg("url"), None);
    }
}
