pub mod openai;
pub mod prompts;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::skills::ToolSchema;

pub use openai::OpenAiCompatBackend;

// -- Backend trait ----------------------------------------------------------

/// A chat-completions backend capable of function calling.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "Groq API").
    fn name(&self) -> &str;

    /// Send one request and return the first choice's message.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<AssistantReply>;
}

// -- Messages ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the conversation history, in the wire shape the
/// chat-completions API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    /// The result of one tool call, correlated to the request by id.
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::new(Role::Tool, Some(content.into()))
        }
    }
}

/// A function invocation requested by the model.  `arguments` is the raw
/// JSON text exactly as the model produced it; it may not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ToolCall {
    #[cfg(test)]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

// -- Requests and replies ---------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
}

/// Everything a backend needs for one completion.  `tools` and
/// `tool_choice` are omitted from the wire body when `None`.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub max_tokens: u32,
    pub tools: Option<&'a [ToolSchema]>,
    pub tool_choice: Option<ToolChoice>,
}

impl<'a> ChatRequest<'a> {
    pub fn new(messages: &'a [Message], max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            tools: None,
            tool_choice: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a [ToolSchema], choice: ToolChoice) -> Self {
        self.tools = Some(tools);
        self.tool_choice = Some(choice);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    #[cfg(test)]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The assistant message to append to the history before tool results.
    pub fn into_message(self) -> Message {
        Message {
            tool_calls: self.tool_calls,
            ..Message::new(Role::Assistant, self.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_message_shape() {
        let msg = Message::tool("call_1", "get_weather", "sunny");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "tool",
                "content": "sunny",
                "tool_call_id": "call_1",
                "name": "get_weather",
            })
        );
    }

    #[test]
    fn plain_message_omits_tool_fields() {
        let v = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(v, json!({ "role": "user", "content": "hi" }));
    }

    #[test]
    fn assistant_tool_call_message_has_null_content() {
        let reply = AssistantReply {
            content: None,
            tool_calls: vec![ToolCall::new("c1", "open_app", r#"{"app_name":"Safari"}"#)],
        };
        let v = serde_json::to_value(reply.into_message()).unwrap();
        assert_eq!(v["role"], "assistant");
        assert!(v["content"].is_null());
        assert_eq!(v["tool_calls"][0]["type"], "function");
        assert_eq!(v["tool_calls"][0]["function"]["name"], "open_app");
    }

    #[test]
    fn tool_call_tolerates_null_arguments() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "c9",
            "function": { "name": "list_all_memories", "arguments": null }
        }))
        .unwrap();
        assert_eq!(call.arguments(), "");
        assert_eq!(call.kind, "function");
    }

    #[test]
    fn request_builder() {
        let msgs = [Message::user("x")];
        let tools = [ToolSchema::new("t", "d")];
        let req = ChatRequest::new(&msgs, 10);
        assert!(req.tools.is_none());
        let req = req.with_tools(&tools, ToolChoice::Auto);
        assert_eq!(req.tools.map(|t| t.len()), Some(1));
        assert_eq!(req.tool_choice, Some(ToolChoice::Auto));
    }
}
