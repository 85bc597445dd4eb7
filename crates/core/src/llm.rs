//! Language-model boundary: the `ChatModel` trait the coordinator drives,
//! plus an Anthropic messages-API client speaking plain REST.

use crate::QueryError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 800;

/// Declarative schema handed to the model so it can decide which tool to
/// invoke and with what arguments.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
}

/// One entry in the working context of a query cycle, model-agnostic.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    UserMessage(String),
    AssistantToolCalls(Vec<ToolCall>),
    ToolOutputs(Vec<ToolOutput>),
}

/// What the model produced for one round: a direct answer, or tool-call
/// requests that need executing before the next round.
#[derive(Debug, Clone)]
pub enum ModelTurn {
    Answer(String),
    ToolCalls(Vec<ToolCall>),
}

pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub events: &'a [ChatEvent],
    pub tools: Option<&'a [ToolDefinition]>,
}

#[async_trait]
pub trait ChatModel {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelTurn, QueryError>;
}

pub struct AnthropicClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_endpoint(ANTHROPIC_API_URL, api_key, model)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: Client::new(),
        }
    }
}

fn build_messages(events: &[ChatEvent]) -> Vec<Value> {
    events
        .iter()
        .map(|event| match event {
            ChatEvent::UserMessage(text) => json!({ "role": "user", "content": text }),
            ChatEvent::AssistantToolCalls(calls) => {
                let blocks: Vec<Value> = calls
                    .iter()
                    .map(|call| {
                        json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        })
                    })
                    .collect();
                json!({ "role": "assistant", "content": blocks })
            }
            ChatEvent::ToolOutputs(outputs) => {
                let blocks: Vec<Value> = outputs
                    .iter()
                    .map(|output| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": output.call_id,
                            "content": output.content,
                        })
                    })
                    .collect();
                json!({ "role": "user", "content": blocks })
            }
        })
        .collect()
}

fn parse_response(parsed: &Value) -> Result<ModelTurn, QueryError> {
    let blocks = parsed
        .pointer("/content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut calls = Vec::new();
    let mut text = String::new();

    for block in &blocks {
        match block.pointer("/type").and_then(Value::as_str) {
            Some("tool_use") => calls.push(ToolCall {
                id: block
                    .pointer("/id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                name: block
                    .pointer("/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                arguments: block.pointer("/input").cloned().unwrap_or(json!({})),
            }),
            Some("text") => {
                if let Some(piece) = block.pointer("/text").and_then(Value::as_str) {
                    text.push_str(piece);
                }
            }
            _ => {}
        }
    }

    let stop_reason = parsed.pointer("/stop_reason").and_then(Value::as_str);
    if stop_reason == Some("tool_use") && !calls.is_empty() {
        return Ok(ModelTurn::ToolCalls(calls));
    }
    if text.is_empty() {
        return Err(QueryError::Model("response carried no text".to_string()));
    }
    Ok(ModelTurn::Answer(text))
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<ModelTurn, QueryError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": 0,
            "system": request.system,
            "messages": build_messages(request.events),
        });

        if let Some(tools) = request.tools {
            body["tools"] = serde_json::to_value(tools)
                .map_err(|error| QueryError::Model(error.to_string()))?;
            body["tool_choice"] = json!({ "type": "auto" });
        }

        let response = self
            .client
            .post(format!("{}/v1/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::Model(format!(
                "api returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        parse_response(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_map_to_message_roles() {
        let events = vec![
            ChatEvent::UserMessage("what is MCP?".to_string()),
            ChatEvent::AssistantToolCalls(vec![ToolCall {
                id: "call_1".to_string(),
                name: "search_course_content".to_string(),
                arguments: json!({ "query": "MCP" }),
            }]),
            ChatEvent::ToolOutputs(vec![ToolOutput {
                call_id: "call_1".to_string(),
                content: "[MCP Course - Lesson 0]\ntext".to_string(),
            }]),
        ];

        let messages = build_messages(&events);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "call_1");
    }

    #[test]
    fn tool_use_stop_reason_yields_tool_calls() {
        let response = json!({
            "stop_reason": "tool_use",
            "content": [
                { "type": "text", "text": "let me look that up" },
                {
                    "type": "tool_use",
                    "id": "call_9",
                    "name": "get_course_outline",
                    "input": { "course_name": "MCP" }
                }
            ]
        });

        match parse_response(&response).unwrap() {
            ModelTurn::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "get_course_outline");
                assert_eq!(calls[0].arguments["course_name"], "MCP");
            }
            ModelTurn::Answer(_) => panic!("expected tool calls"),
        }
    }

    #[test]
    fn end_turn_yields_answer_text() {
        let response = json!({
            "stop_reason": "end_turn",
            "content": [{ "type": "text", "text": "MCP is a protocol." }]
        });

        match parse_response(&response).unwrap() {
            ModelTurn::Answer(text) => assert_eq!(text, "MCP is a protocol."),
            ModelTurn::ToolCalls(_) => panic!("expected an answer"),
        }
    }

    #[test]
    fn empty_response_is_a_model_error() {
        let response = json!({ "stop_reason": "end_turn", "content": [] });
        assert!(parse_response(&response).is_err());
    }
}
