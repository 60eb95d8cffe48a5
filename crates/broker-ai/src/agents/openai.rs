use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::runtime::{ChatMessage, ChatRole, Completion, LanguageModel, ModelError, ToolCall, ToolSpec};
use crate::config::LlmConfig;

/// OpenAI-compatible chat completions and transcription client.
pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    transcription_model: String,
}

impl OpenAiModel {
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            transcription_model: config.transcription_model.clone(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

pub(crate) fn format_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let mut value = json!({
                "role": role_name(message.role),
                "content": message.content,
            });
            if !message.tool_calls.is_empty() {
                value["tool_calls"] = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            if let Some(id) = &message.tool_call_id {
                value["tool_call_id"] = json!(id);
            }
            value
        })
        .collect()
}

pub(crate) fn format_tools(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}

pub(crate) fn chat_request_body(model: &str, messages: &[ChatMessage], tools: &[ToolSpec]) -> Value {
    let mut body = json!({
        "model": model,
        "messages": format_messages(messages),
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(format_tools(tools));
        body["tool_choice"] = json!("auto");
    }
    body
}

/// Reads the first choice of a chat completion response.
pub(crate) fn parse_completion(body: &Value) -> Result<Completion, ModelError> {
    let message = body["choices"]
        .get(0)
        .map(|choice| &choice["message"])
        .ok_or_else(|| ModelError::Malformed("response has no choices".to_string()))?;

    let content = message["content"].as_str().map(str::to_string);
    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = &call["function"];
                    let name = function["name"].as_str()?.to_string();
                    let raw = function["arguments"].as_str().unwrap_or("{}");
                    let arguments = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
                    Some(ToolCall {
                        id: call["id"].as_str().unwrap_or_default().to_string(),
                        name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Completion { content, tool_calls })
}

async fn read_json(response: reqwest::Response) -> Result<Value, ModelError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%status, %body, "model request rejected");
        return Err(ModelError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<Value>().await?)
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Completion, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, messages = messages.len(), tools = tools.len(), "requesting completion");
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&chat_request_body(&self.model, messages, tools))
            .send()
            .await?;
        parse_completion(&read_json(response).await?)
    }

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, ModelError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", Part::bytes(audio).file_name(file_name.to_string()));
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .multipart(form)
            .send()
            .await?;
        let body = read_json(response).await?;
        body["text"]
            .as_str()
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ModelError::Malformed("transcription has no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_serializes_tool_calls_as_strings() {
        let messages = vec![
            ChatMessage::system("sistema"),
            ChatMessage {
                role: ChatRole::Assistant,
                content: String::new(),
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "save_buyer_info".to_string(),
                    arguments: json!({"name": "Bea"}),
                }],
                tool_call_id: None,
            },
            ChatMessage::tool_result("call_1", "{\"success\":true}"),
        ];
        let tools = vec![ToolSpec {
            name: "save_buyer_info".to_string(),
            description: "guarda".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let body = chat_request_body("gpt-4o", &messages, &tools);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["arguments"], "{\"name\":\"Bea\"}");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "save_buyer_info");
    }

    #[test]
    fn tools_are_omitted_when_none_bound() {
        let body = chat_request_body("gpt-4o", &[ChatMessage::user("hola")], &[]);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parses_text_and_tool_call_choices() {
        let text = parse_completion(&json!({
            "choices": [{"message": {"role": "assistant", "content": "Hola"}}]
        }))
        .expect("parses");
        assert_eq!(text.content.as_deref(), Some("Hola"));
        assert!(text.tool_calls.is_empty());

        let calls = parse_completion(&json!({
            "choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call_9", "type": "function", "function": {"name": "generate_qr", "arguments": "{}"}},
                {"id": "call_10", "type": "function", "function": {"name": "save_visit_info", "arguments": "not json"}}
            ]}}]
        }))
        .expect("parses");
        assert_eq!(calls.content, None);
        assert_eq!(calls.tool_calls[0].arguments, json!({}));
        assert_eq!(calls.tool_calls[1].arguments, json!("not json"));
    }

    #[test]
    fn missing_choices_is_malformed() {
        assert!(matches!(
            parse_completion(&json!({"error": "x"})),
            Err(ModelError::Malformed(_))
        ));
    }
}
