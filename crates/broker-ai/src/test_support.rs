//! Hand-written fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::{ChatMessage, Completion, LanguageModel, ModelError, ToolCall, ToolHandler, ToolSpec};
use crate::domain::BusinessStage;
use crate::tools::ToolOutcome;

/// Replays canned completions in order and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    transcript: Option<String>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn transcribing(mut self, text: &str) -> Self {
        self.transcript = Some(text.to_string());
        self
    }

    pub fn call(name: &str, arguments: Value) -> Completion {
        Completion {
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{name}"),
                name: name.to_string(),
                arguments,
            }],
        }
    }

    pub fn reply(text: &str) -> Completion {
        Completion {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<Completion, ModelError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .ok_or_else(|| ModelError::Unavailable("script exhausted".to_string()))
    }

    async fn transcribe(&self, _audio: Vec<u8>, _file_name: &str) -> Result<String, ModelError> {
        self.transcript
            .clone()
            .ok_or_else(|| ModelError::Unavailable("no transcript scripted".to_string()))
    }
}

/// Tool handler that records calls and answers with a fixed outcome.
pub struct RecordingTools {
    outcome: ToolOutcome,
    calls: Mutex<Vec<ToolCall>>,
}

impl Default for RecordingTools {
    fn default() -> Self {
        Self {
            outcome: ToolOutcome::ok("ok"),
            calls: Mutex::default(),
        }
    }
}

impl RecordingTools {
    pub fn advancing(stage: BusinessStage) -> Self {
        Self {
            outcome: ToolOutcome::ok("ok").advancing(stage),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolHandler for RecordingTools {
    async fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        self.outcome.clone()
    }
}
