use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::profile::AgentProfile;
use crate::domain::{BusinessStage, Message, MessageSender};
use crate::tools::{ToolKind, ToolOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(ChatRole::Assistant, content)
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Stored conversation entries as the model sees them.
    pub fn from_history(message: &Message) -> Self {
        match message.sender {
            MessageSender::User => Self::user(message.transcript_line()),
            MessageSender::System => Self::assistant(message.content.clone()),
        }
    }
}

/// Function definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One model turn: either final text or a batch of tool calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model response malformed: {0}")]
    Malformed(String),
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Completion, ModelError>;

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String, ModelError>;
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, call: &ToolCall) -> ToolOutcome;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub reply: String,
    pub invocations: Vec<ToolInvocation>,
    /// Stages declared by the profile and by successful tools, in declaration order.
    pub transitions: Vec<BusinessStage>,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model returned an empty reply")]
    EmptyReply,
    #[error("agent exceeded {0} tool rounds without replying")]
    ToolRoundsExhausted(usize),
}

/// A turn that ended without a reply. Tool side effects already happened, so the stages
/// those tools declared travel with the error.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct AgentFailure {
    #[source]
    pub error: AgentError,
    pub invocations: Vec<ToolInvocation>,
    /// Stages declared by tools that succeeded before the failure. The profile's own next
    /// stage is not included.
    pub transitions: Vec<BusinessStage>,
}

/// Drives a profile against the model until it produces a reply.
#[derive(Clone)]
pub struct AgentRunner {
    model: Arc<dyn LanguageModel>,
    max_tool_rounds: usize,
}

impl AgentRunner {
    pub fn new(model: Arc<dyn LanguageModel>, max_tool_rounds: usize) -> Self {
        Self {
            model,
            max_tool_rounds: max_tool_rounds.max(1),
        }
    }

    pub async fn run(
        &self,
        profile: &AgentProfile,
        history: &[Message],
        tools: &dyn ToolHandler,
        today: NaiveDate,
    ) -> Result<AgentOutcome, AgentFailure> {
        let mut invocations = Vec::new();
        let mut tool_transitions = Vec::new();
        match self
            .drive(profile, history, tools, today, &mut invocations, &mut tool_transitions)
            .await
        {
            Ok(reply) => {
                let mut transitions: Vec<BusinessStage> = profile.advances_to.into_iter().collect();
                transitions.extend(tool_transitions);
                Ok(AgentOutcome {
                    reply,
                    invocations,
                    transitions,
                })
            }
            Err(error) => Err(AgentFailure {
                error,
                invocations,
                transitions: tool_transitions,
            }),
        }
    }

    async fn drive(
        &self,
        profile: &AgentProfile,
        history: &[Message],
        tools: &dyn ToolHandler,
        today: NaiveDate,
        invocations: &mut Vec<ToolInvocation>,
        transitions: &mut Vec<BusinessStage>,
    ) -> Result<String, AgentError> {
        let allowed = profile.tools();
        let specs: Vec<ToolSpec> = allowed.iter().map(ToolKind::spec).collect();

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(profile.system_prompt(today)));
        messages.extend(history.iter().map(ChatMessage::from_history));

        for round in 0..self.max_tool_rounds {
            let completion = self.model.complete(&messages, &specs).await?;

            if completion.tool_calls.is_empty() {
                let reply = completion.content.unwrap_or_default().trim().to_string();
                if reply.is_empty() {
                    return Err(AgentError::EmptyReply);
                }
                info!(profile = profile.key, rounds = round + 1, tools = invocations.len(), "agent replied");
                return Ok(reply);
            }

            messages.push(ChatMessage {
                role: ChatRole::Assistant,
                content: completion.content.unwrap_or_default(),
                tool_calls: completion.tool_calls.clone(),
                tool_call_id: None,
            });

            for call in completion.tool_calls {
                let permitted = ToolKind::from_name(&call.name).filter(|kind| allowed.contains(kind));
                let outcome = match permitted {
                    Some(_) => tools.invoke(&call).await,
                    None => {
                        warn!(profile = profile.key, tool = %call.name, "tool not bound to profile");
                        ToolOutcome::failed(format!(
                            "La herramienta {} no está disponible en esta etapa",
                            call.name
                        ))
                    }
                };
                debug!(tool = %call.name, success = outcome.success, "tool round result");
                if outcome.success {
                    transitions.extend(outcome.transition);
                }
                messages.push(ChatMessage::tool_result(call.id.clone(), outcome.to_content()));
                invocations.push(ToolInvocation {
                    name: call.name,
                    arguments: call.arguments,
                    outcome,
                });
            }
        }

        Err(AgentError::ToolRoundsExhausted(self.max_tool_rounds))
    }
}
