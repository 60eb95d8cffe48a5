use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::inbound::{classify, normalize, open_chat};
use super::stage::{StageError, StageResolver};
use crate::agents::{dispatch, AgentOutcome, AgentRunner, LanguageModel};
use crate::channels::whatsapp::{InboundContent, InboundMessage, MessagingGateway};
use crate::config::BrokerSettings;
use crate::domain::{
    BusinessStage, Chat, ChatId, Message, PropertyId, PropertyProgress, User, UserId, UserRole,
};
use crate::storage::ArtifactStore;
use crate::store::{RepositoryError, Store};
use crate::tools::{ToolContext, ToolExecutor};

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("{0} messages are not supported")]
    UnsupportedContent(String),
    #[error("no conversation for {0}")]
    ChatNotFound(String),
    #[error("property {0} not found")]
    PropertyNotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn content_kind(content: &InboundContent) -> String {
    match content {
        InboundContent::Text { .. } => "text".to_string(),
        InboundContent::Image { .. } => "image".to_string(),
        InboundContent::Audio { .. } => "audio".to_string(),
        InboundContent::Unsupported { kind } => kind.to_lowercase(),
    }
}

/// What happened to one inbound delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandledMessage {
    pub message_id: String,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub role: UserRole,
    pub stage_before: BusinessStage,
    pub stage_after: BusinessStage,
    pub reply: Option<String>,
    pub tools: Vec<String>,
    pub delivered: bool,
    pub duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    pub chat: Chat,
    pub user: Option<User>,
    pub messages: Vec<Message>,
    pub message_count: usize,
}

/// Runs the per-message pipeline: normalize, classify, store, resolve the stage, run the
/// stage's agent, persist transitions, reply.
pub struct BrokerService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn MessagingGateway>,
    artifacts: Arc<dyn ArtifactStore>,
    model: Arc<dyn LanguageModel>,
    runner: AgentRunner,
    settings: Arc<BrokerSettings>,
}

impl BrokerService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn MessagingGateway>,
        artifacts: Arc<dyn ArtifactStore>,
        model: Arc<dyn LanguageModel>,
        settings: BrokerSettings,
        max_tool_rounds: usize,
    ) -> Self {
        let runner = AgentRunner::new(model.clone(), max_tool_rounds);
        Self {
            store,
            gateway,
            artifacts,
            model,
            runner,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    fn resolver(&self) -> StageResolver {
        StageResolver::new(self.store.clone())
    }

    #[instrument(skip_all, fields(message_id = %inbound.id))]
    pub async fn handle_inbound(
        &self,
        inbound: &InboundMessage,
    ) -> Result<HandledMessage, ConversationError> {
        info!(summary = %inbound.summary(), "inbound message");
        let Some(normalized) =
            normalize(&inbound.content, self.gateway.as_ref(), self.model.as_ref()).await
        else {
            return Err(ConversationError::UnsupportedContent(content_kind(&inbound.content)));
        };

        let participant = classify(self.store.as_ref(), inbound, normalized.text())?;
        let chat = open_chat(self.store.as_ref(), &participant)?;
        let user = participant.user;
        let resolver = self.resolver();

        if self.settings.dedupe_deliveries
            && self.store.has_external_message(&chat.id, &inbound.id)?
        {
            let stage = resolver.resolve(&chat.id, user.role)?;
            info!(chat_id = %chat.id.0, "dropping re-delivered message");
            return Ok(HandledMessage {
                message_id: inbound.id.clone(),
                chat_id: chat.id,
                user_id: user.id,
                role: user.role,
                stage_before: stage,
                stage_after: stage,
                reply: None,
                tools: Vec::new(),
                delivered: false,
                duplicate: true,
            });
        }

        self.store.append_message(Message::from_user(
            chat.id.clone(),
            normalized.kind,
            normalized.content,
            normalized.media_url,
            Some(inbound.id.clone()),
        ))?;

        let stage_before = resolver.resolve(&chat.id, user.role)?;
        let profile = dispatch(stage_before);
        let history = self.store.messages(&chat.id)?;
        let executor = ToolExecutor::new(ToolContext {
            chat_id: chat.id.clone(),
            store: self.store.clone(),
            gateway: self.gateway.clone(),
            artifacts: self.artifacts.clone(),
            settings: self.settings.clone(),
        });

        let (reply, tools) = match self
            .runner
            .run(&profile, &history, &executor, Utc::now().date_naive())
            .await
        {
            Ok(AgentOutcome {
                reply,
                invocations,
                transitions,
            }) => {
                self.apply_transitions(&resolver, &chat.id, user.role, &transitions);
                let tools = invocations.into_iter().map(|call| call.name).collect();
                (reply, tools)
            }
            Err(failure) => {
                warn!(chat_id = %chat.id.0, profile = profile.key, error = %failure, "agent failed, sending fallback");
                self.apply_transitions(&resolver, &chat.id, user.role, &failure.transitions);
                let tools = failure.invocations.into_iter().map(|call| call.name).collect();
                (self.settings.fallback_reply.clone(), tools)
            }
        };

        self.store
            .append_message(Message::from_system(chat.id.clone(), reply.clone()))?;
        let delivered = match self.gateway.send_text(&user.phone, &reply).await {
            Ok(()) => true,
            Err(err) => {
                warn!(chat_id = %chat.id.0, error = %err, "reply delivery failed");
                false
            }
        };

        let stage_after = resolver.resolve(&chat.id, user.role)?;
        info!(
            chat_id = %chat.id.0,
            from = %stage_before,
            to = %stage_after,
            delivered,
            "message handled"
        );

        Ok(HandledMessage {
            message_id: inbound.id.clone(),
            chat_id: chat.id,
            user_id: user.id,
            role: user.role,
            stage_before,
            stage_after,
            reply: Some(reply),
            tools,
            delivered,
            duplicate: false,
        })
    }

    /// Applies declared stages in order; regressions and role mismatches are skipped.
    fn apply_transitions(
        &self,
        resolver: &StageResolver,
        chat_id: &ChatId,
        role: UserRole,
        transitions: &[BusinessStage],
    ) {
        for target in transitions {
            if target.role() != role {
                warn!(chat_id = %chat_id.0, target = %target, "ignoring transition for another role");
                continue;
            }
            match resolver.advance(chat_id, *target) {
                Ok(_) => {}
                Err(StageError::Regression { current, requested }) => {
                    warn!(chat_id = %chat_id.0, %current, %requested, "ignoring backwards transition");
                }
                Err(err) => {
                    warn!(chat_id = %chat_id.0, target = %target, error = %err, "transition not applied");
                }
            }
        }
    }

    pub fn conversation(&self, phone: &str) -> Result<ConversationView, ConversationError> {
        let chat = self
            .store
            .chat_by_phone(phone)?
            .ok_or_else(|| ConversationError::ChatNotFound(phone.to_string()))?;
        let user = self.store.user(&chat.user_id)?;
        let messages = self.store.messages(&chat.id)?;
        Ok(ConversationView {
            message_count: messages.len(),
            chat,
            user,
            messages,
        })
    }

    pub fn property_progress(&self, id: &PropertyId) -> Result<PropertyProgress, ConversationError> {
        self.store
            .property(id)?
            .map(|property| property.progress())
            .ok_or_else(|| ConversationError::PropertyNotFound(id.0.clone()))
    }
}
