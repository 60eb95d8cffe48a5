use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::WhatsAppConfig;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("whatsapp request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("whatsapp api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("media {0} is not available")]
    MediaUnavailable(String),
    #[error("outbound channel unavailable: {0}")]
    Unavailable(String),
}

/// Pre-approved WhatsApp template with positional body placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateMessage {
    pub name: String,
    pub language: String,
    pub body_placeholders: Vec<String>,
    pub header_image: Option<String>,
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<(), MessagingError>;
    async fn send_template(&self, to: &str, template: &TemplateMessage)
        -> Result<(), MessagingError>;
    async fn download_media(&self, url: &str) -> Result<Vec<u8>, MessagingError>;
}

/// Infobip WhatsApp HTTP client.
pub struct InfobipClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    sender: String,
}

impl InfobipClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, MessagingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        })
    }

    fn authorization(&self) -> String {
        format!("App {}", self.api_key)
    }

    async fn post_message(&self, body: Value) -> Result<(), MessagingError> {
        let url = format!("{}/whatsapp/1/message", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.authorization())
            .header(ACCEPT, mime::APPLICATION_JSON.as_ref())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, "whatsapp message accepted");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        error!(%status, %body, "whatsapp message rejected");
        Err(MessagingError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

pub fn text_payload(from: &str, to: &str, text: &str) -> Value {
    json!({
        "messages": [{
            "from": from,
            "to": to,
            "content": { "text": text }
        }]
    })
}

pub fn template_payload(from: &str, to: &str, template: &TemplateMessage) -> Value {
    let mut data = json!({
        "body": { "placeholders": template.body_placeholders }
    });
    if let Some(image) = &template.header_image {
        data["header"] = json!({ "type": "IMAGE", "mediaUrl": image });
    }
    json!({
        "messages": [{
            "from": from,
            "to": to,
            "content": {
                "templateName": template.name,
                "language": template.language,
                "templateData": data
            }
        }]
    })
}

#[async_trait]
impl MessagingGateway for InfobipClient {
    async fn send_text(&self, to: &str, text: &str) -> Result<(), MessagingError> {
        self.post_message(text_payload(&self.sender, to, text)).await
    }

    async fn send_template(
        &self,
        to: &str,
        template: &TemplateMessage,
    ) -> Result<(), MessagingError> {
        debug!(template = %template.name, "sending whatsapp template");
        self.post_message(template_payload(&self.sender, to, template))
            .await
    }

    async fn download_media(&self, url: &str) -> Result<Vec<u8>, MessagingError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.authorization())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MessagingError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text { to: String, text: String },
    Template { to: String, template: TemplateMessage },
}

impl OutboundMessage {
    pub fn recipient(&self) -> &str {
        match self {
            OutboundMessage::Text { to, .. } | OutboundMessage::Template { to, .. } => to,
        }
    }
}

#[derive(Default)]
struct Outbox {
    sent: Vec<OutboundMessage>,
    media: Vec<(String, Vec<u8>)>,
}

/// Records outbound traffic instead of calling Infobip. Used for replays and tests.
#[derive(Default)]
pub struct OutboxGateway {
    outbox: Mutex<Outbox>,
    reject_sends: bool,
}

impl OutboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose sends always fail.
    pub fn rejecting() -> Self {
        Self {
            outbox: Mutex::default(),
            reject_sends: true,
        }
    }

    pub fn with_media(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.media.push((url.into(), bytes));
        }
        self
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.lock()
            .map(|outbox| outbox.sent.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Outbox>, MessagingError> {
        self.outbox
            .lock()
            .map_err(|_| MessagingError::Unavailable("outbox mutex poisoned".to_string()))
    }

    fn record(&self, message: OutboundMessage) -> Result<(), MessagingError> {
        if self.reject_sends {
            return Err(MessagingError::Unavailable(format!(
                "sends to {} are rejected",
                message.recipient()
            )));
        }
        self.lock()?.sent.push(message);
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for OutboxGateway {
    async fn send_text(&self, to: &str, text: &str) -> Result<(), MessagingError> {
        self.record(OutboundMessage::Text {
            to: to.to_string(),
            text: text.to_string(),
        })
    }

    async fn send_template(
        &self,
        to: &str,
        template: &TemplateMessage,
    ) -> Result<(), MessagingError> {
        self.record(OutboundMessage::Template {
            to: to.to_string(),
            template: template.clone(),
        })
    }

    async fn download_media(&self, url: &str) -> Result<Vec<u8>, MessagingError> {
        self.lock()?
            .media
            .iter()
            .find(|(known, _)| known == url)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| MessagingError::MediaUnavailable(url.to_string()))
    }
}
