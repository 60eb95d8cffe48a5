use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

const RECEIVED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook payload is missing the results field")]
    MissingResults,
    #[error("webhook payload is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One inbound WhatsApp delivery after envelope validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    pub to: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub integration_type: Option<String>,
    pub contact_name: Option<String>,
    pub content: InboundContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundContent {
    Text {
        text: String,
    },
    Image {
        url: String,
        caption: Option<String>,
        mime_type: Option<String>,
    },
    Audio {
        url: String,
        mime_type: Option<String>,
    },
    Unsupported {
        kind: String,
    },
}

impl InboundMessage {
    pub fn summary(&self) -> String {
        let sender = self.contact_name.as_deref().unwrap_or("Unknown");
        match &self.content {
            InboundContent::Text { text } => {
                let preview: String = text.chars().take(50).collect();
                let ellipsis = if text.chars().count() > 50 { "..." } else { "" };
                format!("Text from {sender}: {preview}{ellipsis}")
            }
            InboundContent::Image { caption, .. } => match caption.as_deref() {
                Some(caption) if !caption.is_empty() => {
                    let preview: String = caption.chars().take(30).collect();
                    format!("Image from {sender} with caption: {preview}...")
                }
                _ => format!("Image from {sender}"),
            },
            InboundContent::Audio { .. } => format!("Audio message from {sender}"),
            InboundContent::Unsupported { kind } => format!("Unsupported {kind} message from {sender}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    results: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    message_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    received_at: Option<String>,
    integration_type: Option<String>,
    message: Option<RawMessage>,
    #[serde(default)]
    contact: Option<RawContact>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
    image: Option<RawMedia>,
    audio: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMedia {
    #[serde(default)]
    url: String,
    caption: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawContact {
    name: Option<String>,
}

/// Parses an Infobip inbound envelope. Entries that are malformed or lack an id, a sender,
/// or a message body are skipped rather than failing the whole delivery.
pub fn parse_envelope(payload: &serde_json::Value) -> Result<Vec<InboundMessage>, WebhookError> {
    let envelope = Envelope::deserialize(payload)?;
    let results = envelope.results.ok_or(WebhookError::MissingResults)?;

    Ok(results
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let raw = match RawResult::deserialize(entry) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(index, error = %err, "skipping malformed whatsapp webhook entry");
                    return None;
                }
            };
            let parsed = into_inbound(raw);
            if parsed.is_none() {
                warn!(index, "skipping incomplete whatsapp webhook entry");
            }
            parsed
        })
        .collect())
}

fn into_inbound(raw: RawResult) -> Option<InboundMessage> {
    let id = raw.message_id.filter(|value| !value.is_empty())?;
    let from = raw.from.filter(|value| !value.is_empty())?;
    let message = raw.message?;

    let kind = message
        .kind
        .unwrap_or_else(|| "unknown".to_string())
        .to_ascii_lowercase();
    let content = match kind.as_str() {
        "text" => InboundContent::Text {
            text: message.text.filter(|value| !value.trim().is_empty())?,
        },
        "image" => {
            let media = message.image.filter(|media| !media.url.is_empty())?;
            InboundContent::Image {
                url: media.url,
                caption: media.caption.filter(|value| !value.is_empty()),
                mime_type: media.mime_type,
            }
        }
        "audio" => {
            let media = message.audio.filter(|media| !media.url.is_empty())?;
            InboundContent::Audio {
                url: media.url,
                mime_type: media.mime_type,
            }
        }
        _ => InboundContent::Unsupported { kind },
    };

    Some(InboundMessage {
        id,
        from,
        to: raw.to,
        received_at: raw.received_at.as_deref().and_then(parse_received_at),
        integration_type: raw.integration_type,
        contact_name: raw
            .contact
            .and_then(|contact| contact.name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
        content,
    })
}

fn parse_received_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, RECEIVED_AT_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|value| value.with_timezone(&Utc))
        .ok()
}
