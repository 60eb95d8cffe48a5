use tracing::{debug, info, warn};

use crate::agents::LanguageModel;
use crate::channels::whatsapp::{inquiry_address, InboundContent, InboundMessage, MessagingGateway};
use crate::domain::{Chat, MessageKind, PropertyId, User, UserRole};
use crate::store::{RepositoryError, Store};

/// Inbound content reduced to what is stored and shown to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    pub kind: MessageKind,
    pub content: String,
    pub media_url: Option<String>,
}

impl NormalizedContent {
    /// Text body when the message is plain text.
    pub fn text(&self) -> Option<&str> {
        (self.kind == MessageKind::Text).then_some(self.content.as_str())
    }
}

/// Reduces inbound content to a storable message. Audio is downloaded and transcribed; when
/// either step fails the media URL stands in for the transcript. Unsupported kinds yield `None`.
pub async fn normalize(
    content: &InboundContent,
    gateway: &dyn MessagingGateway,
    model: &dyn LanguageModel,
) -> Option<NormalizedContent> {
    match content {
        InboundContent::Text { text } => Some(NormalizedContent {
            kind: MessageKind::Text,
            content: text.trim().to_string(),
            media_url: None,
        }),
        InboundContent::Image { url, caption, .. } => Some(NormalizedContent {
            kind: MessageKind::Image,
            content: caption.clone().unwrap_or_default(),
            media_url: Some(url.clone()),
        }),
        InboundContent::Audio { url, mime_type } => {
            let content = match transcribe(url, mime_type.as_deref(), gateway, model).await {
                Some(text) => text,
                None => url.clone(),
            };
            Some(NormalizedContent {
                kind: MessageKind::Audio,
                content,
                media_url: Some(url.clone()),
            })
        }
        InboundContent::Unsupported { .. } => None,
    }
}

async fn transcribe(
    url: &str,
    mime_type: Option<&str>,
    gateway: &dyn MessagingGateway,
    model: &dyn LanguageModel,
) -> Option<String> {
    let audio = match gateway.download_media(url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "audio download failed");
            return None;
        }
    };
    match model.transcribe(audio, &audio_file_name(mime_type)).await {
        Ok(text) if !text.is_empty() => {
            debug!(chars = text.len(), "audio transcribed");
            Some(text)
        }
        Ok(_) => None,
        Err(err) => {
            warn!(error = %err, "audio transcription failed");
            None
        }
    }
}

/// Upload name whose extension tells the transcription endpoint the container format.
pub(crate) fn audio_file_name(mime_type: Option<&str>) -> String {
    let extension = mime_type
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .filter(|parsed| parsed.type_() == mime::AUDIO)
        .map(|parsed| match parsed.subtype().as_str() {
            "mpeg" => "mp3".to_string(),
            "mp4" | "aac" => "m4a".to_string(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "ogg".to_string());
    format!("audio.{extension}")
}

/// Sender identity after classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user: User,
    /// Property the sender asked about through a listing inquiry.
    pub inquiry: Option<PropertyId>,
    pub is_new: bool,
}

/// Finds the sender by phone or registers them. Unknown senders quoting the inquiry text of a
/// listed property become buyers of that property; everyone else starts as a seller.
pub fn classify(
    store: &dyn Store,
    inbound: &InboundMessage,
    text: Option<&str>,
) -> Result<Participant, RepositoryError> {
    let inquiry = match text.and_then(inquiry_address) {
        Some(address) => store.property_by_address(&address)?.map(|property| property.id),
        None => None,
    };

    if let Some(mut user) = store.user_by_phone(&inbound.from)? {
        if !user.has_name() {
            if let Some(name) = inbound.contact_name.as_deref().filter(|name| !name.trim().is_empty()) {
                user.name = name.trim().to_string();
                user.updated_at = Some(chrono::Utc::now());
                store.update_user(user.clone())?;
            }
        }
        let inquiry = inquiry.filter(|_| user.role == UserRole::Buyer);
        return Ok(Participant {
            user,
            inquiry,
            is_new: false,
        });
    }

    let role = if inquiry.is_some() {
        UserRole::Buyer
    } else {
        UserRole::Seller
    };
    let name = inbound.contact_name.as_deref().unwrap_or_default().trim();
    let user = store.insert_user(User::new(inbound.from.clone(), name, role))?;
    info!(user_id = %user.id.0, role = role.label(), "registered new user");
    Ok(Participant {
        user,
        inquiry,
        is_new: true,
    })
}

/// Chat of the participant's phone, created on first contact. A buyer inquiry relinks the chat.
pub fn open_chat(store: &dyn Store, participant: &Participant) -> Result<Chat, RepositoryError> {
    let user = &participant.user;
    match store.chat_by_phone(&user.phone)? {
        Some(mut chat) => {
            if let Some(property_id) = &participant.inquiry {
                if chat.property_id.as_ref() != Some(property_id) {
                    chat.link_property(property_id.clone());
                    store.update_chat(chat.clone())?;
                    info!(chat_id = %chat.id.0, property_id = %property_id.0, "buyer chat relinked");
                }
            }
            Ok(chat)
        }
        None => {
            let mut chat = Chat::new(user.id.clone(), user.phone.clone());
            if let Some(property_id) = &participant.inquiry {
                chat.link_property(property_id.clone());
            } else if user.role == UserRole::Seller {
                // A returning seller on a fresh chat keeps their latest property.
                chat.property_id = store
                    .properties()?
                    .into_iter()
                    .filter(|property| property.owner_id == user.id)
                    .max_by_key(|property| property.created_at)
                    .map(|property| property.id);
            }
            store.insert_chat(chat)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::whatsapp::{property_inquiry_message, OutboxGateway};
    use crate::domain::Property;
    use crate::store::{InMemoryStore, PropertyRepository, UserRepository};
    use crate::test_support::ScriptedModel;

    fn inbound(from: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: "wamid-1".to_string(),
            from: from.to_string(),
            to: None,
            received_at: None,
            integration_type: Some("WHATSAPP".to_string()),
            contact_name: Some("Bea".to_string()),
            content: InboundContent::Text {
                text: text.to_string(),
            },
        }
    }

    fn listed_property(store: &InMemoryStore) -> Property {
        let seller = store
            .insert_user(User::new("573000000001", "Ana", UserRole::Seller))
            .expect("seller inserts");
        store
            .insert_property(Property::new(seller.id, "Calle 10 # 5-20"))
            .expect("property inserts")
    }

    #[test]
    fn inquiry_for_listed_property_registers_buyer() {
        let store = InMemoryStore::new();
        let property = listed_property(&store);
        let text = property_inquiry_message("calle 10 #  5-20");
        let message = inbound("573009998877", &text);

        let participant = classify(&store, &message, Some(&text)).expect("classifies");
        assert_eq!(participant.user.role, UserRole::Buyer);
        assert_eq!(participant.user.name, "Bea");
        assert_eq!(participant.inquiry, Some(property.id.clone()));

        let chat = open_chat(&store, &participant).expect("chat opens");
        assert_eq!(chat.property_id, Some(property.id));
    }

    #[test]
    fn unknown_sender_without_inquiry_is_a_seller() {
        let store = InMemoryStore::new();
        listed_property(&store);
        let message = inbound("573009998877", "Hola, quiero vender mi apartamento");
        let participant = classify(&store, &message, Some("Hola, quiero vender mi apartamento"))
            .expect("classifies");
        assert_eq!(participant.user.role, UserRole::Seller);
        assert!(participant.inquiry.is_none());
    }

    #[test]
    fn inquiry_for_unknown_address_is_a_seller() {
        let store = InMemoryStore::new();
        let text = property_inquiry_message("Avenida Siempre Viva 742");
        let participant =
            classify(&store, &inbound("573009998877", &text), Some(&text)).expect("classifies");
        assert_eq!(participant.user.role, UserRole::Seller);
    }

    #[test]
    fn known_user_keeps_role() {
        let store = InMemoryStore::new();
        let property = listed_property(&store);
        let text = property_inquiry_message(&property.address);
        let participant =
            classify(&store, &inbound("573000000001", &text), Some(&text)).expect("classifies");
        assert!(!participant.is_new);
        assert_eq!(participant.user.role, UserRole::Seller);
        assert!(participant.inquiry.is_none());
    }

    #[tokio::test]
    async fn audio_falls_back_to_media_url() {
        let gateway = OutboxGateway::new();
        let model = ScriptedModel::new(Vec::new()).transcribing("hola");
        let content = InboundContent::Audio {
            url: "https://cdn/voice.ogg".to_string(),
            mime_type: Some("audio/ogg".to_string()),
        };
        let normalized = normalize(&content, &gateway, &model).await.expect("audio kept");
        assert_eq!(normalized.kind, MessageKind::Audio);
        assert_eq!(normalized.content, "https://cdn/voice.ogg");
    }

    #[tokio::test]
    async fn audio_is_transcribed_when_downloadable() {
        let gateway = OutboxGateway::new().with_media("https://cdn/voice.ogg", vec![1, 2, 3]);
        let model = ScriptedModel::new(Vec::new()).transcribing("quiero vender");
        let content = InboundContent::Audio {
            url: "https://cdn/voice.ogg".to_string(),
            mime_type: None,
        };
        let normalized = normalize(&content, &gateway, &model).await.expect("audio kept");
        assert_eq!(normalized.content, "quiero vender");
        assert_eq!(normalized.media_url.as_deref(), Some("https://cdn/voice.ogg"));
    }

    #[test]
    fn audio_file_names_follow_mime_type() {
        assert_eq!(audio_file_name(Some("audio/mpeg")), "audio.mp3");
        assert_eq!(audio_file_name(Some("audio/ogg; codecs=opus")), "audio.ogg");
        assert_eq!(audio_file_name(Some("image/png")), "audio.ogg");
        assert_eq!(audio_file_name(None), "audio.ogg");
    }
}
