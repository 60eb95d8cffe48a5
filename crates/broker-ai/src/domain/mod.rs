//! Records shared by the conversation service, the stage resolver, and the tools.

pub mod chat;
pub mod property;
pub mod stage;
pub mod user;
pub mod visit;

pub use chat::{Chat, ChatId, Message, MessageId, MessageKind, MessageSender};
pub use property::{LegalDocument, Property, PropertyDraft, PropertyId, PropertyProgress};
pub use stage::{BusinessStage, BuyerStage, SellerStage};
pub use user::{AvailabilitySlot, SlotError, User, UserId, UserRole};
pub use visit::{Visit, VisitId, VisitStatus, VisitTemplateData, VisitTransitionError};

/// Opaque document identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
