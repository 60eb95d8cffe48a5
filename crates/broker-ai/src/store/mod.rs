//! Document collections behind narrow repository traits so the conversation service and
//! tools can be exercised without a database.

pub mod memory;

use crate::domain::{
    Chat, ChatId, Message, Property, PropertyId, User, UserId, Visit, VisitId,
};

pub use memory::InMemoryStore;

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub trait UserRepository: Send + Sync {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn update_user(&self, user: User) -> Result<(), RepositoryError>;
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    fn user_by_phone(&self, phone: &str) -> Result<Option<User>, RepositoryError>;
}

pub trait PropertyRepository: Send + Sync {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError>;
    fn update_property(&self, property: Property) -> Result<(), RepositoryError>;
    fn property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
    /// Case- and whitespace-insensitive address match.
    fn property_by_address(&self, address: &str) -> Result<Option<Property>, RepositoryError>;
    fn properties(&self) -> Result<Vec<Property>, RepositoryError>;
}

pub trait ChatRepository: Send + Sync {
    fn insert_chat(&self, chat: Chat) -> Result<Chat, RepositoryError>;
    fn update_chat(&self, chat: Chat) -> Result<(), RepositoryError>;
    fn chat(&self, id: &ChatId) -> Result<Option<Chat>, RepositoryError>;
    fn chat_by_phone(&self, phone: &str) -> Result<Option<Chat>, RepositoryError>;
}

pub trait MessageRepository: Send + Sync {
    fn append_message(&self, message: Message) -> Result<Message, RepositoryError>;
    /// Messages of a chat in the order they were appended.
    fn messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, RepositoryError>;
    fn has_external_message(
        &self,
        chat_id: &ChatId,
        external_id: &str,
    ) -> Result<bool, RepositoryError>;
}

pub trait VisitRepository: Send + Sync {
    fn insert_visit(&self, visit: Visit) -> Result<Visit, RepositoryError>;
    fn update_visit(&self, visit: Visit) -> Result<(), RepositoryError>;
    fn visit(&self, id: &VisitId) -> Result<Option<Visit>, RepositoryError>;
    /// Visits of a property ordered by scheduled time.
    fn visits_for_property(&self, property_id: &PropertyId) -> Result<Vec<Visit>, RepositoryError>;
}

/// Every collection the broker reads and writes.
pub trait Store:
    UserRepository + PropertyRepository + ChatRepository + MessageRepository + VisitRepository
{
}

impl<T> Store for T where
    T: UserRepository + PropertyRepository + ChatRepository + MessageRepository + VisitRepository
{
}

/// Normalized key used for address lookups.
pub(crate) fn address_key(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized key used for phone lookups; WhatsApp senders arrive with or without `+`.
pub(crate) fn phone_key(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}
