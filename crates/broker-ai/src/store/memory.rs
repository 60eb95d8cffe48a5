use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{
    address_key, phone_key, ChatRepository, MessageRepository, PropertyRepository,
    RepositoryError, UserRepository, VisitRepository,
};
use crate::domain::{
    Chat, ChatId, Message, Property, PropertyId, User, UserId, Visit, VisitId,
};

#[derive(Default)]
struct Collections {
    users: HashMap<UserId, User>,
    properties: HashMap<PropertyId, Property>,
    chats: HashMap<ChatId, Chat>,
    messages: Vec<Message>,
    visits: HashMap<VisitId, Visit>,
}

/// Process-local document store. Each call locks once; multi-step flows are not atomic.
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<Collections>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, RepositoryError> {
        self.collections
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl UserRepository for InMemoryStore {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut guard = self.lock()?;
        let phone = phone_key(&user.phone);
        let taken = guard
            .users
            .values()
            .any(|existing| phone_key(&existing.phone) == phone);
        if guard.users.contains_key(&user.id) || taken {
            return Err(RepositoryError::Conflict);
        }
        guard.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn update_user(&self, user: User) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    fn user_by_phone(&self, phone: &str) -> Result<Option<User>, RepositoryError> {
        let key = phone_key(phone);
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| phone_key(&user.phone) == key)
            .cloned())
    }
}

impl PropertyRepository for InMemoryStore {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.properties.contains_key(&property.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.properties.insert(property.id.clone(), property.clone());
        Ok(property)
    }

    fn update_property(&self, property: Property) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.properties.get_mut(&property.id) {
            Some(slot) => {
                *slot = property;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.lock()?.properties.get(id).cloned())
    }

    fn property_by_address(&self, address: &str) -> Result<Option<Property>, RepositoryError> {
        let key = address_key(address);
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self
            .lock()?
            .properties
            .values()
            .filter(|property| address_key(&property.address) == key)
            .max_by_key(|property| property.created_at)
            .cloned())
    }

    fn properties(&self) -> Result<Vec<Property>, RepositoryError> {
        let mut properties: Vec<Property> = self.lock()?.properties.values().cloned().collect();
        properties.sort_by_key(|property| property.created_at);
        Ok(properties)
    }
}

impl ChatRepository for InMemoryStore {
    fn insert_chat(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.chats.contains_key(&chat.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.chats.insert(chat.id.clone(), chat.clone());
        Ok(chat)
    }

    fn update_chat(&self, chat: Chat) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.chats.get_mut(&chat.id) {
            Some(slot) => {
                *slot = chat;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn chat(&self, id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.lock()?.chats.get(id).cloned())
    }

    fn chat_by_phone(&self, phone: &str) -> Result<Option<Chat>, RepositoryError> {
        let key = phone_key(phone);
        Ok(self
            .lock()?
            .chats
            .values()
            .filter(|chat| chat.is_active && phone_key(&chat.user_phone) == key)
            .max_by_key(|chat| chat.created_at)
            .cloned())
    }
}

impl MessageRepository for InMemoryStore {
    fn append_message(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut guard = self.lock()?;
        if !guard.chats.contains_key(&message.chat_id) {
            return Err(RepositoryError::NotFound);
        }
        guard.messages.push(message.clone());
        Ok(message)
    }

    fn messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, RepositoryError> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .filter(|message| &message.chat_id == chat_id)
            .cloned()
            .collect())
    }

    fn has_external_message(
        &self,
        chat_id: &ChatId,
        external_id: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.messages.iter().any(|message| {
            &message.chat_id == chat_id && message.external_id.as_deref() == Some(external_id)
        }))
    }
}

impl VisitRepository for InMemoryStore {
    fn insert_visit(&self, visit: Visit) -> Result<Visit, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.visits.contains_key(&visit.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.visits.insert(visit.id.clone(), visit.clone());
        Ok(visit)
    }

    fn update_visit(&self, visit: Visit) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        match guard.visits.get_mut(&visit.id) {
            Some(slot) => {
                *slot = visit;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn visit(&self, id: &VisitId) -> Result<Option<Visit>, RepositoryError> {
        Ok(self.lock()?.visits.get(id).cloned())
    }

    fn visits_for_property(&self, property_id: &PropertyId) -> Result<Vec<Visit>, RepositoryError> {
        let mut visits: Vec<Visit> = self
            .lock()?
            .visits
            .values()
            .filter(|visit| &visit.property_id == property_id)
            .cloned()
            .collect();
        visits.sort_by_key(|visit| visit.scheduled_at);
        Ok(visits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageKind, UserRole};

    #[test]
    fn insert_user_rejects_duplicate_phone() {
        let store = InMemoryStore::new();
        store
            .insert_user(User::new("+57 300 123 4567", "Ana", UserRole::Seller))
            .expect("first insert succeeds");
        let err = store
            .insert_user(User::new("573001234567", "Otra", UserRole::Buyer))
            .expect_err("same digits conflict");
        assert!(matches!(err, RepositoryError::Conflict));
    }

    #[test]
    fn phone_lookup_ignores_formatting() {
        let store = InMemoryStore::new();
        let user = store
            .insert_user(User::new("573001234567", "Ana", UserRole::Seller))
            .expect("insert succeeds");
        let found = store
            .user_by_phone("+57 300-123-4567")
            .expect("lookup succeeds")
            .expect("user found");
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn address_lookup_normalizes_case_and_spacing() {
        let store = InMemoryStore::new();
        let property = store
            .insert_property(Property::new(UserId("o".to_string()), "Calle 123  #45-67"))
            .expect("insert succeeds");
        let found = store
            .property_by_address(" calle 123 #45-67 ")
            .expect("lookup succeeds")
            .expect("property found");
        assert_eq!(found.id, property.id);
        assert!(store.property_by_address("").expect("lookup succeeds").is_none());
    }

    #[test]
    fn messages_require_chat_and_keep_append_order() {
        let store = InMemoryStore::new();
        let orphan = Message::from_system(ChatId("missing".to_string()), "hola");
        assert!(matches!(
            store.append_message(orphan),
            Err(RepositoryError::NotFound)
        ));

        let chat = store
            .insert_chat(Chat::new(UserId("u".to_string()), "1"))
            .expect("chat inserts");
        for text in ["uno", "dos", "tres"] {
            store
                .append_message(Message::from_user(
                    chat.id.clone(),
                    MessageKind::Text,
                    text,
                    None,
                    Some(format!("wamid-{text}")),
                ))
                .expect("message appends");
        }
        let contents: Vec<String> = store
            .messages(&chat.id)
            .expect("messages load")
            .into_iter()
            .map(|message| message.content)
            .collect();
        assert_eq!(contents, vec!["uno", "dos", "tres"]);
        assert!(store
            .has_external_message(&chat.id, "wamid-dos")
            .expect("lookup succeeds"));
    }

    #[test]
    fn update_missing_records_report_not_found() {
        let store = InMemoryStore::new();
        let user = User::new("1", "Ana", UserRole::Buyer);
        assert!(matches!(
            store.update_user(user),
            Err(RepositoryError::NotFound)
        ));
    }
}
