use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{BusinessStage, BuyerStage, ChatId, SellerStage, UserRole};
use crate::store::{RepositoryError, Store};

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("stage cannot move back from {current} to {requested}")]
    Regression {
        current: BusinessStage,
        requested: BusinessStage,
    },
    #[error("chat {0} has no linked property to carry the seller stage")]
    NoProperty(String),
    #[error("chat {0} not found")]
    UnknownChat(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of asking the resolver to move a chat forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageChange {
    pub from: BusinessStage,
    pub to: BusinessStage,
}

impl StageChange {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Reads and advances the funnel stage of a chat. Seller stages live on the linked property,
/// buyer stages on the chat itself.
#[derive(Clone)]
pub struct StageResolver {
    store: Arc<dyn Store>,
}

impl StageResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn seller_stage(&self, chat_id: &ChatId) -> Result<SellerStage, RepositoryError> {
        debug!(chat_id = %chat_id.0, "resolving seller stage");
        let Some(chat) = self.store.chat(chat_id)? else {
            return Ok(SellerStage::Registration);
        };
        let Some(property_id) = chat.property_id else {
            return Ok(SellerStage::Registration);
        };
        Ok(self
            .store
            .property(&property_id)?
            .map_or(SellerStage::Registration, |property| property.stage))
    }

    pub fn buyer_stage(&self, chat_id: &ChatId) -> Result<BuyerStage, RepositoryError> {
        debug!(chat_id = %chat_id.0, "resolving buyer stage");
        Ok(self
            .store
            .chat(chat_id)?
            .and_then(|chat| chat.stage)
            .unwrap_or(BuyerStage::Contact))
    }

    pub fn resolve(&self, chat_id: &ChatId, role: UserRole) -> Result<BusinessStage, RepositoryError> {
        match role {
            UserRole::Seller => self.seller_stage(chat_id).map(BusinessStage::Seller),
            UserRole::Buyer => self.buyer_stage(chat_id).map(BusinessStage::Buyer),
        }
    }

    /// Persists a forward move. Re-asserting the current stage is a no-op; going back fails.
    pub fn advance(&self, chat_id: &ChatId, target: BusinessStage) -> Result<StageChange, StageError> {
        let mut chat = self
            .store
            .chat(chat_id)?
            .ok_or_else(|| StageError::UnknownChat(chat_id.0.clone()))?;

        match target {
            BusinessStage::Seller(requested) => {
                let property_id = chat
                    .property_id
                    .clone()
                    .ok_or_else(|| StageError::NoProperty(chat_id.0.clone()))?;
                let mut property = self
                    .store
                    .property(&property_id)?
                    .ok_or_else(|| StageError::NoProperty(chat_id.0.clone()))?;
                let current = property.stage;
                let change = check_forward(BusinessStage::Seller(current), target, current <= requested)?;
                if change.changed() {
                    property.stage = requested;
                    property.updated_at = Some(chrono::Utc::now());
                    self.store.update_property(property)?;
                    info!(chat_id = %chat_id.0, from = current.label(), to = requested.label(), "seller stage advanced");
                }
                Ok(change)
            }
            BusinessStage::Buyer(requested) => {
                let current = chat.stage.unwrap_or(BuyerStage::Contact);
                let change = check_forward(BusinessStage::Buyer(current), target, current <= requested)?;
                // First transition also materializes the implicit initial stage.
                if change.changed() || chat.stage.is_none() {
                    chat.stage = Some(requested);
                    chat.updated_at = Some(chrono::Utc::now());
                    self.store.update_chat(chat)?;
                    info!(chat_id = %chat_id.0, from = current.label(), to = requested.label(), "buyer stage advanced");
                }
                Ok(change)
            }
        }
    }
}

fn check_forward(
    current: BusinessStage,
    requested: BusinessStage,
    forward: bool,
) -> Result<StageChange, StageError> {
    if !forward {
        return Err(StageError::Regression { current, requested });
    }
    Ok(StageChange {
        from: current,
        to: requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Chat, Property, User};
    use crate::store::{ChatRepository, InMemoryStore, PropertyRepository, UserRepository};

    fn seller_chat(store: &InMemoryStore, with_property: bool) -> ChatId {
        let user = store
            .insert_user(User::new("573001112233", "Ana", UserRole::Seller))
            .expect("user inserts");
        let mut chat = Chat::new(user.id.clone(), user.phone.clone());
        if with_property {
            let property = store
                .insert_property(Property::new(user.id, "Calle 1"))
                .expect("property inserts");
            chat.link_property(property.id);
        }
        store.insert_chat(chat).expect("chat inserts").id
    }

    #[test]
    fn seller_defaults_to_registration_without_property() {
        let store = Arc::new(InMemoryStore::new());
        let chat_id = seller_chat(&store, false);
        let resolver = StageResolver::new(store);
        assert_eq!(
            resolver.seller_stage(&chat_id).expect("resolves"),
            SellerStage::Registration
        );
        assert_eq!(
            resolver
                .seller_stage(&ChatId("unknown".to_string()))
                .expect("resolves"),
            SellerStage::Registration
        );
    }

    #[test]
    fn seller_stage_reads_linked_property() {
        let store = Arc::new(InMemoryStore::new());
        let chat_id = seller_chat(&store, true);
        let resolver = StageResolver::new(store.clone());
        resolver
            .advance(&chat_id, BusinessStage::Seller(SellerStage::Visits))
            .expect("forward skip allowed");
        assert_eq!(
            resolver
                .resolve(&chat_id, UserRole::Seller)
                .expect("resolves"),
            BusinessStage::Seller(SellerStage::Visits)
        );
    }

    #[test]
    fn advance_rejects_regression() {
        let store = Arc::new(InMemoryStore::new());
        let chat_id = seller_chat(&store, true);
        let resolver = StageResolver::new(store);
        resolver
            .advance(&chat_id, BusinessStage::Seller(SellerStage::Publishing))
            .expect("advances");
        let err = resolver
            .advance(&chat_id, BusinessStage::Seller(SellerStage::Registration))
            .expect_err("regression rejected");
        assert!(matches!(err, StageError::Regression { .. }));
    }

    #[test]
    fn advance_to_current_stage_is_noop() {
        let store = Arc::new(InMemoryStore::new());
        let chat_id = seller_chat(&store, true);
        let resolver = StageResolver::new(store);
        let change = resolver
            .advance(&chat_id, BusinessStage::Seller(SellerStage::Registration))
            .expect("noop succeeds");
        assert!(!change.changed());
    }

    #[test]
    fn seller_advance_needs_property() {
        let store = Arc::new(InMemoryStore::new());
        let chat_id = seller_chat(&store, false);
        let resolver = StageResolver::new(store);
        assert!(matches!(
            resolver.advance(&chat_id, BusinessStage::Seller(SellerStage::Publishing)),
            Err(StageError::NoProperty(_))
        ));
    }

    #[test]
    fn buyer_stage_defaults_to_contact_and_persists_on_chat() {
        let store = Arc::new(InMemoryStore::new());
        let user = store
            .insert_user(User::new("1", "Bea", UserRole::Buyer))
            .expect("user inserts");
        let chat = store
            .insert_chat(Chat::new(user.id, "1"))
            .expect("chat inserts");
        let resolver = StageResolver::new(store.clone());
        assert_eq!(
            resolver.buyer_stage(&chat.id).expect("resolves"),
            BuyerStage::Contact
        );
        resolver
            .advance(&chat.id, BusinessStage::Buyer(BuyerStage::Scheduling))
            .expect("advances");
        let stored = store.chat(&chat.id).expect("loads").expect("present");
        assert_eq!(stored.stage, Some(BuyerStage::Scheduling));
    }
}
