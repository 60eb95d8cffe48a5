//! Per-message conversation pipeline and its HTTP surface.

pub mod inbound;
pub mod router;
pub mod service;
pub mod stage;

pub use router::conversation_router;
pub use service::{BrokerService, ConversationError, ConversationView, HandledMessage};
pub use stage::{StageChange, StageError, StageResolver};
