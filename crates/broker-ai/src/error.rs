use crate::agents::ModelError;
use crate::channels::whatsapp::{MessagingError, QrError, WebhookError};
use crate::config::ConfigError;
use crate::conversation::ConversationError;
use crate::storage::StorageError;
use crate::store::RepositoryError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Repository(RepositoryError),
    Messaging(MessagingError),
    Model(ModelError),
    Storage(StorageError),
    Qr(QrError),
    Webhook(WebhookError),
    Conversation(ConversationError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Repository(err) => write!(f, "repository error: {}", err),
            AppError::Messaging(err) => write!(f, "messaging error: {}", err),
            AppError::Model(err) => write!(f, "model error: {}", err),
            AppError::Storage(err) => write!(f, "storage error: {}", err),
            AppError::Qr(err) => write!(f, "qr error: {}", err),
            AppError::Webhook(err) => write!(f, "webhook error: {}", err),
            AppError::Conversation(err) => write!(f, "conversation error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Repository(err) => Some(err),
            AppError::Messaging(err) => Some(err),
            AppError::Model(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Qr(err) => Some(err),
            AppError::Webhook(err) => Some(err),
            AppError::Conversation(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Webhook(_) | AppError::Conversation(ConversationError::UnsupportedContent(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conversation(ConversationError::ChatNotFound(_))
            | AppError::Conversation(ConversationError::PropertyNotFound(_))
            | AppError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Messaging(_) | AppError::Model(_) | AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Repository(_)
            | AppError::Qr(_)
            | AppError::Conversation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl From<MessagingError> for AppError {
    fn from(value: MessagingError) -> Self {
        Self::Messaging(value)
    }
}

impl From<ModelError> for AppError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<QrError> for AppError {
    fn from(value: QrError) -> Self {
        Self::Qr(value)
    }
}

impl From<WebhookError> for AppError {
    fn from(value: WebhookError) -> Self {
        Self::Webhook(value)
    }
}

impl From<ConversationError> for AppError {
    fn from(value: ConversationError) -> Self {
        Self::Conversation(value)
    }
}
