use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::warn;

use super::service::{BrokerService, ConversationError};
use crate::channels::whatsapp::parse_envelope;
use crate::domain::PropertyId;

/// Webhook intake plus read-only conversation and listing views.
pub fn conversation_router(service: Arc<BrokerService>) -> Router {
    Router::new()
        .route("/webhook/whatsapp", post(webhook_handler))
        .route("/api/v1/conversations/:phone", get(conversation_handler))
        .route(
            "/api/v1/properties/:property_id/progress",
            get(progress_handler),
        )
        .with_state(service)
}

pub(crate) async fn webhook_handler(
    State(service): State<Arc<BrokerService>>,
    axum::Json(payload): axum::Json<Value>,
) -> Response {
    let messages = match parse_envelope(&payload) {
        Ok(messages) => messages,
        Err(err) => {
            warn!(error = %err, "rejecting webhook payload");
            let payload = json!({
                "error": err.to_string(),
            });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    let mut results = Vec::with_capacity(messages.len());
    for message in &messages {
        let entry = match service.handle_inbound(message).await {
            Ok(handled) => {
                let status = if handled.duplicate { "duplicate" } else { "processed" };
                json!({
                    "message_id": handled.message_id,
                    "status": status,
                    "stage": handled.stage_after.to_string(),
                    "delivered": handled.delivered,
                })
            }
            Err(ConversationError::UnsupportedContent(kind)) => json!({
                "message_id": message.id,
                "status": "ignored",
                "reason": format!("unsupported {kind} message"),
            }),
            Err(err) => {
                warn!(message_id = %message.id, error = %err, "inbound message failed");
                json!({
                    "message_id": message.id,
                    "status": "failed",
                    "error": err.to_string(),
                })
            }
        };
        results.push(entry);
    }

    let payload = json!({
        "status": "ok",
        "processed": results.len(),
        "results": results,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn conversation_handler(
    State(service): State<Arc<BrokerService>>,
    Path(phone): Path<String>,
) -> Response {
    match service.conversation(&phone) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err @ ConversationError::ChatNotFound(_)) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn progress_handler(
    State(service): State<Arc<BrokerService>>,
    Path(property_id): Path<String>,
) -> Response {
    match service.property_progress(&PropertyId(property_id)) {
        Ok(progress) => (StatusCode::OK, axum::Json(progress)).into_response(),
        Err(err @ ConversationError::PropertyNotFound(_)) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
