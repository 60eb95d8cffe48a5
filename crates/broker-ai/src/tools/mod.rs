//! Side-effecting functions the agents may call. Each reads or writes one document and
//! reports back through a [`ToolOutcome`]; failures never escape as errors.

mod buyer;
mod contracts;
mod seller;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::agents::{ToolCall, ToolHandler, ToolSpec};
use crate::channels::whatsapp::{MessagingError, MessagingGateway, QrError};
use crate::config::BrokerSettings;
use crate::conversation::stage::{StageError, StageResolver};
use crate::domain::{
    BusinessStage, Chat, ChatId, Property, SlotError, User, VisitTransitionError,
};
use crate::storage::{ArtifactStore, StorageError};
use crate::store::{RepositoryError, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    SaveSellerInfo,
    SavePropertyInfo,
    GetRemainingInfo,
    SaveAvailability,
    GenerateQr,
    CreatePropertyCard,
    GetAppraisalInfo,
    PublishProperty,
    ListPendingVisits,
    ConfirmVisit,
    CancelVisit,
    CompleteVisit,
    GetLastVisitBuyer,
    GenerateSalesContract,
    UpdateBusinessStage,
    SaveBuyerInfo,
    GetRemainingBuyerInfo,
    GetSellerAvailability,
    SaveVisitInfo,
    NotifySeller,
}

impl ToolKind {
    pub const ALL: [ToolKind; 20] = [
        ToolKind::SaveSellerInfo,
        ToolKind::SavePropertyInfo,
        ToolKind::GetRemainingInfo,
        ToolKind::SaveAvailability,
        ToolKind::GenerateQr,
        ToolKind::CreatePropertyCard,
        ToolKind::GetAppraisalInfo,
        ToolKind::PublishProperty,
        ToolKind::ListPendingVisits,
        ToolKind::ConfirmVisit,
        ToolKind::CancelVisit,
        ToolKind::CompleteVisit,
        ToolKind::GetLastVisitBuyer,
        ToolKind::GenerateSalesContract,
        ToolKind::UpdateBusinessStage,
        ToolKind::SaveBuyerInfo,
        ToolKind::GetRemainingBuyerInfo,
        ToolKind::GetSellerAvailability,
        ToolKind::SaveVisitInfo,
        ToolKind::NotifySeller,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::SaveSellerInfo => "save_seller_info",
            ToolKind::SavePropertyInfo => "save_property_info",
            ToolKind::GetRemainingInfo => "get_remaining_info",
            ToolKind::SaveAvailability => "save_availability",
            ToolKind::GenerateQr => "generate_qr",
            ToolKind::CreatePropertyCard => "create_property_card",
            ToolKind::GetAppraisalInfo => "get_appraisal_info",
            ToolKind::PublishProperty => "publish_property",
            ToolKind::ListPendingVisits => "list_pending_visits",
            ToolKind::ConfirmVisit => "confirm_visit",
            ToolKind::CancelVisit => "cancel_visit",
            ToolKind::CompleteVisit => "complete_visit",
            ToolKind::GetLastVisitBuyer => "get_last_visit_buyer",
            ToolKind::GenerateSalesContract => "generate_sales_contract",
            ToolKind::UpdateBusinessStage => "update_business_stage",
            ToolKind::SaveBuyerInfo => "save_buyer_info",
            ToolKind::GetRemainingBuyerInfo => "get_remaining_buyer_info",
            ToolKind::GetSellerAvailability => "get_seller_availability",
            ToolKind::SaveVisitInfo => "save_visit_info",
            ToolKind::NotifySeller => "notify_seller",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::SaveSellerInfo => "Guarda o actualiza el nombre del vendedor.",
            ToolKind::SavePropertyInfo => {
                "Guarda la información de la propiedad: dirección, tipo, precio, descripción, fotos, comodidades y lugares cercanos. La primera vez requiere la dirección."
            }
            ToolKind::GetRemainingInfo => {
                "Obtiene la información que falta para completar el registro de la propiedad."
            }
            ToolKind::SaveAvailability => {
                "Almacena los horarios en los que el vendedor NO está disponible para visitas."
            }
            ToolKind::GenerateQr => {
                "Genera el código QR de la propiedad y se lo envía al vendedor por WhatsApp."
            }
            ToolKind::CreatePropertyCard => "Crea una ficha detallada de la propiedad.",
            ToolKind::GetAppraisalInfo => {
                "Calcula un precio de referencia a partir de propiedades comparables del mismo tipo."
            }
            ToolKind::PublishProperty => {
                "Publica la propiedad. Solo funciona cuando el registro está completo."
            }
            ToolKind::ListPendingVisits => "Lista las visitas solicitadas o confirmadas de la propiedad.",
            ToolKind::ConfirmVisit => "Confirma una visita solicitada y avisa al comprador.",
            ToolKind::CancelVisit => "Cancela una visita y avisa al comprador.",
            ToolKind::CompleteVisit => "Marca una visita confirmada como realizada.",
            ToolKind::GetLastVisitBuyer => {
                "Obtiene el nombre del comprador de la visita más reciente de la propiedad."
            }
            ToolKind::GenerateSalesContract => {
                "Genera el contrato de compra y venta en PDF y lo envía al vendedor."
            }
            ToolKind::UpdateBusinessStage => "Avanza la etapa del proceso comercial del usuario.",
            ToolKind::SaveBuyerInfo => "Registra el nombre y los intereses del comprador.",
            ToolKind::GetRemainingBuyerInfo => {
                "Obtiene la información que todavía se necesita del posible comprador."
            }
            ToolKind::GetSellerAvailability => {
                "Obtiene los horarios ocupados del vendedor y las visitas ya agendadas."
            }
            ToolKind::SaveVisitInfo => {
                "Agenda una visita en la fecha (YYYY-MM-DD) y hora (HH:MM) acordadas."
            }
            ToolKind::NotifySeller => "Notifica al vendedor sobre la visita solicitada.",
        }
    }

    /// JSON schema of the arguments object.
    pub fn parameters(&self) -> Value {
        let empty = json!({"type": "object", "properties": {}});
        let visit_action = json!({
            "type": "object",
            "properties": {
                "visit_id": {"type": "string", "description": "Identificador de la visita"},
                "notes": {"type": "string"}
            },
            "required": ["visit_id"]
        });
        match self {
            ToolKind::SaveSellerInfo => json!({
                "type": "object",
                "properties": {"name": {"type": "string", "description": "Nombre del vendedor"}},
                "required": ["name"]
            }),
            ToolKind::SavePropertyInfo => json!({
                "type": "object",
                "properties": {
                    "address": {"type": "string"},
                    "type": {"type": "string", "description": "Casa, apartamento, lote, local..."},
                    "price": {"type": "number", "description": "Precio en pesos"},
                    "description": {"type": "string"},
                    "pictures": {"type": "array", "items": {"type": "string"}, "description": "URLs de las fotos"},
                    "amenities": {"type": "array", "items": {"type": "string"}},
                    "nearby_places": {"type": "array", "items": {"type": "string"}}
                }
            }),
            ToolKind::SaveAvailability => json!({
                "type": "object",
                "properties": {
                    "slots": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "day": {"type": "string", "description": "Día de la semana"},
                                "start": {"type": "string", "description": "HH:MM"},
                                "end": {"type": "string", "description": "HH:MM"},
                                "description": {"type": "string"}
                            },
                            "required": ["day", "start", "end"]
                        }
                    }
                },
                "required": ["slots"]
            }),
            ToolKind::ConfirmVisit | ToolKind::CancelVisit | ToolKind::CompleteVisit => {
                visit_action
            }
            ToolKind::GenerateSalesContract => json!({
                "type": "object",
                "properties": {"buyer_info": {"type": "string", "description": "Información básica del comprador"}}
            }),
            ToolKind::UpdateBusinessStage => json!({
                "type": "object",
                "properties": {"stage": {"type": "string", "description": "Etapa destino"}},
                "required": ["stage"]
            }),
            ToolKind::SaveBuyerInfo => json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "interests": {"type": "array", "items": {"type": "string"}}
                }
            }),
            ToolKind::SaveVisitInfo => json!({
                "type": "object",
                "properties": {
                    "date": {"type": "string", "description": "YYYY-MM-DD"},
                    "time": {"type": "string", "description": "HH:MM"},
                    "notes": {"type": "string"}
                },
                "required": ["date", "time"]
            }),
            ToolKind::NotifySeller => json!({
                "type": "object",
                "properties": {"visit_id": {"type": "string"}}
            }),
            ToolKind::GetRemainingInfo
            | ToolKind::GenerateQr
            | ToolKind::CreatePropertyCard
            | ToolKind::GetAppraisalInfo
            | ToolKind::PublishProperty
            | ToolKind::ListPendingVisits
            | ToolKind::GetLastVisitBuyer
            | ToolKind::GetRemainingBuyerInfo
            | ToolKind::GetSellerAvailability => empty,
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// What a tool reports back to the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<BusinessStage>,
}

impl ToolOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            transition: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            transition: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn advancing(mut self, stage: BusinessStage) -> Self {
        self.transition = Some(stage);
        self
    }

    /// Serialized form handed back to the model.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: &'static str,
        source: serde_json::Error,
    },
    #[error("chat {0} not found")]
    ChatNotFound(String),
    #[error("user of chat {0} not found")]
    UserNotFound(String),
    #[error("no property is linked to this conversation")]
    NoProperty,
    #[error("visit {0} not found")]
    VisitNotFound(String),
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Visit(#[from] VisitTransitionError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Qr(#[from] QrError),
    #[error("contract template unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a tool may touch while serving one chat.
#[derive(Clone)]
pub struct ToolContext {
    pub chat_id: ChatId,
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn MessagingGateway>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub settings: Arc<BrokerSettings>,
}

impl ToolContext {
    pub(crate) fn chat(&self) -> Result<Chat, ToolError> {
        self.store
            .chat(&self.chat_id)?
            .ok_or_else(|| ToolError::ChatNotFound(self.chat_id.0.clone()))
    }

    pub(crate) fn user(&self) -> Result<User, ToolError> {
        let chat = self.chat()?;
        self.store
            .user(&chat.user_id)?
            .ok_or_else(|| ToolError::UserNotFound(self.chat_id.0.clone()))
    }

    pub(crate) fn linked_property(&self) -> Result<Option<Property>, ToolError> {
        let chat = self.chat()?;
        match chat.property_id {
            Some(id) => Ok(self.store.property(&id)?),
            None => Ok(None),
        }
    }

    pub(crate) fn property(&self) -> Result<Property, ToolError> {
        self.linked_property()?.ok_or(ToolError::NoProperty)
    }

    pub(crate) fn resolver(&self) -> StageResolver {
        StageResolver::new(self.store.clone())
    }
}

pub(crate) fn parse_args<T: DeserializeOwned>(kind: ToolKind, arguments: &Value) -> Result<T, ToolError> {
    let value = if arguments.is_null() {
        json!({})
    } else {
        arguments.clone()
    };
    serde_json::from_value(value).map_err(|source| ToolError::InvalidArguments {
        tool: kind.name(),
        source,
    })
}

/// Dispatches tool calls by name for one chat.
pub struct ToolExecutor {
    context: ToolContext,
}

impl ToolExecutor {
    pub fn new(context: ToolContext) -> Self {
        Self { context }
    }

    pub async fn execute(&self, kind: ToolKind, arguments: &Value) -> Result<ToolOutcome, ToolError> {
        let ctx = &self.context;
        match kind {
            ToolKind::SaveSellerInfo => seller::save_seller_info(ctx, arguments),
            ToolKind::SavePropertyInfo => seller::save_property_info(ctx, arguments),
            ToolKind::GetRemainingInfo => seller::get_remaining_info(ctx),
            ToolKind::SaveAvailability => seller::save_availability(ctx, arguments),
            ToolKind::GenerateQr => seller::generate_qr(ctx).await,
            ToolKind::CreatePropertyCard => seller::create_property_card(ctx),
            ToolKind::GetAppraisalInfo => seller::get_appraisal_info(ctx),
            ToolKind::PublishProperty => seller::publish_property(ctx),
            ToolKind::ListPendingVisits => seller::list_pending_visits(ctx),
            ToolKind::ConfirmVisit => seller::confirm_visit(ctx, arguments).await,
            ToolKind::CancelVisit => seller::cancel_visit(ctx, arguments).await,
            ToolKind::CompleteVisit => seller::complete_visit(ctx, arguments),
            ToolKind::GetLastVisitBuyer => seller::get_last_visit_buyer(ctx),
            ToolKind::GenerateSalesContract => contracts::generate_sales_contract(ctx, arguments).await,
            ToolKind::UpdateBusinessStage => seller::update_business_stage(ctx, arguments),
            ToolKind::SaveBuyerInfo => buyer::save_buyer_info(ctx, arguments),
            ToolKind::GetRemainingBuyerInfo => buyer::get_remaining_buyer_info(ctx),
            ToolKind::GetSellerAvailability => buyer::get_seller_availability(ctx),
            ToolKind::SaveVisitInfo => buyer::save_visit_info(ctx, arguments),
            ToolKind::NotifySeller => buyer::notify_seller(ctx, arguments).await,
        }
    }
}

#[async_trait]
impl ToolHandler for ToolExecutor {
    async fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return ToolOutcome::failed(ToolError::UnknownTool(call.name.clone()).to_string());
        };
        match self.execute(kind, &call.arguments).await {
            Ok(outcome) => {
                info!(chat_id = %self.context.chat_id.0, tool = kind.name(), success = outcome.success, "tool executed");
                outcome
            }
            Err(err) => {
                warn!(chat_id = %self.context.chat_id.0, tool = kind.name(), error = %err, "tool failed");
                ToolOutcome::failed(err.to_string())
            }
        }
    }
}
