pub mod client;
pub mod qr;
pub mod webhook;

pub use client::{
    InfobipClient, MessagingError, MessagingGateway, OutboundMessage, OutboxGateway,
    TemplateMessage,
};
pub use qr::{inquiry_address, property_inquiry_message, render_png, whatsapp_link, QrError};
pub use webhook::{parse_envelope, InboundContent, InboundMessage, WebhookError};
