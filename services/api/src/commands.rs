use broker_ai::agents::{dispatch_table, LanguageModel, OpenAiModel};
use broker_ai::channels::whatsapp::{
    parse_envelope, property_inquiry_message, render_png, whatsapp_link, OutboxGateway,
    WebhookError,
};
use broker_ai::config::{AppConfig, BrokerSettings, ConfigError};
use broker_ai::conversation::BrokerService;
use broker_ai::error::AppError;
use broker_ai::storage::InMemoryArtifactStore;
use broker_ai::store::InMemoryStore;
use broker_ai::telemetry;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QrArgs {
    /// Property address quoted in the prefilled inquiry
    #[arg(long)]
    pub(crate) address: String,
    /// Broker WhatsApp number (defaults to INFOBIP_WHATSAPP_FROM)
    #[arg(long)]
    pub(crate) phone: Option<String>,
    /// Destination PNG file
    #[arg(long)]
    pub(crate) output: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// Infobip webhook payload (JSON file)
    #[arg(long)]
    pub(crate) payload: PathBuf,
}

pub(crate) fn print_agents() {
    println!("{:<24} {:<16} {:<14} members", "stage", "profile", "next");
    for profile in dispatch_table() {
        let next = profile
            .advances_to
            .map(|stage| stage.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<16} {:<14} {}",
            profile.stage.to_string(),
            profile.key,
            next,
            profile.member_names().join(", ")
        );
        let tools: Vec<&str> = profile.tools().iter().map(|tool| tool.name()).collect();
        println!("{:<24} tools: {}", "", tools.join(", "));
    }
}

pub(crate) async fn render_qr(args: QrArgs) -> Result<(), AppError> {
    let phone = match args.phone {
        Some(phone) => phone,
        None => {
            let config = AppConfig::load()?;
            if config.broker.broker_number.trim().is_empty() {
                return Err(ConfigError::Missing {
                    key: "INFOBIP_WHATSAPP_FROM",
                }
                .into());
            }
            config.broker.broker_number
        }
    };

    let link = whatsapp_link(&phone, Some(&property_inquiry_message(&args.address)));
    let png = render_png(&link)?;
    tokio::fs::write(&args.output, png).await?;

    println!("QR written to {}", args.output.display());
    println!("Link: {link}");
    Ok(())
}

/// Broker wired to in-process adapters; outbound WhatsApp traffic lands in the returned outbox.
pub(crate) fn offline_service(
    model: Arc<dyn LanguageModel>,
    settings: BrokerSettings,
    max_tool_rounds: usize,
) -> (BrokerService, Arc<OutboxGateway>) {
    let outbox = Arc::new(OutboxGateway::new());
    let service = BrokerService::new(
        Arc::new(InMemoryStore::new()),
        outbox.clone(),
        Arc::new(InMemoryArtifactStore::new()),
        model,
        settings,
        max_tool_rounds,
    );
    (service, outbox)
}

pub(crate) async fn replay(args: ReplayArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;
    if config.llm.api_key.trim().is_empty() {
        return Err(ConfigError::Missing {
            key: "OPENAI_API_KEY",
        }
        .into());
    }

    let raw = tokio::fs::read_to_string(&args.payload).await?;
    let payload: serde_json::Value = serde_json::from_str(&raw).map_err(WebhookError::from)?;
    let messages = parse_envelope(&payload)?;

    let model = Arc::new(OpenAiModel::new(&config.llm)?);
    let (service, outbox) = offline_service(model, config.broker.clone(), config.llm.max_tool_rounds);

    for message in &messages {
        println!("> {}", message.summary());
        match service.handle_inbound(message).await {
            Ok(handled) => {
                println!(
                    "  [{} -> {}] tools: {}",
                    handled.stage_before,
                    handled.stage_after,
                    if handled.tools.is_empty() {
                        "-".to_string()
                    } else {
                        handled.tools.join(", ")
                    }
                );
                if let Some(reply) = handled.reply {
                    println!("< {reply}");
                }
            }
            Err(err) => println!("! {err}"),
        }
    }

    let sent = outbox.sent();
    println!();
    println!("Outbox ({} messages):", sent.len());
    println!(
        "{}",
        serde_json::to_string_pretty(&sent).map_err(WebhookError::from)?
    );
    Ok(())
}
