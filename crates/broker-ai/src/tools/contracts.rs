use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{parse_args, ToolContext, ToolError, ToolKind, ToolOutcome};
use crate::storage::Artifact;

const CONTRACT_DOC_TYPE: &str = "sales_contract";

#[derive(Debug, Deserialize)]
struct ContractArgs {
    buyer_info: Option<String>,
}

/// Publishes the sales contract template, files it on the property, and sends the link to
/// the seller.
pub(super) async fn generate_sales_contract(
    ctx: &ToolContext,
    arguments: &Value,
) -> Result<ToolOutcome, ToolError> {
    let args: ContractArgs = parse_args(ToolKind::GenerateSalesContract, arguments)?;
    let user = ctx.user()?;
    let mut property = ctx.property()?;

    let bytes = tokio::fs::read(&ctx.settings.contract_template).await?;
    let url = ctx.artifacts.upload(Artifact::pdf(bytes)).await?;

    property.attach_document(CONTRACT_DOC_TYPE, url.clone());
    ctx.store.update_property(property.clone())?;
    info!(property_id = %property.id.0, "sales contract generated");

    let message = format!("Contrato de Compra y Venta Generado\nDocumento del Contrato (PDF):\n🔗 {url}");
    let delivered = match ctx.gateway.send_text(&user.phone, &message).await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "contract link delivery failed");
            false
        }
    };

    Ok(ToolOutcome::ok(message).with_data(json!({
        "contract_url": url,
        "buyer_info": args.buyer_info,
        "delivered": delivered,
    })))
}
