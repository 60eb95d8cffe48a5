use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{parse_args, ToolContext, ToolError, ToolKind, ToolOutcome};
use crate::channels::whatsapp::{property_inquiry_message, render_png, whatsapp_link, TemplateMessage};
use crate::domain::property::{format_price, TRACKED_FIELD_NAMES};
use crate::domain::user::{parse_time, parse_weekday};
use crate::domain::visit::{format_date_spanish, format_time_spanish};
use crate::domain::{
    AvailabilitySlot, BusinessStage, Property, PropertyDraft, SellerStage, Visit, VisitId,
    VisitStatus,
};
use crate::storage::Artifact;

#[derive(Debug, Deserialize)]
struct SellerInfoArgs {
    name: Option<String>,
}

pub(super) fn save_seller_info(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let args: SellerInfoArgs = parse_args(ToolKind::SaveSellerInfo, arguments)?;
    let name = args
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ToolError::Rejected("Se necesita el nombre del vendedor".to_string()))?;

    let mut user = ctx.user()?;
    user.name = name;
    user.updated_at = Some(Utc::now());
    ctx.store.update_user(user.clone())?;

    Ok(ToolOutcome::ok(format!("Información del vendedor {} registrada", user.name))
        .with_data(json!({ "name": user.name })))
}

pub(super) fn save_property_info(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let draft: PropertyDraft = parse_args(ToolKind::SavePropertyInfo, arguments)?;
    if draft.is_empty() {
        return Err(ToolError::Rejected(
            "No se recibió información de la propiedad para guardar".to_string(),
        ));
    }

    let property = match ctx.linked_property()? {
        Some(mut property) => {
            property.apply(draft);
            ctx.store.update_property(property.clone())?;
            property
        }
        None => {
            let address = draft
                .address
                .clone()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    ToolError::Rejected(
                        "Se necesita la dirección de la propiedad para registrarla".to_string(),
                    )
                })?;
            let mut chat = ctx.chat()?;
            let mut property = Property::new(chat.user_id.clone(), address);
            property.apply(draft);
            let property = ctx.store.insert_property(property)?;
            chat.link_property(property.id.clone());
            ctx.store.update_chat(chat)?;
            info!(chat_id = %ctx.chat_id.0, property_id = %property.id.0, "property registered");
            property
        }
    };

    let progress = property.progress();
    let data = serde_json::to_value(&progress).unwrap_or(Value::Null);
    if progress.is_complete() {
        return Ok(ToolOutcome::ok("Información de la propiedad completa")
            .with_data(data)
            .advancing(BusinessStage::Seller(SellerStage::Publishing)));
    }
    Ok(ToolOutcome::ok(format!(
        "Información guardada. Falta: {}",
        progress.missing_fields.join(", ")
    ))
    .with_data(data))
}

pub(super) fn get_remaining_info(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let Some(property) = ctx.linked_property()? else {
        return Ok(ToolOutcome::ok("La propiedad aún no está registrada").with_data(json!({
            "missing_fields": TRACKED_FIELD_NAMES,
            "completion_percentage": 0.0,
        })));
    };
    let progress = property.progress();
    let message = if progress.is_complete() {
        "El registro de la propiedad está completo".to_string()
    } else {
        format!("Falta: {}", progress.missing_fields.join(", "))
    };
    Ok(ToolOutcome::ok(message).with_data(serde_json::to_value(&progress).unwrap_or(Value::Null)))
}

#[derive(Debug, Deserialize)]
struct SlotArgs {
    day: String,
    start: String,
    end: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityArgs {
    #[serde(default)]
    slots: Vec<SlotArgs>,
}

pub(super) fn save_availability(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let args: AvailabilityArgs = parse_args(ToolKind::SaveAvailability, arguments)?;
    if args.slots.is_empty() {
        return Err(ToolError::Rejected("No se recibieron horarios".to_string()));
    }

    let slots = args
        .slots
        .into_iter()
        .map(|slot| {
            AvailabilitySlot::new(
                parse_weekday(&slot.day)?,
                parse_time(&slot.start)?,
                parse_time(&slot.end)?,
                slot.description,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut user = ctx.user()?;
    let added = user.add_availability(slots);
    ctx.store.update_user(user.clone())?;

    let described: Vec<String> = user.availability.iter().map(AvailabilitySlot::describe).collect();
    Ok(ToolOutcome::ok(format!(
        "Horario de disponibilidad almacenado correctamente ({added} franjas nuevas)"
    ))
    .with_data(json!({ "busy_slots": described })))
}

pub(super) async fn generate_qr(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let user = ctx.user()?;
    let mut property = ctx.property()?;

    let link = whatsapp_link(
        &ctx.settings.broker_number,
        Some(&property_inquiry_message(&property.address)),
    );
    let png = render_png(&link)?;
    let url = ctx.artifacts.upload(Artifact::png(png)).await?;

    property.qr_url = Some(url.clone());
    property.updated_at = Some(Utc::now());
    ctx.store.update_property(property)?;

    let template = TemplateMessage {
        name: ctx.settings.qr_template.clone(),
        language: ctx.settings.template_language.clone(),
        body_placeholders: Vec::new(),
        header_image: Some(url.clone()),
    };
    ctx.gateway.send_template(&user.phone, &template).await?;

    Ok(ToolOutcome::ok("Código QR generado y enviado correctamente")
        .with_data(json!({ "qr_url": url, "link": link })))
}

pub(super) fn create_property_card(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let card = ctx.property()?.card();
    Ok(ToolOutcome::ok(card.clone()).with_data(json!({ "card": card })))
}

pub(super) fn get_appraisal_info(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let property = ctx.property()?;
    let Some(kind) = property.kind.as_deref().map(str::to_lowercase) else {
        return Err(ToolError::Rejected(
            "Se necesita el tipo de propiedad para estimar un precio".to_string(),
        ));
    };

    let prices: Vec<f64> = ctx
        .store
        .properties()?
        .into_iter()
        .filter(|other| other.id != property.id)
        .filter(|other| other.kind.as_deref().map(str::to_lowercase).as_deref() == Some(kind.as_str()))
        .filter_map(|other| other.price.filter(|price| *price > 0.0))
        .collect();

    if prices.is_empty() {
        return Ok(ToolOutcome::ok(
            "No hay propiedades comparables registradas para estimar un precio",
        )
        .with_data(json!({ "comparables": 0 })));
    }

    let average = prices.iter().sum::<f64>() / prices.len() as f64;
    Ok(ToolOutcome::ok(format!(
        "Precio promedio de {} propiedades tipo {kind}: {}",
        prices.len(),
        format_price(average)
    ))
    .with_data(json!({
        "comparables": prices.len(),
        "average_price": average,
        "listed_price": property.price,
    })))
}

pub(super) fn publish_property(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let mut property = ctx.property()?;
    let progress = property.progress();
    if !progress.is_complete() {
        return Err(ToolError::Rejected(format!(
            "No se puede publicar, falta: {}",
            progress.missing_fields.join(", ")
        )));
    }

    let now = Utc::now();
    property.published_at.get_or_insert(now);
    property.is_active = true;
    property.updated_at = Some(now);
    ctx.store.update_property(property.clone())?;

    Ok(ToolOutcome::ok("Propiedad publicada correctamente")
        .with_data(json!({ "property_id": property.id.0, "published_at": property.published_at }))
        .advancing(BusinessStage::Seller(SellerStage::Visits)))
}

fn visit_view(ctx: &ToolContext, visit: &Visit) -> Result<Value, ToolError> {
    let buyer_name = ctx
        .store
        .user(&visit.buyer_id)?
        .filter(|user| user.has_name())
        .map(|user| user.name);
    Ok(json!({
        "visit_id": visit.id.0,
        "date": format_date_spanish(visit.scheduled_at),
        "time": format_time_spanish(visit.scheduled_at),
        "status": visit.status.label(),
        "buyer_name": buyer_name,
        "notes": visit.notes,
    }))
}

pub(super) fn list_pending_visits(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let property = ctx.property()?;
    let visits = ctx
        .store
        .visits_for_property(&property.id)?
        .into_iter()
        .filter(|visit| visit.status.is_active())
        .map(|visit| visit_view(ctx, &visit))
        .collect::<Result<Vec<_>, _>>()?;

    let message = if visits.is_empty() {
        "No hay visitas pendientes".to_string()
    } else {
        format!("{} visitas pendientes", visits.len())
    };
    Ok(ToolOutcome::ok(message).with_data(json!({ "visits": visits })))
}

#[derive(Debug, Deserialize)]
struct VisitActionArgs {
    visit_id: String,
    notes: Option<String>,
}

/// Loads a visit of the chat's property and moves it to `next`.
fn transition_visit(
    ctx: &ToolContext,
    kind: ToolKind,
    arguments: &Value,
    next: VisitStatus,
) -> Result<Visit, ToolError> {
    let args: VisitActionArgs = parse_args(kind, arguments)?;
    let property = ctx.property()?;
    let mut visit = ctx
        .store
        .visit(&VisitId(args.visit_id.clone()))?
        .filter(|visit| visit.property_id == property.id)
        .ok_or(ToolError::VisitNotFound(args.visit_id))?;
    visit.transition(next, args.notes)?;
    ctx.store.update_visit(visit.clone())?;
    info!(visit_id = %visit.id.0, status = visit.status.label(), "visit updated");
    Ok(visit)
}

async fn tell_buyer(ctx: &ToolContext, visit: &Visit, text: String) -> bool {
    let phone = match ctx.store.user(&visit.buyer_id) {
        Ok(Some(buyer)) => buyer.phone,
        Ok(None) => return false,
        Err(err) => {
            warn!(error = %err, "buyer lookup failed");
            return false;
        }
    };
    match ctx.gateway.send_text(&phone, &text).await {
        Ok(()) => true,
        Err(err) => {
            warn!(visit_id = %visit.id.0, error = %err, "buyer notification failed");
            false
        }
    }
}

pub(super) async fn confirm_visit(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let visit = transition_visit(ctx, ToolKind::ConfirmVisit, arguments, VisitStatus::Confirmed)?;
    let text = format!(
        "¡Tu visita del {} a las {} fue confirmada por el vendedor!",
        format_date_spanish(visit.scheduled_at),
        format_time_spanish(visit.scheduled_at)
    );
    let notified = tell_buyer(ctx, &visit, text).await;
    Ok(ToolOutcome::ok("Visita confirmada")
        .with_data(json!({ "visit_id": visit.id.0, "buyer_notified": notified })))
}

pub(super) async fn cancel_visit(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let visit = transition_visit(ctx, ToolKind::CancelVisit, arguments, VisitStatus::Canceled)?;
    let text = format!(
        "Lo sentimos, la visita del {} a las {} fue cancelada por el vendedor.",
        format_date_spanish(visit.scheduled_at),
        format_time_spanish(visit.scheduled_at)
    );
    let notified = tell_buyer(ctx, &visit, text).await;
    Ok(ToolOutcome::ok("Visita cancelada")
        .with_data(json!({ "visit_id": visit.id.0, "buyer_notified": notified })))
}

pub(super) fn complete_visit(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let visit = transition_visit(ctx, ToolKind::CompleteVisit, arguments, VisitStatus::Completed)?;
    Ok(ToolOutcome::ok("Visita marcada como realizada")
        .with_data(json!({ "visit_id": visit.id.0 }))
        .advancing(BusinessStage::Seller(SellerStage::Completed)))
}

pub(super) fn get_last_visit_buyer(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let property = ctx.property()?;
    let last = ctx
        .store
        .visits_for_property(&property.id)?
        .into_iter()
        .filter(|visit| visit.status != VisitStatus::Canceled)
        .last();

    let Some(visit) = last else {
        return Ok(ToolOutcome::ok("No hay visitas registradas")
            .with_data(json!({ "buyer_name": "comprador" })));
    };
    let name = ctx
        .store
        .user(&visit.buyer_id)?
        .filter(|user| user.has_name())
        .map_or_else(|| "comprador".to_string(), |user| user.name);
    Ok(ToolOutcome::ok(format!("El comprador de la última visita es {name}"))
        .with_data(json!({ "buyer_name": name, "visit_id": visit.id.0 })))
}

#[derive(Debug, Deserialize)]
struct StageArgs {
    stage: String,
}

pub(super) fn update_business_stage(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let args: StageArgs = parse_args(ToolKind::UpdateBusinessStage, arguments)?;
    let user = ctx.user()?;
    let target = BusinessStage::parse_for(user.role, &args.stage).ok_or_else(|| {
        ToolError::Rejected(format!(
            "Etapa desconocida para un {}: {}",
            user.role.label(),
            args.stage
        ))
    })?;

    let current = ctx.resolver().resolve(&ctx.chat_id, user.role)?;
    let moves_forward = match (current, target) {
        (BusinessStage::Seller(from), BusinessStage::Seller(to)) => from <= to,
        (BusinessStage::Buyer(from), BusinessStage::Buyer(to)) => from <= to,
        _ => false,
    };
    if !moves_forward {
        return Err(ToolError::Rejected(format!(
            "La etapa no puede retroceder de {} a {}",
            current.label(),
            target.label()
        )));
    }

    Ok(ToolOutcome::ok(format!("Etapa actualizada a {}", target.label()))
        .with_data(json!({ "from": current.label(), "to": target.label() }))
        .advancing(target))
}
