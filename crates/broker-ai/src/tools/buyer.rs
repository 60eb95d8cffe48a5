use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{parse_args, ToolContext, ToolError, ToolKind, ToolOutcome};
use crate::channels::whatsapp::TemplateMessage;
use crate::domain::user::parse_time;
use crate::domain::visit::{format_date_spanish, format_time_spanish};
use crate::domain::{
    AvailabilitySlot, BusinessStage, BuyerStage, Property, User, Visit, VisitId, VisitStatus,
    VisitTemplateData,
};

#[derive(Debug, Deserialize)]
struct BuyerInfoArgs {
    name: Option<String>,
    #[serde(default)]
    interests: Vec<String>,
}

pub(super) fn save_buyer_info(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let args: BuyerInfoArgs = parse_args(ToolKind::SaveBuyerInfo, arguments)?;
    let mut user = ctx.user()?;

    if let Some(name) = args.name.map(|name| name.trim().to_string()).filter(|name| !name.is_empty()) {
        user.name = name;
    }
    for interest in args.interests {
        let interest = interest.trim().to_string();
        if !interest.is_empty() && !user.interests.contains(&interest) {
            user.interests.push(interest);
        }
    }
    user.updated_at = Some(Utc::now());
    ctx.store.update_user(user.clone())?;

    let data = json!({ "name": user.name, "interests": user.interests });
    if user.has_name() {
        return Ok(ToolOutcome::ok("Información del comprador registrada correctamente")
            .with_data(data)
            .advancing(BusinessStage::Buyer(BuyerStage::Scheduling)));
    }
    Ok(ToolOutcome::ok("Información guardada. Falta el nombre del comprador").with_data(data))
}

pub(super) fn get_remaining_buyer_info(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let user = ctx.user()?;
    let missing: Vec<&str> = if user.has_name() { Vec::new() } else { vec!["name"] };
    let message = if missing.is_empty() {
        "Ya se tiene toda la información del comprador".to_string()
    } else {
        format!("Falta: {}", missing.join(", "))
    };
    Ok(ToolOutcome::ok(message).with_data(json!({
        "name": user.has_name().then_some(user.name.as_str()),
        "missing_fields": missing,
    })))
}

fn seller_of(ctx: &ToolContext, property: &Property) -> Result<User, ToolError> {
    ctx.store
        .user(&property.owner_id)?
        .ok_or_else(|| ToolError::UserNotFound(property.owner_id.0.clone()))
}

pub(super) fn get_seller_availability(ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
    let property = ctx.property()?;
    let seller = seller_of(ctx, &property)?;

    let busy: Vec<String> = seller.availability.iter().map(AvailabilitySlot::describe).collect();
    let booked: Vec<String> = ctx
        .store
        .visits_for_property(&property.id)?
        .into_iter()
        .filter(|visit| visit.status.is_active())
        .map(|visit| {
            format!(
                "{} a las {}",
                format_date_spanish(visit.scheduled_at),
                format_time_spanish(visit.scheduled_at)
            )
        })
        .collect();

    let message = if busy.is_empty() {
        "El vendedor no ha registrado horarios ocupados".to_string()
    } else {
        format!("El vendedor no está disponible: {}", busy.join("; "))
    };
    Ok(ToolOutcome::ok(message).with_data(json!({
        "busy_slots": busy,
        "booked_visits": booked,
        "visit_duration_minutes": ctx.settings.visit_duration_minutes,
    })))
}

#[derive(Debug, Deserialize)]
struct VisitArgs {
    date: String,
    time: String,
    notes: Option<String>,
}

pub(super) fn save_visit_info(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let args: VisitArgs = parse_args(ToolKind::SaveVisitInfo, arguments)?;
    let date = NaiveDate::parse_from_str(args.date.trim(), "%Y-%m-%d").map_err(|_| {
        ToolError::Rejected(format!("Fecha inválida '{}', se espera YYYY-MM-DD", args.date))
    })?;
    let start = date.and_time(parse_time(&args.time)?);
    let end = start + Duration::minutes(i64::from(ctx.settings.visit_duration_minutes));

    let buyer = ctx.user()?;
    let property = ctx.property()?;
    let seller = seller_of(ctx, &property)?;

    if !seller.is_available(start, end) {
        let busy: Vec<String> = seller
            .conflicts(start, end)
            .iter()
            .map(|slot| slot.describe())
            .collect();
        return Err(ToolError::Rejected(format!(
            "El vendedor no está disponible en ese horario: {}",
            busy.join("; ")
        )));
    }

    let taken = ctx
        .store
        .visits_for_property(&property.id)?
        .into_iter()
        .any(|visit| visit.status.is_active() && visit.overlaps(start, end));
    if taken {
        return Err(ToolError::Rejected(
            "Ya hay una visita agendada para la propiedad en ese horario".to_string(),
        ));
    }

    let visit = ctx.store.insert_visit(Visit::request(
        property.id.clone(),
        buyer.id,
        seller.id,
        start,
        ctx.settings.visit_duration_minutes,
        args.notes.filter(|notes| !notes.trim().is_empty()),
    ))?;
    info!(visit_id = %visit.id.0, property_id = %property.id.0, "visit requested");

    Ok(ToolOutcome::ok(format!(
        "Visita solicitada para el {} a las {}",
        format_date_spanish(visit.scheduled_at),
        format_time_spanish(visit.scheduled_at)
    ))
    .with_data(json!({ "visit_id": visit.id.0, "status": visit.status.label() }))
    .advancing(BusinessStage::Buyer(BuyerStage::FollowUp)))
}

#[derive(Debug, Deserialize)]
struct NotifyArgs {
    visit_id: Option<String>,
}

pub(super) async fn notify_seller(ctx: &ToolContext, arguments: &Value) -> Result<ToolOutcome, ToolError> {
    let args: NotifyArgs = parse_args(ToolKind::NotifySeller, arguments)?;
    let buyer = ctx.user()?;
    let property = ctx.property()?;

    let visit = match args.visit_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => ctx
            .store
            .visit(&VisitId(id.clone()))?
            .filter(|visit| visit.property_id == property.id)
            .ok_or(ToolError::VisitNotFound(id))?,
        None => ctx
            .store
            .visits_for_property(&property.id)?
            .into_iter()
            .filter(|visit| visit.buyer_id == buyer.id && visit.status == VisitStatus::Requested)
            .last()
            .ok_or_else(|| {
                ToolError::Rejected("No hay una visita solicitada para notificar".to_string())
            })?,
    };

    let seller = seller_of(ctx, &property)?;
    let data = VisitTemplateData::new(&visit, Some(&seller.name), Some(&buyer.name));
    let template = TemplateMessage {
        name: ctx.settings.visit_request_template.clone(),
        language: ctx.settings.template_language.clone(),
        body_placeholders: data.placeholders(),
        header_image: None,
    };
    ctx.gateway.send_template(&seller.phone, &template).await?;

    Ok(ToolOutcome::ok("Notificación enviada correctamente")
        .with_data(serde_json::to_value(&data).unwrap_or(Value::Null)))
}
