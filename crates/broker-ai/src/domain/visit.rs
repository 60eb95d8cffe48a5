use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;
use super::property::PropertyId;
use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisitId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Requested,
    Confirmed,
    Canceled,
    Completed,
}

impl VisitStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VisitStatus::Requested => "requested",
            VisitStatus::Confirmed => "confirmed",
            VisitStatus::Canceled => "canceled",
            VisitStatus::Completed => "completed",
        }
    }

    /// Requested and confirmed visits hold their slot on the property calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, VisitStatus::Requested | VisitStatus::Confirmed)
    }

    pub fn can_become(&self, next: VisitStatus) -> bool {
        matches!(
            (self, next),
            (VisitStatus::Requested, VisitStatus::Confirmed)
                | (VisitStatus::Requested, VisitStatus::Canceled)
                | (VisitStatus::Confirmed, VisitStatus::Completed)
                | (VisitStatus::Confirmed, VisitStatus::Canceled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("visit cannot move from {} to {}", .from.label(), .to.label())]
pub struct VisitTransitionError {
    pub from: VisitStatus,
    pub to: VisitStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub property_id: PropertyId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Local wall-clock time agreed in the conversation.
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Visit {
    pub fn request(
        property_id: PropertyId,
        buyer_id: UserId,
        seller_id: UserId,
        scheduled_at: NaiveDateTime,
        duration_minutes: u32,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: VisitId(new_id()),
            property_id,
            buyer_id,
            seller_id,
            scheduled_at,
            duration_minutes,
            status: VisitStatus::Requested,
            notes,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.ends_at() && self.scheduled_at < end
    }

    pub fn transition(
        &mut self,
        next: VisitStatus,
        notes: Option<String>,
    ) -> Result<(), VisitTransitionError> {
        if !self.status.can_become(next) {
            return Err(VisitTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if let Some(notes) = notes.filter(|value| !value.trim().is_empty()) {
            self.notes = Some(notes);
        }
        self.updated_at = Some(Utc::now());
        Ok(())
    }
}

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// "23 de agosto"
pub fn format_date_spanish(at: NaiveDateTime) -> String {
    let month = MONTHS[at.month0() as usize];
    format!("{} de {}", at.day(), month)
}

/// 24-hour clock, "14:30".
pub fn format_time_spanish(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}

/// Values substituted into visit notification templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitTemplateData {
    pub seller_name: String,
    pub buyer_name: String,
    pub visit_date: String,
    pub visit_time: String,
    pub visit_status: String,
    pub visit_id: String,
}

impl VisitTemplateData {
    pub fn new(visit: &Visit, seller_name: Option<&str>, buyer_name: Option<&str>) -> Self {
        let pick = |name: Option<&str>, fallback: &str| {
            name.map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            seller_name: pick(seller_name, "Vendedor"),
            buyer_name: pick(buyer_name, "Comprador"),
            visit_date: format_date_spanish(visit.scheduled_at),
            visit_time: format_time_spanish(visit.scheduled_at),
            visit_status: visit.status.label().to_string(),
            visit_id: visit.id.0.clone(),
        }
    }

    /// Placeholder order expected by the visit-request template body.
    pub fn placeholders(&self) -> Vec<String> {
        vec![
            self.seller_name.clone(),
            self.buyer_name.clone(),
            self.visit_date.clone(),
            self.visit_time.clone(),
        ]
    }
}
