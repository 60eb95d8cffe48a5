use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;
use super::stage::SellerStage;
use super::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn generate() -> Self {
        Self(new_id())
    }
}

/// Minimum pictures required before a listing counts as complete.
pub const REQUIRED_IMAGES: usize = 3;
/// Fields measured by registration progress.
pub const TRACKED_FIELD_NAMES: [&str; 5] = ["address", "type", "price", "description", "images"];
const TRACKED_FIELDS: usize = TRACKED_FIELD_NAMES.len();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalDocument {
    pub doc_type: String,
    pub link: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub address: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub legal_docs: Vec<LegalDocument>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub nearby_places: Vec<String>,
    pub owner_id: UserId,
    pub stage: SellerStage,
    pub qr_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial listing data gathered over the conversation. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDraft {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pictures: Option<Vec<String>>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub nearby_places: Option<Vec<String>>,
}

impl PropertyDraft {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.kind.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.pictures.is_none()
            && self.amenities.is_none()
            && self.nearby_places.is_none()
    }
}

/// Registration completeness snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyProgress {
    pub property_id: PropertyId,
    pub current_stage: SellerStage,
    pub missing_fields: Vec<&'static str>,
    pub completion_percentage: f64,
}

impl PropertyProgress {
    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

impl Property {
    pub fn new(owner_id: UserId, address: impl Into<String>) -> Self {
        Self {
            id: PropertyId::generate(),
            address: address.into(),
            kind: None,
            price: None,
            description: None,
            images: Vec::new(),
            legal_docs: Vec::new(),
            amenities: Vec::new(),
            nearby_places: Vec::new(),
            owner_id,
            stage: SellerStage::Registration,
            qr_url: None,
            published_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Applies non-empty draft fields. Pictures are appended, other lists replaced.
    /// Returns whether anything changed.
    pub fn apply(&mut self, draft: PropertyDraft) -> bool {
        let mut changed = false;

        if let Some(address) = draft.address.filter(|value| !value.trim().is_empty()) {
            changed |= self.address != address;
            self.address = address;
        }
        if let Some(kind) = draft.kind.filter(|value| !value.trim().is_empty()) {
            changed |= self.kind.as_ref() != Some(&kind);
            self.kind = Some(kind);
        }
        if let Some(price) = draft.price.filter(|value| *value > 0.0) {
            changed |= self.price != Some(price);
            self.price = Some(price);
        }
        if let Some(description) = draft.description.filter(|value| !value.trim().is_empty()) {
            changed |= self.description.as_ref() != Some(&description);
            self.description = Some(description);
        }
        if let Some(pictures) = draft.pictures {
            for picture in pictures {
                if !picture.trim().is_empty() && !self.images.contains(&picture) {
                    self.images.push(picture);
                    changed = true;
                }
            }
        }
        if let Some(amenities) = draft.amenities.filter(|list| !list.is_empty()) {
            changed |= self.amenities != amenities;
            self.amenities = amenities;
        }
        if let Some(nearby) = draft.nearby_places.filter(|list| !list.is_empty()) {
            changed |= self.nearby_places != nearby;
            self.nearby_places = nearby;
        }

        if changed {
            self.updated_at = Some(Utc::now());
        }
        changed
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.address.trim().is_empty() {
            missing.push("address");
        }
        if blank(&self.kind) {
            missing.push("type");
        }
        if self.price.map_or(true, |price| price <= 0.0) {
            missing.push("price");
        }
        if blank(&self.description) {
            missing.push("description");
        }
        if self.images.len() < REQUIRED_IMAGES {
            missing.push("images");
        }
        missing
    }

    pub fn progress(&self) -> PropertyProgress {
        let missing_fields = self.missing_fields();
        let filled = (TRACKED_FIELDS - missing_fields.len()) as f64;
        let percentage = (filled / TRACKED_FIELDS as f64 * 100.0 * 100.0).round() / 100.0;
        PropertyProgress {
            property_id: self.id.clone(),
            current_stage: self.stage,
            missing_fields,
            completion_percentage: percentage,
        }
    }

    /// Plain-text listing card shared with the seller and prospective buyers.
    pub fn card(&self) -> String {
        let mut lines = vec![format!("🏠 *{}*", self.address)];
        if let Some(kind) = &self.kind {
            lines.push(format!("Tipo: {kind}"));
        }
        if let Some(price) = self.price {
            lines.push(format!("Precio: {}", format_price(price)));
        }
        if let Some(description) = &self.description {
            lines.push(String::new());
            lines.push(description.clone());
        }
        if !self.amenities.is_empty() {
            lines.push(String::new());
            lines.push(format!("Comodidades: {}", self.amenities.join(", ")));
        }
        if !self.nearby_places.is_empty() {
            lines.push(format!("Cerca de: {}", self.nearby_places.join(", ")));
        }
        if !self.images.is_empty() {
            lines.push(format!("📷 {} fotos disponibles", self.images.len()));
        }
        lines.join("\n")
    }

    pub fn attach_document(&mut self, doc_type: impl Into<String>, link: impl Into<String>) {
        self.legal_docs.push(LegalDocument {
            doc_type: doc_type.into(),
            link: link.into(),
            uploaded_at: Utc::now(),
        });
        self.updated_at = Some(Utc::now());
    }
}

/// Formats with thousands separators using dots, as sellers write prices in chat.
pub fn format_price(price: f64) -> String {
    let rounded = price.round().max(0.0) as u64;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    format!("${out}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property() -> Property {
        Property::new(UserId("owner-1".to_string()), "Calle 123 #45-67")
    }

    #[test]
    fn fresh_property_reports_missing_fields() {
        let progress = property().progress();
        assert_eq!(
            progress.missing_fields,
            vec!["type", "price", "description", "images"]
        );
        assert_eq!(progress.completion_percentage, 20.0);
        assert_eq!(progress.current_stage, SellerStage::Registration);
    }

    #[test]
    fn apply_fills_fields_and_appends_pictures() {
        let mut property = property();
        let changed = property.apply(PropertyDraft {
            kind: Some("apartamento".to_string()),
            price: Some(350_000_000.0),
            description: Some("Luminoso, dos habitaciones".to_string()),
            pictures: Some(vec!["https://img/1.jpg".to_string(), "https://img/2.jpg".to_string()]),
            ..PropertyDraft::default()
        });
        assert!(changed);
        assert_eq!(property.missing_fields(), vec!["images"]);
        assert_eq!(property.progress().completion_percentage, 80.0);

        property.apply(PropertyDraft {
            pictures: Some(vec!["https://img/2.jpg".to_string(), "https://img/3.jpg".to_string()]),
            ..PropertyDraft::default()
        });
        assert_eq!(property.images.len(), 3);
        assert!(property.progress().is_complete());
    }

    #[test]
    fn apply_ignores_blank_and_non_positive_values() {
        let mut property = property();
        let changed = property.apply(PropertyDraft {
            address: Some("   ".to_string()),
            price: Some(0.0),
            ..PropertyDraft::default()
        });
        assert!(!changed);
        assert_eq!(property.address, "Calle 123 #45-67");
        assert!(property.price.is_none());
    }

    #[test]
    fn card_includes_price_with_separators() {
        let mut property = property();
        property.price = Some(350_000_000.0);
        property.kind = Some("casa".to_string());
        let card = property.card();
        assert!(card.contains("Precio: $350.000.000"));
        assert!(card.contains("Tipo: casa"));
    }

    #[test]
    fn format_price_handles_small_values() {
        assert_eq!(format_price(950.0), "$950");
        assert_eq!(format_price(1_000.0), "$1.000");
    }
}
