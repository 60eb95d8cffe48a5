use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::new_id;

/// Identifier wrapper for stored users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(new_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Buyer,
    Seller,
}

impl UserRole {
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Buyer => "buyer",
            UserRole::Seller => "seller",
        }
    }
}

/// A recurring weekly period during which the seller cannot receive visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("slot must end after it starts ({start} >= {end})")]
    EmptyRange { start: NaiveTime, end: NaiveTime },
    #[error("unrecognized day of week '{0}'")]
    UnknownDay(String),
    #[error("unrecognized time '{0}', expected HH:MM")]
    UnknownTime(String),
}

impl AvailabilitySlot {
    pub fn new(
        day: Weekday,
        start: NaiveTime,
        end: NaiveTime,
        description: Option<String>,
    ) -> Result<Self, SlotError> {
        if start >= end {
            return Err(SlotError::EmptyRange { start, end });
        }
        Ok(Self {
            day,
            start,
            end,
            description,
        })
    }

    /// Half-open interval overlap against a window on `day`.
    pub fn overlaps(&self, day: Weekday, start: NaiveTime, end: NaiveTime) -> bool {
        self.day == day && start < self.end && self.start < end
    }

    pub fn describe(&self) -> String {
        let base = format!(
            "{} de {} a {}",
            weekday_label(self.day),
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        );
        match &self.description {
            Some(description) if !description.trim().is_empty() => {
                format!("{base} ({description})")
            }
            _ => base,
        }
    }
}

/// Parses English or Spanish day names, with or without accents or plural forms.
pub fn parse_weekday(raw: &str) -> Result<Weekday, SlotError> {
    let normalized: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect();
    let day = match normalized.trim_end_matches('s') {
        "monday" | "mon" | "lune" => Weekday::Mon,
        "tuesday" | "tue" | "marte" => Weekday::Tue,
        "wednesday" | "wed" | "miercole" => Weekday::Wed,
        "thursday" | "thu" | "jueve" => Weekday::Thu,
        "friday" | "fri" | "vierne" => Weekday::Fri,
        "saturday" | "sat" | "sabado" => Weekday::Sat,
        "sunday" | "sun" | "domingo" => Weekday::Sun,
        _ => return Err(SlotError::UnknownDay(raw.to_string())),
    };
    Ok(day)
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, SlotError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| SlotError::UnknownTime(raw.to_string()))
}

pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: String,
    pub role: UserRole,
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(phone: impl Into<String>, name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId::generate(),
            name: name.into(),
            phone: phone.into(),
            role,
            availability: Vec::new(),
            interests: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Adds slots that are not already present; returns how many were new.
    pub fn add_availability(&mut self, slots: impl IntoIterator<Item = AvailabilitySlot>) -> usize {
        let mut added = 0;
        for slot in slots {
            if !self.availability.contains(&slot) {
                self.availability.push(slot);
                added += 1;
            }
        }
        if added > 0 {
            self.updated_at = Some(Utc::now());
        }
        added
    }

    /// Busy slots overlapping the requested window. Windows crossing midnight are split per day.
    pub fn conflicts(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&AvailabilitySlot> {
        if end <= start {
            return Vec::new();
        }
        let mut segments = Vec::new();
        let mut cursor = start;
        while cursor.date() < end.date() {
            segments.push((cursor.weekday(), cursor.time(), NaiveTime::MIN, true));
            cursor = match cursor.date().succ_opt() {
                Some(next) => next.and_time(NaiveTime::MIN),
                None => break,
            };
        }
        segments.push((cursor.weekday(), cursor.time(), end.time(), false));

        self.availability
            .iter()
            .filter(|slot| {
                segments.iter().any(|(day, from, to, open_ended)| {
                    if *open_ended {
                        slot.day == *day && *from < slot.end
                    } else {
                        slot.overlaps(*day, *from, *to)
                    }
                })
            })
            .collect()
    }

    pub fn is_available(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.conflicts(start, end).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn saturday_at(h: u32, m: u32) -> NaiveDateTime {
        // 2025-08-23 is a Saturday.
        NaiveDate::from_ymd_opt(2025, 8, 23)
            .expect("valid date")
            .and_hms_opt(h, m, 0)
            .expect("valid time")
    }

    fn seller_with_saturday_block() -> User {
        let mut user = User::new("573001234567", "Ana", UserRole::Seller);
        user.add_availability([AvailabilitySlot::new(
            Weekday::Sat,
            time(14, 0),
            time(16, 0),
            Some("almuerzo familiar".to_string()),
        )
        .expect("valid slot")]);
        user
    }

    #[test]
    fn rejects_visit_overlapping_busy_slot_on_same_weekday() {
        let seller = seller_with_saturday_block();
        assert!(!seller.is_available(saturday_at(15, 0), saturday_at(16, 0)));
        assert!(!seller.is_available(saturday_at(13, 30), saturday_at(14, 30)));
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        let seller = seller_with_saturday_block();
        assert!(seller.is_available(saturday_at(16, 0), saturday_at(17, 0)));
        assert!(seller.is_available(saturday_at(13, 0), saturday_at(14, 0)));
    }

    #[test]
    fn other_weekdays_are_free() {
        let seller = seller_with_saturday_block();
        let sunday = saturday_at(15, 0) + chrono::Duration::days(1);
        assert!(seller.is_available(sunday, sunday + chrono::Duration::hours(1)));
    }

    #[test]
    fn windows_crossing_midnight_check_both_days() {
        let mut seller = User::new("1", "Ana", UserRole::Seller);
        seller.add_availability([
            AvailabilitySlot::new(Weekday::Sun, time(0, 0), time(1, 0), None).expect("valid slot"),
        ]);
        let start = saturday_at(23, 30);
        assert!(!seller.is_available(start, start + chrono::Duration::hours(1)));
    }

    #[test]
    fn add_availability_skips_duplicates() {
        let mut seller = seller_with_saturday_block();
        let duplicate = seller.availability[0].clone();
        assert_eq!(seller.add_availability([duplicate]), 0);
        assert_eq!(seller.availability.len(), 1);
    }

    #[test]
    fn slot_requires_positive_range() {
        assert!(matches!(
            AvailabilitySlot::new(Weekday::Mon, time(10, 0), time(9, 0), None),
            Err(SlotError::EmptyRange { .. })
        ));
    }

    #[test]
    fn parses_spanish_and_english_days() {
        assert_eq!(parse_weekday("Sábados"), Ok(Weekday::Sat));
        assert_eq!(parse_weekday("miércoles"), Ok(Weekday::Wed));
        assert_eq!(parse_weekday("Monday"), Ok(Weekday::Mon));
        assert!(parse_weekday("someday").is_err());
        assert_eq!(parse_time("14:30"), Ok(time(14, 30)));
    }

    #[test]
    fn describe_renders_spanish_labels() {
        let seller = seller_with_saturday_block();
        assert_eq!(
            seller.availability[0].describe(),
            "sábado de 14:00 a 16:00 (almuerzo familiar)"
        );
    }
}
