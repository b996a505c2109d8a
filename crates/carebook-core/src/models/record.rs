//! Appointment record model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::fold_text;

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?:\s*([ap])\.?m\.?)?$").expect("Invalid regex")
});

/// Identifier of a record.
///
/// Fresh ids are UUID v7 strings (time-sortable). Ids read back from storage
/// are kept verbatim, including legacy numeric timestamp ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a new unique record ID using UUID v7
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("record id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}

/// Lifecycle status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    #[serde(alias = "upcoming", alias = "scheduled")]
    Pending,
    Confirmed,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl RecordStatus {
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed appointments are still going to happen.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "upcoming" | "scheduled" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(Error::InvalidInput(format!("unknown status '{other}'"))),
        }
    }
}

/// Content-derived identity used to spot the same logical appointment
/// created twice before a durable id is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    subject: String,
    counterpart: String,
    date: NaiveDate,
    time: String,
}

impl NaturalKey {
    pub fn new(subject: &str, counterpart: &str, date: NaiveDate, time: &str) -> Self {
        Self {
            subject: fold_text(subject),
            counterpart: fold_text(counterpart),
            date,
            time: normalize_clock_time(time),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.subject, self.counterpart, self.date, self.time
        )
    }
}

/// Normalize a clock time to 24-hour `HH:MM`.
///
/// Accepts `H:MM` with an optional `am`/`pm` suffix. Anything else is folded
/// (trimmed, collapsed, lowercased) and returned as-is.
pub fn normalize_clock_time(raw: &str) -> String {
    let folded = fold_text(raw);
    let Some(caps) = CLOCK_TIME.captures(&folded) else {
        return folded;
    };

    let (Ok(mut hour), Ok(minute)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
        return folded;
    };
    if minute > 59 {
        return folded;
    }

    match caps.get(3).map(|m| m.as_str()) {
        Some(meridiem) => {
            if hour == 0 || hour > 12 {
                return folded;
            }
            if meridiem == "a" && hour == 12 {
                hour = 0;
            } else if meridiem == "p" && hour != 12 {
                hour += 12;
            }
        }
        None if hour > 23 => return folded,
        None => {}
    }

    format!("{hour:02}:{minute:02}")
}

/// A stored appointment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier, immutable once assigned
    pub id: RecordId,
    #[serde(default)]
    pub status: RecordStatus,
    /// Who the appointment is for
    #[serde(alias = "patient")]
    pub subject: String,
    /// Who the appointment is with
    #[serde(alias = "doctor")]
    pub counterpart: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(alias = "date")]
    pub scheduled_date: NaiveDate,
    /// Clock time as entered by the producer
    #[serde(default, alias = "time")]
    pub scheduled_time: String,
    /// Creation timestamp (Unix ms)
    #[serde(default)]
    pub created_at: i64,
    /// Domain fields the sync layer does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Record {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(
            &self.subject,
            &self.counterpart,
            self.scheduled_date,
            &self.scheduled_time,
        )
    }
}

/// A record a producer wants stored; it may not have an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(alias = "patient")]
    pub subject: String,
    #[serde(alias = "doctor")]
    pub counterpart: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(alias = "date")]
    pub scheduled_date: NaiveDate,
    #[serde(default, alias = "time")]
    pub scheduled_time: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NewRecord {
    pub fn new(
        subject: impl Into<String>,
        counterpart: impl Into<String>,
        scheduled_date: NaiveDate,
        scheduled_time: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            status: None,
            subject: subject.into(),
            counterpart: counterpart.into(),
            specialty: None,
            scheduled_date,
            scheduled_time: scheduled_time.into(),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(
            &self.subject,
            &self.counterpart,
            self.scheduled_date,
            &self.scheduled_time,
        )
    }

    /// Reject candidates that cannot form a meaningful natural key.
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(Error::InvalidInput("subject cannot be empty".into()));
        }
        if self.counterpart.trim().is_empty() {
            return Err(Error::InvalidInput("counterpart cannot be empty".into()));
        }
        if self.id.as_ref().is_some_and(|id| id.as_str().trim().is_empty()) {
            return Err(Error::InvalidInput("record id cannot be empty".into()));
        }
        Ok(())
    }

    /// Finalize into a stored record.
    pub(crate) fn into_record(self, id: RecordId, created_at: i64) -> Record {
        Record {
            id,
            status: self.status.unwrap_or_default(),
            subject: self.subject.trim().to_string(),
            counterpart: self.counterpart.trim().to_string(),
            specialty: crate::util::normalize_text_option(self.specialty),
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time.trim().to_string(),
            created_at,
            extra: self.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_record_id_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn test_record_id_rejects_blank() {
        assert!("  ".parse::<RecordId>().is_err());
        assert_eq!("abc".parse::<RecordId>().unwrap().as_str(), "abc");
    }

    #[test]
    fn test_legacy_numeric_id_is_accepted() {
        let raw = r#"{"id":1712345678901,"doctor":"Dr. A","patient":"Sam","date":"2025-03-01","time":"10:00 AM"}"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id.as_str(), "1712345678901");
        assert_eq!(record.counterpart, "Dr. A");
        assert_eq!(record.subject, "Sam");
        assert_eq!(record.status, RecordStatus::Pending);
    }

    #[test]
    fn test_unknown_fields_round_trip_through_extra() {
        let raw = r#"{"id":"r1","status":"confirmed","subject":"Sam","counterpart":"Dr. A","scheduledDate":"2025-03-01","scheduledTime":"10:00","createdAt":5,"room":"B12","fee":40}"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record.extra.get("room"), Some(&Value::from("B12")));
        assert_eq!(record.extra.get("fee"), Some(&Value::from(40)));

        let back: Value = serde_json::to_value(&record).unwrap();
        assert_eq!(back["room"], Value::from("B12"));
        assert_eq!(back["scheduledTime"], Value::from("10:00"));
    }

    #[test]
    fn test_status_parse_and_aliases() {
        assert_eq!("Cancelled".parse::<RecordStatus>().unwrap(), RecordStatus::Cancelled);
        assert_eq!("canceled".parse::<RecordStatus>().unwrap(), RecordStatus::Cancelled);
        assert_eq!("upcoming".parse::<RecordStatus>().unwrap(), RecordStatus::Pending);
        assert!("rescheduled".parse::<RecordStatus>().is_err());

        let status: RecordStatus = serde_json::from_str("\"upcoming\"").unwrap();
        assert_eq!(status, RecordStatus::Pending);
        assert!(status.is_active());
        assert!(!RecordStatus::Completed.is_active());
    }

    #[test]
    fn test_normalize_clock_time() {
        assert_eq!(normalize_clock_time("10:00"), "10:00");
        assert_eq!(normalize_clock_time("9:05"), "09:05");
        assert_eq!(normalize_clock_time("2:30 PM"), "14:30");
        assert_eq!(normalize_clock_time("12:15 am"), "00:15");
        assert_eq!(normalize_clock_time("12:00 PM"), "12:00");
        assert_eq!(normalize_clock_time("  Morning "), "morning");
        assert_eq!(normalize_clock_time("25:00"), "25:00");
        assert_eq!(normalize_clock_time("13:00 pm"), "13:00 pm");
    }

    #[test]
    fn test_natural_key_ignores_case_spacing_and_clock_style() {
        let a = NewRecord::new("Sam  Lee", "Dr. A", date(2025, 3, 1), "2:30 PM");
        let b = NewRecord::new(" sam lee", "DR. A ", date(2025, 3, 1), "14:30");
        assert_eq!(a.natural_key(), b.natural_key());

        let c = NewRecord::new("Sam Lee", "Dr. A", date(2025, 3, 2), "14:30");
        assert_ne!(a.natural_key(), c.natural_key());
    }

    #[test]
    fn test_validate_rejects_blank_parties() {
        let blank_subject = NewRecord::new(" ", "Dr. A", date(2025, 3, 1), "10:00");
        assert!(blank_subject.validate().is_err());

        let blank_counterpart = NewRecord::new("Sam", "", date(2025, 3, 1), "10:00");
        assert!(blank_counterpart.validate().is_err());

        let ok = NewRecord::new("Sam", "Dr. A", date(2025, 3, 1), "10:00");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_into_record_defaults_status_and_trims() {
        let record = NewRecord::new(" Sam ", " Dr. A ", date(2025, 3, 1), " 10:00 ")
            .with_specialty("  ")
            .with_extra("room", "B12")
            .into_record(RecordId::from("r1"), 42);

        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.subject, "Sam");
        assert_eq!(record.counterpart, "Dr. A");
        assert_eq!(record.scheduled_time, "10:00");
        assert_eq!(record.specialty, None);
        assert_eq!(record.created_at, 42);
        assert_eq!(record.natural_key().to_string(), "sam|dr. a|2025-03-01|10:00");
    }
}
