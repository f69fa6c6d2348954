use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::identity::BatchId;
use super::status::BatchStatus;
use super::weight::Weight;

/// Quality grade of a batch, displayed as "Grade A+".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    APlus,
    A,
    B,
    C,
}

#[derive(Debug, Error)]
#[error("unknown quality grade: {0:?}")]
pub struct ParseGradeError(String);

impl Grade {
    pub fn label(&self) -> &'static str {
        match self {
            Grade::APlus => "Grade A+",
            Grade::A => "Grade A",
            Grade::B => "Grade B",
            Grade::C => "Grade C",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Grade {
    type Err = ParseGradeError;

    /// Accepts both the short form dashboards submit ("A+") and the stored
    /// label ("Grade A+").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.trim().strip_prefix("Grade ").unwrap_or(s.trim());
        match short {
            "A+" | "a+" => Ok(Grade::APlus),
            "A" | "a" => Ok(Grade::A),
            "B" | "b" => Ok(Grade::B),
            "C" | "c" => Ok(Grade::C),
            other => Err(ParseGradeError(other.to_string())),
        }
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Field sensor reading attached to a batch. Informational only; transition
/// logic never consults it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub soil_moisture: f64,
    pub humidity: f64,
    pub temperature: f64,
    pub gps_coordinates: String,
    pub captured_at: DateTime<Utc>,
}

/// One immutable record of a state change or notable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Label of the status transitioned into, or a sub-event label such as
    /// "Sensor Reading".
    pub status: String,
    pub note: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One produce lot moving through the supply chain. Persisted as a single
/// document with the audit trail embedded, so one read returns the full
/// history atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub id: BatchId,
    pub lot_number: Option<String>,
    /// Single-use secret authorizing the pending retailer confirmation;
    /// cleared by the transition it guards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_token: Option<String>,
    pub crop: String,
    pub quality: Grade,
    pub weight: Weight,
    pub price: Option<String>,
    pub farmer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retailer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retailer_contact: Option<String>,
    pub harvest_date: String,
    pub farm_location: Option<String>,
    pub status: BatchStatus,
    pub earnings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_data: Option<SensorReading>,
    pub tracking_history: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency version; bumped by the store on every
    /// successful save. Not part of the business data.
    #[serde(default)]
    pub revision: u64,
}

impl BatchRecord {
    /// Append one audit entry and refresh `updated_at`. The trail is
    /// append-only: existing entries are never rewritten.
    pub fn append_audit(
        &mut self,
        status: impl Into<String>,
        note: impl Into<String>,
        actor: impl Into<String>,
        location: Option<String>,
    ) {
        let now = Utc::now();
        self.tracking_history.push(AuditEntry {
            timestamp: now,
            status: status.into(),
            note: note.into(),
            actor: actor.into(),
            location,
        });
        self.updated_at = now;
    }

    /// Notes are append-only by convention.
    pub fn append_note(&mut self, text: &str) {
        match &mut self.notes {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(text);
            }
            None => self.notes = Some(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_record() -> BatchRecord {
        let now = Utc::now();
        BatchRecord {
            id: BatchId::new(),
            lot_number: Some("LOT-00001".to_string()),
            confirmation_token: None,
            crop: "Tomatoes".to_string(),
            quality: Grade::A,
            weight: Weight::kilograms(100.0),
            price: None,
            farmer: None,
            retailer: None,
            retailer_contact: None,
            harvest_date: "2024-01-15".to_string(),
            farm_location: None,
            status: BatchStatus::PendingVerification,
            earnings: None,
            qr_code: None,
            notes: None,
            sensor_data: None,
            tracking_history: vec![AuditEntry {
                timestamp: now,
                status: "Processing".to_string(),
                note: "Batch created".to_string(),
                actor: "John Smith (Farmer)".to_string(),
                location: None,
            }],
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    #[test]
    fn grade_parses_short_and_stored_forms() {
        assert_eq!("A+".parse::<Grade>().unwrap(), Grade::APlus);
        assert_eq!("Grade B".parse::<Grade>().unwrap(), Grade::B);
        assert!("D".parse::<Grade>().is_err());
    }

    #[test]
    fn append_audit_refreshes_updated_at() {
        let mut record = minimal_record();
        let before = record.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        record.append_audit("In Transit", "Picked up", "Distributor", None);
        assert_eq!(record.tracking_history.len(), 2);
        assert!(record.updated_at > before);
    }

    #[test]
    fn notes_accumulate() {
        let mut record = minimal_record();
        record.append_note("out of stock");
        record.append_note("call back next week");
        assert_eq!(
            record.notes.as_deref(),
            Some("out of stock\ncall back next week")
        );
    }

    #[test]
    fn document_uses_camel_case_field_names() {
        let record = minimal_record();
        let doc = serde_json::to_value(&record).unwrap();
        assert!(doc.get("lotNumber").is_some());
        assert!(doc.get("trackingHistory").is_some());
        assert!(doc.get("harvestDate").is_some());
        assert_eq!(doc["weight"], serde_json::json!("100 kg"));
        assert_eq!(doc["quality"], serde_json::json!("Grade A"));
    }
}
