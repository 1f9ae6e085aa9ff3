//! Fixture aggregates and the dataset used by the contract suite.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::aggregate::{Aggregate, FieldKind, QueryableField};
use uuid::Uuid;

/// A record with one field of every queryable kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRecord {
    /// Identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Integer value.
    pub value: i64,
    /// Category; mixed case on purpose.
    pub category: String,
    /// `active`, `inactive` or `pending`.
    pub status: String,
    /// Optional rating.
    pub score: Option<f64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

const SAMPLE_FIELDS: &[QueryableField] = &[
    QueryableField::new("name", FieldKind::Text),
    QueryableField::new("value", FieldKind::Number),
    QueryableField::new("category", FieldKind::Text),
    QueryableField::new("status", FieldKind::Text),
    QueryableField::new("score", FieldKind::Number),
    QueryableField::new("createdAt", FieldKind::Timestamp),
];

impl Aggregate for SampleRecord {
    const COLLECTION: &'static str = "sample_records";

    fn id(&self) -> Uuid {
        self.id
    }

    fn queryable_fields() -> &'static [QueryableField] {
        SAMPLE_FIELDS
    }
}

impl SampleRecord {
    /// Builds a record created at 10:00 UTC on the given day of January 2026.
    ///
    /// # Panics
    ///
    /// Panics if `day` is not a valid day of January 2026.
    #[must_use]
    pub fn new(
        id: Uuid,
        name: &str,
        value: i64,
        category: &str,
        status: &str,
        score: Option<f64>,
        day: u32,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            value,
            category: category.to_owned(),
            status: status.to_owned(),
            score,
            created_at: Utc.with_ymd_and_hms(2026, 1, day, 10, 0, 0).unwrap(),
        }
    }
}

/// A second aggregate type, used to check writes spanning two
/// repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleNote {
    /// Identifier.
    pub id: Uuid,
    /// The record this note belongs to.
    pub record_id: Uuid,
    /// Note text.
    pub body: String,
}

const NOTE_FIELDS: &[QueryableField] = &[
    QueryableField::new("recordId", FieldKind::Uuid),
    QueryableField::new("body", FieldKind::Text),
];

impl Aggregate for SampleNote {
    const COLLECTION: &'static str = "sample_notes";

    fn id(&self) -> Uuid {
        self.id
    }

    fn queryable_fields() -> &'static [QueryableField] {
        NOTE_FIELDS
    }
}

/// Ten records created on consecutive days (`Item 1` on 2026-01-01 ...).
/// Ids run opposite to creation order so that id tiebreaks are visible.
/// Values 30 and scores 4.5 repeat; items 3 and 9 have no score.
#[must_use]
pub fn sample_dataset() -> Vec<SampleRecord> {
    let rows: [(&str, i64, &str, &str, Option<f64>); 10] = [
        ("Item 1", 10, "tools", "active", Some(4.5)),
        ("Item 2", 20, "garden", "inactive", Some(3.0)),
        ("Item 3", 30, "tools", "active", None),
        ("Item 4", 30, "kitchen", "active", Some(4.5)),
        ("Item 5", 50, "garden", "pending", Some(1.0)),
        ("Item 6", 60, "Tools", "active", Some(2.5)),
        ("Item 7", 70, "kitchen", "inactive", Some(5.0)),
        ("Item 8", 30, "garden", "active", Some(3.5)),
        ("Item 9", 90, "tools", "pending", None),
        ("Item 10", 100, "kitchen", "active", Some(0.5)),
    ];
    rows.iter()
        .zip(1_u32..)
        .map(|(&(name, value, category, status, score), day)| {
            SampleRecord::new(
                Uuid::from_u128(u128::from(11 - day)),
                name,
                value,
                category,
                status,
                score,
                day,
            )
        })
        .collect()
}
