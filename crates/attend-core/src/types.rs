use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Face embedding vector (128-dimensional for the default encoder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Encoder that produced this embedding, when the encoder reports one.
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Distances are only comparable between embeddings produced by the same
    /// encoder. Both vectors must have the same dimensionality.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// An enrolled identity with its reference embedding.
///
/// Records are never edited in place; re-enrollment is delete + add.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: i64,
    /// Unique employee code.
    pub code: String,
    pub display_name: String,
    pub department: String,
    pub embedding: Embedding,
    pub created_at: NaiveDateTime,
}

/// Enrollment input, before a face has been encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub code: String,
    pub display_name: String,
    pub department: String,
}

impl NewIdentity {
    /// Build from raw form input, trimming surrounding whitespace.
    pub fn new(code: &str, display_name: &str, department: &str) -> Self {
        Self {
            code: code.trim().to_string(),
            display_name: display_name.trim().to_string(),
            department: department.trim().to_string(),
        }
    }

    /// Name of the first required field that is empty, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.code.is_empty() {
            Some("code")
        } else if self.display_name.is_empty() {
            Some("name")
        } else {
            None
        }
    }
}

/// One successful identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub identity_id: i64,
    pub timestamp: NaiveDateTime,
    pub source_device: String,
}

/// A scan event joined with the identity metadata used in reports.
///
/// `name` and `department` are `None` when the identity was deleted after
/// the event was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub identity_id: i64,
    pub name: Option<String>,
    pub department: Option<String>,
    pub timestamp: NaiveDateTime,
    pub source_device: String,
}

impl AttendanceEntry {
    /// Calendar date of the scan, taken from the timestamp's local date as-is.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}
