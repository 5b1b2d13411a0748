//! Output types: voter records, per-page diagnostics and response envelopes.
//!
//! Everything here is `Serialize` so the CLI (and any HTTP adapter built on
//! top of the library) can emit it as JSON unchanged. Optional record fields
//! are skipped when absent, so a record serialises with exactly the keys that
//! were recognised on the page.

use crate::error::{ErrorKind, ExtractionError, PageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Records ──────────────────────────────────────────────────────────────

/// Gender literal as printed on the roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "पुरुष")]
    Male,
    #[serde(rename = "महिला")]
    Female,
}

impl Gender {
    /// The Devanagari word used on the roll.
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "पुरुष",
            Gender::Female => "महिला",
        }
    }

    /// Parse the Devanagari literal.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "पुरुष" => Some(Gender::Male),
            "महिला" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured voter entry extracted from a page.
///
/// Built incrementally by the record segmenter. With the default
/// configuration every emitted record carries `name`, `surname`, `age` and
/// `house_number`; the remaining fields are present only when recognised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Last whitespace token of `name`; empty for single-token names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spouse_or_parent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_station_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_station_name: Option<String>,
    /// Weak identifier picked up by the fallback pattern. May be OCR noise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<String>,
}

impl VoterRecord {
    /// `true` when no field has been set.
    pub fn is_empty(&self) -> bool {
        *self == VoterRecord::default()
    }

    /// Whether `field` is present and, for text fields, non-empty.
    pub fn has(&self, field: RecordField) -> bool {
        fn text(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.is_empty())
        }
        match field {
            RecordField::Name => text(&self.name),
            RecordField::Surname => text(&self.surname),
            RecordField::Age => self.age.is_some(),
            RecordField::HouseNumber => text(&self.house_number),
            RecordField::Gender => self.gender.is_some(),
            RecordField::SpouseOrParentName => text(&self.spouse_or_parent_name),
            RecordField::SectionNumber => text(&self.section_number),
            RecordField::SectionName => text(&self.section_name),
            RecordField::PollingStationNumber => text(&self.polling_station_number),
            RecordField::PollingStationName => text(&self.polling_station_name),
            RecordField::TagNumber => text(&self.tag_number),
        }
    }

    /// A record is valid when it is non-empty and carries every required field.
    pub fn is_valid(&self, required: &[RecordField]) -> bool {
        !self.is_empty() && required.iter().all(|f| self.has(*f))
    }
}

/// Names of the record fields, used for the required-field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Name,
    Surname,
    Age,
    HouseNumber,
    Gender,
    SpouseOrParentName,
    SectionNumber,
    SectionName,
    PollingStationNumber,
    PollingStationName,
    TagNumber,
}

impl RecordField {
    pub const ALL: [RecordField; 11] = [
        RecordField::Name,
        RecordField::Surname,
        RecordField::Age,
        RecordField::HouseNumber,
        RecordField::Gender,
        RecordField::SpouseOrParentName,
        RecordField::SectionNumber,
        RecordField::SectionName,
        RecordField::PollingStationNumber,
        RecordField::PollingStationName,
        RecordField::TagNumber,
    ];

    /// The JSON key of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordField::Name => "name",
            RecordField::Surname => "surname",
            RecordField::Age => "age",
            RecordField::HouseNumber => "house_number",
            RecordField::Gender => "gender",
            RecordField::SpouseOrParentName => "spouse_or_parent_name",
            RecordField::SectionNumber => "section_number",
            RecordField::SectionName => "section_name",
            RecordField::PollingStationNumber => "polling_station_number",
            RecordField::PollingStationName => "polling_station_name",
            RecordField::TagNumber => "tag_number",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        RecordField::ALL
            .into_iter()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| format!("unknown record field '{}'", s.trim()))
    }
}

// ── Diagnostics ──────────────────────────────────────────────────────────

/// Per-page extraction diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Valid records emitted from this page.
    pub record_count: usize,
    /// Non-empty blocks dropped because a required field was missing.
    pub discarded_blocks: usize,
    /// `true` when the page produced zero valid records.
    pub no_match: bool,
    /// Characters of OCR text recognised on the page.
    pub text_chars: usize,
    /// Normalise + recognise + segment time for this page.
    pub duration_ms: u64,
    /// Set only for pages skipped under `PageFailurePolicy::Skip`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

/// Document-level totals and timings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages handed to the aggregator.
    pub total_pages: usize,
    /// Pages that went through recognition without error.
    pub processed_pages: usize,
    /// Pages skipped after a failure (`PageFailurePolicy::Skip` only).
    pub failed_pages: usize,
    /// Processed pages that yielded zero records.
    pub no_match_pages: usize,
    pub total_records: usize,
    pub discarded_blocks: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub recognition_duration_ms: u64,
}

/// Result of a successful extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Records in page order, then emission order within the page.
    pub records: Vec<VoterRecord>,
    pub pages: Vec<PageReport>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Human-readable diagnostics for pages that contributed nothing.
    pub fn warnings(&self) -> Vec<String> {
        self.pages
            .iter()
            .filter_map(|p| match (&p.error, p.no_match) {
                (Some(e), _) => Some(format!("Page {} skipped: {}", p.page_num, e.detail)),
                (None, true) => Some(format!("No match found on page {}", p.page_num)),
                (None, false) => None,
            })
            .collect()
    }

    /// Wrap into the success envelope.
    pub fn into_response(self) -> ExtractionResponse {
        ExtractionResponse::success(self)
    }
}

/// PDF document metadata, read without rasterising any page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}

// ── Envelopes ────────────────────────────────────────────────────────────

/// Success payload: `{status, data, message, warnings?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub status: String,
    pub data: Vec<VoterRecord>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl ExtractionResponse {
    pub fn success(output: ExtractionOutput) -> Self {
        let warnings = output.warnings();
        let message = format!(
            "Extracted {} records from {} pages",
            output.records.len(),
            output.stats.total_pages
        );
        Self {
            status: "success".to_string(),
            data: output.records,
            message,
            warnings: if warnings.is_empty() {
                None
            } else {
                Some(warnings)
            },
        }
    }
}

/// Error payload: `{status, kind, code, detail}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub kind: ErrorKind,
    pub code: u16,
    pub detail: String,
}

impl From<&ExtractionError> for ErrorResponse {
    fn from(err: &ExtractionError) -> Self {
        let kind = err.kind();
        Self {
            status: "error".to_string(),
            kind,
            code: kind.status_code(),
            detail: err.to_string(),
        }
    }
}
