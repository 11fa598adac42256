//! Core domain model for the Agency Pulse ingestion pipeline.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod coerce;

pub const CRATE_NAME: &str = "pulse-core";

/// Identifies one remote tabular source: a spreadsheet plus a tab or range.
/// Supplied by configuration at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    pub spreadsheet_id: String,
    pub range: String,
}

/// The literal result of a fetch, before any interpretation.
///
/// Rows may be ragged: the remote values API omits trailing empty cells, so
/// a missing cell reads as empty via [`RawTable::cell`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn cell<'a>(row: &'a [String], col: usize) -> &'a str {
        row.get(col).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank_row(row: &[String]) -> bool {
        row.iter().all(|cell| cell.trim().is_empty())
    }
}

/// A single coerced cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// One normalized row: coerced values keyed by target field name.
///
/// A record never mixes values from two sources. Fields whose source cell
/// was blank are absent, which is what reconciliation relies on to tell
/// "no value supplied" apart from an explicit zero or empty override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypedRecord {
    fields: BTreeMap<String, CellValue>,
}

impl TypedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: CellValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(CellValue::as_text)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(CellValue::as_number)
    }

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.fields.get(field).and_then(CellValue::as_date)
    }

    pub fn set_number(&mut self, field: impl Into<String>, value: f64) {
        self.fields.insert(field.into(), CellValue::Number(value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
