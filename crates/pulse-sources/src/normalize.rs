//! Applies a [`SourceSchema`] to a [`RawTable`].

use std::collections::BTreeMap;

use pulse_core::{RawTable, TypedRecord};
use thiserror::Error;
use tracing::debug;

use crate::schema::{FieldSpec, SourceSchema};

/// Schema validation failure. The message is user-facing and source
/// specific; missing names appear in schema declaration order, so the
/// text is identical on every run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Missing required headers: {}.", .missing.join(", "))]
    MissingHeaders { missing: Vec<String> },
}

/// Normalized output for one source.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// One current record per key; later rows overwrite earlier ones.
    Single(BTreeMap<String, TypedRecord>),
    /// An ordered history of records per key.
    Series(BTreeMap<String, Vec<TypedRecord>>),
}

impl Normalized {
    pub fn key_count(&self) -> usize {
        match self {
            Normalized::Single(map) => map.len(),
            Normalized::Series(map) => map.len(),
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            Normalized::Single(map) => map.len(),
            Normalized::Series(map) => map.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }

    pub fn as_single(&self) -> Option<&BTreeMap<String, TypedRecord>> {
        match self {
            Normalized::Single(map) => Some(map),
            Normalized::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&BTreeMap<String, Vec<TypedRecord>>> {
        match self {
            Normalized::Series(map) => Some(map),
            Normalized::Single(_) => None,
        }
    }
}

/// Convert raw rows into typed records per `schema`.
///
/// Fully blank rows and rows without a key value are dropped, never
/// reported; a sheet author's separator row is indistinguishable from a
/// data-entry mistake at this layer. Headers the schema does not map are
/// ignored, so sources may carry extra columns.
pub fn normalize(schema: &SourceSchema, table: &RawTable) -> Result<Normalized, NormalizeError> {
    let columns = resolve_columns(schema, &table.headers)?;
    let key_column = columns
        .iter()
        .find(|(_, spec)| spec.field == schema.key_field)
        .map(|(idx, _)| *idx)
        .expect("key field is a required column");

    let mut singles: BTreeMap<String, TypedRecord> = BTreeMap::new();
    let mut series: BTreeMap<String, Vec<TypedRecord>> = BTreeMap::new();
    let mut dropped_keyless = 0usize;

    for row in &table.rows {
        if RawTable::is_blank_row(row) {
            continue;
        }
        let key = RawTable::cell(row, key_column).trim().to_string();
        if key.is_empty() {
            dropped_keyless += 1;
            continue;
        }

        let mut record = TypedRecord::new();
        for (idx, spec) in &columns {
            let raw = RawTable::cell(row, *idx);
            if let Some(value) = spec.kind.coerce(raw) {
                record.insert(spec.field, value);
            }
            if spec.kind.is_numeric()
                && !raw.trim().is_empty()
                && !pulse_core::coerce::is_parsable_number(raw)
            {
                debug!(
                    source = %schema.source,
                    field = spec.field,
                    cell = raw,
                    "garbled numeric cell coerced to zero"
                );
            }
        }

        if let Some(hook) = schema.derive {
            hook(&mut record);
        }

        if schema.multi_valued {
            series.entry(key).or_default().push(record);
        } else {
            // Last row wins, same precedence the reconciler applies.
            singles.insert(key, record);
        }
    }

    if dropped_keyless > 0 {
        debug!(
            source = %schema.source,
            dropped = dropped_keyless,
            "dropped rows with no key value"
        );
    }

    if schema.multi_valued {
        if let Some(date_field) = schema.date_field {
            for records in series.values_mut() {
                // Stable: records without a parsable date keep input order
                // ahead of dated ones.
                records.sort_by_key(|record| record.date(date_field));
            }
        }
        Ok(Normalized::Series(series))
    } else {
        Ok(Normalized::Single(singles))
    }
}

fn resolve_columns<'a>(
    schema: &'a SourceSchema,
    headers: &[String],
) -> Result<Vec<(usize, &'a FieldSpec)>, NormalizeError> {
    let mut resolved = Vec::new();
    let mut missing = Vec::new();

    for spec in &schema.fields {
        match headers.iter().position(|header| spec.matcher.matches(header)) {
            Some(idx) => resolved.push((idx, spec)),
            None if spec.required => missing.push(spec.label.to_string()),
            None => {}
        }
    }

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(NormalizeError::MissingHeaders { missing })
    }
}
