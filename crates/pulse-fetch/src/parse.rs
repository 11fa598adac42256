//! Converts raw payloads into [`RawTable`] before interpretation.
//!
//! Two entry points: the remote values API body (`{"values": [[...]]}`,
//! first row headers), and a user-supplied RFC4180 CSV blob for processors
//! driven from a local file instead of a remote source.

use pulse_core::RawTable;
use serde::Deserialize;

use crate::FetchError;

#[derive(Debug, Deserialize)]
struct ValuesBody {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Parse the values-API response body. A missing or empty `values` array
/// means the sheet has no header row and is permanently unusable.
pub fn values_table(body: &[u8]) -> Result<RawTable, FetchError> {
    let parsed: ValuesBody =
        serde_json::from_slice(body).map_err(|e| FetchError::MalformedBody(e.to_string()))?;
    let mut rows = parsed.values.into_iter();
    let Some(headers) = rows.next() else {
        return Err(FetchError::EmptyValues);
    };
    Ok(RawTable {
        headers,
        rows: rows.collect(),
    })
}

/// Parse a comma-separated blob with double-quote escaping (`""` for a
/// literal quote) into the same table shape the remote fetch produces.
pub fn csv_table(text: &str) -> Result<RawTable, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| FetchError::MalformedBody(e.to_string()))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let mut rows = records.into_iter();
    let Some(headers) = rows.next() else {
        return Err(FetchError::EmptyValues);
    };
    Ok(RawTable {
        headers,
        rows: rows.collect(),
    })
}
