//! Store-changes → account-directory reconciliation.
//!
//! The changes feed is the fresher of the two sources for a fixed set of
//! store-settings fields. For every directory record whose client appears
//! in the changes feed, those fields are replaced by the change value, but
//! only when the change record actually carries the field. Absence falls
//! back to the directory value; an explicit value always wins, even a zero
//! fee or an empty-looking flag.

use std::collections::BTreeMap;

use pulse_core::TypedRecord;
use pulse_sources::DIRECTORY_OVERRIDE_FIELDS;

/// Patch directory records with change-feed values. Records without a
/// matching change row pass through untouched. Never fails: a key missing
/// on either side is defined behavior, not an error.
pub fn reconcile(
    directory: &BTreeMap<String, TypedRecord>,
    changes: &BTreeMap<String, TypedRecord>,
) -> BTreeMap<String, TypedRecord> {
    directory
        .iter()
        .map(|(key, record)| {
            let patched = match changes.get(key) {
                Some(change) => apply_overrides(record, change),
                None => record.clone(),
            };
            (key.clone(), patched)
        })
        .collect()
}

fn apply_overrides(record: &TypedRecord, change: &TypedRecord) -> TypedRecord {
    let mut patched = record.clone();
    for field in DIRECTORY_OVERRIDE_FIELDS {
        if let Some(value) = change.get(field) {
            patched.insert(field, value.clone());
        }
    }
    patched
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::CellValue;

    fn record(fields: &[(&str, CellValue)]) -> TypedRecord {
        let mut rec = TypedRecord::new();
        for (field, value) in fields {
            rec.insert(*field, value.clone());
        }
        rec
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn present_change_values_override_directory_values() {
        let mut directory = BTreeMap::new();
        directory.insert(
            "Acme".to_string(),
            record(&[
                ("shipping_method", text("Ground")),
                ("handling_fee", CellValue::Number(5.0)),
            ]),
        );
        let mut changes = BTreeMap::new();
        changes.insert(
            "Acme".to_string(),
            record(&[("shipping_method", text("Freight"))]),
        );

        let patched = reconcile(&directory, &changes);
        let acme = patched.get("Acme").unwrap();
        assert_eq!(acme.text("shipping_method"), Some("Freight"));
        // Field absent from the change record falls back.
        assert_eq!(acme.number("handling_fee"), Some(5.0));
    }

    #[test]
    fn explicit_zero_overrides_a_nonzero_directory_value() {
        let mut directory = BTreeMap::new();
        directory.insert(
            "Acme".to_string(),
            record(&[("handling_fee", CellValue::Number(5.0))]),
        );
        let mut changes = BTreeMap::new();
        changes.insert(
            "Acme".to_string(),
            record(&[("handling_fee", CellValue::Number(0.0))]),
        );

        let patched = reconcile(&directory, &changes);
        assert_eq!(patched.get("Acme").unwrap().number("handling_fee"), Some(0.0));
    }

    #[test]
    fn unmatched_records_pass_through_unmodified() {
        let mut directory = BTreeMap::new();
        directory.insert(
            "Zenith".to_string(),
            record(&[("shipping_method", text("Ground"))]),
        );
        let mut changes = BTreeMap::new();
        changes.insert(
            "Acme".to_string(),
            record(&[("shipping_method", text("Freight"))]),
        );

        let patched = reconcile(&directory, &changes);
        assert_eq!(patched.len(), 1);
        assert_eq!(
            patched.get("Zenith").unwrap().text("shipping_method"),
            Some("Ground")
        );
    }

    #[test]
    fn fields_outside_the_allow_list_never_move_over() {
        let mut directory = BTreeMap::new();
        directory.insert(
            "Acme".to_string(),
            record(&[("store_url", text("https://acme.example"))]),
        );
        let mut changes = BTreeMap::new();
        changes.insert(
            "Acme".to_string(),
            record(&[("store_url", text("https://evil.example"))]),
        );

        let patched = reconcile(&directory, &changes);
        assert_eq!(
            patched.get("Acme").unwrap().text("store_url"),
            Some("https://acme.example")
        );
    }
}
