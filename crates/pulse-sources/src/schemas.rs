//! The fourteen source declarations.
//!
//! Exact-match schemas mirror the canonical sheet headers verbatim. Four
//! sheets (items-in-feed, feed-status, percent-approved, store-status) are
//! maintained by different teams and drift on header wording, so their key
//! columns resolve by case-insensitive pattern instead.

use std::collections::BTreeMap;

use pulse_core::TypedRecord;

use crate::schema::CoerceKind::{Currency, Date, Float, Integer, Percentage, Text};
use crate::schema::{FieldSpec, SourceId, SourceSchema};

/// Compiled schemas for every source, built once at startup.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<SourceId, SourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let mut schemas = BTreeMap::new();
        for schema in [
            directory(),
            performance(),
            key_contacts(),
            items_in_feed(),
            feed_status(),
            percent_approved(),
            store_status(),
            store_changes(),
            budget_status(),
            revolution_links(),
            search_console(),
            analytics(),
            ads(),
            users(),
        ] {
            schemas.insert(schema.source, schema);
        }
        Self { schemas }
    }

    pub fn schema(&self, source: SourceId) -> &SourceSchema {
        self.schemas
            .get(&source)
            .expect("registry covers every source")
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory fields a store-changes row may override.
pub const DIRECTORY_OVERRIDE_FIELDS: [&str; 8] = [
    "shipping_method",
    "handling_fee",
    "signature_surcharge",
    "hazmat_surcharge",
    "po_box",
    "terms_conditions",
    "fitment_verification",
    "required_fields",
];

fn directory() -> SourceSchema {
    SourceSchema {
        source: SourceId::Directory,
        key_field: "client",
        date_field: None,
        multi_valued: false,
        derive: None,
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Account ID", "account_id", Text),
            FieldSpec::exact("Store URL", "store_url", Text),
            FieldSpec::exact("Shipping Method", "shipping_method", Text).required(),
            FieldSpec::exact("Handling Fee", "handling_fee", Currency),
            FieldSpec::exact("Signature Surcharge", "signature_surcharge", Currency),
            FieldSpec::exact("Hazmat Surcharge", "hazmat_surcharge", Currency),
            FieldSpec::exact("Ships to PO Box", "po_box", Text),
            FieldSpec::exact("Terms & Conditions", "terms_conditions", Text),
            FieldSpec::exact("Fitment Verification", "fitment_verification", Text),
            FieldSpec::exact("Required Fields", "required_fields", Text),
        ],
    }
}

fn performance() -> SourceSchema {
    SourceSchema {
        source: SourceId::Performance,
        key_field: "client",
        date_field: Some("month"),
        multi_valued: true,
        derive: Some(derive_performance),
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Month", "month", Date).required(),
            FieldSpec::exact("Revenue", "revenue", Currency).required(),
            FieldSpec::exact("PPC Spend", "ppc_spend", Currency).required(),
            FieldSpec::exact("Profit", "profit", Currency),
            FieldSpec::exact("Orders", "orders", Integer),
        ],
    }
}

/// Return on ad spend, margin, and per-order profit are computed during
/// normalization so every record leaves the pipeline already carrying them.
fn derive_performance(record: &mut TypedRecord) {
    let revenue = record.number("revenue").unwrap_or(0.0);
    let spend = record.number("ppc_spend").unwrap_or(0.0);
    let profit = record.number("profit").unwrap_or(0.0);
    let orders = record.number("orders").unwrap_or(0.0);

    let ratio = |numerator: f64, denominator: f64| {
        if denominator == 0.0 {
            0.0
        } else {
            numerator / denominator
        }
    };

    record.set_number("roas", ratio(revenue, spend));
    record.set_number("profit_margin", ratio(profit, revenue) * 100.0);
    record.set_number("profit_per_order", ratio(profit, orders));
}

fn key_contacts() -> SourceSchema {
    SourceSchema {
        source: SourceId::KeyContacts,
        key_field: "client",
        // Contacts carry no date; series order is input order.
        date_field: None,
        multi_valued: true,
        derive: None,
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Name", "name", Text).required(),
            FieldSpec::exact("Email", "email", Text),
            FieldSpec::exact("Phone", "phone", Text),
            FieldSpec::exact("Role", "role", Text),
        ],
    }
}

fn items_in_feed() -> SourceSchema {
    SourceSchema {
        source: SourceId::ItemsInFeed,
        key_field: "client",
        date_field: Some("date"),
        multi_valued: true,
        derive: None,
        fields: vec![
            FieldSpec::pattern("Client", r"\bclient\b", "client", Text).required(),
            FieldSpec::pattern("Date", r"\bdate\b", "date", Date).required(),
            FieldSpec::pattern("Items", r"\bitems\b", "items", Integer).required(),
        ],
    }
}

fn feed_status() -> SourceSchema {
    SourceSchema {
        source: SourceId::FeedStatus,
        key_field: "client",
        date_field: None,
        multi_valued: false,
        derive: None,
        fields: vec![
            FieldSpec::pattern("Client", r"\bclient\b", "client", Text).required(),
            FieldSpec::pattern("Status", r"\bstatus\b", "status", Text).required(),
            FieldSpec::pattern("Last Checked", r"\b(checked|date)\b", "last_checked", Date),
        ],
    }
}

fn percent_approved() -> SourceSchema {
    SourceSchema {
        source: SourceId::PercentApproved,
        key_field: "client",
        date_field: Some("date"),
        multi_valued: true,
        derive: None,
        fields: vec![
            FieldSpec::pattern("Client", r"\bclient\b", "client", Text).required(),
            FieldSpec::pattern("Date", r"\bdate\b", "date", Date).required(),
            FieldSpec::pattern("% Approved", r"\bapproved\b", "percent_approved", Percentage)
                .required(),
        ],
    }
}

fn store_status() -> SourceSchema {
    SourceSchema {
        source: SourceId::StoreStatus,
        key_field: "client",
        date_field: None,
        multi_valued: false,
        derive: None,
        fields: vec![
            FieldSpec::pattern("Client", r"\bclient\b", "client", Text).required(),
            FieldSpec::pattern("Status", r"\bstatus\b", "status", Text).required(),
            FieldSpec::pattern("Date", r"\bdate\b", "updated", Date),
        ],
    }
}

fn store_changes() -> SourceSchema {
    SourceSchema {
        source: SourceId::StoreChanges,
        key_field: "client",
        date_field: None,
        multi_valued: false,
        derive: None,
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Shipping Method", "shipping_method", Text),
            FieldSpec::exact("Handling Fee", "handling_fee", Currency),
            FieldSpec::exact("Signature Surcharge", "signature_surcharge", Currency),
            FieldSpec::exact("Hazmat Surcharge", "hazmat_surcharge", Currency),
            FieldSpec::exact("Ships to PO Box", "po_box", Text),
            FieldSpec::exact("Terms & Conditions", "terms_conditions", Text),
            FieldSpec::exact("Fitment Verification", "fitment_verification", Text),
            FieldSpec::exact("Required Fields", "required_fields", Text),
        ],
    }
}

fn budget_status() -> SourceSchema {
    SourceSchema {
        source: SourceId::BudgetStatus,
        key_field: "client",
        date_field: None,
        multi_valued: false,
        derive: None,
        fields: vec![
            FieldSpec::exact("Clients", "client", Text).required(),
            FieldSpec::exact("PPC", "ppc_budget", Currency).required(),
            FieldSpec::exact("Google", "google_spend", Currency),
            FieldSpec::exact("Bing", "bing_spend", Currency),
            FieldSpec::exact("% Spent", "percent_spent", Percentage),
            FieldSpec::exact("Target Spend", "target_spend", Percentage),
            FieldSpec::exact("Proj. Total Spend", "projected_total_spend", Percentage),
            FieldSpec::exact("Yesterday", "yesterday_spend", Currency),
            FieldSpec::exact("Rec. Daily Budget", "rec_daily_budget", Currency),
        ],
    }
}

fn revolution_links() -> SourceSchema {
    SourceSchema {
        source: SourceId::RevolutionLinks,
        key_field: "client",
        date_field: None,
        multi_valued: false,
        derive: None,
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Revolution URL", "revolution_url", Text).required(),
            FieldSpec::exact("Login", "login", Text),
        ],
    }
}

fn search_console() -> SourceSchema {
    SourceSchema {
        source: SourceId::SearchConsole,
        key_field: "client",
        date_field: Some("date"),
        multi_valued: true,
        derive: None,
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Date", "date", Date).required(),
            FieldSpec::exact("Clicks", "clicks", Integer).required(),
            FieldSpec::exact("Impressions", "impressions", Integer).required(),
            FieldSpec::exact("CTR", "ctr", Percentage),
            FieldSpec::exact("Position", "position", Float),
        ],
    }
}

fn analytics() -> SourceSchema {
    SourceSchema {
        source: SourceId::Analytics,
        key_field: "client",
        date_field: Some("date"),
        multi_valued: true,
        derive: None,
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Date", "date", Date).required(),
            FieldSpec::exact("Sessions", "sessions", Integer).required(),
            FieldSpec::exact("Users", "users", Integer),
            FieldSpec::exact("Transactions", "transactions", Integer),
            FieldSpec::exact("Revenue", "revenue", Currency),
            FieldSpec::exact("Conv. Rate", "conversion_rate", Percentage),
        ],
    }
}

fn ads() -> SourceSchema {
    SourceSchema {
        source: SourceId::Ads,
        key_field: "client",
        date_field: Some("date"),
        multi_valued: true,
        derive: None,
        fields: vec![
            FieldSpec::exact("Client", "client", Text).required(),
            FieldSpec::exact("Date", "date", Date).required(),
            FieldSpec::exact("Cost", "cost", Currency).required(),
            FieldSpec::exact("Clicks", "clicks", Integer),
            FieldSpec::exact("Impressions", "impressions", Integer),
            FieldSpec::exact("Conversions", "conversions", Float),
            FieldSpec::exact("Conv. Value", "conversion_value", Currency),
        ],
    }
}

fn users() -> SourceSchema {
    SourceSchema {
        source: SourceId::Users,
        key_field: "email",
        date_field: None,
        multi_valued: false,
        derive: None,
        fields: vec![
            FieldSpec::exact("Email", "email", Text).required(),
            FieldSpec::exact("Name", "name", Text),
            FieldSpec::exact("Role", "role", Text),
            FieldSpec::exact("Active", "active", Text),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::CellValue;

    #[test]
    fn registry_covers_every_source() {
        let registry = SchemaRegistry::new();
        for source in SourceId::ALL {
            let schema = registry.schema(source);
            assert_eq!(schema.source, source);
            // Every schema's key field is a required column.
            let key_spec = schema
                .fields
                .iter()
                .find(|spec| spec.field == schema.key_field)
                .unwrap_or_else(|| panic!("{source} schema lacks its key field"));
            assert!(key_spec.required, "{source} key field must be required");
        }
    }

    #[test]
    fn series_schemas_declare_their_sort_column() {
        let registry = SchemaRegistry::new();
        for source in [
            SourceId::Performance,
            SourceId::ItemsInFeed,
            SourceId::PercentApproved,
            SourceId::SearchConsole,
            SourceId::Analytics,
            SourceId::Ads,
        ] {
            let schema = registry.schema(source);
            assert!(schema.multi_valued);
            assert!(schema.date_field.is_some(), "{source} needs a date field");
        }
    }

    #[test]
    fn override_fields_exist_in_both_directory_and_changes_schemas() {
        let registry = SchemaRegistry::new();
        for field in DIRECTORY_OVERRIDE_FIELDS {
            for source in [SourceId::Directory, SourceId::StoreChanges] {
                assert!(
                    registry
                        .schema(source)
                        .fields
                        .iter()
                        .any(|spec| spec.field == field),
                    "{source} schema missing override field {field}"
                );
            }
        }
    }

    #[test]
    fn performance_derivations_guard_their_zero_denominators() {
        let mut record = TypedRecord::new();
        record.set_number("revenue", 5000.0);
        record.set_number("ppc_spend", 1000.0);
        record.set_number("profit", 1500.0);
        record.set_number("orders", 50.0);
        derive_performance(&mut record);
        assert_eq!(record.number("roas"), Some(5.0));
        assert_eq!(record.number("profit_margin"), Some(30.0));
        assert_eq!(record.number("profit_per_order"), Some(30.0));

        let mut zeros = TypedRecord::new();
        zeros.insert("client", CellValue::Text("Acme".into()));
        derive_performance(&mut zeros);
        assert_eq!(zeros.number("roas"), Some(0.0));
        assert_eq!(zeros.number("profit_margin"), Some(0.0));
        assert_eq!(zeros.number("profit_per_order"), Some(0.0));
    }
}
