//! Schema building blocks: source identifiers, header matchers, and
//! per-field coercion declarations.

use std::fmt;
use std::str::FromStr;

use pulse_core::{coerce, CellValue, TypedRecord};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fourteen business sources, in refresh order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    Directory,
    Performance,
    KeyContacts,
    ItemsInFeed,
    FeedStatus,
    PercentApproved,
    StoreStatus,
    StoreChanges,
    BudgetStatus,
    RevolutionLinks,
    SearchConsole,
    Analytics,
    Ads,
    Users,
}

impl SourceId {
    /// Fixed refresh order. The sequence is load-bearing: the directory
    /// runs before feed status, and store changes before reconciliation.
    pub const ALL: [SourceId; 14] = [
        SourceId::Directory,
        SourceId::Performance,
        SourceId::KeyContacts,
        SourceId::ItemsInFeed,
        SourceId::FeedStatus,
        SourceId::PercentApproved,
        SourceId::StoreStatus,
        SourceId::StoreChanges,
        SourceId::BudgetStatus,
        SourceId::RevolutionLinks,
        SourceId::SearchConsole,
        SourceId::Analytics,
        SourceId::Ads,
        SourceId::Users,
    ];

    /// A refresh without these two sources is not worth publishing.
    pub const LOAD_BEARING: [SourceId; 2] = [SourceId::Directory, SourceId::Performance];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Directory => "directory",
            SourceId::Performance => "performance",
            SourceId::KeyContacts => "key-contacts",
            SourceId::ItemsInFeed => "items-in-feed",
            SourceId::FeedStatus => "feed-status",
            SourceId::PercentApproved => "percent-approved",
            SourceId::StoreStatus => "store-status",
            SourceId::StoreChanges => "store-changes",
            SourceId::BudgetStatus => "budget-status",
            SourceId::RevolutionLinks => "revolution-links",
            SourceId::SearchConsole => "search-console",
            SourceId::Analytics => "analytics",
            SourceId::Ads => "ads",
            SourceId::Users => "users",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::Directory => "Account Directory",
            SourceId::Performance => "Performance Metrics",
            SourceId::KeyContacts => "Key Contacts",
            SourceId::ItemsInFeed => "Items in Feed",
            SourceId::FeedStatus => "Feed Status",
            SourceId::PercentApproved => "Percent Approved",
            SourceId::StoreStatus => "Store Status",
            SourceId::StoreChanges => "Store Changes",
            SourceId::BudgetStatus => "Budget Status",
            SourceId::RevolutionLinks => "Revolution Links",
            SourceId::SearchConsole => "Search Console",
            SourceId::Analytics => "Analytics",
            SourceId::Ads => "Ads",
            SourceId::Users => "Users",
        }
    }

    pub fn is_load_bearing(self) -> bool {
        Self::LOAD_BEARING.contains(&self)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown source id: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for SourceId {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceId::ALL
            .iter()
            .find(|id| id.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

/// How a field spec finds its column in the header row.
///
/// Most sources match trimmed header text verbatim. A few sheets are
/// maintained by different people who rename columns ("Client" vs "Client
/// Name"), so those schemas match case-insensitive patterns instead. Both
/// field resolution and required-header validation go through the same
/// matcher.
#[derive(Debug, Clone)]
pub enum HeaderMatcher {
    Exact(&'static str),
    Pattern(Regex),
}

impl HeaderMatcher {
    pub fn pattern(source: &'static str) -> Self {
        let re = Regex::new(&format!("(?i){source}")).expect("static header pattern compiles");
        HeaderMatcher::Pattern(re)
    }

    pub fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        match self {
            HeaderMatcher::Exact(want) => header == *want,
            HeaderMatcher::Pattern(re) => re.is_match(header),
        }
    }
}

/// Cell coercion rule. Numeric kinds never fail: malformed cells degrade
/// to zero per the coercion library. A blank cell yields no field at all,
/// which downstream reconciliation reads as "no value supplied".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceKind {
    Text,
    Integer,
    Currency,
    Percentage,
    Float,
    Date,
}

impl CoerceKind {
    pub fn coerce(self, raw: &str) -> Option<CellValue> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match self {
            CoerceKind::Text => Some(CellValue::Text(trimmed.to_string())),
            CoerceKind::Integer => Some(CellValue::Number(coerce::to_integer(Some(trimmed)))),
            CoerceKind::Currency => Some(CellValue::Number(coerce::to_currency(Some(trimmed)))),
            CoerceKind::Percentage => {
                Some(CellValue::Number(coerce::to_percentage(Some(trimmed))))
            }
            CoerceKind::Float => Some(CellValue::Number(coerce::to_float(Some(trimmed)))),
            CoerceKind::Date => coerce::to_date(trimmed).map(CellValue::Date),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            CoerceKind::Integer | CoerceKind::Currency | CoerceKind::Percentage | CoerceKind::Float
        )
    }
}

/// One header-to-field mapping. Declared once per source, never mutated.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Header text (or pattern label) as it appears in schema-error messages.
    pub label: &'static str,
    pub matcher: HeaderMatcher,
    pub field: &'static str,
    pub kind: CoerceKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn exact(header: &'static str, field: &'static str, kind: CoerceKind) -> Self {
        Self {
            label: header,
            matcher: HeaderMatcher::Exact(header),
            field,
            kind,
            required: false,
        }
    }

    pub fn pattern(
        label: &'static str,
        pattern: &'static str,
        field: &'static str,
        kind: CoerceKind,
    ) -> Self {
        Self {
            label,
            matcher: HeaderMatcher::pattern(pattern),
            field,
            kind,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Full declaration for one source.
#[derive(Debug, Clone)]
pub struct SourceSchema {
    pub source: SourceId,
    pub fields: Vec<FieldSpec>,
    /// Field that identifies the business entity a row belongs to.
    pub key_field: &'static str,
    /// Series sources sort each key's records ascending by this field.
    pub date_field: Option<&'static str>,
    /// One key, many dated records (series) vs one current record.
    pub multi_valued: bool,
    /// Post-coercion hook, run per record inside normalization.
    pub derive: Option<fn(&mut TypedRecord)>,
}
