//! Declarative source schemas + the normalizer that applies them.
//!
//! Each of the fourteen remote sources is described by a [`SourceSchema`]:
//! which headers map to which fields, how each cell coerces, which column
//! keys the row, and whether a key holds one record or a dated series.
//! [`normalize`] is the only row-interpretation code path; sources differ
//! by declaration, not by branching.

pub mod normalize;
pub mod schema;
pub mod schemas;

pub use normalize::{normalize, Normalized, NormalizeError};
pub use schema::{CoerceKind, FieldSpec, HeaderMatcher, SourceId, SourceSchema, UnknownSource};
pub use schemas::{SchemaRegistry, DIRECTORY_OVERRIDE_FIELDS};

pub const CRATE_NAME: &str = "pulse-sources";
