//! Refresh orchestration: runs every source processor in a fixed order,
//! isolates per-source failures, reconciles store changes into the
//! directory, and publishes complete snapshots for consumers.

pub mod config;
pub mod engine;
pub mod reconcile;
pub mod store;

pub use config::{EngineConfig, SourceEntry, SourceRegistry};
pub use engine::{
    build_engine, maybe_build_scheduler, RefreshEngine, RefreshResult, SourceOutcome, SourcePlan,
    REFRESH_PLAN,
};
pub use reconcile::reconcile;
pub use store::{SnapshotStore, SourceHealth};

pub const CRATE_NAME: &str = "pulse-sync";
