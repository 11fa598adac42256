//! The refresh orchestrator.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pulse_core::{CellValue, TypedRecord};
use pulse_fetch::{
    RawArchive, SheetsClient, SheetsClientConfig, StaticToken, TableFetcher,
};
use pulse_sources::{normalize, Normalized, SchemaRegistry, SourceId};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, SourceRegistry};
use crate::reconcile::reconcile;
use crate::store::SnapshotStore;

/// One slot in the refresh sequence, with the sources that must already
/// have run before it.
#[derive(Debug, Clone, Copy)]
pub struct SourcePlan {
    pub source: SourceId,
    pub after: &'static [SourceId],
}

/// The full refresh sequence. Executed top to bottom; the `after` edges
/// make the two real ordering constraints explicit so a parallelizing
/// scheduler could topo-sort instead of trusting array order.
pub const REFRESH_PLAN: &[SourcePlan] = &[
    SourcePlan { source: SourceId::Directory, after: &[] },
    SourcePlan { source: SourceId::Performance, after: &[] },
    SourcePlan { source: SourceId::KeyContacts, after: &[] },
    SourcePlan { source: SourceId::ItemsInFeed, after: &[] },
    // Feed status seeds a default entry per directory client.
    SourcePlan { source: SourceId::FeedStatus, after: &[SourceId::Directory] },
    SourcePlan { source: SourceId::PercentApproved, after: &[] },
    SourcePlan { source: SourceId::StoreStatus, after: &[] },
    // Store changes reconcile into the directory right after they land.
    SourcePlan { source: SourceId::StoreChanges, after: &[SourceId::Directory] },
    SourcePlan { source: SourceId::BudgetStatus, after: &[] },
    SourcePlan { source: SourceId::RevolutionLinks, after: &[] },
    SourcePlan { source: SourceId::SearchConsole, after: &[] },
    SourcePlan { source: SourceId::Analytics, after: &[] },
    SourcePlan { source: SourceId::Ads, after: &[] },
    SourcePlan { source: SourceId::Users, after: &[] },
];

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: BTreeMap<SourceId, SourceOutcome>,
    pub success_count: usize,
    /// A refresh is worth consuming only when both load-bearing sources
    /// (directory and performance) landed.
    pub usable: bool,
}

pub struct RefreshEngine {
    fetcher: Arc<dyn TableFetcher>,
    registry: SchemaRegistry,
    sources: SourceRegistry,
    store: Arc<SnapshotStore>,
    in_flight: AtomicBool,
}

impl RefreshEngine {
    pub fn new(fetcher: Arc<dyn TableFetcher>, sources: SourceRegistry) -> Self {
        Self {
            fetcher,
            registry: SchemaRegistry::new(),
            sources,
            store: Arc::new(SnapshotStore::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Run one refresh cycle. Returns `None` when a cycle is already in
    /// flight: the request is dropped, not queued, and the running cycle
    /// finishes undisturbed. There is no cancellation.
    pub async fn refresh(&self) -> Option<RefreshResult> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("refresh already in flight; dropping request");
            return None;
        }
        let result = self.run_cycle().await;
        self.in_flight.store(false, Ordering::SeqCst);
        Some(result)
    }

    async fn run_cycle(&self) -> RefreshResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "refresh cycle started");

        let mut outcomes = BTreeMap::new();
        for plan in REFRESH_PLAN {
            let source = plan.source;
            let outcome = match self.process_source(run_id, source).await {
                Ok(records) => {
                    debug!(%run_id, %source, records, "source refreshed");
                    self.store.record_success(source, Utc::now());
                    SourceOutcome {
                        success: true,
                        error: None,
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(%run_id, %source, error = %message, "source refresh failed");
                    self.store.record_error(source, message.clone());
                    SourceOutcome {
                        success: false,
                        error: Some(message),
                    }
                }
            };
            if source == SourceId::StoreChanges && outcome.success {
                self.reconcile_directory();
            }
            outcomes.insert(source, outcome);
        }

        let success_count = outcomes.values().filter(|o| o.success).count();
        let usable = SourceId::LOAD_BEARING
            .iter()
            .all(|source| outcomes.get(source).is_some_and(|o| o.success));
        let finished_at = Utc::now();
        info!(%run_id, success_count, usable, "refresh cycle finished");

        RefreshResult {
            run_id,
            started_at,
            finished_at,
            outcomes,
            success_count,
            usable,
        }
    }

    async fn process_source(&self, run_id: Uuid, source: SourceId) -> Result<usize> {
        let entry = self
            .sources
            .entry(source)
            .with_context(|| format!("{source} is not configured in sources.yaml"))?;
        if !entry.enabled {
            anyhow::bail!("{source} is disabled in sources.yaml");
        }

        let locator = entry.locator();
        let table = self
            .fetcher
            .fetch_table(run_id, source.as_str(), &locator, source.is_load_bearing())
            .await?;

        let schema = self.registry.schema(source);
        let mut normalized = normalize(schema, &table)?;
        if source == SourceId::FeedStatus {
            self.seed_feed_defaults(&mut normalized);
        }

        let records = normalized.record_count();
        self.store.publish(source, normalized);
        Ok(records)
    }

    /// Feed a locally-supplied CSV blob through `source`'s normalizer and
    /// publish the result, bypassing the remote fetch.
    pub fn ingest_csv(&self, source: SourceId, text: &str) -> Result<usize> {
        let table = pulse_fetch::parse::csv_table(text)?;
        let schema = self.registry.schema(source);
        let mut normalized = normalize(schema, &table)?;
        if source == SourceId::FeedStatus {
            self.seed_feed_defaults(&mut normalized);
        }
        let records = normalized.record_count();
        self.store.publish(source, normalized);
        self.store.record_success(source, Utc::now());
        Ok(records)
    }

    /// Every client the directory knows gets an explicit feed-status
    /// entry, so a client absent from the feed sheet reads as
    /// "Unknown" rather than missing.
    fn seed_feed_defaults(&self, normalized: &mut Normalized) {
        let Some(directory) = self.store.get(SourceId::Directory) else {
            return;
        };
        let Some(clients) = directory.as_single() else {
            return;
        };
        let Normalized::Single(feed) = normalized else {
            return;
        };
        for client in clients.keys() {
            feed.entry(client.clone()).or_insert_with(|| {
                let mut record = TypedRecord::new();
                record.insert("client", CellValue::Text(client.clone()));
                record.insert("status", CellValue::Text("Unknown".to_string()));
                record
            });
        }
    }

    /// Second write to the directory slot: the reconciled snapshot wins
    /// over the one published earlier in this same cycle.
    fn reconcile_directory(&self) {
        let (Some(directory), Some(changes)) = (
            self.store.get(SourceId::Directory),
            self.store.get(SourceId::StoreChanges),
        ) else {
            return;
        };
        let (Some(directory), Some(changes)) = (directory.as_single(), changes.as_single())
        else {
            return;
        };
        let patched = reconcile(directory, changes);
        info!(clients = patched.len(), "republished reconciled directory");
        self.store
            .publish(SourceId::Directory, Normalized::Single(patched));
    }
}

pub fn build_engine(config: &EngineConfig, sources: SourceRegistry) -> Result<RefreshEngine> {
    let token = Arc::new(StaticToken(config.api_token.clone()));
    let mut client = SheetsClient::new(
        SheetsClientConfig {
            base_url: config.api_base_url.clone(),
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            ..Default::default()
        },
        token,
    )?;
    if let Some(dir) = &config.archive_dir {
        client = client.with_archive(RawArchive::new(dir.clone()));
    }
    Ok(RefreshEngine::new(Arc::new(client), sources))
}

/// Build the cron scheduler when enabled. Overlapping firings are safe:
/// the in-flight guard turns them into no-ops.
pub async fn maybe_build_scheduler(
    engine: &Arc<RefreshEngine>,
    config: &EngineConfig,
) -> Result<Option<JobScheduler>> {
    if !config.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    for cron in [&config.refresh_cron_1, &config.refresh_cron_2] {
        let engine_for_job = engine.clone();
        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let engine = engine_for_job.clone();
            Box::pin(async move {
                if engine.refresh().await.is_none() {
                    warn!("scheduled refresh skipped; previous cycle still running");
                }
            })
        })
        .with_context(|| format!("creating scheduler job for cron {cron}"))?;
        sched.add(job).await.context("adding scheduler job")?;
    }
    Ok(Some(sched))
}
