//! Engine configuration: environment variables for the process-level
//! knobs, `sources.yaml` for the per-source locators.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pulse_core::SourceLocator;
use pulse_sources::SourceId;
use serde::Deserialize;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub api_token: String,
    pub archive_dir: Option<PathBuf>,
    pub scheduler_enabled: bool,
    pub refresh_cron_1: String,
    pub refresh_cron_2: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub workspace_root: PathBuf,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var("PULSE_API_BASE_URL")
                .unwrap_or_else(|_| pulse_fetch::DEFAULT_BASE_URL.to_string()),
            api_token: std::env::var("PULSE_API_TOKEN").unwrap_or_default(),
            archive_dir: std::env::var("PULSE_ARCHIVE_DIR").ok().map(PathBuf::from),
            scheduler_enabled: std::env::var("PULSE_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            refresh_cron_1: std::env::var("REFRESH_CRON_1")
                .unwrap_or_else(|_| "0 6 * * *".to_string()),
            refresh_cron_2: std::env::var("REFRESH_CRON_2")
                .unwrap_or_else(|_| "0 18 * * *".to_string()),
            user_agent: std::env::var("PULSE_USER_AGENT")
                .unwrap_or_else(|_| "agency-pulse/0.1".to_string()),
            http_timeout_secs: std::env::var("PULSE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            workspace_root: PathBuf::from("."),
        }
    }
}

/// One entry in `sources.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub source: SourceId,
    pub spreadsheet_id: String,
    pub range: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl SourceEntry {
    pub fn locator(&self) -> SourceLocator {
        SourceLocator {
            spreadsheet_id: self.spreadsheet_id.clone(),
            range: self.range.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SourceRegistryFile {
    sources: Vec<SourceEntry>,
}

/// The configured source locators, keyed by source id.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    entries: BTreeMap<SourceId, SourceEntry>,
}

impl SourceRegistry {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: SourceRegistryFile = serde_yaml::from_str(text)?;
        Ok(Self::from_entries(file.sources))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = SourceEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.source, entry))
                .collect(),
        }
    }

    pub fn entry(&self, source: SourceId) -> Option<&SourceEntry> {
        self.entries.get(&source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
