//! Resilient HTTP fetch for remote tabular sources.
//!
//! One [`SheetsClient`] serves every source. It retries transient failures
//! with exponential backoff, treats unusable payloads as permanent, and can
//! archive each raw response body before interpretation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use pulse_core::{RawTable, SourceLocator};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub mod archive;
pub mod parse;

pub use archive::{RawArchive, StoredPayload};

pub const CRATE_NAME: &str = "pulse-fetch";

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

/// Fetch failure taxonomy. Transient conditions are retried inside the
/// client; everything else escalates immediately.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus {
        status: u16,
        url: String,
        retryable: bool,
    },
    #[error("response body is not a values table: {0}")]
    MalformedBody(String),
    #[error("source returned no values")]
    EmptyValues,
    #[error("source has a header row but no data rows")]
    NoDataRows,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(err) => {
                classify_reqwest_error(err) == RetryDisposition::Retryable
            }
            FetchError::HttpStatus { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

/// Retry `op` on transient failures per `policy`. Attempt `n` sleeps
/// `base * 2^n` before attempt `n + 1`. Permanent errors and the final
/// attempt's error propagate unchanged.
pub async fn retry_with_backoff<T, F, Fut>(policy: BackoffPolicy, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0usize;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Supplies the bearer credential for the tabular API. Token acquisition
/// and refresh happen outside the pipeline.
pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn bearer_token(&self) -> String {
        self.0.clone()
    }
}

/// The transport seam the refresh orchestrator runs against.
#[async_trait]
pub trait TableFetcher: Send + Sync {
    /// Fetch one source's table. `require_rows` marks the load-bearing
    /// sources, for which a header-only sheet is a permanent failure
    /// rather than an empty table.
    async fn fetch_table(
        &self,
        run_id: Uuid,
        source_id: &str,
        locator: &SourceLocator,
        require_rows: bool,
    ) -> Result<RawTable, FetchError>;
}

#[derive(Debug, Clone)]
pub struct SheetsClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub backoff: BackoffPolicy,
}

impl Default for SheetsClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            user_agent: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    token: Arc<dyn TokenSource>,
    backoff: BackoffPolicy,
    archive: Option<RawArchive>,
}

impl SheetsClient {
    pub fn new(config: SheetsClientConfig, token: Arc<dyn TokenSource>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            backoff: config.backoff,
            archive: None,
        })
    }

    /// Archive every raw response body before it is interpreted.
    pub fn with_archive(mut self, archive: RawArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    fn values_url(&self, locator: &SourceLocator) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url, locator.spreadsheet_id, locator.range
        )
    }

    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.token.bearer_token())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
                retryable: classify_status(status) == RetryDisposition::Retryable,
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl TableFetcher for SheetsClient {
    async fn fetch_table(
        &self,
        run_id: Uuid,
        source_id: &str,
        locator: &SourceLocator,
        require_rows: bool,
    ) -> Result<RawTable, FetchError> {
        let span = info_span!(
            "sheet_fetch",
            %run_id,
            source_id,
            spreadsheet = %locator.spreadsheet_id,
            range = %locator.range,
        );
        async {
            let url = self.values_url(locator);
            let body = retry_with_backoff(self.backoff, || self.fetch_body(&url)).await?;

            if let Some(archive) = &self.archive {
                if let Err(err) = archive.store_bytes(Utc::now(), source_id, "json", &body).await {
                    warn!(error = %err, "failed to archive raw payload");
                }
            }

            let table = parse::values_table(&body)?;
            if table.rows.is_empty() && require_rows {
                return Err(FetchError::NoDataRows);
            }
            Ok(table)
        }
        .instrument(span)
        .await
    }
}
