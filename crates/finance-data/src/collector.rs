//! Coordinator that fans a request out to many sources and merges the results
//!
//! Each source call goes through the same pipeline:
//! 1. Return cached records if the cache has this exact request
//! 2. Otherwise run the adapter under the retry policy, each attempt bounded
//!    by the per-source timeout
//! 3. Cache a successful result
//!
//! One source failing never aborts the others; its failure is recorded in the
//! [`CollectionReport`] instead.

use crate::cache::{CacheKey, RecordCache};
use crate::config::DataConfig;
use crate::error::{FinanceError, Result};
use crate::model::{DateRange, FetchRequest, Record, SourceKind, Symbol};
use crate::retry::RetryPolicy;
use crate::sources::{DataSource, SourceContext, build_source};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// How `collect` schedules its sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One source after another, in request order
    Sequential,
    /// All sources at once
    #[default]
    Concurrent,
}

/// Result of one source within a collection run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Succeeded,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOutcome {
    pub source: SourceKind,
    #[serde(flatten)]
    pub status: SourceStatus,
    /// Records this source returned, before merging
    pub records: usize,
    pub from_cache: bool,
    pub elapsed_ms: u64,
}

impl SourceOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == SourceStatus::Succeeded
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SourceStatus::Succeeded => None,
            SourceStatus::Failed { error } => Some(error),
        }
    }
}

/// Everything one `collect` call produced
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub run_id: Uuid,
    pub symbol: Symbol,
    pub range: DateRange,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per requested source, in request order
    pub outcomes: Vec<SourceOutcome>,
    /// Merged, de-duplicated records ordered by timestamp then source
    pub records: Vec<Record>,
}

impl CollectionReport {
    /// True when every requested source succeeded
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(SourceOutcome::succeeded)
    }

    pub fn failed_sources(&self) -> Vec<SourceKind> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.succeeded())
            .map(|outcome| outcome.source)
            .collect()
    }

    /// True when no source succeeded
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.succeeded())
    }
}

/// Merge per-source batches: first occurrence of each dedup key wins
fn merge(batches: impl IntoIterator<Item = Vec<Record>>) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Record> = batches
        .into_iter()
        .flatten()
        .filter(|record| seen.insert(record.dedup_key()))
        .collect();
    merged.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.source.cmp(&b.source))
    });
    merged
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Fans requests out to registered sources
pub struct Collector {
    sources: BTreeMap<SourceKind, Arc<dyn DataSource>>,
    /// Sources that could not be constructed, with the reason
    unavailable: BTreeMap<SourceKind, String>,
    mode: ExecutionMode,
    retry: RetryPolicy,
    cache: Option<RecordCache>,
    timeout: Duration,
}

impl Collector {
    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::default()
    }

    /// Build every source the configuration allows
    ///
    /// Sources missing credentials are skipped with a warning and reported
    /// as failures by `collect`.
    pub fn from_config(config: Arc<DataConfig>) -> Result<Self> {
        Self::with_sources(config, &SourceKind::ALL)
    }

    /// Like [`Collector::from_config`], restricted to `kinds` (all when empty)
    pub fn with_sources(config: Arc<DataConfig>, kinds: &[SourceKind]) -> Result<Self> {
        let kinds = if kinds.is_empty() { &SourceKind::ALL[..] } else { kinds };
        let context = SourceContext::new(Arc::clone(&config))?;
        let mut builder = Self::builder()
            .retry_policy(config.retry_policy())
            .timeout(config.request_timeout);

        if config.cache_enabled {
            builder = builder.cache(RecordCache::new(config.cache_ttl));
        }

        for &kind in kinds {
            match build_source(kind, &context) {
                Ok(source) => builder = builder.source(source),
                Err(e) => {
                    warn!(source = %kind, error = %e, "source unavailable");
                    builder = builder.unavailable(kind, e.to_string());
                }
            }
        }

        Ok(builder.build())
    }

    /// Registered sources, in display order
    pub fn sources(&self) -> Vec<SourceKind> {
        self.sources.keys().copied().collect()
    }

    /// Sources that were skipped at construction, with the reason
    pub fn unavailable(&self) -> &BTreeMap<SourceKind, String> {
        &self.unavailable
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fetch from a single source
    pub async fn fetch(&self, kind: SourceKind, request: &FetchRequest) -> Result<Vec<Record>> {
        self.fetch_tracked(kind, request)
            .await
            .map(|(records, _)| records)
    }

    /// Fetch from a single source, also reporting whether the cache answered
    pub async fn fetch_tracked(
        &self,
        kind: SourceKind,
        request: &FetchRequest,
    ) -> Result<(Vec<Record>, bool)> {
        let source = self.sources.get(&kind).ok_or(FinanceError::SourceNotConfigured(kind))?;
        let key = CacheKey::new(kind, request);

        if let Some(cache) = &self.cache {
            if let Some(records) = cache.get(&key).await {
                return Ok((records, true));
            }
        }

        let source = source.as_ref();
        let timeout = self.timeout;
        let operation = format!("{kind} fetch {}", request.symbol);
        let records = self
            .retry
            .execute(&operation, || async move {
                match tokio::time::timeout(timeout, source.fetch(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(FinanceError::Timeout {
                        vendor: kind,
                        after: timeout,
                    }),
                }
            })
            .await?;

        if let Some(cache) = &self.cache {
            cache.insert(key, records.clone()).await;
        }

        Ok((records, false))
    }

    async fn run_one(&self, kind: SourceKind, request: &FetchRequest) -> (SourceOutcome, Vec<Record>) {
        let started = Instant::now();

        let result = match self.unavailable.get(&kind) {
            Some(reason) => Err(FinanceError::Config(format!("{kind} unavailable: {reason}"))),
            None => self.fetch_tracked(kind, request).await,
        };

        match result {
            Ok((records, from_cache)) => {
                info!(
                    source = %kind,
                    symbol = %request.symbol,
                    records = records.len(),
                    from_cache,
                    "source succeeded"
                );
                let outcome = SourceOutcome {
                    source: kind,
                    status: SourceStatus::Succeeded,
                    records: records.len(),
                    from_cache,
                    elapsed_ms: elapsed_ms(started),
                };
                (outcome, records)
            }
            Err(e) => {
                warn!(source = %kind, symbol = %request.symbol, error = %e, "source failed");
                let outcome = SourceOutcome {
                    source: kind,
                    status: SourceStatus::Failed {
                        error: e.to_string(),
                    },
                    records: 0,
                    from_cache: false,
                    elapsed_ms: elapsed_ms(started),
                };
                (outcome, Vec::new())
            }
        }
    }

    /// Fetch from several sources and merge the results
    ///
    /// An empty `kinds` means every known source. Duplicate kinds are
    /// collapsed to their first occurrence.
    pub async fn collect(&self, request: &FetchRequest, kinds: &[SourceKind]) -> CollectionReport {
        let mut requested: Vec<SourceKind> = if kinds.is_empty() {
            SourceKind::ALL.to_vec()
        } else {
            kinds.to_vec()
        };
        let mut seen = HashSet::new();
        requested.retain(|kind| seen.insert(*kind));

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            %run_id,
            symbol = %request.symbol,
            range = %request.range,
            sources = requested.len(),
            mode = ?self.mode,
            "collection started"
        );

        let results = match self.mode {
            ExecutionMode::Concurrent => {
                join_all(requested.iter().map(|kind| self.run_one(*kind, request))).await
            }
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(requested.len());
                for kind in &requested {
                    results.push(self.run_one(*kind, request).await);
                }
                results
            }
        };

        let (outcomes, batches): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        let records = merge(batches);

        let report = CollectionReport {
            run_id,
            symbol: request.symbol.clone(),
            range: request.range,
            started_at,
            finished_at: Utc::now(),
            outcomes,
            records,
        };

        info!(
            %run_id,
            records = report.records.len(),
            failed = report.failed_sources().len(),
            "collection finished"
        );
        report
    }
}

/// Builder for [`Collector`]
pub struct CollectorBuilder {
    sources: BTreeMap<SourceKind, Arc<dyn DataSource>>,
    unavailable: BTreeMap<SourceKind, String>,
    mode: ExecutionMode,
    retry: RetryPolicy,
    cache: Option<RecordCache>,
    timeout: Duration,
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            unavailable: BTreeMap::new(),
            mode: ExecutionMode::default(),
            retry: RetryPolicy::default(),
            cache: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CollectorBuilder {
    /// Register a source; a later source of the same kind replaces an earlier one
    pub fn source(mut self, source: Arc<dyn DataSource>) -> Self {
        let kind = source.kind();
        self.unavailable.remove(&kind);
        self.sources.insert(kind, source);
        self
    }

    /// Record that a source could not be built
    pub fn unavailable(mut self, kind: SourceKind, reason: impl Into<String>) -> Self {
        self.unavailable.insert(kind, reason.into());
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(mut self, cache: RecordCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Upper bound on a single source attempt
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Collector {
        Collector {
            sources: self.sources,
            unavailable: self.unavailable,
            mode: self.mode,
            retry: self.retry,
            cache: self.cache,
            timeout: self.timeout,
        }
    }
}
