//! Per-vendor adapters behind one `fetch(symbol, range)` contract

pub mod cnbc;
pub mod finnhub;
pub mod reddit;
pub mod sec_edgar;
pub mod yahoo;

pub use cnbc::{CnbcArticle, CnbcSource};
pub use finnhub::FinnhubSource;
pub use reddit::RedditSource;
pub use sec_edgar::SecEdgarSource;
pub use yahoo::YahooSource;

use crate::config::DataConfig;
use crate::error::Result;
use crate::model::{FetchRequest, Record, SourceKind};
use crate::ratelimit::RequestBudget;
use async_trait::async_trait;
use std::sync::Arc;

/// A third-party data source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Which vendor this adapter talks to
    fn kind(&self) -> SourceKind;

    /// Fetch every record for `request.symbol` inside `request.range`
    ///
    /// Implementations return records sorted by timestamp, already trimmed to
    /// the range and to `request.limit`.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>>;
}

/// Shared pieces every adapter is built from
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub client: reqwest::Client,
    pub config: Arc<DataConfig>,
    pub budget: Option<RequestBudget>,
}

impl SourceContext {
    pub fn new(config: Arc<DataConfig>) -> Result<Self> {
        Ok(Self {
            client: crate::http::build_client(&config)?,
            budget: RequestBudget::from_config(&config),
            config,
        })
    }
}

/// Construct the adapter for `kind`
///
/// Fails with `MissingCredential` when the vendor needs a key that isn't set.
pub fn build_source(kind: SourceKind, context: &SourceContext) -> Result<Arc<dyn DataSource>> {
    let source: Arc<dyn DataSource> = match kind {
        SourceKind::Yahoo => Arc::new(YahooSource::new(context)?),
        SourceKind::Finnhub => Arc::new(FinnhubSource::new(context)?),
        SourceKind::Reddit => Arc::new(RedditSource::new(context)?),
        SourceKind::SecEdgar => Arc::new(SecEdgarSource::new(context)),
        SourceKind::Cnbc => Arc::new(CnbcSource::new(context)),
    };
    Ok(source)
}

/// Keep records inside the range, oldest first, trimmed to the most recent `limit`
pub(crate) fn finalize(mut records: Vec<Record>, request: &FetchRequest) -> Vec<Record> {
    records.retain(|record| request.range.contains(record.timestamp));
    records.sort_by_key(|record| record.timestamp);

    if let Some(limit) = request.limit {
        if records.len() > limit {
            records.drain(..records.len() - limit);
        }
    }

    records
}
