//! Financial data collection
//!
//! This crate gathers market data for a ticker from several third-party
//! sources behind one uniform contract. It includes:
//!
//! - Daily price history from Yahoo Finance
//! - Company news from Finnhub and CNBC
//! - Subreddit posts from Reddit
//! - Regulatory filings from SEC EDGAR
//! - Per-source and shared rate limiting, retries with backoff, and a TTL cache
//! - CSV and JSON file sinks
//!
//! # Architecture
//!
//! Every vendor is a [`DataSource`] answering `fetch(symbol, range)` with
//! normalized [`Record`]s. A [`Collector`] fans one request out to many
//! sources, isolates their failures, and merges the results into a
//! [`CollectionReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use finance_data::{Collector, DataConfig, DateRange, FetchRequest, Symbol};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(DataConfig::from_env()?);
//!     let collector = Collector::from_config(config)?;
//!
//!     let request = FetchRequest::new(
//!         Symbol::new("AAPL")?,
//!         DateRange::parse("2024-01-01", "2024-01-31")?,
//!     );
//!     let report = collector.collect(&request, &[]).await;
//!     println!("{} records", report.records.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod ratelimit;
pub mod retry;
pub mod sink;
pub mod sources;

// Re-export main types for convenience
pub use cache::{CacheKey, RecordCache};
pub use collector::{
    CollectionReport, Collector, CollectorBuilder, ExecutionMode, SourceOutcome, SourceStatus,
};
pub use config::{CREDENTIAL_KEYS, Credentials, DataConfig};
pub use error::{FinanceError, Result};
pub use model::{
    DateRange, FetchRequest, Filing, NewsItem, Payload, PriceBar, Record, RecordRow, SocialPost,
    SourceKind, Symbol,
};
pub use ratelimit::{RateGate, RequestBudget};
pub use retry::RetryPolicy;
pub use sink::{
    CsvSink, JsonSink, OutputFormat, RecordSink, SinkSummary, default_output_path, sink_for,
    write_articles,
};
pub use sources::{CnbcArticle, CnbcSource, DataSource, SourceContext, build_source};
