//! Yahoo Finance daily price history

use super::{DataSource, SourceContext, finalize};
use crate::error::{FinanceError, Result};
use crate::model::{FetchRequest, Payload, PriceBar, Record, SourceKind, Symbol};
use crate::ratelimit::RateGate;
use async_trait::async_trait;
use chrono::DateTime;
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api as yahoo;

/// Yahoo has no published limit; this stays well under what it tolerates
const REQUESTS_PER_MINUTE: u32 = 60;

/// Yahoo Finance price source (no API key required)
pub struct YahooSource {
    connector: yahoo::YahooConnector,
    gate: RateGate,
}

impl YahooSource {
    pub fn new(context: &SourceContext) -> Result<Self> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| FinanceError::Yahoo(e.to_string()))?;

        Ok(Self {
            connector,
            gate: RateGate::per_minute(REQUESTS_PER_MINUTE).with_budget(context.budget.clone()),
        })
    }
}

/// Build a price record from a UNIX timestamp and a bar
///
/// Returns `None` for timestamps chrono can't represent.
pub fn price_record(symbol: &Symbol, timestamp: i64, bar: PriceBar) -> Option<Record> {
    let timestamp = DateTime::from_timestamp(timestamp, 0)?;
    Some(Record::new(
        symbol.clone(),
        SourceKind::Yahoo,
        timestamp,
        Payload::Price(bar),
    ))
}

fn to_offset(timestamp: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| FinanceError::Yahoo(format!("Invalid timestamp {timestamp}: {e}")))
}

#[async_trait]
impl DataSource for YahooSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Yahoo
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        let symbol = &request.symbol;
        // Yahoo's end bound is exclusive
        let start = to_offset(request.range.start_utc().timestamp())?;
        let end = to_offset(request.range.end_utc().timestamp() + 1)?;

        self.gate.acquire().await;
        debug!(%symbol, range = %request.range, "requesting Yahoo price history");

        let response = self
            .connector
            .get_quote_history(symbol.as_str(), start, end)
            .await
            .map_err(|e| FinanceError::Yahoo(e.to_string()))?;

        let quotes = response.quotes().map_err(|e| FinanceError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;

        let records = quotes
            .iter()
            .filter_map(|q| {
                price_record(
                    symbol,
                    q.timestamp as i64,
                    PriceBar {
                        open: q.open,
                        high: q.high,
                        low: q.low,
                        close: q.close,
                        adj_close: q.adjclose,
                        volume: q.volume,
                    },
                )
            })
            .collect();

        Ok(finalize(records, request))
    }
}
