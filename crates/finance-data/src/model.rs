//! Normalized record model shared by every source

use crate::error::{FinanceError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static SYMBOL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\^?[A-Z0-9][A-Z0-9.\-=]{0,14}$").expect("symbol pattern is valid")
});

/// Third-party data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Yahoo Finance price history
    Yahoo,
    /// Finnhub company news
    Finnhub,
    /// Reddit subreddit search
    Reddit,
    /// SEC EDGAR filings
    #[serde(rename = "sec")]
    SecEdgar,
    /// CNBC news search
    Cnbc,
}

impl SourceKind {
    /// Every known source, in display order
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Yahoo,
        SourceKind::Finnhub,
        SourceKind::Reddit,
        SourceKind::SecEdgar,
        SourceKind::Cnbc,
    ];

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Yahoo => "yahoo",
            SourceKind::Finnhub => "finnhub",
            SourceKind::Reddit => "reddit",
            SourceKind::SecEdgar => "sec",
            SourceKind::Cnbc => "cnbc",
        }
    }

    /// What kind of record this source produces
    pub fn record_kind(&self) -> &'static str {
        match self {
            SourceKind::Yahoo => "price",
            SourceKind::Finnhub | SourceKind::Cnbc => "news",
            SourceKind::Reddit => "post",
            SourceKind::SecEdgar => "filing",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" | "yfinance" => Ok(SourceKind::Yahoo),
            "finnhub" => Ok(SourceKind::Finnhub),
            "reddit" => Ok(SourceKind::Reddit),
            "sec" | "edgar" | "sec_edgar" => Ok(SourceKind::SecEdgar),
            "cnbc" => Ok(SourceKind::Cnbc),
            other => Err(FinanceError::Config(format!("unknown source: {other}"))),
        }
    }
}

/// Validated, upper-cased ticker symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let normalized = raw.as_ref().trim().to_uppercase();
        if SYMBOL_PATTERN.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(FinanceError::InvalidSymbol(raw.as_ref().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = FinanceError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(FinanceError::InvalidDateRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` dates
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| FinanceError::InvalidDateRange(format!("{s}: {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Midnight UTC at the start of the range
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last second (UTC) of the final day
    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::seconds(86_399)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        date >= self.start && date <= self.end
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// What to fetch: one symbol over one date range
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequest {
    pub symbol: Symbol,
    pub range: DateRange,
    /// Cap on records per source; the most recent are kept
    pub limit: Option<usize>,
}

impl FetchRequest {
    pub fn new(symbol: Symbol, range: DateRange) -> Self {
        Self {
            symbol,
            range,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

/// News article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: Option<String>,
    pub headline: String,
    pub summary: String,
    pub url: String,
    pub publisher: Option<String>,
    pub category: Option<String>,
}

/// Social media post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub comments: u64,
    pub url: String,
}

/// Regulatory filing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filing {
    pub accession_number: String,
    pub form_type: String,
    pub report_date: Option<String>,
    pub document_url: String,
    pub description: Option<String>,
}

/// Source-specific part of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Price(PriceBar),
    News(NewsItem),
    Post(SocialPost),
    Filing(Filing),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Price(_) => "price",
            Payload::News(_) => "news",
            Payload::Post(_) => "post",
            Payload::Filing(_) => "filing",
        }
    }
}

/// One normalized observation from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub symbol: Symbol,
    pub source: SourceKind,
    pub timestamp: DateTime<Utc>,
    pub payload: Payload,
}

impl Record {
    pub fn new(
        symbol: Symbol,
        source: SourceKind,
        timestamp: DateTime<Utc>,
        payload: Payload,
    ) -> Self {
        Self {
            symbol,
            source,
            timestamp,
            payload,
        }
    }

    /// Identity used to drop duplicates when merging sources
    pub fn dedup_key(&self) -> String {
        let identity = match &self.payload {
            Payload::Price(_) => self.timestamp.timestamp().to_string(),
            Payload::News(news) => news.id.clone().unwrap_or_else(|| news.url.clone()),
            Payload::Post(post) => post.id.clone(),
            Payload::Filing(filing) => filing.accession_number.clone(),
        };
        format!("{}:{}:{}", self.source, self.symbol, identity)
    }

    /// Flatten into the common tabular shape
    pub fn to_row(&self) -> RecordRow {
        let mut row = RecordRow {
            symbol: self.symbol.to_string(),
            source: self.source.to_string(),
            kind: self.payload.kind().to_string(),
            timestamp: self.timestamp.to_rfc3339(),
            ..RecordRow::default()
        };

        match &self.payload {
            Payload::Price(bar) => {
                row.open = Some(bar.open);
                row.high = Some(bar.high);
                row.low = Some(bar.low);
                row.close = Some(bar.close);
                row.adj_close = Some(bar.adj_close);
                row.volume = Some(bar.volume);
            }
            Payload::News(news) => {
                row.title = Some(news.headline.clone());
                row.summary = Some(news.summary.clone());
                row.url = Some(news.url.clone());
                row.author.clone_from(&news.publisher);
                row.identifier.clone_from(&news.id);
            }
            Payload::Post(post) => {
                row.title = Some(post.title.clone());
                row.summary = Some(post.body.clone());
                row.url = Some(post.url.clone());
                row.author = Some(post.author.clone());
                row.score = Some(post.score);
                row.identifier = Some(post.id.clone());
            }
            Payload::Filing(filing) => {
                row.title.clone_from(&filing.description);
                row.url = Some(filing.document_url.clone());
                row.form_type = Some(filing.form_type.clone());
                row.identifier = Some(filing.accession_number.clone());
            }
        }

        row
    }
}

/// Flat row written by tabular sinks
///
/// Column order is part of the output format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub symbol: String,
    pub source: String,
    pub kind: String,
    pub timestamp: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub score: Option<i64>,
    pub form_type: Option<String>,
    pub identifier: Option<String>,
}

impl RecordRow {
    /// Header line of the tabular shape
    pub const COLUMNS: [&'static str; 17] = [
        "symbol",
        "source",
        "kind",
        "timestamp",
        "open",
        "high",
        "low",
        "close",
        "adj_close",
        "volume",
        "title",
        "summary",
        "url",
        "author",
        "score",
        "form_type",
        "identifier",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(Symbol::new(" aapl ").unwrap().as_str(), "AAPL");
        assert_eq!(Symbol::new("brk.b").unwrap().as_str(), "BRK.B");
        assert_eq!(Symbol::new("^gspc").unwrap().as_str(), "^GSPC");
        assert!(Symbol::new("-AAPL").is_err());
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("AAPL MSFT").is_err());
        assert!(Symbol::new("WAYTOOLONGSYMBOL123").is_err());
    }

    #[test]
    fn test_symbol_serde_validates() {
        let symbol: Symbol = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(symbol.as_str(), "MSFT");
        assert!(serde_json::from_str::<Symbol>("\"not valid\"").is_err());
    }

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("yfinance".parse::<SourceKind>().unwrap(), SourceKind::Yahoo);
        assert_eq!("SEC".parse::<SourceKind>().unwrap(), SourceKind::SecEdgar);
        assert_eq!("edgar".parse::<SourceKind>().unwrap(), SourceKind::SecEdgar);
        assert_eq!("Cnbc".parse::<SourceKind>().unwrap(), SourceKind::Cnbc);
        assert!("bloomberg".parse::<SourceKind>().is_err());

        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert_eq!(serde_json::to_string(&SourceKind::SecEdgar).unwrap(), "\"sec\"");
        assert_eq!(SourceKind::Yahoo.record_kind(), "price");
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        assert!(range.contains(ts("2024-01-01T00:00:00Z")));
        assert!(range.contains(ts("2024-01-31T23:59:59Z")));
        assert!(!range.contains(ts("2024-02-01T00:00:00Z")));
        assert!(!range.contains(ts("2023-12-31T23:59:59Z")));
        assert_eq!(range.start_utc(), ts("2024-01-01T00:00:00Z"));
        assert_eq!(range.end_utc(), ts("2024-01-31T23:59:59Z"));
        assert_eq!(range.to_string(), "2024-01-01..2024-01-31");
    }

    #[test]
    fn test_date_range_rejects_inverted_and_malformed() {
        assert!(DateRange::parse("2024-02-01", "2024-01-01").is_err());
        assert!(DateRange::parse("2024/01/01", "2024-01-31").is_err());
        assert!(DateRange::parse("2024-01-15", "2024-01-15").is_ok());
    }

    #[test]
    fn test_row_flattening() {
        let symbol = Symbol::new("AAPL").unwrap();
        let bar = Record::new(
            symbol.clone(),
            SourceKind::Yahoo,
            ts("2024-01-02T14:30:00Z"),
            Payload::Price(PriceBar {
                open: 187.15,
                high: 188.44,
                low: 183.89,
                close: 185.64,
                adj_close: 184.94,
                volume: 82_488_700,
            }),
        );
        let row = bar.to_row();
        assert_eq!(row.kind, "price");
        assert_eq!(row.close, Some(185.64));
        assert_eq!(row.volume, Some(82_488_700));
        assert!(row.title.is_none());

        let filing = Record::new(
            symbol,
            SourceKind::SecEdgar,
            ts("2024-01-10T00:00:00Z"),
            Payload::Filing(Filing {
                accession_number: "0000320193-24-000006".to_string(),
                form_type: "8-K".to_string(),
                report_date: Some("2024-01-09".to_string()),
                document_url: "https://www.sec.gov/x".to_string(),
                description: None,
            }),
        );
        let row = filing.to_row();
        assert_eq!(row.source, "sec");
        assert_eq!(row.form_type.as_deref(), Some("8-K"));
        assert_eq!(row.identifier.as_deref(), Some("0000320193-24-000006"));
        assert!(row.close.is_none());
    }

    #[test]
    fn test_dedup_key_prefers_ids() {
        let symbol = Symbol::new("TSLA").unwrap();
        let news = |id: Option<&str>, url: &str| {
            Record::new(
                symbol.clone(),
                SourceKind::Finnhub,
                ts("2024-01-05T10:00:00Z"),
                Payload::News(NewsItem {
                    id: id.map(str::to_string),
                    headline: "h".to_string(),
                    summary: String::new(),
                    url: url.to_string(),
                    publisher: None,
                    category: None,
                }),
            )
        };

        assert_eq!(news(Some("1"), "a").dedup_key(), news(Some("1"), "b").dedup_key());
        assert_ne!(news(None, "a").dedup_key(), news(None, "b").dedup_key());
    }

    #[test]
    fn test_record_json_shape() {
        let record = Record::new(
            Symbol::new("GME").unwrap(),
            SourceKind::Reddit,
            ts("2024-01-03T12:00:00Z"),
            Payload::Post(SocialPost {
                id: "abc".to_string(),
                subreddit: "wallstreetbets".to_string(),
                title: "GME".to_string(),
                body: String::new(),
                author: "someone".to_string(),
                score: 10,
                comments: 2,
                url: "https://reddit.com/abc".to_string(),
            }),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["source"], "reddit");
        assert_eq!(value["payload"]["kind"], "post");
        assert_eq!(value["payload"]["subreddit"], "wallstreetbets");
    }
}
