//! SEC EDGAR filings
//!
//! EDGAR is keyed by CIK, so a symbol is first resolved through the
//! published ticker map, then the company's submissions index is read.
//!
//! Rate limit: 10 requests per second (SEC fair access policy).
//! User-Agent requirement: must name the caller and a contact address.

use super::{DataSource, SourceContext, finalize};
use crate::error::{FinanceError, Result};
use crate::http::read_body;
use crate::model::{FetchRequest, Filing, Payload, Record, SourceKind, Symbol};
use crate::ratelimit::RateGate;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const SEC_BASE_URL: &str = "https://data.sec.gov";
const SEC_COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const SEC_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";

const REQUESTS_PER_SECOND: u32 = 10;

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: CikValue,
    ticker: String,
}

/// `cik_str` is a number in the published file despite its name
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CikValue {
    Number(u64),
    Text(String),
}

impl CikValue {
    fn as_u64(&self) -> Option<u64> {
        match self {
            CikValue::Number(n) => Some(*n),
            CikValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Submissions {
    filings: FilingsData,
}

#[derive(Debug, Deserialize)]
struct FilingsData {
    recent: RecentFilings,
}

/// Column-oriented: index `i` of every vector describes the same filing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecentFilings {
    accession_number: Vec<String>,
    filing_date: Vec<String>,
    report_date: Vec<Option<String>>,
    form: Vec<String>,
    primary_document: Vec<String>,
    primary_doc_description: Vec<Option<String>>,
}

/// SEC EDGAR filing source (no key; identifies itself with `SEC_USER_AGENT`)
pub struct SecEdgarSource {
    client: Client,
    user_agent: String,
    gate: RateGate,
    tickers: OnceCell<HashMap<String, u64>>,
}

impl SecEdgarSource {
    pub fn new(context: &SourceContext) -> Self {
        Self {
            client: context.client.clone(),
            user_agent: context.config.credentials.sec_user_agent.clone(),
            gate: RateGate::per_second(REQUESTS_PER_SECOND).with_budget(context.budget.clone()),
            tickers: OnceCell::new(),
        }
    }

    async fn get(&self, url: &str) -> Result<String> {
        self.gate.acquire().await;
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;
        read_body(SourceKind::SecEdgar, response).await
    }

    /// Resolve a ticker to its CIK, loading the ticker map on first use
    pub async fn cik(&self, symbol: &Symbol) -> Result<u64> {
        let tickers = self
            .tickers
            .get_or_try_init(|| async {
                let body = self.get(SEC_COMPANY_TICKERS_URL).await?;
                let map = parse_ticker_map(&body)?;
                info!(companies = map.len(), "loaded SEC ticker map");
                Ok::<_, FinanceError>(map)
            })
            .await?;

        lookup_cik(tickers, symbol.as_str()).ok_or_else(|| FinanceError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "ticker not found in SEC company list".to_string(),
        })
    }
}

/// Find a ticker's CIK, trying SEC's dashed class-share form (`BRK-B`) for
/// dotted tickers (`BRK.B`)
fn lookup_cik(tickers: &HashMap<String, u64>, ticker: &str) -> Option<u64> {
    if let Some(cik) = tickers.get(ticker) {
        return Some(*cik);
    }
    if ticker.contains('.') {
        return tickers.get(&ticker.replace('.', "-")).copied();
    }
    None
}

/// Parse `company_tickers.json` into an upper-cased ticker to CIK map
pub fn parse_ticker_map(body: &str) -> Result<HashMap<String, u64>> {
    let entries: HashMap<String, TickerEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_values()
        .filter_map(|entry| Some((entry.ticker.to_uppercase(), entry.cik_str.as_u64()?)))
        .collect())
}

/// Parse a submissions index into filing records
///
/// Filings are stamped at midnight UTC of their filing date.
pub fn parse_submissions(symbol: &Symbol, cik: u64, body: &str) -> Result<Vec<Record>> {
    let submissions: Submissions = serde_json::from_str(body)?;
    let recent = submissions.filings.recent;

    let records = recent
        .accession_number
        .iter()
        .enumerate()
        .filter_map(|(i, accession)| {
            let filing_date = recent.filing_date.get(i)?;
            let timestamp = NaiveDate::parse_from_str(filing_date, "%Y-%m-%d")
                .ok()?
                .and_time(NaiveTime::MIN)
                .and_utc();
            let document = recent.primary_document.get(i).map_or("", String::as_str);

            let filing = Filing {
                accession_number: accession.clone(),
                form_type: recent.form.get(i).cloned().unwrap_or_default(),
                report_date: non_empty(recent.report_date.get(i)),
                document_url: document_url(cik, accession, document),
                description: non_empty(recent.primary_doc_description.get(i)),
            };

            Some(Record::new(
                symbol.clone(),
                SourceKind::SecEdgar,
                timestamp,
                Payload::Filing(filing),
            ))
        })
        .collect();

    Ok(records)
}

fn non_empty(value: Option<&Option<String>>) -> Option<String> {
    value
        .and_then(Option::as_ref)
        .filter(|s| !s.trim().is_empty())
        .cloned()
}

fn document_url(cik: u64, accession: &str, document: &str) -> String {
    let folder = accession.replace('-', "");
    if document.is_empty() {
        format!("{SEC_ARCHIVES_URL}/{cik}/{folder}/")
    } else {
        format!("{SEC_ARCHIVES_URL}/{cik}/{folder}/{document}")
    }
}

#[async_trait]
impl DataSource for SecEdgarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::SecEdgar
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        let cik = self.cik(&request.symbol).await?;
        debug!(symbol = %request.symbol, cik, "requesting SEC submissions");

        let body = self
            .get(&format!("{SEC_BASE_URL}/submissions/CIK{cik:010}.json"))
            .await?;
        let records = parse_submissions(&request.symbol, cik, &body)?;

        Ok(finalize(records, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::model::DateRange;
    use std::sync::Arc;

    const TICKERS: &str = r#"{
        "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
        "1": {"cik_str": "789019", "ticker": "msft", "title": "MICROSOFT CORP"},
        "2": {"cik_str": "n/a", "ticker": "BAD", "title": "Broken"}
    }"#;

    const SUBMISSIONS: &str = r#"{
        "cik": "0000320193",
        "name": "Apple Inc.",
        "filings": {
            "recent": {
                "accessionNumber": ["0000320193-24-000006", "0000320193-23-000106"],
                "filingDate": ["2024-01-10", "2023-11-03"],
                "reportDate": ["2024-01-09", ""],
                "form": ["8-K", "10-K"],
                "primaryDocument": ["aapl-20240109.htm", "aapl-20230930.htm"],
                "primaryDocDescription": ["8-K", null],
                "size": [31234, 9876543],
                "isXBRL": [1, 1]
            }
        }
    }"#;

    #[test]
    fn test_parse_ticker_map() {
        let map = parse_ticker_map(TICKERS).unwrap();
        assert_eq!(map.get("AAPL"), Some(&320_193));
        assert_eq!(map.get("MSFT"), Some(&789_019));
        assert!(!map.contains_key("BAD"));
    }

    #[test]
    fn test_lookup_cik_class_shares() {
        let map = parse_ticker_map(
            r#"{
                "0": {"cik_str": 1067983, "ticker": "BRK-B", "title": "BERKSHIRE HATHAWAY INC"},
                "1": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}
            }"#,
        )
        .unwrap();

        assert_eq!(lookup_cik(&map, "BRK-B"), Some(1_067_983));
        assert_eq!(lookup_cik(&map, "BRK.B"), Some(1_067_983));
        assert_eq!(lookup_cik(&map, "AAPL"), Some(320_193));
        assert_eq!(lookup_cik(&map, "BRK.A"), None);
        assert_eq!(lookup_cik(&map, "ZZZZ"), None);
    }

    #[test]
    fn test_parse_submissions() {
        let symbol = Symbol::new("AAPL").unwrap();
        let records = parse_submissions(&symbol, 320_193, SUBMISSIONS).unwrap();
        assert_eq!(records.len(), 2);

        let Payload::Filing(filing) = &records[0].payload else {
            panic!("expected filing payload");
        };
        assert_eq!(filing.form_type, "8-K");
        assert_eq!(filing.report_date.as_deref(), Some("2024-01-09"));
        assert_eq!(
            filing.document_url,
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000006/aapl-20240109.htm"
        );
        assert_eq!(records[0].timestamp.to_rfc3339(), "2024-01-10T00:00:00+00:00");

        let Payload::Filing(annual) = &records[1].payload else {
            panic!("expected filing payload");
        };
        assert!(annual.report_date.is_none());
        assert!(annual.description.is_none());
    }

    #[test]
    fn test_parse_submissions_filtered_by_range() {
        let symbol = Symbol::new("AAPL").unwrap();
        let records = parse_submissions(&symbol, 320_193, SUBMISSIONS).unwrap();
        let request = FetchRequest::new(symbol, DateRange::parse("2024-01-01", "2024-01-31").unwrap());

        let kept = finalize(records, &request);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].to_row().form_type.as_deref(), Some("8-K"));
    }

    #[test]
    fn test_document_url_without_document() {
        assert_eq!(
            document_url(320_193, "0000320193-24-000006", ""),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000006/"
        );
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_live() {
        let context = SourceContext::new(Arc::new(DataConfig::default())).unwrap();
        let source = SecEdgarSource::new(&context);
        let request = FetchRequest::new(
            Symbol::new("AAPL").unwrap(),
            DateRange::parse("2024-01-01", "2024-03-31").unwrap(),
        );

        assert_eq!(source.cik(&request.symbol).await.unwrap(), 320_193);
        let records = source.fetch(&request).await.unwrap();
        assert!(!records.is_empty());
    }
}
