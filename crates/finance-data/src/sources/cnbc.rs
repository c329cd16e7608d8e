//! CNBC news through the queryly search feed

use super::{DataSource, SourceContext, finalize};
use crate::error::Result;
use crate::http::read_body;
use crate::model::{FetchRequest, NewsItem, Payload, Record, SourceKind, Symbol};
use crate::ratelimit::RateGate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const QUERYLY_URL: &str = "https://api.queryly.com/cnbc/json.aspx";
const QUERYLY_KEY: &str = "31a35d40a9a64ab3";
const ADDITIONAL_INDEXES: &str =
    "4cd6f71fbf22424d,937d600b0d0d4e23,3bfbe40caee7443e,626fdfcd96444f28";

const PAGE_SIZE: u32 = 10;
const REQUESTS_PER_MINUTE: u32 = 30;

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnbcArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    pub published: Option<DateTime<Utc>>,
    pub section: Option<String>,
}

impl CnbcArticle {
    /// Attach the article to a symbol; undated articles have no record
    pub fn into_record(self, symbol: &Symbol) -> Option<Record> {
        let timestamp = self.published?;
        Some(Record::new(
            symbol.clone(),
            SourceKind::Cnbc,
            timestamp,
            Payload::News(NewsItem {
                id: None,
                headline: self.title,
                summary: self.description,
                url: self.url,
                publisher: Some("CNBC".to_string()),
                category: self.section,
            }),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchHit {
    #[serde(rename = "cn:title")]
    title: String,
    description: String,
    url: String,
    #[serde(rename = "datePublished")]
    date_published: String,
    section: Option<String>,
}

fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse one page of search results
pub fn parse_page(body: &str) -> Result<Vec<CnbcArticle>> {
    let page: SearchPage = serde_json::from_str(body)?;
    Ok(page
        .results
        .into_iter()
        .map(|hit| CnbcArticle {
            published: parse_published(&hit.date_published),
            title: hit.title,
            description: hit.description,
            url: hit.url,
            section: hit.section.filter(|s| !s.is_empty()),
        })
        .collect())
}

/// CNBC keyword news source (no key required)
pub struct CnbcSource {
    client: Client,
    gate: RateGate,
    rounds: u32,
}

impl CnbcSource {
    pub fn new(context: &SourceContext) -> Self {
        Self {
            client: context.client.clone(),
            gate: RateGate::per_minute(REQUESTS_PER_MINUTE).with_budget(context.budget.clone()),
            rounds: context.config.cnbc_rounds,
        }
    }

    async fn page(&self, query: &str, page: u32) -> Result<Vec<CnbcArticle>> {
        self.gate.acquire().await;
        debug!(%query, page, "requesting CNBC search page");

        let offset = (page * PAGE_SIZE).to_string();
        let batch_size = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(QUERYLY_URL)
            .query(&[
                ("queryly_key", QUERYLY_KEY),
                ("query", query),
                ("endindex", offset.as_str()),
                ("batchsize", batch_size.as_str()),
                ("callback", ""),
                ("showfaceted", "false"),
                ("timezoneoffset", "0"),
                ("facetedfields", "formats"),
                ("facetedkey", "formats|"),
                ("facetedvalue", "!Press Release|"),
                ("sort", "date"),
                ("additionalindexes", ADDITIONAL_INDEXES),
            ])
            .send()
            .await?;

        let body = read_body(SourceKind::Cnbc, response).await?;
        parse_page(&body)
    }

    /// Download up to `rounds` pages of results for a keyword
    ///
    /// Stops at the first empty page. Not limited to any date range.
    pub async fn cnbc_news(&self, query: &str, rounds: u32) -> Result<Vec<CnbcArticle>> {
        let articles = collect_pages(rounds, |page| self.page(query, page)).await?;
        info!(%query, count = articles.len(), "downloaded CNBC articles");
        Ok(articles)
    }
}

/// Request pages `0..rounds` in order, stopping at the first empty one
async fn collect_pages<F, Fut>(rounds: u32, mut fetch_page: F) -> Result<Vec<CnbcArticle>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<CnbcArticle>>>,
{
    let mut articles = Vec::new();

    for page in 0..rounds {
        let batch = fetch_page(page).await?;
        if batch.is_empty() {
            debug!(page, "no more CNBC results");
            break;
        }
        articles.extend(batch);
    }

    Ok(articles)
}

#[async_trait]
impl DataSource for CnbcSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cnbc
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        let records = self
            .cnbc_news(request.symbol.as_str(), self.rounds)
            .await?
            .into_iter()
            .filter_map(|article| article.into_record(&request.symbol))
            .collect();

        Ok(finalize(records, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use std::sync::Arc;

    const PAGE: &str = r#"{
        "metadata": {"totalresults": 2},
        "results": [
            {
                "cn:title": "Apple stock falls after Barclays downgrade",
                "description": "Barclays cut its rating to underweight.",
                "url": "https://www.cnbc.com/2024/01/02/apple-downgrade.html",
                "datePublished": "2024-01-02T12:41:07+0000",
                "section": "Markets"
            },
            {
                "cn:title": "Undated item",
                "url": "https://www.cnbc.com/video/x.html",
                "datePublished": "",
                "section": ""
            }
        ]
    }"#;

    #[test]
    fn test_parse_page() {
        let articles = parse_page(PAGE).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Apple stock falls after Barclays downgrade");
        assert_eq!(articles[0].section.as_deref(), Some("Markets"));
        assert_eq!(
            articles[0].published.map(|p| p.to_rfc3339()).as_deref(),
            Some("2024-01-02T12:41:07+00:00")
        );

        assert!(articles[1].published.is_none());
        assert!(articles[1].section.is_none());
        assert_eq!(articles[1].description, "");
    }

    #[test]
    fn test_parse_page_without_results() {
        assert!(parse_page("{}").unwrap().is_empty());
        assert!(parse_page(r#"{"results": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_published_formats() {
        assert!(parse_published("2024-01-02T12:41:07-0500").is_some());
        assert!(parse_published("2024-01-02T12:41:07Z").is_some());
        assert!(parse_published("yesterday").is_none());
    }

    #[test]
    fn test_into_record() {
        let symbol = Symbol::new("AAPL").unwrap();
        let mut articles = parse_page(PAGE).unwrap().into_iter();

        let record = articles.next().unwrap().into_record(&symbol).unwrap();
        assert_eq!(record.source, SourceKind::Cnbc);
        let row = record.to_row();
        assert_eq!(row.author.as_deref(), Some("CNBC"));
        assert_eq!(row.kind, "news");

        assert!(articles.next().unwrap().into_record(&symbol).is_none());
    }

    fn article(n: u32) -> CnbcArticle {
        CnbcArticle {
            title: format!("story {n}"),
            description: String::new(),
            url: format!("https://www.cnbc.com/{n}.html"),
            published: None,
            section: None,
        }
    }

    #[tokio::test]
    async fn test_paging_stops_at_first_empty_page() {
        let mut requested = Vec::new();
        let articles = collect_pages(5, |page| {
            requested.push(page);
            async move {
                Ok(match page {
                    0 => vec![article(0), article(1)],
                    1 => vec![article(2)],
                    _ => Vec::new(),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(requested, [0, 1, 2]);
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[2].title, "story 2");
    }

    #[tokio::test]
    async fn test_paging_honours_rounds() {
        let mut calls = 0;
        let articles = collect_pages(2, |page| {
            calls += 1;
            async move { Ok(vec![article(page)]) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(articles.len(), 2);
        assert!(collect_pages(0, |_| async { Ok(vec![article(0)]) }).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paging_propagates_page_errors() {
        let result = collect_pages(3, |page| async move {
            if page == 1 {
                Err(crate::error::FinanceError::RateLimitExceeded {
                    provider: "cnbc".to_string(),
                })
            } else {
                Ok(vec![article(page)])
            }
        })
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_rounds_come_from_config() {
        let config = DataConfig {
            cnbc_rounds: 5,
            ..DataConfig::default()
        };
        let context = SourceContext::new(Arc::new(config)).unwrap();
        assert_eq!(CnbcSource::new(&context).rounds, 5);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_cnbc_news_live() {
        let context = SourceContext::new(Arc::new(DataConfig::default())).unwrap();
        let source = CnbcSource::new(&context);
        let articles = source.cnbc_news("AAPL", 1).await.unwrap();
        assert!(articles.len() <= 10);
    }
}
