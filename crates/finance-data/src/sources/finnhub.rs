//! Finnhub company news

use super::{DataSource, SourceContext, finalize};
use crate::error::{FinanceError, Result};
use crate::http::read_body;
use crate::model::{FetchRequest, NewsItem, Payload, Record, SourceKind, Symbol};
use crate::ratelimit::RateGate;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const COMPANY_NEWS_URL: &str = "https://finnhub.io/api/v1/company-news";

/// Free tier allowance
const REQUESTS_PER_MINUTE: u32 = 60;

/// Finnhub news article as returned by `/company-news`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FinnhubArticle {
    category: String,
    /// Publish time (UNIX timestamp)
    datetime: i64,
    headline: String,
    id: i64,
    source: String,
    summary: String,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompanyNewsResponse {
    Articles(Vec<FinnhubArticle>),
    Error { error: String },
}

/// Finnhub company-news source (requires `FINNHUB_API_KEY`)
pub struct FinnhubSource {
    client: Client,
    api_key: String,
    gate: RateGate,
}

impl FinnhubSource {
    pub fn new(context: &SourceContext) -> Result<Self> {
        let api_key = context.config.credentials.finnhub()?.to_string();

        Ok(Self {
            client: context.client.clone(),
            api_key,
            gate: RateGate::per_minute(REQUESTS_PER_MINUTE).with_budget(context.budget.clone()),
        })
    }
}

/// Parse a `/company-news` body into records
///
/// Finnhub reports bad keys and unknown symbols as `{"error": "..."}` with a
/// 200 status, so that shape is surfaced as an API error.
pub fn parse_company_news(symbol: &Symbol, body: &str) -> Result<Vec<Record>> {
    let articles = match serde_json::from_str::<CompanyNewsResponse>(body)? {
        CompanyNewsResponse::Articles(articles) => articles,
        CompanyNewsResponse::Error { error } => {
            return Err(FinanceError::Api {
                vendor: SourceKind::Finnhub,
                message: error,
            });
        }
    };

    let records = articles
        .into_iter()
        .filter_map(|article| {
            let timestamp = DateTime::from_timestamp(article.datetime, 0)?;
            let news = NewsItem {
                id: (article.id != 0).then(|| article.id.to_string()),
                headline: article.headline,
                summary: article.summary,
                url: article.url,
                publisher: (!article.source.is_empty()).then_some(article.source),
                category: (!article.category.is_empty()).then_some(article.category),
            };
            Some(Record::new(
                symbol.clone(),
                SourceKind::Finnhub,
                timestamp,
                Payload::News(news),
            ))
        })
        .collect();

    Ok(records)
}

#[async_trait]
impl DataSource for FinnhubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Finnhub
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        self.gate.acquire().await;
        debug!(symbol = %request.symbol, range = %request.range, "requesting Finnhub company news");

        let from = request.range.start.to_string();
        let to = request.range.end.to_string();
        let response = self
            .client
            .get(COMPANY_NEWS_URL)
            .query(&[
                ("symbol", request.symbol.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("token", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let body = read_body(SourceKind::Finnhub, response).await?;
        let records = parse_company_news(&request.symbol, &body)?;

        Ok(finalize(records, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::model::DateRange;
    use std::sync::Arc;

    const SAMPLE: &str = r#"[
        {
            "category": "company",
            "datetime": 1704963600,
            "headline": "Apple shares rise on services growth",
            "id": 125512345,
            "image": "",
            "related": "AAPL",
            "source": "Reuters",
            "summary": "Services revenue beat estimates.",
            "url": "https://finnhub.io/api/news?id=abc"
        },
        {
            "datetime": 1704877200,
            "headline": "Partial article"
        }
    ]"#;

    #[test]
    fn test_parse_company_news() {
        let symbol = Symbol::new("AAPL").unwrap();
        let records = parse_company_news(&symbol, SAMPLE).unwrap();
        assert_eq!(records.len(), 2);

        let Payload::News(news) = &records[0].payload else {
            panic!("expected news payload");
        };
        assert_eq!(news.id.as_deref(), Some("125512345"));
        assert_eq!(news.publisher.as_deref(), Some("Reuters"));
        assert_eq!(news.category.as_deref(), Some("company"));
        assert_eq!(records[0].timestamp.to_rfc3339(), "2024-01-11T09:00:00+00:00");

        let Payload::News(partial) = &records[1].payload else {
            panic!("expected news payload");
        };
        assert!(partial.id.is_none());
        assert!(partial.publisher.is_none());
        assert_eq!(partial.summary, "");
    }

    #[test]
    fn test_parse_company_news_error_object() {
        let symbol = Symbol::new("AAPL").unwrap();
        let err = parse_company_news(&symbol, r#"{"error": "Invalid API key"}"#).unwrap_err();
        assert!(matches!(err, FinanceError::Api { vendor: SourceKind::Finnhub, .. }));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_parse_company_news_empty() {
        let symbol = Symbol::new("AAPL").unwrap();
        assert!(parse_company_news(&symbol, "[]").unwrap().is_empty());
        assert!(parse_company_news(&symbol, "not json").is_err());
    }

    #[test]
    fn test_new_requires_key() {
        let context = SourceContext::new(Arc::new(DataConfig::default())).unwrap();
        assert!(matches!(
            FinnhubSource::new(&context),
            Err(FinanceError::MissingCredential(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires FINNHUB_API_KEY and network access
    async fn test_fetch_live() {
        let context = SourceContext::new(Arc::new(DataConfig::from_env().unwrap())).unwrap();
        let source = FinnhubSource::new(&context).unwrap();
        let request = FetchRequest::new(
            Symbol::new("AAPL").unwrap(),
            DateRange::parse("2024-01-01", "2024-01-31").unwrap(),
        );

        let records = source.fetch(&request).await.unwrap();
        assert!(records.iter().all(|r| r.source == SourceKind::Finnhub));
    }
}
