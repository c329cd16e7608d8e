//! Shared HTTP client construction and response handling

use crate::config::DataConfig;
use crate::error::{FinanceError, Result};
use crate::model::SourceKind;
use reqwest::{Client, Proxy, Response, StatusCode};

/// User agent for vendors that don't require a specific one
pub const DEFAULT_USER_AGENT: &str = concat!("finance-agent/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in `FinanceError::Http`
const MAX_ERROR_BODY: usize = 512;

/// Build the reqwest client shared by every source
pub fn build_client(config: &DataConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(config.request_timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .danger_accept_invalid_certs(config.ssl_verify_disabled);

    if let Some(proxy) = &config.http_proxy {
        builder = builder.proxy(Proxy::http(proxy)?);
    }
    if let Some(proxy) = &config.https_proxy {
        builder = builder.proxy(Proxy::https(proxy)?);
    }

    Ok(builder.build()?)
}

/// Read a response body, turning non-success statuses into errors
pub async fn read_body(vendor: SourceKind, response: Response) -> Result<String> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FinanceError::RateLimitExceeded {
            provider: vendor.to_string(),
        });
    }

    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
        return Err(FinanceError::Http {
            vendor,
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.text().await?)
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
