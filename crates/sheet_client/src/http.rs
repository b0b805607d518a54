//! HTTP series provider.
//!
//! Fetches `GET {base_url}/series/{key}`, which returns the sheet as a JSON
//! array of records, and hands the cells back untyped.

use std::time::Duration;

use async_trait::async_trait;
use common::{CacheKey, Error, RawRow, RawValue};
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::debug;

use crate::provider::{ProviderError, SeriesProvider};

/// Longest slice of an error body kept in a transient failure.
const ERROR_BODY_CHARS: usize = 500;

/// Sheet API client with connection pooling.
#[derive(Debug, Clone)]
pub struct HttpSeriesProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpSeriesProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| Error::Config(format!("invalid sheet API base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "sheet API base URL {base_url} cannot take a path"
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent("booth-sync/0.1")
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build sheet HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// `{base_url}/series/{key}` with the key percent-encoded as one segment.
    fn series_url(&self, key: &CacheKey) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("series").push(key.as_str());
        }
        url
    }
}

/// Map a response status and body onto rows or a provider failure.
fn classify(key: &CacheKey, status: u16, body: &str) -> Result<Vec<RawRow>, ProviderError> {
    if status == 404 {
        return Err(ProviderError::NotFound(key.to_string()));
    }
    if !(200..300).contains(&status) {
        return Err(ProviderError::Transient(format!(
            "sheet API returned {} for {}: {}",
            status,
            key,
            body.chars().take(ERROR_BODY_CHARS).collect::<String>()
        )));
    }
    parse_rows(body)
        .map_err(|e| ProviderError::Transient(format!("JSON parse error for {key}: {e}")))
}

#[async_trait]
impl SeriesProvider for HttpSeriesProvider {
    async fn fetch(&self, key: &CacheKey) -> Result<Vec<RawRow>, ProviderError> {
        let url = self.series_url(key);
        debug!(key = %key, "Fetching sheet rows: {}", url);

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("HTTP error for {key}: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("body read error for {key}: {e}")))?;
        let rows = classify(key, status, &body)?;

        debug!(key = %key, rows = rows.len(), "Got sheet rows");
        Ok(rows)
    }
}

/// Decode a JSON array of records into untyped rows.
pub fn parse_rows(body: &str) -> Result<Vec<RawRow>, serde_json::Error> {
    let records: Vec<Map<String, Value>> = serde_json::from_str(body)?;
    Ok(records
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .map(|(field, value)| (field, raw_value(value)))
                .collect()
        })
        .collect())
}

fn raw_value(value: Value) -> Option<RawValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(RawValue::Bool(b)),
        Value::Number(n) => n.as_f64().map(RawValue::Number),
        Value::String(s) => Some(RawValue::Text(s)),
        nested @ (Value::Array(_) | Value::Object(_)) => Some(RawValue::Text(nested.to_string())),
    }
}
