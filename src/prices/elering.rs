use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{DayWindow, FetchError, MarketDataSource};
use crate::config::FeedConfig;
use crate::domain::RawPriceRecord;

/// Longest error body kept in a `FetchError::Status`
const MAX_ERROR_BODY: usize = 256;

/// Elering NPS day-ahead price API client
#[derive(Clone)]
pub struct EleringPriceSource<Tz: TimeZone> {
    base_url: String,
    region: String,
    tz: Tz,
    client: reqwest::Client,
}

impl<Tz: TimeZone> EleringPriceSource<Tz> {
    /// `tz` decides where the local day starts and ends
    pub fn new(cfg: &FeedConfig, region: impl Into<String>, tz: Tz) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&cfg.user_agent)?);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds.max(1)))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: cfg.base_url.clone(),
            region: region.into(),
            tz,
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/api/nps/price", self.base_url.trim_end_matches('/'))
    }

    fn parse(&self, body: &str) -> Result<Vec<RawPriceRecord>, FetchError> {
        let resp: NpsResponse = serde_json::from_str(body)?;
        if !resp.success {
            return Err(FetchError::Rejected);
        }
        let mut data = resp.data;
        let prices = data
            .remove(&self.region)
            .ok_or_else(|| FetchError::MissingRegion(self.region.clone()))?;
        Ok(prices
            .into_iter()
            .map(|p| RawPriceRecord::new(p.timestamp, p.price))
            .collect())
    }
}

#[async_trait]
impl<Tz> MarketDataSource for EleringPriceSource<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    async fn fetch(&self, reference: DateTime<Utc>) -> Result<Vec<RawPriceRecord>, FetchError> {
        let window = DayWindow::containing(&reference.with_timezone(&self.tz))?;
        let (start, end) = window.query_bounds();
        debug!(%start, %end, region = %self.region, "fetching day-ahead prices");

        let resp = self
            .client
            .get(self.url())
            .query(&[("start", start.as_str()), ("end", end.as_str())])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let body = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(FetchError::Status { status, body });
        }

        let records = self.parse(&body)?;
        debug!(count = records.len(), "received price records");
        Ok(records)
    }
}

// NPS API response structures
#[derive(Debug, Deserialize)]
struct NpsResponse {
    #[serde(default = "default_success")]
    success: bool,
    data: HashMap<String, Vec<NpsPrice>>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct NpsPrice {
    timestamp: i64,
    price: f64,
}
