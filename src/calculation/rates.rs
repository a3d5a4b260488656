//! Exchange-rate data provider.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{CourierError, Result};
use crate::types::RateDate;
use crate::util::retry::RetryPolicy;

/// Public Frankfurter API endpoint.
pub const FRANKFURTER_BASE_URL: &str = "https://api.frankfurter.app";

const PROVIDER_NAME: &str = "frankfurter";

/// Rates quoted against a base currency.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateQuote {
    #[serde(default = "one")]
    pub amount: f64,
    pub base: String,
    pub date: NaiveDate,
    pub rates: HashMap<String, f64>,
}

fn one() -> f64 {
    1.0
}

impl RateQuote {
    /// Rate for `target` per one unit of the base currency.
    pub fn rate_for(&self, target: &str) -> Option<f64> {
        let rate = self.rates.get(target)?;
        if self.amount > 0.0 {
            Some(rate / self.amount)
        } else {
            Some(*rate)
        }
    }
}

/// Source of exchange rates.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn quote(&self, from: &str, to: &str, date: RateDate) -> Result<RateQuote>;
}

/// HTTP client for the Frankfurter exchange-rate API.
#[derive(Debug, Clone)]
pub struct FrankfurterClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl Default for FrankfurterClient {
    fn default() -> Self {
        Self::new(FRANKFURTER_BASE_URL)
    }
}

impl FrankfurterClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Build with a per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            ..Self::new(base_url)
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, from: &str, to: &str, date: RateDate) -> Result<RateQuote> {
        let url = format!("{}/{}", self.base_url, date);
        tracing::debug!(%url, from, to, "requesting exchange rate");

        let response = self
            .http
            .get(&url)
            .query(&[("from", from), ("to", to)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CourierError::api(
                status.as_u16(),
                format!("API request failed: {body}"),
            ));
        }

        let data: serde_json::Value = response.json().await?;
        if data.get("rates").is_none() {
            return Err(CourierError::provider(
                PROVIDER_NAME,
                "Invalid API response format.",
            ));
        }
        Ok(serde_json::from_value(data)?)
    }
}

#[async_trait]
impl RateProvider for FrankfurterClient {
    async fn quote(&self, from: &str, to: &str, date: RateDate) -> Result<RateQuote> {
        self.retry.execute(|| self.fetch(from, to, date)).await
    }
}
