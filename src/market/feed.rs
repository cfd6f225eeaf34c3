//! Current arecanut price quote
//!
//! With a feed URL configured the quote is fetched as JSON; otherwise the
//! built-in Mangalore quote is used. A failed fetch degrades to the fallback
//! quote. Successful fetches are cached for the rest of the IST day.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const FALLBACK_SOURCE: &str = "fallback - scraping failed";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid quote: {0}")]
    Invalid(String),
}

/// Prices in rupees per kg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub red_arecanut_price: f64,
    pub white_arecanut_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kokum_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coconut_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banana_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl PriceQuote {
    /// Built-in Mangalore market quote
    pub fn mangalore() -> Self {
        Self {
            red_arecanut_price: 150.0,
            white_arecanut_price: 160.0,
            kokum_price: Some(120.0),
            coconut_price: Some(25.0),
            banana_price: Some(40.0),
            source: None,
        }
    }

    /// Quote used when the feed cannot be read
    pub fn fallback() -> Self {
        Self {
            red_arecanut_price: 145.0,
            white_arecanut_price: 155.0,
            kokum_price: Some(115.0),
            coconut_price: Some(23.0),
            banana_price: Some(38.0),
            source: Some(FALLBACK_SOURCE.to_string()),
        }
    }

    fn validate(self) -> Result<Self, FeedError> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        if ok(self.red_arecanut_price) && ok(self.white_arecanut_price) {
            Ok(self)
        } else {
            Err(FeedError::Invalid(format!(
                "red={} white={}",
                self.red_arecanut_price, self.white_arecanut_price
            )))
        }
    }
}

struct CachedQuote {
    day: NaiveDate,
    quote: PriceQuote,
}

lazy_static::lazy_static! {
    /// Fetched quotes keyed by feed URL, valid for one IST day
    static ref QUOTE_CACHE: RwLock<HashMap<String, CachedQuote>> = RwLock::new(HashMap::new());
}

fn cached_quote(url: &str, today: NaiveDate) -> Option<PriceQuote> {
    let cache = QUOTE_CACHE.read().ok()?;
    cache
        .get(url)
        .filter(|entry| entry.day == today)
        .map(|entry| entry.quote.clone())
}

fn cache_quote(url: &str, today: NaiveDate, quote: &PriceQuote) {
    if let Ok(mut cache) = QUOTE_CACHE.write() {
        cache.insert(
            url.to_string(),
            CachedQuote {
                day: today,
                quote: quote.clone(),
            },
        );
    }
}

/// Source of today's price quote
pub struct PriceFeed {
    url: Option<String>,
    client: reqwest::Client,
}

impl PriceFeed {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self) -> Result<PriceQuote, FeedError> {
        let Some(url) = &self.url else {
            return Ok(PriceQuote::mangalore());
        };

        let today = clock::now_ist().date_naive();
        if let Some(quote) = cached_quote(url, today) {
            return Ok(quote);
        }

        let quote: PriceQuote = self
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let quote = quote.validate()?;

        tracing::info!(
            "Fetched price quote from {}: red {} white {}",
            url,
            quote.red_arecanut_price,
            quote.white_arecanut_price
        );
        cache_quote(url, today, &quote);
        Ok(quote)
    }

    /// Today's quote; never fails
    pub async fn current_quote(&self) -> PriceQuote {
        match self.fetch().await {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!("Price feed unavailable, using fallback prices: {}", e);
                PriceQuote::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_quote_without_url() {
        let feed = PriceFeed::new(None);
        let quote = feed.current_quote().await;
        assert_eq!(quote, PriceQuote::mangalore());
        assert!(quote.source.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_feed_falls_back() {
        // Port 9 on localhost is discard; nothing should be listening
        let feed = PriceFeed::new(Some("http://127.0.0.1:9/prices.json".to_string()));
        let quote = feed.current_quote().await;
        assert_eq!(quote.red_arecanut_price, 145.0);
        assert_eq!(quote.source.as_deref(), Some(FALLBACK_SOURCE));
    }

    #[test]
    fn test_quote_parsing_optional_fields() {
        let quote: PriceQuote =
            serde_json::from_str(r#"{"red_arecanut_price": 410.5, "white_arecanut_price": 480}"#).unwrap();
        assert_eq!(quote.white_arecanut_price, 480.0);
        assert!(quote.kokum_price.is_none());
        assert!(quote.validate().is_ok());
    }

    #[test]
    fn test_invalid_quote_rejected() {
        let mut quote = PriceQuote::mangalore();
        quote.red_arecanut_price = 0.0;
        assert!(matches!(quote.validate(), Err(FeedError::Invalid(_))));
    }

    #[test]
    fn test_cache_is_per_day() {
        let url = "http://cache.test/quote";
        let day = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        cache_quote(url, day, &PriceQuote::mangalore());
        assert!(cached_quote(url, day).is_some());
        assert!(cached_quote(url, day.succ_opt().unwrap()).is_none());
    }
}
