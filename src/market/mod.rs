//! Market prices
//!
//! Keeps one CAMPCO row per day up to date from the price feed, seeds a
//! month of history on first start, and serves chart data, trend and
//! prediction views.

pub mod feed;
pub mod prediction;
pub mod trends;

use std::fmt;

use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::db::{queries, DbError};
use crate::models::price::{MarketPrice, NewMarketPrice, DEFAULT_GRADE, DEFAULT_SOURCE};
use crate::{AppError, SharedState};

use feed::PriceQuote;
use prediction::{PredictedPrice, PredictionMethod};
use trends::PriceTrend;

/// Days of history seeded and charted
pub const HISTORY_DAYS: i64 = 30;
/// Days in each half of the trend comparison
pub const TREND_PERIOD_DAYS: i64 = 15;
const SEED_VARIATION: f64 = 0.05;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceAction {
    Created,
    Updated,
}

impl fmt::Display for PriceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriceAction::Created => "created",
            PriceAction::Updated => "updated",
        })
    }
}

/// Result of a price refresh
#[derive(Debug, Clone, Serialize)]
pub struct PriceUpdate {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<PriceAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PriceQuote>,
    pub message: String,
}

/// Write a quote as today's row: update it if present, insert otherwise
pub fn store_quote(conn: &Connection, quote: &PriceQuote) -> Result<PriceAction, DbError> {
    let now = clock::now_rfc3339();

    match queries::first_market_price_since(conn, &clock::start_of_today_rfc3339())? {
        Some(existing) => {
            queries::update_market_price(
                conn,
                existing.id,
                quote.red_arecanut_price,
                quote.white_arecanut_price,
                &now,
            )?;
            Ok(PriceAction::Updated)
        }
        None => {
            queries::insert_market_price(
                conn,
                &NewMarketPrice {
                    source: DEFAULT_SOURCE.to_string(),
                    red_arecanut_price: quote.red_arecanut_price,
                    white_arecanut_price: quote.white_arecanut_price,
                    grade: DEFAULT_GRADE.to_string(),
                    date: now,
                },
            )?;
            Ok(PriceAction::Created)
        }
    }
}

/// Fetch today's quote and store it. Failures are reported, not raised.
pub async fn update_market_prices(state: &SharedState) -> PriceUpdate {
    let quote = state.feed.current_quote().await;

    match state.db.with_connection(|conn| store_quote(conn, &quote)) {
        Ok(action) => {
            tracing::info!("Market prices {}", action);
            PriceUpdate {
                success: true,
                action: Some(action),
                data: Some(quote),
                message: format!("Prices {} successfully", action),
            }
        }
        Err(e) => {
            tracing::error!("Error updating market prices: {}", e);
            PriceUpdate {
                success: false,
                action: None,
                data: None,
                message: format!("Failed to update prices: {}", e),
            }
        }
    }
}

/// Insert `HISTORY_DAYS` daily rows ending yesterday, each scaled by a
/// random factor within ±5 % of the quote
pub fn seed_rows<R: Rng + ?Sized>(
    conn: &Connection,
    quote: &PriceQuote,
    rng: &mut R,
) -> Result<usize, DbError> {
    let mut inserted = 0;
    for days_ago in (1..=HISTORY_DAYS).rev() {
        let variation = rng.gen_range((1.0 - SEED_VARIATION)..=(1.0 + SEED_VARIATION));
        queries::insert_market_price(
            conn,
            &NewMarketPrice {
                source: DEFAULT_SOURCE.to_string(),
                red_arecanut_price: round2(quote.red_arecanut_price * variation),
                white_arecanut_price: round2(quote.white_arecanut_price * variation),
                grade: DEFAULT_GRADE.to_string(),
                date: clock::days_ago_rfc3339(days_ago),
            },
        )?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Seed a month of price history when the table is empty
pub async fn seed_price_history(state: &SharedState) -> Result<usize, AppError> {
    let existing = state.db.with_connection(queries::count_market_prices)?;
    if existing > 0 {
        return Ok(0);
    }

    let quote = state.feed.current_quote().await;
    let inserted = state
        .db
        .with_transaction(|conn| seed_rows(conn, &quote, &mut rand::thread_rng()))?;
    Ok(inserted)
}

/// Chart series, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub red_prices: Vec<f64>,
    pub white_prices: Vec<f64>,
}

impl ChartSeries {
    pub fn from_prices(prices: &[MarketPrice]) -> Self {
        Self {
            labels: prices.iter().map(|p| clock::date_label(&p.date)).collect(),
            red_prices: prices.iter().map(|p| p.red_arecanut_price).collect(),
            white_prices: prices.iter().map(|p| p.white_arecanut_price).collect(),
        }
    }
}

/// Everything on the market page
#[derive(Debug, Clone, Serialize)]
pub struct MarketPage {
    pub latest_prices: Option<MarketPrice>,
    pub chart: ChartSeries,
    pub trend: PriceTrend,
}

fn recent_history(conn: &Connection) -> Result<Vec<MarketPrice>, DbError> {
    queries::market_prices_since(conn, &clock::days_ago_rfc3339(HISTORY_DAYS))
}

fn needs_refresh(latest: Option<&MarketPrice>) -> bool {
    match latest {
        Some(price) => clock::days_since(&price.date).map_or(true, |days| days >= 1),
        None => true,
    }
}

/// Market page, refreshing today's row first when the latest is stale
pub async fn market_page(state: &SharedState) -> Result<MarketPage, AppError> {
    let latest = state.db.with_connection(queries::latest_market_price)?;
    if needs_refresh(latest.as_ref()) {
        let update = update_market_prices(state).await;
        if !update.success {
            tracing::warn!("{}", update.message);
        }
    }

    let page = state.db.with_connection(|conn| {
        let history = recent_history(conn)?;
        Ok(MarketPage {
            latest_prices: queries::latest_market_price(conn)?,
            chart: ChartSeries::from_prices(&history),
            trend: PriceTrend::split_at(&history, &clock::days_ago_rfc3339(TREND_PERIOD_DAYS)),
        })
    })?;
    Ok(page)
}

/// Prediction page contents
#[derive(Debug, Clone, Serialize)]
pub struct PredictionPage {
    pub historical: ChartSeries,
    pub predictions: Vec<PredictedPrice>,
    pub method: PredictionMethod,
}

pub fn prediction_page<R: Rng + ?Sized>(conn: &Connection, rng: &mut R) -> Result<PredictionPage, AppError> {
    let history = recent_history(conn)?;
    let (predictions, method) = prediction::predict(&history, &clock::now_ist(), rng);
    Ok(PredictionPage {
        historical: ChartSeries::from_prices(&history),
        predictions,
        method,
    })
}

/// Manual price entry from the admin panel
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManualPriceForm {
    pub source: String,
    pub red_price: String,
    pub white_price: String,
    pub grade: String,
}

fn parse_price(label: &str, raw: &str) -> Result<f64, AppError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be a number", label)))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::Validation(format!("{} must be positive", label)));
    }
    Ok(value)
}

/// Insert an admin-entered price row and return its id
pub fn add_manual_price(conn: &Connection, form: &ManualPriceForm) -> Result<i64, AppError> {
    let red = parse_price("Red price", &form.red_price)?;
    let white = parse_price("White price", &form.white_price)?;
    let non_empty = |value: &str, default: &str| {
        let value = value.trim();
        if value.is_empty() { default.to_string() } else { value.to_string() }
    };

    let id = queries::insert_market_price(
        conn,
        &NewMarketPrice {
            source: non_empty(&form.source, DEFAULT_SOURCE),
            red_arecanut_price: red,
            white_arecanut_price: white,
            grade: non_empty(&form.grade, DEFAULT_GRADE),
            date: clock::now_rfc3339(),
        },
    )?;
    tracing::info!("Manual market price {} added: red {} white {}", id, red, white);
    Ok(id)
}
