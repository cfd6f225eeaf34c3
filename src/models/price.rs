//! Market price data types

use serde::{Deserialize, Serialize};

/// Source recorded for scraped and seeded prices
pub const DEFAULT_SOURCE: &str = "CAMPCO Mangalore";
/// Grade recorded for scraped and seeded prices
pub const DEFAULT_GRADE: &str = "Grade A";

/// Stored price row (prices in rupees per kg)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPrice {
    pub id: i64,
    pub source: Option<String>,
    pub red_arecanut_price: f64,
    pub white_arecanut_price: f64,
    pub grade: Option<String>,
    pub date: String,
}

/// Values for a price row that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewMarketPrice {
    pub source: String,
    pub red_arecanut_price: f64,
    pub white_arecanut_price: f64,
    pub grade: String,
    pub date: String,
}
