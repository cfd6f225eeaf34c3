//! Fifteen-day price prediction
//!
//! With at least two weeks of history a fixed linear model runs over lag,
//! moving-average and volatility features, feeding each prediction back
//! into the window. Shorter histories get a random walk from the last price.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Weekday};
use chrono_tz::Tz;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::price::MarketPrice;

pub const HORIZON_DAYS: i64 = 15;
/// History needed for the feature model
pub const MIN_FEATURE_HISTORY: usize = 14;
const WINDOW_CAP: usize = 30;
const LOWER_BOUND: f64 = 100.0;
const UPPER_BOUND: f64 = 1000.0;
/// White arecanut trades at a steady premium over red
pub const WHITE_PREMIUM: f64 = 1.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedPrice {
    pub date: String,
    pub red: f64,
    pub white: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    Features,
    Simple,
    None,
}

/// Inputs of the linear model for one day
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFeatures {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub lag_1: f64,
    pub lag_2: f64,
    pub lag_3: f64,
    pub lag_7: f64,
    pub lag_14: f64,
    pub ma_7: f64,
    pub ma_14: f64,
    pub ma_30: f64,
    pub std_7: f64,
    pub std_14: f64,
    pub price_range: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl PriceFeatures {
    /// `window` holds at least 14 recent red prices, newest last
    pub fn build(date: &DateTime<Tz>, window: &[f64], history_red: &[f64]) -> Self {
        let lag = |n: usize| window[window.len() - n];
        let last_7 = tail(window, 7);
        let weekday = date.weekday();

        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            day_of_week: weekday.num_days_from_monday(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            lag_1: lag(1),
            lag_2: lag(2),
            lag_3: lag(3),
            lag_7: lag(7),
            lag_14: lag(14),
            ma_7: mean(last_7),
            ma_14: mean(tail(window, 14)),
            ma_30: mean(tail(history_red, 30)),
            std_7: std_dev(last_7),
            std_14: std_dev(tail(window, 14)),
            price_range: last_7.iter().cloned().fold(f64::MIN, f64::max)
                - last_7.iter().cloned().fold(f64::MAX, f64::min),
        }
    }

    /// Red price estimate
    pub fn estimate(&self) -> f64 {
        let blend = 0.35 * self.lag_1
            + 0.10 * self.lag_2
            + 0.05 * self.lag_3
            + 0.10 * self.lag_7
            + 0.05 * self.lag_14
            + 0.20 * self.ma_7
            + 0.10 * self.ma_14
            + 0.05 * self.ma_30;

        // Wide recent swings pull the estimate back towards the mean
        let volatility = 0.01 * (self.price_range - 2.0 * self.std_7) - 0.005 * self.std_14;

        let calendar = (if self.is_weekend { -0.005 } else { 0.002 }) * self.ma_7;

        blend + volatility + calendar
    }
}

fn feature_predictions<R: Rng + ?Sized>(
    history_red: &[f64],
    today: &DateTime<Tz>,
    rng: &mut R,
) -> Vec<PredictedPrice> {
    let mut window: Vec<f64> = tail(history_red, MIN_FEATURE_HISTORY).to_vec();
    let recent_avg = mean(tail(history_red, 7));

    (1..=HORIZON_DAYS)
        .map(|offset| {
            let date = *today + ChronoDuration::days(offset);
            let features = PriceFeatures::build(&date, &window, history_red);

            let mut red = features.estimate();
            if !(LOWER_BOUND..=UPPER_BOUND).contains(&red) {
                red = recent_avg * (1.0 + rng.gen_range(-0.02..0.02));
            }

            window.push(red);
            if window.len() > WINDOW_CAP {
                window.remove(0);
            }

            PredictedPrice {
                date: date.format("%Y-%m-%d").to_string(),
                red: round2(red),
                white: round2(red * WHITE_PREMIUM),
            }
        })
        .collect()
}

fn simple_predictions<R: Rng + ?Sized>(
    last: &MarketPrice,
    today: &DateTime<Tz>,
    rng: &mut R,
) -> Vec<PredictedPrice> {
    (1..=HORIZON_DAYS)
        .map(|offset| {
            let date = *today + ChronoDuration::days(offset);
            PredictedPrice {
                date: date.format("%Y-%m-%d").to_string(),
                red: round2(last.red_arecanut_price + rng.gen_range(-20.0..30.0)),
                white: round2(last.white_arecanut_price + rng.gen_range(-20.0..30.0)),
            }
        })
        .collect()
}

/// Predict the next 15 days from `history` (oldest first)
pub fn predict<R: Rng + ?Sized>(
    history: &[MarketPrice],
    today: &DateTime<Tz>,
    rng: &mut R,
) -> (Vec<PredictedPrice>, PredictionMethod) {
    let Some(last) = history.last() else {
        return (Vec::new(), PredictionMethod::None);
    };

    if history.len() >= MIN_FEATURE_HISTORY {
        let red: Vec<f64> = history.iter().map(|p| p.red_arecanut_price).collect();
        (feature_predictions(&red, today, rng), PredictionMethod::Features)
    } else {
        (simple_predictions(last, today, rng), PredictionMethod::Simple)
    }
}
