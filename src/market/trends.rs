//! Period-over-period price comparison

use serde::{Deserialize, Serialize};

use crate::models::price::MarketPrice;

/// Average red price of a period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodAverage {
    pub samples: u32,
    pub avg_red_price: f64,
    pub avg_white_price: f64,
}

impl PeriodAverage {
    pub fn from_prices<'a>(prices: impl IntoIterator<Item = &'a MarketPrice>) -> Self {
        let mut samples = 0u32;
        let mut red = 0.0;
        let mut white = 0.0;
        for price in prices {
            samples += 1;
            red += price.red_arecanut_price;
            white += price.white_arecanut_price;
        }
        if samples == 0 {
            return Self::default();
        }
        Self {
            samples,
            avg_red_price: red / samples as f64,
            avg_white_price: white / samples as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// Current period compared with the one before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTrend {
    pub current: PeriodAverage,
    pub previous: PeriodAverage,
    /// Positive = prices rose
    pub change_percent: f64,
    pub direction: Direction,
}

impl PriceTrend {
    /// Split `history` at `cutoff`: rows dated at or after it form the current period
    pub fn split_at(history: &[MarketPrice], cutoff: &str) -> Self {
        let (current, previous): (Vec<&MarketPrice>, Vec<&MarketPrice>) =
            history.iter().partition(|p| p.date.as_str() >= cutoff);
        Self::compare(
            PeriodAverage::from_prices(current),
            PeriodAverage::from_prices(previous),
        )
    }

    pub fn compare(current: PeriodAverage, previous: PeriodAverage) -> Self {
        let change_percent = if previous.avg_red_price > 0.0 {
            ((current.avg_red_price - previous.avg_red_price) / previous.avg_red_price) * 100.0
        } else if current.avg_red_price > 0.0 {
            100.0
        } else {
            0.0
        };
        let change_percent = (change_percent * 100.0).round() / 100.0;

        let direction = if change_percent > 0.0 {
            Direction::Up
        } else if change_percent < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        };

        Self {
            current,
            previous,
            change_percent,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(date: &str, red: f64) -> MarketPrice {
        MarketPrice {
            id: 0,
            source: None,
            red_arecanut_price: red,
            white_arecanut_price: red * 1.1,
            grade: None,
            date: date.to_string(),
        }
    }

    #[test]
    fn test_split_and_change() {
        let history = vec![
            price("2025-01-01T10:00:00+05:30", 100.0),
            price("2025-01-02T10:00:00+05:30", 100.0),
            price("2025-01-20T10:00:00+05:30", 110.0),
            price("2025-01-21T10:00:00+05:30", 120.0),
        ];
        let trend = PriceTrend::split_at(&history, "2025-01-15T00:00:00+05:30");
        assert_eq!(trend.current.samples, 2);
        assert_eq!(trend.previous.samples, 2);
        assert_eq!(trend.change_percent, 15.0);
        assert_eq!(trend.direction, Direction::Up);
    }

    #[test]
    fn test_no_previous_period() {
        let history = vec![price("2025-01-20T10:00:00+05:30", 110.0)];
        let trend = PriceTrend::split_at(&history, "2025-01-15T00:00:00+05:30");
        assert_eq!(trend.change_percent, 100.0);
    }

    #[test]
    fn test_empty_history_is_flat() {
        let trend = PriceTrend::split_at(&[], "2025-01-15T00:00:00+05:30");
        assert_eq!(trend.change_percent, 0.0);
        assert_eq!(trend.direction, Direction::Flat);
    }

    #[test]
    fn test_price_drop() {
        let trend = PriceTrend::compare(
            PeriodAverage { samples: 1, avg_red_price: 90.0, avg_white_price: 0.0 },
            PeriodAverage { samples: 1, avg_red_price: 100.0, avg_white_price: 0.0 },
        );
        assert_eq!(trend.change_percent, -10.0);
        assert_eq!(trend.direction, Direction::Down);
    }
}
