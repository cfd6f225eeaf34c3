//! Simulated weather and spraying advisory

use chrono::{DateTime, Duration as ChronoDuration};
use chrono_tz::Tz;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

pub const DEFAULT_LOCATION: &str = "Mangalore, Karnataka";
pub const FORECAST_DAYS: i64 = 7;

const CONDITIONS: [&str; 4] = ["Sunny", "Cloudy", "Rainy", "Partly Cloudy"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentWeather {
    pub temperature: u32,
    pub humidity: u32,
    pub rain_probability: u32,
    pub wind_speed: f64,
    pub condition: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: String,
    pub day: String,
    pub temp_max: u32,
    pub temp_min: u32,
    pub rain_probability: u32,
    pub condition: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub risk_level: RiskLevel,
    pub advisory: &'static str,
}

/// Everything on the weather page
#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub location: String,
    pub current_weather: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
    #[serde(flatten)]
    pub advisory: Advisory,
}

fn condition<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    CONDITIONS.choose(rng).copied().unwrap_or("Sunny")
}

pub fn current<R: Rng + ?Sized>(rng: &mut R) -> CurrentWeather {
    CurrentWeather {
        temperature: rng.gen_range(25..=35),
        humidity: rng.gen_range(60..=90),
        rain_probability: rng.gen_range(0..=100),
        wind_speed: (rng.gen_range(5.0..20.0_f64) * 10.0).round() / 10.0,
        condition: condition(rng),
    }
}

/// Seven days starting at `today`
pub fn forecast<R: Rng + ?Sized>(rng: &mut R, today: &DateTime<Tz>) -> Vec<ForecastDay> {
    (0..FORECAST_DAYS)
        .map(|offset| {
            let date = *today + ChronoDuration::days(offset);
            ForecastDay {
                date: date.format("%Y-%m-%d").to_string(),
                day: date.format("%A").to_string(),
                temp_max: rng.gen_range(28..=35),
                temp_min: rng.gen_range(20..=26),
                rain_probability: rng.gen_range(0..=100),
                condition: condition(rng),
            }
        })
        .collect()
}

/// Spraying advice for today's rain chance
pub fn advisory(rain_probability: u32) -> Advisory {
    if rain_probability > 60 {
        Advisory {
            risk_level: RiskLevel::High,
            advisory: "Rain expected today - avoid pesticide spraying. Best time to spray: Tomorrow 7 AM - 11 AM.",
        }
    } else if rain_probability > 30 {
        Advisory {
            risk_level: RiskLevel::Medium,
            advisory: "Moderate rain chance. Monitor weather closely before spraying.",
        }
    } else {
        Advisory {
            risk_level: RiskLevel::Low,
            advisory: "Weather favorable for spraying. Best time: 7 AM - 11 AM.",
        }
    }
}

/// Build the page for a user's location (blank falls back to Mangalore)
pub fn report<R: Rng + ?Sized>(rng: &mut R, location: Option<&str>, today: &DateTime<Tz>) -> WeatherReport {
    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LOCATION)
        .to_string();

    let current_weather = current(rng);
    let forecast = forecast(rng, today);
    let advisory = advisory(current_weather.rain_probability);

    WeatherReport {
        location,
        current_weather,
        forecast,
        advisory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Kolkata;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn today() -> DateTime<Tz> {
        // A Monday
        Kolkata.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_current_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let w = current(&mut rng);
            assert!((25..=35).contains(&w.temperature));
            assert!((60..=90).contains(&w.humidity));
            assert!(w.rain_probability <= 100);
            assert!(w.wind_speed >= 5.0 && w.wind_speed <= 20.0);
            assert_eq!((w.wind_speed * 10.0).round(), w.wind_speed * 10.0);
            assert!(CONDITIONS.contains(&w.condition));
        }
    }

    #[test]
    fn test_forecast_dates_and_ranges() {
        let mut rng = StdRng::seed_from_u64(1);
        let days = forecast(&mut rng, &today());
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, "2025-06-02");
        assert_eq!(days[0].day, "Monday");
        assert_eq!(days[6].date, "2025-06-08");
        assert_eq!(days[6].day, "Sunday");
        for d in &days {
            assert!((28..=35).contains(&d.temp_max));
            assert!((20..=26).contains(&d.temp_min));
        }
    }

    #[test]
    fn test_advisory_boundaries() {
        assert_eq!(advisory(30).risk_level, RiskLevel::Low);
        assert_eq!(advisory(31).risk_level, RiskLevel::Medium);
        assert_eq!(advisory(60).risk_level, RiskLevel::Medium);
        assert_eq!(advisory(61).risk_level, RiskLevel::High);
    }

    #[test]
    fn test_report_is_deterministic_for_seed() {
        let a = report(&mut StdRng::seed_from_u64(42), Some("Sirsi"), &today());
        let b = report(&mut StdRng::seed_from_u64(42), Some("Sirsi"), &today());
        assert_eq!(a.current_weather, b.current_weather);
        assert_eq!(a.forecast, b.forecast);
        assert_eq!(a.location, "Sirsi");
        assert_eq!(a.advisory, advisory(a.current_weather.rain_probability));
    }

    #[test]
    fn test_default_location() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(report(&mut rng, None, &today()).location, DEFAULT_LOCATION);
        assert_eq!(report(&mut rng, Some("  "), &today()).location, DEFAULT_LOCATION);
    }
}
