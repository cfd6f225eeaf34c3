//! Treatment advice for a diagnosis

use serde::Serialize;

use super::analyzer::{FRUIT_ROT, YELLOW_LEAF_DISEASE};

/// Rain chance above which spraying is discouraged
pub const SPRAY_RAIN_LIMIT: u32 = 60;

pub const RAIN_WARNING: &str =
    "Do not spray today, rain expected. Spraying safe tomorrow between 6-10 AM.";
pub const SPRAY_OK: &str = "Weather is favorable for spraying. Best time: 7 AM - 11 AM.";

/// Advice attached to a detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub treatment: &'static str,
    pub severity: &'static str,
    pub preventive: &'static str,
}

/// Advice for a disease name at a given confidence (percent).
/// Unknown names get the healthy advice.
pub fn for_disease(disease_name: &str, confidence: f64) -> Recommendation {
    match disease_name {
        YELLOW_LEAF_DISEASE => Recommendation {
            treatment: "Apply Bordeaux mixture (1%) or Copper oxychloride (0.3%). Ensure proper drainage and avoid waterlogging.",
            severity: if confidence > 85.0 { "moderate" } else { "mild" },
            preventive: "Maintain soil pH between 5.5-6.5. Apply organic manure regularly. Ensure adequate spacing between plants.",
        },
        FRUIT_ROT => Recommendation {
            treatment: "Spray Carbendazim (0.1%) or Mancozeb (0.25%). Remove and destroy infected fruits immediately.",
            severity: if confidence > 90.0 { "severe" } else { "moderate" },
            preventive: "Improve air circulation. Avoid overhead irrigation. Apply prophylactic sprays during monsoon.",
        },
        _ => Recommendation {
            treatment: "No treatment required. Your crop looks healthy!",
            severity: "None",
            preventive: "Continue regular monitoring. Maintain good cultural practices.",
        },
    }
}

/// Spraying advice for today's rain chance (0..=100)
pub fn weather_warning(rain_chance: u32) -> &'static str {
    if rain_chance > SPRAY_RAIN_LIMIT {
        RAIN_WARNING
    } else {
        SPRAY_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yellow_leaf_severity_threshold() {
        assert_eq!(for_disease(YELLOW_LEAF_DISEASE, 85.0).severity, "mild");
        assert_eq!(for_disease(YELLOW_LEAF_DISEASE, 85.01).severity, "moderate");
        assert!(for_disease(YELLOW_LEAF_DISEASE, 70.0).treatment.contains("Bordeaux"));
    }

    #[test]
    fn test_fruit_rot_severity_threshold() {
        assert_eq!(for_disease(FRUIT_ROT, 90.0).severity, "moderate");
        assert_eq!(for_disease(FRUIT_ROT, 90.5).severity, "severe");
        assert!(for_disease(FRUIT_ROT, 95.0).treatment.contains("Carbendazim"));
    }

    #[test]
    fn test_unknown_disease_gets_healthy_advice() {
        let rec = for_disease("Healthy", 99.0);
        assert_eq!(rec.severity, "None");
        assert_eq!(for_disease("Something else", 50.0), rec);
    }

    #[test]
    fn test_weather_warning_boundary() {
        assert_eq!(weather_warning(60), SPRAY_OK);
        assert_eq!(weather_warning(61), RAIN_WARNING);
        assert_eq!(weather_warning(0), SPRAY_OK);
    }
}
