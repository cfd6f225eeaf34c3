//! Disease detection data types

use serde::{Deserialize, Serialize};

/// Name stored for a detection where no disease was found
pub const HEALTHY: &str = "Healthy";

/// Stored detection record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseDetection {
    pub id: i64,
    pub user_id: i64,
    pub image_path: String,
    pub disease_name: Option<String>,
    pub severity: Option<String>,
    pub confidence: Option<f64>,
    pub location: Option<String>,
    pub detected_at: String,
    pub recommendation: Option<String>,
    pub weather_warning: Option<String>,
}

impl DiseaseDetection {
    pub fn is_healthy(&self) -> bool {
        self.disease_name.as_deref() == Some(HEALTHY)
    }
}

/// Detection joined with the name of the user who uploaded it
#[derive(Debug, Clone, Serialize)]
pub struct DetectionWithUser {
    #[serde(flatten)]
    pub detection: DiseaseDetection,
    pub user_name: String,
}

/// Values for a detection that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewDetection {
    pub user_id: i64,
    pub image_path: String,
    pub disease_name: String,
    pub severity: String,
    pub confidence: f64,
    pub location: String,
    pub recommendation: String,
    pub weather_warning: String,
}

/// Per-user summary shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionInsights {
    pub total: u32,
    pub healthy: u32,
    pub diseased: u32,
    pub health_rate: f64,
    pub recent_disease: Option<String>,
}

impl DetectionInsights {
    /// Build insights from a healthy/total count and the most recent detections
    pub fn new(total: u32, healthy: u32, recent: &[DiseaseDetection]) -> Self {
        let health_rate = if total > 0 {
            ((healthy as f64 / total as f64) * 1000.0).round() / 10.0
        } else {
            0.0
        };

        let recent_disease = recent
            .iter()
            .filter(|d| !d.is_healthy())
            .find_map(|d| d.disease_name.clone());

        Self {
            total,
            healthy,
            diseased: total.saturating_sub(healthy),
            health_rate,
            recent_disease,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(name: &str) -> DiseaseDetection {
        DiseaseDetection {
            id: 1,
            user_id: 1,
            image_path: "static/uploads/x.jpg".to_string(),
            disease_name: Some(name.to_string()),
            severity: None,
            confidence: Some(90.0),
            location: None,
            detected_at: "2025-01-01T00:00:00+05:30".to_string(),
            recommendation: None,
            weather_warning: None,
        }
    }

    #[test]
    fn test_insights_health_rate_rounding() {
        let insights = DetectionInsights::new(3, 1, &[]);
        assert_eq!(insights.health_rate, 33.3);
        assert_eq!(insights.diseased, 2);
    }

    #[test]
    fn test_insights_empty() {
        let insights = DetectionInsights::new(0, 0, &[]);
        assert_eq!(insights.health_rate, 0.0);
        assert!(insights.recent_disease.is_none());
    }

    #[test]
    fn test_recent_disease_skips_healthy() {
        let recent = vec![
            detection(HEALTHY),
            detection("Fruit Rot (Koleroga)"),
            detection("Yellow Leaf Disease"),
        ];
        let insights = DetectionInsights::new(3, 1, &recent);
        assert_eq!(insights.recent_disease.as_deref(), Some("Fruit Rot (Koleroga)"));
    }
}
