//! System settings
//!
//! Default values, typed lookups, and the admin update/reset flows.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries::{self, SystemStats};
use crate::models::detection::DetectionWithUser;
use crate::models::settings::{SettingCategory, SettingType, SystemSetting};
use crate::models::user::User;
use crate::AppError;

pub const SITE_NAME: &str = "site_name";
pub const MAX_UPLOAD_SIZE: &str = "max_upload_size";
pub const IRRIGATION_AUTO_MODE: &str = "irrigation_auto_mode";
pub const SOIL_MOISTURE_THRESHOLD: &str = "soil_moisture_threshold";
pub const MAINTENANCE_MODE: &str = "maintenance_mode";
pub const USER_REGISTRATION: &str = "user_registration";
pub const SESSION_TIMEOUT: &str = "session_timeout";

/// Prefix of form fields that carry a setting value
const FIELD_PREFIX: &str = "setting_";

/// A setting inserted on first start
#[derive(Debug, Clone, Copy)]
pub struct DefaultSetting {
    pub key: &'static str,
    pub value: &'static str,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    pub description: &'static str,
}

const fn default(
    key: &'static str,
    value: &'static str,
    setting_type: SettingType,
    category: SettingCategory,
    description: &'static str,
) -> DefaultSetting {
    DefaultSetting {
        key,
        value,
        setting_type,
        category,
        description,
    }
}

pub const DEFAULT_SETTINGS: [DefaultSetting; 12] = [
    default(SITE_NAME, "Adike Mitra", SettingType::Text, SettingCategory::General, "Application name"),
    default("site_tagline", "Smart Arecanut Farm Management", SettingType::Text, SettingCategory::General, "Site tagline"),
    default(MAX_UPLOAD_SIZE, "16", SettingType::Number, SettingCategory::General, "Maximum file upload size in MB"),
    default("detection_confidence_threshold", "0.75", SettingType::Number, SettingCategory::Detection, "Minimum confidence for disease detection"),
    default("enable_notifications", "true", SettingType::Boolean, SettingCategory::Notifications, "Enable system notifications"),
    default(IRRIGATION_AUTO_MODE, "true", SettingType::Boolean, SettingCategory::Irrigation, "Enable automatic irrigation"),
    default(SOIL_MOISTURE_THRESHOLD, "30", SettingType::Number, SettingCategory::Irrigation, "Soil moisture threshold for irrigation (%)"),
    default(MAINTENANCE_MODE, "false", SettingType::Boolean, SettingCategory::General, "Enable maintenance mode"),
    default(USER_REGISTRATION, "true", SettingType::Boolean, SettingCategory::General, "Allow new user registration"),
    default(SESSION_TIMEOUT, "60", SettingType::Number, SettingCategory::General, "Session timeout in minutes"),
    default("ai_model_version", "v3.0", SettingType::Text, SettingCategory::Detection, "AI model version"),
    default("backup_frequency", "daily", SettingType::Text, SettingCategory::General, "Database backup frequency"),
];

/// Default value for a known key
pub fn default_value(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS
        .iter()
        .find(|d| d.key == key)
        .map(|d| d.value)
}

/// Read a boolean setting, falling back to its default
pub fn flag(conn: &Connection, key: &str) -> Result<bool, AppError> {
    let stored = queries::get_setting(conn, key)?.and_then(|s| s.as_bool());
    Ok(stored.unwrap_or_else(|| default_value(key) == Some("true")))
}

/// Read a numeric setting, falling back to its default
pub fn number(conn: &Connection, key: &str) -> Result<f64, AppError> {
    let stored = queries::get_setting(conn, key)?.and_then(|s| s.as_f64());
    Ok(stored
        .or_else(|| default_value(key).and_then(|v| v.parse().ok()))
        .unwrap_or(0.0))
}

/// Settings page contents
#[derive(Debug, Clone, Serialize)]
pub struct SettingsOverview {
    pub general_settings: Vec<SystemSetting>,
    pub detection_settings: Vec<SystemSetting>,
    pub irrigation_settings: Vec<SystemSetting>,
    pub notification_settings: Vec<SystemSetting>,
    #[serde(flatten)]
    pub stats: SystemStats,
    pub recent_users: Vec<User>,
    pub recent_detections: Vec<DetectionWithUser>,
}

/// Collect every settings group plus recent activity
pub fn overview(conn: &Connection) -> Result<SettingsOverview, AppError> {
    let mut groups: HashMap<SettingCategory, Vec<SystemSetting>> = HashMap::new();
    for category in SettingCategory::ALL {
        groups.insert(category, queries::list_settings_by_category(conn, category)?);
    }
    let mut take = |category| groups.remove(&category).unwrap_or_default();

    Ok(SettingsOverview {
        general_settings: take(SettingCategory::General),
        detection_settings: take(SettingCategory::Detection),
        irrigation_settings: take(SettingCategory::Irrigation),
        notification_settings: take(SettingCategory::Notifications),
        stats: queries::system_stats(conn)?,
        recent_users: queries::recent_users(conn, 5)?,
        recent_detections: queries::list_all_detections(conn, Some(5))?,
    })
}

/// Normalize a submitted value for the setting's type
fn normalize_value(setting: &SystemSetting, raw: &str) -> Result<String, AppError> {
    match setting.setting_type {
        SettingType::Boolean => Ok(if raw == "on" { "true" } else { "false" }.to_string()),
        SettingType::Number => {
            raw.trim().parse::<f64>().map_err(|_| {
                AppError::Validation(format!(
                    "Setting \"{}\" must be a number, got \"{}\"",
                    setting.setting_key, raw
                ))
            })?;
            Ok(raw.trim().to_string())
        }
        SettingType::Json => {
            serde_json::from_str::<serde_json::Value>(raw).map_err(|e| {
                AppError::Validation(format!(
                    "Setting \"{}\" must be valid JSON: {}",
                    setting.setting_key, e
                ))
            })?;
            Ok(raw.to_string())
        }
        SettingType::Text => Ok(raw.to_string()),
    }
}

/// Apply `setting_<key>` form fields.
///
/// Run inside a transaction: any invalid value aborts the whole update.
/// Returns how many settings were written.
pub fn apply_update(
    conn: &Connection,
    fields: &HashMap<String, String>,
    updated_by: &str,
) -> Result<usize, AppError> {
    let mut updated = 0;

    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();

    for field in keys {
        let Some(key) = field.strip_prefix(FIELD_PREFIX) else {
            continue;
        };
        let Some(setting) = queries::get_setting(conn, key)? else {
            tracing::debug!("Ignoring unknown setting field: {}", field);
            continue;
        };

        let value = normalize_value(&setting, &fields[field])?;
        queries::set_setting_value(conn, key, &value, Some(updated_by))?;
        updated += 1;
    }

    tracing::info!("{} updated {} settings", updated_by, updated);
    Ok(updated)
}

/// Outcome of a reset request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResetOutcome {
    Reset { key: String, value: String },
    NoDefault { key: String },
}

/// Restore a setting to its default value
pub fn reset(conn: &Connection, key: &str, updated_by: &str) -> Result<ResetOutcome, AppError> {
    if queries::get_setting(conn, key)?.is_none() {
        return Err(AppError::NotFound(format!("Setting \"{}\" not found", key)));
    }

    match default_value(key) {
        Some(value) => {
            queries::set_setting_value(conn, key, value, Some(updated_by))?;
            tracing::info!("{} reset setting {} to {}", updated_by, key, value);
            Ok(ResetOutcome::Reset {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
        None => Ok(ResetOutcome::NoDefault {
            key: key.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_value_lookup() {
        assert_eq!(default_value(SITE_NAME), Some("Adike Mitra"));
        assert_eq!(default_value(SESSION_TIMEOUT), Some("60"));
        assert_eq!(default_value("nope"), None);
    }

    #[test]
    fn test_flag_and_number_reads() {
        let db = setup();
        db.with_connection(|conn| {
            assert!(flag(conn, USER_REGISTRATION).unwrap());
            assert!(!flag(conn, MAINTENANCE_MODE).unwrap());
            assert_eq!(number(conn, SOIL_MOISTURE_THRESHOLD).unwrap(), 30.0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_update_stores_booleans_and_text() {
        let db = setup();
        let fields = form(&[
            ("setting_maintenance_mode", "on"),
            ("setting_user_registration", "off"),
            ("setting_site_name", "Adike Mitra Pro"),
            ("setting_unknown", "x"),
            ("csrf", "ignored"),
        ]);

        let updated: usize = db
            .with_transaction(|conn| apply_update(conn, &fields, "Admin"))
            .unwrap();
        assert_eq!(updated, 3);

        db.with_connection(|conn| {
            assert!(flag(conn, MAINTENANCE_MODE).unwrap());
            assert!(!flag(conn, USER_REGISTRATION).unwrap());
            let name = queries::get_setting(conn, SITE_NAME)?.unwrap();
            assert_eq!(name.setting_value.as_deref(), Some("Adike Mitra Pro"));
            assert_eq!(name.updated_by.as_deref(), Some("Admin"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_invalid_number_rolls_back_whole_update() {
        let db = setup();
        let fields = form(&[
            ("setting_site_name", "Changed"),
            ("setting_session_timeout", "soon"),
        ]);

        let result: Result<usize, AppError> =
            db.with_transaction(|conn| apply_update(conn, &fields, "Admin"));
        assert!(matches!(result, Err(AppError::Validation(_))));

        db.with_connection(|conn| {
            let name = queries::get_setting(conn, SITE_NAME)?.unwrap();
            assert_eq!(name.setting_value.as_deref(), Some("Adike Mitra"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_reset_restores_default() {
        let db = setup();
        db.with_connection(|conn| {
            queries::set_setting_value(conn, SESSION_TIMEOUT, "5", None)?;
            Ok(())
        })
        .unwrap();

        let outcome = db
            .with_connection(|conn| Ok(reset(conn, SESSION_TIMEOUT, "Admin")))
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            ResetOutcome::Reset {
                key: SESSION_TIMEOUT.to_string(),
                value: "60".to_string()
            }
        );
    }

    #[test]
    fn test_reset_unknown_key_is_not_found() {
        let db = setup();
        let result = db
            .with_connection(|conn| Ok(reset(conn, "missing", "Admin")))
            .unwrap();
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_overview_groups() {
        let db = setup();
        let overview = db.with_connection(|conn| Ok(overview(conn))).unwrap().unwrap();
        assert_eq!(overview.general_settings.len(), 7);
        assert_eq!(overview.detection_settings.len(), 2);
        assert_eq!(overview.irrigation_settings.len(), 2);
        assert_eq!(overview.notification_settings.len(), 1);
    }
}
