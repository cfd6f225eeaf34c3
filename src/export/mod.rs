//! Admin data export
//!
//! Users, detections and settings as pretty JSON or CSV, built in memory
//! and returned as a download.

pub mod csv_export;
pub mod json_export;

use chrono::DateTime;
use chrono_tz::Tz;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::db::queries;
use crate::models::detection::DetectionWithUser;
use crate::models::settings::{SettingCategory, SettingType, SystemSetting};
use crate::models::user::{User, UserType};
use crate::AppError;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[default]
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(AppError::Validation(format!(
                "Invalid export format: {}. Use 'csv' or 'json'",
                s
            ))),
        }
    }
}

impl ExportFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

/// What to export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Users,
    Detections,
    Settings,
}

impl std::str::FromStr for ExportType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(ExportType::Users),
            "detections" => Ok(ExportType::Detections),
            "settings" => Ok(ExportType::Settings),
            _ => Err(AppError::Validation("Invalid export type!".into())),
        }
    }
}

impl ExportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Users => "users",
            ExportType::Detections => "detections",
            ExportType::Settings => "settings",
        }
    }
}

/// Stored timestamps are exported as `YYYY-MM-DD HH:MM:SS` IST
fn export_timestamp(value: &str) -> String {
    clock::parse_timestamp(value)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Exportable user record (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportableUser {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub farm_size: Option<String>,
    pub user_type: UserType,
    pub created_at: String,
}

impl From<&User> for ExportableUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            location: user.location.clone(),
            farm_size: user.farm_size.clone(),
            user_type: user.user_type,
            created_at: export_timestamp(&user.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportableDetection {
    pub id: i64,
    pub user_id: i64,
    pub disease_name: Option<String>,
    pub severity: Option<String>,
    pub confidence: Option<f64>,
    pub location: Option<String>,
    pub detected_at: String,
}

impl From<&DetectionWithUser> for ExportableDetection {
    fn from(entry: &DetectionWithUser) -> Self {
        let d = &entry.detection;
        Self {
            id: d.id,
            user_id: d.user_id,
            disease_name: d.disease_name.clone(),
            severity: d.severity.clone(),
            confidence: d.confidence,
            location: d.location.clone(),
            detected_at: export_timestamp(&d.detected_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportableSetting {
    pub key: String,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub category: SettingCategory,
    pub description: Option<String>,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

impl From<&SystemSetting> for ExportableSetting {
    fn from(setting: &SystemSetting) -> Self {
        Self {
            key: setting.setting_key.clone(),
            value: setting.setting_value.clone(),
            setting_type: setting.setting_type,
            category: setting.category,
            description: setting.description.clone(),
            updated_at: export_timestamp(&setting.updated_at),
            updated_by: setting.updated_by.clone(),
        }
    }
}

/// Generate a timestamped filename for exports
pub fn generate_export_filename(export_type: ExportType, format: ExportFormat, now: &DateTime<Tz>) -> String {
    format!(
        "{}_export_{}.{}",
        export_type.as_str(),
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// A finished export ready to send
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

fn encode<T: Serialize>(records: &[T], format: ExportFormat) -> Result<Vec<u8>, AppError> {
    match format {
        ExportFormat::Json => json_export::write_json(records),
        ExportFormat::Csv => csv_export::write_csv(records),
    }
}

/// Export one table in the requested format
pub fn export(
    conn: &Connection,
    export_type: ExportType,
    format: ExportFormat,
    now: &DateTime<Tz>,
) -> Result<ExportFile, AppError> {
    let body = match export_type {
        ExportType::Users => {
            let users: Vec<ExportableUser> = queries::list_users(conn)?.iter().map(Into::into).collect();
            encode(&users, format)?
        }
        ExportType::Detections => {
            let detections: Vec<ExportableDetection> = queries::list_all_detections(conn, None)?
                .iter()
                .map(Into::into)
                .collect();
            encode(&detections, format)?
        }
        ExportType::Settings => {
            let settings: Vec<ExportableSetting> =
                queries::list_settings(conn)?.iter().map(Into::into).collect();
            encode(&settings, format)?
        }
    };

    tracing::info!("Exported {} as {} ({} bytes)", export_type.as_str(), format.extension(), body.len());

    Ok(ExportFile {
        filename: generate_export_filename(export_type, format, now),
        content_type: format.content_type(),
        body,
    })
}
