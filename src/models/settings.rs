//! System settings data types

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::{parse_text, UnknownVariant};

/// How a setting value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Text,
    Number,
    Boolean,
    Json,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Text => "text",
            SettingType::Number => "number",
            SettingType::Boolean => "boolean",
            SettingType::Json => "json",
        }
    }
}

impl std::str::FromStr for SettingType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(SettingType::Text),
            "number" => Ok(SettingType::Number),
            "boolean" => Ok(SettingType::Boolean),
            "json" => Ok(SettingType::Json),
            _ => Err(UnknownVariant::new("setting type", s)),
        }
    }
}

impl FromSql for SettingType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

impl ToSql for SettingType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Settings page section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingCategory {
    General,
    Detection,
    Irrigation,
    Notifications,
}

impl SettingCategory {
    pub const ALL: [SettingCategory; 4] = [
        SettingCategory::General,
        SettingCategory::Detection,
        SettingCategory::Irrigation,
        SettingCategory::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingCategory::General => "general",
            SettingCategory::Detection => "detection",
            SettingCategory::Irrigation => "irrigation",
            SettingCategory::Notifications => "notifications",
        }
    }
}

impl std::str::FromStr for SettingCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(SettingCategory::General),
            "detection" => Ok(SettingCategory::Detection),
            "irrigation" => Ok(SettingCategory::Irrigation),
            "notifications" => Ok(SettingCategory::Notifications),
            _ => Err(UnknownVariant::new("setting category", s)),
        }
    }
}

impl FromSql for SettingCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

/// Stored setting
#[derive(Debug, Clone, Serialize)]
pub struct SystemSetting {
    pub id: i64,
    pub setting_key: String,
    pub setting_value: Option<String>,
    pub setting_type: SettingType,
    pub category: SettingCategory,
    pub description: Option<String>,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

impl SystemSetting {
    /// Interpret the value as a boolean flag
    pub fn as_bool(&self) -> Option<bool> {
        match self.setting_value.as_deref()?.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Interpret the value as a number
    pub fn as_f64(&self) -> Option<f64> {
        self.setting_value.as_deref()?.trim().parse().ok()
    }
}
