//! Database schema definitions
//!
//! Contains SQL for creating all tables and indexes

use rusqlite::{params, Connection};
use super::DbError;
use crate::clock;
use crate::settings::DEFAULT_SETTINGS;

/// SQL schema for all tables
const SCHEMA: &str = r#"
-- Registered farmers and developers (admins)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone TEXT NOT NULL UNIQUE,
    email TEXT UNIQUE,
    name TEXT NOT NULL,
    location TEXT,
    farm_size TEXT,
    user_type TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_type ON users(user_type);

-- Login sessions
CREATE TABLE IF NOT EXISTS auth_sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_auth_sessions_user ON auth_sessions(user_id);

-- Uploaded leaf/fruit images and their analysis
CREATE TABLE IF NOT EXISTS disease_detections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    image_path TEXT NOT NULL,
    disease_name TEXT,
    severity TEXT,
    confidence REAL,
    location TEXT,
    detected_at TEXT NOT NULL,
    recommendation TEXT,
    weather_warning TEXT
);

CREATE INDEX IF NOT EXISTS idx_detections_user ON disease_detections(user_id, detected_at DESC);
CREATE INDEX IF NOT EXISTS idx_detections_time ON disease_detections(detected_at DESC);

-- Irrigation actions and moisture readings
CREATE TABLE IF NOT EXISTS irrigation_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    soil_moisture REAL,
    pump_status TEXT NOT NULL,
    action_type TEXT NOT NULL,
    message TEXT,
    logged_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_irrigation_user ON irrigation_logs(user_id, logged_at DESC);

-- Arecanut market prices
CREATE TABLE IF NOT EXISTS market_prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT,
    red_arecanut_price REAL NOT NULL,
    white_arecanut_price REAL NOT NULL,
    grade TEXT,
    date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_market_prices_date ON market_prices(date);

-- One pump per user
CREATE TABLE IF NOT EXISTS pump_status (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'OFF',
    updated_at TEXT NOT NULL
);

-- Admin-editable configuration
CREATE TABLE IF NOT EXISTS system_settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    setting_key TEXT NOT NULL UNIQUE,
    setting_value TEXT,
    setting_type TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT,
    updated_at TEXT NOT NULL,
    updated_by TEXT
);
"#;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Insert the default system settings when the table is empty
pub fn insert_default_settings(conn: &Connection) -> Result<usize, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM system_settings", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(0);
    }

    let now = clock::now_rfc3339();
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO system_settings (
            setting_key, setting_value, setting_type, category, description, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?;

    for default in DEFAULT_SETTINGS {
        stmt.execute(params![
            default.key,
            default.value,
            default.setting_type.as_str(),
            default.category.as_str(),
            default.description,
            now
        ])?;
    }

    Ok(DEFAULT_SETTINGS.len())
}
