//! Database query implementations
//!
//! Contains functions for querying users, login sessions, detections,
//! irrigation logs, market prices and system settings

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::DbError;
use crate::clock;
use crate::models::detection::{DetectionWithUser, DiseaseDetection, NewDetection, HEALTHY};
use crate::models::irrigation::{IrrigationLog, NewIrrigationLog, PumpState, PumpStatus};
use crate::models::price::{MarketPrice, NewMarketPrice};
use crate::models::settings::{SettingCategory, SystemSetting};
use crate::models::user::{AuthSession, NewUser, User, UserType};

/// Row counts shown on the admin pages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemStats {
    pub total_users: u32,
    pub total_detections: u32,
    pub total_irrigation_logs: u32,
    pub total_prices: u32,
}

// ============================================================================
// Users
// ============================================================================

const USER_COLUMNS: &str =
    "id, phone, email, name, location, farm_size, user_type, password_hash, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        phone: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        location: row.get(4)?,
        farm_size: row.get(5)?,
        user_type: row.get(6)?,
        password_hash: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a new user and return its id
pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64, DbError> {
    conn.execute(
        r#"
        INSERT INTO users (
            phone, email, name, location, farm_size, user_type, password_hash, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            user.phone,
            user.email,
            user.name,
            user.location,
            user.farm_size,
            user.user_type,
            user.password_hash,
            clock::now_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a single user by ID
pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let user = conn
        .query_row(&sql, params![user_id], user_from_row)
        .optional()?;
    Ok(user)
}

/// Get a user by phone number
pub fn get_user_by_phone(conn: &Connection, phone: &str) -> Result<Option<User>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = ?1");
    let user = conn
        .query_row(&sql, params![phone], user_from_row)
        .optional()?;
    Ok(user)
}

/// Get a user by email address
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let user = conn
        .query_row(&sql, params![email], user_from_row)
        .optional()?;
    Ok(user)
}

/// Get all users in registration order
pub fn list_users(conn: &Connection) -> Result<Vec<User>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Get the most recently registered users
pub fn recent_users(conn: &Connection, limit: u32) -> Result<Vec<User>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params![limit], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Count users, optionally of one type
pub fn count_users(conn: &Connection, user_type: Option<UserType>) -> Result<u32, DbError> {
    let count: i64 = match user_type {
        Some(t) => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE user_type = ?1",
            params![t],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?,
    };
    Ok(count as u32)
}

/// Overwrite the editable profile fields
pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    name: &str,
    email: Option<&str>,
    location: Option<&str>,
    farm_size: Option<&str>,
) -> Result<(), DbError> {
    conn.execute(
        r#"
        UPDATE users
        SET name = ?2, email = ?3, location = ?4, farm_size = ?5
        WHERE id = ?1
        "#,
        params![user_id, name, email, location, farm_size],
    )?;
    Ok(())
}

/// Replace a user's password hash
pub fn update_password(conn: &Connection, user_id: i64, password_hash: &str) -> Result<(), DbError> {
    conn.execute(
        "UPDATE users SET password_hash = ?2 WHERE id = ?1",
        params![user_id, password_hash],
    )?;
    Ok(())
}

// ============================================================================
// Login sessions
// ============================================================================

/// Store a new login session
pub fn insert_session(conn: &Connection, session: &AuthSession) -> Result<(), DbError> {
    conn.execute(
        r#"
        INSERT INTO auth_sessions (token, user_id, created_at, expires_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![
            session.token,
            session.user_id,
            session.created_at,
            session.expires_at
        ],
    )?;
    Ok(())
}

/// Resolve a session token to its user, ignoring sessions that expired before `now`
pub fn get_session_user(conn: &Connection, token: &str, now: &str) -> Result<Option<User>, DbError> {
    let user = conn
        .query_row(
            r#"
            SELECT u.id, u.phone, u.email, u.name, u.location, u.farm_size,
                   u.user_type, u.password_hash, u.created_at
            FROM auth_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = ?1 AND s.expires_at > ?2
            "#,
            params![token, now],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Remove a login session
pub fn delete_session(conn: &Connection, token: &str) -> Result<(), DbError> {
    conn.execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Remove every session that expired before `now`
pub fn delete_expired_sessions(conn: &Connection, now: &str) -> Result<usize, DbError> {
    let removed = conn.execute("DELETE FROM auth_sessions WHERE expires_at <= ?1", params![now])?;
    Ok(removed)
}

// ============================================================================
// Disease detections
// ============================================================================

const DETECTION_COLUMNS: &str = "d.id, d.user_id, d.image_path, d.disease_name, d.severity, \
     d.confidence, d.location, d.detected_at, d.recommendation, d.weather_warning";

fn detection_from_row(row: &Row<'_>) -> rusqlite::Result<DiseaseDetection> {
    Ok(DiseaseDetection {
        id: row.get(0)?,
        user_id: row.get(1)?,
        image_path: row.get(2)?,
        disease_name: row.get(3)?,
        severity: row.get(4)?,
        confidence: row.get(5)?,
        location: row.get(6)?,
        detected_at: row.get(7)?,
        recommendation: row.get(8)?,
        weather_warning: row.get(9)?,
    })
}

fn detection_with_user_from_row(row: &Row<'_>) -> rusqlite::Result<DetectionWithUser> {
    Ok(DetectionWithUser {
        detection: detection_from_row(row)?,
        user_name: row.get(10)?,
    })
}

/// Insert a detection and return its id
pub fn insert_detection(conn: &Connection, detection: &NewDetection) -> Result<i64, DbError> {
    conn.execute(
        r#"
        INSERT INTO disease_detections (
            user_id, image_path, disease_name, severity, confidence,
            location, detected_at, recommendation, weather_warning
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            detection.user_id,
            detection.image_path,
            detection.disease_name,
            detection.severity,
            detection.confidence,
            detection.location,
            clock::now_rfc3339(),
            detection.recommendation,
            detection.weather_warning
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a detection together with its owner's name
pub fn get_detection(conn: &Connection, detection_id: i64) -> Result<Option<DetectionWithUser>, DbError> {
    let sql = format!(
        r#"
        SELECT {DETECTION_COLUMNS}, u.name
        FROM disease_detections d
        JOIN users u ON u.id = d.user_id
        WHERE d.id = ?1
        "#
    );
    let detection = conn
        .query_row(&sql, params![detection_id], detection_with_user_from_row)
        .optional()?;
    Ok(detection)
}

/// Get a user's detections, newest first
pub fn list_detections_for_user(
    conn: &Connection,
    user_id: i64,
    limit: Option<u32>,
) -> Result<Vec<DiseaseDetection>, DbError> {
    let limit = limit.map(i64::from).unwrap_or(-1);
    let sql = format!(
        r#"
        SELECT {DETECTION_COLUMNS}
        FROM disease_detections d
        WHERE d.user_id = ?1
        ORDER BY d.detected_at DESC, d.id DESC
        LIMIT ?2
        "#
    );
    let mut stmt = conn.prepare(&sql)?;
    let detections = stmt
        .query_map(params![user_id, limit], detection_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(detections)
}

/// Get every detection with owner names, newest first
pub fn list_all_detections(conn: &Connection, limit: Option<u32>) -> Result<Vec<DetectionWithUser>, DbError> {
    let limit = limit.map(i64::from).unwrap_or(-1);
    let sql = format!(
        r#"
        SELECT {DETECTION_COLUMNS}, u.name
        FROM disease_detections d
        JOIN users u ON u.id = d.user_id
        ORDER BY d.detected_at DESC, d.id DESC
        LIMIT ?1
        "#
    );
    let mut stmt = conn.prepare(&sql)?;
    let detections = stmt
        .query_map(params![limit], detection_with_user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(detections)
}

/// Count detections, optionally for one user
pub fn count_detections(conn: &Connection, user_id: Option<i64>) -> Result<u32, DbError> {
    let count: i64 = match user_id {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM disease_detections WHERE user_id = ?1",
            params![id],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM disease_detections", [], |row| row.get(0))?,
    };
    Ok(count as u32)
}

/// Count a user's detections that found no disease
pub fn count_healthy_detections(conn: &Connection, user_id: i64) -> Result<u32, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM disease_detections WHERE user_id = ?1 AND disease_name = ?2",
        params![user_id, HEALTHY],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

/// Delete one detection
pub fn delete_detection(conn: &Connection, detection_id: i64) -> Result<bool, DbError> {
    let removed = conn.execute(
        "DELETE FROM disease_detections WHERE id = ?1",
        params![detection_id],
    )?;
    Ok(removed > 0)
}

/// Delete every detection of a user
pub fn delete_detections_for_user(conn: &Connection, user_id: i64) -> Result<usize, DbError> {
    let removed = conn.execute(
        "DELETE FROM disease_detections WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(removed)
}

// ============================================================================
// Irrigation
// ============================================================================

fn pump_from_row(row: &Row<'_>) -> rusqlite::Result<PumpStatus> {
    Ok(PumpStatus {
        id: row.get(0)?,
        user_id: row.get(1)?,
        status: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn irrigation_log_from_row(row: &Row<'_>) -> rusqlite::Result<IrrigationLog> {
    Ok(IrrigationLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        soil_moisture: row.get(2)?,
        pump_status: row.get(3)?,
        action_type: row.get(4)?,
        message: row.get(5)?,
        logged_at: row.get(6)?,
    })
}

/// Get a user's pump, creating it switched off on first access
pub fn get_or_create_pump(conn: &Connection, user_id: i64) -> Result<PumpStatus, DbError> {
    conn.execute(
        r#"
        INSERT INTO pump_status (user_id, status, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(user_id) DO NOTHING
        "#,
        params![user_id, PumpState::Off, clock::now_rfc3339()],
    )?;

    let pump = conn.query_row(
        "SELECT id, user_id, status, updated_at FROM pump_status WHERE user_id = ?1",
        params![user_id],
        pump_from_row,
    )?;
    Ok(pump)
}

/// Switch a user's pump
pub fn set_pump_status(conn: &Connection, user_id: i64, state: PumpState) -> Result<PumpStatus, DbError> {
    conn.execute(
        r#"
        INSERT INTO pump_status (user_id, status, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(user_id) DO UPDATE SET
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
        params![user_id, state, clock::now_rfc3339()],
    )?;
    get_or_create_pump(conn, user_id)
}

/// Insert an irrigation log entry and return its id
pub fn insert_irrigation_log(conn: &Connection, log: &NewIrrigationLog) -> Result<i64, DbError> {
    conn.execute(
        r#"
        INSERT INTO irrigation_logs (
            user_id, soil_moisture, pump_status, action_type, message, logged_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            log.user_id,
            log.soil_moisture,
            log.pump_status,
            log.action_type,
            log.message,
            clock::now_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a user's latest irrigation log entries, newest first
pub fn recent_irrigation_logs(
    conn: &Connection,
    user_id: i64,
    limit: u32,
) -> Result<Vec<IrrigationLog>, DbError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, user_id, soil_moisture, pump_status, action_type, message, logged_at
        FROM irrigation_logs
        WHERE user_id = ?1
        ORDER BY logged_at DESC, id DESC
        LIMIT ?2
        "#,
    )?;
    let logs = stmt
        .query_map(params![user_id, limit], irrigation_log_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

/// Delete every irrigation log entry of a user
pub fn delete_irrigation_logs_for_user(conn: &Connection, user_id: i64) -> Result<usize, DbError> {
    let removed = conn.execute(
        "DELETE FROM irrigation_logs WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(removed)
}

// ============================================================================
// Market prices
// ============================================================================

fn price_from_row(row: &Row<'_>) -> rusqlite::Result<MarketPrice> {
    Ok(MarketPrice {
        id: row.get(0)?,
        source: row.get(1)?,
        red_arecanut_price: row.get(2)?,
        white_arecanut_price: row.get(3)?,
        grade: row.get(4)?,
        date: row.get(5)?,
    })
}

/// Insert a price row and return its id
pub fn insert_market_price(conn: &Connection, price: &NewMarketPrice) -> Result<i64, DbError> {
    conn.execute(
        r#"
        INSERT INTO market_prices (source, red_arecanut_price, white_arecanut_price, grade, date)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            price.source,
            price.red_arecanut_price,
            price.white_arecanut_price,
            price.grade,
            price.date
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the most recent price row
pub fn latest_market_price(conn: &Connection) -> Result<Option<MarketPrice>, DbError> {
    let price = conn
        .query_row(
            r#"
            SELECT id, source, red_arecanut_price, white_arecanut_price, grade, date
            FROM market_prices
            ORDER BY date DESC, id DESC
            LIMIT 1
            "#,
            [],
            price_from_row,
        )
        .optional()?;
    Ok(price)
}

/// Get the first price row dated at or after `since`
pub fn first_market_price_since(conn: &Connection, since: &str) -> Result<Option<MarketPrice>, DbError> {
    let price = conn
        .query_row(
            r#"
            SELECT id, source, red_arecanut_price, white_arecanut_price, grade, date
            FROM market_prices
            WHERE date >= ?1
            ORDER BY date ASC, id ASC
            LIMIT 1
            "#,
            params![since],
            price_from_row,
        )
        .optional()?;
    Ok(price)
}

/// Overwrite the prices and date of an existing row
pub fn update_market_price(
    conn: &Connection,
    price_id: i64,
    red: f64,
    white: f64,
    date: &str,
) -> Result<(), DbError> {
    conn.execute(
        r#"
        UPDATE market_prices
        SET red_arecanut_price = ?2, white_arecanut_price = ?3, date = ?4
        WHERE id = ?1
        "#,
        params![price_id, red, white, date],
    )?;
    Ok(())
}

/// Get every price row dated at or after `since`, oldest first
pub fn market_prices_since(conn: &Connection, since: &str) -> Result<Vec<MarketPrice>, DbError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, source, red_arecanut_price, white_arecanut_price, grade, date
        FROM market_prices
        WHERE date >= ?1
        ORDER BY date ASC, id ASC
        "#,
    )?;
    let prices = stmt
        .query_map(params![since], price_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(prices)
}

/// Count stored price rows
pub fn count_market_prices(conn: &Connection) -> Result<u32, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM market_prices", [], |row| row.get(0))?;
    Ok(count as u32)
}

// ============================================================================
// System settings
// ============================================================================

const SETTING_COLUMNS: &str = "id, setting_key, setting_value, setting_type, category, \
     description, updated_at, updated_by";

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<SystemSetting> {
    Ok(SystemSetting {
        id: row.get(0)?,
        setting_key: row.get(1)?,
        setting_value: row.get(2)?,
        setting_type: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        updated_at: row.get(6)?,
        updated_by: row.get(7)?,
    })
}

/// Get all settings
pub fn list_settings(conn: &Connection) -> Result<Vec<SystemSetting>, DbError> {
    let sql = format!("SELECT {SETTING_COLUMNS} FROM system_settings ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let settings = stmt
        .query_map([], setting_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(settings)
}

/// Get the settings of one category
pub fn list_settings_by_category(
    conn: &Connection,
    category: SettingCategory,
) -> Result<Vec<SystemSetting>, DbError> {
    let sql = format!("SELECT {SETTING_COLUMNS} FROM system_settings WHERE category = ?1 ORDER BY id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let settings = stmt
        .query_map(params![category.as_str()], setting_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(settings)
}

/// Get a setting by key
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<SystemSetting>, DbError> {
    let sql = format!("SELECT {SETTING_COLUMNS} FROM system_settings WHERE setting_key = ?1");
    let setting = conn
        .query_row(&sql, params![key], setting_from_row)
        .optional()?;
    Ok(setting)
}

/// Store a new value for a setting
pub fn set_setting_value(
    conn: &Connection,
    key: &str,
    value: &str,
    updated_by: Option<&str>,
) -> Result<bool, DbError> {
    let changed = conn.execute(
        r#"
        UPDATE system_settings
        SET setting_value = ?2, updated_at = ?3, updated_by = ?4
        WHERE setting_key = ?1
        "#,
        params![key, value, clock::now_rfc3339(), updated_by],
    )?;
    Ok(changed > 0)
}

// ============================================================================
// Aggregates
// ============================================================================

/// Row counts across the whole system
pub fn system_stats(conn: &Connection) -> Result<SystemStats, DbError> {
    let stats = conn.query_row(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users),
            (SELECT COUNT(*) FROM disease_detections),
            (SELECT COUNT(*) FROM irrigation_logs),
            (SELECT COUNT(*) FROM market_prices)
        "#,
        [],
        |row| {
            Ok(SystemStats {
                total_users: row.get::<_, i64>(0)? as u32,
                total_detections: row.get::<_, i64>(1)? as u32,
                total_irrigation_logs: row.get::<_, i64>(2)? as u32,
                total_prices: row.get::<_, i64>(3)? as u32,
            })
        },
    )?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::models::irrigation::ActionType;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        schema::create_tables(&conn).unwrap();
        schema::insert_default_settings(&conn).unwrap();
        conn
    }

    fn new_user(phone: &str, user_type: UserType) -> NewUser {
        NewUser {
            phone: phone.to_string(),
            email: None,
            name: format!("User {phone}"),
            location: Some("Sullia".to_string()),
            farm_size: Some("2 acres".to_string()),
            user_type,
            password_hash: "hash".to_string(),
        }
    }

    fn new_detection(user_id: i64, disease: &str) -> NewDetection {
        NewDetection {
            user_id,
            image_path: format!("static/uploads/{user_id}_img.jpg"),
            disease_name: disease.to_string(),
            severity: "mild".to_string(),
            confidence: 88.5,
            location: String::new(),
            recommendation: "Spray".to_string(),
            weather_warning: "Clear".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get_user() {
        let conn = setup();
        let id = insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();

        let user = get_user(&conn, id).unwrap().unwrap();
        assert_eq!(user.phone, "9876543210");
        assert_eq!(user.user_type, UserType::Farmer);
        assert!(get_user_by_phone(&conn, "9876543210").unwrap().is_some());
        assert!(get_user(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_phone_rejected() {
        let conn = setup();
        insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();
        assert!(insert_user(&conn, &new_user("9876543210", UserType::Farmer)).is_err());
    }

    #[test]
    fn test_count_users_by_type() {
        let conn = setup();
        insert_user(&conn, &new_user("1111111111", UserType::Farmer)).unwrap();
        insert_user(&conn, &new_user("2222222222", UserType::Farmer)).unwrap();
        insert_user(&conn, &new_user("3333333333", UserType::Developer)).unwrap();

        assert_eq!(count_users(&conn, None).unwrap(), 3);
        assert_eq!(count_users(&conn, Some(UserType::Farmer)).unwrap(), 2);
        assert_eq!(count_users(&conn, Some(UserType::Developer)).unwrap(), 1);
    }

    #[test]
    fn test_session_expiry() {
        let conn = setup();
        let user_id = insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();
        insert_session(
            &conn,
            &AuthSession {
                token: "abc".to_string(),
                user_id,
                created_at: "2025-01-01T10:00:00+05:30".to_string(),
                expires_at: "2025-01-01T11:00:00+05:30".to_string(),
            },
        )
        .unwrap();

        assert!(get_session_user(&conn, "abc", "2025-01-01T10:30:00+05:30").unwrap().is_some());
        assert!(get_session_user(&conn, "abc", "2025-01-01T11:00:00+05:30").unwrap().is_none());
        assert!(get_session_user(&conn, "other", "2025-01-01T10:30:00+05:30").unwrap().is_none());

        assert_eq!(delete_expired_sessions(&conn, "2025-01-01T12:00:00+05:30").unwrap(), 1);
    }

    #[test]
    fn test_detections_ordering_and_counts() {
        let conn = setup();
        let user_id = insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();
        let other_id = insert_user(&conn, &new_user("1234567890", UserType::Farmer)).unwrap();

        insert_detection(&conn, &new_detection(user_id, HEALTHY)).unwrap();
        let last = insert_detection(&conn, &new_detection(user_id, "Yellow Leaf Disease")).unwrap();
        insert_detection(&conn, &new_detection(other_id, HEALTHY)).unwrap();

        let mine = list_detections_for_user(&conn, user_id, None).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, last);

        assert_eq!(list_detections_for_user(&conn, user_id, Some(1)).unwrap().len(), 1);
        assert_eq!(count_detections(&conn, None).unwrap(), 3);
        assert_eq!(count_detections(&conn, Some(user_id)).unwrap(), 2);
        assert_eq!(count_healthy_detections(&conn, user_id).unwrap(), 1);

        let all = list_all_detections(&conn, None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|d| d.user_name == "User 1234567890"));
    }

    #[test]
    fn test_delete_detections() {
        let conn = setup();
        let user_id = insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();
        let id = insert_detection(&conn, &new_detection(user_id, HEALTHY)).unwrap();
        insert_detection(&conn, &new_detection(user_id, HEALTHY)).unwrap();

        assert!(delete_detection(&conn, id).unwrap());
        assert!(!delete_detection(&conn, id).unwrap());
        assert!(get_detection(&conn, id).unwrap().is_none());
        assert_eq!(delete_detections_for_user(&conn, user_id).unwrap(), 1);
    }

    #[test]
    fn test_pump_created_off_then_toggled() {
        let conn = setup();
        let user_id = insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();

        let pump = get_or_create_pump(&conn, user_id).unwrap();
        assert_eq!(pump.status, PumpState::Off);

        let pump = set_pump_status(&conn, user_id, PumpState::On).unwrap();
        assert_eq!(pump.status, PumpState::On);
        // Still a single row per user
        assert_eq!(get_or_create_pump(&conn, user_id).unwrap().id, pump.id);
    }

    #[test]
    fn test_irrigation_logs() {
        let conn = setup();
        let user_id = insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();

        for i in 0..12 {
            insert_irrigation_log(
                &conn,
                &NewIrrigationLog {
                    user_id,
                    soil_moisture: Some(i as f64 * 5.0),
                    pump_status: PumpState::Off,
                    action_type: ActionType::Simulation,
                    message: format!("reading {i}"),
                },
            )
            .unwrap();
        }

        let logs = recent_irrigation_logs(&conn, user_id, 10).unwrap();
        assert_eq!(logs.len(), 10);
        assert_eq!(logs[0].message.as_deref(), Some("reading 11"));
        assert_eq!(delete_irrigation_logs_for_user(&conn, user_id).unwrap(), 12);
    }

    #[test]
    fn test_market_price_queries() {
        let conn = setup();
        for (day, red) in [("2025-01-01", 400.0), ("2025-01-03", 420.0), ("2025-01-02", 410.0)] {
            insert_market_price(
                &conn,
                &NewMarketPrice {
                    source: "CAMPCO Mangalore".to_string(),
                    red_arecanut_price: red,
                    white_arecanut_price: red + 10.0,
                    grade: "Grade A".to_string(),
                    date: format!("{day}T09:00:00+05:30"),
                },
            )
            .unwrap();
        }

        let latest = latest_market_price(&conn).unwrap().unwrap();
        assert_eq!(latest.red_arecanut_price, 420.0);

        let since = market_prices_since(&conn, "2025-01-02T00:00:00+05:30").unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].red_arecanut_price, 410.0);

        let first = first_market_price_since(&conn, "2025-01-02T00:00:00+05:30").unwrap().unwrap();
        update_market_price(&conn, first.id, 500.0, 510.0, "2025-01-02T10:00:00+05:30").unwrap();
        assert_eq!(count_market_prices(&conn).unwrap(), 3);
        assert!(first_market_price_since(&conn, "2025-02-01T00:00:00+05:30").unwrap().is_none());
    }

    #[test]
    fn test_settings_queries() {
        let conn = setup();
        let irrigation = list_settings_by_category(&conn, SettingCategory::Irrigation).unwrap();
        assert_eq!(irrigation.len(), 2);

        assert!(set_setting_value(&conn, "site_name", "Adike", Some("Admin")).unwrap());
        assert!(!set_setting_value(&conn, "missing", "x", None).unwrap());

        let setting = get_setting(&conn, "site_name").unwrap().unwrap();
        assert_eq!(setting.setting_value.as_deref(), Some("Adike"));
        assert_eq!(setting.updated_by.as_deref(), Some("Admin"));
    }

    #[test]
    fn test_system_stats() {
        let conn = setup();
        let user_id = insert_user(&conn, &new_user("9876543210", UserType::Farmer)).unwrap();
        insert_detection(&conn, &new_detection(user_id, HEALTHY)).unwrap();

        let stats = system_stats(&conn).unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_detections, 1);
        assert_eq!(stats.total_irrigation_logs, 0);
        assert_eq!(stats.total_prices, 0);
    }
}
