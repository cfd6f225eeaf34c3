//! Cookie-backed login sessions
//!
//! The cookie only carries a random token; the user it belongs to and its
//! expiry live in the `auth_sessions` table.

use axum::http::header::{HeaderMap, COOKIE};
use chrono::Duration as ChronoDuration;
use rand::RngCore;
use rusqlite::Connection;

use crate::clock;
use crate::db::queries;
use crate::models::user::{AuthSession, User};
use crate::settings;
use crate::AppError;

pub const COOKIE_NAME: &str = "adike_session";
const TOKEN_BYTES: usize = 32;

/// Generate a random hex session token
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Create a session for a user that lasts `session_timeout` minutes
pub fn create_session(conn: &Connection, user_id: i64) -> Result<AuthSession, AppError> {
    let timeout_minutes = settings::number(conn, settings::SESSION_TIMEOUT)?.max(1.0) as i64;
    let now = clock::now_ist();

    let session = AuthSession {
        token: generate_token(),
        user_id,
        created_at: clock::to_rfc3339(&now),
        expires_at: clock::to_rfc3339(&(now + ChronoDuration::minutes(timeout_minutes))),
    };
    queries::insert_session(conn, &session)?;
    tracing::debug!("Created session for user {} ({} min)", user_id, timeout_minutes);
    Ok(session)
}

/// Resolve a token to the logged-in user
pub fn session_user(conn: &Connection, token: &str) -> Result<Option<User>, AppError> {
    Ok(queries::get_session_user(conn, token, &clock::now_rfc3339())?)
}

/// End a session
pub fn destroy_session(conn: &Connection, token: &str) -> Result<(), AppError> {
    queries::delete_session(conn, token)?;
    Ok(())
}

/// Read the session token from the `Cookie` header
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value that stores a session token
pub fn session_cookie(session: &AuthSession, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        COOKIE_NAME, session.token, max_age_secs
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", COOKIE_NAME)
}

/// Seconds until a session expires
pub fn seconds_remaining(session: &AuthSession) -> i64 {
    clock::parse_timestamp(&session.expires_at)
        .map(|expires| (expires - clock::now_ist()).num_seconds().max(0))
        .unwrap_or(0)
}
