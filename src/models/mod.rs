//! Data models module
//!
//! Contains the row types stored in SQLite and the enums behind their
//! string columns:
//! - Users and login sessions
//! - Disease detections
//! - Irrigation logs and pump status
//! - Market prices
//! - System settings

pub mod detection;
pub mod irrigation;
pub mod price;
pub mod settings;
pub mod user;

use rusqlite::types::{FromSqlError, FromSqlResult, ValueRef};

/// Read a TEXT column into any type that parses from `&str`
pub(crate) fn parse_text<T: std::str::FromStr>(value: ValueRef<'_>) -> FromSqlResult<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text = value.as_str()?;
    text.parse::<T>().map_err(|e| FromSqlError::Other(Box::new(e)))
}

/// Error for a string that names no known variant
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
