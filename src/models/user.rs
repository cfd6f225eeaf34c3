//! User data types

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::{parse_text, UnknownVariant};

/// Account kind. Developers get the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    Farmer,
    Developer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Farmer => "Farmer",
            UserType::Developer => "Developer",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserType::Developer)
    }
}

impl std::str::FromStr for UserType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Farmer" | "farmer" => Ok(UserType::Farmer),
            "Developer" | "developer" => Ok(UserType::Developer),
            other => Err(UnknownVariant::new("user type", other)),
        }
    }
}

impl FromSql for UserType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

impl ToSql for UserType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Full user record
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
    pub location: Option<String>,
    pub farm_size: Option<String>,
    pub user_type: UserType,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.user_type.is_admin()
    }
}

/// Values for a user that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
    pub location: Option<String>,
    pub farm_size: Option<String>,
    pub user_type: UserType,
    pub password_hash: String,
}

/// Login session row
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: i64,
    pub created_at: String,
    pub expires_at: String,
}
