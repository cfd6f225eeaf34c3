//! Account flows: registration, login, profile and password changes

use rusqlite::Connection;
use serde::Deserialize;

use super::password::{hash_password, verify_password};
use super::session;
use crate::db::queries;
use crate::models::user::{AuthSession, NewUser, User, UserType};
use crate::settings;
use crate::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub phone: String,
    pub email: String,
    pub name: String,
    pub location: String,
    pub farm_size: String,
    pub user_type: String,
    pub password: String,
    pub confirm_password: String,
}

/// Login form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub phone: String,
    pub password: String,
}

/// Profile form; `action` picks which half of the fields applies
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub action: String,
    pub name: String,
    pub email: String,
    pub location: String,
    pub farm_size: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Indian mobile numbers are exactly ten digits
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())
}

/// Validate a registration form and create the account
pub fn register(conn: &Connection, form: &RegisterForm) -> Result<User, AppError> {
    if !settings::flag(conn, settings::USER_REGISTRATION)? {
        return Err(AppError::Forbidden("New user registration is disabled.".into()));
    }

    let phone = form.phone.trim();
    let name = form.name.trim();
    if phone.is_empty() || name.is_empty() || form.user_type.trim().is_empty() || form.password.is_empty() {
        return Err(AppError::Validation("Please fill all required fields.".into()));
    }

    if !is_valid_phone(phone) {
        return Err(AppError::Validation("Phone number must be 10 digits.".into()));
    }

    if form.password != form.confirm_password {
        return Err(AppError::Validation("Passwords do not match.".into()));
    }

    let user_type: UserType = form
        .user_type
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown user type: {}", form.user_type)))?;

    if queries::get_user_by_phone(conn, phone)?.is_some() {
        return Err(AppError::Conflict("Phone number already registered.".into()));
    }

    let email = non_empty(&form.email);
    if let Some(email) = &email {
        if queries::get_user_by_email(conn, email)?.is_some() {
            return Err(AppError::Conflict("Email already registered.".into()));
        }
    }

    let new_user = NewUser {
        phone: phone.to_string(),
        email,
        name: name.to_string(),
        location: non_empty(&form.location),
        farm_size: non_empty(&form.farm_size),
        user_type,
        password_hash: hash_password(&form.password),
    };

    let user_id = queries::insert_user(conn, &new_user)?;
    tracing::info!("Registered {} user {}", user_type.as_str(), user_id);

    queries::get_user(conn, user_id)?
        .ok_or_else(|| AppError::Internal(format!("User {} vanished after insert", user_id)))
}

/// Check credentials and open a session
pub fn login(conn: &Connection, form: &LoginForm) -> Result<(User, AuthSession), AppError> {
    let invalid = || AppError::Unauthorized("Invalid phone number or password.".into());

    let user = queries::get_user_by_phone(conn, form.phone.trim())?.ok_or_else(invalid)?;

    let matches = verify_password(&form.password, &user.password_hash).unwrap_or_else(|e| {
        tracing::warn!("Stored password hash for user {} is unusable: {}", user.id, e);
        false
    });
    if !matches {
        return Err(invalid());
    }

    let session = session::create_session(conn, user.id)?;
    tracing::info!("User {} logged in", user.id);
    Ok((user, session))
}

/// Apply a profile form for the given user and return the updated user
pub fn update_profile(conn: &Connection, user: &User, form: &ProfileForm) -> Result<User, AppError> {
    match form.action.as_str() {
        "update_profile" => {
            let name = non_empty(&form.name).unwrap_or_else(|| user.name.clone());

            let email = match non_empty(&form.email) {
                Some(email) => {
                    if let Some(existing) = queries::get_user_by_email(conn, &email)? {
                        if existing.id != user.id {
                            return Err(AppError::Conflict(
                                "Email already in use by another account.".into(),
                            ));
                        }
                    }
                    Some(email)
                }
                None => user.email.clone(),
            };

            queries::update_profile(
                conn,
                user.id,
                &name,
                email.as_deref(),
                non_empty(&form.location).as_deref(),
                non_empty(&form.farm_size).as_deref(),
            )?;
        }
        "change_password" => {
            let current_ok = verify_password(&form.current_password, &user.password_hash).unwrap_or(false);
            if !current_ok {
                return Err(AppError::Validation("Current password is incorrect.".into()));
            }
            if form.new_password != form.confirm_password {
                return Err(AppError::Validation("New passwords do not match.".into()));
            }
            if form.new_password.chars().count() < MIN_PASSWORD_LEN {
                return Err(AppError::Validation(format!(
                    "Password must be at least {} characters.",
                    MIN_PASSWORD_LEN
                )));
            }
            queries::update_password(conn, user.id, &hash_password(&form.new_password))?;
            tracing::info!("User {} changed password", user.id);
        }
        other => {
            return Err(AppError::Validation(format!("Unknown profile action: {}", other)));
        }
    }

    queries::get_user(conn, user.id)?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))
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

    fn register_form(phone: &str) -> RegisterForm {
        RegisterForm {
            phone: phone.to_string(),
            email: String::new(),
            name: "Ravi Bhat".to_string(),
            location: "Puttur".to_string(),
            farm_size: "3 acres".to_string(),
            user_type: "Farmer".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        }
    }

    fn run<T>(db: &Database, f: impl FnOnce(&Connection) -> Result<T, AppError>) -> Result<T, AppError> {
        db.with_connection(|conn| Ok(f(conn))).unwrap()
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("9876543210"));
        assert!(!is_valid_phone("987654321"));
        assert!(!is_valid_phone("98765432100"));
        assert!(!is_valid_phone("98765x3210"));
    }

    #[test]
    fn test_register_and_login() {
        let db = setup();
        let user = run(&db, |conn| register(conn, &register_form("9876543210"))).unwrap();
        assert_eq!(user.user_type, UserType::Farmer);
        assert_eq!(user.location.as_deref(), Some("Puttur"));
        assert!(user.email.is_none());

        let form = LoginForm {
            phone: "9876543210".to_string(),
            password: "secret1".to_string(),
        };
        let (logged_in, session) = run(&db, |conn| login(conn, &form)).unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(session.user_id, user.id);
    }

    #[test]
    fn test_register_validation_errors() {
        let db = setup();

        let mut form = register_form("12345");
        assert!(matches!(run(&db, |conn| register(conn, &form)), Err(AppError::Validation(_))));

        form = register_form("9876543210");
        form.confirm_password = "other".to_string();
        let err = run(&db, |conn| register(conn, &form)).unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match.");

        form = register_form("9876543210");
        form.name = "  ".to_string();
        let err = run(&db, |conn| register(conn, &form)).unwrap_err();
        assert_eq!(err.to_string(), "Please fill all required fields.");

        form = register_form("9876543210");
        form.user_type = "Trader".to_string();
        assert!(matches!(run(&db, |conn| register(conn, &form)), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_register_duplicates() {
        let db = setup();
        let mut first = register_form("9876543210");
        first.email = "ravi@example.com".to_string();
        run(&db, |conn| register(conn, &first)).unwrap();

        let err = run(&db, |conn| register(conn, &register_form("9876543210"))).unwrap_err();
        assert_eq!(err.to_string(), "Phone number already registered.");

        let mut second = register_form("1234567890");
        second.email = "ravi@example.com".to_string();
        let err = run(&db, |conn| register(conn, &second)).unwrap_err();
        assert_eq!(err.to_string(), "Email already registered.");
    }

    #[test]
    fn test_registration_can_be_disabled() {
        let db = setup();
        run(&db, |conn| {
            queries::set_setting_value(conn, settings::USER_REGISTRATION, "false", None)?;
            Ok(())
        })
        .unwrap();

        let result = run(&db, |conn| register(conn, &register_form("9876543210")));
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_login_wrong_password() {
        let db = setup();
        run(&db, |conn| register(conn, &register_form("9876543210"))).unwrap();

        let form = LoginForm {
            phone: "9876543210".to_string(),
            password: "wrong".to_string(),
        };
        assert!(matches!(run(&db, |conn| login(conn, &form)), Err(AppError::Unauthorized(_))));

        let form = LoginForm {
            phone: "0000000000".to_string(),
            password: "secret1".to_string(),
        };
        assert!(matches!(run(&db, |conn| login(conn, &form)), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_update_profile_fields() {
        let db = setup();
        let user = run(&db, |conn| register(conn, &register_form("9876543210"))).unwrap();

        let form = ProfileForm {
            action: "update_profile".to_string(),
            name: String::new(),
            email: "new@example.com".to_string(),
            location: "Sirsi".to_string(),
            ..Default::default()
        };
        let updated = run(&db, |conn| update_profile(conn, &user, &form)).unwrap();
        assert_eq!(updated.name, "Ravi Bhat");
        assert_eq!(updated.email.as_deref(), Some("new@example.com"));
        assert_eq!(updated.location.as_deref(), Some("Sirsi"));
        // Blank farm size clears it
        assert!(updated.farm_size.is_none());
    }

    #[test]
    fn test_update_profile_email_taken() {
        let db = setup();
        let mut other = register_form("1234567890");
        other.email = "taken@example.com".to_string();
        run(&db, |conn| register(conn, &other)).unwrap();
        let user = run(&db, |conn| register(conn, &register_form("9876543210"))).unwrap();

        let form = ProfileForm {
            action: "update_profile".to_string(),
            email: "taken@example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            run(&db, |conn| update_profile(conn, &user, &form)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_change_password() {
        let db = setup();
        let user = run(&db, |conn| register(conn, &register_form("9876543210"))).unwrap();

        let mut form = ProfileForm {
            action: "change_password".to_string(),
            current_password: "wrong".to_string(),
            new_password: "newpass".to_string(),
            confirm_password: "newpass".to_string(),
            ..Default::default()
        };
        let err = run(&db, |conn| update_profile(conn, &user, &form)).unwrap_err();
        assert_eq!(err.to_string(), "Current password is incorrect.");

        form.current_password = "secret1".to_string();
        form.new_password = "short".to_string();
        form.confirm_password = "short".to_string();
        let err = run(&db, |conn| update_profile(conn, &user, &form)).unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters.");

        form.new_password = "newpass".to_string();
        form.confirm_password = "newpass".to_string();
        run(&db, |conn| update_profile(conn, &user, &form)).unwrap();

        let login_form = LoginForm {
            phone: "9876543210".to_string(),
            password: "newpass".to_string(),
        };
        assert!(run(&db, |conn| login(conn, &login_form)).is_ok());
    }
}
