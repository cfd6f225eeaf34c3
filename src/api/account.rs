//! Public pages, registration, login and profile

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use super::FormOrJson;
use crate::auth::service::{self, LoginForm, ProfileForm, RegisterForm};
use crate::auth::session;
use crate::auth::{CurrentUser, SessionToken};
use crate::db::queries;
use crate::models::user::{User, UserType};
use crate::settings;
use crate::{AppError, SharedState};

/// Reported model accuracy on the home page
const MODEL_ACCURACY: f64 = 97.7;

#[derive(Debug, Serialize)]
pub struct HomeStats {
    pub site_name: String,
    pub farmers: u32,
    pub detections: u32,
    pub accuracy: f64,
}

pub async fn home(State(state): State<SharedState>) -> Result<Json<HomeStats>, AppError> {
    let stats = state.db.with_connection(|conn| {
        let site_name = queries::get_setting(conn, settings::SITE_NAME)?
            .and_then(|s| s.setting_value)
            .unwrap_or_else(|| "Adike Mitra".to_string());
        Ok(HomeStats {
            site_name,
            farmers: queries::count_users(conn, Some(UserType::Farmer))?,
            detections: queries::count_detections(conn, None)?,
            accuracy: MODEL_ACCURACY,
        })
    })?;
    Ok(Json(stats))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn register(
    State(state): State<SharedState>,
    FormOrJson(form): FormOrJson<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .db
        .with_connection(|conn| Ok(service::register(conn, &form)))??;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful! Please login.",
            "user": user,
        })),
    ))
}

/// Where a user lands after logging in
fn landing_page(user: &User) -> &'static str {
    if user.is_admin() {
        "/admin"
    } else {
        "/dashboard"
    }
}

pub async fn login(
    State(state): State<SharedState>,
    FormOrJson(form): FormOrJson<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let (user, auth) = state
        .db
        .with_connection(|conn| Ok(service::login(conn, &form)))??;

    let cookie = session::session_cookie(&auth, session::seconds_remaining(&auth));
    let body = json!({
        "message": format!("Welcome back, {}!", user.name),
        "redirect": landing_page(&user),
        "user": user,
    });
    Ok(([(SET_COOKIE, cookie)], Json(body)))
}

pub async fn logout(
    State(state): State<SharedState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = token {
        state
            .db
            .with_connection(|conn| Ok(session::destroy_session(conn, &token)))??;
    }

    Ok((
        [(SET_COOKIE, session::clear_cookie())],
        Json(json!({ "message": "You have been logged out." })),
    ))
}

pub async fn profile(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub async fn update_profile(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    FormOrJson(form): FormOrJson<ProfileForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state
        .db
        .with_connection(|conn| Ok(service::update_profile(conn, &user, &form)))??;

    let message = if form.action == "change_password" {
        "Password changed successfully!"
    } else {
        "Profile updated successfully!"
    };
    Ok(Json(json!({ "message": message, "user": updated })))
}
