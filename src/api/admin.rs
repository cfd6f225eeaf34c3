//! Admin panel endpoints

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::FormOrJson;
use crate::auth::AdminUser;
use crate::clock;
use crate::db::queries::{self, SystemStats};
use crate::export::{self, ExportFormat, ExportType};
use crate::market::{self, ManualPriceForm};
use crate::models::detection::DetectionWithUser;
use crate::models::user::User;
use crate::settings::{self, ResetOutcome, SettingsOverview};
use crate::{AppError, SharedState};

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    #[serde(flatten)]
    pub stats: SystemStats,
    pub recent_users: Vec<User>,
    pub recent_detections: Vec<DetectionWithUser>,
}

pub async fn dashboard(
    State(state): State<SharedState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<AdminDashboard>, AppError> {
    let dashboard = state.db.with_connection(|conn| {
        Ok(AdminDashboard {
            stats: queries::system_stats(conn)?,
            recent_users: queries::recent_users(conn, 5)?,
            recent_detections: queries::list_all_detections(conn, Some(5))?,
        })
    })?;
    Ok(Json(dashboard))
}

pub async fn users(
    State(state): State<SharedState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let users = state.db.with_connection(queries::list_users)?;
    Ok(Json(json!({ "users": users })))
}

pub async fn detections(
    State(state): State<SharedState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let detections = state
        .db
        .with_connection(|conn| queries::list_all_detections(conn, None))?;
    Ok(Json(json!({ "detections": detections })))
}

pub async fn add_price(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    FormOrJson(form): FormOrJson<ManualPriceForm>,
) -> Result<impl IntoResponse, AppError> {
    let id = state
        .db
        .with_connection(|conn| Ok(market::add_manual_price(conn, &form)))??;
    tracing::info!("{} added market price {}", admin.name, id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Market prices updated successfully!", "id": id })),
    ))
}

pub async fn settings_overview(
    State(state): State<SharedState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<SettingsOverview>, AppError> {
    let overview = state
        .db
        .with_connection(|conn| Ok(settings::overview(conn)))??;
    Ok(Json(overview))
}

pub async fn update_settings(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    FormOrJson(fields): FormOrJson<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state
        .db
        .with_transaction(|conn| settings::apply_update(conn, &fields, &admin.name))?;
    Ok(Json(json!({
        "message": "Settings updated successfully!",
        "updated": updated,
    })))
}

pub async fn reset_setting(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = state
        .db
        .with_connection(|conn| Ok(settings::reset(conn, &key, &admin.name)))??;

    let message = match &outcome {
        ResetOutcome::Reset { key, .. } => format!("Setting \"{}\" reset to default.", key),
        ResetOutcome::NoDefault { key } => {
            tracing::warn!("No default value for setting {}", key);
            format!("No default value found for \"{}\".", key)
        }
    };
    Ok(Json(json!({ "message": message, "result": outcome })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn export_data(
    State(state): State<SharedState>,
    AdminUser(admin): AdminUser,
    Path(data_type): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let export_type: ExportType = data_type.parse()?;
    let format: ExportFormat = match query.format.as_deref() {
        Some(format) => format.parse()?,
        None => ExportFormat::default(),
    };

    let file = state
        .db
        .with_connection(|conn| Ok(export::export(conn, export_type, format, &clock::now_ist())))??;
    tracing::info!("{} downloaded {}", admin.name, file.filename);

    Ok((
        [
            (CONTENT_TYPE, file.content_type.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.body,
    ))
}
