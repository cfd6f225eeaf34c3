//! Disease detection endpoints

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rand::Rng;
use serde::Serialize;
use serde_json::json;

use crate::auth::CurrentUser;
use crate::clock;
use crate::detection::{self, report, Upload, ALLOWED_EXTENSIONS};
use crate::models::detection::DetectionWithUser;
use crate::{AppError, SharedState};

#[derive(Debug, Serialize)]
pub struct UploadInfo {
    pub allowed_extensions: [&'static str; 4],
    pub detection_types: [&'static str; 3],
    pub max_upload_mb: f64,
}

pub async fn upload_form(
    State(state): State<SharedState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<UploadInfo>, AppError> {
    let max_upload_mb = state
        .db
        .with_connection(|conn| Ok(detection::upload_limit_mb(conn, state.config.max_upload_mb)))??;
    Ok(Json(UploadInfo {
        allowed_extensions: ALLOWED_EXTENSIONS,
        detection_types: ["yellow_leaf", "fruit_rot", "both"],
        max_upload_mb,
    }))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Upload(e.body_text())
    }
}

/// Collect the `image`, `detection_type` and `location` fields
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                upload.file_name = Some(field.file_name().unwrap_or_default().to_string());
                upload.bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
            }
            "detection_type" => {
                upload.detection_type = Some(field.text().await.map_err(multipart_error)?);
            }
            "location" => {
                upload.location = Some(field.text().await.map_err(multipart_error)?);
            }
            other => tracing::debug!("Ignoring upload field {}", other),
        }
    }

    Ok(upload)
}

pub async fn upload(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(multipart).await?;
    let rain_chance: u32 = rand::thread_rng().gen_range(0..=100);

    let id = detection::submit(&state, &user, upload, rain_chance).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Image analyzed successfully!",
            "detection_id": id,
            "redirect": format!("/detection-result/{}", id),
        })),
    ))
}

pub async fn result(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DetectionWithUser>, AppError> {
    let entry = state
        .db
        .with_connection(|conn| Ok(detection::viewable(conn, &user, id)))??;
    Ok(Json(entry))
}

pub async fn download_report(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state
        .db
        .with_connection(|conn| Ok(detection::viewable(conn, &user, id)))??;

    let now = clock::now_ist();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        report::report_filename(id, &now)
    );
    let body = report::render_pdf(&entry, &now).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn history(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let detections = state
        .db
        .with_connection(|conn| Ok(detection::history(conn, &user)))??;
    Ok(Json(json!({ "detections": detections })))
}

pub async fn delete(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    detection::delete(&state, &user, id).await?;
    Ok(Json(json!({ "message": "Detection deleted successfully." })))
}

pub async fn clear_all(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = detection::clear_all(&state, &user).await?;
    Ok(Json(json!({
        "message": format!("Deleted {} detections.", deleted),
        "deleted": deleted,
    })))
}
