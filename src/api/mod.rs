//! HTTP interface
//!
//! Every page of the app is a JSON endpoint. Form posts are accepted either
//! urlencoded or as JSON; uploaded images are served from `/uploads`.

pub mod account;
pub mod admin;
pub mod detection;
pub mod farm;

use axum::extract::{DefaultBodyLimit, FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::de::DeserializeOwned;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::{AppError, SharedState};

/// Body deserialized from JSON or an urlencoded form, by `Content-Type`
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            Ok(FormOrJson(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            Ok(FormOrJson(value))
        }
    }
}

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let upload_limit = state.config.max_upload_bytes();
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/", get(account::home))
        .route("/health", get(account::health))
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .route("/logout", post(account::logout))
        .route("/profile", get(account::profile).post(account::update_profile))
        .route("/dashboard", get(farm::dashboard))
        .route(
            "/disease-detection",
            get(detection::upload_form).post(detection::upload),
        )
        .route("/detection-result/{id}", get(detection::result))
        .route("/download-detection-pdf/{id}", get(detection::download_report))
        .route("/disease-history", get(detection::history))
        .route("/delete-detection/{id}", post(detection::delete))
        .route("/clear-all-detections", post(detection::clear_all))
        .route("/weather-advisory", get(farm::weather_advisory))
        .route("/market-prices", get(farm::market_prices))
        .route("/price-prediction", get(farm::price_prediction))
        .route("/update-prices", post(farm::update_prices))
        .route(
            "/smart-irrigation",
            get(farm::irrigation_panel).post(farm::irrigation_action),
        )
        .route("/clear-all-irrigation", post(farm::clear_irrigation))
        .route("/admin", get(admin::dashboard))
        .route("/admin/users", get(admin::users))
        .route("/admin/detections", get(admin::detections))
        .route("/admin/update-prices", post(admin::add_price))
        .route("/admin/settings", get(admin::settings_overview))
        .route("/admin/settings/update", post(admin::update_settings))
        .route("/admin/settings/reset/{key}", post(admin::reset_setting))
        .route("/admin/settings/export/{data_type}", get(admin::export_data))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
