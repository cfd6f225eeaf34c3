//! Farmer dashboard, weather, market and irrigation endpoints

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use super::FormOrJson;
use crate::auth::CurrentUser;
use crate::clock;
use crate::db::queries;
use crate::irrigation::{self, IrrigationForm, IrrigationPanel};
use crate::market::{self, MarketPage, PredictionPage, PriceUpdate};
use crate::models::detection::{DetectionInsights, DiseaseDetection};
use crate::models::irrigation::IrrigationLog;
use crate::models::price::MarketPrice;
use crate::models::user::User;
use crate::weather::{self, WeatherReport};
use crate::{AppError, SharedState};

const DASHBOARD_RECENT: u32 = 5;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user: User,
    pub recent_detections: Vec<DiseaseDetection>,
    pub irrigation_logs: Vec<IrrigationLog>,
    pub latest_price: Option<MarketPrice>,
    pub insights: DetectionInsights,
}

pub async fn dashboard(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Dashboard>, AppError> {
    let dashboard = state.db.with_connection(|conn| {
        let recent = queries::list_detections_for_user(conn, user.id, Some(DASHBOARD_RECENT))?;
        let insights = DetectionInsights::new(
            queries::count_detections(conn, Some(user.id))?,
            queries::count_healthy_detections(conn, user.id)?,
            &recent,
        );
        Ok(Dashboard {
            irrigation_logs: queries::recent_irrigation_logs(conn, user.id, DASHBOARD_RECENT)?,
            latest_price: queries::latest_market_price(conn)?,
            recent_detections: recent,
            insights,
            user: user.clone(),
        })
    })?;
    Ok(Json(dashboard))
}

pub async fn weather_advisory(CurrentUser(user): CurrentUser) -> Json<WeatherReport> {
    let report = weather::report(
        &mut rand::thread_rng(),
        user.location.as_deref(),
        &clock::now_ist(),
    );
    Json(report)
}

pub async fn market_prices(
    State(state): State<SharedState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<MarketPage>, AppError> {
    Ok(Json(market::market_page(&state).await?))
}

pub async fn price_prediction(
    State(state): State<SharedState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<PredictionPage>, AppError> {
    let page = state
        .db
        .with_connection(|conn| Ok(market::prediction_page(conn, &mut rand::thread_rng())))??;
    Ok(Json(page))
}

pub async fn update_prices(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Json<PriceUpdate> {
    tracing::info!("User {} requested a price refresh", user.id);
    Json(market::update_market_prices(&state).await)
}

pub async fn irrigation_panel(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<IrrigationPanel>, AppError> {
    let panel = state
        .db
        .with_connection(|conn| Ok(irrigation::panel(conn, user.id)))??;
    Ok(Json(panel))
}

pub async fn irrigation_action(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    FormOrJson(form): FormOrJson<IrrigationForm>,
) -> Result<Json<IrrigationPanel>, AppError> {
    let panel = state
        .db
        .with_transaction(|conn| irrigation::handle(conn, user.id, &form))?;
    Ok(Json(panel))
}

pub async fn clear_irrigation(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state
        .db
        .with_connection(|conn| Ok(irrigation::clear_all(conn, user.id)))??;
    Ok(Json(json!({
        "message": format!("Cleared {} irrigation log entries.", deleted),
        "deleted": deleted,
    })))
}
