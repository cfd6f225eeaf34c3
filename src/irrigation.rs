//! Simulated soil moisture and pump control

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::models::irrigation::{ActionType, IrrigationLog, NewIrrigationLog, PumpState, PumpStatus};
use crate::settings;
use crate::AppError;

pub const LOW_MOISTURE: f64 = 30.0;
pub const HIGH_MOISTURE: f64 = 80.0;
pub const DEFAULT_MOISTURE: f64 = 50.0;
pub const HISTORY_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoistureLevel {
    Low,
    Optimal,
    High,
}

impl MoistureLevel {
    pub fn classify(moisture: f64) -> Self {
        if moisture < LOW_MOISTURE {
            MoistureLevel::Low
        } else if moisture > HIGH_MOISTURE {
            MoistureLevel::High
        } else {
            MoistureLevel::Optimal
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            MoistureLevel::Low => "Water required now. Soil moisture is low.",
            MoistureLevel::High => "Waterlogging detected - stop irrigation immediately!",
            MoistureLevel::Optimal => "Soil moisture is optimal. No action needed.",
        }
    }
}

/// Irrigation form: `action` is `simulate`, `ON` or `OFF`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IrrigationForm {
    pub action: String,
    pub moisture_level: Option<String>,
}

/// Irrigation page contents
#[derive(Debug, Clone, Serialize)]
pub struct IrrigationPanel {
    pub pump: PumpStatus,
    pub history: Vec<IrrigationLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moisture_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MoistureLevel>,
    /// Pump switch made by auto mode during this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_action: Option<PumpState>,
}

/// Current pump and the last ten log entries
pub fn panel(conn: &Connection, user_id: i64) -> Result<IrrigationPanel, AppError> {
    Ok(IrrigationPanel {
        pump: queries::get_or_create_pump(conn, user_id)?,
        history: queries::recent_irrigation_logs(conn, user_id, HISTORY_LIMIT)?,
        message: None,
        moisture_level: None,
        status: None,
        auto_action: None,
    })
}

fn log(
    conn: &Connection,
    user_id: i64,
    soil_moisture: Option<f64>,
    pump_status: PumpState,
    action_type: ActionType,
    message: String,
) -> Result<(), AppError> {
    queries::insert_irrigation_log(
        conn,
        &NewIrrigationLog {
            user_id,
            soil_moisture,
            pump_status,
            action_type,
            message,
        },
    )?;
    Ok(())
}

/// Decide whether auto mode should switch the pump
pub fn auto_switch(moisture: f64, threshold: f64, pump: PumpState) -> Option<PumpState> {
    if moisture < threshold && pump == PumpState::Off {
        Some(PumpState::On)
    } else if moisture > HIGH_MOISTURE && pump == PumpState::On {
        Some(PumpState::Off)
    } else {
        None
    }
}

/// Record a moisture reading and let auto mode react to it
pub fn simulate(conn: &Connection, user_id: i64, moisture: f64) -> Result<IrrigationPanel, AppError> {
    if !moisture.is_finite() {
        return Err(AppError::Validation("Moisture level must be a number.".into()));
    }

    let pump = queries::get_or_create_pump(conn, user_id)?;
    let level = MoistureLevel::classify(moisture);
    log(
        conn,
        user_id,
        Some(moisture),
        pump.status,
        ActionType::Simulation,
        level.message().to_string(),
    )?;

    let mut auto_action = None;
    if settings::flag(conn, settings::IRRIGATION_AUTO_MODE)? {
        let threshold = settings::number(conn, settings::SOIL_MOISTURE_THRESHOLD)?;
        if let Some(target) = auto_switch(moisture, threshold, pump.status) {
            queries::set_pump_status(conn, user_id, target)?;
            log(
                conn,
                user_id,
                Some(moisture),
                target,
                ActionType::Auto,
                format!("Auto mode: pump turned {} at {:.1}% soil moisture.", target.as_str(), moisture),
            )?;
            tracing::info!("Auto mode switched pump {} for user {}", target.as_str(), user_id);
            auto_action = Some(target);
        }
    }

    let mut panel = panel(conn, user_id)?;
    panel.message = Some(level.message().to_string());
    panel.moisture_level = Some(moisture);
    panel.status = Some(level);
    panel.auto_action = auto_action;
    Ok(panel)
}

/// Switch the pump by hand
pub fn toggle(conn: &Connection, user_id: i64, state: PumpState) -> Result<IrrigationPanel, AppError> {
    queries::set_pump_status(conn, user_id, state)?;
    let message = format!("Pump turned {}.", state.as_str());
    log(conn, user_id, None, state, ActionType::Manual, message.clone())?;
    tracing::debug!("User {} switched pump {}", user_id, state.as_str());

    let mut panel = panel(conn, user_id)?;
    panel.message = Some(message);
    Ok(panel)
}

/// Dispatch a submitted irrigation form
pub fn handle(conn: &Connection, user_id: i64, form: &IrrigationForm) -> Result<IrrigationPanel, AppError> {
    match form.action.trim() {
        "simulate" => {
            let moisture = match form.moisture_level.as_deref().map(str::trim) {
                None | Some("") => DEFAULT_MOISTURE,
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|_| AppError::Validation("Moisture level must be a number.".into()))?,
            };
            simulate(conn, user_id, moisture)
        }
        action => match action.parse::<PumpState>() {
            Ok(state) => toggle(conn, user_id, state),
            Err(_) => Err(AppError::Validation(format!("Unknown irrigation action: {}", action))),
        },
    }
}

/// Delete all of a user's log entries
pub fn clear_all(conn: &Connection, user_id: i64) -> Result<usize, AppError> {
    let removed = queries::delete_irrigation_logs_for_user(conn, user_id)?;
    tracing::info!("User {} cleared {} irrigation logs", user_id, removed);
    Ok(removed)
}
