//! Irrigation data types

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::{parse_text, UnknownVariant};

/// Pump switch position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl PumpState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpState::On => "ON",
            PumpState::Off => "OFF",
        }
    }
}

impl Default for PumpState {
    fn default() -> Self {
        PumpState::Off
    }
}

impl std::str::FromStr for PumpState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ON" => Ok(PumpState::On),
            "OFF" => Ok(PumpState::Off),
            _ => Err(UnknownVariant::new("pump state", s)),
        }
    }
}

impl FromSql for PumpState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

impl ToSql for PumpState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// What produced an irrigation log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Manual,
    Simulation,
    Auto,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Manual => "Manual",
            ActionType::Simulation => "Simulation",
            ActionType::Auto => "Auto",
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Manual" => Ok(ActionType::Manual),
            "Simulation" => Ok(ActionType::Simulation),
            "Auto" => Ok(ActionType::Auto),
            other => Err(UnknownVariant::new("action type", other)),
        }
    }
}

impl FromSql for ActionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        parse_text(value)
    }
}

impl ToSql for ActionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Stored irrigation log entry
#[derive(Debug, Clone, Serialize)]
pub struct IrrigationLog {
    pub id: i64,
    pub user_id: i64,
    pub soil_moisture: Option<f64>,
    pub pump_status: PumpState,
    pub action_type: ActionType,
    pub message: Option<String>,
    pub logged_at: String,
}

/// Values for a log entry that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewIrrigationLog {
    pub user_id: i64,
    pub soil_moisture: Option<f64>,
    pub pump_status: PumpState,
    pub action_type: ActionType,
    pub message: String,
}

/// A user's pump
#[derive(Debug, Clone, Serialize)]
pub struct PumpStatus {
    pub id: i64,
    pub user_id: i64,
    pub status: PumpState,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pump_state_parse() {
        assert_eq!("ON".parse::<PumpState>().unwrap(), PumpState::On);
        assert_eq!("off".parse::<PumpState>().unwrap(), PumpState::Off);
        assert!("toggle".parse::<PumpState>().is_err());
    }

    #[test]
    fn test_pump_state_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&PumpState::On).unwrap(), "\"ON\"");
        let state: PumpState = serde_json::from_str("\"OFF\"").unwrap();
        assert_eq!(state, PumpState::Off);
    }

    #[test]
    fn test_action_type_roundtrip_str() {
        for action in [ActionType::Manual, ActionType::Simulation, ActionType::Auto] {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
    }
}
