//! Data models for the hydroponics dashboard.
//!
//! `RawReading` mirrors the JSON the readings API returns and is deliberately
//! loose; `SensorSnapshot` is the validated form the rest of the crate works
//! with. Conversion between the two is the only place payload validation
//! happens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Raw sensor reading as served by `/readings/latest` and `/readings/`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    // ---
    #[serde(default)]
    pub water_level: Option<LenientNumber>,
    #[serde(default)]
    pub nutrient_level: Option<f64>,
    #[serde(default)]
    pub ph_level: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// The API has shipped `water_level` both as a number and as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LenientNumber {
    Number(f64),
    Text(String),
}

/// Reasons a reading is rejected before it reaches the evaluator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("reading is missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not numeric: {raw:?}")]
    NotNumeric { field: &'static str, raw: String },

    #[error("field `{field}` is not a finite number")]
    NotFinite { field: &'static str },

    #[error("unparseable timestamp {0:?}")]
    BadTimestamp(String),
}

/// One validated sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSnapshot {
    // ---
    pub timestamp: DateTime<Utc>,
    /// Percent, nominally 0..=100 but never clamped.
    pub water_level: f64,
    /// Parts per million.
    pub nutrient_level: f64,
    pub ph_level: f64,
}

impl TryFrom<RawReading> for SensorSnapshot {
    type Error = PayloadError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        // ---
        let water_level = match raw.water_level {
            Some(LenientNumber::Number(v)) => v,
            Some(LenientNumber::Text(s)) => {
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| PayloadError::NotNumeric {
                        field: "water_level",
                        raw: s.clone(),
                    })?
            }
            None => return Err(PayloadError::MissingField("water_level")),
        };
        let nutrient_level = raw
            .nutrient_level
            .ok_or(PayloadError::MissingField("nutrient_level"))?;
        let ph_level = raw.ph_level.ok_or(PayloadError::MissingField("ph_level"))?;

        for (field, value) in [
            ("water_level", water_level),
            ("nutrient_level", nutrient_level),
            ("ph_level", ph_level),
        ] {
            if !value.is_finite() {
                return Err(PayloadError::NotFinite { field });
            }
        }

        let timestamp = raw
            .timestamp
            .as_deref()
            .ok_or(PayloadError::MissingField("timestamp"))
            .and_then(parse_timestamp)?;

        Ok(SensorSnapshot {
            timestamp,
            water_level,
            nutrient_level,
            ph_level,
        })
    }
}

/// Accepts RFC 3339 as well as the naive ISO-8601 form the backend emits,
/// treating the latter as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, PayloadError> {
    // ---
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| PayloadError::BadTimestamp(s.to_string()))
}

// ---

/// Pump state from `/pump/status`. Advisory only.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PumpStatus {
    // ---
    pub status: SwitchState,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl PumpStatus {
    pub fn is_on(&self) -> bool {
        self.status == SwitchState::On
    }

    /// Parsed `last_updated`, if present and well formed.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated
            .as_deref()
            .and_then(|s| parse_timestamp(s).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    On,
    Off,
}

/// Actuators the rig exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Pump,
    Spray,
}

/// Command sent to an actuator. Shares its wire form with [`SwitchState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    On,
    Off,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Pump => "pump",
            Device::Spray => "spray",
        }
    }
}

impl DeviceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::On => "on",
            DeviceAction::Off => "off",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pump" => Ok(Device::Pump),
            "spray" => Ok(Device::Spray),
            other => Err(format!("unknown device '{other}'")),
        }
    }
}

impl FromStr for DeviceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(DeviceAction::On),
            "off" => Ok(DeviceAction::Off),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

// ---

/// Coarse water classification shown on the water gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaterStatus {
    OutOfWater,
    MidLevel,
    InWater,
}

impl WaterStatus {
    /// `out_of_water_below` is the water critical bound; above 50% is "in water".
    pub fn classify(level: f64, out_of_water_below: f64) -> Self {
        // ---
        if level < out_of_water_below {
            WaterStatus::OutOfWater
        } else if level > 50.0 {
            WaterStatus::InWater
        } else {
            WaterStatus::MidLevel
        }
    }

    /// The gauge is binary: water present or not.
    pub fn gauge_value(&self) -> u8 {
        match self {
            WaterStatus::InWater => 1,
            _ => 0,
        }
    }
}
