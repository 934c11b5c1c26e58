//! Threshold evaluation: one snapshot in, an ordered list of alerts out.
//!
//! Each metric is matched against its bands as a chain of exclusive tests,
//! most severe first on each side of the nominal range, so a metric yields
//! at most one alert per snapshot. Output order is water, nutrient, pH.

use serde::{Deserialize, Serialize};

use super::{Alert, Severity};
use crate::models::{PumpStatus, SensorSnapshot};

// ---

/// Bounds for a metric with a nominal range in the middle.
///
/// A value equal to a bound falls in the less severe band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    // ---
    pub critical_low: f64,
    pub warning_low: f64,
    pub warning_high: f64,
    pub critical_high: f64,
}

/// Water only alarms on the low side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterBounds {
    // ---
    pub critical_below: f64,
    pub warning_below: f64,
}

/// Complete threshold table used by [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    // ---
    pub water: WaterBounds,
    pub nutrient: RangeBounds,
    pub ph: RangeBounds,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            water: WaterBounds {
                critical_below: 7.0,
                warning_below: 20.0,
            },
            nutrient: RangeBounds {
                critical_low: 300.0,
                warning_low: 500.0,
                warning_high: 1400.0,
                critical_high: 1800.0,
            },
            ph: RangeBounds {
                critical_low: 5.0,
                warning_low: 5.5,
                warning_high: 7.5,
                critical_high: 8.0,
            },
        }
    }
}

impl Thresholds {
    /// Check that the bands of every metric are ordered and non-overlapping.
    pub fn validate(&self) -> Result<(), String> {
        // ---
        if !(self.water.critical_below <= self.water.warning_below) {
            return Err(format!(
                "water: critical bound {} must not exceed warning bound {}",
                self.water.critical_below, self.water.warning_below
            ));
        }
        for (name, b) in [("nutrient", &self.nutrient), ("ph", &self.ph)] {
            let ordered = b.critical_low <= b.warning_low
                && b.warning_low < b.warning_high
                && b.warning_high <= b.critical_high;
            if !ordered {
                return Err(format!(
                    "{name}: bounds must satisfy \
                     critical_low <= warning_low < warning_high <= critical_high \
                     (got {} / {} / {} / {})",
                    b.critical_low, b.warning_low, b.warning_high, b.critical_high
                ));
            }
        }
        Ok(())
    }
}

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    CriticalLow,
    WarningLow,
    WarningHigh,
    CriticalHigh,
}

impl Band {
    fn severity(self) -> Severity {
        match self {
            Band::CriticalLow | Band::CriticalHigh => Severity::Critical,
            Band::WarningLow | Band::WarningHigh => Severity::Warning,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Band::CriticalLow => "critical-low",
            Band::WarningLow => "warning-low",
            Band::WarningHigh => "warning-high",
            Band::CriticalHigh => "critical-high",
        }
    }
}

fn classify_range(value: f64, b: &RangeBounds) -> Option<Band> {
    // ---
    if value < b.critical_low {
        Some(Band::CriticalLow)
    } else if value < b.warning_low {
        Some(Band::WarningLow)
    } else if value > b.critical_high {
        Some(Band::CriticalHigh)
    } else if value > b.warning_high {
        Some(Band::WarningHigh)
    } else {
        None
    }
}

/// Evaluate a snapshot against the thresholds. Pure.
pub fn evaluate(snapshot: &SensorSnapshot, thresholds: &Thresholds) -> Vec<Alert> {
    // ---
    let mut alerts = Vec::with_capacity(3);

    if let Some(alert) = water_alert(snapshot.water_level, &thresholds.water) {
        alerts.push(alert);
    }
    if let Some(band) = classify_range(snapshot.nutrient_level, &thresholds.nutrient) {
        alerts.push(nutrient_alert(band, snapshot.nutrient_level));
    }
    if let Some(band) = classify_range(snapshot.ph_level, &thresholds.ph) {
        alerts.push(ph_alert(band, snapshot.ph_level));
    }

    alerts
}

/// Round half away from zero, so a reading of 6.25 reads as 6.3 rather than 6.2.
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn water_alert(level: f64, b: &WaterBounds) -> Option<Alert> {
    // ---
    let shown = round_to(level, 1);
    if level < b.critical_below {
        Some(Alert {
            id: "water-critical".into(),
            severity: Severity::Critical,
            title: "CRITICAL: NO WATER DETECTED".into(),
            message: format!("Water level is at {shown:.1}% - System needs water immediately!"),
            value: Some(level),
        })
    } else if level < b.warning_below {
        Some(Alert {
            id: "water-warning".into(),
            severity: Severity::Warning,
            title: "Low Water Level".into(),
            message: format!("Water level: {shown:.1}% - Consider refilling soon"),
            value: Some(level),
        })
    } else {
        None
    }
}

fn nutrient_alert(band: Band, ppm: f64) -> Alert {
    // ---
    let (title, advice) = match band {
        Band::CriticalLow => ("CRITICAL: PPM Too Low", "Add nutrients immediately!"),
        Band::WarningLow => ("Low PPM", "Consider adding nutrients"),
        Band::WarningHigh => ("High PPM", "Consider diluting solution"),
        Band::CriticalHigh => ("CRITICAL: PPM Too High", "Dilute solution immediately!"),
    };
    Alert {
        id: format!("ppm-{}", band.suffix()),
        severity: band.severity(),
        title: title.into(),
        message: format!("PPM: {:.0} ppm - {advice}", round_to(ppm, 0)),
        value: Some(ppm),
    }
}

fn ph_alert(band: Band, ph: f64) -> Alert {
    // ---
    let (title, advice) = match band {
        Band::CriticalLow => ("CRITICAL: pH Too Low (Acidic)", "Adjust pH immediately!"),
        Band::WarningLow => ("pH Too Low", "Consider adjusting pH"),
        Band::WarningHigh => ("pH Too High", "Consider adjusting pH"),
        Band::CriticalHigh => ("CRITICAL: pH Too High (Alkaline)", "Adjust pH immediately!"),
    };
    Alert {
        id: format!("ph-{}", band.suffix()),
        severity: band.severity(),
        title: title.into(),
        message: format!("pH: {:.2} - {advice}", round_to(ph, 2)),
        value: Some(ph),
    }
}

/// Informational alert raised while the pump reports `on`.
pub fn pump_running_alert(status: &PumpStatus) -> Option<Alert> {
    // ---
    if !status.is_on() {
        return None;
    }
    let since = status
        .last_updated_at()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".into());

    Some(Alert {
        id: "pump-running".into(),
        severity: Severity::Info,
        title: "Pump Active".into(),
        message: format!("Pump is currently running - Last activated: {since}"),
        value: None,
    })
}
