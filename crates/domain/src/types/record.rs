//! Pending location records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::DeliveryStatus;

/// Loosely-typed scalar column value.
///
/// Numeric columns arrive from heterogeneous upstream writers, so the mapper
/// receives them untyped and applies the partner's coercion rules itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    /// Boolean column
    Bool(bool),
    /// Any integer column
    Int(i64),
    /// Float or `NUMERIC` column
    Float(f64),
    /// Text, or any other column read as text
    Text(String),
}

impl RawScalar {
    /// Numeric coercion.
    ///
    /// Booleans become `1`/`0`, blank text becomes `0`, and anything that is
    /// not a finite number yields `None`.
    pub fn to_number(&self) -> Option<f64> {
        let value = match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().ok()?
                }
            }
        };
        value.is_finite().then_some(value)
    }

    /// Truthiness: non-zero numbers, `true`, and non-empty text.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Render as text, without a fractional part for integral values.
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<i64> for RawScalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for RawScalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for RawScalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for RawScalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawScalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Optional telemetry channels some devices report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryExtras {
    pub virtual_odometer: Option<RawScalar>,
    pub virtual_hourmeter: Option<String>,
    pub battery_level: Option<RawScalar>,
    pub external_voltage: Option<RawScalar>,
    pub inputs: [Option<RawScalar>; 4],
    pub hdop: Option<RawScalar>,
    pub satellites: Option<RawScalar>,
    pub device_state: Option<RawScalar>,
    pub ibutton: Option<String>,
}

/// One GPS fix awaiting delivery, joined with its device integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Primary key of the fix; the outcome is written back against it.
    pub location_id: i64,
    /// Tracking device identifier.
    pub device_id: Option<RawScalar>,
    /// Vehicle plate from the device integration.
    pub plate: Option<String>,
    /// Fix instant; `None` when the column is null.
    pub fix_time: Option<DateTime<Utc>>,
    /// Decimal degrees.
    pub latitude: Option<RawScalar>,
    /// Decimal degrees.
    pub longitude: Option<RawScalar>,
    /// Meters above sea level.
    pub altitude: Option<RawScalar>,
    /// Course over ground, degrees.
    pub heading: Option<RawScalar>,
    /// Ground speed, km/h.
    pub speed_kmh: Option<RawScalar>,
    /// Ignition on/off, any truthy encoding.
    pub ignition: Option<RawScalar>,
    /// First temperature sensor.
    pub temp1: Option<RawScalar>,
    /// Second temperature sensor.
    pub temp2: Option<RawScalar>,
    /// Third temperature sensor.
    pub temp3: Option<RawScalar>,
    /// Device event code.
    pub event: Option<RawScalar>,
    /// Value attached to the event.
    pub event_value: Option<RawScalar>,
    /// Stored event text; falls back to the event catalog when blank.
    pub event_description: Option<String>,
    /// Device IMEI.
    pub imei: Option<String>,
    /// Channels only some devices report.
    #[serde(default)]
    pub extras: TelemetryExtras,
    /// Status the record was selected with (pending or failed).
    #[serde(default)]
    pub delivery_status: DeliveryStatus,
}

impl PendingRecord {
    /// Plate for log fields, empty when the integration has none.
    pub fn plate_or_empty(&self) -> &str {
        self.plate.as_deref().unwrap_or_default()
    }
}
