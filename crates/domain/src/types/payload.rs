//! Partner wire schema

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// JSON number that serializes integral values as integers.
///
/// The partner expects `0`, not `0.0`, for whole numbers. Non-finite values
/// are replaced by `0` on construction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Numeric(f64);

/// Largest magnitude below which every integral `f64` is exact.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Numeric {
    /// Value used for missing or non-numeric fields.
    pub const ZERO: Self = Self(0.0);

    /// Wrap `value`; NaN and infinities become [`Numeric::ZERO`].
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(value)
        } else {
            Self::ZERO
        }
    }

    /// The wrapped (always finite) value.
    pub fn value(self) -> f64 {
        self.0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn as_integer(self) -> Option<i64> {
        (self.0.fract() == 0.0 && self.0.abs() <= MAX_SAFE_INTEGER).then_some(self.0 as i64)
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<i64> for Numeric {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::new(value as f64)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_integer() {
            Some(i) => write!(f, "{i}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_integer() {
            Some(i) => serializer.serialize_i64(i),
            None => serializer.serialize_f64(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::new)
    }
}

/// Nested event object of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "id_cliente_externo")]
    pub client_id: i64,
    #[serde(rename = "codigo_evento")]
    pub code: Numeric,
    #[serde(rename = "descripcion_evento")]
    pub description: String,
}

/// One location fix in the partner's schema.
///
/// Every key is always present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    #[serde(rename = "fecha")]
    pub timestamp: String,
    pub imei: String,
    #[serde(rename = "patente")]
    pub plate: String,
    #[serde(rename = "latitud")]
    pub latitude: String,
    #[serde(rename = "longitud")]
    pub longitude: String,
    #[serde(rename = "orientacion")]
    pub heading: Numeric,
    #[serde(rename = "altitud")]
    pub altitude: Numeric,
    #[serde(rename = "velocidad")]
    pub speed: Numeric,
    #[serde(rename = "estado_motor")]
    pub engine_on: u8,
    #[serde(rename = "id_cliente_externo")]
    pub client_id: i64,
    #[serde(rename = "odometro_virtual")]
    pub virtual_odometer: Numeric,
    #[serde(rename = "horometro_virtual")]
    pub virtual_hourmeter: String,
    #[serde(rename = "nivel_bateria")]
    pub battery_level: Numeric,
    #[serde(rename = "voltaje_externo")]
    pub external_voltage: Numeric,
    #[serde(rename = "estado_input1")]
    pub input1: Numeric,
    #[serde(rename = "estado_input2")]
    pub input2: Numeric,
    #[serde(rename = "estado_input3")]
    pub input3: Numeric,
    #[serde(rename = "estado_input4")]
    pub input4: Numeric,
    pub hdop: Numeric,
    #[serde(rename = "num_sat")]
    pub satellites: Numeric,
    #[serde(rename = "estado")]
    pub device_state: Numeric,
    pub ibutton: String,
    #[serde(rename = "temp_1")]
    pub temp1: Numeric,
    #[serde(rename = "temp_2")]
    pub temp2: Numeric,
    #[serde(rename = "temp_3")]
    pub temp3: Numeric,
    #[serde(rename = "evento")]
    pub event: EventPayload,
}
