//! Loosely-typed column decoding

use std::error::Error;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio_postgres::types::{FromSql, Type};
use trackrelay_domain::{RawScalar, ZoneSetting};

type DecodeResult<T> = Result<T, Box<dyn Error + Sync + Send>>;

/// Scalar column decoded according to its declared type.
///
/// Integer, float and boolean columns keep their type; anything else that can
/// be read as text becomes [`RawScalar::Text`].
#[derive(Debug, Clone, PartialEq)]
pub struct SqlScalar(pub RawScalar);

impl<'a> FromSql<'a> for SqlScalar {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> DecodeResult<Self> {
        let value = if *ty == Type::BOOL {
            RawScalar::Bool(bool::from_sql(ty, raw)?)
        } else if *ty == Type::INT2 {
            RawScalar::Int(i64::from(i16::from_sql(ty, raw)?))
        } else if *ty == Type::INT4 {
            RawScalar::Int(i64::from(i32::from_sql(ty, raw)?))
        } else if *ty == Type::INT8 {
            RawScalar::Int(i64::from_sql(ty, raw)?)
        } else if *ty == Type::FLOAT4 {
            RawScalar::Float(f64::from(f32::from_sql(ty, raw)?))
        } else if *ty == Type::FLOAT8 {
            RawScalar::Float(f64::from_sql(ty, raw)?)
        } else if *ty == Type::NUMERIC {
            RawScalar::Float(decode_numeric(raw)?)
        } else {
            RawScalar::Text(String::from_sql(ty, raw)?)
        };
        Ok(Self(value))
    }

    fn accepts(ty: &Type) -> bool {
        [
            Type::BOOL,
            Type::INT2,
            Type::INT4,
            Type::INT8,
            Type::FLOAT4,
            Type::FLOAT8,
            Type::NUMERIC,
        ]
        .contains(ty)
            || <String as FromSql<'_>>::accepts(ty)
    }
}

/// Integer column read without passing through a float.
///
/// `NUMERIC` values are accepted when they carry no fractional part and fit
/// in an `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlInteger(pub i64);

impl<'a> FromSql<'a> for SqlInteger {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> DecodeResult<Self> {
        let value = if *ty == Type::INT2 {
            i64::from(i16::from_sql(ty, raw)?)
        } else if *ty == Type::INT4 {
            i64::from(i32::from_sql(ty, raw)?)
        } else if *ty == Type::NUMERIC {
            decode_numeric_integer(raw)?
        } else {
            i64::from_sql(ty, raw)?
        };
        Ok(Self(value))
    }

    fn accepts(ty: &Type) -> bool {
        [Type::INT2, Type::INT4, Type::INT8, Type::NUMERIC].contains(ty)
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// Decode the binary `NUMERIC` wire format: a header of digit count, weight,
/// sign and display scale followed by base-10000 digits.
fn decode_numeric(raw: &[u8]) -> DecodeResult<f64> {
    let word = |idx: usize| -> DecodeResult<[u8; 2]> {
        raw.get(idx * 2..idx * 2 + 2)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = usize::from(u16::from_be_bytes(word(0)?));
    let weight = i32::from(i16::from_be_bytes(word(1)?));
    let sign = u16::from_be_bytes(word(2)?);
    if sign == NUMERIC_NAN {
        return Ok(f64::NAN);
    }

    let mut value = 0.0_f64;
    for i in 0..ndigits {
        let digit = f64::from(u16::from_be_bytes(word(4 + i)?));
        let exponent = weight - i32::try_from(i)?;
        value += digit * 10_000_f64.powi(exponent);
    }
    Ok(if sign == NUMERIC_NEG { -value } else { value })
}

/// Decode an integral `NUMERIC` exactly.
fn decode_numeric_integer(raw: &[u8]) -> DecodeResult<i64> {
    let word = |idx: usize| -> DecodeResult<u16> {
        raw.get(idx * 2..idx * 2 + 2)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u16::from_be_bytes)
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = usize::from(word(0)?);
    let weight = i16::from_be_bytes(word(1)?.to_be_bytes());
    let sign = word(2)?;
    if sign == NUMERIC_NAN {
        return Err("NaN is not an integer".into());
    }

    let mut value: i64 = 0;
    for i in 0..ndigits {
        let digit = i64::from(word(4 + i)?);
        let position = i32::from(weight) - i32::try_from(i)?;
        if position < 0 {
            if digit != 0 {
                return Err("numeric value has a fractional part".into());
            }
            continue;
        }
        let scale = 10_000_i64
            .checked_pow(u32::try_from(position)?)
            .ok_or("numeric value out of range")?;
        value = digit
            .checked_mul(scale)
            .and_then(|part| value.checked_add(part))
            .ok_or("numeric value out of range")?;
    }
    Ok(if sign == NUMERIC_NEG { -value } else { value })
}

/// Fix timestamp stored with or without a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlTimestamp {
    /// `timestamptz`
    Zoned(DateTime<Utc>),
    /// `timestamp`, wall time in the store zone
    Naive(NaiveDateTime),
}

impl SqlTimestamp {
    /// Resolve to UTC. Naive values are wall-clock times in `timezone`.
    pub fn to_utc(self, timezone: &ZoneSetting) -> DateTime<Utc> {
        match self {
            Self::Zoned(instant) => instant,
            Self::Naive(naive) => timezone.localize(naive),
        }
    }

    /// True for a naive wall time that `timezone` skips at a DST jump.
    pub fn is_skipped_in(self, timezone: &ZoneSetting) -> bool {
        matches!(self, Self::Naive(naive) if timezone.is_skipped(naive))
    }
}

impl<'a> FromSql<'a> for SqlTimestamp {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> DecodeResult<Self> {
        if *ty == Type::TIMESTAMPTZ {
            Ok(Self::Zoned(DateTime::<Utc>::from_sql(ty, raw)?))
        } else {
            Ok(Self::Naive(NaiveDateTime::from_sql(ty, raw)?))
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::TIMESTAMPTZ || *ty == Type::TIMESTAMP
    }
}
