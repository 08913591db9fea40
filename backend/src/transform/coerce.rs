//! Value coercion
//!
//! Converts one raw cell into the typed value a [`FieldSpec`] declares.
//!
//! | type       | output                                  |
//! |------------|-----------------------------------------|
//! | `string`   | the cell as text                        |
//! | `int`      | integer, integral floats accepted       |
//! | `float`    | finite floating-point number            |
//! | `datetime` | UTC epoch milliseconds (integer)        |
//! | `duration` | `H:MM:SS[.fff]` as total seconds (f64)  |
//!
//! Blank cells short-circuit to the field's `default`, untouched. A cell is
//! blank when it is null, whitespace only, or one of the spreadsheet
//! missing-value markers in [`NA_SENTINELS`].

use chrono_tz::Tz;
use serde_json::{Number, Value};

use super::datetime::parse_epoch_millis;
use crate::error::CoercionError;
use crate::models::{FieldSpec, FieldType};

/// Coerce a raw cell according to `spec`.
///
/// `None` stands for a column missing from the row.
pub fn coerce(raw: Option<&Value>, spec: &FieldSpec) -> Result<Value, CoercionError> {
    let raw = match raw {
        Some(v) if !is_blank(v) => v,
        _ => return Ok(spec.default.clone().unwrap_or(Value::Null)),
    };

    match spec.field_type {
        FieldType::String => Ok(Value::String(as_text(raw))),
        FieldType::Int => coerce_int(raw),
        FieldType::Float => coerce_float(raw),
        FieldType::Datetime => coerce_datetime(raw, spec.timezone.unwrap_or(Tz::UTC)),
        FieldType::Duration => coerce_duration(raw),
    }
}

/// Cell texts that spreadsheet tools write for a missing value.
pub const NA_SENTINELS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a cell counts as "no value".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || NA_SENTINELS.contains(&s)
        }
        _ => false,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_int(raw: &Value) -> Result<Value, CoercionError> {
    let fail = |message: &str| CoercionError::new(raw, FieldType::Int, message);

    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::from(i));
            }
            if let Some(u) = n.as_u64() {
                return Ok(Value::from(u));
            }
            n.as_f64()
                .and_then(integral)
                .map(Value::from)
                .ok_or_else(|| fail("not an integral number"))
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .and_then(integral)
                .map(Value::from)
                .ok_or_else(|| fail("not an integer"))
        }
        _ => Err(fail("not an integer")),
    }
}

/// `42.0` → `42`; anything with a fraction or out of range → `None`.
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn coerce_float(raw: &Value) -> Result<Value, CoercionError> {
    let fail = |message: &str| CoercionError::new(raw, FieldType::Float, message);

    let f = match raw {
        Value::Number(n) => n.as_f64().ok_or_else(|| fail("not a number"))?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| fail("not a number"))?,
        _ => return Err(fail("not a number")),
    };

    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| fail("not a finite number"))
}

fn coerce_datetime(raw: &Value, tz: Tz) -> Result<Value, CoercionError> {
    parse_epoch_millis(&as_text(raw), tz)
        .map(Value::from)
        .ok_or_else(|| CoercionError::new(raw, FieldType::Datetime, "unrecognised date/time"))
}

fn coerce_duration(raw: &Value) -> Result<Value, CoercionError> {
    let text = as_text(raw);
    let seconds = parse_duration_seconds(&text).map_err(|message| {
        CoercionError::new(raw, FieldType::Duration, message)
    })?;

    Number::from_f64(seconds)
        .map(Value::Number)
        .ok_or_else(|| CoercionError::new(raw, FieldType::Duration, "not a finite duration"))
}

/// Parse `"H:MM:SS[.fff]"` into total seconds.
pub fn parse_duration_seconds(text: &str) -> Result<f64, String> {
    let parts: Vec<&str> = text.trim().split(':').map(str::trim).collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(format!(
            "expected hours:minutes:seconds, found {} component(s)",
            parts.len()
        ));
    };

    let hours: i64 = hours
        .parse()
        .map_err(|_| format!("invalid hours '{}'", hours))?;
    let minutes: i64 = minutes
        .parse()
        .map_err(|_| format!("invalid minutes '{}'", minutes))?;
    let seconds: f64 = seconds
        .parse()
        .ok()
        .filter(|s: &f64| s.is_finite())
        .ok_or_else(|| format!("invalid seconds '{}'", seconds))?;

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}
