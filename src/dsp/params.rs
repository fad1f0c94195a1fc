//! Parameter sanitizing
//!
//! Settings arrive as loosely-typed JSON from the host. Nothing here fails:
//! missing, non-numeric and non-finite values fall back to the parameter's
//! default, and out-of-range values are clamped.

use serde_json::Value;

/// Inclusive range plus the value used when input is unusable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Same bounds, different fallback
    pub const fn with_default(self, default: f32) -> Self {
        Self { default, ..self }
    }

    /// Clamp a typed value; NaN and infinities become the default.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }

    /// Read `key` from a JSON object and clamp it.
    pub fn read(&self, json: &Value, key: &str) -> f32 {
        read_number(json, key)
            .map(|v| self.clamp(v))
            .unwrap_or(self.default)
    }
}

/// Mix percentage shared by every unit that has one
pub const MIX_PERCENT: ParamRange = ParamRange::new(0.0, 100.0, 100.0);

/// Finite number at `key`. Numeric strings are accepted.
pub fn read_number(json: &Value, key: &str) -> Option<f32> {
    let value = json.get(key)?;
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let number = number as f32;
    number.is_finite().then_some(number)
}

/// Boolean at `key`, or `default`
pub fn read_flag(json: &Value, key: &str, default: bool) -> bool {
    json.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// String at `key`
pub fn read_text<'a>(json: &'a Value, key: &str) -> Option<&'a str> {
    json.get(key).and_then(Value::as_str)
}

/// Nested object at `key`, or `Value::Null` (every reader treats null as empty)
pub fn read_section<'a>(json: &'a Value, key: &str) -> &'a Value {
    json.get(key).unwrap_or(&Value::Null)
}
