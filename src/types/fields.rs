//! Lenient field access over inbound JSON objects.
//!
//! Producers are not trusted to send well-typed payloads. Every accessor
//! returns a value; a field that is present but cannot be coerced falls back
//! to its default and is remembered as degraded.

use crate::error::DecodeError;
use serde_json::{Map, Value};

/// A decoded record plus the names of fields that fell back to defaults
/// because their input could not be coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub record: T,
    pub degraded: Vec<&'static str>,
}

impl<T> Decoded<T> {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Records that can be built from a loosely-typed JSON object.
pub trait DecodeRecord: Sized {
    /// Build the record, pulling every field through `fields`.
    fn from_fields(fields: &mut FieldReader<'_>) -> Self;

    /// Decode one raw payload. Only fails when the payload is not a JSON
    /// object; individual fields never cause a failure.
    fn decode(payload: &[u8]) -> Result<Decoded<Self>, DecodeError> {
        let value: Value = serde_json::from_slice(payload)?;
        let object = match value {
            Value::Object(object) => object,
            other => return Err(DecodeError::NotAnObject(json_kind(&other))),
        };

        let mut fields = FieldReader::new(&object);
        let record = Self::from_fields(&mut fields);
        Ok(Decoded {
            record,
            degraded: fields.into_degraded(),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed, defaulting view over a JSON object.
pub struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    degraded: Vec<&'static str>,
}

impl<'a> FieldReader<'a> {
    pub fn new(object: &'a Map<String, Value>) -> Self {
        Self {
            object,
            degraded: Vec::new(),
        }
    }

    /// Read a text field. Numbers and booleans are rendered as text.
    pub fn string(&mut self, field: &'static str, default: &str) -> String {
        let object = self.object;
        match object.get(field) {
            None | Some(Value::Null) => default.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(_) => self.degrade(field, default.to_string()),
        }
    }

    /// Read a float field. Numeric strings are accepted.
    pub fn float(&mut self, field: &'static str, default: f64) -> f64 {
        let object = self.object;
        let parsed = match object.get(field) {
            None | Some(Value::Null) => return default,
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        match parsed {
            Some(v) if v.is_finite() => v,
            _ => self.degrade(field, default),
        }
    }

    /// Read an integer field. Floats are truncated toward zero; integer
    /// strings are accepted.
    pub fn integer(&mut self, field: &'static str, default: i64) -> i64 {
        let object = self.object;
        let parsed = match object.get(field) {
            None | Some(Value::Null) => return default,
            Some(Value::Number(n)) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                    .map(|f| f.trunc() as i64)
            }),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(_) => None,
        };

        match parsed {
            Some(v) => v,
            None => self.degrade(field, default),
        }
    }

    fn degrade<T>(&mut self, field: &'static str, default: T) -> T {
        if !self.degraded.contains(&field) {
            self.degraded.push(field);
        }
        default
    }

    pub fn into_degraded(self) -> Vec<&'static str> {
        self.degraded
    }
}
