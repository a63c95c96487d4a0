use alloc::string::{String, ToString};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cj_reflect::{PrimitiveType, Value};

use super::SerializerReader;
use crate::contract::{Contract, ContractDetails};
use crate::internal::{format_date_with, parse_date};
use crate::token::{JsonRead, float_text, format_date};
use crate::{JsonError, JsonErrorKind};

impl SerializerReader<'_> {
    /// Converts a value read from a scalar token to the type of `contract`.
    ///
    /// Values the type already accepts pass through unchanged.
    pub(super) fn ensure_type(
        &self,
        reader: &dyn JsonRead,
        value: Value,
        contract: &Contract,
    ) -> Result<Value, JsonError> {
        if contract.underlying_type.accepts(&value) {
            return Ok(value);
        }
        if value.is_null() {
            return Err(conversion_error(reader, &value, contract));
        }

        match &contract.details {
            ContractDetails::Primitive(details) => {
                let Some(primitive) = self.coerce_primitive(&value, details.primitive) else {
                    return Err(conversion_error(reader, &value, contract));
                };
                match (&details.convertible, contract.underlying_type.as_def()) {
                    (Some(convertible), Some(handle)) => (convertible.from_primitive)(handle, primitive)
                        .map_err(|e| JsonError::user(e, reader.path())),
                    _ => Ok(primitive),
                }
            }
            ContractDetails::String(conversion) => match (&value, contract.underlying_type.as_def()) {
                (Value::String(text), Some(handle)) => {
                    (conversion.from_string)(handle, text).map_err(|e| JsonError::user(e, reader.path()))
                }
                _ => Err(conversion_error(reader, &value, contract)),
            },
            _ => Err(conversion_error(reader, &value, contract)),
        }
    }

    /// Coerces a scalar to a primitive kind, `None` if it does not convert.
    fn coerce_primitive(&self, value: &Value, target: PrimitiveType) -> Option<Value> {
        let coerced = match (target, value) {
            (PrimitiveType::Integer, Value::Integer(i)) => Value::Integer(*i),
            (PrimitiveType::Integer, Value::Float(x)) => Value::Integer(float_to_integer(*x)?),
            (PrimitiveType::Integer, Value::String(s)) => Value::Integer(s.trim().parse().ok()?),
            (PrimitiveType::Integer, Value::Bool(b)) => Value::Integer(i64::from(*b)),
            (PrimitiveType::Integer, Value::Char(c)) => Value::Integer(i64::from(u32::from(*c))),

            (PrimitiveType::Float, Value::Float(x)) => Value::Float(*x),
            (PrimitiveType::Float, Value::Integer(i)) => Value::Float(*i as f64),
            (PrimitiveType::Float, Value::String(s)) => Value::Float(s.trim().parse().ok()?),
            (PrimitiveType::Float, Value::Bool(b)) => Value::Float(if *b { 1.0 } else { 0.0 }),

            (PrimitiveType::Bool, Value::Bool(b)) => Value::Bool(*b),
            (PrimitiveType::Bool, Value::Integer(i)) => Value::Bool(*i != 0),
            (PrimitiveType::Bool, Value::String(s)) => match s.trim() {
                t if t.eq_ignore_ascii_case("true") => Value::Bool(true),
                t if t.eq_ignore_ascii_case("false") => Value::Bool(false),
                _ => return None,
            },

            (PrimitiveType::Char, Value::Char(c)) => Value::Char(*c),
            (PrimitiveType::Char, Value::String(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return None,
                }
            }
            (PrimitiveType::Char, Value::Integer(i)) => {
                Value::Char(u32::try_from(*i).ok().and_then(char::from_u32)?)
            }

            (PrimitiveType::String, other) => Value::String(self.scalar_string(other)?),

            (PrimitiveType::DateTime, Value::DateTime(date)) => Value::DateTime(*date),
            (PrimitiveType::DateTime, Value::String(s)) => {
                Value::DateTime(parse_date(s, self.state.settings)?)
            }

            (PrimitiveType::Bytes, Value::Bytes(bytes)) => Value::Bytes(bytes.clone()),
            (PrimitiveType::Bytes, Value::String(s)) => Value::Bytes(STANDARD.decode(s).ok()?),

            _ => return None,
        };
        Some(coerced)
    }

    /// The text of a scalar; booleans are lowercase.
    fn scalar_string(&self, value: &Value) -> Option<String> {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(x) if x.is_finite() => x.to_string(),
            Value::Float(x) => float_text(*x),
            Value::DateTime(date) => {
                format_date_with(date, self.state.settings.date_format.as_deref()).ok()?
            }
            Value::Bytes(bytes) => STANDARD.encode(bytes),
            Value::Null | Value::Token(_) | Value::Object(_) => return None,
        };
        Some(text)
    }
}

/// Rounds half to even, like a checked numeric conversion would.
fn float_to_integer(value: f64) -> Option<i64> {
    let rounded = value.round_ties_even();
    (rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64)
        .then_some(rounded as i64)
}

fn conversion_error(reader: &dyn JsonRead, value: &Value, contract: &Contract) -> JsonError {
    JsonError::new(
        JsonErrorKind::Conversion {
            value: describe(value),
            target: contract.type_name(),
        },
        reader.path(),
    )
}

/// A value as quoted in conversion errors.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => String::from("{null}"),
        Value::String(s) => alloc::format!("\"{s}\""),
        Value::DateTime(date) => format_date(date),
        Value::Bytes(bytes) => STANDARD.encode(bytes),
        Value::Token(token) => token.to_string(),
        Value::Float(x) if !x.is_finite() => float_text(*x),
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => c.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Object(_) => value.kind_name(),
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::float_to_integer;

    #[test]
    fn floats_round_half_to_even() {
        assert_eq!(float_to_integer(2.5), Some(2));
        assert_eq!(float_to_integer(3.5), Some(4));
        assert_eq!(float_to_integer(-1.5), Some(-2));
        assert_eq!(float_to_integer(f64::NAN), None);
        assert_eq!(float_to_integer(1e300), None);
    }
}
