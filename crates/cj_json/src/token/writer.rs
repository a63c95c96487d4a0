use alloc::string::String;
use alloc::vec::Vec;

use serde_json::Map;

use super::{JsonWrite, float_document, push_index_path, push_property_path};
use crate::{JsonError, JsonErrorKind};

enum Frame {
    Object {
        map: Map<String, serde_json::Value>,
        pending: Option<String>,
    },
    Array(Vec<serde_json::Value>),
}

/// Builds a `serde_json` document from written tokens.
///
/// ```
/// use cj_json::token::{JsonWrite, TokenWriter};
///
/// let mut writer = TokenWriter::new();
/// writer.write_start_object().unwrap();
/// writer.write_property_name("id").unwrap();
/// writer.write_integer(5).unwrap();
/// writer.write_end_object().unwrap();
/// assert_eq!(writer.into_document(), Some(serde_json::json!({"id": 5})));
/// ```
#[derive(Default)]
pub struct TokenWriter {
    stack: Vec<Frame>,
    root: Option<serde_json::Value>,
}

impl TokenWriter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The written document, `None` if nothing complete was written.
    pub fn into_document(self) -> Option<serde_json::Value> {
        if self.stack.is_empty() { self.root } else { None }
    }

    fn state_error(&self, message: &'static str) -> JsonError {
        JsonError::new(JsonErrorKind::WriterState(message), self.path())
    }

    fn push_value(&mut self, value: serde_json::Value) -> Result<(), JsonError> {
        let rejected = match self.stack.last_mut() {
            None if self.root.is_some() => Some("a document can only have one root value"),
            None => {
                self.root = Some(value);
                None
            }
            Some(Frame::Array(items)) => {
                items.push(value);
                None
            }
            Some(Frame::Object { map, pending }) => match pending.take() {
                Some(name) => {
                    map.insert(name, value);
                    None
                }
                None => Some("an object value requires a property name"),
            },
        };
        match rejected {
            Some(message) => Err(self.state_error(message)),
            None => Ok(()),
        }
    }
}

impl JsonWrite for TokenWriter {
    fn write_start_object(&mut self) -> Result<(), JsonError> {
        self.stack.push(Frame::Object {
            map: Map::new(),
            pending: None,
        });
        Ok(())
    }

    fn write_end_object(&mut self) -> Result<(), JsonError> {
        match self.stack.pop() {
            Some(Frame::Object { mut map, pending }) => {
                if let Some(name) = pending {
                    map.insert(name, serde_json::Value::Null);
                }
                self.push_value(serde_json::Value::Object(map))
            }
            Some(frame) => {
                self.stack.push(frame);
                Err(self.state_error("no object is open"))
            }
            None => Err(self.state_error("no object is open")),
        }
    }

    fn write_start_array(&mut self) -> Result<(), JsonError> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn write_end_array(&mut self) -> Result<(), JsonError> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.push_value(serde_json::Value::Array(items)),
            Some(frame) => {
                self.stack.push(frame);
                Err(self.state_error("no array is open"))
            }
            None => Err(self.state_error("no array is open")),
        }
    }

    fn write_property_name(&mut self, name: &str) -> Result<(), JsonError> {
        match self.stack.last_mut() {
            Some(Frame::Object { pending, .. }) if pending.is_none() => {
                *pending = Some(String::from(name));
                Ok(())
            }
            _ => Err(self.state_error("a property name can only be written inside an object")),
        }
    }

    #[inline]
    fn write_null(&mut self) -> Result<(), JsonError> {
        self.push_value(serde_json::Value::Null)
    }

    #[inline]
    fn write_bool(&mut self, value: bool) -> Result<(), JsonError> {
        self.push_value(serde_json::Value::Bool(value))
    }

    #[inline]
    fn write_integer(&mut self, value: i64) -> Result<(), JsonError> {
        self.push_value(serde_json::Value::Number(value.into()))
    }

    #[inline]
    fn write_float(&mut self, value: f64) -> Result<(), JsonError> {
        self.push_value(float_document(value))
    }

    #[inline]
    fn write_string(&mut self, value: &str) -> Result<(), JsonError> {
        self.push_value(serde_json::Value::String(String::from(value)))
    }

    fn write_token(&mut self, token: &serde_json::Value) -> Result<(), JsonError> {
        self.push_value(token.clone())
    }

    #[inline]
    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn path(&self) -> String {
        let mut path = String::new();
        for frame in &self.stack {
            match frame {
                Frame::Object { pending, map } => {
                    if let Some(name) = pending {
                        push_property_path(&mut path, name);
                    } else if let Some((name, _)) = map.iter().last() {
                        push_property_path(&mut path, name);
                    }
                }
                Frame::Array(items) => push_index_path(&mut path, items.len()),
            }
        }
        path
    }

    #[inline]
    fn is_property_pending(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Object {
                pending: Some(_),
                ..
            })
        )
    }

    fn write_end(&mut self) -> Result<(), JsonError> {
        match self.stack.last() {
            Some(Frame::Object { .. }) => self.write_end_object(),
            Some(Frame::Array(_)) => self.write_end_array(),
            None => Err(self.state_error("no container is open")),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::TokenWriter;
    use crate::token::JsonWrite;

    #[test]
    fn unwind_completes_pending_property() {
        let mut writer = TokenWriter::new();
        writer.write_start_object().unwrap();
        writer.write_property_name("ok").unwrap();
        writer.write_bool(true).unwrap();
        let depth = writer.depth();
        writer.write_property_name("broken").unwrap();
        writer.write_start_array().unwrap();
        writer.write_integer(1).unwrap();
        assert_eq!(writer.path(), "broken[1]");

        writer.unwind_to(depth).unwrap();
        writer.write_end_object().unwrap();
        assert_eq!(
            writer.into_document(),
            Some(json!({"ok": true, "broken": [1]}))
        );
    }

    #[test]
    fn non_finite_floats_are_strings() {
        let mut writer = TokenWriter::new();
        writer.write_start_array().unwrap();
        writer.write_float(f64::NAN).unwrap();
        writer.write_float(f64::NEG_INFINITY).unwrap();
        writer.write_float(1.5).unwrap();
        writer.write_end_array().unwrap();
        assert_eq!(
            writer.into_document(),
            Some(json!(["NaN", "-Infinity", 1.5]))
        );
    }

    #[test]
    fn rejects_value_without_name() {
        let mut writer = TokenWriter::new();
        writer.write_start_object().unwrap();
        assert!(writer.write_integer(1).is_err());
    }
}
