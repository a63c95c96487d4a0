//! The token level: pull readers and push writers of JSON documents.
//!
//! The engines only talk to [`JsonRead`] and [`JsonWrite`], so any document
//! source or sink can be plugged in. [`TokenReader`] and [`TokenWriter`] work
//! over `serde_json` documents.

// -----------------------------------------------------------------------------
// Modules

mod reader;
mod writer;

// -----------------------------------------------------------------------------
// Exports

pub use reader::TokenReader;
pub use writer::TokenWriter;

// -----------------------------------------------------------------------------
// Imports

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number};

use crate::{JsonError, JsonErrorKind};

// -----------------------------------------------------------------------------
// JsonToken

/// A token of a JSON document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JsonToken {
    /// Before the first and after the last token.
    #[default]
    None,
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    PropertyName(String),
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    /// An embedded document passed through unchanged.
    Raw(serde_json::Value),
    Comment(String),
}

impl JsonToken {
    #[inline]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::StartObject | Self::StartArray)
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::EndObject | Self::EndArray)
    }

    /// Returns `true` for tokens carrying a single value.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Integer(_)
                | Self::Float(_)
                | Self::String(_)
                | Self::Boolean(_)
                | Self::Null
                | Self::Undefined
                | Self::Date(_)
                | Self::Bytes(_)
        )
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    /// The name of the token kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::StartObject => "StartObject",
            Self::EndObject => "EndObject",
            Self::StartArray => "StartArray",
            Self::EndArray => "EndArray",
            Self::PropertyName(_) => "PropertyName",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::Boolean(_) => "Boolean",
            Self::Null => "Null",
            Self::Undefined => "Undefined",
            Self::Date(_) => "Date",
            Self::Bytes(_) => "Bytes",
            Self::Raw(_) => "Raw",
            Self::Comment(_) => "Comment",
        }
    }
}

impl fmt::Display for JsonToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PropertyName(name) => write!(f, "PropertyName '{name}'"),
            Self::Integer(i) => write!(f, "Integer {i}"),
            Self::Float(x) => write!(f, "Float {x}"),
            Self::String(s) => write!(f, "String '{s}'"),
            Self::Boolean(b) => write!(f, "Boolean {b}"),
            other => f.write_str(other.kind_name()),
        }
    }
}

// -----------------------------------------------------------------------------
// JsonRead

/// A pull cursor over the tokens of a document.
///
/// Depth follows the nesting of containers: a container's start and end
/// tokens sit at the depth of the container itself, its property names and
/// values one level deeper.
pub trait JsonRead {
    /// Advances to the next token, returning `false` at the end of input.
    fn read(&mut self) -> Result<bool, JsonError>;

    /// The current token, [`JsonToken::None`] before the first read.
    fn token(&self) -> &JsonToken;

    fn depth(&self) -> usize;

    /// The path of the current token, e.g. `items[0].name`.
    fn path(&self) -> String;

    /// A monotonic count of tokens read so far.
    fn position(&self) -> usize;

    /// Skips the children of the current token.
    ///
    /// On a property name the value is skipped too; afterwards the reader is
    /// positioned on the last token of the skipped value.
    fn skip(&mut self) -> Result<(), JsonError> {
        if matches!(self.token(), JsonToken::PropertyName(_)) {
            self.read()?;
        }
        if self.token().is_start() {
            let depth = self.depth();
            while self.read()? && depth < self.depth() {}
        }
        Ok(())
    }
}

/// Reads the value at the current token into a document.
///
/// The reader is left on the last token of the value.
pub fn read_document(reader: &mut dyn JsonRead) -> Result<serde_json::Value, JsonError> {
    let value = match reader.token().clone() {
        JsonToken::StartObject => {
            let mut map = Map::new();
            loop {
                if !reader.read()? {
                    return Err(unexpected_end(reader, "reading an object"));
                }
                match reader.token().clone() {
                    JsonToken::EndObject => break,
                    JsonToken::Comment(_) => {}
                    JsonToken::PropertyName(name) => {
                        if !reader.read()? {
                            return Err(unexpected_end(reader, "reading an object"));
                        }
                        let child = read_document(reader)?;
                        map.insert(name, child);
                    }
                    other => return Err(unexpected(reader, "reading an object", &other)),
                }
            }
            serde_json::Value::Object(map)
        }
        JsonToken::StartArray => {
            let mut items = Vec::new();
            loop {
                if !reader.read()? {
                    return Err(unexpected_end(reader, "reading an array"));
                }
                match reader.token() {
                    JsonToken::EndArray => break,
                    JsonToken::Comment(_) => {}
                    _ => items.push(read_document(reader)?),
                }
            }
            serde_json::Value::Array(items)
        }
        JsonToken::Integer(i) => serde_json::Value::Number(i.into()),
        JsonToken::Float(x) => float_document(x),
        JsonToken::String(s) => serde_json::Value::String(s),
        JsonToken::Boolean(b) => serde_json::Value::Bool(b),
        JsonToken::Null | JsonToken::Undefined => serde_json::Value::Null,
        JsonToken::Date(date) => serde_json::Value::String(format_date(&date)),
        JsonToken::Bytes(bytes) => serde_json::Value::String(STANDARD.encode(bytes)),
        JsonToken::Raw(raw) => raw,
        other => return Err(unexpected(reader, "reading a value", &other)),
    };
    Ok(value)
}

fn unexpected(reader: &dyn JsonRead, context: &'static str, token: &JsonToken) -> JsonError {
    JsonError::new(
        JsonErrorKind::UnexpectedToken {
            context,
            token: alloc::format!("{token}"),
        },
        reader.path(),
    )
}

fn unexpected_end(reader: &dyn JsonRead, context: &'static str) -> JsonError {
    JsonError::new(JsonErrorKind::UnexpectedEnd(context), reader.path())
}

// -----------------------------------------------------------------------------
// JsonWrite

/// A push sink for the tokens of a document.
pub trait JsonWrite {
    fn write_start_object(&mut self) -> Result<(), JsonError>;

    fn write_end_object(&mut self) -> Result<(), JsonError>;

    fn write_start_array(&mut self) -> Result<(), JsonError>;

    fn write_end_array(&mut self) -> Result<(), JsonError>;

    fn write_property_name(&mut self, name: &str) -> Result<(), JsonError>;

    fn write_null(&mut self) -> Result<(), JsonError>;

    fn write_bool(&mut self, value: bool) -> Result<(), JsonError>;

    fn write_integer(&mut self, value: i64) -> Result<(), JsonError>;

    fn write_float(&mut self, value: f64) -> Result<(), JsonError>;

    fn write_string(&mut self, value: &str) -> Result<(), JsonError>;

    /// Number of open containers.
    fn depth(&self) -> usize;

    /// The path of the value being written.
    fn path(&self) -> String;

    /// Returns `true` while a property name waits for its value.
    fn is_property_pending(&self) -> bool;

    /// Closes the innermost open container.
    fn write_end(&mut self) -> Result<(), JsonError>;

    /// Writes a date as an ISO 8601 string in UTC.
    fn write_date(&mut self, value: &DateTime<Utc>) -> Result<(), JsonError> {
        self.write_string(&format_date(value))
    }

    /// Writes bytes as a base64 string.
    fn write_bytes(&mut self, value: &[u8]) -> Result<(), JsonError> {
        self.write_string(&STANDARD.encode(value))
    }

    /// Copies a document fragment.
    fn write_token(&mut self, token: &serde_json::Value) -> Result<(), JsonError> {
        match token {
            serde_json::Value::Null => self.write_null(),
            serde_json::Value::Bool(b) => self.write_bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => self.write_integer(i),
                None => self.write_float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => self.write_string(s),
            serde_json::Value::Array(items) => {
                self.write_start_array()?;
                for item in items {
                    self.write_token(item)?;
                }
                self.write_end_array()
            }
            serde_json::Value::Object(map) => {
                self.write_start_object()?;
                for (name, value) in map {
                    self.write_property_name(name)?;
                    self.write_token(value)?;
                }
                self.write_end_object()
            }
        }
    }

    /// Completes a pending property with `null` and closes containers until
    /// `depth` containers remain open.
    fn unwind_to(&mut self, depth: usize) -> Result<(), JsonError> {
        if self.is_property_pending() {
            self.write_null()?;
        }
        while self.depth() > depth {
            self.write_end()?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Helpers

/// Formats a date the way dates are written by default: RFC 3339 with `Z`.
pub fn format_date(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// A float as a document value; non-finite values become strings.
pub(crate) fn float_document(value: f64) -> serde_json::Value {
    match Number::from_f64(value) {
        Some(n) => serde_json::Value::Number(n),
        None => serde_json::Value::String(float_text(value)),
    }
}

/// The text of a non-finite float.
pub(crate) fn float_text(value: f64) -> String {
    if value.is_nan() {
        String::from("NaN")
    } else if value.is_sign_positive() {
        String::from("Infinity")
    } else {
        String::from("-Infinity")
    }
}

/// Appends a property name to a path, quoting names that contain path
/// separators.
pub(crate) fn push_property_path(path: &mut String, name: &str) {
    const SPECIAL: &[char] = &['.', ' ', '[', ']', '(', ')', '\''];
    if name.contains(SPECIAL) {
        path.push_str("['");
        path.push_str(&name.replace('\'', "\\'"));
        path.push_str("']");
    } else {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(name);
    }
}

pub(crate) fn push_index_path(path: &mut String, index: usize) {
    use core::fmt::Write;
    let _ = write!(path, "[{index}]");
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{JsonRead, JsonToken, TokenReader, read_document, push_property_path};

    #[test]
    fn paths_quote_special_names() {
        let mut path = String::from("root");
        push_property_path(&mut path, "a.b");
        assert_eq!(path, "root['a.b']");
        push_property_path(&mut path, "c");
        assert_eq!(path, "root['a.b'].c");
    }

    #[test]
    fn skip_and_read_document() {
        let doc = json!({"skip": {"deep": [1, 2]}, "keep": [true, null]});
        let mut reader = TokenReader::new(&doc);
        assert!(reader.read().unwrap());
        assert!(reader.read().unwrap());
        assert_eq!(reader.token(), &JsonToken::PropertyName("skip".into()));
        reader.skip().unwrap();
        assert_eq!(reader.token(), &JsonToken::EndObject);
        assert_eq!(reader.depth(), 1);

        assert!(reader.read().unwrap());
        assert_eq!(reader.path(), "keep");
        assert!(reader.read().unwrap());
        assert_eq!(read_document(&mut reader).unwrap(), json!([true, null]));
        assert_eq!(reader.token(), &JsonToken::EndArray);
    }
}
