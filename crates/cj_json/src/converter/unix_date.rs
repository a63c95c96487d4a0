use alloc::format;
use alloc::string::String;

use chrono::{DateTime, Utc};
use cj_reflect::{PrimitiveType, Type, Value};

use super::JsonConverter;
use crate::de::SerializerReader;
use crate::ser::SerializerWriter;
use crate::token::{JsonRead, JsonToken, JsonWrite};
use crate::{JsonError, JsonErrorKind};

/// Writes dates as the number of seconds since the Unix epoch.
///
/// Dates before the epoch cannot be written or read.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixDateTimeConverter;

impl UnixDateTimeConverter {
    fn from_seconds(seconds: i64, ty: &Type, path: String) -> Result<Value, JsonError> {
        if seconds < 0 {
            return Err(JsonError::new(
                JsonErrorKind::Conversion {
                    value: format!("{seconds}"),
                    target: ty.name(),
                },
                path,
            ));
        }
        match DateTime::<Utc>::from_timestamp(seconds, 0) {
            Some(date) => Ok(Value::DateTime(date)),
            None => Err(JsonError::new(
                JsonErrorKind::Conversion {
                    value: format!("{seconds}"),
                    target: ty.name(),
                },
                path,
            )),
        }
    }
}

impl JsonConverter for UnixDateTimeConverter {
    fn can_convert(&self, ty: &Type) -> bool {
        ty.primitive() == Some(PrimitiveType::DateTime)
    }

    fn write_json(
        &self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        _serializer: &mut SerializerWriter<'_>,
    ) -> Result<(), JsonError> {
        let Value::DateTime(date) = value else {
            return Err(JsonError::new(
                JsonErrorKind::IncompatibleType {
                    expected: String::from(PrimitiveType::DateTime.name()),
                    found: value.kind_name(),
                },
                writer.path(),
            ));
        };
        let seconds = date.timestamp();
        if seconds < 0 {
            return Err(JsonError::new(
                JsonErrorKind::Custom(String::from(
                    "Cannot convert date value that is before Unix epoch of 00:00:00 UTC on 1 January 1970",
                )),
                writer.path(),
            ));
        }
        writer.write_integer(seconds)
    }

    fn read_json(
        &self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        _existing: Option<Value>,
        _serializer: &mut SerializerReader<'_>,
    ) -> Result<Value, JsonError> {
        match reader.token() {
            JsonToken::Null | JsonToken::Undefined if ty.is_nullable() => Ok(Value::Null),
            JsonToken::Integer(seconds) => Self::from_seconds(*seconds, ty, reader.path()),
            JsonToken::String(text) => match text.trim().parse::<i64>() {
                Ok(seconds) => Self::from_seconds(seconds, ty, reader.path()),
                Err(_) => Err(JsonError::new(
                    JsonErrorKind::Conversion {
                        value: format!("'{text}'"),
                        target: ty.name(),
                    },
                    reader.path(),
                )),
            },
            other => Err(JsonError::new(
                JsonErrorKind::UnexpectedToken {
                    context: "parsing a Unix time",
                    token: format!("{other}"),
                },
                reader.path(),
            )),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use cj_reflect::{PrimitiveType, Type, Value};
    use serde_json::json;

    use super::UnixDateTimeConverter;
    use crate::{JsonSerializer, SerializerSettings};

    fn serializer() -> JsonSerializer {
        JsonSerializer::new(SerializerSettings::default().with_converter(UnixDateTimeConverter))
    }

    #[test]
    fn dates_are_written_as_seconds() {
        let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let doc = serializer()
            .to_document(&Value::DateTime(date), None)
            .unwrap();
        assert_eq!(doc, json!(1_577_836_800));

        let back = serializer()
            .from_document(&json!("1577836800"), &Type::DATE_TIME)
            .unwrap();
        assert_eq!(back, Value::DateTime(date));
    }

    #[test]
    fn pre_epoch_dates_are_rejected() {
        let date = Utc.with_ymd_and_hms(1969, 12, 31, 0, 0, 0).unwrap();
        assert!(serializer().to_document(&Value::DateTime(date), None).is_err());
        assert!(serializer().from_document(&json!(-1), &Type::DATE_TIME).is_err());
        assert_eq!(
            serializer()
                .from_document(&json!(null), &Type::Nullable(PrimitiveType::DateTime))
                .unwrap(),
            Value::Null
        );
    }
}
