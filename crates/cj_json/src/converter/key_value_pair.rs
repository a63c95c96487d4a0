use alloc::format;
use alloc::vec;

use cj_reflect::builtins::is_key_value_pair;
use cj_reflect::{Type, TypeHandle, Value};

use super::JsonConverter;
use crate::de::SerializerReader;
use crate::naming::eq_ignore_case;
use crate::ser::SerializerWriter;
use crate::token::{JsonRead, JsonToken, JsonWrite};
use crate::{JsonError, JsonErrorKind};

const KEY: &str = "Key";
const VALUE: &str = "Value";

/// Writes key/value pairs as `{"Key": .., "Value": ..}`.
///
/// Pairs have no default constructor and read-only members, so they are
/// created through their two argument constructor. Member names pass
/// through the resolver's naming strategy and are matched ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValuePairConverter;

impl KeyValuePairConverter {
    fn pair_types(ty: &TypeHandle) -> (Type, Type) {
        match ty.def().generic() {
            Some(generic) if generic.args.len() == 2 => {
                (generic.args[0].clone(), generic.args[1].clone())
            }
            _ => (Type::Any, Type::Any),
        }
    }
}

impl JsonConverter for KeyValuePairConverter {
    fn can_convert(&self, ty: &Type) -> bool {
        ty.as_def().is_some_and(is_key_value_pair)
    }

    fn write_json(
        &self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        serializer: &mut SerializerWriter<'_>,
    ) -> Result<(), JsonError> {
        let Some(pair) = value.as_obj() else {
            return Err(JsonError::new(
                JsonErrorKind::IncompatibleType {
                    expected: "KeyValuePair".into(),
                    found: value.kind_name(),
                },
                writer.path(),
            ));
        };
        let ty = pair.type_handle();
        let (key_type, value_type) = Self::pair_types(&ty);
        let key = pair.get(KEY).map_err(|e| JsonError::new(e, writer.path()))?;
        let item = pair.get(VALUE).map_err(|e| JsonError::new(e, writer.path()))?;
        let key_name = serializer.resolver().naming().property_name(KEY, false);
        let value_name = serializer.resolver().naming().property_name(VALUE, false);

        writer.write_start_object()?;
        writer.write_property_name(&key_name)?;
        serializer.serialize_value(writer, &key, Some(&key_type))?;
        writer.write_property_name(&value_name)?;
        serializer.serialize_value(writer, &item, Some(&value_type))?;
        writer.write_end_object()
    }

    fn read_json(
        &self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        _existing: Option<Value>,
        serializer: &mut SerializerReader<'_>,
    ) -> Result<Value, JsonError> {
        let Some(handle) = ty.as_def() else {
            return Err(JsonError::custom("KeyValuePairConverter requires a pair type"));
        };
        if reader.token().is_null() {
            return Ok(Value::Null);
        }
        if *reader.token() != JsonToken::StartObject {
            return Err(JsonError::new(
                JsonErrorKind::UnexpectedToken {
                    context: "reading a key value pair",
                    token: format!("{}", reader.token()),
                },
                reader.path(),
            ));
        }

        let (key_type, value_type) = Self::pair_types(handle);
        let mut key = key_type.default_value();
        let mut item = value_type.default_value();
        loop {
            if !serializer.read(reader)? {
                return Err(JsonError::new(
                    JsonErrorKind::UnexpectedEnd("reading a key value pair"),
                    reader.path(),
                ));
            }
            match reader.token().clone() {
                JsonToken::EndObject => break,
                JsonToken::Comment(_) => {}
                JsonToken::PropertyName(name) => {
                    if eq_ignore_case(&name, KEY) {
                        serializer.read(reader)?;
                        key = serializer.deserialize_value(reader, &key_type)?;
                    } else if eq_ignore_case(&name, VALUE) {
                        serializer.read(reader)?;
                        item = serializer.deserialize_value(reader, &value_type)?;
                    } else {
                        reader.skip()?;
                    }
                }
                other => {
                    return Err(JsonError::new(
                        JsonErrorKind::UnexpectedToken {
                            context: "reading a key value pair",
                            token: format!("{other}"),
                        },
                        reader.path(),
                    ));
                }
            }
        }

        let ctor = handle
            .def()
            .constructors()
            .iter()
            .find(|c| c.params().len() == 2)
            .ok_or_else(|| {
                JsonError::new(
                    JsonErrorKind::NoConstructor(handle.name().into()),
                    reader.path(),
                )
            })?;
        let pair = ctor
            .invoke(handle, vec![key, item])
            .map_err(|e| JsonError::new(e, reader.path()))?;
        Ok(Value::Object(pair))
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::Type;
    use cj_reflect::builtins::{key_value_pair, list_of};
    use serde_json::json;

    use super::KeyValuePairConverter;
    use crate::converter::JsonConverter;
    use crate::{JsonSerializer, SerializerSettings};

    #[test]
    fn pairs_round_trip_through_their_constructor() {
        let pair = key_value_pair(Type::STRING, Type::INTEGER);
        let list = list_of(Type::Def(pair.clone()));
        let serializer = JsonSerializer::new(SerializerSettings::default());

        let doc = json!([{"key": "a", "VALUE": 1}, {"Key": "b", "Value": 2}]);
        let value = serializer
            .from_document(&doc, &Type::Def(list.clone()))
            .unwrap();
        let items = value.as_obj().unwrap().items().unwrap();
        assert_eq!(items.len(), 2);
        let first = items[0].as_obj().unwrap();
        assert_eq!(first.get("Key").unwrap(), "a".into());
        assert_eq!(first.get("Value").unwrap(), 1.into());

        let written = serializer.to_document(&value, None).unwrap();
        assert_eq!(
            written,
            json!([{"Key": "a", "Value": 1}, {"Key": "b", "Value": 2}])
        );
    }

    #[test]
    fn only_pairs_are_converted() {
        let converter = KeyValuePairConverter;
        assert!(converter.can_convert(&Type::Def(key_value_pair(Type::STRING, Type::BOOL))));
        assert!(!converter.can_convert(&Type::Def(list_of(Type::STRING))));
        assert!(!converter.can_convert(&Type::STRING));
    }
}
