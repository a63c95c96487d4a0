use alloc::string::String;
use alloc::sync::Arc;

use cj_reflect::{Obj, Type, Value};

use crate::JsonError;
use crate::de::SerializerReader;
use crate::resolver::ContractResolver;
use crate::ser::SerializerWriter;
use crate::settings::{Formatting, SerializerSettings};
use crate::token::{JsonRead, JsonWrite, TokenReader, TokenWriter};

// -----------------------------------------------------------------------------
// JsonSerializer

/// Converts values to and from JSON under a fixed set of settings.
///
/// Every call runs with its own reference table and error state, so one
/// serializer can be shared between threads.
///
/// ```
/// use cj_json::{JsonSerializer, SerializerSettings};
/// use cj_reflect::{Type, Value};
///
/// let serializer = JsonSerializer::new(SerializerSettings::default());
/// let text = serializer.to_string(&Value::Integer(5), None).unwrap();
/// assert_eq!(text, "5");
/// assert_eq!(serializer.from_str("5", &Type::INTEGER).unwrap(), Value::Integer(5));
/// ```
#[derive(Clone)]
pub struct JsonSerializer {
    settings: SerializerSettings,
    resolver: Arc<ContractResolver>,
}

impl JsonSerializer {
    pub fn new(settings: SerializerSettings) -> Self {
        let resolver = settings
            .contract_resolver
            .clone()
            .unwrap_or_else(ContractResolver::shared);
        Self { settings, resolver }
    }

    #[inline]
    pub fn settings(&self) -> &SerializerSettings {
        &self.settings
    }

    #[inline]
    pub fn resolver(&self) -> &ContractResolver {
        &self.resolver
    }

    // -------------------------------------------------------------------------
    // Token streams

    /// Writes `value` to `writer`.
    ///
    /// `declared` is the type the value is known as; with
    /// [`TypeNameHandling::Auto`](crate::settings::TypeNameHandling::Auto) a
    /// `$type` is written for the root only when its runtime type differs.
    pub fn serialize(
        &self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        declared: Option<&Type>,
    ) -> Result<(), JsonError> {
        log::debug!("serializing '{}'", value.kind_name());
        SerializerWriter::new(&self.settings, &self.resolver).serialize_value(writer, value, declared)
    }

    /// Reads one document from `reader` as `ty`.
    pub fn deserialize(&self, reader: &mut dyn JsonRead, ty: &Type) -> Result<Value, JsonError> {
        log::debug!("deserializing '{ty}'");
        SerializerReader::new(&self.settings, &self.resolver).deserialize(reader, ty)
    }

    /// Reads one document from `reader` onto an existing object, list or
    /// dictionary.
    pub fn populate(&self, reader: &mut dyn JsonRead, target: &Obj) -> Result<(), JsonError> {
        log::debug!("populating '{}'", target.type_handle().name());
        SerializerReader::new(&self.settings, &self.resolver).populate(reader, target)
    }

    // -------------------------------------------------------------------------
    // Documents

    pub fn to_document(&self, value: &Value, declared: Option<&Type>) -> Result<serde_json::Value, JsonError> {
        let mut writer = TokenWriter::new();
        self.serialize(&mut writer, value, declared)?;
        Ok(writer.into_document().unwrap_or(serde_json::Value::Null))
    }

    pub fn from_document(&self, document: &serde_json::Value, ty: &Type) -> Result<Value, JsonError> {
        self.deserialize(&mut TokenReader::new(document), ty)
    }

    pub fn populate_document(&self, document: &serde_json::Value, target: &Obj) -> Result<(), JsonError> {
        self.populate(&mut TokenReader::new(document), target)
    }

    // -------------------------------------------------------------------------
    // Text

    /// Writes `value` as JSON text, indented per
    /// [`SerializerSettings::formatting`].
    pub fn to_string(&self, value: &Value, declared: Option<&Type>) -> Result<String, JsonError> {
        let document = self.to_document(value, declared)?;
        let text = match self.settings.formatting {
            Formatting::None => serde_json::to_string(&document),
            Formatting::Indented => serde_json::to_string_pretty(&document),
        };
        text.map_err(|e| JsonError::new(e, String::new()))
    }

    pub fn from_str(&self, text: &str, ty: &Type) -> Result<Value, JsonError> {
        self.from_document(&parse(text)?, ty)
    }

    pub fn populate_str(&self, text: &str, target: &Obj) -> Result<(), JsonError> {
        self.populate_document(&parse(text)?, target)
    }
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new(SerializerSettings::default())
    }
}

fn parse(text: &str) -> Result<serde_json::Value, JsonError> {
    serde_json::from_str(text).map_err(|e| JsonError::new(e, String::new()))
}
