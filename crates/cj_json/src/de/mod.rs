//! The reader engine: pulls tokens from a [`JsonRead`] and builds values the
//! way their contracts describe.
//!
//! Every `create_*` function is entered with the reader on the first token of
//! the value and leaves it on the last one. The `populate_*` functions of
//! objects are entered on the first property (or the closing token) instead,
//! after the metadata properties have been consumed.

// -----------------------------------------------------------------------------
// Modules

mod collection;
mod convert;
mod creator;
mod metadata;
mod object;

// -----------------------------------------------------------------------------
// Imports

use alloc::string::{String, ToString};
use alloc::sync::Arc;

use cj_reflect::{Obj, Type, Value};

use crate::contract::{Contract, ContractDetails};
use crate::converter::JsonConverter;
use crate::internal::{ID, InternalState, Scope};
use crate::resolver::ContractResolver;
use crate::settings::{MetadataPropertyHandling, SerializerSettings};
use crate::token::{JsonRead, JsonToken, format_date, read_document};
use crate::{JsonError, JsonErrorKind};

// -----------------------------------------------------------------------------
// SerializerReader

/// Reads values for one deserialization call.
///
/// Converters receive it to read nested values with the engine.
pub struct SerializerReader<'a> {
    state: InternalState<'a>,
}

impl<'a> SerializerReader<'a> {
    pub(crate) fn new(settings: &'a SerializerSettings, resolver: &'a ContractResolver) -> Self {
        Self {
            state: InternalState::new(settings, resolver),
        }
    }

    #[inline]
    pub fn settings(&self) -> &SerializerSettings {
        self.state.settings
    }

    #[inline]
    pub fn resolver(&self) -> &ContractResolver {
        self.state.resolver
    }

    /// Advances `reader`, failing when the call was cancelled.
    pub fn read(&mut self, reader: &mut dyn JsonRead) -> Result<bool, JsonError> {
        self.state.check_cancelled(|| reader.path())?;
        reader.read()
    }

    /// Reads the value at the current token as `ty`.
    ///
    /// The reader is left on the last token of the value.
    pub fn deserialize_value(&mut self, reader: &mut dyn JsonRead, ty: &Type) -> Result<Value, JsonError> {
        while matches!(reader.token(), JsonToken::Comment(_) | JsonToken::None) {
            self.read_or_end(reader, "reading a value")?;
        }
        let contract = self.state.contract(ty, || reader.path())?;
        self.read_value(reader, ty, &contract, Scope::default(), None)
    }

    /// Reads a whole document as `ty`.
    pub(crate) fn deserialize(&mut self, reader: &mut dyn JsonRead, ty: &Type) -> Result<Value, JsonError> {
        let contract = self.state.contract(ty, || reader.path())?;
        if !self.read_content(reader)? {
            if !contract.is_nullable {
                return Err(JsonError::new(
                    JsonErrorKind::NoContent(contract.type_name()),
                    reader.path(),
                ));
            }
            return Ok(Value::Null);
        }

        let value = match self.read_value(reader, ty, &contract, Scope::default(), None) {
            Ok(value) => value,
            Err(error) => {
                let handled =
                    self.state
                        .is_error_handled(None, Some(&contract), None, reader.path(), &error)?;
                self.state.clear_error_context();
                if !handled {
                    return Err(error);
                }
                Value::Null
            }
        };

        if self.state.settings.check_additional_content {
            while self.read(reader)? {
                if !matches!(reader.token(), JsonToken::Comment(_)) {
                    return Err(JsonError::new(JsonErrorKind::AdditionalContent, reader.path()));
                }
            }
        }
        Ok(value)
    }

    /// Reads a document onto an existing object, list or dictionary.
    pub(crate) fn populate(&mut self, reader: &mut dyn JsonRead, target: &Obj) -> Result<(), JsonError> {
        let ty = Type::Def(target.type_handle());
        let contract = self.state.contract(&ty, || reader.path())?;
        if !self.read_content(reader)? {
            return Err(JsonError::new(
                JsonErrorKind::NoContent(contract.type_name()),
                reader.path(),
            ));
        }

        match reader.token() {
            JsonToken::StartArray => match &contract.details {
                ContractDetails::Array(details) => {
                    self.populate_list(reader, target, &contract, details, Scope::default(), None)
                }
                _ => Err(cannot_populate(reader, "array", &contract)),
            },
            JsonToken::StartObject => {
                self.read_or_end(reader, "populating an object")?;
                let mut id = None;
                if self.state.settings.metadata_property_handling != MetadataPropertyHandling::Ignore
                    && matches!(reader.token(), JsonToken::PropertyName(name) if name == ID)
                {
                    self.read_or_end(reader, "populating an object")?;
                    id = scalar_text(reader.token());
                    self.read_or_end(reader, "populating an object")?;
                }
                match &contract.details {
                    ContractDetails::Dictionary(details) => self.populate_dictionary(
                        reader,
                        target,
                        &contract,
                        details,
                        Scope::default(),
                        id.as_deref(),
                    ),
                    ContractDetails::Object(details) => self
                        .populate_object(reader, target, &contract, details, Scope::default(), id.as_deref()),
                    _ => Err(cannot_populate(reader, "object", &contract)),
                }
            }
            other => Err(unexpected(reader, "populating an object", other)),
        }
    }

    // -------------------------------------------------------------------------
    // Values

    /// Reads a value with its converter, or with the contract driven path.
    fn read_value(
        &mut self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
        existing: Option<Value>,
    ) -> Result<Value, JsonError> {
        match self.read_converter(contract, scope) {
            Some(converter) => self.read_convertible(reader, &*converter, ty, existing),
            None => self.create_value(reader, ty, contract, scope, existing),
        }
    }

    /// The converter used to read a value of `contract`, if one can read.
    fn read_converter(&self, contract: &Contract, scope: Scope<'_>) -> Option<Arc<dyn JsonConverter>> {
        self.state
            .converter(contract, scope)
            .filter(|converter| converter.can_read())
    }

    fn read_convertible(
        &mut self,
        reader: &mut dyn JsonRead,
        converter: &dyn JsonConverter,
        ty: &Type,
        existing: Option<Value>,
    ) -> Result<Value, JsonError> {
        log::trace!("started reading '{}' with a converter at '{}'", ty, reader.path());
        let value = converter.read_json(reader, ty, existing, self)?;
        log::trace!("finished reading '{}' with a converter", ty);
        Ok(value)
    }

    /// Reads the value at the current token without consulting converters.
    fn create_value(
        &mut self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
        existing: Option<Value>,
    ) -> Result<Value, JsonError> {
        if matches!(contract.details, ContractDetails::LinqToken) {
            return Ok(Value::Token(read_document(reader)?));
        }
        loop {
            let token = reader.token().clone();
            match token {
                JsonToken::StartObject => {
                    return self.create_object(reader, ty, contract, scope, existing);
                }
                JsonToken::StartArray => {
                    if contract.underlying_type == Type::Any {
                        return Ok(Value::Token(read_document(reader)?));
                    }
                    return self.create_list(reader, contract, scope, existing, None);
                }
                JsonToken::String(s) if is_empty_string_null(ty, contract, &Value::from(s.as_str())) => {
                    return Ok(Value::Null);
                }
                JsonToken::Raw(raw) => return Ok(Value::Token(raw)),
                JsonToken::Comment(_) => {}
                token => match token_value(token) {
                    Some(value) => return self.ensure_type(reader, value, contract),
                    None => {
                        let token = reader.token().clone();
                        return Err(unexpected(reader, "deserializing", &token));
                    }
                },
            }
            self.read_or_end(reader, "deserializing")?;
        }
    }

    // -------------------------------------------------------------------------
    // Reading helpers

    /// Reads the next token, failing at the end of input.
    fn read_or_end(&mut self, reader: &mut dyn JsonRead, context: &'static str) -> Result<(), JsonError> {
        if self.read(reader)? {
            Ok(())
        } else {
            Err(unexpected_end(reader, context))
        }
    }

    /// Moves from a property name to its value, skipping comments.
    fn read_value_start(&mut self, reader: &mut dyn JsonRead, context: &'static str) -> Result<(), JsonError> {
        loop {
            if !self.read(reader)? {
                return Err(unexpected_end(reader, context));
            }
            if !matches!(reader.token(), JsonToken::Comment(_)) {
                return Ok(());
            }
        }
    }

    /// Reads up to the next token that is not a comment.
    fn read_content(&mut self, reader: &mut dyn JsonRead) -> Result<bool, JsonError> {
        loop {
            if !self.read(reader)? {
                return Ok(false);
            }
            if !matches!(reader.token(), JsonToken::Comment(_)) {
                return Ok(true);
            }
        }
    }

    /// Reads an object from the current property on into a document.
    fn read_remaining_object(&mut self, reader: &mut dyn JsonRead) -> Result<serde_json::Value, JsonError> {
        let mut map = serde_json::Map::new();
        loop {
            match reader.token().clone() {
                JsonToken::PropertyName(name) => {
                    self.read_or_end(reader, "reading an object")?;
                    map.insert(name, read_document(reader)?);
                }
                JsonToken::EndObject => return Ok(serde_json::Value::Object(map)),
                JsonToken::Comment(_) => {}
                other => return Err(unexpected(reader, "reading an object", &other)),
            }
            self.read_or_end(reader, "reading an object")?;
        }
    }

    // -------------------------------------------------------------------------
    // Callbacks and errors

    fn on_deserializing(&self, reader: &dyn JsonRead, contract: &Contract, obj: &Obj) -> Result<(), JsonError> {
        contract
            .invoke_on_deserializing(obj, &self.state.settings.context)
            .map_err(|e| JsonError::user(e, reader.path()))
    }

    fn on_deserialized(&self, reader: &dyn JsonRead, contract: &Contract, obj: &Obj) -> Result<(), JsonError> {
        contract
            .invoke_on_deserialized(obj, &self.state.settings.context)
            .map_err(|e| JsonError::user(e, reader.path()))
    }

    fn add_reference(&mut self, reader: &dyn JsonRead, id: Option<&str>, obj: &Obj) -> Result<(), JsonError> {
        let Some(id) = id else {
            return Ok(());
        };
        log::trace!("read object reference id '{id}' at '{}'", reader.path());
        self.state
            .references()
            .add_reference(id, obj)
            .map_err(|e| e.or_path(|| reader.path()))
    }

    /// Passes a failed child read to the error hooks of `owner`.
    ///
    /// A handled error is swallowed after the rest of the failed value is
    /// skipped, leaving the reader at `depth`.
    fn recover(
        &mut self,
        reader: &mut dyn JsonRead,
        owner: Option<(&Obj, &Contract)>,
        member: Value,
        depth: usize,
        error: JsonError,
    ) -> Result<(), JsonError> {
        let (obj, contract) = owner.unzip();
        let handled = self
            .state
            .is_error_handled(obj, contract, Some(member), reader.path(), &error)?;
        if !handled {
            return Err(error);
        }
        self.state.clear_error_context();
        reader.skip()?;
        while reader.depth() > depth {
            if !self.read(reader)? {
                break;
            }
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Helpers

/// The value of a scalar token.
fn token_value(token: JsonToken) -> Option<Value> {
    let value = match token {
        JsonToken::Integer(i) => Value::Integer(i),
        JsonToken::Float(x) => Value::Float(x),
        JsonToken::String(s) => Value::String(s),
        JsonToken::Boolean(b) => Value::Bool(b),
        JsonToken::Null | JsonToken::Undefined => Value::Null,
        JsonToken::Date(date) => Value::DateTime(date),
        JsonToken::Bytes(bytes) => Value::Bytes(bytes),
        _ => return None,
    };
    Some(value)
}

/// The text of a scalar token, `None` for `null` and non-scalars.
fn scalar_text(token: &JsonToken) -> Option<String> {
    match token {
        JsonToken::String(s) => Some(s.clone()),
        JsonToken::Integer(i) => Some(i.to_string()),
        JsonToken::Float(x) => Some(x.to_string()),
        JsonToken::Boolean(b) => Some(b.to_string()),
        JsonToken::Date(date) => Some(format_date(date)),
        _ => None,
    }
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

fn cannot_populate(reader: &dyn JsonRead, found: &'static str, contract: &Contract) -> JsonError {
    JsonError::new(
        JsonErrorKind::CannotPopulate {
            found,
            type_name: contract.type_name(),
        },
        reader.path(),
    )
}

/// A JSON `found` container was read into a contract that needs another.
fn wrong_container(reader: &dyn JsonRead, found: &'static str, contract: &Contract) -> JsonError {
    let expected = match &contract.details {
        ContractDetails::Array(_) => "array",
        ContractDetails::Primitive(_) => "primitive value",
        ContractDetails::String(_) => "string value",
        _ => "object",
    };
    JsonError::new(
        JsonErrorKind::WrongContainer {
            found,
            expected,
            type_name: contract.type_name(),
        },
        reader.path(),
    )
}

/// Returns `true` for a string read as `null` for a nullable non-string type.
fn is_empty_string_null(ty: &Type, contract: &Contract, value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
        && *ty != Type::STRING
        && *ty != Type::Any
        && contract.is_nullable
}
