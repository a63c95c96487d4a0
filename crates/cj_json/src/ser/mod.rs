//! The writer engine: walks a value graph under the guidance of contracts and
//! pushes it into a [`JsonWrite`].
//!
//! [`SerializerWriter`] lives for one top-level call. It keeps the stack of
//! objects being written, used to detect reference loops, and the reference
//! table used for `$id`/`$ref`.

// -----------------------------------------------------------------------------
// Modules

mod collection;
mod object;

// -----------------------------------------------------------------------------
// Imports

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use chrono::{DateTime, Utc};
use cj_reflect::{Obj, PrimitiveType, Type, Value};

use crate::contract::{ArrayStorage, Contract, ContractDetails, ContractKind, PrimitiveDetails};
use crate::converter::JsonConverter;
use crate::internal::{InternalState, Scope, ID, REF, TYPE, VALUE, format_date_with};
use crate::resolver::ContractResolver;
use crate::settings::{ReferenceLoopHandling, SerializerSettings, TypeNameHandling};
use crate::token::JsonWrite;
use crate::{JsonError, JsonErrorKind};

// -----------------------------------------------------------------------------
// SerializerWriter

/// Writes values for one serialization call.
///
/// Converters receive it to hand nested values back to the engine.
pub struct SerializerWriter<'a> {
    state: InternalState<'a>,
    /// Objects currently being written, outermost first.
    stack: Vec<Obj>,
    /// The declared type of the value passed to the latest
    /// [`serialize_value`](Self::serialize_value) and the stack length at
    /// that call.
    root: Option<(Type, usize)>,
}

/// The object or container whose children are being written, and where to
/// unwind to when writing one of them fails.
struct Frame<'f> {
    owner: &'f Obj,
    contract: &'f Contract,
    depth: usize,
    stack_len: usize,
}

impl<'a> SerializerWriter<'a> {
    pub(crate) fn new(settings: &'a SerializerSettings, resolver: &'a ContractResolver) -> Self {
        Self {
            state: InternalState::new(settings, resolver),
            stack: Vec::new(),
            root: None,
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

    /// Writes `value`, declared as `declared` when known.
    ///
    /// A handled error leaves the writer with every container opened by this
    /// call closed.
    pub fn serialize_value(
        &mut self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        declared: Option<&Type>,
    ) -> Result<(), JsonError> {
        let previous = self.root.take();
        if self.state.settings.type_name_handling == TypeNameHandling::Auto
            && let Some(declared) = declared
        {
            self.root = Some((declared.clone(), self.stack.len()));
        }
        let result = self.serialize_root(writer, value);
        self.root = previous;
        result
    }

    fn serialize_root(&mut self, writer: &mut dyn JsonWrite, value: &Value) -> Result<(), JsonError> {
        let depth = writer.depth();
        let stack_len = self.stack.len();
        let contract = self.state.value_contract(value, || writer.path());
        let result = match &contract {
            Ok(contract) => match self.reference_target(value, contract, Scope::default()) {
                Some(target) => self.write_reference(writer, target),
                None => self.write_value(writer, value, contract, Scope::default()),
            },
            Err(error) => Err(error.clone()),
        };
        let Err(error) = result else {
            return Ok(());
        };
        let handled = self.state.is_error_handled(
            None,
            contract.as_deref().ok(),
            None,
            writer.path(),
            &error,
        )?;
        self.state.clear_error_context();
        if !handled {
            return Err(error);
        }
        self.stack.truncate(stack_len);
        writer.unwind_to(depth)
    }

    // -------------------------------------------------------------------------
    // Dispatch

    /// Writes a value with its runtime contract.
    fn write_value(
        &mut self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        if value.is_null() {
            return writer.write_null();
        }
        if let Some(converter) = self.state.converter(contract, scope)
            && converter.can_write()
        {
            return self.write_convertible(writer, &*converter, value, contract, scope);
        }

        match &contract.details {
            ContractDetails::Object(details) => {
                let obj = expect_obj(writer, value, contract)?;
                self.write_object(writer, obj, contract, details, scope)
            }
            ContractDetails::Array(details) => {
                let obj = expect_obj(writer, value, contract)?;
                match &details.storage {
                    ArrayStorage::Grid { .. } => self.write_grid(writer, obj, contract, details, scope),
                    _ => self.write_list(writer, obj, contract, details, scope),
                }
            }
            ContractDetails::Dictionary(details) => {
                let obj = expect_obj(writer, value, contract)?;
                self.write_dictionary(writer, obj, contract, details, scope)
            }
            ContractDetails::Primitive(details) => {
                self.write_primitive_contract(writer, value, contract, details, scope)
            }
            ContractDetails::String(conversion) => {
                let text = (conversion.to_string)(value).map_err(|e| JsonError::user(e, writer.path()))?;
                writer.write_string(&text)
            }
            ContractDetails::Dynamic { properties } => {
                let obj = expect_obj(writer, value, contract)?;
                self.write_dynamic(writer, obj, contract, properties, scope)
            }
            ContractDetails::NativeSerializable(native) => {
                let obj = expect_obj(writer, value, contract)?;
                self.write_native(writer, obj, contract, native, scope)
            }
            ContractDetails::LinqToken => match value {
                Value::Token(token) => writer.write_token(token),
                other => self.write_primitive(writer, other),
            },
        }
    }

    fn write_convertible(
        &mut self,
        writer: &mut dyn JsonWrite,
        converter: &dyn JsonConverter,
        value: &Value,
        contract: &Contract,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        if let Some(target) = self.reference_target(value, contract, scope) {
            return self.write_reference(writer, target);
        }
        if !self.check_circular_reference(writer, value, contract, scope)? {
            return Ok(());
        }
        let obj = value.as_obj();
        if let Some(obj) = obj {
            self.stack.push(obj.clone());
        }
        log::trace!("started writing '{}' with a converter", contract.type_name());
        converter.write_json(writer, value, self)?;
        log::trace!("finished writing '{}' with a converter", contract.type_name());
        if obj.is_some() {
            self.stack.pop();
        }
        Ok(())
    }

    /// Writes the value of a child: a `$ref` when it was written before,
    /// nothing when it closes an ignored loop.
    fn write_child(
        &mut self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        let contract = self.state.value_contract(value, || writer.path())?;
        if let Some(target) = self.reference_target(value, &contract, scope) {
            return self.write_reference(writer, target);
        }
        if self.check_circular_reference(writer, value, &contract, scope)? {
            self.write_value(writer, value, &contract, scope)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // References

    /// The default of `IsReference` for a contract when nothing declares one.
    fn preserves(&self, contract: &Contract) -> bool {
        let handling = self.state.settings.preserve_references_handling;
        match contract.kind() {
            ContractKind::Array | ContractKind::Dictionary => handling.arrays(),
            _ => handling.objects(),
        }
    }

    fn is_reference(&self, contract: &Contract, scope: Scope<'_>) -> bool {
        scope
            .is_reference(contract)
            .unwrap_or_else(|| self.preserves(contract))
    }

    /// Returns the object to write as `$ref` when `value` was already written
    /// with an id.
    fn reference_target<'v>(
        &mut self,
        value: &'v Value,
        contract: &Contract,
        scope: Scope<'_>,
    ) -> Option<&'v Obj> {
        let obj = value.as_obj()?;
        if matches!(contract.kind(), ContractKind::Primitive | ContractKind::String) {
            return None;
        }
        if !self.is_reference(contract, scope) {
            return None;
        }
        self.state.references().is_referenced(obj).then_some(obj)
    }

    fn write_reference(&mut self, writer: &mut dyn JsonWrite, obj: &Obj) -> Result<(), JsonError> {
        let reference = self.state.references().get_reference(obj);
        log::trace!("writing reference '{reference}' at '{}'", writer.path());
        writer.write_start_object()?;
        writer.write_property_name(REF)?;
        writer.write_string(&reference)?;
        writer.write_end_object()
    }

    fn write_reference_id(&mut self, writer: &mut dyn JsonWrite, obj: &Obj) -> Result<(), JsonError> {
        let id = self.state.references().get_reference(obj);
        writer.write_property_name(ID)?;
        writer.write_string(&id)
    }

    /// Returns `true` if an object in `scope` may carry an `$id`: it is not a
    /// member value, or the member can be set when reading it back.
    fn is_reference_target(scope: Scope<'_>) -> bool {
        scope.member.is_none_or(|member| {
            member.writable
                || scope
                    .owner
                    .is_some_and(|owner| owner.creator_parameters.get(&member.name).is_some())
        })
    }

    /// Returns `false` if `value` closes a loop that is ignored.
    fn check_circular_reference(
        &self,
        writer: &dyn JsonWrite,
        value: &Value,
        contract: &Contract,
        scope: Scope<'_>,
    ) -> Result<bool, JsonError> {
        let Some(obj) = value.as_obj() else {
            return Ok(true);
        };
        if matches!(contract.kind(), ContractKind::Primitive | ContractKind::String)
            || !self.stack.iter().any(|o| o.ptr_eq(obj))
        {
            return Ok(true);
        }
        match scope.reference_loop_handling(self.state.settings.reference_loop_handling) {
            ReferenceLoopHandling::Error => Err(JsonError::new(
                JsonErrorKind::SelfReferencingLoop {
                    member: scope.member.map(|m| m.name.clone()),
                    type_name: String::from(obj.type_handle().name()),
                },
                writer.path(),
            )),
            ReferenceLoopHandling::Ignore => {
                log::trace!("skipping self referencing loop at '{}'", writer.path());
                Ok(false)
            }
            ReferenceLoopHandling::Serialize => Ok(true),
        }
    }

    // -------------------------------------------------------------------------
    // Type names

    /// Returns `true` if `$type` is written for a value of `contract`.
    ///
    /// `flag` selects the object or array part of the handling; `Auto`
    /// writes the name when the runtime type is not the one that would be
    /// created from the declared type.
    fn should_write_type(
        &self,
        flag: fn(TypeNameHandling) -> bool,
        contract: &Contract,
        scope: Scope<'_>,
    ) -> Result<bool, JsonError> {
        let handling = scope.type_name_handling(self.state.settings.type_name_handling);
        if flag(handling) {
            return Ok(true);
        }
        if handling != TypeNameHandling::Auto {
            return Ok(false);
        }
        let resolver = self.state.resolver;
        let declared = if let Some(member) = scope.member {
            member.property_contract(resolver)?
        } else if let Some(container) = scope.container {
            container.item_contract(resolver)?
        } else {
            // Containers are on the stack while their start is written.
            let pushed = usize::from(!matches!(
                contract.kind(),
                ContractKind::Primitive | ContractKind::String
            ));
            match &self.root {
                Some((ty, level)) if level + pushed == self.stack.len() => resolver.resolve(ty)?,
                _ => return Ok(false),
            }
        };
        Ok(declared.created_type != contract.underlying_type)
    }

    fn write_type_property(&self, writer: &mut dyn JsonWrite, ty: &Type) -> Result<(), JsonError> {
        let name = match (ty.as_def(), &self.state.settings.binder) {
            (Some(handle), Some(binder)) => binder.bind_to_name(handle),
            _ => ty.name(),
        };
        writer.write_property_name(TYPE)?;
        writer.write_string(&name)
    }

    /// Opens an object and writes its `$id` and `$type`.
    fn write_object_start(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        self.state.enter_container(writer.depth(), || writer.path())?;
        writer.write_start_object()?;
        if self.is_reference(contract, scope) && Self::is_reference_target(scope) {
            self.write_reference_id(writer, obj)?;
        }
        if self.should_write_type(TypeNameHandling::objects, contract, scope)? {
            self.write_type_property(writer, &contract.underlying_type)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Primitives

    fn write_primitive_contract(
        &mut self,
        writer: &mut dyn JsonWrite,
        value: &Value,
        contract: &Contract,
        details: &PrimitiveDetails,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        let converted;
        let value = match (&details.convertible, value) {
            (Some(convertible), Value::Object(obj)) => {
                converted = (convertible.to_primitive)(&obj.type_handle(), value.clone())
                    .map_err(|e| JsonError::user(e, writer.path()))?;
                &converted
            }
            _ => value,
        };

        if details.primitive == PrimitiveType::Bytes
            && self.should_write_type(TypeNameHandling::objects, contract, scope)?
        {
            self.state.enter_container(writer.depth(), || writer.path())?;
            writer.write_start_object()?;
            self.write_type_property(writer, &contract.underlying_type)?;
            writer.write_property_name(VALUE)?;
            self.write_primitive(writer, value)?;
            return writer.write_end_object();
        }
        self.write_primitive(writer, value)
    }

    pub(crate) fn write_primitive(&self, writer: &mut dyn JsonWrite, value: &Value) -> Result<(), JsonError> {
        match value {
            Value::Null => writer.write_null(),
            Value::Bool(b) => writer.write_bool(*b),
            Value::Char(c) => writer.write_string(c.encode_utf8(&mut [0; 4])),
            Value::Integer(i) => writer.write_integer(*i),
            Value::Float(x) => writer.write_float(*x),
            Value::String(s) => writer.write_string(s),
            Value::DateTime(date) => {
                let text = self.format_date(writer, date)?;
                writer.write_string(&text)
            }
            Value::Bytes(bytes) => writer.write_bytes(bytes),
            Value::Token(token) => writer.write_token(token),
            Value::Object(obj) => Err(JsonError::new(
                JsonErrorKind::IncompatibleType {
                    expected: String::from("primitive value"),
                    found: String::from(obj.type_handle().name()),
                },
                writer.path(),
            )),
        }
    }

    fn format_date(&self, writer: &dyn JsonWrite, date: &DateTime<Utc>) -> Result<String, JsonError> {
        let format = self.state.settings.date_format.as_deref();
        format_date_with(date, format).map_err(|_| {
            JsonError::new(
                JsonErrorKind::Custom(alloc::format!(
                    "Invalid date format '{}'",
                    format.unwrap_or_default()
                )),
                writer.path(),
            )
        })
    }

    // -------------------------------------------------------------------------
    // Callbacks and errors

    fn on_serializing(&self, writer: &dyn JsonWrite, contract: &Contract, obj: &Obj) -> Result<(), JsonError> {
        contract
            .invoke_on_serializing(obj, &self.state.settings.context)
            .map_err(|e| JsonError::user(e, writer.path()))
    }

    fn on_serialized(&self, writer: &dyn JsonWrite, contract: &Contract, obj: &Obj) -> Result<(), JsonError> {
        contract
            .invoke_on_serialized(obj, &self.state.settings.context)
            .map_err(|e| JsonError::user(e, writer.path()))
    }

    /// Passes a failed child write to the error hooks of the frame's object.
    ///
    /// A handled error is swallowed after the writer is unwound to the
    /// frame's depth.
    fn recover(
        &mut self,
        writer: &mut dyn JsonWrite,
        frame: &Frame<'_>,
        member: Value,
        result: Result<(), JsonError>,
    ) -> Result<(), JsonError> {
        let Err(error) = result else {
            return Ok(());
        };
        let handled = self.state.is_error_handled(
            Some(frame.owner),
            Some(frame.contract),
            Some(member),
            writer.path(),
            &error,
        )?;
        if !handled {
            return Err(error);
        }
        self.state.clear_error_context();
        self.stack.truncate(frame.stack_len);
        writer.unwind_to(frame.depth)
    }
}

fn expect_obj<'v>(writer: &dyn JsonWrite, value: &'v Value, contract: &Contract) -> Result<&'v Obj, JsonError> {
    value.as_obj().ok_or_else(|| {
        JsonError::new(
            JsonErrorKind::IncompatibleType {
                expected: contract.type_name(),
                found: value.kind_name(),
            },
            writer.path(),
        )
    })
}
