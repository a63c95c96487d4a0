use alloc::string::{String, ToString};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cj_reflect::{Obj, Value};

use super::{Frame, SerializerWriter};
use crate::contract::{ArrayDetails, ArrayStorage, Contract, ContractDetails, DictionaryDetails};
use crate::internal::{Scope, VALUES, reflect_error};
use crate::settings::TypeNameHandling;
use crate::token::{JsonWrite, float_text};
use crate::{JsonError, JsonErrorKind};

impl SerializerWriter<'_> {
    // -------------------------------------------------------------------------
    // Lists

    pub(super) fn write_list(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        details: &ArrayDetails,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        let items = match &details.storage {
            ArrayStorage::List { .. } | ArrayStorage::Grid { .. } => {
                obj.items().map_err(|e| reflect_error(e, writer.path()))?
            }
            ArrayStorage::Enumerable(enumerable) => {
                (enumerable.iterate)(obj).map_err(|e| JsonError::user(e, writer.path()))?
            }
            ArrayStorage::Unsupported => {
                return Err(JsonError::new(
                    JsonErrorKind::NotEnumerable(contract.type_name()),
                    writer.path(),
                ));
            }
        };

        self.on_serializing(writer, contract, obj)?;
        self.stack.push(obj.clone());
        let enveloped = self.write_array_start(writer, obj, contract, scope)?;

        self.state.enter_container(writer.depth(), || writer.path())?;
        writer.write_start_array()?;
        let frame = Frame {
            owner: obj,
            contract,
            depth: writer.depth(),
            stack_len: self.stack.len(),
        };
        let item_scope = Scope::item(&details.container, scope.member);
        for (index, item) in items.iter().enumerate() {
            let result = self.write_child(writer, item, item_scope);
            self.recover(writer, &frame, Value::Integer(index as i64), result)?;
        }
        writer.write_end_array()?;

        if enveloped {
            writer.write_end_object()?;
        }
        self.stack.pop();
        self.on_serialized(writer, contract, obj)
    }

    /// Wraps the array in an object when it carries an `$id` or `$type`; the
    /// items then follow under `$values`.
    ///
    /// Returns `true` if the wrapping object was opened.
    fn write_array_start(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        scope: Scope<'_>,
    ) -> Result<bool, JsonError> {
        let is_reference = self.is_reference(contract, scope) && Self::is_reference_target(scope);
        let include_type = self.should_write_type(TypeNameHandling::arrays, contract, scope)?;
        if !is_reference && !include_type {
            return Ok(false);
        }

        self.state.enter_container(writer.depth(), || writer.path())?;
        writer.write_start_object()?;
        if is_reference {
            self.write_reference_id(writer, obj)?;
        }
        if include_type {
            self.write_type_property(writer, &contract.underlying_type)?;
        }
        writer.write_property_name(VALUES)?;
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Multidimensional arrays

    /// Writes a grid as nested arrays, one level per dimension.
    pub(super) fn write_grid(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        details: &ArrayDetails,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        let (dims, items) = obj.grid().map_err(|e| reflect_error(e, writer.path()))?;

        self.on_serializing(writer, contract, obj)?;
        self.stack.push(obj.clone());
        let enveloped = self.write_array_start(writer, obj, contract, scope)?;

        let grid = Grid {
            owner: obj,
            contract,
            dims: &dims,
            items: &items,
            scope: Scope::item(&details.container, scope.member),
        };
        self.write_grid_level(writer, &grid, 0, 0)?;

        if enveloped {
            writer.write_end_object()?;
        }
        self.stack.pop();
        self.on_serialized(writer, contract, obj)
    }

    fn write_grid_level(
        &mut self,
        writer: &mut dyn JsonWrite,
        grid: &Grid<'_>,
        dimension: usize,
        offset: usize,
    ) -> Result<(), JsonError> {
        self.state.enter_container(writer.depth(), || writer.path())?;
        writer.write_start_array()?;
        let frame = Frame {
            owner: grid.owner,
            contract: grid.contract,
            depth: writer.depth(),
            stack_len: self.stack.len(),
        };

        let len = grid.dims.get(dimension).copied().unwrap_or(0);
        let innermost = dimension + 1 == grid.dims.len();
        for i in 0..len {
            let index = offset * len + i;
            if innermost {
                let item = grid.items.get(index).unwrap_or(&Value::Null);
                let result = self.write_child(writer, item, grid.scope);
                self.recover(writer, &frame, Value::Integer(i as i64), result)?;
            } else {
                self.write_grid_level(writer, grid, dimension + 1, index)?;
            }
        }
        writer.write_end_array()
    }

    // -------------------------------------------------------------------------
    // Dictionaries

    pub(super) fn write_dictionary(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        details: &DictionaryDetails,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        let entries = obj.entries().map_err(|e| reflect_error(e, writer.path()))?;

        self.on_serializing(writer, contract, obj)?;
        self.stack.push(obj.clone());
        self.write_object_start(writer, obj, contract, scope)?;

        let frame = Frame {
            owner: obj,
            contract,
            depth: writer.depth(),
            stack_len: self.stack.len(),
        };
        let item_scope = Scope::item(&details.container, scope.member);
        for (key, value) in entries {
            let key = self.dictionary_key(writer, &key)?;
            let name = self.state.resolver.naming().dictionary_key(&key);
            let result = self.write_entry(writer, &name, &value, item_scope);
            self.recover(writer, &frame, Value::String(name), result)?;
        }

        writer.write_end_object()?;
        self.stack.pop();
        self.on_serialized(writer, contract, obj)
    }

    /// The property name of a dictionary key.
    fn dictionary_key(&self, writer: &dyn JsonWrite, key: &Value) -> Result<String, JsonError> {
        let name = match key {
            Value::String(s) => s.clone(),
            Value::Char(c) => c.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(x) if x.is_finite() => x.to_string(),
            Value::Float(x) => float_text(*x),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(date) => self.format_date(writer, date)?,
            Value::Bytes(bytes) => STANDARD.encode(bytes),
            Value::Object(obj) => {
                let contract = self.state.value_contract(key, || writer.path())?;
                match &contract.details {
                    ContractDetails::String(conversion) => (conversion.to_string)(key)
                        .map_err(|e| JsonError::user(e, writer.path()))?,
                    ContractDetails::Primitive(details) => match &details.convertible {
                        Some(convertible) => {
                            let primitive = (convertible.to_primitive)(&obj.type_handle(), key.clone())
                                .map_err(|e| JsonError::user(e, writer.path()))?;
                            if primitive.as_obj().is_some() {
                                return Err(unsupported_key(writer, key));
                            }
                            self.dictionary_key(writer, &primitive)?
                        }
                        None => return Err(unsupported_key(writer, key)),
                    },
                    _ => return Err(unsupported_key(writer, key)),
                }
            }
            Value::Null | Value::Token(_) => return Err(unsupported_key(writer, key)),
        };
        Ok(name)
    }
}

/// A multidimensional array being written.
struct Grid<'g> {
    owner: &'g Obj,
    contract: &'g Contract,
    dims: &'g [usize],
    /// Items in row-major order.
    items: &'g [Value],
    scope: Scope<'g>,
}

fn unsupported_key(writer: &dyn JsonWrite, key: &Value) -> JsonError {
    JsonError::new(JsonErrorKind::UnsupportedKey(key.kind_name()), writer.path())
}

