use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use cj_reflect::{Content, Obj, ReflectError, Type, Value};

use super::object::member_depth;
use super::{SerializerReader, cannot_populate, unexpected, wrong_container};
use crate::contract::{ArrayDetails, ArrayStorage, Contract, ContractDetails, DictionaryDetails};
use crate::internal::{Scope, reflect_error};
use crate::token::{JsonRead, JsonToken};
use crate::{JsonError, JsonErrorKind};

/// Where the items of a list being read go.
type PushFn<'p> = dyn FnMut(Value) -> Result<(), ReflectError> + 'p;

impl SerializerReader<'_> {
    // -------------------------------------------------------------------------
    // Lists

    /// Reads the array at the current `[`.
    ///
    /// Arrays that cannot grow in place are read into a temporary list and
    /// created from it once the closing token is reached.
    pub(super) fn create_list(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
        existing: Option<Value>,
        id: Option<&str>,
    ) -> Result<Value, JsonError> {
        let ContractDetails::Array(details) = &contract.details else {
            return Err(wrong_container(reader, "array", contract));
        };
        if matches!(details.storage, ArrayStorage::Unsupported) {
            return Err(cannot_create(reader, "array", contract));
        }

        if !details.uses_surrogate() {
            let obj = match existing.and_then(Value::into_obj) {
                Some(obj) => obj,
                None => self.create_default(reader, contract)?,
            };
            self.populate_list(reader, &obj, contract, details, scope, id)?;
            return Ok(Value::Object(obj));
        }

        if id.is_some() {
            return Err(JsonError::new(
                JsonErrorKind::CannotPreserveReference(contract.type_name()),
                reader.path(),
            ));
        }
        let Some(created) = contract.created_type.as_def() else {
            return Err(cannot_create(reader, "array", contract));
        };

        let obj = match &details.storage {
            ArrayStorage::Grid { rank } => {
                let (dims, items) = self.read_grid(reader, details, scope, *rank)?;
                Obj::with_content(created, created.def().slot_defaults(), Content::Grid { dims, items })
            }
            ArrayStorage::Enumerable(enumerable) => {
                let Some(construct) = &enumerable.construct else {
                    return Err(cannot_create(reader, "enumerable", contract));
                };
                let items = self.read_surrogate(reader, contract, details, scope)?;
                construct(created, items).map_err(|e| JsonError::user(e, reader.path()))?
            }
            ArrayStorage::List { .. } | ArrayStorage::Unsupported => {
                let items = self.read_surrogate(reader, contract, details, scope)?;
                Obj::new_list(created, items)
            }
        };
        Ok(Value::Object(obj))
    }

    fn read_surrogate(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Contract,
        details: &ArrayDetails,
        scope: Scope<'_>,
    ) -> Result<Vec<Value>, JsonError> {
        let mut items = Vec::new();
        self.read_items(reader, contract, details, scope, None, &mut |item| {
            items.push(item);
            Ok(())
        })?;
        Ok(items)
    }

    /// Reads the array at the current `[` into `target`.
    pub(super) fn populate_list(
        &mut self,
        reader: &mut dyn JsonRead,
        target: &Obj,
        contract: &Contract,
        details: &ArrayDetails,
        scope: Scope<'_>,
        id: Option<&str>,
    ) -> Result<(), JsonError> {
        if details.uses_surrogate() || matches!(details.storage, ArrayStorage::Unsupported) {
            return Err(cannot_populate(reader, "array", contract));
        }
        log::trace!("started deserializing '{}' at '{}'", contract.type_name(), reader.path());
        self.add_reference(reader, id, target)?;
        self.on_deserializing(reader, contract, target)?;
        self.read_items(reader, contract, details, scope, Some(target), &mut |item| target.push(item))?;
        self.on_deserialized(reader, contract, target)?;
        log::trace!("finished deserializing '{}'", contract.type_name());
        Ok(())
    }

    /// Reads the items of the array at the current `[`, leaving the reader
    /// on its `]`.
    fn read_items(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Contract,
        details: &ArrayDetails,
        scope: Scope<'_>,
        owner: Option<&Obj>,
        push: &mut PushFn<'_>,
    ) -> Result<(), JsonError> {
        self.state.enter_container(reader.depth(), || reader.path())?;
        let item_type = &details.container.item_type;
        let item_contract = details
            .container
            .item_contract(self.state.resolver)
            .map_err(|e| JsonError::new(e, reader.path()))?;
        let item_scope = Scope::item(&details.container, scope.member);
        let depth = reader.depth() + 1;

        let mut index = 0_i64;
        let mut last_error_position = None;
        loop {
            self.read_or_end(reader, "deserializing an array")?;
            match reader.token() {
                JsonToken::EndArray => return Ok(()),
                JsonToken::Comment(_) => continue,
                _ => {}
            }
            let result = self
                .read_value(reader, item_type, &item_contract, item_scope, None)
                .and_then(|item| push(item).map_err(|e| reflect_error(e, reader.path())));
            if let Err(error) = result {
                let position = reader.position();
                if last_error_position == Some(position) {
                    return Err(JsonError::new(JsonErrorKind::InfiniteLoop, reader.path()));
                }
                last_error_position = Some(position);
                let owner = owner.map(|obj| (obj, contract));
                self.recover(reader, owner, Value::Integer(index), depth, error)?;
            }
            index += 1;
        }
    }

    // -------------------------------------------------------------------------
    // Multidimensional arrays

    /// Reads nested arrays, one level per dimension, into row-major items.
    ///
    /// Open levels are kept on an explicit stack of item counts, one per
    /// `[` that is not yet closed.
    fn read_grid(
        &mut self,
        reader: &mut dyn JsonRead,
        details: &ArrayDetails,
        scope: Scope<'_>,
        rank: usize,
    ) -> Result<(Vec<usize>, Vec<Value>), JsonError> {
        let item_type = &details.container.item_type;
        let item_contract = details
            .container
            .item_contract(self.state.resolver)
            .map_err(|e| JsonError::new(e, reader.path()))?;
        let item_scope = Scope::item(&details.container, scope.member);

        self.state.enter_container(reader.depth(), || reader.path())?;
        let mut dims: Vec<Option<usize>> = alloc::vec![None; rank];
        let mut open = alloc::vec![0_usize];
        let mut items = Vec::new();
        loop {
            self.read_or_end(reader, "deserializing a multidimensional array")?;
            match reader.token() {
                JsonToken::Comment(_) => continue,
                JsonToken::EndArray => {
                    let level = open.len() - 1;
                    let count = open.pop().unwrap_or(0);
                    match dims.get_mut(level) {
                        Some(Some(len)) if *len != count => {
                            return Err(JsonError::new(JsonErrorKind::NonCubicalArray, reader.path()));
                        }
                        Some(slot) => *slot = Some(count),
                        None => return Err(JsonError::new(JsonErrorKind::NonCubicalArray, reader.path())),
                    }
                    match open.last_mut() {
                        Some(parent) => *parent += 1,
                        None => break,
                    }
                }
                JsonToken::StartArray if open.len() < rank => {
                    self.state.enter_container(reader.depth(), || reader.path())?;
                    open.push(0);
                }
                _ if open.len() == rank => {
                    let item = self.read_value(reader, item_type, &item_contract, item_scope, None)?;
                    items.push(item);
                    if let Some(count) = open.last_mut() {
                        *count += 1;
                    }
                }
                _ => return Err(JsonError::new(JsonErrorKind::NonCubicalArray, reader.path())),
            }
        }

        Ok((dims.into_iter().map(|d| d.unwrap_or(0)).collect(), items))
    }

    // -------------------------------------------------------------------------
    // Dictionaries

    /// Reads the entries of the current object into `target`.
    ///
    /// Entered on the first property or the closing token.
    pub(super) fn populate_dictionary(
        &mut self,
        reader: &mut dyn JsonRead,
        target: &Obj,
        contract: &Contract,
        details: &DictionaryDetails,
        scope: Scope<'_>,
        id: Option<&str>,
    ) -> Result<(), JsonError> {
        log::trace!("started deserializing '{}' at '{}'", contract.type_name(), reader.path());
        self.add_reference(reader, id, target)?;
        self.on_deserializing(reader, contract, target)?;

        let key_contract = details
            .key_contract(self.state.resolver)
            .map_err(|e| JsonError::new(e, reader.path()))?;
        let item_type = &details.container.item_type;
        let item_contract = details
            .container
            .item_contract(self.state.resolver)
            .map_err(|e| JsonError::new(e, reader.path()))?;
        let item_scope = Scope::item(&details.container, scope.member);
        let depth = member_depth(reader);

        loop {
            match reader.token().clone() {
                JsonToken::PropertyName(name) => {
                    if !self.skip_metadata_property(reader, &name)? {
                        let result = self.read_entry(
                            reader,
                            target,
                            &name,
                            &key_contract,
                            item_type,
                            &item_contract,
                            item_scope,
                        );
                        if let Err(error) = result {
                            self.recover(reader, Some((target, contract)), Value::String(name), depth, error)?;
                        }
                    }
                }
                JsonToken::EndObject => break,
                JsonToken::Comment(_) => {}
                other => return Err(unexpected(reader, "deserializing a dictionary", &other)),
            }
            self.read_or_end(reader, "deserializing a dictionary")?;
        }

        self.on_deserialized(reader, contract, target)?;
        log::trace!("finished deserializing '{}'", contract.type_name());
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn read_entry(
        &mut self,
        reader: &mut dyn JsonRead,
        target: &Obj,
        name: &str,
        key_contract: &Contract,
        item_type: &Type,
        item_contract: &Arc<Contract>,
        item_scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        let key = self
            .ensure_type(reader, Value::from(name), key_contract)
            .map_err(|_| {
                JsonError::new(
                    JsonErrorKind::InvalidDictionaryKey {
                        key: String::from(name),
                        target: key_contract.type_name(),
                    },
                    reader.path(),
                )
            })?;
        self.read_value_start(reader, "deserializing a dictionary")?;
        let value = self.read_value(reader, item_type, item_contract, item_scope, None)?;
        target
            .upsert(key, value)
            .map_err(|e| reflect_error(e, reader.path()))
    }
}

fn cannot_create(reader: &dyn JsonRead, kind: &'static str, contract: &Contract) -> JsonError {
    JsonError::new(
        JsonErrorKind::CannotCreate {
            kind,
            type_name: contract.type_name(),
        },
        reader.path(),
    )
}
