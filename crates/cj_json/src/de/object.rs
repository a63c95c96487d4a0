use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use cj_reflect::info::{NativeSerializable, TypeKind};
use cj_reflect::{Obj, Type, Value};

use super::metadata::Metadata;
use super::{SerializerReader, is_empty_string_null, token_value, unexpected, wrong_container};
use crate::contract::{
    ArrayStorage, Contract, ContractDetails, ContractKind, ObjectDetails, Property, PropertyCollection,
};
use crate::internal::{Scope, VALUE, reflect_error, value_equals};
use crate::settings::{
    ConstructorHandling, MetadataPropertyHandling, MissingMemberHandling, NullValueHandling,
    ObjectCreationHandling, Required,
};
use crate::token::{JsonRead, JsonToken};
use crate::{JsonError, JsonErrorKind};

/// Whether a property appeared in the object being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Presence {
    Missing,
    Null,
    Value,
}

impl SerializerReader<'_> {
    // -------------------------------------------------------------------------
    // Objects

    /// Reads the object at the current `{`.
    pub(super) fn create_object(
        &mut self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
        existing: Option<Value>,
    ) -> Result<Value, JsonError> {
        self.state.enter_container(reader.depth(), || reader.path())?;
        match self.state.settings.metadata_property_handling {
            MetadataPropertyHandling::Ignore => {
                self.read_or_end(reader, "deserializing an object")?;
                self.create_object_body(reader, ty, contract, scope, existing, Metadata::default())
            }
            MetadataPropertyHandling::Default => {
                let metadata = self.read_metadata(reader)?;
                self.create_object_body(reader, ty, contract, scope, existing, metadata)
            }
            MetadataPropertyHandling::ReadAhead => {
                let (mut nested, metadata) = self.read_ahead(reader)?;
                self.create_object_body(&mut nested, ty, contract, scope, existing, metadata)
            }
        }
    }

    /// Reads the rest of an object whose metadata has been consumed.
    fn create_object_body(
        &mut self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
        existing: Option<Value>,
        metadata: Metadata,
    ) -> Result<Value, JsonError> {
        if let Some(reference) = metadata.reference {
            log::trace!("resolved object reference '{reference}' at '{}'", reader.path());
            return match self.state.references().resolve_reference(&reference) {
                Some(obj) => Ok(Value::Object(obj)),
                None => Err(JsonError::new(JsonErrorKind::UnresolvedReference(reference), reader.path())),
            };
        }

        let resolved = match &metadata.type_name {
            Some(name) => self.resolve_type_name(reader, ty, contract, scope, name)?,
            None => None,
        };
        let (ty, contract) = match &resolved {
            Some((ty, contract)) => (ty, contract),
            None => (ty, contract),
        };
        let id = metadata.id.as_deref();

        if metadata.values {
            let list = self.create_list(reader, contract, scope, existing, id)?;
            if metadata.enclosed {
                self.read_to_end_object(reader)?;
            }
            return Ok(list);
        }

        match &contract.details {
            ContractDetails::Object(details) => {
                if contract.underlying_type == Type::Any {
                    return Ok(Value::Token(self.read_remaining_object(reader)?));
                }
                let existing = existing
                    .and_then(Value::into_obj)
                    .filter(|obj| ty.is_assignable_from(&Type::Def(obj.type_handle())));
                let obj = match existing {
                    Some(obj) => obj,
                    None => {
                        let (obj, populated) = self.create_new_object(reader, contract, details, scope, id)?;
                        if populated {
                            return Ok(Value::Object(obj));
                        }
                        obj
                    }
                };
                self.populate_object(reader, &obj, contract, details, scope, id)?;
                Ok(Value::Object(obj))
            }
            ContractDetails::Dictionary(details) => {
                let existing = existing
                    .and_then(Value::into_obj)
                    .filter(|obj| ty.is_assignable_from(&Type::Def(obj.type_handle())));
                let obj = match existing {
                    Some(obj) => obj,
                    None => self.create_default(reader, contract)?,
                };
                self.populate_dictionary(reader, &obj, contract, details, scope, id)?;
                Ok(Value::Object(obj))
            }
            ContractDetails::Dynamic { properties } => {
                let obj = match existing.and_then(Value::into_obj) {
                    Some(obj) => obj,
                    None => self.create_default(reader, contract)?,
                };
                self.populate_dynamic(reader, &obj, contract, properties, id)?;
                Ok(Value::Object(obj))
            }
            ContractDetails::NativeSerializable(native) => {
                self.create_native(reader, contract, native, id).map(Value::Object)
            }
            ContractDetails::Primitive(_) => self.read_enveloped_value(reader, ty, contract, scope, existing),
            ContractDetails::LinqToken => Ok(Value::Token(self.read_remaining_object(reader)?)),
            ContractDetails::Array(_) | ContractDetails::String(_) => {
                Err(wrong_container(reader, "object", contract))
            }
        }
    }

    /// Reads the `$value` of a primitive written inside an object.
    fn read_enveloped_value(
        &mut self,
        reader: &mut dyn JsonRead,
        ty: &Type,
        contract: &Arc<Contract>,
        scope: Scope<'_>,
        existing: Option<Value>,
    ) -> Result<Value, JsonError> {
        let handling = self.state.settings.metadata_property_handling;
        loop {
            match reader.token() {
                JsonToken::PropertyName(name) if handling != MetadataPropertyHandling::Ignore && name == VALUE => {
                    break;
                }
                JsonToken::PropertyName(name) => {
                    let name = name.clone();
                    if !self.skip_metadata_property(reader, &name)? {
                        return Err(wrong_container(reader, "object", contract));
                    }
                }
                JsonToken::Comment(_) => {}
                _ => return Err(wrong_container(reader, "object", contract)),
            }
            self.read_or_end(reader, "deserializing a primitive value")?;
        }

        self.read_value_start(reader, "deserializing a primitive value")?;
        if matches!(reader.token(), JsonToken::StartObject) {
            let token = reader.token().clone();
            return Err(unexpected(reader, "deserializing a primitive value", &token));
        }
        let value = self.create_value(reader, ty, contract, scope, existing)?;
        self.read_to_end_object(reader)?;
        Ok(value)
    }

    /// Reads to the closing token of the current object, skipping metadata
    /// read ahead.
    pub(super) fn read_to_end_object(&mut self, reader: &mut dyn JsonRead) -> Result<(), JsonError> {
        loop {
            self.read_or_end(reader, "deserializing an object")?;
            match reader.token() {
                JsonToken::EndObject => return Ok(()),
                JsonToken::Comment(_) => {}
                JsonToken::PropertyName(name) => {
                    let name = name.clone();
                    if !self.skip_metadata_property(reader, &name)? {
                        let token = reader.token().clone();
                        return Err(unexpected(reader, "deserializing an object", &token));
                    }
                }
                other => {
                    let token = other.clone();
                    return Err(unexpected(reader, "deserializing an object", &token));
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Creation

    /// Creates an instance with the default creator of `contract`.
    pub(super) fn create_default(&self, reader: &dyn JsonRead, contract: &Contract) -> Result<Obj, JsonError> {
        let allow_non_public =
            self.state.settings.constructor_handling == ConstructorHandling::AllowNonPublicDefaultConstructor;
        match &contract.default_creator {
            Some(creator) if !contract.default_creator_non_public || allow_non_public => {
                creator.create().map_err(|e| reflect_error(e, reader.path()))
            }
            _ => Err(not_creatable(reader, contract)),
        }
    }

    /// Creates an instance of an object contract.
    ///
    /// Returns `true` alongside the instance when it was created from the
    /// document by a creator with parameters, and is already populated.
    fn create_new_object(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Contract,
        details: &ObjectDetails,
        scope: Scope<'_>,
        id: Option<&str>,
    ) -> Result<(Obj, bool), JsonError> {
        let Some(created) = contract.created_type.as_def() else {
            return Err(not_creatable(reader, contract));
        };
        if !created.def().is_instantiable() {
            return Err(not_creatable(reader, contract));
        }

        if let Some(creator) = &details.override_creator {
            if !details.creator_parameters.is_empty() {
                let obj = self.create_with_parameters(reader, contract, details, creator, scope, id)?;
                return Ok((obj, true));
            }
            let obj = creator(created, Vec::new()).map_err(|e| JsonError::user(e, reader.path()))?;
            return Ok((obj, false));
        }

        let allow_non_public =
            self.state.settings.constructor_handling == ConstructorHandling::AllowNonPublicDefaultConstructor;
        if let Some(creator) = &contract.default_creator
            && (!contract.default_creator_non_public
                || allow_non_public
                || details.parameterized_creator.is_none())
        {
            let obj = creator.create().map_err(|e| reflect_error(e, reader.path()))?;
            return Ok((obj, false));
        }

        if let Some(creator) = &details.parameterized_creator {
            let obj = self.create_with_parameters(reader, contract, details, creator, scope, id)?;
            return Ok((obj, true));
        }
        Err(not_creatable(reader, contract))
    }

    // -------------------------------------------------------------------------
    // Population

    /// Reads the properties of the current object onto `obj`.
    ///
    /// Entered on the first property or the closing token, left on the
    /// closing token.
    pub(super) fn populate_object(
        &mut self,
        reader: &mut dyn JsonRead,
        obj: &Obj,
        contract: &Contract,
        details: &ObjectDetails,
        scope: Scope<'_>,
        id: Option<&str>,
    ) -> Result<(), JsonError> {
        log::trace!("started deserializing '{}' at '{}'", contract.type_name(), reader.path());
        self.on_deserializing(reader, contract, obj)?;
        let populates_defaults = self.state.settings.default_value_handling.populates();
        let mut presence = details
            .tracks_presence(populates_defaults)
            .then(|| vec![Presence::Missing; details.properties.len()]);
        self.add_reference(reader, id, obj)?;

        let depth = member_depth(reader);
        loop {
            match reader.token().clone() {
                JsonToken::PropertyName(name) => {
                    let result = self.read_member(reader, obj, contract, details, scope, &name, presence.as_deref_mut());
                    if let Err(error) = result {
                        self.recover(reader, Some((obj, contract)), Value::String(name), depth, error)?;
                    }
                }
                JsonToken::EndObject => break,
                JsonToken::Comment(_) => {}
                other => return Err(unexpected(reader, "deserializing an object", &other)),
            }
            self.read_or_end(reader, "deserializing an object")?;
        }

        if let Some(presence) = presence {
            for (property, state) in details.properties.iter().zip(presence) {
                let result = self.end_process_property(reader, obj, details, property, state, true);
                if let Err(error) = result {
                    let member = Value::from(property.name.as_str());
                    self.recover(reader, Some((obj, contract)), member, depth, error)?;
                }
            }
        }

        self.on_deserialized(reader, contract, obj)?;
        log::trace!("finished deserializing '{}'", contract.type_name());
        Ok(())
    }

    /// Reads one property, starting at its name.
    #[allow(clippy::too_many_arguments)]
    fn read_member(
        &mut self,
        reader: &mut dyn JsonRead,
        obj: &Obj,
        contract: &Contract,
        details: &ObjectDetails,
        scope: Scope<'_>,
        name: &str,
        presence: Option<&mut [Presence]>,
    ) -> Result<(), JsonError> {
        if self.skip_metadata_property(reader, name)? {
            return Ok(());
        }

        let Some(property) = details.properties.get_closest_match(name) else {
            let handling = details
                .missing_member_handling
                .unwrap_or(self.state.settings.missing_member_handling);
            if handling == MissingMemberHandling::Error {
                return Err(JsonError::new(
                    JsonErrorKind::MissingMember {
                        member: String::from(name),
                        type_name: contract.type_name(),
                    },
                    reader.path(),
                ));
            }
            self.read_value_start(reader, "setting a missing member")?;
            return self.set_extension_data(reader, obj, details, name);
        };

        if property.ignored || !self.should_deserialize(reader, obj, property)? {
            self.read_value_start(reader, "setting an ignored member")?;
            self.set_presence(reader, details, property, presence)?;
            return self.set_extension_data(reader, obj, details, name);
        }

        self.read_value_start(reader, "setting a member value")?;
        self.set_presence(reader, details, property, presence)?;
        if !self.set_property_value(reader, obj, Some(details), property, scope)? {
            self.set_extension_data(reader, obj, details, name)?;
        }
        Ok(())
    }

    fn should_deserialize(&self, reader: &dyn JsonRead, obj: &Obj, property: &Property) -> Result<bool, JsonError> {
        match &property.should_deserialize {
            Some(predicate) => predicate(obj).map_err(|e| JsonError::user(e, reader.path())),
            None => Ok(true),
        }
    }

    /// Records that `property` was met, with the value at the current token.
    fn set_presence(
        &self,
        reader: &dyn JsonRead,
        details: &ObjectDetails,
        property: &Property,
        presence: Option<&mut [Presence]>,
    ) -> Result<(), JsonError> {
        let Some(presence) = presence else {
            return Ok(());
        };
        let Some(index) = details.properties.index_of(property) else {
            return Ok(());
        };
        let state = match reader.token() {
            JsonToken::Null | JsonToken::Undefined => Presence::Null,
            JsonToken::String(s) => {
                let contract = self.state.contract(&property.property_type, || reader.path())?;
                if is_empty_string_null(&property.property_type, &contract, &Value::from(s.as_str())) {
                    Presence::Null
                } else {
                    Presence::Value
                }
            }
            _ => Presence::Value,
        };
        if let Some(slot) = presence.get_mut(index) {
            *slot = state;
        }
        Ok(())
    }

    /// Stores the value at the current token as extension data, or skips it
    /// when the object collects none.
    pub(super) fn set_extension_data(
        &mut self,
        reader: &mut dyn JsonRead,
        obj: &Obj,
        details: &ObjectDetails,
        name: &str,
    ) -> Result<(), JsonError> {
        let sink = details
            .extension_data
            .as_ref()
            .and_then(|data| data.setter.as_ref().map(|setter| (setter, &data.value_type)));
        let Some((setter, value_type)) = sink else {
            return reader.skip();
        };
        let contract = self.state.contract(value_type, || reader.path())?;
        let value = self.read_value(reader, value_type, &contract, Scope::default(), None)?;
        setter(obj, name, value).map_err(|e| JsonError::user(e, reader.path()))
    }

    /// Reads the value at the current token into `property` of `obj`.
    ///
    /// Returns `false` if the value was neither assigned nor populated into
    /// the current member value, so that it can go to extension data.
    pub(super) fn set_property_value(
        &mut self,
        reader: &mut dyn JsonRead,
        obj: &Obj,
        owner: Option<&ObjectDetails>,
        property: &Property,
        scope: Scope<'_>,
    ) -> Result<bool, JsonError> {
        let settings = self.state.settings;
        let mut contract = property
            .property_contract(self.state.resolver)
            .map_err(|e| JsonError::new(e, reader.path()))?;
        let member_scope = Scope {
            member: Some(property),
            owner,
            container: scope.container,
            container_member: scope.container_member,
        };
        let converter = self.read_converter(&contract, member_scope);

        let creation = property
            .object_creation_handling
            .unwrap_or(settings.object_creation_handling);
        let mut current = None;
        let mut use_existing = false;
        if creation != ObjectCreationHandling::Replace
            && (reader.token().is_start() || converter.is_some())
            && property.readable
            && contract.kind() != ContractKind::LinqToken
        {
            let value = property.get_value(obj).map_err(|e| reflect_error(e, reader.path()))?;
            if !value.is_null() {
                contract = self.state.value_contract(&value, || reader.path())?;
                use_existing = !is_read_only_or_fixed_size(&contract) && !is_value_type(&contract);
            }
            current = Some(value);
        }

        if !property.writable && !use_existing {
            return Ok(false);
        }

        let nulls = property
            .null_value_handling
            .or_else(|| owner.and_then(|o| o.item_null_value_handling))
            .unwrap_or(settings.null_value_handling);
        if nulls == NullValueHandling::Ignore && reader.token().is_null() {
            return Ok(true);
        }
        let defaults = property
            .default_value_handling
            .unwrap_or(settings.default_value_handling);
        if defaults.ignores()
            && !defaults.populates()
            && reader.token().is_primitive()
            && token_value(reader.token().clone())
                .is_some_and(|v| value_equals(&v, &property.resolved_default_value()))
        {
            return Ok(true);
        }

        let value = match &converter {
            Some(converter) => {
                if current.is_none() && property.readable {
                    current = Some(property.get_value(obj).map_err(|e| reflect_error(e, reader.path()))?);
                }
                self.read_convertible(reader, &**converter, &property.property_type, current.clone())?
            }
            None => {
                let existing = if use_existing { current.clone() } else { None };
                self.create_value(reader, &property.property_type, &contract, member_scope, existing)?
            }
        };

        if (!use_existing || current.as_ref() != Some(&value))
            && self.should_set_property_value(owner, property, &value)
        {
            property
                .set_value(obj, value)
                .map_err(|e| reflect_error(e, reader.path()))?;
            if let Some(set_is_specified) = &property.set_is_specified {
                set_is_specified(obj, true).map_err(|e| JsonError::user(e, reader.path()))?;
            }
            return Ok(true);
        }
        Ok(use_existing)
    }

    pub(super) fn should_set_property_value(
        &self,
        owner: Option<&ObjectDetails>,
        property: &Property,
        value: &Value,
    ) -> bool {
        let settings = self.state.settings;
        let nulls = property
            .null_value_handling
            .or_else(|| owner.and_then(|o| o.item_null_value_handling))
            .unwrap_or(settings.null_value_handling);
        if value.is_null() && nulls == NullValueHandling::Ignore {
            return false;
        }
        let defaults = property
            .default_value_handling
            .unwrap_or(settings.default_value_handling);
        if defaults.ignores()
            && !defaults.populates()
            && value_equals(value, &property.resolved_default_value())
        {
            return false;
        }
        property.writable
    }

    /// Checks the requiredness of a property after its object was read, and
    /// assigns its default when it was missing and defaults are populated.
    pub(super) fn end_process_property(
        &mut self,
        reader: &dyn JsonRead,
        obj: &Obj,
        details: &ObjectDetails,
        property: &Property,
        presence: Presence,
        set_default: bool,
    ) -> Result<(), JsonError> {
        let required = property.required_or(details.item_required);
        match presence {
            Presence::Missing => {
                if matches!(required, Required::AllowNull | Required::Always) {
                    return Err(JsonError::new(
                        JsonErrorKind::RequiredMissing {
                            property: property.name.clone(),
                        },
                        reader.path(),
                    ));
                }
                let populates = property
                    .default_value_handling
                    .unwrap_or(self.state.settings.default_value_handling)
                    .populates();
                if set_default && populates && property.writable && !property.ignored {
                    let contract = property
                        .property_contract(self.state.resolver)
                        .map_err(|e| JsonError::new(e, reader.path()))?;
                    let default = property.resolved_default_value();
                    if default.is_null() && !contract.is_nullable {
                        return Ok(());
                    }
                    let default = self.ensure_type(reader, default, &contract)?;
                    property
                        .set_value(obj, default)
                        .map_err(|e| reflect_error(e, reader.path()))?;
                }
                Ok(())
            }
            Presence::Null => match required {
                Required::Always => Err(JsonError::new(
                    JsonErrorKind::RequiredNull {
                        property: property.name.clone(),
                    },
                    reader.path(),
                )),
                Required::DisallowNull => Err(JsonError::new(
                    JsonErrorKind::DisallowedNull {
                        property: property.name.clone(),
                    },
                    reader.path(),
                )),
                Required::Default | Required::AllowNull => Ok(()),
            },
            Presence::Value => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Dynamic objects

    /// Reads declared writable members as properties and everything else as
    /// dynamic members.
    fn populate_dynamic(
        &mut self,
        reader: &mut dyn JsonRead,
        obj: &Obj,
        contract: &Contract,
        properties: &PropertyCollection,
        id: Option<&str>,
    ) -> Result<(), JsonError> {
        self.add_reference(reader, id, obj)?;
        self.on_deserializing(reader, contract, obj)?;

        let depth = member_depth(reader);
        loop {
            match reader.token().clone() {
                JsonToken::PropertyName(name) => {
                    let result = self.read_dynamic_member(reader, obj, properties, &name);
                    if let Err(error) = result {
                        self.recover(reader, Some((obj, contract)), Value::String(name), depth, error)?;
                    }
                }
                JsonToken::EndObject => break,
                JsonToken::Comment(_) => {}
                other => return Err(unexpected(reader, "deserializing a dynamic object", &other)),
            }
            self.read_or_end(reader, "deserializing a dynamic object")?;
        }

        self.on_deserialized(reader, contract, obj)
    }

    fn read_dynamic_member(
        &mut self,
        reader: &mut dyn JsonRead,
        obj: &Obj,
        properties: &PropertyCollection,
        name: &str,
    ) -> Result<(), JsonError> {
        if self.skip_metadata_property(reader, name)? {
            return Ok(());
        }
        self.read_value_start(reader, "deserializing a dynamic member")?;
        if let Some(property) = properties.get_closest_match(name)
            && property.writable
            && !property.ignored
        {
            if !self.set_property_value(reader, obj, None, property, Scope::default())? {
                reader.skip()?;
            }
            return Ok(());
        }
        let contract = self.state.contract(&Type::Any, || reader.path())?;
        let value = self.read_value(reader, &Type::Any, &contract, Scope::default(), None)?;
        obj.set_dynamic(name, value)
            .map_err(|e| reflect_error(e, reader.path()))
    }

    // -------------------------------------------------------------------------
    // Self-serializing objects

    fn create_native(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Contract,
        native: &NativeSerializable,
        id: Option<&str>,
    ) -> Result<Obj, JsonError> {
        let Some(created) = contract.created_type.as_def() else {
            return Err(not_creatable(reader, contract));
        };
        let any = self.state.contract(&Type::Any, || reader.path())?;

        let mut data = Vec::new();
        loop {
            match reader.token().clone() {
                JsonToken::PropertyName(name) => {
                    if !self.skip_metadata_property(reader, &name)? {
                        self.read_value_start(reader, "deserializing a self-serializing object")?;
                        let value = self.read_value(reader, &Type::Any, &any, Scope::default(), None)?;
                        data.push((name, value));
                    }
                }
                JsonToken::EndObject => break,
                JsonToken::Comment(_) => {}
                other => return Err(unexpected(reader, "deserializing a self-serializing object", &other)),
            }
            self.read_or_end(reader, "deserializing a self-serializing object")?;
        }

        let obj = (native.construct)(created, data, &self.state.settings.context)
            .map_err(|e| JsonError::user(e, reader.path()))?;
        self.add_reference(reader, id, &obj)?;
        self.on_deserializing(reader, contract, &obj)?;
        self.on_deserialized(reader, contract, &obj)?;
        Ok(obj)
    }
}

// -----------------------------------------------------------------------------
// Helpers

/// The depth of the members of the object whose first member or closing
/// token is current.
pub(super) fn member_depth(reader: &dyn JsonRead) -> usize {
    match reader.token() {
        JsonToken::EndObject => reader.depth() + 1,
        _ => reader.depth(),
    }
}

/// Returns `true` for contracts whose instances are never populated in
/// place.
fn is_read_only_or_fixed_size(contract: &Contract) -> bool {
    match &contract.details {
        ContractDetails::Array(details) => {
            details.uses_surrogate() || matches!(details.storage, ArrayStorage::Unsupported)
        }
        ContractDetails::Dictionary(details) => details.read_only,
        _ => false,
    }
}

fn is_value_type(contract: &Contract) -> bool {
    match &contract.underlying_type {
        Type::Primitive(p) => p.is_value_type(),
        Type::Nullable(_) => true,
        Type::Def(handle) => handle.def().kind() == TypeKind::Struct,
        Type::Any | Type::Token => false,
    }
}

fn not_creatable(reader: &dyn JsonRead, contract: &Contract) -> JsonError {
    let instantiable = contract
        .created_type
        .as_def()
        .is_some_and(|created| created.def().is_instantiable());
    let kind = if instantiable {
        JsonErrorKind::NoConstructor(contract.type_name())
    } else {
        JsonErrorKind::NotInstantiable(contract.type_name())
    };
    JsonError::new(kind, reader.path())
}
