use alloc::string::String;
use alloc::vec::Vec;

use cj_reflect::info::ConstructorFn;
use cj_reflect::{Obj, Value};

use super::object::{Presence, member_depth};
use super::{SerializerReader, is_empty_string_null, unexpected};
use crate::contract::{Contract, ContractDetails, ObjectDetails, Property};
use crate::internal::{Scope, reflect_error};
use crate::settings::MissingMemberHandling;
use crate::token::{JsonRead, JsonToken};
use crate::{JsonError, JsonErrorKind};

/// A property read before the object it belongs to exists.
struct CreatorValue<'c> {
    name: String,
    /// The constructor parameter of the same name.
    parameter: Option<&'c Property>,
    property: Option<&'c Property>,
    value: Value,
    presence: Option<Presence>,
    used: bool,
}

impl SerializerReader<'_> {
    /// Reads all properties of the current object, then creates it by
    /// passing the matching ones to `creator` and assigns the rest.
    ///
    /// Entered on the first property or the closing token.
    pub(super) fn create_with_parameters(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Contract,
        details: &ObjectDetails,
        creator: &ConstructorFn,
        scope: Scope<'_>,
        id: Option<&str>,
    ) -> Result<Obj, JsonError> {
        log::trace!(
            "deserializing '{}' with a parameterized constructor at '{}'",
            contract.type_name(),
            reader.path()
        );
        let Some(created) = contract.created_type.as_def() else {
            return Err(JsonError::new(
                JsonErrorKind::NoConstructor(contract.type_name()),
                reader.path(),
            ));
        };

        let mut values = self.read_creator_values(reader, contract, details, scope)?;
        let populates_defaults = self.state.settings.default_value_handling.populates();
        let tracks_presence = details.tracks_presence(populates_defaults);
        if tracks_presence {
            for property in details.properties.iter() {
                let met = values
                    .iter()
                    .any(|v| v.property.is_some_and(|p| core::ptr::eq(p, property)));
                if !met && !property.ignored {
                    values.push(CreatorValue {
                        name: property.name.clone(),
                        parameter: None,
                        property: Some(property),
                        value: Value::Null,
                        presence: Some(Presence::Missing),
                        used: false,
                    });
                }
            }
        }

        let mut args: Vec<Option<Value>> = Vec::new();
        args.resize(details.creator_parameters.len(), None);
        for entry in &mut values {
            if entry.presence.is_none() {
                entry.presence = Some(self.presence_of(reader, entry)?);
            }

            let parameter = entry.parameter.or_else(|| {
                entry
                    .property
                    .and_then(|p| details.creator_parameters.get_closest_match(&p.underlying_name))
            });
            let Some(parameter) = parameter else {
                continue;
            };
            if parameter.ignored {
                continue;
            }
            let Some(index) = details.creator_parameters.index_of(parameter) else {
                continue;
            };

            let populates = parameter
                .default_value_handling
                .unwrap_or(self.state.settings.default_value_handling)
                .populates();
            let mut value = entry.value.clone();
            if populates && matches!(entry.presence, Some(Presence::Missing | Presence::Null)) {
                let contract = parameter
                    .property_contract(self.state.resolver)
                    .map_err(|e| JsonError::new(e, reader.path()))?;
                value = self.ensure_type(reader, parameter.resolved_default_value(), &contract)?;
            }
            if let Some(slot) = args.get_mut(index) {
                *slot = Some(value);
            }
            entry.used = true;
        }

        let args = args
            .into_iter()
            .zip(details.creator_parameters.iter())
            .map(|(arg, parameter)| arg.unwrap_or_else(|| parameter.property_type.default_value()))
            .collect();
        let obj = creator(created, args).map_err(|e| JsonError::user(e, reader.path()))?;

        self.add_reference(reader, id, &obj)?;
        self.on_deserializing(reader, contract, &obj)?;

        for entry in &mut values {
            if entry.used || entry.presence == Some(Presence::Missing) {
                continue;
            }
            let Some(property) = entry.property else {
                continue;
            };
            if property.ignored {
                continue;
            }
            if self.should_set_property_value(Some(details), property, &entry.value) {
                property
                    .set_value(&obj, entry.value.clone())
                    .map_err(|e| reflect_error(e, reader.path()))?;
                entry.used = true;
            } else if !property.writable && !entry.value.is_null() {
                self.merge_read_only(reader, &obj, property, &entry.value)?;
                entry.used = true;
            }
        }

        if let Some(setter) = details.extension_data.as_ref().and_then(|d| d.setter.as_ref()) {
            for entry in &mut values {
                if !entry.used && entry.presence != Some(Presence::Missing) {
                    setter(&obj, &entry.name, entry.value.clone())
                        .map_err(|e| JsonError::user(e, reader.path()))?;
                    entry.used = true;
                }
            }
        }

        if tracks_presence {
            let depth = member_depth(reader);
            for entry in &values {
                let (Some(property), Some(presence)) = (entry.property, entry.presence) else {
                    continue;
                };
                let result = self.end_process_property(reader, &obj, details, property, presence, !entry.used);
                if let Err(error) = result {
                    let member = Value::from(property.name.as_str());
                    self.recover(reader, Some((&obj, contract)), member, depth, error)?;
                }
            }
        }

        self.on_deserialized(reader, contract, &obj)?;
        Ok(obj)
    }

    /// Reads the members of the current object up to its closing token.
    fn read_creator_values<'c>(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Contract,
        details: &'c ObjectDetails,
        scope: Scope<'_>,
    ) -> Result<Vec<CreatorValue<'c>>, JsonError> {
        let mut values = Vec::new();
        let depth = member_depth(reader);
        loop {
            match reader.token().clone() {
                JsonToken::PropertyName(name) => {
                    if !self.skip_metadata_property(reader, &name)? {
                        let result = self.read_creator_value(reader, contract, details, scope, name.clone());
                        match result {
                            Ok(Some(value)) => values.push(value),
                            Ok(None) => {}
                            Err(error) => {
                                self.recover(reader, None, Value::String(name), depth, error)?;
                            }
                        }
                    }
                }
                JsonToken::EndObject => return Ok(values),
                JsonToken::Comment(_) => {}
                other => return Err(unexpected(reader, "deserializing an object", &other)),
            }
            self.read_or_end(reader, "deserializing an object")?;
        }
    }

    fn read_creator_value<'c>(
        &mut self,
        reader: &mut dyn JsonRead,
        contract: &Contract,
        details: &'c ObjectDetails,
        scope: Scope<'_>,
        name: String,
    ) -> Result<Option<CreatorValue<'c>>, JsonError> {
        let parameter = details.creator_parameters.get_closest_match(&name);
        let property = details.properties.get_closest_match(&name);
        self.read_value_start(reader, "deserializing an object")?;

        let Some(target) = parameter.or(property) else {
            let handling = details
                .missing_member_handling
                .unwrap_or(self.state.settings.missing_member_handling);
            if handling == MissingMemberHandling::Error {
                return Err(JsonError::new(
                    JsonErrorKind::MissingMember {
                        member: name,
                        type_name: contract.type_name(),
                    },
                    reader.path(),
                ));
            }
            let Some(extension) = &details.extension_data else {
                reader.skip()?;
                return Ok(None);
            };
            let value_contract = self.state.contract(&extension.value_type, || reader.path())?;
            let value = self.read_value(reader, &extension.value_type, &value_contract, Scope::default(), None)?;
            return Ok(Some(CreatorValue {
                name,
                parameter: None,
                property: None,
                value,
                presence: None,
                used: false,
            }));
        };

        if target.ignored {
            reader.skip()?;
            return Ok(None);
        }

        let target_contract = target
            .property_contract(self.state.resolver)
            .map_err(|e| JsonError::new(e, reader.path()))?;
        let member_scope = Scope {
            member: Some(target),
            owner: Some(details),
            container: scope.container,
            container_member: scope.container_member,
        };
        let value = self.read_value(reader, &target.property_type, &target_contract, member_scope, None)?;
        Ok(Some(CreatorValue {
            name,
            parameter,
            property,
            value,
            presence: None,
            used: false,
        }))
    }

    /// Whether a value read for a constructor counts as present.
    fn presence_of(&self, reader: &dyn JsonRead, entry: &CreatorValue<'_>) -> Result<Presence, JsonError> {
        if entry.value.is_null() {
            return Ok(Presence::Null);
        }
        let Some(target) = entry.parameter.or(entry.property) else {
            return Ok(Presence::Value);
        };
        let contract = target
            .property_contract(self.state.resolver)
            .map_err(|e| JsonError::new(e, reader.path()))?;
        if is_empty_string_null(&target.property_type, &contract, &entry.value) {
            return Ok(Presence::Null);
        }
        Ok(Presence::Value)
    }

    /// Copies a value read for a read-only collection member into the
    /// collection the new object already holds.
    fn merge_read_only(
        &self,
        reader: &dyn JsonRead,
        obj: &Obj,
        property: &Property,
        value: &Value,
    ) -> Result<(), JsonError> {
        if !property.readable {
            return Ok(());
        }
        let current = property.get_value(obj).map_err(|e| reflect_error(e, reader.path()))?;
        let (Some(target), Some(source)) = (current.as_obj(), value.as_obj()) else {
            return Ok(());
        };
        let contract = self.state.value_contract(&current, || reader.path())?;
        match &contract.details {
            ContractDetails::Array(details) if !details.uses_surrogate() => {
                let items = source.items().map_err(|e| reflect_error(e, reader.path()))?;
                for item in items {
                    target.push(item).map_err(|e| reflect_error(e, reader.path()))?;
                }
            }
            ContractDetails::Dictionary(details) if !details.read_only => {
                let entries = source.entries().map_err(|e| reflect_error(e, reader.path()))?;
                for (key, item) in entries {
                    target.upsert(key, item).map_err(|e| reflect_error(e, reader.path()))?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
