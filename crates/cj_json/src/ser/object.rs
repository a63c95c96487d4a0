use cj_reflect::info::NativeSerializable;
use cj_reflect::{Obj, Value};

use super::{Frame, SerializerWriter};
use crate::contract::{Contract, ObjectDetails, Property, PropertyCollection};
use crate::internal::{Scope, reflect_error, value_equals};
use crate::settings::{NullValueHandling, Required};
use crate::token::JsonWrite;
use crate::{JsonError, JsonErrorKind};

impl SerializerWriter<'_> {
    pub(super) fn write_object(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        details: &ObjectDetails,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        log::trace!("started serializing '{}' at '{}'", contract.type_name(), writer.path());
        self.on_serializing(writer, contract, obj)?;
        self.stack.push(obj.clone());
        self.write_object_start(writer, obj, contract, scope)?;

        let frame = Frame {
            owner: obj,
            contract,
            depth: writer.depth(),
            stack_len: self.stack.len(),
        };
        for property in details.properties.iter() {
            let result = self.write_property(writer, obj, Some(details), property);
            self.recover(writer, &frame, Value::from(property.name.as_str()), result)?;
        }

        if let Some(getter) = details.extension_data.as_ref().and_then(|e| e.getter.as_ref()) {
            let entries = getter(obj).map_err(|e| JsonError::user(e, writer.path()))?;
            for (key, value) in entries {
                let name = self.state.resolver.naming().extension_data_name(&key);
                let result = self.write_entry(writer, &name, &value, Scope::default());
                self.recover(writer, &frame, Value::String(name), result)?;
            }
        }

        writer.write_end_object()?;
        self.stack.pop();
        self.on_serialized(writer, contract, obj)?;
        log::trace!("finished serializing '{}'", contract.type_name());
        Ok(())
    }

    /// Writes one member of `obj` unless it is skipped.
    fn write_property(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        owner: Option<&ObjectDetails>,
        property: &Property,
    ) -> Result<(), JsonError> {
        if property.ignored || !property.readable {
            return Ok(());
        }
        if let Some(should_serialize) = &property.should_serialize
            && !should_serialize(obj).map_err(|e| JsonError::user(e, writer.path()))?
        {
            return Ok(());
        }
        if let Some(is_specified) = &property.get_is_specified
            && !is_specified(obj).map_err(|e| JsonError::user(e, writer.path()))?
        {
            return Ok(());
        }

        let value = property
            .get_value(obj)
            .map_err(|e| reflect_error(e, writer.path()))?;
        if !self.should_write_property(&value, owner, property) {
            return Ok(());
        }

        let scope = Scope::member(property, owner);
        let contract = self.state.value_contract(&value, || writer.path())?;
        if let Some(target) = self.reference_target(&value, &contract, scope) {
            writer.write_property_name(&property.name)?;
            return self.write_reference(writer, target);
        }
        if !self.check_circular_reference(writer, &value, &contract, scope)? {
            return Ok(());
        }
        if value.is_null() {
            let required = property.required_or(owner.and_then(|o| o.item_required));
            if matches!(required, Required::Always | Required::DisallowNull) {
                return Err(JsonError::new(
                    JsonErrorKind::NullForRequired(property.name.clone()),
                    writer.path(),
                ));
            }
        }
        writer.write_property_name(&property.name)?;
        self.write_value(writer, &value, &contract, scope)
    }

    fn should_write_property(
        &self,
        value: &Value,
        owner: Option<&ObjectDetails>,
        property: &Property,
    ) -> bool {
        let settings = self.state.settings;
        let nulls = property
            .null_value_handling
            .or_else(|| owner.and_then(|o| o.item_null_value_handling))
            .unwrap_or(settings.null_value_handling);
        if nulls == NullValueHandling::Ignore && value.is_null() {
            return false;
        }
        let defaults = property
            .default_value_handling
            .unwrap_or(settings.default_value_handling);
        !(defaults.ignores() && value_equals(value, &property.resolved_default_value()))
    }

    /// Writes a name and value pair that belongs to no member.
    pub(super) fn write_entry(
        &mut self,
        writer: &mut dyn JsonWrite,
        name: &str,
        value: &Value,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        let contract = self.state.value_contract(value, || writer.path())?;
        if let Some(target) = self.reference_target(value, &contract, scope) {
            writer.write_property_name(name)?;
            return self.write_reference(writer, target);
        }
        if !self.check_circular_reference(writer, value, &contract, scope)? {
            return Ok(());
        }
        writer.write_property_name(name)?;
        self.write_value(writer, value, &contract, scope)
    }

    // -------------------------------------------------------------------------
    // Dynamic objects

    /// Writes the marked members of a dynamic object, then its dynamic ones.
    pub(super) fn write_dynamic(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        properties: &PropertyCollection,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        self.on_serializing(writer, contract, obj)?;
        self.stack.push(obj.clone());
        self.write_object_start(writer, obj, contract, scope)?;

        let frame = Frame {
            owner: obj,
            contract,
            depth: writer.depth(),
            stack_len: self.stack.len(),
        };
        for property in properties.iter().filter(|p| p.has_member_attribute) {
            let result = self.write_property(writer, obj, None, property);
            self.recover(writer, &frame, Value::from(property.name.as_str()), result)?;
        }

        let members = obj.bag().map_err(|e| reflect_error(e, writer.path()))?;
        let settings = self.state.settings;
        for (name, value) in members {
            if settings.null_value_handling == NullValueHandling::Ignore && value.is_null() {
                continue;
            }
            if settings.default_value_handling.ignores()
                && value_equals(&value, &value.runtime_type().default_value())
            {
                continue;
            }
            let resolved = self.state.resolver.naming().property_name(&name, false);
            let result = self.write_entry(writer, &resolved, &value, Scope::default());
            self.recover(writer, &frame, Value::String(name), result)?;
        }

        writer.write_end_object()?;
        self.stack.pop();
        self.on_serialized(writer, contract, obj)
    }

    // -------------------------------------------------------------------------
    // Self-serializing objects

    pub(super) fn write_native(
        &mut self,
        writer: &mut dyn JsonWrite,
        obj: &Obj,
        contract: &Contract,
        native: &NativeSerializable,
        scope: Scope<'_>,
    ) -> Result<(), JsonError> {
        self.on_serializing(writer, contract, obj)?;
        self.stack.push(obj.clone());
        self.write_object_start(writer, obj, contract, scope)?;

        let data = (native.get_data)(obj, &self.state.settings.context)
            .map_err(|e| JsonError::user(e, writer.path()))?;
        for (name, value) in data {
            self.write_entry(writer, &name, &value, Scope::default())?;
        }

        writer.write_end_object()?;
        self.stack.pop();
        self.on_serialized(writer, contract, obj)
    }
}

