//! State shared by the writer and reader engines during one call.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt::{self, Write};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use cj_reflect::{ErrorContext, Obj, ReflectError, Type, Value};

use crate::contract::{ContainerInfo, Contract, ObjectDetails, Property};
use crate::converter::JsonConverter;
use crate::references::{DefaultReferenceResolver, ReferenceResolver};
use crate::resolver::ContractResolver;
use crate::settings::{ReferenceLoopHandling, SerializerSettings, TypeNameHandling};
use crate::token::format_date;
use crate::{JsonError, JsonErrorKind};

// -----------------------------------------------------------------------------
// Metadata properties

pub(crate) const ID: &str = "$id";
pub(crate) const REF: &str = "$ref";
pub(crate) const TYPE: &str = "$type";
pub(crate) const VALUES: &str = "$values";
pub(crate) const VALUE: &str = "$value";

// -----------------------------------------------------------------------------
// Scope

/// Where a value sits: the member holding it and the object declaring that
/// member, and for container items the container settings and the member
/// holding the container.
#[derive(Clone, Copy, Default)]
pub(crate) struct Scope<'c> {
    pub member: Option<&'c Property>,
    pub owner: Option<&'c ObjectDetails>,
    pub container: Option<&'c ContainerInfo>,
    pub container_member: Option<&'c Property>,
}

impl<'c> Scope<'c> {
    #[inline]
    pub fn member(member: &'c Property, owner: Option<&'c ObjectDetails>) -> Self {
        Self {
            member: Some(member),
            owner,
            ..Self::default()
        }
    }

    /// The scope of an item of `container`, which is held by `holder`.
    #[inline]
    pub fn item(container: &'c ContainerInfo, holder: Option<&'c Property>) -> Self {
        Self {
            container: Some(container),
            container_member: holder,
            ..Self::default()
        }
    }

    pub fn is_reference(&self, contract: &Contract) -> Option<bool> {
        self.member
            .and_then(|m| m.is_reference)
            .or_else(|| self.container_member.and_then(|m| m.item_is_reference))
            .or_else(|| self.container.and_then(|c| c.item_is_reference))
            .or(contract.is_reference)
    }

    pub fn reference_loop_handling(&self, fallback: ReferenceLoopHandling) -> ReferenceLoopHandling {
        self.member
            .and_then(|m| m.reference_loop_handling)
            .or_else(|| self.container_member.and_then(|m| m.item_reference_loop_handling))
            .or_else(|| self.container.and_then(|c| c.item_reference_loop_handling))
            .unwrap_or(fallback)
    }

    pub fn type_name_handling(&self, fallback: TypeNameHandling) -> TypeNameHandling {
        self.member
            .and_then(|m| m.type_name_handling)
            .or_else(|| self.container_member.and_then(|m| m.item_type_name_handling))
            .or_else(|| self.container.and_then(|c| c.item_type_name_handling))
            .unwrap_or(fallback)
    }

    /// The converter declared by the member or container, if any.
    fn declared_converter(&self) -> Option<&'c Arc<dyn JsonConverter>> {
        self.member
            .and_then(|m| m.converter.as_ref())
            .or_else(|| self.container_member.and_then(|m| m.item_converter.as_ref()))
            .or_else(|| self.container.and_then(|c| c.item_converter.as_ref()))
    }
}

// -----------------------------------------------------------------------------
// InternalState

pub(crate) struct InternalState<'a> {
    pub settings: &'a SerializerSettings,
    pub resolver: &'a ContractResolver,
    references: Option<Box<dyn ReferenceResolver>>,
    /// The error being reported, kept while it propagates through the
    /// containers that enclose the failing element.
    current_error: Option<(JsonError, ErrorContext)>,
}

impl<'a> InternalState<'a> {
    pub fn new(settings: &'a SerializerSettings, resolver: &'a ContractResolver) -> Self {
        Self {
            settings,
            resolver,
            references: None,
            current_error: None,
        }
    }

    pub fn contract(&self, ty: &Type, path: impl FnOnce() -> String) -> Result<Arc<Contract>, JsonError> {
        self.resolver
            .resolve(ty)
            .map_err(|e| JsonError::new(e, path()))
    }

    /// The contract of the runtime type of `value`.
    #[inline]
    pub fn value_contract(
        &self,
        value: &Value,
        path: impl FnOnce() -> String,
    ) -> Result<Arc<Contract>, JsonError> {
        self.contract(&value.runtime_type(), path)
    }

    /// The converter for a value: member, then container, then the type, then
    /// the settings, then the built-in one of the contract.
    pub fn converter(&self, contract: &Contract, scope: Scope<'_>) -> Option<Arc<dyn JsonConverter>> {
        if let Some(converter) = scope.declared_converter() {
            return Some(converter.clone());
        }
        contract
            .converter
            .clone()
            .or_else(|| {
                self.settings
                    .converters
                    .iter()
                    .find(|c| c.can_convert(&contract.underlying_type))
                    .cloned()
            })
            .or_else(|| contract.internal_converter.clone())
    }

    pub fn references(&mut self) -> &mut dyn ReferenceResolver {
        let settings = self.settings;
        &mut **self.references.get_or_insert_with(|| match &settings.reference_resolver {
            Some(provider) => provider(),
            None => Box::new(DefaultReferenceResolver::new()),
        })
    }

    // -------------------------------------------------------------------------
    // Guards

    #[inline]
    pub fn check_cancelled(&self, path: impl FnOnce() -> String) -> Result<(), JsonError> {
        match &self.settings.cancellation {
            Some(token) if token.is_cancelled() => {
                Err(JsonError::new(JsonErrorKind::Cancelled, path()))
            }
            _ => Ok(()),
        }
    }

    /// Checks cancellation and the depth limit before a container at `depth`
    /// is opened.
    pub fn enter_container(
        &self,
        depth: usize,
        path: impl Fn() -> String,
    ) -> Result<(), JsonError> {
        self.check_cancelled(&path)?;
        match self.settings.max_depth {
            Some(max) if depth + 1 > max => Err(JsonError::new(JsonErrorKind::MaxDepth(max), path())),
            _ => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Errors

    /// Reports `error` to the `OnError` callbacks of the current object and
    /// then to the error handler of the settings.
    ///
    /// Returns `true` if either marked the error as handled.
    pub fn is_error_handled(
        &mut self,
        current: Option<&Obj>,
        contract: Option<&Contract>,
        member: Option<Value>,
        path: String,
        error: &JsonError,
    ) -> Result<bool, JsonError> {
        if error.is_cancelled() {
            return Ok(false);
        }
        let settings = self.settings;

        let reuse = matches!(&self.current_error, Some((existing, _)) if existing.is_same(error));
        if !reuse {
            let context = ErrorContext::new(
                current.map(|o| Value::Object(o.clone())),
                member,
                path.clone(),
                Arc::new(error.clone()),
            );
            self.current_error = Some((error.clone(), context));
        }
        let Some((_, context)) = self.current_error.as_mut() else {
            return Ok(false);
        };
        if !context.traced {
            context.traced = true;
            log::trace!("error at '{}': {}", context.path, error);
        }

        if let (Some(contract), Some(obj)) = (contract, current) {
            contract
                .invoke_on_error(obj, &settings.context, context)
                .map_err(|e| JsonError::user(e, path.clone()))?;
        }
        if !context.handled
            && let Some(handler) = &settings.error_handler
        {
            let current = current.map(|o| Value::Object(o.clone()));
            handler(current.as_ref(), context);
        }

        if context.handled {
            log::warn!("skipping '{}' after handled error: {}", context.path, error);
        }
        Ok(context.handled)
    }

    #[inline]
    pub fn clear_error_context(&mut self) {
        self.current_error = None;
    }
}

// -----------------------------------------------------------------------------
// Helpers

/// Equality used to compare values with member defaults; integers and
/// floats compare by numeric value.
pub(crate) fn value_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
            *i as f64 == *f
        }
        _ => a == b,
    }
}

/// Formats a date with a `chrono` format string, or as RFC 3339 without one.
pub(crate) fn format_date_with(value: &DateTime<Utc>, format: Option<&str>) -> Result<String, fmt::Error> {
    let Some(format) = format else {
        return Ok(format_date(value));
    };
    let mut text = String::new();
    write!(text, "{}", value.format(format))?;
    Ok(text)
}

/// Parses a date with the configured formats, then as RFC 3339.
///
/// Formats without an offset are read as UTC; formats without a time as
/// midnight.
pub(crate) fn parse_date(text: &str, settings: &SerializerSettings) -> Option<DateTime<Utc>> {
    let formats = settings
        .date_format
        .iter()
        .chain(settings.date_parse_formats.iter());
    for format in formats {
        if let Ok(date) = DateTime::parse_from_str(text, format) {
            return Some(date.with_timezone(&Utc));
        }
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Some(date.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, format)
            && let Some(date) = date.and_hms_opt(0, 0, 0)
        {
            return Some(date.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Wraps an error of the object model at `path`.
#[inline]
pub(crate) fn reflect_error(error: ReflectError, path: impl Into<String>) -> JsonError {
    JsonError::new(error, path)
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use cj_reflect::Value;

    use super::{format_date_with, parse_date, value_equals};
    use crate::SerializerSettings;

    #[test]
    fn numbers_compare_by_value() {
        assert!(value_equals(&Value::Integer(0), &Value::Float(0.0)));
        assert!(value_equals(&Value::from(""), &Value::from("")));
        assert!(!value_equals(&Value::Integer(1), &Value::Null));
    }

    #[test]
    fn dates_parse_with_configured_formats() {
        let settings = SerializerSettings::default().with_date_parse_format("%d/%m/%Y");
        let expected = Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap();
        assert_eq!(parse_date("31/01/2020", &settings), Some(expected));
        assert_eq!(parse_date("2020-01-31T00:00:00Z", &settings), Some(expected));
        assert_eq!(parse_date("January", &settings), None);
    }

    #[test]
    fn dates_format_with_pattern() {
        let date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_date_with(&date, None).unwrap(), "2020-01-01T00:00:00Z");
        assert_eq!(format_date_with(&date, Some("%Y/%m/%d")).unwrap(), "2020/01/01");
    }
}
