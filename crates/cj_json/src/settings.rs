//! Serializer-wide options.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use cj_reflect::{ErrorContext, StreamingContext, Value};

use crate::binder::SerializationBinder;
use crate::converter::JsonConverter;
use crate::references::ReferenceResolver;
use crate::resolver::ContractResolver;

// -----------------------------------------------------------------------------
// Handling options

/// Whether `null` member values are written and assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullValueHandling {
    #[default]
    Include,
    Ignore,
}

/// How member values equal to their default are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefaultValueHandling {
    #[default]
    Include,
    /// Skip values equal to the default, both when writing and reading.
    Ignore,
    /// Assign the default to members missing from the document.
    Populate,
    IgnoreAndPopulate,
}

impl DefaultValueHandling {
    #[inline]
    pub const fn ignores(self) -> bool {
        matches!(self, Self::Ignore | Self::IgnoreAndPopulate)
    }

    #[inline]
    pub const fn populates(self) -> bool {
        matches!(self, Self::Populate | Self::IgnoreAndPopulate)
    }
}

/// What to do when an object is reached again while it is being written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceLoopHandling {
    #[default]
    Error,
    Ignore,
    Serialize,
}

/// Which values are written with `$id` and referenced with `$ref`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreserveReferencesHandling {
    #[default]
    None,
    Objects,
    Arrays,
    All,
}

impl PreserveReferencesHandling {
    #[inline]
    pub const fn objects(self) -> bool {
        matches!(self, Self::Objects | Self::All)
    }

    #[inline]
    pub const fn arrays(self) -> bool {
        matches!(self, Self::Arrays | Self::All)
    }
}

/// When `$type` is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeNameHandling {
    #[default]
    None,
    Objects,
    Arrays,
    All,
    /// Only when the runtime type differs from the declared type.
    Auto,
}

impl TypeNameHandling {
    #[inline]
    pub const fn objects(self) -> bool {
        matches!(self, Self::Objects | Self::All)
    }

    #[inline]
    pub const fn arrays(self) -> bool {
        matches!(self, Self::Arrays | Self::All)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingMemberHandling {
    #[default]
    Ignore,
    Error,
}

/// How `$`-prefixed metadata properties are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetadataPropertyHandling {
    /// Metadata must lead the object.
    #[default]
    Default,
    /// Metadata may appear anywhere in the object; the object is buffered.
    ReadAhead,
    /// Metadata is read as ordinary properties.
    Ignore,
}

/// Whether existing member values are populated or replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectCreationHandling {
    #[default]
    Auto,
    Reuse,
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConstructorHandling {
    /// Prefer a public default constructor, then a single parameterized one.
    #[default]
    Default,
    AllowNonPublicDefaultConstructor,
}

/// Whether a property must be present in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Required {
    #[default]
    Default,
    /// Must be present, may be `null`.
    AllowNull,
    /// Must be present and not `null`.
    Always,
    /// May be missing, must not be `null`.
    DisallowNull,
}

/// Which members of a type are serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemberSerialization {
    /// Public members unless ignored.
    #[default]
    OptOut,
    /// Only members marked for serialization.
    OptIn,
    /// Every instance field, public or not.
    Fields,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Formatting {
    #[default]
    None,
    Indented,
}

// -----------------------------------------------------------------------------
// CancellationToken

/// A cooperative cancellation flag, checked before each token is read and
/// before nested containers are entered.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// -----------------------------------------------------------------------------
// SerializerSettings

/// Called for every error raised while a member, item or entry is processed;
/// set [`ErrorContext::handled`] to skip the element and continue.
pub type ErrorHandler = Arc<dyn Fn(Option<&Value>, &mut ErrorContext) + Send + Sync>;

/// Creates the reference resolver of one call.
pub type ReferenceResolverProvider = Arc<dyn Fn() -> Box<dyn ReferenceResolver> + Send + Sync>;

/// Options of a [`JsonSerializer`](crate::JsonSerializer).
///
/// ```
/// use cj_json::settings::{NullValueHandling, SerializerSettings};
///
/// let settings = SerializerSettings::default()
///     .with_null_value_handling(NullValueHandling::Ignore)
///     .with_max_depth(Some(16));
/// assert_eq!(settings.max_depth, Some(16));
/// ```
#[derive(Clone)]
pub struct SerializerSettings {
    pub null_value_handling: NullValueHandling,
    pub default_value_handling: DefaultValueHandling,
    pub reference_loop_handling: ReferenceLoopHandling,
    pub preserve_references_handling: PreserveReferencesHandling,
    pub type_name_handling: TypeNameHandling,
    pub missing_member_handling: MissingMemberHandling,
    pub metadata_property_handling: MetadataPropertyHandling,
    pub object_creation_handling: ObjectCreationHandling,
    pub constructor_handling: ConstructorHandling,
    pub converters: Vec<Arc<dyn JsonConverter>>,
    pub error_handler: Option<ErrorHandler>,
    pub reference_resolver: Option<ReferenceResolverProvider>,
    pub binder: Option<Arc<dyn SerializationBinder>>,
    /// A `chrono` format string for dates; RFC 3339 with `Z` when unset.
    pub date_format: Option<String>,
    /// Additional `chrono` formats tried when a string is read as a date.
    pub date_parse_formats: Vec<String>,
    pub context: StreamingContext,
    /// Maximum nesting of containers; `None` disables the guard.
    pub max_depth: Option<usize>,
    /// Fail if content follows the deserialized value.
    pub check_additional_content: bool,
    pub cancellation: Option<CancellationToken>,
    pub formatting: Formatting,
    /// The resolver; the shared default resolver when unset.
    pub contract_resolver: Option<Arc<ContractResolver>>,
}

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            null_value_handling: NullValueHandling::default(),
            default_value_handling: DefaultValueHandling::default(),
            reference_loop_handling: ReferenceLoopHandling::default(),
            preserve_references_handling: PreserveReferencesHandling::default(),
            type_name_handling: TypeNameHandling::default(),
            missing_member_handling: MissingMemberHandling::default(),
            metadata_property_handling: MetadataPropertyHandling::default(),
            object_creation_handling: ObjectCreationHandling::default(),
            constructor_handling: ConstructorHandling::default(),
            converters: Vec::new(),
            error_handler: None,
            reference_resolver: None,
            binder: None,
            date_format: None,
            date_parse_formats: Vec::new(),
            context: StreamingContext::default(),
            max_depth: Some(64),
            check_additional_content: false,
            cancellation: None,
            formatting: Formatting::default(),
            contract_resolver: None,
        }
    }
}

macro_rules! with_setting {
    ($($fn_name:ident => $field:ident: $ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $fn_name(mut self, value: $ty) -> Self {
                self.$field = value;
                self
            }
        )*
    };
}

impl SerializerSettings {
    with_setting! {
        with_null_value_handling => null_value_handling: NullValueHandling,
        with_default_value_handling => default_value_handling: DefaultValueHandling,
        with_reference_loop_handling => reference_loop_handling: ReferenceLoopHandling,
        with_preserve_references_handling => preserve_references_handling: PreserveReferencesHandling,
        with_type_name_handling => type_name_handling: TypeNameHandling,
        with_missing_member_handling => missing_member_handling: MissingMemberHandling,
        with_metadata_property_handling => metadata_property_handling: MetadataPropertyHandling,
        with_object_creation_handling => object_creation_handling: ObjectCreationHandling,
        with_constructor_handling => constructor_handling: ConstructorHandling,
        with_context => context: StreamingContext,
        with_max_depth => max_depth: Option<usize>,
        with_check_additional_content => check_additional_content: bool,
        with_formatting => formatting: Formatting,
    }

    pub fn with_converter(mut self, converter: impl JsonConverter + 'static) -> Self {
        self.converters.push(Arc::new(converter));
        self
    }

    pub fn with_error_handler(
        mut self,
        handler: impl Fn(Option<&Value>, &mut ErrorContext) + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_reference_resolver(
        mut self,
        provider: impl Fn() -> Box<dyn ReferenceResolver> + Send + Sync + 'static,
    ) -> Self {
        self.reference_resolver = Some(Arc::new(provider));
        self
    }

    pub fn with_binder(mut self, binder: impl SerializationBinder + 'static) -> Self {
        self.binder = Some(Arc::new(binder));
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn with_date_parse_format(mut self, format: impl Into<String>) -> Self {
        self.date_parse_formats.push(format.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_contract_resolver(mut self, resolver: Arc<ContractResolver>) -> Self {
        self.contract_resolver = Some(resolver);
        self
    }
}

impl fmt::Debug for SerializerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerSettings")
            .field("null_value_handling", &self.null_value_handling)
            .field("default_value_handling", &self.default_value_handling)
            .field("reference_loop_handling", &self.reference_loop_handling)
            .field("preserve_references_handling", &self.preserve_references_handling)
            .field("type_name_handling", &self.type_name_handling)
            .field("missing_member_handling", &self.missing_member_handling)
            .field("metadata_property_handling", &self.metadata_property_handling)
            .field("object_creation_handling", &self.object_creation_handling)
            .field("constructor_handling", &self.constructor_handling)
            .field("converters", &self.converters.len())
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{CancellationToken, DefaultValueHandling, SerializerSettings};

    #[test]
    fn default_value_flags() {
        assert!(DefaultValueHandling::IgnoreAndPopulate.ignores());
        assert!(DefaultValueHandling::IgnoreAndPopulate.populates());
        assert!(!DefaultValueHandling::Populate.ignores());
        assert!(!DefaultValueHandling::Include.populates());
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let settings = SerializerSettings::default().with_cancellation(token.clone());
        token.cancel();
        assert!(settings.cancellation.unwrap().is_cancelled());
    }
}
