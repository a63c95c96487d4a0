use alloc::string::String;
use alloc::vec::Vec;

use crate::info::{
    Capabilities, ConstructorDef, Convertible, CustomAttributes, DefaultConstructor,
    DictionaryCapability, EnumerableCapability, GridCapability, ListCapability, MemberDef,
    MethodDef, NativeSerializable, StringConversion,
};
use crate::{ReflectError, Type, TypeHandle, Value};

// -----------------------------------------------------------------------------
// TypeKind

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    /// A value type: always has a public default constructor and is never null.
    Struct,
    Interface,
    Abstract,
}

/// The generic definition and arguments of a constructed type,
/// e.g. `KeyValuePair` with `[String, Int64]`.
#[derive(Debug, Clone)]
pub struct GenericInfo {
    pub definition: String,
    pub args: Vec<Type>,
}

// -----------------------------------------------------------------------------
// TypeDef

/// The definition of a user type.
///
/// Members, constructors and methods are those declared at this level;
/// inherited ones are reached through [`TypeDef::base`].
pub struct TypeDef {
    kind: TypeKind,
    base: Option<TypeHandle>,
    interfaces: Vec<TypeHandle>,
    default_impl: Option<TypeHandle>,
    metadata_type: Option<TypeHandle>,
    generic: Option<GenericInfo>,
    members: Vec<MemberDef>,
    constructors: Vec<ConstructorDef>,
    methods: Vec<MethodDef>,
    attributes: CustomAttributes,
    capabilities: Capabilities,
    slot_defaults: Vec<Value>,
}

impl TypeDef {
    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    pub fn base(&self) -> Option<&TypeHandle> {
        self.base.as_ref()
    }

    /// Interfaces implemented at this level.
    #[inline]
    pub fn interfaces(&self) -> &[TypeHandle] {
        &self.interfaces
    }

    /// The concrete type created when this interface or abstract type is the
    /// deserialization target.
    #[inline]
    pub fn default_impl(&self) -> Option<&TypeHandle> {
        self.default_impl.as_ref()
    }

    /// A type whose same-named members carry additional metadata.
    #[inline]
    pub fn metadata_type(&self) -> Option<&TypeHandle> {
        self.metadata_type.as_ref()
    }

    #[inline]
    pub fn generic(&self) -> Option<&GenericInfo> {
        self.generic.as_ref()
    }

    #[inline]
    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    #[inline]
    pub fn constructors(&self) -> &[ConstructorDef] {
        &self.constructors
    }

    #[inline]
    pub fn methods(&self) -> &[MethodDef] {
        &self.methods
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_defaults.len()
    }

    /// Initial slot values of a new instance, base slots first.
    #[inline]
    pub fn slot_defaults(&self) -> Vec<Value> {
        self.slot_defaults.clone()
    }

    #[inline]
    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }

    #[inline]
    pub fn get_attribute<T: core::any::Any>(&self) -> Option<&T> {
        self.attributes.get::<T>()
    }

    #[inline]
    pub fn has_attribute<T: core::any::Any>(&self) -> bool {
        self.attributes.contains::<T>()
    }

    /// Returns `true` if the type can be instantiated.
    #[inline]
    pub fn is_instantiable(&self) -> bool {
        matches!(self.kind, TypeKind::Class | TypeKind::Struct)
    }

    /// The zero-argument constructor, if any.
    ///
    /// Classes without declared constructors get an implicit public one,
    /// structs always have one, interfaces and abstract types never do.
    pub fn default_constructor(&self) -> Option<DefaultConstructor<'_>> {
        match self.kind {
            TypeKind::Interface | TypeKind::Abstract => None,
            TypeKind::Struct => Some(DefaultConstructor::Implicit),
            TypeKind::Class if self.constructors.is_empty() => Some(DefaultConstructor::Implicit),
            TypeKind::Class => self
                .constructors
                .iter()
                .find(|c| c.params().is_empty())
                .map(DefaultConstructor::Declared),
        }
    }
}

impl core::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeDef")
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("members", &self.members)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Chain lookups

impl TypeHandle {
    /// Finds an instance member by exact name, most-derived declaration first.
    pub fn find_member(&self, name: &str) -> Option<&MemberDef> {
        self.chain().find_map(|level| {
            level
                .def()
                .members()
                .iter()
                .find(|m| !m.is_static() && m.name() == name)
        })
    }

    /// Finds a method by exact name, most-derived declaration first.
    pub fn find_method(&self, name: &str) -> Option<&MethodDef> {
        self.chain()
            .find_map(|level| level.def().methods().iter().find(|m| m.name() == name))
    }

    /// The levels of the inheritance chain, least-derived first.
    pub fn levels(&self) -> Vec<&TypeHandle> {
        let mut levels: Vec<&TypeHandle> = self.chain().collect();
        levels.reverse();
        levels
    }
}

// -----------------------------------------------------------------------------
// TypeDefBuilder

/// Builds a [`TypeDef`].
///
/// ```
/// use cj_reflect::Type;
/// use cj_reflect::info::{MemberDef, TypeDefBuilder, TypeKind};
///
/// let animal = TypeDefBuilder::abstract_class("Zoo.Animal")
///     .member(MemberDef::property("Name", Type::STRING))
///     .build();
/// let dog = TypeDefBuilder::class("Zoo.Dog")
///     .base(&animal)
///     .member(MemberDef::property("Tricks", Type::INTEGER))
///     .build();
///
/// assert_eq!(dog.def().kind(), TypeKind::Class);
/// assert_eq!(dog.def().slot_count(), 2);
/// assert!(dog.find_member("Name").is_some());
/// ```
pub struct TypeDefBuilder {
    name: String,
    def: TypeDef,
}

impl TypeDefBuilder {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            def: TypeDef {
                kind,
                base: None,
                interfaces: Vec::new(),
                default_impl: None,
                metadata_type: None,
                generic: None,
                members: Vec::new(),
                constructors: Vec::new(),
                methods: Vec::new(),
                attributes: CustomAttributes::new(),
                capabilities: Capabilities::default(),
                slot_defaults: Vec::new(),
            },
        }
    }

    #[inline]
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    #[inline]
    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Struct)
    }

    #[inline]
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    #[inline]
    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Abstract)
    }

    /// Sets the base type. The base must be defined before this type.
    pub fn base(mut self, base: &TypeHandle) -> Self {
        self.def.base = Some(base.clone());
        self
    }

    pub fn implements(mut self, interface: &TypeHandle) -> Self {
        self.def.interfaces.push(interface.clone());
        self
    }

    pub fn default_impl(mut self, concrete: &TypeHandle) -> Self {
        self.def.default_impl = Some(concrete.clone());
        self
    }

    pub fn metadata_type(mut self, metadata: &TypeHandle) -> Self {
        self.def.metadata_type = Some(metadata.clone());
        self
    }

    pub fn generic(mut self, definition: impl Into<String>, args: Vec<Type>) -> Self {
        self.def.generic = Some(GenericInfo {
            definition: definition.into(),
            args,
        });
        self
    }

    pub fn member(mut self, member: MemberDef) -> Self {
        self.def.members.push(member);
        self
    }

    pub fn constructor(mut self, ctor: ConstructorDef) -> Self {
        self.def.constructors.push(ctor);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.def.methods.push(method);
        self
    }

    /// Adds a type-level attribute.
    pub fn with_attribute<T: core::any::Any + Send + Sync>(mut self, value: T) -> Self {
        self.def.attributes.insert(value);
        self
    }

    pub fn dictionary(mut self, key: Type, value: Type) -> Self {
        self.def.capabilities.dictionary = Some(DictionaryCapability {
            key,
            value,
            read_only: false,
        });
        self
    }

    pub fn list(mut self, item: Type) -> Self {
        self.def.capabilities.list = Some(ListCapability {
            item,
            fixed_size: false,
            read_only: false,
        });
        self
    }

    pub fn list_capability(mut self, capability: ListCapability) -> Self {
        self.def.capabilities.list = Some(capability);
        self
    }

    pub fn dictionary_capability(mut self, capability: DictionaryCapability) -> Self {
        self.def.capabilities.dictionary = Some(capability);
        self
    }

    pub fn enumerable(mut self, capability: EnumerableCapability) -> Self {
        self.def.capabilities.enumerable = Some(capability);
        self
    }

    pub fn grid(mut self, item: Type, rank: usize) -> Self {
        self.def.capabilities.grid = Some(GridCapability { item, rank });
        self
    }

    pub fn string_conversion(mut self, conversion: StringConversion) -> Self {
        self.def.capabilities.string_conversion = Some(conversion);
        self
    }

    pub fn native_serializable(mut self, native: NativeSerializable) -> Self {
        self.def.capabilities.native_serializable = Some(native);
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.def.capabilities.dynamic = true;
        self
    }

    pub fn convertible(mut self, convertible: Convertible) -> Self {
        self.def.capabilities.convertible = Some(convertible);
        self
    }

    /// Lays out slots and inherits capabilities from the base type.
    pub(crate) fn into_def(mut self) -> TypeDef {
        let def = &mut self.def;
        if let Some(base) = &def.base {
            let base_def = base.def();
            def.slot_defaults = base_def.slot_defaults();
            def.capabilities.inherit(base_def.capabilities());
        }
        let mut next_slot = def.slot_defaults.len();
        for member in &mut def.members {
            if let Some(initial) = member.bind(&mut next_slot) {
                def.slot_defaults.push(initial);
            }
        }
        self.def
    }

    /// Supplies the definition of a declared handle.
    pub fn define(self, handle: &TypeHandle) -> Result<TypeHandle, ReflectError> {
        handle.set_def(self.into_def())?;
        log::trace!("defined type '{}'", handle.name());
        Ok(handle.clone())
    }

    /// Declares and defines a new type.
    pub fn build(self) -> TypeHandle {
        let handle = TypeHandle::declare(self.name.clone());
        // A fresh handle is never defined yet.
        let _ = handle.set_def(self.into_def());
        handle
    }
}
