//! Builds and caches the [`Contract`] of each type.
//!
//! Resolution only inspects the type definition and the facts answered by the
//! [`MetadataProvider`]; the contracts of member, item and key types are
//! resolved lazily the first time they are needed, so recursive types resolve
//! without recursion.
//!
//! ```
//! use cj_json::contract::ContractKind;
//! use cj_json::resolver::ContractResolver;
//! use cj_reflect::Type;
//! use cj_reflect::builtins::list_of;
//!
//! let resolver = ContractResolver::new();
//! let contract = resolver.resolve(&Type::from(list_of(Type::INTEGER))).unwrap();
//! assert_eq!(contract.kind(), ContractKind::Array);
//! ```

// -----------------------------------------------------------------------------
// Modules

mod cache;
mod callbacks;
mod constructors;
mod extension;
mod members;

// -----------------------------------------------------------------------------
// Imports

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use std::sync::LazyLock;

use cj_reflect::builtins::{dictionary_of, list_of};
use cj_reflect::info::{DefaultConstructor, TypeKind};
use cj_reflect::{PrimitiveType, Type, TypeHandle};

use cache::ContractCache;

use crate::ContractError;
use crate::contract::{
    ArrayDetails, ArrayStorage, ContainerInfo, Contract, ContractDetails, Creator,
    DictionaryDetails, ObjectDetails, PrimitiveDetails, PropertyCollection,
};
use crate::converter::{JsonConverter, KeyValuePairConverter};
use crate::metadata::{AttributeMetadataProvider, MetadataProvider, TypeFacts};
use crate::naming::{DefaultNamingStrategy, NamingStrategy};
use crate::settings::MemberSerialization;

// -----------------------------------------------------------------------------
// Options

/// Which members are visible without an explicit marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberSearch {
    pub non_public: bool,
    pub statics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub default_members_search: MemberSearch,
    /// Treat natively serializable types as plain objects.
    pub ignore_serializable_interface: bool,
    /// Do not switch [`Serializable`](crate::attributes::Serializable) types
    /// to field serialization.
    pub ignore_serializable_attribute: bool,
    pub ignore_is_specified_members: bool,
    pub ignore_should_serialize_members: bool,
    /// Allocate instances without a constructor when field serialization is
    /// used.
    pub allow_uninitialized: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            default_members_search: MemberSearch::default(),
            ignore_serializable_interface: false,
            ignore_serializable_attribute: true,
            ignore_is_specified_members: false,
            ignore_should_serialize_members: false,
            allow_uninitialized: true,
        }
    }
}

// -----------------------------------------------------------------------------
// ContractResolver

static SHARED: LazyLock<Arc<ContractResolver>> =
    LazyLock::new(|| Arc::new(ContractResolver::new()));

/// Resolves the contract of each type once and caches it.
///
/// A resolver is safe to share between threads; lookups never block while
/// another thread publishes a newly resolved contract.
pub struct ContractResolver {
    naming: Arc<dyn NamingStrategy>,
    metadata: Arc<dyn MetadataProvider>,
    options: ResolverOptions,
    builtins: Vec<Arc<dyn JsonConverter>>,
    cache: ContractCache,
}

impl ContractResolver {
    pub fn new() -> Self {
        Self {
            naming: Arc::new(DefaultNamingStrategy::default()),
            metadata: Arc::new(AttributeMetadataProvider),
            options: ResolverOptions::default(),
            builtins: vec![Arc::new(KeyValuePairConverter)],
            cache: ContractCache::new(),
        }
    }

    /// The resolver used when the settings name none.
    #[inline]
    pub fn shared() -> Arc<ContractResolver> {
        SHARED.clone()
    }

    pub fn with_naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn with_metadata(mut self, metadata: impl MetadataProvider + 'static) -> Self {
        self.metadata = Arc::new(metadata);
        self
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    pub fn naming(&self) -> &dyn NamingStrategy {
        &*self.naming
    }

    #[inline]
    pub fn metadata(&self) -> &dyn MetadataProvider {
        &*self.metadata
    }

    #[inline]
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// The number of cached contracts.
    #[inline]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// The contract of `ty`, resolved on first use.
    pub fn resolve(&self, ty: &Type) -> Result<Arc<Contract>, ContractError> {
        let key = ty.key();
        if let Some(contract) = self.cache.get(&key) {
            return Ok(contract);
        }
        let contract = Arc::new(self.create_contract(ty)?);
        log::debug!("resolved {:?} contract for '{}'", contract.kind(), ty);
        Ok(self.cache.insert(key, contract))
    }

    // -------------------------------------------------------------------------
    // Decision list

    fn create_contract(&self, ty: &Type) -> Result<Contract, ContractError> {
        let handle = match ty {
            Type::Primitive(p) | Type::Nullable(p) => {
                return Ok(Self::primitive_contract(ty, *p));
            }
            Type::Any => {
                return Ok(Contract::new(
                    Type::Any,
                    ContractDetails::Object(Self::empty_object(MemberSerialization::OptOut)),
                ));
            }
            Type::Token => return Ok(Contract::new(Type::Token, ContractDetails::LinqToken)),
            Type::Def(handle) => handle,
        };

        let facts = self.metadata.type_facts(handle);
        if facts.object.is_some() {
            return self.create_object_contract(handle, &facts);
        }
        if facts.array.is_some() {
            return self.create_array_contract(handle, &facts);
        }
        if facts.dictionary.is_some() {
            return self.create_dictionary_contract(handle, &facts);
        }

        let caps = handle.def().capabilities();
        if caps.dictionary.is_some() {
            return self.create_dictionary_contract(handle, &facts);
        }
        if caps.list.is_some() || caps.enumerable.is_some() || caps.grid.is_some() {
            return self.create_array_contract(handle, &facts);
        }
        if let Some(conversion) = &caps.string_conversion {
            let mut contract = Contract::new(ty.clone(), ContractDetails::String(conversion.clone()));
            self.initialize_contract(&mut contract, handle, &facts)?;
            return Ok(contract);
        }
        if let Some(native) = &caps.native_serializable
            && !self.options.ignore_serializable_interface
        {
            let mut contract =
                Contract::new(ty.clone(), ContractDetails::NativeSerializable(native.clone()));
            self.initialize_contract(&mut contract, handle, &facts)?;
            return Ok(contract);
        }
        if caps.dynamic {
            return self.create_dynamic_contract(handle, &facts);
        }
        if let Some(convertible) = &caps.convertible {
            let mut contract = Contract::new(
                ty.clone(),
                ContractDetails::Primitive(PrimitiveDetails {
                    primitive: convertible.primitive,
                    convertible: Some(convertible.clone()),
                }),
            );
            self.initialize_contract(&mut contract, handle, &facts)?;
            return Ok(contract);
        }
        self.create_object_contract(handle, &facts)
    }

    fn primitive_contract(ty: &Type, primitive: PrimitiveType) -> Contract {
        Contract::new(
            ty.clone(),
            ContractDetails::Primitive(PrimitiveDetails {
                primitive,
                convertible: None,
            }),
        )
    }

    fn empty_object(member_serialization: MemberSerialization) -> ObjectDetails {
        ObjectDetails {
            member_serialization,
            missing_member_handling: None,
            item_required: None,
            item_null_value_handling: None,
            properties: PropertyCollection::new(),
            creator_parameters: PropertyCollection::new(),
            override_creator: None,
            parameterized_creator: None,
            extension_data: None,
        }
    }

    /// Converters, default creator and callbacks, shared by every kind of
    /// defined type. Expects `created_type` to be set already.
    fn initialize_contract(
        &self,
        contract: &mut Contract,
        ty: &TypeHandle,
        facts: &TypeFacts,
    ) -> Result<(), ContractError> {
        contract.converter = facts.converter.clone();
        contract.internal_converter = self
            .builtins
            .iter()
            .find(|c| c.can_convert(&contract.underlying_type))
            .cloned();

        if let Some(created) = contract.created_type.as_def() {
            let def = created.def();
            if def.is_instantiable()
                && let Some(ctor) = def.default_constructor()
            {
                contract.default_creator_non_public = !ctor.is_public();
                contract.default_creator = Some(match ctor {
                    DefaultConstructor::Implicit => Creator::uninitialized(created.clone()),
                    DefaultConstructor::Declared(c) => Creator::new(created.clone(), c.body()),
                });
            }
        }

        callbacks::resolve_callback_methods(ty, contract)
    }

    // -------------------------------------------------------------------------
    // Contract kinds

    fn member_serialization(&self, facts: &TypeFacts) -> MemberSerialization {
        if let Some(object) = &facts.object {
            return object.member_serialization;
        }
        if facts.data_contract.is_some() {
            return MemberSerialization::OptIn;
        }
        if facts.serializable && !self.options.ignore_serializable_attribute {
            return MemberSerialization::Fields;
        }
        MemberSerialization::OptOut
    }

    fn create_object_contract(
        &self,
        ty: &TypeHandle,
        facts: &TypeFacts,
    ) -> Result<Contract, ContractError> {
        let member_serialization = self.member_serialization(facts);
        let mut details = Self::empty_object(member_serialization);
        let mut contract = Contract::new(Type::from(ty), ContractDetails::LinqToken);
        self.initialize_contract(&mut contract, ty, facts)?;

        let naming: Arc<dyn NamingStrategy> = match facts.object.as_ref().and_then(|o| o.naming.clone()) {
            Some(naming) => naming,
            None => self.naming.clone(),
        };
        if let Some(object) = &facts.object {
            details.missing_member_handling = object.missing_member_handling;
            details.item_required = object.item_required;
            details.item_null_value_handling = object.item_null_value_handling;
            contract.is_reference = object.is_reference;
        } else if let Some(data_contract) = facts.data_contract
            && data_contract.is_reference
        {
            contract.is_reference = Some(true);
        }

        details.properties = self.create_properties(ty, member_serialization, &*naming)?;
        self.resolve_constructors(ty, &mut contract, &mut details, &*naming)?;
        details.extension_data = self.resolve_extension_data(ty)?;

        contract.details = ContractDetails::Object(details);
        Ok(contract)
    }

    fn create_dynamic_contract(
        &self,
        ty: &TypeHandle,
        facts: &TypeFacts,
    ) -> Result<Contract, ContractError> {
        let mut contract = Contract::new(Type::from(ty), ContractDetails::LinqToken);
        self.initialize_contract(&mut contract, ty, facts)?;
        let properties =
            self.create_properties(ty, MemberSerialization::OptOut, &*self.naming)?;
        contract.details = ContractDetails::Dynamic { properties };
        Ok(contract)
    }

    /// The concrete type created for an interface or abstract collection.
    fn promote(ty: &TypeHandle, fallback: impl FnOnce() -> TypeHandle) -> TypeHandle {
        match ty.def().kind() {
            TypeKind::Interface | TypeKind::Abstract => match ty.def().default_impl() {
                Some(concrete) => concrete.clone(),
                None => fallback(),
            },
            TypeKind::Class | TypeKind::Struct => ty.clone(),
        }
    }

    fn create_array_contract(
        &self,
        ty: &TypeHandle,
        facts: &TypeFacts,
    ) -> Result<Contract, ContractError> {
        let caps = ty.def().capabilities();
        let item_type = caps
            .list
            .as_ref()
            .map(|l| l.item.clone())
            .or_else(|| caps.grid.as_ref().map(|g| g.item.clone()))
            .or_else(|| caps.enumerable.as_ref().map(|e| e.item.clone()))
            .unwrap_or(Type::Any);

        let created = if caps.is_collection() {
            Self::promote(ty, || list_of(item_type.clone()))
        } else {
            ty.clone()
        };
        let created_caps = created.def().capabilities();
        let storage = if let Some(list) = &created_caps.list {
            ArrayStorage::List {
                fixed_size: list.fixed_size,
                read_only: list.read_only,
            }
        } else if let Some(grid) = &created_caps.grid {
            ArrayStorage::Grid { rank: grid.rank }
        } else if let Some(enumerable) = &created_caps.enumerable {
            ArrayStorage::Enumerable(enumerable.clone())
        } else {
            ArrayStorage::Unsupported
        };

        let mut container = ContainerInfo::new(item_type);
        let mut contract = Contract::new(Type::from(ty), ContractDetails::LinqToken);
        if let Some(array) = &facts.array {
            contract.is_reference = array.is_reference;
            container.item_is_reference = array.item_is_reference;
        }
        contract.created_type = Type::from(created);
        self.initialize_contract(&mut contract, ty, facts)?;
        contract.details = ContractDetails::Array(ArrayDetails { container, storage });
        Ok(contract)
    }

    fn create_dictionary_contract(
        &self,
        ty: &TypeHandle,
        facts: &TypeFacts,
    ) -> Result<Contract, ContractError> {
        let (key_type, value_type, read_only) = match &ty.def().capabilities().dictionary {
            Some(dictionary) => (
                dictionary.key.clone(),
                dictionary.value.clone(),
                dictionary.read_only,
            ),
            None => (Type::STRING, Type::Any, false),
        };
        let created = if ty.def().capabilities().dictionary.is_some() {
            Self::promote(ty, || dictionary_of(key_type.clone(), value_type.clone()))
        } else {
            ty.clone()
        };

        let mut details = DictionaryDetails::new(key_type, value_type, read_only);
        let mut contract = Contract::new(Type::from(ty), ContractDetails::LinqToken);
        if let Some(dictionary) = &facts.dictionary {
            contract.is_reference = dictionary.is_reference;
            details.container.item_is_reference = dictionary.item_is_reference;
        }
        contract.created_type = Type::from(created);
        self.initialize_contract(&mut contract, ty, facts)?;
        contract.details = ContractDetails::Dictionary(details);
        Ok(contract)
    }
}

impl Default for ContractResolver {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use cj_reflect::builtins::{array_of, dictionary_of, key_value_pair, list_of, version};
    use cj_reflect::info::{Convertible, MemberDef, StringConversion, TypeDefBuilder};
    use cj_reflect::{PrimitiveType, Type, Value};

    use super::ContractResolver;
    use crate::attributes::{JsonArray, JsonObject};
    use crate::contract::{ArrayStorage, ContractKind};
    use crate::settings::MemberSerialization;

    #[test]
    fn decision_list() {
        let resolver = ContractResolver::new();
        let kind = |ty: Type| resolver.resolve(&ty).unwrap().kind();

        assert_eq!(kind(Type::INTEGER), ContractKind::Primitive);
        assert_eq!(kind(Type::Nullable(PrimitiveType::Bool)), ContractKind::Primitive);
        assert_eq!(kind(Type::Any), ContractKind::Object);
        assert_eq!(kind(Type::Token), ContractKind::LinqToken);
        assert_eq!(kind(Type::from(list_of(Type::STRING))), ContractKind::Array);
        assert_eq!(
            kind(Type::from(dictionary_of(Type::STRING, Type::INTEGER))),
            ContractKind::Dictionary
        );

        let uri = TypeDefBuilder::class("System.Uri")
            .string_conversion(StringConversion {
                to_string: Arc::new(|v| Ok(v.as_str().unwrap_or_default().into())),
                from_string: Arc::new(|_, s| Ok(Value::from(s))),
            })
            .build();
        assert_eq!(kind(Type::from(uri)), ContractKind::String);

        let bag = TypeDefBuilder::class("App.Expando").dynamic().build();
        assert_eq!(kind(Type::from(bag)), ContractKind::Dynamic);

        let money = TypeDefBuilder::structure("App.Money")
            .convertible(Convertible {
                primitive: PrimitiveType::Float,
                to_primitive: Arc::new(|_, v| Ok(v)),
                from_primitive: Arc::new(|_, v| Ok(v)),
            })
            .build();
        assert_eq!(kind(Type::from(money)), ContractKind::Primitive);

        let plain = TypeDefBuilder::class("App.Plain").build();
        assert_eq!(kind(Type::from(plain)), ContractKind::Object);
    }

    #[test]
    fn container_markers_take_precedence() {
        let resolver = ContractResolver::new();
        let list_as_object = TypeDefBuilder::class("App.Page")
            .list(Type::INTEGER)
            .member(MemberDef::property("Size", Type::INTEGER))
            .with_attribute(JsonObject::new(MemberSerialization::OptOut))
            .build();
        let contract = resolver.resolve(&Type::from(list_as_object)).unwrap();
        assert_eq!(contract.kind(), ContractKind::Object);
        assert_eq!(contract.as_object().unwrap().properties.len(), 1);

        let marked = TypeDefBuilder::class("App.Marked")
            .with_attribute(JsonArray::default())
            .build();
        let contract = resolver.resolve(&Type::from(marked)).unwrap();
        assert!(matches!(
            contract.as_array().unwrap().storage,
            ArrayStorage::Unsupported
        ));
    }

    #[test]
    fn interfaces_are_promoted() {
        let resolver = ContractResolver::new();
        let items = TypeDefBuilder::interface("App.IItems")
            .list(Type::STRING)
            .build();
        let contract = resolver.resolve(&Type::from(&items)).unwrap();
        let created = contract.created_type.as_def().unwrap();
        assert!(!created.ptr_eq(&items));
        assert!(created.def().capabilities().list.is_some());
        assert!(contract.default_creator.is_some());

        let array = resolver.resolve(&Type::from(array_of(Type::INTEGER))).unwrap();
        assert!(array.as_array().unwrap().uses_surrogate());
    }

    #[test]
    fn contracts_are_cached() {
        let resolver = ContractResolver::new();
        let ty = Type::from(TypeDefBuilder::class("App.Cached").build());
        let first = resolver.resolve(&ty).unwrap();
        let second = resolver.resolve(&ty).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn builtin_converters_and_version() {
        let resolver = ContractResolver::new();
        let pair = resolver
            .resolve(&Type::from(key_value_pair(Type::STRING, Type::INTEGER)))
            .unwrap();
        assert!(pair.internal_converter.is_some());

        let version = resolver.resolve(&Type::from(version())).unwrap();
        let object = version.as_object().unwrap();
        assert!(object.override_creator.is_some());
        assert_eq!(object.creator_parameters.len(), 4);
        assert_eq!(object.properties.len(), 4);
        assert!(object.properties.iter().all(|p| !p.writable));
    }
}
