use alloc::boxed::Box;
use core::any::{Any, TypeId};

use cj_utils::TypeIdMap;

// -----------------------------------------------------------------------------
// CustomAttributes

/// A collection of marker values attached to a type, member or parameter.
///
/// Attributes are stored by their [`TypeId`], so there can only be one
/// attribute per Rust type.
///
/// # Example
///
/// ```
/// use cj_reflect::info::CustomAttributes;
///
/// struct Obsolete(&'static str);
///
/// let attrs = CustomAttributes::new().with_attribute(Obsolete("use Id"));
/// assert!(attrs.contains::<Obsolete>());
/// assert_eq!(attrs.get::<Obsolete>().unwrap().0, "use Id");
/// ```
#[derive(Default)]
pub struct CustomAttributes {
    attributes: TypeIdMap<Box<dyn Any + Send + Sync>>,
}

impl CustomAttributes {
    /// A static reference to an empty [`CustomAttributes`].
    pub const EMPTY: &'static Self = &Self::new();

    #[inline]
    pub const fn new() -> Self {
        Self {
            attributes: TypeIdMap::new(),
        }
    }

    /// Adds an attribute, replacing an earlier one of the same type.
    #[inline]
    pub fn with_attribute<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    #[inline]
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.attributes.insert(TypeId::of::<T>(), Box::new(value));
    }

    #[inline]
    pub fn contains<T: Any>(&self) -> bool {
        self.attributes.contains(&TypeId::of::<T>())
    }

    #[inline]
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.attributes
            .get(&TypeId::of::<T>())
            .and_then(|attr| attr.downcast_ref::<T>())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl core::fmt::Debug for CustomAttributes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CustomAttributes(len = {})", self.len())
    }
}

// -----------------------------------------------------------------------------
// Auxiliary macro

/// Implement `with_attribute`, `get_attribute` and `has_attribute`.
macro_rules! impl_custom_attributes_fn {
    ($field:ident) => {
        /// Adds an attribute, replacing an earlier one of the same type.
        pub fn with_attribute<T: ::core::any::Any + Send + Sync>(mut self, value: T) -> Self {
            self.$field.insert(value);
            self
        }

        #[inline]
        pub fn custom_attributes(&self) -> &$crate::info::CustomAttributes {
            &self.$field
        }

        /// Returns the attribute of type `T`, if present.
        #[inline]
        pub fn get_attribute<T: ::core::any::Any>(&self) -> Option<&T> {
            self.$field.get::<T>()
        }

        /// Returns `true` if it contains the given attribute type.
        #[inline]
        pub fn has_attribute<T: ::core::any::Any>(&self) -> bool {
            self.$field.contains::<T>()
        }
    };
}

pub(super) use impl_custom_attributes_fn;
