use alloc::string::String;
use alloc::sync::Arc;

use crate::access::{FnValueProvider, GetFn, SetFn, SlotValueProvider, ValueProvider};
use crate::info::CustomAttributes;
use crate::info::attributes::impl_custom_attributes_fn;
use crate::{Type, Value};

// -----------------------------------------------------------------------------
// Visibility

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    NonPublic,
}

impl Visibility {
    #[inline]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Property,
}

/// Where a member keeps its value.
#[derive(Clone)]
enum Storage {
    /// An instance slot; the index is assigned when the type is defined.
    Slot,
    Accessor,
    Static,
}

// -----------------------------------------------------------------------------
// MemberDef

/// A field or property of a [`TypeDef`](crate::info::TypeDef).
///
/// ```
/// use cj_reflect::Type;
/// use cj_reflect::info::MemberDef;
///
/// let id = MemberDef::property("Id", Type::INTEGER).private_setter();
/// assert!(id.is_readable());
/// assert!(!id.setter().unwrap().is_public());
/// ```
pub struct MemberDef {
    name: String,
    kind: MemberKind,
    ty: Type,
    is_static: bool,
    visibility: Visibility,
    getter: Option<Visibility>,
    setter: Option<Visibility>,
    read_only: bool,
    initial: Option<Value>,
    storage: Storage,
    provider: Arc<dyn ValueProvider>,
    attributes: CustomAttributes,
}

impl MemberDef {
    fn new(name: impl Into<String>, kind: MemberKind, ty: Type) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            is_static: false,
            visibility: Visibility::Public,
            getter: Some(Visibility::Public),
            setter: Some(Visibility::Public),
            read_only: false,
            initial: None,
            storage: Storage::Slot,
            provider: Arc::new(SlotValueProvider::new(usize::MAX)),
            attributes: CustomAttributes::new(),
        }
    }

    /// A public, writable field.
    #[inline]
    pub fn field(name: impl Into<String>, ty: Type) -> Self {
        Self::new(name, MemberKind::Field, ty)
    }

    /// A public property with public getter and setter.
    #[inline]
    pub fn property(name: impl Into<String>, ty: Type) -> Self {
        Self::new(name, MemberKind::Property, ty)
    }

    /// Makes the member non-public. For properties both accessors follow.
    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self.getter = self.getter.map(|_| Visibility::NonPublic);
        self.setter = self.setter.map(|_| Visibility::NonPublic);
        self
    }

    /// A read-only field, or a property without setter.
    pub fn read_only(mut self) -> Self {
        match self.kind {
            MemberKind::Field => self.read_only = true,
            MemberKind::Property => self.setter = None,
        }
        self
    }

    pub fn private_setter(mut self) -> Self {
        if self.setter.is_some() {
            self.setter = Some(Visibility::NonPublic);
        }
        self
    }

    /// A write-only property.
    pub fn write_only(mut self) -> Self {
        self.getter = None;
        self
    }

    /// A static member backed by a single shared cell.
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self.storage = Storage::Static;
        self
    }

    /// The value a new instance holds before any constructor runs.
    pub fn with_initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    /// Backs the member with closures instead of a slot. A missing closure
    /// removes the matching accessor.
    pub fn with_accessors(mut self, get: Option<GetFn>, set: Option<SetFn>) -> Self {
        if get.is_none() {
            self.getter = None;
        }
        if set.is_none() {
            self.setter = None;
        }
        self.provider = Arc::new(FnValueProvider::new(self.name.clone(), get, set));
        self.storage = Storage::Accessor;
        self
    }

    impl_custom_attributes_fn!(attributes);

    /// Binds the member to its storage. Slot members take the next free slot.
    pub(crate) fn bind(&mut self, next_slot: &mut usize) -> Option<Value> {
        match &self.storage {
            Storage::Slot => {
                self.provider = Arc::new(SlotValueProvider::new(*next_slot));
                *next_slot += 1;
                Some(self.initial_value())
            }
            Storage::Static => {
                self.provider = Arc::new(FnValueProvider::cell(
                    self.name.clone(),
                    self.initial_value(),
                ));
                None
            }
            Storage::Accessor => None,
        }
    }

    fn initial_value(&self) -> Value {
        self.initial
            .clone()
            .unwrap_or_else(|| self.ty.default_value())
    }

    // -------------------------------------------------------------------------
    // Queries

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    #[inline]
    pub fn member_type(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    pub fn is_field(&self) -> bool {
        self.kind == MemberKind::Field
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Visibility of the getter; `None` for write-only members.
    #[inline]
    pub fn getter(&self) -> Option<Visibility> {
        match self.kind {
            MemberKind::Field => Some(self.visibility),
            MemberKind::Property => self.getter,
        }
    }

    /// Visibility of the setter; `None` for read-only members.
    #[inline]
    pub fn setter(&self) -> Option<Visibility> {
        match self.kind {
            MemberKind::Field if self.read_only => None,
            MemberKind::Field => Some(self.visibility),
            MemberKind::Property => self.setter,
        }
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.getter().is_some() && self.provider.can_read()
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.setter().is_some() && self.provider.can_write()
    }

    #[inline]
    pub fn is_read_only_field(&self) -> bool {
        self.kind == MemberKind::Field && self.read_only
    }

    /// The access strategy bound to this member.
    #[inline]
    pub fn provider(&self) -> &Arc<dyn ValueProvider> {
        &self.provider
    }
}

impl core::fmt::Debug for MemberDef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemberDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("type", &self.ty)
            .field("static", &self.is_static)
            .field("visibility", &self.visibility)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::MemberDef;
    use crate::access::GetFn;
    use crate::info::TypeDefBuilder;
    use crate::{BoxedError, Obj, Type, Value};

    #[test]
    fn accessor_members_take_no_slot() {
        let get: GetFn = Arc::new(|obj: &Obj| -> Result<Value, BoxedError> {
            Ok(Value::Integer(obj.get("Base")?.as_i64().unwrap_or(0) * 2))
        });
        let ty = TypeDefBuilder::class("App.Computed")
            .member(MemberDef::property("Base", Type::INTEGER))
            .member(MemberDef::property("Double", Type::INTEGER).with_accessors(Some(get), None))
            .build();
        assert_eq!(ty.def().slot_defaults().len(), 1);

        let obj = Obj::new(&ty);
        obj.set("Base", 3).unwrap();
        let double = ty.find_member("Double").unwrap();
        assert!(double.is_readable());
        assert!(!double.is_writable());
        assert_eq!(double.provider().get_value(&obj).unwrap(), Value::Integer(6));
    }
}
