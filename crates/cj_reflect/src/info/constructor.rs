use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::info::attributes::impl_custom_attributes_fn;
use crate::info::{CustomAttributes, Visibility};
use crate::{BoxedError, Obj, ReflectError, Type, TypeHandle, Value};

/// A constructor body: receives the type being created and the arguments.
pub type ConstructorFn =
    Arc<dyn Fn(&TypeHandle, Vec<Value>) -> Result<Obj, BoxedError> + Send + Sync>;

// -----------------------------------------------------------------------------
// ParamDef

/// A constructor parameter.
#[derive(Debug)]
pub struct ParamDef {
    name: String,
    ty: Type,
    attributes: CustomAttributes,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            attributes: CustomAttributes::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn param_type(&self) -> &Type {
        &self.ty
    }

    impl_custom_attributes_fn!(attributes);
}

// -----------------------------------------------------------------------------
// ConstructorDef

/// A constructor of a [`TypeDef`](crate::info::TypeDef).
pub struct ConstructorDef {
    params: Vec<ParamDef>,
    visibility: Visibility,
    body: ConstructorFn,
    attributes: CustomAttributes,
}

impl ConstructorDef {
    pub fn new(
        params: Vec<ParamDef>,
        body: impl Fn(&TypeHandle, Vec<Value>) -> Result<Obj, BoxedError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            params,
            visibility: Visibility::Public,
            body: Arc::new(body),
            attributes: CustomAttributes::new(),
        }
    }

    /// A constructor that allocates the instance and assigns each argument to
    /// the member of the same name.
    pub fn assigning(params: Vec<ParamDef>, members: &[&str]) -> Self {
        let members: Vec<String> = members.iter().map(|m| String::from(*m)).collect();
        Self::new(params, move |ty, args| {
            let obj = Obj::new(ty);
            for (member, value) in members.iter().zip(args) {
                let slot = ty
                    .find_member(member)
                    .ok_or_else(|| ReflectError::MissingMember {
                        type_name: String::from(ty.name()),
                        member: member.clone(),
                    })?;
                slot.provider().set_value(&obj, value)?;
            }
            Ok(obj)
        })
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    impl_custom_attributes_fn!(attributes);

    #[inline]
    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        self.visibility.is_public()
    }

    /// A shared handle to the constructor body.
    #[inline]
    pub fn body(&self) -> ConstructorFn {
        self.body.clone()
    }

    /// Runs the constructor.
    pub fn invoke(&self, ty: &TypeHandle, args: Vec<Value>) -> Result<Obj, ReflectError> {
        (self.body)(ty, args).map_err(ReflectError::User)
    }
}

impl core::fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("params", &self.params)
            .field("visibility", &self.visibility)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// DefaultConstructor

/// The zero-argument constructor of a type.
#[derive(Debug, Clone, Copy)]
pub enum DefaultConstructor<'a> {
    /// No constructor is declared, or the type is a struct.
    Implicit,
    Declared(&'a ConstructorDef),
}

impl DefaultConstructor<'_> {
    #[inline]
    pub fn is_public(&self) -> bool {
        match self {
            Self::Implicit => true,
            Self::Declared(ctor) => ctor.is_public(),
        }
    }

    pub fn invoke(&self, ty: &TypeHandle) -> Result<Obj, ReflectError> {
        match self {
            Self::Implicit => Ok(Obj::new(ty)),
            Self::Declared(ctor) => ctor.invoke(ty, Vec::new()),
        }
    }
}
