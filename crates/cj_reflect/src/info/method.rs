use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::info::Visibility;
use crate::{BoxedError, ErrorContext, Obj, ReflectError, StreamingContext, Type, Value};

// -----------------------------------------------------------------------------
// CallbackRole

/// The serialization hooks a method can be marked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackRole {
    OnSerializing,
    OnSerialized,
    OnDeserializing,
    OnDeserialized,
    OnError,
}

impl CallbackRole {
    pub const ALL: [CallbackRole; 5] = [
        Self::OnSerializing,
        Self::OnSerialized,
        Self::OnDeserializing,
        Self::OnDeserialized,
        Self::OnError,
    ];

    /// The parameter list a callback of this role must declare.
    pub const fn expected_params(self) -> &'static [ParamKind] {
        const CONTEXT: &[ParamKind] = &[ParamKind::Context];
        const ERROR: &[ParamKind] = &[ParamKind::Context, ParamKind::ErrorContext];
        match self {
            Self::OnError => ERROR,
            _ => CONTEXT,
        }
    }
}

/// The kind of a method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Context,
    ErrorContext,
    Value(Type),
}

// -----------------------------------------------------------------------------
// Invocation

/// The arguments of a method call.
pub struct Invocation<'a> {
    pub context: Option<&'a StreamingContext>,
    pub error: Option<&'a mut ErrorContext>,
    pub args: Vec<Value>,
}

impl<'a> Invocation<'a> {
    /// An invocation without arguments.
    #[inline]
    pub fn empty() -> Self {
        Self {
            context: None,
            error: None,
            args: Vec::new(),
        }
    }

    #[inline]
    pub fn with_context(context: &'a StreamingContext) -> Self {
        Self {
            context: Some(context),
            error: None,
            args: Vec::new(),
        }
    }
}

/// A method body.
pub type MethodFn =
    Arc<dyn Fn(&Obj, &mut Invocation<'_>) -> Result<Value, BoxedError> + Send + Sync>;

// -----------------------------------------------------------------------------
// MethodDef

/// A method declared on a [`TypeDef`](crate::info::TypeDef).
pub struct MethodDef {
    name: String,
    roles: Vec<CallbackRole>,
    is_virtual: bool,
    visibility: Visibility,
    return_type: Option<Type>,
    params: Vec<ParamKind>,
    body: MethodFn,
}

impl MethodDef {
    /// A public, non-virtual method without parameters that returns nothing.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&Obj, &mut Invocation<'_>) -> Result<Value, BoxedError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            roles: Vec::new(),
            is_virtual: false,
            visibility: Visibility::Public,
            return_type: None,
            params: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// A callback with the parameter list its role requires.
    pub fn callback(
        name: impl Into<String>,
        role: CallbackRole,
        body: impl Fn(&Obj, &mut Invocation<'_>) -> Result<(), BoxedError> + Send + Sync + 'static,
    ) -> Self {
        let mut method = Self::new(name, move |obj, inv| body(obj, inv).map(|()| Value::Null));
        method.roles.push(role);
        method.params = role.expected_params().to_vec();
        method
    }

    /// A parameterless method returning `bool`, e.g. `ShouldSerializeName`.
    pub fn predicate(
        name: impl Into<String>,
        body: impl Fn(&Obj) -> Result<bool, BoxedError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |obj, _| body(obj).map(Value::Bool)).returns(Type::BOOL)
    }

    /// Adds a callback role marker.
    pub fn role(mut self, role: CallbackRole) -> Self {
        self.roles.push(role);
        self
    }

    pub fn param(mut self, kind: ParamKind) -> Self {
        self.params.push(kind);
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn virtual_method(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn roles(&self) -> &[CallbackRole] {
        &self.roles
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn return_type(&self) -> Option<&Type> {
        self.return_type.as_ref()
    }

    #[inline]
    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    /// A shared handle to the method body.
    #[inline]
    pub fn body(&self) -> MethodFn {
        self.body.clone()
    }

    /// Calls the method on `target`.
    pub fn invoke(&self, target: &Obj, invocation: &mut Invocation<'_>) -> Result<Value, ReflectError> {
        (self.body)(target, invocation).map_err(ReflectError::User)
    }
}

impl core::fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .field("virtual", &self.is_virtual)
            .field("params", &self.params)
            .finish()
    }
}
