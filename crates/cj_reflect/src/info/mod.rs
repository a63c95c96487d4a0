//! Type definitions of the object model.

// -----------------------------------------------------------------------------
// Modules

mod attributes;
mod capability;
mod constructor;
mod member;
mod method;
mod type_def;

// -----------------------------------------------------------------------------
// Exports

pub use attributes::CustomAttributes;
pub use capability::{
    Capabilities, ConvertFn, Convertible, DictionaryCapability, EnumerableCapability,
    FromDataFn, FromItemsFn, FromStringFn, GetDataFn, GridCapability, IterateFn, ListCapability,
    NativeSerializable, StringConversion, ToStringFn,
};
pub use constructor::{ConstructorDef, ConstructorFn, DefaultConstructor, ParamDef};
pub use member::{MemberDef, MemberKind, Visibility};
pub use method::{CallbackRole, Invocation, MethodDef, MethodFn, ParamKind};
pub use type_def::{GenericInfo, TypeDef, TypeDefBuilder, TypeKind};
