use alloc::string::String;

use cj_reflect::TypeHandle;
use cj_reflect::info::{CallbackRole, MethodDef};

use crate::ContractError;
use crate::contract::{Contract, error_callback, serialization_callback};

#[inline]
fn role_index(role: CallbackRole) -> usize {
    match role {
        CallbackRole::OnSerializing => 0,
        CallbackRole::OnSerialized => 1,
        CallbackRole::OnDeserializing => 2,
        CallbackRole::OnDeserialized => 3,
        CallbackRole::OnError => 4,
    }
}

/// Collects the callback methods of `ty` into `contract`.
///
/// Levels are visited from the least-derived type, so base callbacks run
/// before derived ones. Invalid declarations fail here rather than when a
/// value is processed.
pub(super) fn resolve_callback_methods(
    ty: &TypeHandle,
    contract: &mut Contract,
) -> Result<(), ContractError> {
    for level in ty.levels() {
        let mut declared: [Option<&MethodDef>; 5] = [None; 5];

        for method in level.def().methods() {
            let Some(role) = validate(level, method)? else {
                continue;
            };
            let slot = &mut declared[role_index(role)];
            if let Some(first) = slot {
                return Err(ContractError::DuplicateCallback {
                    type_name: String::from(level.name()),
                    role,
                    first: String::from(first.name()),
                    second: String::from(method.name()),
                });
            }
            *slot = Some(method);

            match role {
                CallbackRole::OnSerializing => {
                    contract.on_serializing.push(serialization_callback(method));
                }
                CallbackRole::OnSerialized => {
                    contract.on_serialized.push(serialization_callback(method));
                }
                CallbackRole::OnDeserializing => {
                    contract.on_deserializing.push(serialization_callback(method));
                }
                CallbackRole::OnDeserialized => {
                    contract.on_deserialized.push(serialization_callback(method));
                }
                CallbackRole::OnError => contract.on_error.push(error_callback(method)),
            }
        }
    }
    Ok(())
}

/// The role of a callback method, `None` for ordinary methods.
fn validate(level: &TypeHandle, method: &MethodDef) -> Result<Option<CallbackRole>, ContractError> {
    let Some(&role) = method.roles().first() else {
        return Ok(None);
    };
    let type_name = || String::from(level.name());
    let method_name = || String::from(method.name());

    if let Some(&second) = method.roles().iter().find(|r| **r != role) {
        return Err(ContractError::MultipleRoles {
            type_name: type_name(),
            method: method_name(),
            first: role,
            second,
        });
    }
    if method.is_virtual() {
        return Err(ContractError::VirtualCallback {
            type_name: type_name(),
            method: method_name(),
            role,
        });
    }
    if method.return_type().is_some() {
        return Err(ContractError::CallbackReturnsValue {
            type_name: type_name(),
            method: method_name(),
        });
    }
    if method.params() != role.expected_params() {
        return Err(ContractError::CallbackSignature {
            type_name: type_name(),
            method: method_name(),
            role,
            expected: role.expected_params().len(),
        });
    }
    Ok(Some(role))
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use cj_reflect::Type;
    use cj_reflect::info::{CallbackRole, MethodDef, ParamKind, TypeDefBuilder};

    use super::resolve_callback_methods;
    use crate::ContractError;
    use crate::contract::{Contract, ContractDetails};

    fn resolve(ty: &cj_reflect::TypeHandle) -> Result<Contract, ContractError> {
        let mut contract = Contract::new(Type::from(ty), ContractDetails::LinqToken);
        resolve_callback_methods(ty, &mut contract)?;
        Ok(contract)
    }

    fn noop(name: &str, role: CallbackRole) -> MethodDef {
        MethodDef::callback(name, role, |_, _| Ok(()))
    }

    #[test]
    fn callbacks_accumulate_across_levels() {
        let base = TypeDefBuilder::class("App.Base")
            .method(noop("BaseDone", CallbackRole::OnDeserialized))
            .build();
        let derived = TypeDefBuilder::class("App.Derived")
            .base(&base)
            .method(noop("Done", CallbackRole::OnDeserialized))
            .method(noop("Failed", CallbackRole::OnError))
            .build();
        let contract = resolve(&derived).unwrap();
        assert_eq!(contract.on_deserialized.len(), 2);
        assert_eq!(contract.on_error.len(), 1);
    }

    #[test]
    fn invalid_declarations_fail_fast() {
        let twice = TypeDefBuilder::class("App.Twice")
            .method(noop("A", CallbackRole::OnSerializing))
            .method(noop("B", CallbackRole::OnSerializing))
            .build();
        assert!(matches!(
            resolve(&twice),
            Err(ContractError::DuplicateCallback { .. })
        ));

        let both = TypeDefBuilder::class("App.Both")
            .method(noop("A", CallbackRole::OnSerializing).role(CallbackRole::OnSerialized))
            .build();
        assert!(matches!(resolve(&both), Err(ContractError::MultipleRoles { .. })));

        let overridable = TypeDefBuilder::class("App.Virtual")
            .method(noop("A", CallbackRole::OnSerialized).virtual_method())
            .build();
        assert!(matches!(
            resolve(&overridable),
            Err(ContractError::VirtualCallback { .. })
        ));

        let returns = TypeDefBuilder::class("App.Returns")
            .method(noop("A", CallbackRole::OnSerialized).returns(Type::BOOL))
            .build();
        assert!(matches!(
            resolve(&returns),
            Err(ContractError::CallbackReturnsValue { .. })
        ));

        let signature = TypeDefBuilder::class("App.Signature")
            .method(
                MethodDef::new("A", |_, _| Ok(cj_reflect::Value::Null))
                    .role(CallbackRole::OnError)
                    .param(ParamKind::Context),
            )
            .build();
        assert!(matches!(
            resolve(&signature),
            Err(ContractError::CallbackSignature { expected: 2, .. })
        ));
    }
}
