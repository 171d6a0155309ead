//! Eager variable storage.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ember_core::{MetaKey, RuntimeError, VariableError};
use rustc_hash::FxHashMap;

use crate::assembly::Assembly;
use crate::dispatch;
use crate::instance::Instance;
use crate::native::{DynamicReference, NativeField};
use crate::value::{Value, ValueType};

use super::VariableScope;

/// A slot read and written through a host object.
#[derive(Debug, Clone)]
struct NativeSlot {
    field: NativeField,
    reference: Rc<DynamicReference>,
}

impl NativeSlot {
    fn read(&self, assembly: &Weak<Assembly>, ty: &ValueType) -> Result<Value, RuntimeError> {
        let host = self.reference.resolve()?;
        let raw = self.field.get(&host)?;
        let assembly = assembly.upgrade().ok_or(RuntimeError::AssemblyDropped)?;
        assembly.marshaler().from_native(&assembly, ty, raw)
    }

    fn write(
        &self,
        assembly: &Rc<Assembly>,
        ty: &ValueType,
        value: &Value,
    ) -> Result<(), RuntimeError> {
        let host = self.reference.resolve()?;
        let object = assembly.marshaler().to_native(value, ty)?;
        self.field.set(&host, object)?;
        Ok(())
    }
}

#[derive(Debug)]
struct Variable {
    ty: ValueType,
    value: Option<Value>,
    native: Option<NativeSlot>,
    annotations: Vec<Rc<Instance>>,
    immutable: bool,
}

impl Variable {
    fn new(ty: ValueType) -> Self {
        Self {
            ty,
            value: None,
            native: None,
            annotations: Vec::new(),
            immutable: false,
        }
    }
}

enum Read {
    Stored(Value),
    Native(NativeSlot, ValueType),
}

/// Named, typed slots held in a map.
///
/// Variables carrying annotations route reads through their annotations'
/// `onGet` hooks and writes through their `onSet` hooks. No borrow of the
/// map is held while a hook, a host accessor or the marshaler runs.
pub struct VariableStore {
    vars: RefCell<FxHashMap<Rc<str>, Variable>>,
    assembly: Weak<Assembly>,
}

impl VariableStore {
    pub fn new(assembly: Weak<Assembly>) -> Self {
        Self {
            vars: RefCell::new(FxHashMap::default()),
            assembly,
        }
    }

    pub fn len(&self) -> usize {
        self.vars.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.borrow().is_empty()
    }

    /// Declared names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.borrow().keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    /// Declared type of a variable.
    pub fn type_of(&self, name: &str) -> Option<ValueType> {
        self.vars.borrow().get(name).map(|v| v.ty.clone())
    }

    /// Declare and assign a slot that rejects every later write.
    pub(crate) fn declare_immutable(
        &self,
        name: &str,
        ty: ValueType,
        value: Value,
    ) -> Result<(), VariableError> {
        let mut variable = Variable::new(ty);
        variable.value = Some(value);
        variable.immutable = true;
        self.insert(name, variable)
    }

    /// Drop a slot. Returns whether it existed.
    pub(crate) fn undeclare(&self, name: &str) -> bool {
        self.vars.borrow_mut().remove(name).is_some()
    }

    fn insert(&self, name: &str, variable: Variable) -> Result<(), VariableError> {
        let mut vars = self.vars.borrow_mut();
        if vars.contains_key(name) {
            return Err(VariableError::already_declared(name));
        }
        vars.insert(Rc::from(name), variable);
        Ok(())
    }

    fn assembly(&self) -> Result<Rc<Assembly>, RuntimeError> {
        self.assembly.upgrade().ok_or(RuntimeError::AssemblyDropped)
    }
}

impl VariableScope for VariableStore {
    fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        let (read, annotations) = {
            let vars = self.vars.borrow();
            let var = vars
                .get(name)
                .ok_or_else(|| VariableError::not_declared(name))?;
            let read = match (&var.native, &var.value) {
                (Some(slot), _) => Read::Native(slot.clone(), var.ty.clone()),
                (None, Some(value)) => Read::Stored(value.clone()),
                (None, None) => return Err(VariableError::not_assigned(name).into()),
            };
            (read, var.annotations.clone())
        };

        let value = match read {
            Read::Stored(value) => value,
            Read::Native(slot, ty) => slot.read(&self.assembly, &ty)?,
        };
        if annotations.is_empty() {
            return Ok(value);
        }
        let assembly = self.assembly()?;
        dispatch::intercept(&assembly, MetaKey::GetIntercept, name, value, &annotations)
    }

    fn declare(&self, name: &str, ty: ValueType) -> Result<(), VariableError> {
        self.insert(name, Variable::new(ty))
    }

    fn declare_native(
        &self,
        name: &str,
        ty: ValueType,
        field: NativeField,
        reference: Rc<DynamicReference>,
    ) -> Result<(), VariableError> {
        let mut variable = Variable::new(ty);
        variable.native = Some(NativeSlot { field, reference });
        self.insert(name, variable)
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let (ty, native, annotations) = {
            let vars = self.vars.borrow();
            let var = vars
                .get(name)
                .ok_or_else(|| VariableError::not_declared(name))?;
            if var.immutable {
                return Err(VariableError::immutable_function(name).into());
            }
            (var.ty.clone(), var.native.clone(), var.annotations.clone())
        };

        let value = if annotations.is_empty() {
            value
        } else {
            let assembly = self.assembly()?;
            dispatch::intercept(&assembly, MetaKey::SetIntercept, name, value, &annotations)?
        };
        let value = ty
            .coerce(value)
            .map_err(|v| VariableError::type_mismatch(name, &ty, v.type_name()))?;

        match native {
            Some(slot) => slot.write(&self.assembly()?, &ty, &value),
            None => {
                if let Some(var) = self.vars.borrow_mut().get_mut(name) {
                    var.value = Some(value);
                }
                Ok(())
            }
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    fn is_assigned(&self, name: &str) -> bool {
        let slot = match self.vars.borrow().get(name) {
            None => return false,
            Some(var) => match &var.native {
                None => return var.value.is_some(),
                Some(slot) => slot.reference.clone(),
            },
        };
        slot.resolve().is_ok()
    }

    fn assign_annotations(
        &self,
        name: &str,
        annotations: Vec<Rc<Instance>>,
    ) -> Result<(), VariableError> {
        let mut vars = self.vars.borrow_mut();
        let var = vars
            .get_mut(name)
            .ok_or_else(|| VariableError::not_declared(name))?;
        var.annotations = annotations;
        Ok(())
    }

    fn get_annotations(&self, name: &str) -> Result<Vec<Rc<Instance>>, VariableError> {
        self.vars
            .borrow()
            .get(name)
            .map(|var| var.annotations.clone())
            .ok_or_else(|| VariableError::not_declared(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::VariableState;

    fn store() -> VariableStore {
        VariableStore::new(Weak::new())
    }

    #[test]
    fn declare_then_assign() {
        let store = store();
        store.declare("x", ValueType::Int).unwrap();
        assert!(store.is_declared("x"));
        assert!(!store.is_assigned("x"));
        assert_eq!(store.try_get("x"), Err(VariableState::FailedNotAssigned));

        store.assign("x", Value::Int(4)).unwrap();
        assert!(store.is_assigned("x"));
        assert_eq!(store.get("x").unwrap(), Value::Int(4));
    }

    #[test]
    fn declaring_twice_fails() {
        let store = store();
        store.declare("x", ValueType::Any).unwrap();
        let err = store.declare("x", ValueType::Any).unwrap_err();
        assert_eq!(err.detail.as_deref(), Some("already declared"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn undeclared_reads_and_writes() {
        let store = store();
        assert_eq!(store.try_get("nope"), Err(VariableState::FailedNotDeclared));
        assert_eq!(
            store.try_assign("nope", Value::Null),
            VariableState::FailedNotDeclared
        );
    }

    #[test]
    fn type_checked_writes() {
        let store = store();
        store.declare("f", ValueType::Float).unwrap();
        assert_eq!(
            store.try_assign("f", Value::string("x")),
            VariableState::FailedTypeMismatch
        );
        store.assign("f", Value::Int(2)).unwrap();
        assert!(matches!(store.get("f").unwrap(), Value::Float(f) if f == 2.0));
    }

    #[test]
    fn immutable_slots_reject_writes() {
        let store = store();
        store
            .declare_immutable("k", ValueType::Int, Value::Int(1))
            .unwrap();
        let err = store.assign("k", Value::Int(2)).unwrap_err();
        assert_eq!(err.variable_state(), VariableState::FailedRuntimeError);
        assert!(err.to_string().contains("functions are immutable"));
        assert_eq!(store.get("k").unwrap(), Value::Int(1));
    }

    #[test]
    fn unresolved_native_slot() {
        let store = store();
        let reference = Rc::new(DynamicReference::new(Rc::from("Host"), None, Weak::new()));
        store
            .declare_native(
                "n",
                ValueType::Int,
                NativeField::new(|_| Ok(crate::native::NativeObject::new(1i64))),
                reference,
            )
            .unwrap();
        assert!(!store.is_assigned("n"));
        assert_eq!(
            store.try_get("n"),
            Err(VariableState::FailedCouldNotResolveNativeReference)
        );
    }

    #[test]
    fn annotations_round_trip() {
        let store = store();
        store.declare("x", ValueType::Any).unwrap();
        assert!(store.get_annotations("x").unwrap().is_empty());
        assert!(store.assign_annotations("y", Vec::new()).is_err());
    }

    #[test]
    fn names_sorted() {
        let store = store();
        store.declare("b", ValueType::Any).unwrap();
        store.declare("a", ValueType::Any).unwrap();
        assert_eq!(store.names(), vec!["a", "b"]);
        assert_eq!(store.type_of("a"), Some(ValueType::Any));
    }

    #[test]
    fn undeclared_slots_can_be_declared_again() {
        let store = store();
        store
            .declare_immutable("f", ValueType::Any, Value::Int(1))
            .unwrap();
        assert!(store.undeclare("f"));
        assert!(!store.is_declared("f"));
        assert!(!store.undeclare("f"));
        store.declare("f", ValueType::Any).unwrap();
    }
}
