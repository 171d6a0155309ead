//! Variable scopes.
//!
//! Every lookup in the object model goes through the [`VariableScope`]
//! contract. Three implementations compose into the six lookup strategies
//! an instance exposes per inheritance level:
//!
//! | Type | Backs |
//! |------|-------|
//! | [`VariableStore`] | eager storage of named, typed slots |
//! | [`DeclarationScope`] | one level's own members (or the assembly roots), materializing functions on first lookup |
//! | [`CompositeScope`] | ordered probing over other scopes for the `All` and `Base` modes |
//!
//! Composite probing treats [`VariableState::FailedNotDeclared`] as "try the
//! next source"; every other outcome, including a failure on a variable that
//! exists, ends the probe.

mod composite;
mod declarations;
mod store;

use std::rc::Rc;

use ember_core::{RuntimeError, VariableError, VariableState};

use crate::instance::Instance;
use crate::native::{DynamicReference, NativeField};
use crate::value::{Value, ValueType};

pub use composite::CompositeScope;
pub use declarations::{DeclarationScope, FunctionFilter};
pub use store::VariableStore;

/// Read/write contract over named, typed slots.
pub trait VariableScope {
    /// Read a variable.
    fn get(&self, name: &str) -> Result<Value, RuntimeError>;

    /// Read a variable, reporting failures as a [`VariableState`].
    fn try_get(&self, name: &str) -> Result<Value, VariableState> {
        self.get(name).map_err(|e| e.variable_state())
    }

    /// Declare an unassigned slot. Fails if the name is already declared.
    fn declare(&self, name: &str, ty: ValueType) -> Result<(), VariableError>;

    /// Declare a slot backed by a field of a host object.
    fn declare_native(
        &self,
        name: &str,
        ty: ValueType,
        field: NativeField,
        reference: Rc<DynamicReference>,
    ) -> Result<(), VariableError>;

    /// Write a declared variable.
    fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError>;

    /// Write a variable, reporting the outcome as a [`VariableState`].
    fn try_assign(&self, name: &str, value: Value) -> VariableState {
        match self.assign(name, value) {
            Ok(()) => VariableState::Success,
            Err(e) => e.variable_state(),
        }
    }

    fn is_declared(&self, name: &str) -> bool;

    fn is_assigned(&self, name: &str) -> bool;

    /// Replace the annotation instances attached to a variable.
    fn assign_annotations(
        &self,
        name: &str,
        annotations: Vec<Rc<Instance>>,
    ) -> Result<(), VariableError>;

    fn get_annotations(&self, name: &str) -> Result<Vec<Rc<Instance>>, VariableError>;
}

/// Whether `err` reports that `name` itself is not declared.
pub(crate) fn is_miss(err: &RuntimeError, name: &str) -> bool {
    matches!(err, RuntimeError::Variable(e) if e.state.is_not_declared() && e.name == name)
}
