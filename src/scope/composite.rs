//! Ordered probing over several scopes.

use std::fmt;
use std::rc::Rc;

use ember_core::{RuntimeError, VariableError};

use crate::instance::Instance;
use crate::native::{DynamicReference, NativeField};
use crate::value::{Value, ValueType};

use super::{VariableScope, is_miss};

/// A scope that probes its sources in priority order.
///
/// A "not declared" outcome advances to the next source; any other outcome
/// is returned as is. Declarations go to the first source.
pub struct CompositeScope {
    sources: Vec<Rc<dyn VariableScope>>,
}

impl CompositeScope {
    pub fn new(sources: Vec<Rc<dyn VariableScope>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn first(&self, name: &str) -> Result<&Rc<dyn VariableScope>, VariableError> {
        self.sources
            .first()
            .ok_or_else(|| VariableError::no_sources(name))
    }
}

impl VariableScope for CompositeScope {
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        for source in &self.sources {
            match source.get(name) {
                Err(err) if is_miss(&err, name) => continue,
                other => return other,
            }
        }
        Err(VariableError::not_declared(name).into())
    }

    fn declare(&self, name: &str, ty: ValueType) -> Result<(), VariableError> {
        self.first(name)?.declare(name, ty)
    }

    fn declare_native(
        &self,
        name: &str,
        ty: ValueType,
        field: NativeField,
        reference: Rc<DynamicReference>,
    ) -> Result<(), VariableError> {
        self.first(name)?.declare_native(name, ty, field, reference)
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        for source in &self.sources {
            match source.assign(name, value.clone()) {
                Err(err) if is_miss(&err, name) => continue,
                other => return other,
            }
        }
        Err(VariableError::not_declared(name).into())
    }

    fn is_declared(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.is_declared(name))
    }

    fn is_assigned(&self, name: &str) -> bool {
        self.sources
            .iter()
            .find(|s| s.is_declared(name))
            .is_some_and(|s| s.is_assigned(name))
    }

    fn assign_annotations(
        &self,
        name: &str,
        annotations: Vec<Rc<Instance>>,
    ) -> Result<(), VariableError> {
        for source in &self.sources {
            match source.assign_annotations(name, annotations.clone()) {
                Err(err) if err.state.is_not_declared() => continue,
                other => return other,
            }
        }
        Err(VariableError::not_declared(name))
    }

    fn get_annotations(&self, name: &str) -> Result<Vec<Rc<Instance>>, VariableError> {
        for source in &self.sources {
            match source.get_annotations(name) {
                Err(err) if err.state.is_not_declared() => continue,
                other => return other,
            }
        }
        Err(VariableError::not_declared(name))
    }
}

impl fmt::Debug for CompositeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeScope")
            .field("sources", &self.sources.len())
            .finish()
    }
}
