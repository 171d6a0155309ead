//! Declarations scopes and the lazy function materializer.

use std::fmt;
use std::rc::{Rc, Weak};

use ember_core::{Access, RuntimeError, VariableError};

use crate::assembly::Assembly;
use crate::construct;
use crate::definition::{ClassDefinition, FunctionDef};
use crate::function::{Callable, Receiver};
use crate::instance::Instance;
use crate::native::{DynamicReference, NativeField};
use crate::value::{Value, ValueType};

use super::{VariableScope, VariableStore, is_miss};

/// Which functions a declarations scope may materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFilter {
    /// Externally visible functions, inherited ones included.
    Global,
    /// Internal functions, inherited ones included.
    Internal,
    /// Local functions declared on the scope's own level only.
    DeclaredLocal,
}

impl FunctionFilter {
    pub fn for_access(access: Access) -> Self {
        match access {
            Access::Global => FunctionFilter::Global,
            Access::Internal => FunctionFilter::Internal,
            Access::Local => FunctionFilter::DeclaredLocal,
        }
    }

    pub fn declared_only(self) -> bool {
        matches!(self, FunctionFilter::DeclaredLocal)
    }

    pub fn accepts(self, function: &FunctionDef) -> bool {
        let tier = match self {
            FunctionFilter::Global => Access::Global,
            FunctionFilter::Internal => Access::Internal,
            FunctionFilter::DeclaredLocal => Access::Local,
        };
        function.access() == tier
    }
}

enum ScopeOwner {
    /// One inheritance level of an instance.
    Level {
        definition: Rc<ClassDefinition>,
        instance: Weak<Instance>,
        level: usize,
    },
    /// The assembly-wide roots.
    Assembly,
}

/// The members of one inheritance level at one access tier.
///
/// Fields are declared eagerly by the construction protocol. Functions are
/// turned into callables on first lookup: a miss against the store searches
/// the level's definition (or the assembly's global functions) through the
/// tier's [`FunctionFilter`], declares an immutable slot holding the bound
/// callable, then attaches the function's annotations. Later lookups hit the
/// store and return the same callable.
pub struct DeclarationScope {
    store: VariableStore,
    access: Access,
    owner: ScopeOwner,
    assembly: Weak<Assembly>,
}

impl DeclarationScope {
    pub(crate) fn for_level(
        assembly: Weak<Assembly>,
        access: Access,
        definition: Rc<ClassDefinition>,
        instance: Weak<Instance>,
        level: usize,
    ) -> Self {
        Self {
            store: VariableStore::new(assembly.clone()),
            access,
            owner: ScopeOwner::Level {
                definition,
                instance,
                level,
            },
            assembly,
        }
    }

    pub(crate) fn for_assembly(assembly: Weak<Assembly>, access: Access) -> Self {
        Self {
            store: VariableStore::new(assembly.clone()),
            access,
            owner: ScopeOwner::Assembly,
            assembly,
        }
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// The eager store behind this scope.
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    /// Materialize `name` if a matching function exists.
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn materialize(&self, name: &str) -> Result<Option<Rc<Callable>>, RuntimeError> {
        let filter = FunctionFilter::for_access(self.access);
        let assembly = self
            .assembly
            .upgrade()
            .ok_or(RuntimeError::AssemblyDropped)?;

        let (function, receiver) = match &self.owner {
            ScopeOwner::Level {
                definition,
                instance,
                level,
            } => {
                let Some(function) =
                    definition.try_get_function(name, filter.declared_only(), |f| {
                        filter.accepts(f)
                    })
                else {
                    return Ok(None);
                };
                let owner = instance
                    .upgrade()
                    .ok_or_else(|| RuntimeError::InstanceDropped(function.label()))?;
                let bound = function
                    .owner()
                    .and_then(|o| owner.level_of(o.hash()))
                    .unwrap_or(*level);
                (function, Some((owner, bound)))
            }
            ScopeOwner::Assembly => {
                match assembly.function(name).filter(|f| filter.accepts(f)) {
                    Some(function) => (function, None),
                    None => return Ok(None),
                }
            }
        };

        let callable = Rc::new(Callable::new(
            function.clone(),
            receiver
                .as_ref()
                .map(|(instance, level)| Receiver::new(instance, *level)),
            Rc::downgrade(&assembly),
        ));
        self.store.declare_immutable(
            name,
            ValueType::Function,
            Value::Function(callable.clone()),
        )?;
        tracing::trace!(
            function = %function.label(),
            access = %self.access,
            kind = function.body().kind_name(),
            "materialized function"
        );

        if !function.annotations().is_empty() {
            let context = assembly.new_context();
            let receiver = receiver.as_ref().map(|(instance, level)| (instance, *level));
            let attached = construct::create_annotations(
                &assembly,
                function.annotations(),
                &function.label(),
                receiver,
                &context,
            )
            .map_err(RuntimeError::from)
            .and_then(|annotations| {
                self.store
                    .assign_annotations(name, annotations)
                    .map_err(RuntimeError::from)
            });
            if let Err(err) = attached {
                // Not materialized; the next lookup tries again.
                self.store.undeclare(name);
                return Err(err);
            }
        }
        Ok(Some(callable))
    }
}

impl VariableScope for DeclarationScope {
    fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        match self.store.get(name) {
            Err(err) if is_miss(&err, name) => {}
            other => return other,
        }
        match self.materialize(name)? {
            Some(_) => self.store.get(name),
            None => Err(VariableError::not_declared(name).into()),
        }
    }

    fn declare(&self, name: &str, ty: ValueType) -> Result<(), VariableError> {
        self.store.declare(name, ty)
    }

    fn declare_native(
        &self,
        name: &str,
        ty: ValueType,
        field: NativeField,
        reference: Rc<DynamicReference>,
    ) -> Result<(), VariableError> {
        self.store.declare_native(name, ty, field, reference)
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        match self.store.assign(name, value) {
            Err(err) if is_miss(&err, name) => {}
            other => return other,
        }
        match self.materialize(name)? {
            Some(_) => Err(VariableError::immutable_function(name).into()),
            None => Err(VariableError::not_declared(name).into()),
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.store.is_declared(name)
    }

    fn is_assigned(&self, name: &str) -> bool {
        self.store.is_assigned(name)
    }

    fn assign_annotations(
        &self,
        name: &str,
        annotations: Vec<Rc<Instance>>,
    ) -> Result<(), VariableError> {
        self.store.assign_annotations(name, annotations)
    }

    fn get_annotations(&self, name: &str) -> Result<Vec<Rc<Instance>>, VariableError> {
        if !self.store.is_declared(name) {
            match self.materialize(name) {
                Ok(Some(_)) => {}
                Ok(None) => return Err(VariableError::not_declared(name)),
                Err(err) => {
                    return Err(VariableError::new(name, err.variable_state())
                        .with_detail(err.to_string()));
                }
            }
        }
        self.store.get_annotations(name)
    }
}

impl fmt::Debug for DeclarationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = match &self.owner {
            ScopeOwner::Level {
                definition, level, ..
            } => format!("{}@{}", definition.name(), level),
            ScopeOwner::Assembly => "<assembly>".to_string(),
        };
        f.debug_struct("DeclarationScope")
            .field("owner", &owner)
            .field("access", &self.access)
            .field("declared", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_match_their_tier() {
        let global = FunctionDef::script("f", |_| Ok(Value::Null));
        let internal = FunctionDef::script("g", |_| Ok(Value::Null)).with_access(Access::Internal);
        let local = FunctionDef::script("h", |_| Ok(Value::Null)).with_access(Access::Local);

        assert!(FunctionFilter::Global.accepts(&global));
        assert!(!FunctionFilter::Global.accepts(&internal));
        assert!(FunctionFilter::Internal.accepts(&internal));
        assert!(!FunctionFilter::Internal.accepts(&local));
        assert!(FunctionFilter::DeclaredLocal.accepts(&local));
    }

    #[test]
    fn only_local_is_declared_only() {
        assert!(FunctionFilter::for_access(Access::Local).declared_only());
        assert!(!FunctionFilter::for_access(Access::Internal).declared_only());
        assert!(!FunctionFilter::for_access(Access::Global).declared_only());
    }

    #[test]
    fn assembly_roots_materialize_global_functions() {
        let assembly = Assembly::new(crate::RuntimeConfig::default());
        assembly
            .define_function(FunctionDef::script("answer", |_| Ok(Value::Int(42))))
            .unwrap();
        let root = DeclarationScope::for_assembly(Rc::downgrade(&assembly), Access::Global);

        assert!(!root.is_declared("answer"));
        let first = root.get("answer").unwrap();
        let second = root.get("answer").unwrap();
        assert!(root.is_declared("answer"));
        assert!(Rc::ptr_eq(
            first.as_function().unwrap(),
            second.as_function().unwrap()
        ));
        assert_eq!(
            first
                .as_function()
                .unwrap()
                .call(Vec::new(), assembly.context())
                .unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn assembly_functions_are_immutable() {
        let assembly = Assembly::new(crate::RuntimeConfig::default());
        assembly
            .define_function(FunctionDef::script("f", |_| Ok(Value::Null)))
            .unwrap();
        let root = DeclarationScope::for_assembly(Rc::downgrade(&assembly), Access::Global);
        let err = root.assign("f", Value::Int(1)).unwrap_err();
        assert!(err.to_string().contains("functions are immutable"));
        assert!(root.assign("f", Value::Int(1)).is_err());
    }
}
