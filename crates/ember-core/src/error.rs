//! Error types for the Ember object model.
//!
//! ## Error Hierarchy
//!
//! ```text
//! RuntimeError (umbrella used by calls, initializers and hooks)
//! ├── VariableError     - scope lookups, declarations and assignments
//! ├── ConstructionError - the construction protocol, wrapping its cause
//! ├── DispatchError     - meta-function dispatch
//! ├── NativeError       - failures raised by host code
//! └── MarshalError      - value conversion across the host boundary
//! RegistrationError      - definition building, kept apart from runtime
//! ```
//!
//! Construction failures are fail-fast: the originating cause is kept as the
//! error's `source` and the partially built instance is discarded.

use thiserror::Error;

use crate::{MetaKey, TypeMode, VariableState};

// ============================================================================
// Variable Errors
// ============================================================================

/// Failure of a variable scope operation.
///
/// Carries the same [`VariableState`] the non-throwing `try_*` calls return.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{state} '{name}'{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
pub struct VariableError {
    /// The variable name.
    pub name: String,
    /// Taxonomy entry.
    pub state: VariableState,
    /// Optional human readable detail.
    pub detail: Option<String>,
}

impl VariableError {
    pub fn new(name: impl Into<String>, state: VariableState) -> Self {
        Self {
            name: name.into(),
            state,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_declared(name: impl Into<String>) -> Self {
        Self::new(name, VariableState::FailedNotDeclared)
    }

    pub fn not_assigned(name: impl Into<String>) -> Self {
        Self::new(name, VariableState::FailedNotAssigned)
    }

    pub fn already_declared(name: impl Into<String>) -> Self {
        Self::new(name, VariableState::FailedRuntimeError).with_detail("already declared")
    }

    pub fn immutable_function(name: impl Into<String>) -> Self {
        Self::new(name, VariableState::FailedRuntimeError).with_detail("functions are immutable")
    }

    pub fn type_mismatch(
        name: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::new(name, VariableState::FailedTypeMismatch)
            .with_detail(format!("expected {expected}, got {actual}"))
    }

    /// A composite scope with no sources cannot hold declarations.
    pub fn no_sources(name: impl Into<String>) -> Self {
        Self::new(name, VariableState::FailedRuntimeError).with_detail("scope has no sources")
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors that occur while building and registering definitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A class with this name already exists in the assembly.
    #[error("duplicate class: {0}")]
    DuplicateClass(String),

    /// A member name is declared twice on one class.
    #[error("duplicate member '{member}' in class '{class}'")]
    DuplicateMember {
        /// The class name.
        class: String,
        /// The duplicated member.
        member: String,
    },

    /// A global function with this name already exists.
    #[error("duplicate global function: {0}")]
    DuplicateFunction(String),

    /// A host type is already paired with another class.
    #[error("host type '{host}' is already described by class '{class}'")]
    DuplicateHostType {
        /// The host type name.
        host: String,
        /// The class already paired with it.
        class: String,
    },

    /// The base class refuses to be inherited by the derived class.
    #[error("class '{class}' cannot inherit from '{base}' ({mode})")]
    NotInheritable {
        /// The derived class.
        class: String,
        /// The base class.
        base: String,
        /// Type mode of the base.
        mode: TypeMode,
    },

    /// A base reference did not resolve.
    #[error("class '{class}' extends unknown class '{base}'")]
    UnknownBase {
        /// The derived class.
        class: String,
        /// The missing base name.
        base: String,
    },

    /// The base chain of a class loops back onto itself.
    #[error("circular inheritance through '{0}'")]
    CircularInheritance(String),

    /// An annotation use names a class that is not an annotation class.
    #[error("'{class}' used as an annotation on '{target}' is not an annotation class")]
    NotAnAnnotation {
        /// What the annotation is attached to.
        target: String,
        /// The offending class.
        class: String,
    },

    /// An annotation use names a class that does not exist.
    #[error("unknown annotation '{class}' on '{target}'")]
    UnknownAnnotation {
        /// What the annotation is attached to.
        target: String,
        /// The missing class.
        class: String,
    },
}

// ============================================================================
// Construction Errors
// ============================================================================

/// Errors raised by the construction protocol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    /// No class with this name is registered.
    #[error("class '{0}' is not defined")]
    UnknownClass(String),

    /// The class mode forbids direct creation.
    #[error("class '{class}' cannot be created ({mode})")]
    NotCreatable {
        /// The class name.
        class: String,
        /// Its type mode.
        mode: TypeMode,
    },

    /// The construction protocol already ran on this instance.
    #[error("instance {id} of '{class}' is already initialized")]
    AlreadyInitialized {
        /// The class name.
        class: String,
        /// The instance id.
        id: u64,
    },

    /// A field could not be declared into its scope.
    #[error("field '{field}' of '{class}' could not be declared")]
    Declaration {
        /// The class name.
        class: String,
        /// The field name.
        field: String,
        /// The scope failure.
        #[source]
        source: VariableError,
    },

    /// Instantiating an annotation failed.
    #[error("annotation '{annotation}' on '{target}' failed")]
    Annotation {
        /// What the annotation is attached to.
        target: String,
        /// The annotation class.
        annotation: String,
        /// The cause.
        #[source]
        source: Box<RuntimeError>,
    },

    /// A field initializer failed.
    #[error("initializer of '{class}.{field}' failed")]
    Initializer {
        /// The class name.
        class: String,
        /// The field name.
        field: String,
        /// The cause.
        #[source]
        source: Box<RuntimeError>,
    },

    /// The constructor or one of its hooks failed.
    #[error("constructor of '{class}' failed")]
    Constructor {
        /// The class name.
        class: String,
        /// The cause.
        #[source]
        source: Box<RuntimeError>,
    },

    /// The assembly owning the definition is gone.
    #[error("the owning assembly has been dropped")]
    AssemblyDropped,
}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Errors raised while dispatching a meta-function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// No meta-function and no type-default behavior exists.
    #[error("'{key}' is not supported for {operand}")]
    Unsupported {
        /// The hook.
        key: MetaKey,
        /// Type name of the operand.
        operand: String,
    },

    /// The hook returned a value of the wrong type.
    #[error("'{key}' returned {actual}, expected {expected}")]
    ReturnType {
        /// The hook.
        key: MetaKey,
        /// The statically expected type.
        expected: String,
        /// What was returned.
        actual: String,
    },

    /// The hook resolved to something that cannot be called.
    #[error("'{key}' resolved to a non-callable {actual}")]
    NotCallable {
        /// The hook.
        key: MetaKey,
        /// What was found.
        actual: String,
    },

    /// The hook was called and failed.
    #[error("'{key}' failed")]
    Call {
        /// The hook.
        key: MetaKey,
        /// The cause.
        #[source]
        source: Box<RuntimeError>,
    },
}

// ============================================================================
// Host Boundary Errors
// ============================================================================

/// Failures raised by native (host) code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// The host code raised an exception.
    #[error("native exception: {0}")]
    Exception(String),

    /// Wrong number of arguments for a native callable.
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// The receiver object is not of the expected host type.
    #[error("receiver is not a {expected}")]
    ReceiverType {
        /// The expected host type name.
        expected: String,
    },
}

/// Value conversion failures across the host boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarshalError {
    /// No conversion exists between the two types.
    #[error("cannot marshal {from} to {to}")]
    Unsupported {
        /// Source type.
        from: String,
        /// Target type.
        to: String,
    },
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Errors raised while running script or host code against the object model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A scope operation failed.
    #[error(transparent)]
    Variable(#[from] VariableError),

    /// A nested construction failed.
    #[error(transparent)]
    Construction(Box<ConstructionError>),

    /// A meta-function dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Host code failed.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// A value could not cross the host boundary.
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// A value did not match the statically expected type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type.
        actual: String,
    },

    /// A call was attempted on a non-function value.
    #[error("value of type {0} is not callable")]
    NotCallable(String),

    /// An abstract function was called.
    #[error("function '{0}' is abstract")]
    AbstractCall(String),

    /// The host object behind an inheritance level is missing.
    #[error("could not resolve the native object of '{class}'")]
    UnresolvedNativeReference {
        /// The level's class.
        class: String,
    },

    /// The configured call depth ceiling was hit.
    #[error("call depth limit of {limit} exceeded")]
    StackOverflow {
        /// The configured limit.
        limit: usize,
    },

    /// An error raised by script code.
    #[error("{message}")]
    Script {
        /// The error message.
        message: String,
    },

    /// The assembly owning the object is gone.
    #[error("the owning assembly has been dropped")]
    AssemblyDropped,

    /// A bound function outlived the instance it was bound to.
    #[error("the receiver of '{0}' has been dropped")]
    InstanceDropped(String),
}

impl RuntimeError {
    /// Convenience constructor for script-raised errors.
    pub fn script(message: impl Into<String>) -> Self {
        RuntimeError::Script {
            message: message.into(),
        }
    }

    /// The taxonomy entry a variable operation reports for this failure.
    pub fn variable_state(&self) -> VariableState {
        match self {
            RuntimeError::Variable(err) => err.state,
            RuntimeError::Native(_) => VariableState::FailedNativeException,
            RuntimeError::UnresolvedNativeReference { .. } => {
                VariableState::FailedCouldNotResolveNativeReference
            }
            RuntimeError::TypeMismatch { .. } | RuntimeError::Marshal(_) => {
                VariableState::FailedTypeMismatch
            }
            _ => VariableState::FailedRuntimeError,
        }
    }
}

impl From<ConstructionError> for RuntimeError {
    fn from(err: ConstructionError) -> Self {
        RuntimeError::Construction(Box::new(err))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn variable_error_display() {
        let err = VariableError::not_declared("x");
        assert_eq!(err.to_string(), "not declared 'x'");

        let err = VariableError::already_declared("y");
        assert_eq!(err.to_string(), "runtime error 'y': already declared");
    }

    #[test]
    fn variable_error_type_mismatch() {
        let err = VariableError::type_mismatch("n", "int", "string");
        assert_eq!(err.state, VariableState::FailedTypeMismatch);
        assert!(err.to_string().contains("expected int, got string"));
    }

    #[test]
    fn registration_error_display() {
        let err = RegistrationError::NotInheritable {
            class: "Dog".into(),
            base: "Animal".into(),
            mode: TypeMode::Sealed,
        };
        assert_eq!(
            err.to_string(),
            "class 'Dog' cannot inherit from 'Animal' (sealed)"
        );
    }

    #[test]
    fn construction_error_keeps_cause() {
        let err = ConstructionError::Constructor {
            class: "Dog".into(),
            source: Box::new(RuntimeError::script("boom")),
        };
        assert_eq!(err.to_string(), "constructor of 'Dog' failed");
        assert_eq!(err.source().unwrap().to_string(), "boom");
    }

    #[test]
    fn runtime_error_from_construction() {
        let err: RuntimeError = ConstructionError::UnknownClass("Cat".into()).into();
        assert!(matches!(err, RuntimeError::Construction(_)));
        assert_eq!(err.to_string(), "class 'Cat' is not defined");
    }

    #[test]
    fn runtime_error_variable_state() {
        let err: RuntimeError = VariableError::not_assigned("x").into();
        assert_eq!(err.variable_state(), VariableState::FailedNotAssigned);

        let err: RuntimeError = NativeError::Exception("bad".into()).into();
        assert_eq!(err.variable_state(), VariableState::FailedNativeException);

        let err = RuntimeError::UnresolvedNativeReference {
            class: "Host".into(),
        };
        assert_eq!(
            err.variable_state(),
            VariableState::FailedCouldNotResolveNativeReference
        );

        assert_eq!(
            RuntimeError::script("x").variable_state(),
            VariableState::FailedRuntimeError
        );
    }

    #[test]
    fn dispatch_error_display() {
        let err = DispatchError::ReturnType {
            key: MetaKey::ToString,
            expected: "string".into(),
            actual: "int".into(),
        };
        assert_eq!(err.to_string(), "'opToString' returned int, expected string");
    }
}
