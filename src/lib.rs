//! Ember: the object model of an embedded scripting runtime.
//!
//! This crate provides class definitions, instances with per-level
//! inheritance state, the variable scopes name resolution walks, lazy
//! materialization of member functions, the construction protocol and
//! meta-function dispatch for value operators.
//!
//! # Example
//!
//! ```
//! use ember::prelude::*;
//!
//! let assembly = Assembly::new(RuntimeConfig::default());
//! assembly
//!     .define(
//!         ClassBuilder::new("Animal")
//!             .with_field(FieldDef::script("name", ValueType::String))
//!             .with_function(FunctionDef::script("constructor", |inv| {
//!                 inv.set("name", inv.arg(0))?;
//!                 Ok(Value::Null)
//!             })),
//!     )
//!     .unwrap();
//! assembly.define(ClassBuilder::new("Dog").extends("Animal")).unwrap();
//!
//! let rex = assembly
//!     .create("Dog", CreateOptions::default(), vec![Value::from("Rex")])
//!     .unwrap();
//! let name = rex.members(Access::Local).get("name").unwrap();
//! assert_eq!(name.as_str(), Some("Rex"));
//! ```

mod assembly;
mod config;
mod construct;
pub mod definition;
mod dispatch;
mod function;
mod instance;
pub mod native;
pub mod scope;
pub mod value;

pub use assembly::Assembly;
pub use config::RuntimeConfig;
pub use construct::{CreateFlags, CreateOptions};
pub use definition::{
    AnnotationUse, ClassBuilder, ClassDefinition, ClassRef, FieldDef, FieldKind, FunctionBody,
    FunctionDef, MetaLink, MetaTable,
};
pub use dispatch::Dispatcher;
pub use function::{Callable, CallableKind, Invocation, ScriptFn};
pub use instance::{InheritanceNode, Instance};
pub use value::{Table, Value, ValueType};

pub use ember_core::{
    Access, ConstructionError, DispatchError, ExecutionContext, MarshalError, MemberKind,
    MetaKey, NativeError, RegistrationError, RuntimeError, ScopeMode, StackFrame, TypeHash,
    TypeMode, VariableError, VariableState,
};

/// Everything needed to define classes and drive instances.
pub mod prelude {
    pub use crate::native::{
        DefaultMarshaler, Marshaler, NativeConstructor, NativeField, NativeMethod, NativeObject,
        NativeType,
    };
    pub use crate::scope::VariableScope;
    pub use crate::{
        Access, AnnotationUse, Assembly, ClassBuilder, CreateFlags, CreateOptions, FieldDef,
        FunctionDef, Invocation, RuntimeConfig, RuntimeError, ScopeMode, TypeMode, Value,
        ValueType,
    };
}
