//! Ember core vocabulary.
//!
//! Leaf types shared by every layer of the Ember object model. Nothing in
//! this crate knows about runtime values; it defines the access tiers and
//! lookup modes scopes are keyed by, class type modes, the meta-function
//! catalogue, class identity hashes, the diagnostic call stack and the
//! error hierarchy.

mod access;
mod context;
mod error;
mod meta;
mod state;
pub mod type_hash;
mod type_mode;

pub use access::{Access, ScopeMode};
pub use context::{ExecutionContext, FrameGuard, FrameKind, StackFrame};
pub use error::{
    ConstructionError, DispatchError, MarshalError, NativeError, RegistrationError, RuntimeError,
    VariableError,
};
pub use meta::{ExpectedReturn, MetaKey};
pub use state::VariableState;
pub use type_hash::TypeHash;
pub use type_mode::{MemberKind, TypeMode};
