//! Outcome taxonomy for variable lookups.

use std::fmt;

/// Result of a non-throwing variable operation.
///
/// The throwing counterparts carry the same state inside a
/// [`VariableError`](crate::VariableError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableState {
    Success,
    FailedNotDeclared,
    FailedNotAssigned,
    FailedTypeMismatch,
    FailedCouldNotResolveNativeReference,
    FailedNativeException,
    FailedRuntimeError,
}

impl VariableState {
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, VariableState::Success)
    }

    /// Composite scopes treat this state as "keep probing".
    #[inline]
    pub fn is_not_declared(self) -> bool {
        matches!(self, VariableState::FailedNotDeclared)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            VariableState::Success => "success",
            VariableState::FailedNotDeclared => "not declared",
            VariableState::FailedNotAssigned => "not assigned",
            VariableState::FailedTypeMismatch => "type mismatch",
            VariableState::FailedCouldNotResolveNativeReference => {
                "could not resolve native reference"
            }
            VariableState::FailedNativeException => "native exception",
            VariableState::FailedRuntimeError => "runtime error",
        }
    }
}

impl fmt::Display for VariableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
