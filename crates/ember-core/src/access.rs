//! Access tiers and lookup modes for class members.

use std::fmt;

/// Visibility partition of a member.
///
/// Tiers are ordered from least to most restrictive. A scope opened at a
/// given tier sees members of that tier and every less restrictive tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Access {
    /// No modifier: externally visible.
    #[default]
    Global,
    /// Visible inside the class hierarchy.
    Internal,
    /// Visible only inside the declaring level.
    Local,
}

impl Access {
    /// All tiers, least restrictive first.
    pub const ALL: [Access; 3] = [Access::Global, Access::Internal, Access::Local];

    /// Dense index used for per-tier tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Access::Global => 0,
            Access::Internal => 1,
            Access::Local => 2,
        }
    }

    /// Whether a scope opened at this tier may observe a member with `member` access.
    #[inline]
    pub fn admits(self, member: Access) -> bool {
        member <= self
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Global => write!(f, "global"),
            Access::Internal => write!(f, "internal"),
            Access::Local => write!(f, "local"),
        }
    }
}

/// Lookup breadth of a variable scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeMode {
    /// Only the members declared on one inheritance level.
    Declarations,
    /// The chain below the most-derived level, then the assembly roots.
    Base,
    /// The whole chain, then the assembly roots.
    All,
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeMode::Declarations => write!(f, "declarations"),
            ScopeMode::Base => write!(f, "base"),
            ScopeMode::All => write!(f, "all"),
        }
    }
}
