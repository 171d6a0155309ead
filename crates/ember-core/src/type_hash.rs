//! Deterministic hash-based class identity.
//!
//! [`TypeHash`] identifies a class by its name. Two definitions with the same
//! name in one assembly are rejected at registration, so within an assembly
//! the hash is a stable identity that survives weak references and can be
//! compared without holding the definition itself.
//!
//! # Examples
//!
//! ```
//! use ember_core::TypeHash;
//!
//! let animal = TypeHash::from_name("Animal");
//! assert_eq!(animal, TypeHash::from_name("Animal"));
//! assert_ne!(animal, TypeHash::from_name("Dog"));
//!
//! let speak = TypeHash::from_member(animal, "speak");
//! assert_ne!(speak, TypeHash::from_member(TypeHash::from_name("Dog"), "speak"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant for path components
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for class hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for member hashes
    pub const MEMBER: u64 = 0x7d3c8b4a92e15f6d;
}

/// A deterministic 64-bit hash identifying a class or one of its members.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a hash from a class name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a member hash from its owner and name.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str) -> Self {
        let hash = (hash_constants::MEMBER ^ owner.0)
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(xxh64(name.as_bytes(), 0));
        TypeHash(hash)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
