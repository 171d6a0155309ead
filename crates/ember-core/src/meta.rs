//! Catalogue of meta-functions.
//!
//! Meta-functions are class members with fixed names that value operators
//! and the construction protocol dispatch to. Every class probes the
//! [`CLASS_KEYS`](MetaKey::CLASS_KEYS) once; annotation classes additionally
//! probe the [`ANNOTATION_KEYS`](MetaKey::ANNOTATION_KEYS).
//!
//! # Example
//!
//! ```
//! use ember_core::MetaKey;
//!
//! assert_eq!(MetaKey::Add.method_name(), "opAdd");
//! assert_eq!(MetaKey::from_method_name("constructor"), Some(MetaKey::Constructor));
//! ```

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// A fixed-name hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MetaKey {
    // === Lifecycle ===
    /// `constructor`
    Constructor = 0,

    // === Protocols ===
    /// `opToString` - stringification
    ToString,
    /// `opLength` - length operator
    Length,
    /// `opEquals` - equality
    Equals,
    /// `opLess` - strict ordering
    Less,
    /// `opLessEqual` - non-strict ordering
    LessEqual,
    /// `opIterate` - iteration protocol
    Iterate,
    /// `opCall` - call syntax on an instance
    Call,
    /// `opNeg` - unary negation
    Negate,

    // === Arithmetic ===
    /// `opAdd`
    Add,
    /// `opSub`
    Sub,
    /// `opMul`
    Mul,
    /// `opDiv`
    Div,
    /// `opMod`
    Mod,
    /// `opConcat`
    Concat,

    // === Annotation hooks ===
    /// `onPreConstruct` - may replace the constructor arguments
    PreConstruct,
    /// `onPostConstruct`
    PostConstruct,
    /// `onGet` - intercepts reads of an annotated variable
    GetIntercept,
    /// `onSet` - intercepts writes of an annotated variable
    SetIntercept,
}

/// Static return type a dispatch site expects from a meta-function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedReturn {
    Any,
    Bool,
    Int,
    String,
}

impl MetaKey {
    /// Number of keys; meta tables are dense arrays of this length.
    pub const COUNT: usize = 19;

    /// Keys probed on every class.
    pub const CLASS_KEYS: [MetaKey; 15] = [
        MetaKey::Constructor,
        MetaKey::ToString,
        MetaKey::Length,
        MetaKey::Equals,
        MetaKey::Less,
        MetaKey::LessEqual,
        MetaKey::Iterate,
        MetaKey::Call,
        MetaKey::Negate,
        MetaKey::Add,
        MetaKey::Sub,
        MetaKey::Mul,
        MetaKey::Div,
        MetaKey::Mod,
        MetaKey::Concat,
    ];

    /// Keys probed only on annotation classes.
    pub const ANNOTATION_KEYS: [MetaKey; 4] = [
        MetaKey::PreConstruct,
        MetaKey::PostConstruct,
        MetaKey::GetIntercept,
        MetaKey::SetIntercept,
    ];

    /// Member name the key resolves against.
    pub const fn method_name(self) -> &'static str {
        match self {
            MetaKey::Constructor => "constructor",
            MetaKey::ToString => "opToString",
            MetaKey::Length => "opLength",
            MetaKey::Equals => "opEquals",
            MetaKey::Less => "opLess",
            MetaKey::LessEqual => "opLessEqual",
            MetaKey::Iterate => "opIterate",
            MetaKey::Call => "opCall",
            MetaKey::Negate => "opNeg",
            MetaKey::Add => "opAdd",
            MetaKey::Sub => "opSub",
            MetaKey::Mul => "opMul",
            MetaKey::Div => "opDiv",
            MetaKey::Mod => "opMod",
            MetaKey::Concat => "opConcat",
            MetaKey::PreConstruct => "onPreConstruct",
            MetaKey::PostConstruct => "onPostConstruct",
            MetaKey::GetIntercept => "onGet",
            MetaKey::SetIntercept => "onSet",
        }
    }

    /// Reverse lookup from a member name.
    pub fn from_method_name(name: &str) -> Option<MetaKey> {
        Self::CLASS_KEYS
            .iter()
            .chain(Self::ANNOTATION_KEYS.iter())
            .copied()
            .find(|key| key.method_name() == name)
    }

    /// Slot in a dense meta table.
    #[inline]
    pub fn slot(self) -> usize {
        u8::from(self) as usize
    }

    pub const fn is_annotation_hook(self) -> bool {
        matches!(
            self,
            MetaKey::PreConstruct
                | MetaKey::PostConstruct
                | MetaKey::GetIntercept
                | MetaKey::SetIntercept
        )
    }

    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            MetaKey::Add
                | MetaKey::Sub
                | MetaKey::Mul
                | MetaKey::Div
                | MetaKey::Mod
                | MetaKey::Concat
                | MetaKey::Equals
                | MetaKey::Less
                | MetaKey::LessEqual
        )
    }

    /// What the dispatch site casts the hook's result to.
    pub const fn expected_return(self) -> ExpectedReturn {
        match self {
            MetaKey::ToString => ExpectedReturn::String,
            MetaKey::Length => ExpectedReturn::Int,
            MetaKey::Equals | MetaKey::Less | MetaKey::LessEqual => ExpectedReturn::Bool,
            _ => ExpectedReturn::Any,
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}
