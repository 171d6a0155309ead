//! Class type modes and member kinds.

use std::fmt;

/// How a class may be instantiated and inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeMode {
    /// Creatable and inheritable.
    #[default]
    Default,
    /// Creatable, not inheritable.
    Sealed,
    /// Only creatable through a derived class.
    Abstract,
    /// A single engine-managed instance; never created by scripts.
    Singleton,
    /// Attached to other declarations; created only by the construction protocol.
    Annotation,
}

impl TypeMode {
    /// Whether scripts may instantiate a class of this mode directly.
    pub const fn can_be_created(self) -> bool {
        matches!(self, TypeMode::Default | TypeMode::Sealed)
    }

    /// Whether a class of this mode may serve as the base of a class of mode `by`.
    ///
    /// Annotation classes only inherit from annotation classes and vice versa.
    pub const fn can_be_inherited_by(self, by: TypeMode) -> bool {
        match self {
            TypeMode::Sealed | TypeMode::Singleton => false,
            TypeMode::Annotation => matches!(by, TypeMode::Annotation),
            TypeMode::Default | TypeMode::Abstract => !matches!(by, TypeMode::Annotation),
        }
    }
}

impl fmt::Display for TypeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeMode::Default => write!(f, "default"),
            TypeMode::Sealed => write!(f, "sealed"),
            TypeMode::Abstract => write!(f, "abstract"),
            TypeMode::Singleton => write!(f, "singleton"),
            TypeMode::Annotation => write!(f, "annotation"),
        }
    }
}

/// Inheritance role of a function member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemberKind {
    #[default]
    Default,
    /// Replaces a base member of the same name.
    Override,
    /// Declared without a body; a derived class supplies it.
    Abstract,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creatable_modes() {
        assert!(TypeMode::Default.can_be_created());
        assert!(TypeMode::Sealed.can_be_created());
        assert!(!TypeMode::Abstract.can_be_created());
        assert!(!TypeMode::Singleton.can_be_created());
        assert!(!TypeMode::Annotation.can_be_created());
    }

    #[test]
    fn annotation_only_inherits_annotation() {
        assert!(TypeMode::Annotation.can_be_inherited_by(TypeMode::Annotation));
        assert!(!TypeMode::Annotation.can_be_inherited_by(TypeMode::Default));
        assert!(!TypeMode::Default.can_be_inherited_by(TypeMode::Annotation));
    }

    #[test]
    fn sealed_is_final() {
        assert!(!TypeMode::Sealed.can_be_inherited_by(TypeMode::Default));
        assert!(!TypeMode::Sealed.can_be_inherited_by(TypeMode::Sealed));
        assert!(TypeMode::Abstract.can_be_inherited_by(TypeMode::Sealed));
        assert!(TypeMode::Default.can_be_inherited_by(TypeMode::Abstract));
    }
}
