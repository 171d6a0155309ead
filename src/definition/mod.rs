//! Class definitions.
//!
//! A [`ClassDefinition`] is the immutable-after-build metadata of a class:
//! its name, [`TypeMode`], base reference, declared fields, functions and
//! annotations, and the host types it is paired with. Definitions are built
//! with a [`ClassBuilder`] and owned by an [`Assembly`].
//!
//! Lookups walk from a class toward its bases. Walks carry a visited set, so
//! a malformed circular chain terminates instead of looping.

mod builder;
mod class_ref;
mod member;
mod meta_table;

use std::cell::OnceCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ember_core::{MetaKey, TypeHash, TypeMode};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::assembly::Assembly;
use crate::native::NativeType;

pub use builder::ClassBuilder;
pub use class_ref::ClassRef;
pub use member::{
    AnnotationUse, CONSTRUCTOR, FieldDef, FieldKind, FunctionBody, FunctionDef, Owner,
};
pub use meta_table::{MetaLink, MetaTable};

/// Metadata for one class.
pub struct ClassDefinition {
    name: Rc<str>,
    hash: TypeHash,
    type_mode: TypeMode,
    base: Option<ClassRef>,
    fields: Vec<Rc<FieldDef>>,
    field_index: FxHashMap<Rc<str>, usize>,
    functions: FxHashMap<Rc<str>, Rc<FunctionDef>>,
    annotations: Vec<AnnotationUse>,
    described_type: Option<NativeType>,
    descriptor_type: Option<NativeType>,
    meta: OnceCell<MetaTable>,
    assembly: Weak<Assembly>,
}

impl ClassDefinition {
    // === Identity ===

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> &Rc<str> {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn type_mode(&self) -> TypeMode {
        self.type_mode
    }

    /// Host type whose objects instances of this class wrap.
    pub fn described_type(&self) -> Option<NativeType> {
        self.described_type
    }

    /// Host type that describes this class to the host.
    pub fn descriptor_type(&self) -> Option<NativeType> {
        self.descriptor_type
    }

    pub fn assembly(&self) -> Option<Rc<Assembly>> {
        self.assembly.upgrade()
    }

    // === Declarations ===

    pub fn base_ref(&self) -> Option<&ClassRef> {
        self.base.as_ref()
    }

    /// The resolved base class, if any.
    pub fn base(&self) -> Option<Rc<ClassDefinition>> {
        let base = self.base.as_ref()?;
        let assembly = self.assembly.upgrade()?;
        base.resolve(&assembly)
    }

    /// Fields declared on this class, in declaration order.
    pub fn fields(&self) -> &[Rc<FieldDef>] {
        &self.fields
    }

    /// A field declared on this class.
    pub fn field(&self, name: &str) -> Option<&Rc<FieldDef>> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    /// A function declared on this class.
    pub fn function(&self, name: &str) -> Option<&Rc<FunctionDef>> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Rc<FunctionDef>> {
        self.functions.values()
    }

    pub fn annotations(&self) -> &[AnnotationUse] {
        &self.annotations
    }

    // === Type mode ===

    pub fn can_be_created(&self) -> bool {
        self.type_mode.can_be_created()
    }

    pub fn can_be_inherited_by(&self, by: &ClassDefinition) -> bool {
        self.type_mode.can_be_inherited_by(by.type_mode)
    }

    // === Hierarchy ===

    /// This class followed by its bases, most derived first.
    pub fn ancestors(self: &Rc<Self>) -> Ancestors {
        Ancestors::new(Some(self.clone()))
    }

    /// Whether `name` is a strict ancestor. A class does not extend itself.
    pub fn does_extend(&self, name: &str) -> bool {
        let mut walk = Ancestors::new(self.base());
        walk.seen.insert(self.hash);
        walk.any(|ancestor| ancestor.name() == name)
    }

    /// Number of levels in the chain, this class included.
    pub fn depth(self: &Rc<Self>) -> usize {
        self.ancestors().count()
    }

    /// First function named `name` accepted by `validator`, walking toward
    /// the bases unless `declared_only`.
    pub fn try_get_function<F>(
        self: &Rc<Self>,
        name: &str,
        declared_only: bool,
        validator: F,
    ) -> Option<Rc<FunctionDef>>
    where
        F: Fn(&FunctionDef) -> bool,
    {
        if declared_only {
            return self.function(name).filter(|f| validator(f)).cloned();
        }
        self.ancestors().find_map(|class| {
            class
                .function(name)
                .filter(|f| validator(f))
                .cloned()
        })
    }

    /// Field counterpart of [`try_get_function`](Self::try_get_function).
    pub fn try_get_field<F>(
        self: &Rc<Self>,
        name: &str,
        declared_only: bool,
        validator: F,
    ) -> Option<Rc<FieldDef>>
    where
        F: Fn(&FieldDef) -> bool,
    {
        if declared_only {
            return self.field(name).filter(|f| validator(f)).cloned();
        }
        self.ancestors()
            .find_map(|class| class.field(name).filter(|f| validator(f)).cloned())
    }

    // === Meta-functions ===

    /// The meta-function table, built on first access.
    pub fn meta_table(self: &Rc<Self>) -> &MetaTable {
        self.meta.get_or_init(|| MetaTable::build(self))
    }

    pub fn meta(self: &Rc<Self>, key: MetaKey) -> Option<&MetaLink> {
        self.meta_table().get(key)
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("type_mode", &self.type_mode)
            .field("base", &self.base)
            .field("fields", &self.fields.len())
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

/// Walks a class chain toward its root, stopping at the first repeat.
pub struct Ancestors {
    next: Option<Rc<ClassDefinition>>,
    seen: FxHashSet<TypeHash>,
}

impl Ancestors {
    fn new(start: Option<Rc<ClassDefinition>>) -> Self {
        Self {
            next: start,
            seen: FxHashSet::default(),
        }
    }
}

impl Iterator for Ancestors {
    type Item = Rc<ClassDefinition>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if !self.seen.insert(current.hash) {
            return None;
        }
        self.next = current.base();
        Some(current)
    }
}
