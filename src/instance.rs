//! Instances and their inheritance chains.
//!
//! An [`Instance`] owns one [`InheritanceNode`] per level of its class
//! chain. Level 0 is the most derived class (the head); the last level is
//! the root base. Each node holds the level's host-object reference, one
//! eager declarations scope per access tier, and lazily built composite
//! scopes for the `All` and `Base` modes.
//!
//! ## Composite layout
//!
//! ```text
//! All  at level L, tier T: [Local decl of L if T = Local]
//!                          + for each level 0..n: [Internal if T >= Internal] + Global
//!                          + assembly root for T
//! Base at level L, tier T: for each level L+1..n: [Internal if T >= Internal] + Global
//!                          + assembly root for T
//! ```
//!
//! Scopes refer back to the instance weakly, so an instance is dropped with
//! its last strong handle.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ember_core::{Access, RuntimeError, ScopeMode, TypeHash};

use crate::assembly::Assembly;
use crate::definition::ClassDefinition;
use crate::native::{DynamicReference, NativeObject};
use crate::scope::{CompositeScope, DeclarationScope, VariableScope};

/// Per-level runtime state.
pub struct InheritanceNode {
    definition: Rc<ClassDefinition>,
    native: Rc<DynamicReference>,
    declarations: [Rc<DeclarationScope>; 3],
    composites: [[OnceCell<Rc<CompositeScope>>; 2]; 3],
}

impl InheritanceNode {
    pub fn definition(&self) -> &Rc<ClassDefinition> {
        &self.definition
    }

    pub fn native_reference(&self) -> &Rc<DynamicReference> {
        &self.native
    }

    /// The level's own members at one tier.
    pub fn declarations(&self, access: Access) -> &Rc<DeclarationScope> {
        &self.declarations[access.index()]
    }
}

/// A live object.
pub struct Instance {
    id: u64,
    definition: Rc<ClassDefinition>,
    assembly: Weak<Assembly>,
    levels: Vec<InheritanceNode>,
    annotations: RefCell<Vec<Rc<Instance>>>,
    initialized: Cell<bool>,
    host: RefCell<Option<NativeObject>>,
}

impl Instance {
    /// Lay out the chain of `definition`. Nothing is declared yet.
    pub(crate) fn new(assembly: &Rc<Assembly>, definition: &Rc<ClassDefinition>, id: u64) -> Rc<Self> {
        let chain: Vec<Rc<ClassDefinition>> = definition.ancestors().collect();
        let weak_assembly = Rc::downgrade(assembly);

        Rc::new_cyclic(|this: &Weak<Instance>| {
            let levels = chain
                .into_iter()
                .enumerate()
                .map(|(level, class)| {
                    let declarations = Access::ALL.map(|access| {
                        Rc::new(DeclarationScope::for_level(
                            weak_assembly.clone(),
                            access,
                            class.clone(),
                            this.clone(),
                            level,
                        ))
                    });
                    InheritanceNode {
                        native: Rc::new(DynamicReference::new(
                            class.name_rc().clone(),
                            class.described_type(),
                            this.clone(),
                        )),
                        definition: class,
                        declarations,
                        composites: Default::default(),
                    }
                })
                .collect();

            Instance {
                id,
                definition: definition.clone(),
                assembly: weak_assembly.clone(),
                levels,
                annotations: RefCell::new(Vec::new()),
                initialized: Cell::new(false),
                host: RefCell::new(None),
            }
        })
    }

    // === Identity ===

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The most derived class.
    pub fn definition(&self) -> &Rc<ClassDefinition> {
        &self.definition
    }

    pub fn class_name(&self) -> &str {
        self.definition.name()
    }

    pub fn assembly(&self) -> Option<Rc<Assembly>> {
        self.assembly.upgrade()
    }

    // === Chain ===

    /// Number of inheritance levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Levels, most derived first.
    pub fn levels(&self) -> &[InheritanceNode] {
        &self.levels
    }

    pub fn level(&self, level: usize) -> Option<&InheritanceNode> {
        self.levels.get(level)
    }

    /// Level at which the class with `hash` sits.
    pub fn level_of(&self, hash: TypeHash) -> Option<usize> {
        self.levels
            .iter()
            .position(|node| node.definition.hash() == hash)
    }

    // === Scopes ===

    /// One of the lookup scopes of `level`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn scope(
        &self,
        level: usize,
        access: Access,
        mode: ScopeMode,
    ) -> Option<Rc<dyn VariableScope>> {
        let node = self.levels.get(level)?;
        let slot = match mode {
            ScopeMode::Declarations => {
                return Some(node.declarations[access.index()].clone() as Rc<dyn VariableScope>);
            }
            ScopeMode::All => 0,
            ScopeMode::Base => 1,
        };
        let composite = node.composites[access.index()][slot]
            .get_or_init(|| Rc::new(self.build_composite(level, access, mode)))
            .clone();
        Some(composite as Rc<dyn VariableScope>)
    }

    /// Everything visible from outside at `access`: the whole chain, then the
    /// assembly roots.
    pub fn members(&self, access: Access) -> Rc<dyn VariableScope> {
        self.scope(0, access, ScopeMode::All)
            .unwrap_or_else(|| Rc::new(CompositeScope::new(Vec::new())) as Rc<dyn VariableScope>)
    }

    fn build_composite(&self, level: usize, access: Access, mode: ScopeMode) -> CompositeScope {
        let mut sources: Vec<Rc<dyn VariableScope>> = Vec::new();
        let start = match mode {
            ScopeMode::Base => level + 1,
            _ => {
                if access == Access::Local {
                    sources.push(self.levels[level].declarations[Access::Local.index()].clone());
                }
                0
            }
        };
        for node in self.levels.iter().skip(start) {
            if access >= Access::Internal {
                sources.push(node.declarations[Access::Internal.index()].clone());
            }
            sources.push(node.declarations[Access::Global.index()].clone());
        }
        if let Some(assembly) = self.assembly.upgrade() {
            sources.push(assembly.root_scope(access));
        }
        CompositeScope::new(sources)
    }

    // === Host objects ===

    /// Host object attached to the instance as a whole.
    pub fn host_object(&self) -> Option<NativeObject> {
        self.host.borrow().clone()
    }

    pub(crate) fn set_host_object(&self, object: NativeObject) {
        *self.host.borrow_mut() = Some(object);
    }

    pub fn native_reference(&self, level: usize) -> Result<&Rc<DynamicReference>, RuntimeError> {
        self.levels
            .get(level)
            .map(|node| &node.native)
            .ok_or_else(|| RuntimeError::UnresolvedNativeReference {
                class: self.class_name().to_string(),
            })
    }

    /// Bind the host object of one level, and of the instance if it has none.
    pub(crate) fn bind_native(&self, level: usize, object: NativeObject) {
        if let Some(node) = self.levels.get(level) {
            node.native.bind(object.clone());
        }
        let mut host = self.host.borrow_mut();
        if host.is_none() {
            *host = Some(object);
        }
    }

    // === Construction state ===

    /// Annotation instances attached during construction.
    pub fn annotations(&self) -> Vec<Rc<Instance>> {
        self.annotations.borrow().clone()
    }

    pub(crate) fn push_annotation(&self, annotation: Rc<Instance>) {
        self.annotations.borrow_mut().push(annotation);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub(crate) fn mark_initialized(&self) {
        self.initialized.set(true);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("class", &self.class_name())
            .field("depth", &self.levels.len())
            .field("initialized", &self.initialized.get())
            .finish()
    }
}
