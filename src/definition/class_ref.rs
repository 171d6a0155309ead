//! Name-or-definition class references.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::assembly::Assembly;

use super::ClassDefinition;

enum Target {
    Unresolved(Rc<str>),
    Resolved(Rc<str>, Weak<ClassDefinition>),
}

/// A reference to a class that starts out as a name and is upgraded to the
/// definition on first successful lookup.
///
/// The upgrade is one-way: once resolved, later calls never consult the
/// assembly again. The resolved handle is weak; the assembly owns every
/// definition.
pub struct ClassRef {
    target: RefCell<Target>,
}

impl ClassRef {
    pub fn named(name: &str) -> Self {
        Self {
            target: RefCell::new(Target::Unresolved(Rc::from(name))),
        }
    }

    pub fn resolved(definition: &Rc<ClassDefinition>) -> Self {
        Self {
            target: RefCell::new(Target::Resolved(
                definition.name_rc().clone(),
                Rc::downgrade(definition),
            )),
        }
    }

    pub fn name(&self) -> Rc<str> {
        match &*self.target.borrow() {
            Target::Unresolved(name) | Target::Resolved(name, _) => name.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.target.borrow(), Target::Resolved(..))
    }

    /// Resolve against `assembly`, upgrading the reference on success.
    pub fn resolve(&self, assembly: &Assembly) -> Option<Rc<ClassDefinition>> {
        let name = match &*self.target.borrow() {
            Target::Resolved(_, definition) => return definition.upgrade(),
            Target::Unresolved(name) => name.clone(),
        };
        let definition = assembly.class(&name)?;
        *self.target.borrow_mut() = Target::Resolved(name, Rc::downgrade(&definition));
        Some(definition)
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.target.borrow() {
            Target::Unresolved(name) => write!(f, "ClassRef::Unresolved({name})"),
            Target::Resolved(name, _) => write!(f, "ClassRef::Resolved({name})"),
        }
    }
}
