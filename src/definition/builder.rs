//! Fluent construction of class definitions.

use std::cell::OnceCell;
use std::rc::{Rc, Weak};

use ember_core::{RegistrationError, TypeHash, TypeMode};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::assembly::Assembly;
use crate::native::NativeType;

use super::{AnnotationUse, CONSTRUCTOR, ClassDefinition, ClassRef, FieldDef, FunctionDef, Owner};

/// Collects the declarations of a class before it is registered.
///
/// # Example
///
/// ```
/// use ember::{Assembly, ClassBuilder, FieldDef, RuntimeConfig, ValueType};
///
/// let assembly = Assembly::new(RuntimeConfig::default());
/// let animal = assembly
///     .define(ClassBuilder::new("Animal").with_field(FieldDef::script("name", ValueType::String)))
///     .unwrap();
/// assert_eq!(animal.fields().len(), 1);
/// ```
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    mode: TypeMode,
    base: Option<String>,
    fields: Vec<FieldDef>,
    functions: Vec<FunctionDef>,
    annotations: Vec<AnnotationUse>,
    described: Option<NativeType>,
    descriptor: Option<NativeType>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: TypeMode::Default,
            base: None,
            fields: Vec::new(),
            functions: Vec::new(),
            annotations: Vec::new(),
            described: None,
            descriptor: None,
        }
    }

    pub fn with_mode(mut self, mode: TypeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_function(mut self, function: FunctionDef) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationUse) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Pair instances with host objects of type `T`.
    pub fn describes<T: 'static>(mut self) -> Self {
        self.described = Some(NativeType::of::<T>());
        self
    }

    /// Host type describing this class.
    pub fn with_descriptor<T: 'static>(mut self) -> Self {
        self.descriptor = Some(NativeType::of::<T>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub(crate) fn described_type(&self) -> Option<NativeType> {
        self.described
    }

    /// Validate the declarations and freeze them into a definition.
    ///
    /// A class with a base and no constructor of its own receives a
    /// pass-through constructor.
    pub(crate) fn build(
        mut self,
        assembly: Weak<Assembly>,
    ) -> Result<Rc<ClassDefinition>, RegistrationError> {
        let mut seen = FxHashSet::default();
        for name in self
            .fields
            .iter()
            .map(FieldDef::name)
            .chain(self.functions.iter().map(FunctionDef::name))
        {
            if !seen.insert(name.to_string()) {
                return Err(RegistrationError::DuplicateMember {
                    class: self.name.clone(),
                    member: name.to_string(),
                });
            }
        }
        if self.base.is_some() && !seen.contains(CONSTRUCTOR) {
            self.functions.push(FunctionDef::pass_through());
        }

        let name: Rc<str> = Rc::from(self.name);
        let hash = TypeHash::from_name(&name);
        let definition = Rc::new_cyclic(|weak: &Weak<ClassDefinition>| {
            let owner = Owner::new(name.clone(), weak.clone());

            let fields: Vec<Rc<FieldDef>> = self
                .fields
                .into_iter()
                .map(|f| Rc::new(f.owned_by(owner.clone())))
                .collect();
            let field_index: FxHashMap<Rc<str>, usize> = fields
                .iter()
                .enumerate()
                .map(|(i, f)| (Rc::from(f.name()), i))
                .collect();
            let functions = self
                .functions
                .into_iter()
                .map(|f| {
                    let f = f.owned_by(owner.clone());
                    (Rc::from(f.name()), Rc::new(f))
                })
                .collect();

            ClassDefinition {
                name: name.clone(),
                hash,
                type_mode: self.mode,
                base: self.base.as_deref().map(ClassRef::named),
                fields,
                field_index,
                functions,
                annotations: self.annotations,
                described_type: self.described,
                descriptor_type: self.descriptor,
                meta: OnceCell::new(),
                assembly,
            }
        });
        Ok(definition)
    }
}
