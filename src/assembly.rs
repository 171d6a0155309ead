//! The assembly: owner of class definitions and assembly-wide state.
//!
//! An [`Assembly`] holds every registered [`ClassDefinition`], the global
//! functions, the three root scopes every instance composite ends in, the
//! marshaler, the runtime configuration and the default execution context.
//! It hands out instance ids and drives creation and construction.
//!
//! Definitions, instances and scopes refer back to the assembly weakly; the
//! host keeps the assembly alive through the `Rc` returned by
//! [`Assembly::new`].

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ember_core::{
    Access, ConstructionError, ExecutionContext, RegistrationError, RuntimeError, TypeMode,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::RuntimeConfig;
use crate::construct::{self, CreateFlags, CreateOptions};
use crate::definition::{AnnotationUse, ClassBuilder, ClassDefinition, FunctionDef};
use crate::dispatch::Dispatcher;
use crate::instance::Instance;
use crate::native::{DefaultMarshaler, Marshaler, NativeObject};
use crate::scope::{CompositeScope, DeclarationScope, VariableScope};
use crate::value::{Value, ValueType};

/// Registry and runtime root of the object model.
pub struct Assembly {
    classes: RefCell<FxHashMap<Rc<str>, Rc<ClassDefinition>>>,
    order: RefCell<Vec<Rc<ClassDefinition>>>,
    by_host: RefCell<FxHashMap<TypeId, Rc<ClassDefinition>>>,
    functions: RefCell<FxHashMap<Rc<str>, Rc<FunctionDef>>>,
    roots: [Rc<DeclarationScope>; 3],
    chains: [Rc<CompositeScope>; 3],
    marshaler: Box<dyn Marshaler>,
    config: RuntimeConfig,
    context: ExecutionContext,
    next_id: Cell<u64>,
    this: Weak<Assembly>,
}

impl Assembly {
    /// An empty assembly using the [`DefaultMarshaler`].
    pub fn new(config: RuntimeConfig) -> Rc<Self> {
        Self::with_marshaler(config, DefaultMarshaler)
    }

    pub fn with_marshaler(config: RuntimeConfig, marshaler: impl Marshaler + 'static) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Assembly>| {
            let roots =
                Access::ALL.map(|access| Rc::new(DeclarationScope::for_assembly(this.clone(), access)));
            // A root chain at tier T probes T first, then each less restrictive tier.
            let chains = Access::ALL.map(|access| {
                let sources = Access::ALL
                    .iter()
                    .rev()
                    .filter(|tier| access.admits(**tier))
                    .map(|tier| roots[tier.index()].clone() as Rc<dyn VariableScope>)
                    .collect();
                Rc::new(CompositeScope::new(sources))
            });

            Assembly {
                classes: RefCell::new(FxHashMap::default()),
                order: RefCell::new(Vec::new()),
                by_host: RefCell::new(FxHashMap::default()),
                functions: RefCell::new(FxHashMap::default()),
                roots,
                chains,
                marshaler: Box::new(marshaler),
                context: config.new_context(),
                config,
                next_id: Cell::new(1),
                this: this.clone(),
            }
        })
    }

    // === Accessors ===

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The default execution context.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// A fresh execution context honoring the configuration.
    pub fn new_context(&self) -> ExecutionContext {
        self.config.new_context()
    }

    pub fn marshaler(&self) -> &dyn Marshaler {
        self.marshaler.as_ref()
    }

    pub fn dispatcher<'a>(self: &'a Rc<Self>, context: &'a ExecutionContext) -> Dispatcher<'a> {
        Dispatcher::new(self, context)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Build and register a class.
    ///
    /// The base does not need to exist yet; [`validate`](Self::validate)
    /// reports bases that never appeared. A base that is already registered
    /// must accept the new class as a derived class.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn define(&self, builder: ClassBuilder) -> Result<Rc<ClassDefinition>, RegistrationError> {
        let name = builder.name().to_string();
        if self.classes.borrow().contains_key(name.as_str()) {
            return Err(RegistrationError::DuplicateClass(name));
        }
        if let Some(host) = builder.described_type()
            && let Some(existing) = self.by_host.borrow().get(&host.id())
        {
            return Err(RegistrationError::DuplicateHostType {
                host: host.name().to_string(),
                class: existing.name().to_string(),
            });
        }
        self.check_cycle(&name, builder.base_name())?;

        let definition = builder.build(self.this.clone())?;
        if let Some(base) = definition.base() {
            check_inheritable(&definition, &base)?;
        }

        self.classes
            .borrow_mut()
            .insert(definition.name_rc().clone(), definition.clone());
        self.order.borrow_mut().push(definition.clone());
        if let Some(host) = definition.described_type() {
            self.by_host.borrow_mut().insert(host.id(), definition.clone());
        }
        let base = definition.base_ref().map(|b| b.name());
        tracing::debug!(
            class = definition.name(),
            mode = %definition.type_mode(),
            base = base.as_deref(),
            fields = definition.fields().len(),
            "registered class"
        );
        Ok(definition)
    }

    /// Reject a base chain that would lead back to `name`.
    fn check_cycle(&self, name: &str, base: Option<&str>) -> Result<(), RegistrationError> {
        let classes = self.classes.borrow();
        let mut seen = FxHashSet::default();
        let mut next: Option<Rc<str>> = base.map(Rc::from);
        while let Some(current) = next {
            if &*current == name || !seen.insert(current.clone()) {
                return Err(RegistrationError::CircularInheritance(name.to_string()));
            }
            next = classes
                .get(&current)
                .and_then(|class| class.base_ref().map(|b| b.name()));
        }
        Ok(())
    }

    /// Register an assembly-wide function, reachable from every root scope
    /// admitting its tier.
    pub fn define_function(&self, function: FunctionDef) -> Result<Rc<FunctionDef>, RegistrationError> {
        let mut functions = self.functions.borrow_mut();
        if functions.contains_key(function.name()) {
            return Err(RegistrationError::DuplicateFunction(function.name().to_string()));
        }
        let function = Rc::new(function);
        functions.insert(Rc::from(function.name()), function.clone());
        Ok(function)
    }

    /// Check every registered class: bases exist and accept their derived
    /// classes, and annotation uses name annotation classes.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        let classes = self.classes();
        for class in &classes {
            if let Some(base_ref) = class.base_ref() {
                let base = class.base().ok_or_else(|| RegistrationError::UnknownBase {
                    class: class.name().to_string(),
                    base: base_ref.name().to_string(),
                })?;
                check_inheritable(class, &base)?;
            }
            self.check_annotations(class.name(), class.annotations())?;
            for field in class.fields() {
                let target = format!("{}.{}", class.name(), field.name());
                self.check_annotations(&target, field.annotations())?;
            }
            for function in class.functions() {
                self.check_annotations(&function.label(), function.annotations())?;
            }
        }
        let functions: Vec<Rc<FunctionDef>> = self.functions.borrow().values().cloned().collect();
        for function in functions {
            self.check_annotations(&function.label(), function.annotations())?;
        }
        Ok(())
    }

    fn check_annotations(&self, target: &str, uses: &[AnnotationUse]) -> Result<(), RegistrationError> {
        for annotation in uses {
            let class = annotation.class_ref().resolve(self).ok_or_else(|| {
                RegistrationError::UnknownAnnotation {
                    target: target.to_string(),
                    class: annotation.class_name().to_string(),
                }
            })?;
            if class.type_mode() != TypeMode::Annotation {
                return Err(RegistrationError::NotAnAnnotation {
                    target: target.to_string(),
                    class: class.name().to_string(),
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn class(&self, name: &str) -> Option<Rc<ClassDefinition>> {
        self.classes.borrow().get(name).cloned()
    }

    /// The class paired with host type `host`.
    pub fn class_for_host(&self, host: TypeId) -> Option<Rc<ClassDefinition>> {
        self.by_host.borrow().get(&host).cloned()
    }

    /// Registered classes in registration order.
    pub fn classes(&self) -> Vec<Rc<ClassDefinition>> {
        self.order.borrow().clone()
    }

    pub fn function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.borrow().get(name).cloned()
    }

    /// Assembly-wide variables visible at `access`, most restrictive tier
    /// first.
    pub fn root_scope(&self, access: Access) -> Rc<dyn VariableScope> {
        self.chains[access.index()].clone()
    }

    /// The root store of exactly one tier.
    pub fn root_declarations(&self, access: Access) -> &Rc<DeclarationScope> {
        &self.roots[access.index()]
    }

    /// Whether a slot of type `target` may hold a value of type `source`.
    pub fn is_type_compatible(&self, target: &ValueType, source: &ValueType) -> bool {
        match (target, source) {
            (ValueType::Any, _) => true,
            _ if target == source => true,
            (ValueType::Float, ValueType::Int) => true,
            (_, ValueType::Null) => target.is_reference(),
            (ValueType::Class(target), ValueType::Class(source)) => self
                .class(source)
                .is_some_and(|class| class.does_extend(target)),
            (ValueType::Native(host), ValueType::Class(source)) => self
                .class(source)
                .and_then(|class| class.described_type())
                .is_some_and(|described| described == *host),
            _ => false,
        }
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Lay out a new, unconstructed instance of `definition`.
    pub fn new_instance(
        self: &Rc<Self>,
        definition: &Rc<ClassDefinition>,
        options: &CreateOptions,
    ) -> Result<Rc<Instance>, ConstructionError> {
        if !options.has(CreateFlags::ENFORCE_CREATION) && !definition.can_be_created() {
            return Err(ConstructionError::NotCreatable {
                class: definition.name().to_string(),
                mode: definition.type_mode(),
            });
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let instance = Instance::new(self, definition, id);
        tracing::trace!(class = definition.name(), id, "allocated instance");
        Ok(instance)
    }

    /// Run the construction protocol on `instance`.
    pub fn construct(
        self: &Rc<Self>,
        instance: &Rc<Instance>,
        options: CreateOptions,
        args: Vec<Value>,
    ) -> Result<(), ConstructionError> {
        construct::run(self, instance, &options, args)
    }

    /// Create and construct an instance of `definition`.
    pub fn instantiate(
        self: &Rc<Self>,
        definition: &Rc<ClassDefinition>,
        options: CreateOptions,
        args: Vec<Value>,
    ) -> Result<Rc<Instance>, ConstructionError> {
        let instance = self.new_instance(definition, &options)?;
        self.construct(&instance, options, args)?;
        Ok(instance)
    }

    /// Create and construct an instance of the class named `class`.
    pub fn create(
        self: &Rc<Self>,
        class: &str,
        options: CreateOptions,
        args: Vec<Value>,
    ) -> Result<Rc<Instance>, ConstructionError> {
        let definition = self
            .class(class)
            .ok_or_else(|| ConstructionError::UnknownClass(class.to_string()))?;
        self.instantiate(&definition, options, args)
    }

    /// Script value for a host object.
    ///
    /// Objects of a host type paired with a class become a wrapper instance:
    /// the object is bound as the instance's host object and no constructor
    /// runs. Other objects stay opaque native values.
    pub fn wrap_native(self: &Rc<Self>, object: NativeObject) -> Result<Value, RuntimeError> {
        let Some(definition) = self.class_for_host(object.native_type().id()) else {
            return Ok(Value::Native(object));
        };
        let options = CreateOptions::wrapper();
        let instance = self.new_instance(&definition, &options)?;
        instance.bind_native(0, object);
        self.construct(&instance, options, Vec::new())?;
        tracing::trace!(
            class = definition.name(),
            id = instance.id(),
            "wrapped host object"
        );
        Ok(Value::Instance(instance))
    }
}

fn check_inheritable(
    class: &ClassDefinition,
    base: &ClassDefinition,
) -> Result<(), RegistrationError> {
    if base.can_be_inherited_by(class) {
        return Ok(());
    }
    Err(RegistrationError::NotInheritable {
        class: class.name().to_string(),
        base: base.name().to_string(),
        mode: base.type_mode(),
    })
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("classes", &self.classes.borrow().len())
            .field("functions", &self.functions.borrow().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
