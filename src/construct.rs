//! The construction protocol.
//!
//! Construction turns a freshly laid out [`Instance`] into an initialized
//! one. Levels are processed base-first, so a derived initializer can read
//! the fields its bases have already assigned:
//!
//! 1. class annotations of the level are instantiated and attached;
//! 2. each field of the level is declared into its tier's declarations
//!    scope, receives its own annotations, and script fields run their
//!    initializer with the level as receiver.
//!
//! Then, unless disabled, the most derived constructor runs, framed by the
//! `onPreConstruct` / `onPostConstruct` hooks of every attached annotation.
//! A pre-construct hook may return `{ new_args = {...} }` to replace the
//! argument list seen by later hooks and by the constructor.
//!
//! Failures are wrapped in a single [`ConstructionError`] carrying the cause.
//! Nothing is rolled back.

use std::rc::Rc;

use bitflags::bitflags;
use ember_core::{
    ConstructionError, ExecutionContext, MetaKey, RuntimeError, ScopeMode, StackFrame,
    VariableError,
};

use crate::assembly::Assembly;
use crate::definition::{AnnotationUse, FieldDef, FieldKind};
use crate::dispatch::Dispatcher;
use crate::function::{Callable, Invocation};
use crate::instance::Instance;
use crate::scope::VariableScope;
use crate::value::Value;

bitflags! {
    /// Steps of the construction protocol.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CreateFlags: u32 {
        const DECLARE_NATIVE_FIELDS = 1 << 0;
        const DECLARE_SCRIPT_FIELDS = 1 << 1;
        const ASSIGN_SCRIPT_FIELDS = 1 << 2;
        const CREATE_ANNOTATIONS = 1 << 3;
        const CREATE_FIELD_ANNOTATIONS = 1 << 4;
        const CALL_CONSTRUCTOR = 1 << 5;
        /// Bypass the class mode's creation check.
        const ENFORCE_CREATION = 1 << 6;
        const MARK_AS_INITIALIZED = 1 << 7;
    }
}

impl Default for CreateFlags {
    fn default() -> Self {
        CreateFlags::all().difference(CreateFlags::ENFORCE_CREATION)
    }
}

/// How an instance is created.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    flags: CreateFlags,
    calling_context: Option<ExecutionContext>,
}

impl CreateOptions {
    /// Continue the call stack of `context` instead of starting a new one.
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.calling_context = Some(context);
        self
    }

    pub fn with_flags(mut self, flags: CreateFlags) -> Self {
        self.flags.insert(flags);
        self
    }

    pub fn without(mut self, flags: CreateFlags) -> Self {
        self.flags.remove(flags);
        self
    }

    pub fn enforced(self) -> Self {
        self.with_flags(CreateFlags::ENFORCE_CREATION)
    }

    /// Options for wrapping an existing host object: no constructor runs.
    pub fn wrapper() -> Self {
        Self::default()
            .without(CreateFlags::CALL_CONSTRUCTOR)
            .enforced()
    }

    pub fn flags(&self) -> CreateFlags {
        self.flags
    }

    pub fn has(&self, flag: CreateFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn calling_context(&self) -> Option<&ExecutionContext> {
        self.calling_context.as_ref()
    }
}

// ============================================================================
// Annotations
// ============================================================================

/// Instantiate each annotation use.
///
/// Arguments are evaluated with `receiver` as the invocation receiver; the
/// annotation classes are created with creation enforced.
pub(crate) fn create_annotations(
    assembly: &Rc<Assembly>,
    uses: &[AnnotationUse],
    target: &str,
    receiver: Option<(&Rc<Instance>, usize)>,
    context: &ExecutionContext,
) -> Result<Vec<Rc<Instance>>, ConstructionError> {
    let mut created = Vec::with_capacity(uses.len());
    for annotation in uses {
        let name = annotation.class_name();
        let class = annotation
            .class_ref()
            .resolve(assembly)
            .ok_or_else(|| ConstructionError::UnknownClass(name.to_string()))?;
        let wrap = |source: RuntimeError| ConstructionError::Annotation {
            target: target.to_string(),
            annotation: name.to_string(),
            source: Box::new(source),
        };

        let invocation = Invocation::new(
            assembly,
            context,
            receiver.map(|(instance, level)| (instance.clone(), level)),
            &[],
        );
        let args = annotation
            .args()
            .iter()
            .map(|arg| arg(&invocation))
            .collect::<Result<Vec<_>, _>>()
            .map_err(wrap)?;

        let options = CreateOptions::default()
            .enforced()
            .with_context(context.clone());
        let instance = assembly
            .instantiate(&class, options, args)
            .map_err(|err| wrap(err.into()))?;
        created.push(instance);
    }
    Ok(created)
}

// ============================================================================
// Protocol
// ============================================================================

/// Run the construction protocol on `instance`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn run(
    assembly: &Rc<Assembly>,
    instance: &Rc<Instance>,
    options: &CreateOptions,
    args: Vec<Value>,
) -> Result<(), ConstructionError> {
    if instance.is_initialized() {
        return Err(ConstructionError::AlreadyInitialized {
            class: instance.class_name().to_string(),
            id: instance.id(),
        });
    }
    let context = options
        .calling_context()
        .cloned()
        .unwrap_or_else(|| assembly.new_context());

    for level in (0..instance.depth()).rev() {
        initialize_level(assembly, instance, level, options, &context)?;
    }

    if options.has(CreateFlags::CALL_CONSTRUCTOR) {
        call_constructor(assembly, instance, args, &context).map_err(|source| {
            ConstructionError::Constructor {
                class: instance.class_name().to_string(),
                source: Box::new(source),
            }
        })?;
    }

    if options.has(CreateFlags::MARK_AS_INITIALIZED) {
        instance.mark_initialized();
    }
    tracing::debug!(
        class = instance.class_name(),
        id = instance.id(),
        levels = instance.depth(),
        "constructed instance"
    );
    Ok(())
}

fn initialize_level(
    assembly: &Rc<Assembly>,
    instance: &Rc<Instance>,
    level: usize,
    options: &CreateOptions,
    context: &ExecutionContext,
) -> Result<(), ConstructionError> {
    let Some(node) = instance.level(level) else {
        return Ok(());
    };
    let class = node.definition().clone();

    if options.has(CreateFlags::CREATE_ANNOTATIONS) && !class.annotations().is_empty() {
        let created = create_annotations(
            assembly,
            class.annotations(),
            class.name(),
            Some((instance, level)),
            context,
        )?;
        for annotation in created {
            instance.push_annotation(annotation);
        }
    }

    for field in class.fields() {
        let declare = if field.is_native() {
            CreateFlags::DECLARE_NATIVE_FIELDS
        } else {
            CreateFlags::DECLARE_SCRIPT_FIELDS
        };
        if !options.has(declare) {
            continue;
        }
        let scope = node.declarations(field.access());
        let declaration = |source: VariableError| ConstructionError::Declaration {
            class: class.name().to_string(),
            field: field.name().to_string(),
            source,
        };

        match field.kind() {
            FieldKind::Native(accessor) => scope
                .declare_native(
                    field.name(),
                    field.ty().clone(),
                    accessor.clone(),
                    node.native_reference().clone(),
                )
                .map_err(declaration)?,
            FieldKind::Script { .. } => scope
                .declare(field.name(), field.ty().clone())
                .map_err(declaration)?,
        }

        if options.has(CreateFlags::CREATE_FIELD_ANNOTATIONS) && !field.annotations().is_empty() {
            let target = format!("{}.{}", class.name(), field.name());
            let created = create_annotations(
                assembly,
                field.annotations(),
                &target,
                Some((instance, level)),
                context,
            )?;
            scope
                .assign_annotations(field.name(), created)
                .map_err(declaration)?;
        }

        if options.has(CreateFlags::ASSIGN_SCRIPT_FIELDS) {
            initialize_field(assembly, instance, level, field, context)?;
        }
    }
    Ok(())
}

fn initialize_field(
    assembly: &Rc<Assembly>,
    instance: &Rc<Instance>,
    level: usize,
    field: &FieldDef,
    context: &ExecutionContext,
) -> Result<(), ConstructionError> {
    let FieldKind::Script {
        initializer: Some(initializer),
    } = field.kind()
    else {
        return Ok(());
    };
    let failed = |source: RuntimeError| ConstructionError::Initializer {
        class: field
            .owner()
            .map(|o| o.name().to_string())
            .unwrap_or_else(|| instance.class_name().to_string()),
        field: field.name().to_string(),
        source: Box::new(source),
    };

    let invocation = Invocation::new(assembly, context, Some((instance.clone(), level)), &[]);
    let value = initializer(&invocation).map_err(failed)?;
    let scope = instance
        .scope(level, field.access(), ScopeMode::Declarations)
        .ok_or_else(|| failed(RuntimeError::InstanceDropped(field.name().to_string())))?;
    scope.assign(field.name(), value).map_err(failed)
}

/// The most derived constructor, or a placeholder when the chain has none.
fn resolve_constructor(
    assembly: &Rc<Assembly>,
    instance: &Rc<Instance>,
) -> Result<Rc<Callable>, RuntimeError> {
    let definition = instance.definition();
    let Some(link) = definition.meta(MetaKey::Constructor) else {
        return Ok(Rc::new(Callable::placeholder(
            definition.name(),
            Rc::downgrade(assembly),
        )));
    };
    let level = instance.level_of(link.owner).unwrap_or(0);
    let scope = instance
        .scope(level, link.access, ScopeMode::Declarations)
        .ok_or_else(|| RuntimeError::InstanceDropped(link.name.to_string()))?;
    match scope.get(link.name)? {
        Value::Function(ctor) => Ok(ctor),
        other => Err(RuntimeError::NotCallable(other.type_name())),
    }
}

fn call_constructor(
    assembly: &Rc<Assembly>,
    instance: &Rc<Instance>,
    mut args: Vec<Value>,
    context: &ExecutionContext,
) -> Result<(), RuntimeError> {
    let constructor = resolve_constructor(assembly, instance)?;
    let annotations = instance.annotations();
    let dispatcher = Dispatcher::new(assembly, context);

    {
        let _frame = context.push(StackFrame::synthetic(format!(
            "{}.onPreConstruct",
            instance.class_name()
        )))?;
        for annotation in &annotations {
            let hook_args = vec![Value::Instance(instance.clone()), Value::list(args.clone())];
            match dispatcher.hook(annotation, MetaKey::PreConstruct, hook_args)? {
                None | Some(Value::Null) => {}
                Some(Value::Table(result)) => {
                    let replacement = result.borrow().get("new_args");
                    match replacement.as_table() {
                        Some(list) => args = list.borrow().sequence(),
                        None if replacement.is_null() => {}
                        None => tracing::warn!(
                            annotation = annotation.class_name(),
                            found = %replacement.type_name(),
                            "new_args is not a table; arguments unchanged"
                        ),
                    }
                }
                Some(other) => tracing::warn!(
                    annotation = annotation.class_name(),
                    found = %other.type_name(),
                    "onPreConstruct result ignored"
                ),
            }
        }
    }

    constructor.call(args.clone(), context)?;

    for annotation in &annotations {
        let hook_args = vec![Value::Instance(instance.clone()), Value::list(args.clone())];
        dispatcher.hook(annotation, MetaKey::PostConstruct, hook_args)?;
    }
    Ok(())
}
