//! Callable values.
//!
//! A [`Callable`] is a function definition turned into a value: the
//! definition, the inheritance level it is bound to, and the assembly it
//! runs against. Script bodies receive an [`Invocation`] giving them their
//! arguments, their receiver's scopes and the active execution context.

use std::fmt;
use std::rc::{Rc, Weak};

use ember_core::{
    Access, ExecutionContext, MetaKey, NativeError, RuntimeError, ScopeMode, StackFrame,
};

use crate::assembly::Assembly;
use crate::construct::CreateOptions;
use crate::definition::{FunctionBody, FunctionDef};
use crate::dispatch::Dispatcher;
use crate::instance::Instance;
use crate::native::NativeObject;
use crate::scope::VariableScope;
use crate::value::{Value, ValueType};

/// Body of a script function.
pub type ScriptFn = Rc<dyn Fn(&Invocation<'_>) -> Result<Value, RuntimeError>>;

/// The instance level a callable runs against.
#[derive(Debug, Clone)]
pub(crate) struct Receiver {
    instance: Weak<Instance>,
    level: usize,
}

impl Receiver {
    pub(crate) fn new(instance: &Rc<Instance>, level: usize) -> Self {
        Self {
            instance: Rc::downgrade(instance),
            level,
        }
    }
}

/// How a callable runs, derived from its definition's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Script,
    NativeMethod,
    NativeConstructor,
    PassThrough,
    Abstract,
    /// Stand-in constructor for classes without one.
    Placeholder,
}

/// A function value.
pub struct Callable {
    function: Option<Rc<FunctionDef>>,
    label: String,
    receiver: Option<Receiver>,
    assembly: Weak<Assembly>,
}

impl Callable {
    pub(crate) fn new(
        function: Rc<FunctionDef>,
        receiver: Option<Receiver>,
        assembly: Weak<Assembly>,
    ) -> Self {
        Self {
            label: function.label(),
            function: Some(function),
            receiver,
            assembly,
        }
    }

    /// A constructor that does nothing.
    pub(crate) fn placeholder(class: &str, assembly: Weak<Assembly>) -> Self {
        Self {
            function: None,
            label: format!("{class}.constructor"),
            receiver: None,
            assembly,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn function(&self) -> Option<&Rc<FunctionDef>> {
        self.function.as_ref()
    }

    pub fn kind(&self) -> CallableKind {
        match self.function.as_deref().map(FunctionDef::body) {
            None => CallableKind::Placeholder,
            Some(FunctionBody::Script(_)) => CallableKind::Script,
            Some(FunctionBody::NativeMethod(_)) => CallableKind::NativeMethod,
            Some(FunctionBody::NativeConstructor(_)) => CallableKind::NativeConstructor,
            Some(FunctionBody::PassThrough) => CallableKind::PassThrough,
            Some(FunctionBody::Abstract) => CallableKind::Abstract,
        }
    }

    /// The bound instance, if it is still alive.
    pub fn receiver(&self) -> Option<Rc<Instance>> {
        self.receiver.as_ref()?.instance.upgrade()
    }

    /// The bound inheritance level.
    pub fn level(&self) -> Option<usize> {
        self.receiver.as_ref().map(|r| r.level)
    }

    fn frame(&self) -> StackFrame {
        match &self.function {
            Some(function) if function.is_constructor() => StackFrame::constructor(
                function.owner().map(|o| o.name()).unwrap_or(self.label.as_str()),
            ),
            Some(_) => StackFrame::function(&self.label),
            None => StackFrame::synthetic(&self.label),
        }
    }

    fn bound(&self) -> Result<Option<(Rc<Instance>, usize)>, RuntimeError> {
        match &self.receiver {
            None => Ok(None),
            Some(receiver) => receiver
                .instance
                .upgrade()
                .map(|instance| Some((instance, receiver.level)))
                .ok_or_else(|| RuntimeError::InstanceDropped(self.label.clone())),
        }
    }

    fn require_receiver(&self) -> Result<(Rc<Instance>, usize), RuntimeError> {
        self.bound()?
            .ok_or_else(|| RuntimeError::UnresolvedNativeReference {
                class: self.label.clone(),
            })
    }

    /// Call with `args`, pushing a frame onto `context` for the duration.
    pub fn call(&self, args: Vec<Value>, context: &ExecutionContext) -> Result<Value, RuntimeError> {
        let assembly = self
            .assembly
            .upgrade()
            .ok_or(RuntimeError::AssemblyDropped)?;
        let _frame = context.push(self.frame())?;

        let Some(function) = &self.function else {
            return Ok(Value::Null);
        };

        let result = match function.body() {
            FunctionBody::Script(body) => {
                let invocation = Invocation::new(&assembly, context, self.bound()?, &args);
                body(&invocation)?
            }
            FunctionBody::NativeMethod(method) => {
                let (instance, level) = self.require_receiver()?;
                let host = instance.native_reference(level)?.resolve()?;
                let args = marshal_args(&assembly, method.params(), &args)?;
                let raw = method.invoke(&host, &args)?;
                assembly
                    .marshaler()
                    .from_native(&assembly, method.returns(), raw)?
            }
            FunctionBody::NativeConstructor(ctor) => {
                let (instance, level) = self.require_receiver()?;
                let args = marshal_args(&assembly, ctor.params(), &args)?;
                let object = ctor.invoke(&args)?;
                instance.bind_native(level, object);
                Value::Null
            }
            FunctionBody::PassThrough => {
                let (instance, level) = self.require_receiver()?;
                forward_to_base(&instance, level, args, context)?
            }
            FunctionBody::Abstract => return Err(RuntimeError::AbstractCall(self.label.clone())),
        };

        if !assembly.config().check_return_types() {
            return Ok(result);
        }
        function
            .returns()
            .coerce(result)
            .map_err(|value| RuntimeError::TypeMismatch {
                expected: function.returns().to_string(),
                actual: value.type_name(),
            })
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("label", &self.label)
            .field("kind", &self.kind())
            .field("level", &self.level())
            .finish()
    }
}

fn marshal_args(
    assembly: &Rc<Assembly>,
    params: &[ValueType],
    args: &[Value],
) -> Result<Vec<NativeObject>, RuntimeError> {
    if params.len() != args.len() {
        return Err(NativeError::ArgumentCount {
            expected: params.len(),
            actual: args.len(),
        }
        .into());
    }
    params
        .iter()
        .zip(args)
        .map(|(ty, arg)| {
            assembly
                .marshaler()
                .to_native(arg, ty)
                .map_err(RuntimeError::from)
        })
        .collect()
}

/// Run the nearest base constructor below `level`; nothing to do without one.
fn forward_to_base(
    instance: &Rc<Instance>,
    level: usize,
    args: Vec<Value>,
    context: &ExecutionContext,
) -> Result<Value, RuntimeError> {
    let Some(base) = instance.level(level + 1) else {
        return Ok(Value::Null);
    };
    let Some(link) = base.definition().meta(MetaKey::Constructor) else {
        return Ok(Value::Null);
    };
    let target = instance.level_of(link.owner).unwrap_or(level + 1);
    let scope = instance
        .scope(target, link.access, ScopeMode::Declarations)
        .ok_or(RuntimeError::InstanceDropped(link.name.to_string()))?;
    match scope.get(link.name)? {
        Value::Function(ctor) => ctor.call(args, context),
        other => Err(RuntimeError::NotCallable(other.type_name())),
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// What a script body sees while it runs.
pub struct Invocation<'a> {
    assembly: &'a Rc<Assembly>,
    context: &'a ExecutionContext,
    receiver: Option<(Rc<Instance>, usize)>,
    args: &'a [Value],
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        assembly: &'a Rc<Assembly>,
        context: &'a ExecutionContext,
        receiver: Option<(Rc<Instance>, usize)>,
        args: &'a [Value],
    ) -> Self {
        Self {
            assembly,
            context,
            receiver,
            args,
        }
    }

    pub fn assembly(&self) -> &Rc<Assembly> {
        self.assembly
    }

    pub fn context(&self) -> &ExecutionContext {
        self.context
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Argument `index`, or null when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// The receiver instance.
    pub fn this(&self) -> Option<&Rc<Instance>> {
        self.receiver.as_ref().map(|(instance, _)| instance)
    }

    /// The inheritance level the body is bound to.
    pub fn level(&self) -> Option<usize> {
        self.receiver.as_ref().map(|(_, level)| *level)
    }

    /// Everything visible to the body: its level's local members, the whole
    /// chain, then the assembly roots. Without a receiver, the assembly roots.
    pub fn scope(&self) -> Rc<dyn VariableScope> {
        self.receiver
            .as_ref()
            .and_then(|(instance, level)| instance.scope(*level, Access::Local, ScopeMode::All))
            .unwrap_or_else(|| self.assembly.root_scope(Access::Local))
    }

    /// Members below the body's level.
    pub fn base_scope(&self) -> Rc<dyn VariableScope> {
        self.receiver
            .as_ref()
            .and_then(|(instance, level)| instance.scope(*level, Access::Local, ScopeMode::Base))
            .unwrap_or_else(|| self.assembly.root_scope(Access::Local))
    }

    pub fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        self.scope().get(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), RuntimeError> {
        self.scope().assign(name, value.into())
    }

    /// Call the function `name` resolves to in [`scope`](Self::scope).
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let target = self.get(name)?;
        self.dispatcher().call(&target, args)
    }

    /// Call the function `name` resolves to in [`base_scope`](Self::base_scope).
    pub fn call_base(&self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let target = self.base_scope().get(name)?;
        self.dispatcher().call(&target, args)
    }

    /// Create and construct an instance of `class`, continuing this call stack.
    pub fn new_instance(&self, class: &str, args: Vec<Value>) -> Result<Rc<Instance>, RuntimeError> {
        let options = CreateOptions::default().with_context(self.context.clone());
        Ok(self.assembly.create(class, options, args)?)
    }

    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(self.assembly, self.context)
    }
}
