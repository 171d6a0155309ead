//! Field, function and annotation declarations.

use std::fmt;
use std::rc::{Rc, Weak};

use ember_core::{Access, MemberKind, RuntimeError, TypeHash};

use crate::function::{Invocation, ScriptFn};
use crate::native::{NativeConstructor, NativeField, NativeMethod};
use crate::value::{Value, ValueType};

use super::{ClassDefinition, ClassRef};

/// Name of the constructor member.
pub const CONSTRUCTOR: &str = "constructor";

// ============================================================================
// Ownership
// ============================================================================

/// The class a member was declared on.
#[derive(Debug, Clone)]
pub struct Owner {
    hash: TypeHash,
    name: Rc<str>,
    definition: Weak<ClassDefinition>,
}

impl Owner {
    pub(crate) fn new(name: Rc<str>, definition: Weak<ClassDefinition>) -> Self {
        Self {
            hash: TypeHash::from_name(&name),
            name,
            definition,
        }
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> Option<Rc<ClassDefinition>> {
        self.definition.upgrade()
    }
}

// ============================================================================
// Functions
// ============================================================================

/// What runs when a function is called.
#[derive(Clone)]
pub enum FunctionBody {
    Script(ScriptFn),
    NativeMethod(NativeMethod),
    NativeConstructor(NativeConstructor),
    /// Forwards its arguments to the nearest base constructor.
    PassThrough,
    /// No body; a derived class supplies one.
    Abstract,
}

impl FunctionBody {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FunctionBody::Script(_) => "script",
            FunctionBody::NativeMethod(_) => "native method",
            FunctionBody::NativeConstructor(_) => "native constructor",
            FunctionBody::PassThrough => "pass-through",
            FunctionBody::Abstract => "abstract",
        }
    }
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// A function declared on a class or on the assembly.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    name: Rc<str>,
    access: Access,
    member: MemberKind,
    returns: ValueType,
    body: FunctionBody,
    annotations: Rc<[AnnotationUse]>,
    owner: Option<Owner>,
}

impl FunctionDef {
    fn with_body(name: &str, body: FunctionBody) -> Self {
        Self {
            name: Rc::from(name),
            access: Access::Global,
            member: MemberKind::Default,
            returns: ValueType::Any,
            body,
            annotations: Rc::from(Vec::new()),
            owner: None,
        }
    }

    /// A function implemented by a script closure.
    pub fn script<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + 'static,
    {
        Self::with_body(name, FunctionBody::Script(Rc::new(body)))
    }

    pub fn native_method(name: &str, method: NativeMethod) -> Self {
        let returns = method.returns().clone();
        Self::with_body(name, FunctionBody::NativeMethod(method)).with_returns(returns)
    }

    pub fn native_constructor(ctor: NativeConstructor) -> Self {
        Self::with_body(CONSTRUCTOR, FunctionBody::NativeConstructor(ctor))
    }

    pub fn abstract_method(name: &str) -> Self {
        let mut def = Self::with_body(name, FunctionBody::Abstract);
        def.member = MemberKind::Abstract;
        def
    }

    pub(crate) fn pass_through() -> Self {
        Self::with_body(CONSTRUCTOR, FunctionBody::PassThrough)
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_returns(mut self, returns: ValueType) -> Self {
        self.returns = returns;
        self
    }

    /// Mark as replacing a base member of the same name.
    pub fn overriding(mut self) -> Self {
        self.member = MemberKind::Override;
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationUse) -> Self {
        let mut annotations = self.annotations.to_vec();
        annotations.push(annotation);
        self.annotations = Rc::from(annotations);
        self
    }

    pub(crate) fn owned_by(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn member(&self) -> MemberKind {
        self.member
    }

    pub fn returns(&self) -> &ValueType {
        &self.returns
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    pub fn annotations(&self) -> &[AnnotationUse] {
        &self.annotations
    }

    /// The declaring class; `None` for assembly-global functions.
    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn is_constructor(&self) -> bool {
        &*self.name == CONSTRUCTOR
    }

    /// `Class.name` for members, `name` for globals.
    pub fn label(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{}.{}", owner.name, self.name),
            None => self.name.to_string(),
        }
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Storage behind a field.
#[derive(Clone)]
pub enum FieldKind {
    /// Stored in the scope; optionally initialized during construction.
    Script { initializer: Option<ScriptFn> },
    /// Read and written through the level's host object.
    Native(NativeField),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Script { initializer } => f
                .debug_struct("Script")
                .field("initialized", &initializer.is_some())
                .finish(),
            FieldKind::Native(field) => f.debug_tuple("Native").field(field).finish(),
        }
    }
}

/// A field declared on a class.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: Rc<str>,
    access: Access,
    ty: ValueType,
    kind: FieldKind,
    annotations: Rc<[AnnotationUse]>,
    owner: Option<Owner>,
}

impl FieldDef {
    pub fn script(name: &str, ty: ValueType) -> Self {
        Self {
            name: Rc::from(name),
            access: Access::Global,
            ty,
            kind: FieldKind::Script { initializer: None },
            annotations: Rc::from(Vec::new()),
            owner: None,
        }
    }

    pub fn native(name: &str, ty: ValueType, field: NativeField) -> Self {
        Self {
            kind: FieldKind::Native(field),
            ..Self::script(name, ty)
        }
    }

    /// Initializer evaluated with the declaring level as receiver.
    ///
    /// Has no effect on native fields.
    pub fn with_initializer<F>(mut self, init: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + 'static,
    {
        if let FieldKind::Script { initializer } = &mut self.kind {
            *initializer = Some(Rc::new(init));
        }
        self
    }

    /// Constant initializer.
    pub fn with_value(self, value: Value) -> Self {
        self.with_initializer(move |_| Ok(value.clone()))
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationUse) -> Self {
        let mut annotations = self.annotations.to_vec();
        annotations.push(annotation);
        self.annotations = Rc::from(annotations);
        self
    }

    pub(crate) fn owned_by(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn ty(&self) -> &ValueType {
        &self.ty
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, FieldKind::Native(_))
    }

    pub fn annotations(&self) -> &[AnnotationUse] {
        &self.annotations
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }
}

// ============================================================================
// Annotations
// ============================================================================

/// An annotation attached to a class, field or function.
///
/// Each use instantiates the annotation class with the evaluated arguments
/// when its target is constructed or materialized.
#[derive(Clone)]
pub struct AnnotationUse {
    class: Rc<ClassRef>,
    args: Vec<ScriptFn>,
}

impl AnnotationUse {
    pub fn new(class: &str) -> Self {
        Self {
            class: Rc::new(ClassRef::named(class)),
            args: Vec::new(),
        }
    }

    /// Constant argument.
    pub fn with_arg(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with_arg_fn(move |_| Ok(value.clone()))
    }

    /// Argument evaluated in the scope of the annotated declaration.
    pub fn with_arg_fn<F>(mut self, arg: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + 'static,
    {
        self.args.push(Rc::new(arg));
        self
    }

    pub fn class_ref(&self) -> &ClassRef {
        &self.class
    }

    pub fn class_name(&self) -> Rc<str> {
        self.class.name()
    }

    pub fn args(&self) -> &[ScriptFn] {
        &self.args
    }
}

impl fmt::Debug for AnnotationUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationUse")
            .field("class", &self.class.name())
            .field("args", &self.args.len())
            .finish()
    }
}
