//! Host interop handles.
//!
//! Host objects cross into the object model as [`NativeObject`]s. Classes
//! paired with a host type expose its behavior through [`NativeMethod`],
//! [`NativeConstructor`] and [`NativeField`] handles, and every inheritance
//! level reaches its host object through a lazily resolved
//! [`DynamicReference`]. Conversions between script values and host objects
//! go through a [`Marshaler`].

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use ember_core::{MarshalError, NativeError, RuntimeError};

use crate::assembly::Assembly;
use crate::instance::Instance;
use crate::value::{Value, ValueType};

// ============================================================================
// Host Objects
// ============================================================================

/// Identity of a host type.
#[derive(Debug, Clone, Copy)]
pub struct NativeType {
    name: &'static str,
    id: TypeId,
}

impl NativeType {
    pub fn of<T: 'static>() -> Self {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for NativeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NativeType {}

impl Hash for NativeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A reference counted host object tagged with its type.
#[derive(Clone)]
pub struct NativeObject {
    inner: Rc<dyn Any>,
    ty: NativeType,
}

impl NativeObject {
    pub fn new<T: 'static>(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    pub fn from_rc<T: 'static>(value: Rc<T>) -> Self {
        Self {
            inner: value,
            ty: NativeType::of::<T>(),
        }
    }

    /// The unit object, marshaled as `null`.
    pub fn unit() -> Self {
        Self::new(())
    }

    #[inline]
    pub fn native_type(&self) -> NativeType {
        self.ty
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.ty.id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn ptr_eq(a: &NativeObject, b: &NativeObject) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    fn receiver<T: 'static>(&self) -> Result<&T, NativeError> {
        self.downcast_ref::<T>()
            .ok_or_else(|| NativeError::ReceiverType {
                expected: type_name::<T>().to_string(),
            })
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeObject<{}>", self.ty.name)
    }
}

// ============================================================================
// Member Handles
// ============================================================================

pub type NativeMethodFn = dyn Fn(&NativeObject, &[NativeObject]) -> Result<NativeObject, NativeError>;
pub type NativeConstructorFn = dyn Fn(&[NativeObject]) -> Result<NativeObject, NativeError>;
pub type NativeGetterFn = dyn Fn(&NativeObject) -> Result<NativeObject, NativeError>;
pub type NativeSetterFn = dyn Fn(&NativeObject, NativeObject) -> Result<(), NativeError>;

/// A host method invoked on the level's host object.
#[derive(Clone)]
pub struct NativeMethod {
    params: Vec<ValueType>,
    returns: ValueType,
    func: Rc<NativeMethodFn>,
}

impl NativeMethod {
    pub fn new<F>(params: Vec<ValueType>, returns: ValueType, func: F) -> Self
    where
        F: Fn(&NativeObject, &[NativeObject]) -> Result<NativeObject, NativeError> + 'static,
    {
        Self {
            params,
            returns,
            func: Rc::new(func),
        }
    }

    /// A method whose receiver is downcast to `T` before the call.
    pub fn typed<T, F>(params: Vec<ValueType>, returns: ValueType, func: F) -> Self
    where
        T: 'static,
        F: Fn(&T, &[NativeObject]) -> Result<NativeObject, NativeError> + 'static,
    {
        Self::new(params, returns, move |receiver, args| {
            func(receiver.receiver::<T>()?, args)
        })
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn returns(&self) -> &ValueType {
        &self.returns
    }

    pub fn invoke(
        &self,
        receiver: &NativeObject,
        args: &[NativeObject],
    ) -> Result<NativeObject, NativeError> {
        check_arity(self.params.len(), args.len())?;
        (self.func)(receiver, args)
    }
}

impl fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMethod")
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// A host constructor producing the level's host object.
#[derive(Clone)]
pub struct NativeConstructor {
    params: Vec<ValueType>,
    func: Rc<NativeConstructorFn>,
}

impl NativeConstructor {
    pub fn new<F>(params: Vec<ValueType>, func: F) -> Self
    where
        F: Fn(&[NativeObject]) -> Result<NativeObject, NativeError> + 'static,
    {
        Self {
            params,
            func: Rc::new(func),
        }
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn invoke(&self, args: &[NativeObject]) -> Result<NativeObject, NativeError> {
        check_arity(self.params.len(), args.len())?;
        (self.func)(args)
    }
}

impl fmt::Debug for NativeConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeConstructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Accessors for a field stored on the host object.
#[derive(Clone)]
pub struct NativeField {
    getter: Rc<NativeGetterFn>,
    setter: Option<Rc<NativeSetterFn>>,
}

impl NativeField {
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn(&NativeObject) -> Result<NativeObject, NativeError> + 'static,
    {
        Self {
            getter: Rc::new(getter),
            setter: None,
        }
    }

    /// A read accessor over a host object of type `T`.
    pub fn getter<T, V, F>(get: F) -> Self
    where
        T: 'static,
        V: 'static,
        F: Fn(&T) -> V + 'static,
    {
        Self::new(move |host| Ok(NativeObject::new(get(host.receiver::<T>()?))))
    }

    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&NativeObject, NativeObject) -> Result<(), NativeError> + 'static,
    {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// A write accessor over a host object of type `T` taking a `V`.
    pub fn with_typed_setter<T, V, F>(self, set: F) -> Self
    where
        T: 'static,
        V: Clone + 'static,
        F: Fn(&T, V) + 'static,
    {
        self.with_setter(move |host, value| {
            let value = value.downcast_ref::<V>().cloned().ok_or_else(|| {
                NativeError::Exception(format!(
                    "expected {}, got {}",
                    type_name::<V>(),
                    value.native_type().name()
                ))
            })?;
            set(host.receiver::<T>()?, value);
            Ok(())
        })
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn get(&self, host: &NativeObject) -> Result<NativeObject, NativeError> {
        (self.getter)(host)
    }

    pub fn set(&self, host: &NativeObject, value: NativeObject) -> Result<(), NativeError> {
        match &self.setter {
            Some(setter) => setter(host, value),
            None => Err(NativeError::Exception("field is read-only".into())),
        }
    }
}

impl fmt::Debug for NativeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeField")
            .field("writable", &self.is_writable())
            .finish_non_exhaustive()
    }
}

fn check_arity(expected: usize, actual: usize) -> Result<(), NativeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(NativeError::ArgumentCount { expected, actual })
    }
}

// ============================================================================
// Dynamic References
// ============================================================================

/// Lazily resolved handle to the host object of one inheritance level.
///
/// A level's object is bound explicitly by its native constructor. Until
/// then, resolution falls back to the host object attached to the whole
/// instance (set when a raw host object is wrapped), provided its type
/// matches the type the level's class describes.
pub struct DynamicReference {
    class: Rc<str>,
    described: Option<NativeType>,
    instance: Weak<Instance>,
    cell: RefCell<Option<NativeObject>>,
}

impl DynamicReference {
    pub fn new(class: Rc<str>, described: Option<NativeType>, instance: Weak<Instance>) -> Self {
        Self {
            class,
            described,
            instance,
            cell: RefCell::new(None),
        }
    }

    pub fn bind(&self, object: NativeObject) {
        *self.cell.borrow_mut() = Some(object);
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.borrow().is_some()
    }

    pub fn resolve(&self) -> Result<NativeObject, RuntimeError> {
        if let Some(object) = self.cell.borrow().as_ref() {
            return Ok(object.clone());
        }
        let host = self.instance.upgrade().and_then(|i| i.host_object());
        match host {
            Some(object) if self.described.is_none_or(|ty| ty == object.native_type()) => {
                self.bind(object.clone());
                Ok(object)
            }
            _ => Err(RuntimeError::UnresolvedNativeReference {
                class: self.class.to_string(),
            }),
        }
    }
}

impl fmt::Debug for DynamicReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicReference")
            .field("class", &self.class)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

// ============================================================================
// Marshaling
// ============================================================================

/// Converts values across the host boundary.
pub trait Marshaler {
    /// Host object to script value of type `ty`.
    fn from_native(
        &self,
        assembly: &Rc<Assembly>,
        ty: &ValueType,
        object: NativeObject,
    ) -> Result<Value, RuntimeError>;

    /// Script value to host object for a slot of type `ty`.
    fn to_native(&self, value: &Value, ty: &ValueType) -> Result<NativeObject, MarshalError>;
}

/// Converts primitives, passes host objects through, and wraps host objects
/// whose type is paired with a class.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMarshaler;

impl Marshaler for DefaultMarshaler {
    fn from_native(
        &self,
        assembly: &Rc<Assembly>,
        ty: &ValueType,
        object: NativeObject,
    ) -> Result<Value, RuntimeError> {
        let value = if object.is::<()>() {
            Value::Null
        } else if let Some(b) = object.downcast_ref::<bool>() {
            Value::Bool(*b)
        } else if let Some(i) = object.downcast_ref::<i64>() {
            Value::Int(*i)
        } else if let Some(i) = object.downcast_ref::<i32>() {
            Value::Int(i64::from(*i))
        } else if let Some(f) = object.downcast_ref::<f64>() {
            Value::Float(*f)
        } else if let Some(s) = object.downcast_ref::<String>() {
            Value::string(s)
        } else if let Some(s) = object.downcast_ref::<&'static str>() {
            Value::string(s)
        } else if let Some(v) = object.downcast_ref::<Value>() {
            v.clone()
        } else {
            assembly.wrap_native(object)?
        };

        ty.coerce(value).map_err(|value| {
            MarshalError::Unsupported {
                from: value.type_name(),
                to: ty.to_string(),
            }
            .into()
        })
    }

    fn to_native(&self, value: &Value, ty: &ValueType) -> Result<NativeObject, MarshalError> {
        let unsupported = || MarshalError::Unsupported {
            from: value.type_name(),
            to: ty.to_string(),
        };
        if !ty.accepts(value) {
            return Err(unsupported());
        }
        let object = match (ty, value) {
            (_, Value::Native(object)) => object.clone(),
            (ValueType::Native(_), Value::Instance(instance)) => {
                instance.host_object().ok_or_else(unsupported)?
            }
            (_, Value::Null) => NativeObject::unit(),
            (_, Value::Bool(b)) => NativeObject::new(*b),
            (ValueType::Float, Value::Int(i)) => NativeObject::new(*i as f64),
            (_, Value::Int(i)) => NativeObject::new(*i),
            (_, Value::Float(f)) => NativeObject::new(*f),
            (_, Value::String(s)) => NativeObject::new(s.to_string()),
            (_, other) => NativeObject::new(other.clone()),
        };
        Ok(object)
    }
}
