//! Declared value types.

use std::fmt;
use std::rc::Rc;

use crate::native::NativeType;

use super::Value;

/// The declared type of a variable, parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValueType {
    /// Accepts every value.
    #[default]
    Any,
    Null,
    Bool,
    Int,
    /// Accepts integers too, widening them on assignment.
    Float,
    String,
    Table,
    Function,
    /// An instance of the named class or of a class extending it, or null.
    Class(Rc<str>),
    /// A host object of the given type, or null.
    Native(NativeType),
}

impl ValueType {
    pub fn class(name: &str) -> Self {
        ValueType::Class(Rc::from(name))
    }

    pub fn native<T: 'static>() -> Self {
        ValueType::Native(NativeType::of::<T>())
    }

    /// Whether `value` may be stored in a slot of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Any, _) => true,
            (ValueType::Null, Value::Null) => true,
            (ValueType::Bool, Value::Bool(_)) => true,
            (ValueType::Int, Value::Int(_)) => true,
            (ValueType::Float, Value::Int(_) | Value::Float(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Table, Value::Table(_)) => true,
            (ValueType::Function, Value::Function(_)) => true,
            (ty, Value::Null) if ty.is_reference() => true,
            (ValueType::Class(name), Value::Instance(instance)) => {
                let definition = instance.definition();
                definition.name() == &**name || definition.does_extend(name)
            }
            (ValueType::Native(ty), Value::Native(object)) => object.native_type() == *ty,
            (ValueType::Native(ty), Value::Instance(instance)) => instance
                .host_object()
                .is_some_and(|host| host.native_type() == *ty),
            _ => false,
        }
    }

    /// Convert an accepted value to its stored representation.
    ///
    /// Returns the value unchanged when it is not accepted; callers check
    /// [`accepts`](Self::accepts) first.
    pub fn widen(&self, value: Value) -> Value {
        match (self, value) {
            (ValueType::Float, Value::Int(i)) => Value::Float(i as f64),
            (_, value) => value,
        }
    }

    /// Check and widen in one step, handing the value back on mismatch.
    pub fn coerce(&self, value: Value) -> Result<Value, Value> {
        if self.accepts(&value) {
            Ok(self.widen(value))
        } else {
            Err(value)
        }
    }

    /// Whether values of this type are reference counted handles.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueType::Table | ValueType::Function | ValueType::Class(_) | ValueType::Native(_)
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Null => write!(f, "null"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
            ValueType::Table => write!(f, "table"),
            ValueType::Function => write!(f, "function"),
            ValueType::Class(name) => write!(f, "{name}"),
            ValueType::Native(ty) => write!(f, "native<{}>", ty.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_widens_int() {
        assert!(ValueType::Float.accepts(&Value::Int(2)));
        assert_eq!(ValueType::Float.coerce(Value::Int(2)), Ok(Value::Float(2.0)));
        assert!(!ValueType::Int.accepts(&Value::Float(2.0)));
    }

    #[test]
    fn mismatch_hands_value_back() {
        let err = ValueType::Bool.coerce(Value::string("no")).unwrap_err();
        assert_eq!(err.as_str(), Some("no"));
    }

    #[test]
    fn reference_types_accept_null() {
        assert!(ValueType::class("Dog").accepts(&Value::Null));
        assert!(ValueType::native::<u32>().accepts(&Value::Null));
        assert!(ValueType::Table.accepts(&Value::Null));
        assert!(!ValueType::Int.accepts(&Value::Null));
        assert!(!ValueType::String.accepts(&Value::Null));
    }

    #[test]
    fn any_accepts_everything() {
        assert!(ValueType::Any.accepts(&Value::Null));
        assert!(ValueType::Any.accepts(&Value::list(Vec::new())));
    }

    #[test]
    fn display() {
        assert_eq!(ValueType::class("Dog").to_string(), "Dog");
        assert_eq!(ValueType::Float.to_string(), "float");
    }
}
