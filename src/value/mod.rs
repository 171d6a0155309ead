//! Script values.
//!
//! [`Value`] is the dynamically typed value held by variables and passed to
//! and from functions. Primitives are stored inline; strings, tables,
//! functions, instances and host objects are reference counted.
//! [`ValueType`] is the declared type of a variable, parameter or return.

mod table;
mod value_type;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::function::Callable;
use crate::instance::Instance;
use crate::native::NativeObject;

pub use table::{Table, TableKey};
pub use value_type::ValueType;

/// A dynamically typed script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Table(Rc<RefCell<Table>>),
    Function(Rc<Callable>),
    Instance(Rc<Instance>),
    Native(NativeObject),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn table(table: Table) -> Self {
        Value::Table(Rc::new(RefCell::new(table)))
    }

    /// Sequence table from a list of values.
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::table(Table::from_list(values))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Rc<RefCell<Table>>> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<Callable>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Rc<Instance>> {
        match self {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeObject> {
        match self {
            Value::Native(n) => Some(n),
            _ => None,
        }
    }

    /// `null` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// Name of the value's runtime type. Instances report their class name.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::String(_) => "string".into(),
            Value::Table(_) => "table".into(),
            Value::Function(_) => "function".into(),
            Value::Instance(i) => i.class_name().to_string(),
            Value::Native(n) => format!("native<{}>", n.native_type().name()),
        }
    }

    /// Primitive equality by value, reference equality by identity.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => a.id() == b.id(),
            (Value::Native(a), Value::Native(b)) => NativeObject::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.identical(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Table(t) => write!(f, "Table(len={})", t.borrow().len()),
            Value::Function(c) => write!(f, "Function({})", c.label()),
            Value::Instance(i) => write!(f, "Instance({}#{})", i.class_name(), i.id()),
            Value::Native(n) => write!(f, "Native({})", n.native_type().name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<Instance>> for Value {
    fn from(instance: Rc<Instance>) -> Self {
        Value::Instance(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Float(1.5));
        assert_ne!(Value::Int(1), Value::string("1"));
    }

    #[test]
    fn tables_compare_by_identity() {
        let a = Value::list([Value::Int(1)]);
        let b = Value::list([Value::Int(1)]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Float(1.0).type_name(), "float");
        assert_eq!(Value::list(Vec::new()).type_name(), "table");
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::Float(3.0).as_int(), None);
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert!(Value::Null.as_instance().is_none());
    }
}
