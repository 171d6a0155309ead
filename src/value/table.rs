//! Script tables.

use std::rc::Rc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use super::Value;

/// Hashable table key.
///
/// Floats with an integral value normalize to [`TableKey::Int`] so `t[1]`
/// and `t[1.0]` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(Rc<str>),
}

impl TableKey {
    /// Key for a value, or `None` when the value cannot index a table.
    pub fn from_value(value: &Value) -> Option<TableKey> {
        match value {
            Value::Bool(b) => Some(TableKey::Bool(*b)),
            Value::Int(i) => Some(TableKey::Int(*i)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some(TableKey::Int(*f as i64))
            }
            Value::Float(f) => Some(TableKey::Float(OrderedFloat(*f))),
            Value::String(s) => Some(TableKey::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TableKey::Bool(b) => Value::Bool(*b),
            TableKey::Int(i) => Value::Int(*i),
            TableKey::Float(f) => Value::Float(f.into_inner()),
            TableKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for TableKey {
    fn from(s: &str) -> Self {
        TableKey::String(Rc::from(s))
    }
}

impl From<i32> for TableKey {
    fn from(i: i32) -> Self {
        TableKey::Int(i64::from(i))
    }
}

impl From<i64> for TableKey {
    fn from(i: i64) -> Self {
        TableKey::Int(i)
    }
}

/// An associative array with a 1-based sequence part.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: FxHashMap<TableKey, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence table with keys `1..=n`. Null items keep their slot.
    pub fn from_list(values: impl IntoIterator<Item = Value>) -> Self {
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| (TableKey::Int(i as i64 + 1), value))
            .collect();
        Table { entries }
    }

    pub fn get(&self, key: impl Into<TableKey>) -> Value {
        self.entries
            .get(&key.into())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Store a value; storing `Null` removes the key.
    pub fn set(&mut self, key: impl Into<TableKey>, value: Value) {
        let key = key.into();
        if value.is_null() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Number of consecutive integer keys starting at 1.
    pub fn len(&self) -> usize {
        let mut n = 0usize;
        while self.entries.contains_key(&TableKey::Int(n as i64 + 1)) {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Values of the sequence part, in order.
    pub fn sequence(&self) -> Vec<Value> {
        (1..=self.len() as i64)
            .map(|i| self.get(TableKey::Int(i)))
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&TableKey, &Value)> {
        self.entries.iter()
    }
}
