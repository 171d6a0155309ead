//! Meta-function dispatch.
//!
//! Value operators consult the meta table of an instance operand's class.
//! When the class answers to the operator, the hook is fetched through the
//! declarations scope of the level that declares it, called, and its result
//! checked against the operator's expected return type. Otherwise, or for
//! non-instance operands, a type-default behavior applies.
//!
//! For binary operators the left operand's class answers first; when only
//! the right operand is an instance, its class answers with the left
//! operand as argument.

use std::rc::Rc;

use ember_core::{
    DispatchError, ExecutionContext, ExpectedReturn, MetaKey, RuntimeError, ScopeMode,
};

use crate::assembly::Assembly;
use crate::instance::Instance;
use crate::value::Value;

/// Operator entry points bound to an assembly and a call stack.
pub struct Dispatcher<'a> {
    assembly: &'a Rc<Assembly>,
    context: &'a ExecutionContext,
}

impl<'a> Dispatcher<'a> {
    pub fn new(assembly: &'a Rc<Assembly>, context: &'a ExecutionContext) -> Self {
        Self { assembly, context }
    }

    pub fn assembly(&self) -> &Rc<Assembly> {
        self.assembly
    }

    // === Hooks ===

    /// Call the `key` meta-function of `instance`, if its class has one.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn hook(
        &self,
        instance: &Rc<Instance>,
        key: MetaKey,
        args: Vec<Value>,
    ) -> Result<Option<Value>, RuntimeError> {
        let Some(link) = instance.definition().meta(key) else {
            return Ok(None);
        };
        let level = instance.level_of(link.owner).unwrap_or(0);
        let scope = instance
            .scope(level, link.access, ScopeMode::Declarations)
            .ok_or_else(|| RuntimeError::InstanceDropped(link.name.to_string()))?;
        let function = match scope.get(link.name)? {
            Value::Function(function) => function,
            other => {
                return Err(DispatchError::NotCallable {
                    key,
                    actual: other.type_name(),
                }
                .into());
            }
        };
        let result = function
            .call(args, self.context)
            .map_err(|source| DispatchError::Call {
                key,
                source: Box::new(source),
            })?;
        Ok(Some(cast(key, result)?))
    }

    fn binary(&self, key: MetaKey, lhs: &Value, rhs: &Value) -> Result<Option<Value>, RuntimeError> {
        if let Value::Instance(instance) = lhs
            && let Some(result) = self.hook(instance, key, vec![rhs.clone()])?
        {
            return Ok(Some(result));
        }
        match rhs {
            Value::Instance(instance) => self.hook(instance, key, vec![lhs.clone()]),
            _ => Ok(None),
        }
    }

    fn unary(&self, key: MetaKey, operand: &Value) -> Result<Option<Value>, RuntimeError> {
        match operand {
            Value::Instance(instance) => self.hook(instance, key, Vec::new()),
            _ => Ok(None),
        }
    }

    // === Arithmetic ===

    pub fn add(&self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Add, lhs, rhs)? {
            return Ok(result);
        }
        arithmetic(MetaKey::Add, lhs, rhs, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Sub, lhs, rhs)? {
            return Ok(result);
        }
        arithmetic(MetaKey::Sub, lhs, rhs, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Mul, lhs, rhs)? {
            return Ok(result);
        }
        arithmetic(MetaKey::Mul, lhs, rhs, i64::checked_mul, |a, b| a * b)
    }

    pub fn div(&self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Div, lhs, rhs)? {
            return Ok(result);
        }
        if matches!(rhs, Value::Int(0)) && matches!(lhs, Value::Int(_)) {
            return Err(RuntimeError::script("division by zero"));
        }
        arithmetic(MetaKey::Div, lhs, rhs, i64::checked_div, |a, b| a / b)
    }

    pub fn modulo(&self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Mod, lhs, rhs)? {
            return Ok(result);
        }
        if matches!(rhs, Value::Int(0)) && matches!(lhs, Value::Int(_)) {
            return Err(RuntimeError::script("division by zero"));
        }
        arithmetic(MetaKey::Mod, lhs, rhs, i64::checked_rem_euclid, f64::rem_euclid)
    }

    pub fn negate(&self, operand: &Value) -> Result<Value, RuntimeError> {
        if let Some(result) = self.unary(MetaKey::Negate, operand)? {
            return Ok(result);
        }
        match operand {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::script("integer overflow")),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(unsupported(MetaKey::Negate, other)),
        }
    }

    // === Strings ===

    /// Concatenate the string forms of both operands.
    pub fn concat(&self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Concat, lhs, rhs)? {
            return Ok(result);
        }
        for operand in [lhs, rhs] {
            if matches!(
                operand,
                Value::Table(_) | Value::Function(_) | Value::Native(_)
            ) {
                return Err(unsupported(MetaKey::Concat, operand));
            }
        }
        let mut out = self.stringify(lhs)?;
        out.push_str(&self.stringify(rhs)?);
        Ok(Value::string(out))
    }

    /// String form of a value. Instances default to `class#<id><Name>`.
    pub fn stringify(&self, value: &Value) -> Result<String, RuntimeError> {
        if let Some(result) = self.unary(MetaKey::ToString, value)? {
            return Ok(result.as_str().unwrap_or_default().to_string());
        }
        Ok(match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.to_string(),
            Value::Table(_) => "table".to_string(),
            Value::Function(function) => format!("function<{}>", function.label()),
            Value::Instance(instance) => {
                format!("class#{}<{}>", instance.id(), instance.class_name())
            }
            Value::Native(native) => format!("native<{}>", native.native_type().name()),
        })
    }

    pub fn length(&self, value: &Value) -> Result<i64, RuntimeError> {
        if let Some(result) = self.unary(MetaKey::Length, value)? {
            return Ok(result.as_int().unwrap_or_default());
        }
        match value {
            Value::String(s) => Ok(s.chars().count() as i64),
            Value::Table(table) => Ok(table.borrow().len() as i64),
            other => Err(unsupported(MetaKey::Length, other)),
        }
    }

    // === Comparison ===

    /// Structural for primitives, identity for references.
    pub fn equals(&self, lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Equals, lhs, rhs)? {
            return Ok(result.is_truthy());
        }
        Ok(lhs.identical(rhs))
    }

    pub fn less(&self, lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::Less, lhs, rhs)? {
            return Ok(result.is_truthy());
        }
        compare(MetaKey::Less, lhs, rhs).map(|ordering| ordering.is_lt())
    }

    pub fn less_equal(&self, lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
        if let Some(result) = self.binary(MetaKey::LessEqual, lhs, rhs)? {
            return Ok(result.is_truthy());
        }
        compare(MetaKey::LessEqual, lhs, rhs).map(|ordering| ordering.is_le())
    }

    // === Iteration and calls ===

    /// Items a value iterates over.
    pub fn iterate(&self, value: &Value) -> Result<Vec<Value>, RuntimeError> {
        match self.unary(MetaKey::Iterate, value)? {
            Some(Value::Table(table)) => return Ok(table.borrow().sequence()),
            Some(other) => {
                return Err(DispatchError::ReturnType {
                    key: MetaKey::Iterate,
                    expected: "table".into(),
                    actual: other.type_name(),
                }
                .into());
            }
            None => {}
        }
        match value {
            Value::Table(table) => Ok(table.borrow().sequence()),
            other => Err(unsupported(MetaKey::Iterate, other)),
        }
    }

    /// Call a function value, or an instance whose class defines `opCall`.
    pub fn call(&self, target: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match target {
            Value::Function(function) => function.call(args, self.context),
            Value::Instance(instance) => self
                .hook(instance, MetaKey::Call, args)?
                .ok_or_else(|| RuntimeError::NotCallable(target.type_name())),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }
}

/// Route a variable read or write through the `key` hook of each annotation.
///
/// Hooks receive the variable name and the current value; each result
/// replaces the value seen by the next annotation.
pub(crate) fn intercept(
    assembly: &Rc<Assembly>,
    key: MetaKey,
    name: &str,
    value: Value,
    annotations: &[Rc<Instance>],
) -> Result<Value, RuntimeError> {
    let dispatcher = Dispatcher::new(assembly, assembly.context());
    let mut value = value;
    for annotation in annotations {
        if let Some(result) =
            dispatcher.hook(annotation, key, vec![Value::string(name), value.clone()])?
        {
            value = result;
        }
    }
    Ok(value)
}

fn cast(key: MetaKey, value: Value) -> Result<Value, DispatchError> {
    let expected = match key.expected_return() {
        ExpectedReturn::Any => return Ok(value),
        ExpectedReturn::Bool if matches!(value, Value::Bool(_)) => return Ok(value),
        ExpectedReturn::Int if matches!(value, Value::Int(_)) => return Ok(value),
        ExpectedReturn::String if matches!(value, Value::String(_)) => return Ok(value),
        ExpectedReturn::Bool => "bool",
        ExpectedReturn::Int => "int",
        ExpectedReturn::String => "string",
    };
    Err(DispatchError::ReturnType {
        key,
        expected: expected.to_string(),
        actual: value.type_name(),
    })
}

fn unsupported(key: MetaKey, operand: &Value) -> RuntimeError {
    DispatchError::Unsupported {
        key,
        operand: operand.type_name(),
    }
    .into()
}

fn arithmetic(
    key: MetaKey,
    lhs: &Value,
    rhs: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::script("integer overflow")),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            (None, _) => Err(unsupported(key, lhs)),
            (_, None) => Err(unsupported(key, rhs)),
        },
    }
}

fn compare(key: MetaKey, lhs: &Value, rhs: &Value) -> Result<std::cmp::Ordering, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| RuntimeError::script("comparison with NaN")),
            (None, _) => Err(unsupported(key, lhs)),
            (_, None) => Err(unsupported(key, rhs)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuntimeConfig;
    use crate::value::Table;

    fn with_dispatcher(test: impl FnOnce(&Dispatcher<'_>)) {
        let assembly = Assembly::new(RuntimeConfig::default());
        let context = assembly.new_context();
        test(&Dispatcher::new(&assembly, &context));
    }

    #[test]
    fn numeric_defaults() {
        with_dispatcher(|d| {
            assert_eq!(d.add(&Value::Int(2), &Value::Int(3)).unwrap(), Value::Int(5));
            assert_eq!(
                d.mul(&Value::Int(2), &Value::Float(1.5)).unwrap(),
                Value::Float(3.0)
            );
            assert_eq!(d.modulo(&Value::Int(-1), &Value::Int(3)).unwrap(), Value::Int(2));
            assert_eq!(d.negate(&Value::Int(4)).unwrap(), Value::Int(-4));
            assert!(d.div(&Value::Int(1), &Value::Int(0)).is_err());
            assert!(d.add(&Value::Int(i64::MAX), &Value::Int(1)).is_err());
        });
    }

    #[test]
    fn unsupported_operands() {
        with_dispatcher(|d| {
            let err = d.sub(&Value::string("a"), &Value::Int(1)).unwrap_err();
            assert_eq!(
                err,
                RuntimeError::Dispatch(DispatchError::Unsupported {
                    key: MetaKey::Sub,
                    operand: "string".into()
                })
            );
            assert!(d.length(&Value::Int(3)).is_err());
            assert!(d.call(&Value::Int(3), vec![]).is_err());
        });
    }

    #[test]
    fn string_defaults() {
        with_dispatcher(|d| {
            assert_eq!(
                d.concat(&Value::string("n="), &Value::Int(4)).unwrap(),
                Value::string("n=4")
            );
            assert_eq!(d.length(&Value::string("héllo")).unwrap(), 5);
            assert!(d.less(&Value::string("a"), &Value::string("b")).unwrap());
            assert!(d.less_equal(&Value::Int(2), &Value::Float(2.0)).unwrap());
        });
    }

    #[test]
    fn table_defaults() {
        with_dispatcher(|d| {
            let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
            assert_eq!(d.length(&list).unwrap(), 2);
            assert_eq!(d.iterate(&list).unwrap().len(), 2);
            let other = Value::table(Table::new());
            assert!(d.equals(&list, &list).unwrap());
            assert!(!d.equals(&list, &other).unwrap());
            assert_eq!(d.stringify(&other).unwrap(), "table");
        });
    }

    #[test]
    fn return_casts() {
        assert!(cast(MetaKey::Add, Value::Null).is_ok());
        assert!(cast(MetaKey::Length, Value::Int(1)).is_ok());
        assert_eq!(
            cast(MetaKey::ToString, Value::Int(1)).unwrap_err(),
            DispatchError::ReturnType {
                key: MetaKey::ToString,
                expected: "string".into(),
                actual: "int".into()
            }
        );
    }
}
