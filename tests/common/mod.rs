//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Once;

use ember::prelude::*;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fresh assembly with tracing installed.
pub fn assembly() -> Rc<Assembly> {
    init_tracing();
    Assembly::new(RuntimeConfig::default())
}

/// `Animal { name }` with a constructor storing its first argument, and a
/// sealed `Dog extends Animal` with no constructor of its own.
pub fn animals() -> Rc<Assembly> {
    let assembly = assembly();
    assembly
        .define(
            ClassBuilder::new("Animal")
                .with_field(FieldDef::script("name", ValueType::String))
                .with_function(FunctionDef::script("constructor", |inv| {
                    inv.set("name", inv.arg(0))?;
                    Ok(Value::Null)
                }))
                .with_function(
                    FunctionDef::script("speak", |_| Ok(Value::from("...")))
                        .with_returns(ValueType::String),
                ),
        )
        .unwrap();
    assembly
        .define(
            ClassBuilder::new("Dog")
                .with_mode(TypeMode::Sealed)
                .extends("Animal"),
        )
        .unwrap();
    assembly
}

/// Read `name` through the Local-tier scope of the most derived level.
pub fn read(instance: &ember::Instance, name: &str) -> Value {
    instance
        .scope(0, Access::Local, ScopeMode::All)
        .expect("instance has a head level")
        .get(name)
        .unwrap_or_else(|err| panic!("reading {name}: {err}"))
}

/// Host type used by the native interop tests.
#[derive(Debug)]
pub struct Vec2 {
    pub x: std::cell::Cell<f64>,
    pub y: std::cell::Cell<f64>,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: std::cell::Cell::new(x),
            y: std::cell::Cell::new(y),
        }
    }
}

/// `Vec2` paired with [`Vec2`]: native fields `x` (writable) and `y`
/// (read-only), a native `length` method and a native constructor.
pub fn vectors() -> Rc<Assembly> {
    let assembly = assembly();
    assembly
        .define(
            ClassBuilder::new("Vec2")
                .describes::<Vec2>()
                .with_field(FieldDef::native(
                    "x",
                    ValueType::Float,
                    NativeField::getter(|v: &Vec2| v.x.get())
                        .with_typed_setter(|v: &Vec2, x: f64| v.x.set(x)),
                ))
                .with_field(FieldDef::native(
                    "y",
                    ValueType::Float,
                    NativeField::getter(|v: &Vec2| v.y.get()),
                ))
                .with_function(FunctionDef::native_method(
                    "length",
                    NativeMethod::typed::<Vec2, _>(vec![], ValueType::Float, |v, _| {
                        Ok(NativeObject::new(v.x.get().hypot(v.y.get())))
                    }),
                ))
                .with_function(FunctionDef::native_constructor(NativeConstructor::new(
                    vec![ValueType::Float, ValueType::Float],
                    |args| {
                        let x = args[0].downcast_ref::<f64>().copied().unwrap_or_default();
                        let y = args[1].downcast_ref::<f64>().copied().unwrap_or_default();
                        Ok(NativeObject::new(Vec2::new(x, y)))
                    },
                ))),
        )
        .unwrap();
    assembly
}
