//! Class definitions, scopes, materialization and native interop.

mod common;

use std::rc::Rc;

use common::{Vec2, animals, assembly, read, vectors};
use ember::prelude::*;
use ember::{Instance, VariableState};

fn dog(assembly: &Rc<Assembly>) -> Rc<Instance> {
    assembly
        .create("Dog", CreateOptions::default(), vec![Value::from("Rex")])
        .unwrap()
}

// ============================================================================
// Definitions
// ============================================================================

#[test]
fn creatable_modes() {
    let assembly = assembly();
    let cases = [
        ("Plain", TypeMode::Default, true),
        ("Final", TypeMode::Sealed, true),
        ("Shape", TypeMode::Abstract, false),
        ("World", TypeMode::Singleton, false),
        ("Tag", TypeMode::Annotation, false),
    ];
    for (name, mode, creatable) in cases {
        let class = assembly
            .define(ClassBuilder::new(name).with_mode(mode))
            .unwrap();
        assert_eq!(class.can_be_created(), creatable, "{name}");
    }
}

#[test]
fn extension_is_strict() {
    let assembly = assembly();
    assembly.define(ClassBuilder::new("A")).unwrap();
    assembly.define(ClassBuilder::new("B").extends("A")).unwrap();
    let c = assembly.define(ClassBuilder::new("C").extends("B")).unwrap();

    assert!(!c.does_extend("C"));
    assert!(c.does_extend("B"));
    assert!(c.does_extend("A"));
    assert!(!c.does_extend("D"));
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn declaring_twice_fails() {
    let assembly = animals();
    let rex = dog(&assembly);
    let scope = rex.scope(0, Access::Global, ScopeMode::Declarations).unwrap();

    scope.declare("tricks", ValueType::Int).unwrap();
    assert!(scope.is_declared("tricks"));
    let err = scope.declare("tricks", ValueType::Int).unwrap_err();
    assert_eq!(err.detail.as_deref(), Some("already declared"));
}

#[test]
fn inherited_fields_resolve_through_all_and_base() {
    let assembly = assembly();
    assembly
        .define(
            ClassBuilder::new("B")
                .with_field(FieldDef::script("x", ValueType::Int).with_value(Value::Int(11))),
        )
        .unwrap();
    assembly.define(ClassBuilder::new("C").extends("B")).unwrap();
    let c = assembly
        .create("C", CreateOptions::default(), vec![])
        .unwrap();

    let all = c.scope(0, Access::Local, ScopeMode::All).unwrap();
    assert_eq!(all.get("x").unwrap(), Value::Int(11));
    let base = c.scope(0, Access::Local, ScopeMode::Base).unwrap();
    assert_eq!(base.get("x").unwrap(), Value::Int(11));
    let own = c.scope(0, Access::Local, ScopeMode::Declarations).unwrap();
    assert_eq!(own.try_get("x"), Err(VariableState::FailedNotDeclared));
}

#[test]
fn unknown_names_are_not_declared() {
    let assembly = animals();
    let rex = dog(&assembly);
    assert_eq!(
        rex.members(Access::Local).try_get("wings"),
        Err(VariableState::FailedNotDeclared)
    );
    assert_eq!(
        rex.members(Access::Global).try_assign("wings", Value::Int(2)),
        VariableState::FailedNotDeclared
    );
}

#[test]
fn assignments_are_type_checked() {
    let assembly = animals();
    let rex = dog(&assembly);
    let members = rex.members(Access::Global);
    assert_eq!(
        members.try_assign("name", Value::Int(3)),
        VariableState::FailedTypeMismatch
    );
    members.assign("name", Value::from("Fido")).unwrap();
    assert_eq!(read(&rex, "name"), Value::from("Fido"));
}

#[test]
fn assembly_roots_close_every_chain() {
    let assembly = animals();
    let globals = assembly.root_scope(Access::Global);
    globals.declare("gravity", ValueType::Float).unwrap();
    globals.assign("gravity", Value::Float(9.8)).unwrap();

    let rex = dog(&assembly);
    assert_eq!(read(&rex, "gravity"), Value::Float(9.8));
    let base = rex.scope(0, Access::Global, ScopeMode::Base).unwrap();
    assert_eq!(base.get("gravity").unwrap(), Value::Float(9.8));
}

// ============================================================================
// Materialization
// ============================================================================

#[test]
fn functions_materialize_once() {
    let assembly = animals();
    let rex = dog(&assembly);
    let scope = rex.scope(0, Access::Global, ScopeMode::Declarations).unwrap();

    assert!(!scope.is_declared("speak"));
    let first = scope.get("speak").unwrap();
    assert!(scope.is_declared("speak"));
    let second = scope.get("speak").unwrap();
    assert!(Rc::ptr_eq(
        first.as_function().unwrap(),
        second.as_function().unwrap()
    ));
}

#[test]
fn functions_are_immutable() {
    let assembly = animals();
    let rex = dog(&assembly);
    let scope = rex.scope(0, Access::Global, ScopeMode::Declarations).unwrap();

    let before = scope.assign("speak", Value::Null).unwrap_err();
    assert!(before.to_string().contains("functions are immutable"));
    scope.get("speak").unwrap();
    assert_eq!(
        scope.try_assign("speak", Value::Null),
        VariableState::FailedRuntimeError
    );
    assert!(
        rex.members(Access::Global)
            .assign("speak", Value::Null)
            .is_err()
    );
}

#[test]
fn inherited_functions_bind_to_their_level() {
    let assembly = assembly();
    assembly
        .define(
            ClassBuilder::new("Vault")
                .with_field(
                    FieldDef::script("secret", ValueType::Int)
                        .with_access(Access::Local)
                        .with_value(Value::Int(42)),
                )
                .with_function(FunctionDef::script("reveal", |inv| inv.get("secret"))),
        )
        .unwrap();
    assembly
        .define(ClassBuilder::new("Bank").extends("Vault"))
        .unwrap();
    let bank = assembly
        .create("Bank", CreateOptions::default(), vec![])
        .unwrap();

    let reveal = bank.members(Access::Global).get("reveal").unwrap();
    let reveal = reveal.as_function().unwrap();
    assert_eq!(reveal.level(), Some(1));
    assert_eq!(
        reveal.call(vec![], assembly.context()).unwrap(),
        Value::Int(42)
    );
    assert_eq!(
        bank.members(Access::Local).try_get("secret"),
        Err(VariableState::FailedNotDeclared)
    );
}

#[test]
fn local_functions_stay_on_their_level() {
    let assembly = assembly();
    assembly
        .define(ClassBuilder::new("Base").with_function(
            FunctionDef::script("helper", |_| Ok(Value::Int(1))).with_access(Access::Local),
        ))
        .unwrap();
    assembly
        .define(ClassBuilder::new("Derived").extends("Base"))
        .unwrap();
    let derived = assembly
        .create("Derived", CreateOptions::default(), vec![])
        .unwrap();

    let head = derived
        .scope(0, Access::Local, ScopeMode::Declarations)
        .unwrap();
    assert_eq!(head.try_get("helper"), Err(VariableState::FailedNotDeclared));
    let base = derived
        .scope(1, Access::Local, ScopeMode::Declarations)
        .unwrap();
    assert!(base.get("helper").is_ok());
    assert_eq!(
        derived.members(Access::Local).try_get("helper"),
        Err(VariableState::FailedNotDeclared)
    );
}

#[test]
fn overrides_reach_the_base_through_base_scope() {
    let assembly = animals();
    assembly
        .define(
            ClassBuilder::new("Puppy").extends("Animal").with_function(
                FunctionDef::script("speak", |inv| {
                    let base = inv.call_base("speak", vec![])?;
                    Ok(Value::string(format!(
                        "yip{}",
                        base.as_str().unwrap_or_default()
                    )))
                })
                .overriding(),
            ),
        )
        .unwrap();
    let puppy = assembly
        .create("Puppy", CreateOptions::default(), vec![Value::from("Bit")])
        .unwrap();

    let speak = puppy.members(Access::Global).get("speak").unwrap();
    let said = assembly
        .dispatcher(assembly.context())
        .call(&speak, vec![])
        .unwrap();
    assert_eq!(said, Value::from("yip..."));
    assert_eq!(read(&puppy, "name"), Value::from("Bit"));
}

#[test]
fn function_annotations_attach_on_materialization() {
    let assembly = assembly();
    assembly
        .define(
            ClassBuilder::new("Route")
                .with_mode(TypeMode::Annotation)
                .with_field(FieldDef::script("path", ValueType::String))
                .with_function(FunctionDef::script("constructor", |inv| {
                    inv.set("path", inv.arg(0))?;
                    Ok(Value::Null)
                })),
        )
        .unwrap();
    assembly
        .define(ClassBuilder::new("Api").with_function(
            FunctionDef::script("index", |_| Ok(Value::Null))
                .with_annotation(AnnotationUse::new("Route").with_arg("/")),
        ))
        .unwrap();
    assembly.validate().unwrap();
    let api = assembly
        .create("Api", CreateOptions::default(), vec![])
        .unwrap();

    let scope = api.scope(0, Access::Global, ScopeMode::Declarations).unwrap();
    let routes = scope.get_annotations("index").unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].class_name(), "Route");
    assert_eq!(read(&routes[0], "path"), Value::from("/"));
}

#[test]
fn failed_function_annotations_fail_every_lookup() {
    let assembly = assembly();
    assembly
        .define(
            ClassBuilder::new("Boom")
                .with_mode(TypeMode::Annotation)
                .with_function(FunctionDef::script("constructor", |_| {
                    Err(RuntimeError::script("refused"))
                })),
        )
        .unwrap();
    assembly
        .define(ClassBuilder::new("Api").with_function(
            FunctionDef::script("index", |_| Ok(Value::Null))
                .with_annotation(AnnotationUse::new("Boom")),
        ))
        .unwrap();
    let api = assembly
        .create("Api", CreateOptions::default(), vec![])
        .unwrap();

    let scope = api.scope(0, Access::Global, ScopeMode::Declarations).unwrap();
    let first = scope.get("index").unwrap_err();
    assert!(first.to_string().contains("Boom"));
    assert!(!scope.is_declared("index"));
    assert!(scope.get("index").is_err());
    assert!(scope.get_annotations("index").is_err());
}

// ============================================================================
// Interception
// ============================================================================

fn clamped_tank() -> Rc<Assembly> {
    let assembly = assembly();
    assembly
        .define(
            ClassBuilder::new("Clamp")
                .with_mode(TypeMode::Annotation)
                .with_field(FieldDef::script("max", ValueType::Int))
                .with_function(FunctionDef::script("constructor", |inv| {
                    inv.set("max", inv.arg(0))?;
                    Ok(Value::Null)
                }))
                .with_function(FunctionDef::script("onSet", |inv| {
                    let max = inv.get("max")?.as_int().unwrap_or(i64::MAX);
                    match inv.arg(1).as_int() {
                        Some(v) if v > max => Ok(Value::Int(max)),
                        _ => Ok(inv.arg(1)),
                    }
                })),
        )
        .unwrap();
    assembly
        .define(
            ClassBuilder::new("Loud")
                .with_mode(TypeMode::Annotation)
                .with_function(FunctionDef::script("onGet", |inv| {
                    Ok(Value::string(
                        inv.arg(1).as_str().unwrap_or_default().to_uppercase(),
                    ))
                })),
        )
        .unwrap();
    assembly
        .define(
            ClassBuilder::new("Tank")
                .with_field(
                    FieldDef::script("level", ValueType::Int)
                        .with_annotation(AnnotationUse::new("Clamp").with_arg(100))
                        .with_value(Value::Int(250)),
                )
                .with_field(
                    FieldDef::script("label", ValueType::String)
                        .with_annotation(AnnotationUse::new("Loud"))
                        .with_value(Value::from("water")),
                ),
        )
        .unwrap();
    assembly
}

#[test]
fn set_hooks_transform_writes() {
    let assembly = clamped_tank();
    let tank = assembly
        .create("Tank", CreateOptions::default(), vec![])
        .unwrap();
    assert_eq!(read(&tank, "level"), Value::Int(100));

    let members = tank.members(Access::Global);
    members.assign("level", Value::Int(40)).unwrap();
    assert_eq!(read(&tank, "level"), Value::Int(40));
    members.assign("level", Value::Int(900)).unwrap();
    assert_eq!(read(&tank, "level"), Value::Int(100));
}

#[test]
fn get_hooks_transform_reads() {
    let assembly = clamped_tank();
    let tank = assembly
        .create("Tank", CreateOptions::default(), vec![])
        .unwrap();
    assert_eq!(read(&tank, "label"), Value::from("WATER"));
    let scope = tank.scope(0, Access::Global, ScopeMode::Declarations).unwrap();
    assert_eq!(scope.get_annotations("label").unwrap().len(), 1);
}

#[test]
fn field_annotations_can_be_skipped() {
    let assembly = clamped_tank();
    let tank = assembly
        .create(
            "Tank",
            CreateOptions::default().without(CreateFlags::CREATE_FIELD_ANNOTATIONS),
            vec![],
        )
        .unwrap();
    assert_eq!(read(&tank, "level"), Value::Int(250));
    assert_eq!(read(&tank, "label"), Value::from("water"));
    let scope = tank.scope(0, Access::Global, ScopeMode::Declarations).unwrap();
    assert!(scope.get_annotations("level").unwrap().is_empty());
}

// ============================================================================
// Native interop
// ============================================================================

#[test]
fn host_objects_are_wrapped() {
    let assembly = vectors();
    let wrapped = assembly
        .wrap_native(NativeObject::new(Vec2::new(3.0, 4.0)))
        .unwrap();
    let v = wrapped.as_instance().unwrap();
    assert_eq!(v.class_name(), "Vec2");
    assert!(v.is_initialized());
    assert_eq!(read(v, "x"), Value::Float(3.0));

    let length = v.members(Access::Global).get("length").unwrap();
    let length = length.as_function().unwrap();
    assert_eq!(
        length.call(vec![], assembly.context()).unwrap(),
        Value::Float(5.0)
    );
}

#[test]
fn native_fields_write_through() {
    let assembly = vectors();
    let host = Rc::new(Vec2::new(1.0, 2.0));
    let wrapped = assembly
        .wrap_native(NativeObject::from_rc(host.clone()))
        .unwrap();
    let members = wrapped.as_instance().unwrap().members(Access::Global);

    members.assign("x", Value::Int(6)).unwrap();
    assert_eq!(host.x.get(), 6.0);
    assert_eq!(
        members.try_assign("y", Value::Float(1.0)),
        VariableState::FailedNativeException
    );
}

#[test]
fn unpaired_host_objects_stay_opaque() {
    let assembly = vectors();
    let value = assembly.wrap_native(NativeObject::new(5u8)).unwrap();
    assert!(value.as_native().is_some());
    assert_eq!(value.type_name(), "native<u8>");
}

#[test]
fn native_constructor_binds_the_host() {
    let assembly = vectors();
    let v = assembly
        .create(
            "Vec2",
            CreateOptions::default(),
            vec![Value::Float(1.5), Value::Int(2)],
        )
        .unwrap();
    assert_eq!(read(&v, "y"), Value::Float(2.0));
    assert!(v.host_object().unwrap().is::<Vec2>());
}

#[test]
fn missing_host_object_is_reported() {
    let assembly = vectors();
    let v = assembly
        .create(
            "Vec2",
            CreateOptions::default().without(CreateFlags::CALL_CONSTRUCTOR),
            vec![],
        )
        .unwrap();
    let members = v.members(Access::Global);
    assert!(members.is_declared("x"));
    assert!(!members.is_assigned("x"));
    assert_eq!(
        members.try_get("x"),
        Err(VariableState::FailedCouldNotResolveNativeReference)
    );
}

#[test]
fn marshaling_wraps_paired_types() {
    let assembly = vectors();
    let value = assembly
        .marshaler()
        .from_native(
            &assembly,
            &ValueType::class("Vec2"),
            NativeObject::new(Vec2::new(0.0, 1.0)),
        )
        .unwrap();
    assert_eq!(value.type_name(), "Vec2");

    let err = assembly
        .marshaler()
        .from_native(&assembly, &ValueType::Int, NativeObject::new(Vec2::new(0.0, 1.0)))
        .unwrap_err();
    assert_eq!(err.variable_state(), VariableState::FailedTypeMismatch);
}

#[test]
fn native_declarations_can_be_skipped() {
    let assembly = vectors();
    let v = assembly
        .create(
            "Vec2",
            CreateOptions::default()
                .without(CreateFlags::DECLARE_NATIVE_FIELDS)
                .without(CreateFlags::CALL_CONSTRUCTOR),
            vec![],
        )
        .unwrap();
    let members = v.members(Access::Global);
    assert!(!members.is_declared("x"));
    assert_eq!(members.try_get("x"), Err(VariableState::FailedNotDeclared));
}
