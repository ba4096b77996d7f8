use std::rc::Rc;

use indexmap::IndexMap;
use jsbridge::napi::CallbackInfo;
use jsbridge::{Ctx, CtxValueRef, LiteVm, Vm};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

/// `[string, number, array, object, function, map, byte buffer, null/undefined, boolean]`
fn answers(ctx: &dyn Ctx, value: &CtxValueRef) -> [bool; 9] {
    [
        ctx.is_string(value),
        ctx.is_number(value),
        ctx.is_array(value),
        ctx.is_object(value),
        ctx.is_function(value),
        ctx.is_map(value),
        ctx.is_byte_buffer(value),
        ctx.is_null_or_undefined(value),
        ctx.is_boolean(value),
    ]
}

#[test]
fn type_queries_follow_the_matrix() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let none = [false; 9];
    let with = |indices: &[usize]| {
        let mut row = none;
        for &index in indices {
            row[index] = true;
        }
        row
    };
    let cases: Vec<(&str, CtxValueRef, [bool; 9])> = vec![
        ("string", ctx.create_string("s"), with(&[0])),
        ("number", ctx.create_number(1.0), with(&[1])),
        ("boolean", ctx.create_boolean(false), with(&[8])),
        ("null", ctx.create_null(), with(&[7])),
        ("undefined", ctx.create_undefined(), with(&[7])),
        ("object", ctx.create_object(&IndexMap::new()), with(&[3])),
        ("error", ctx.create_error("e"), with(&[3])),
        ("array", ctx.create_array(&[]), with(&[2, 3])),
        ("map", ctx.create_map(&[]), with(&[3, 5])),
        ("byte buffer", ctx.create_byte_buffer(&[1]), with(&[3, 6])),
        ("function", ctx.create_function("f", Rc::new(|_: &CallbackInfo| {})), with(&[3, 4])),
    ];
    for (label, value, expected) in &cases {
        assert_eq!(answers(ctx.as_ref(), value), *expected, "{label}");
    }
}

#[test]
fn null_and_undefined_are_told_apart() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let null = ctx.create_null();
    let undefined = ctx.create_undefined();
    assert!(ctx.is_null(&null) && !ctx.is_undefined(&null));
    assert!(ctx.is_undefined(&undefined) && !ctx.is_null(&undefined));
}

#[test]
fn getters_reject_other_types() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let string = ctx.create_string("12");
    let number = ctx.create_number(12.0);
    let boolean = ctx.create_boolean(true);
    assert_eq!(ctx.get_value_number(&string), None);
    assert_eq!(ctx.get_value_string(&number), None);
    assert_eq!(ctx.get_value_boolean(&number), None);
    assert_eq!(ctx.get_value_number(&boolean), None);
    assert_eq!(ctx.get_value_string(&string).as_deref(), Some("12"));
    assert_eq!(ctx.get_array_length(&string), 0);
    assert!(ctx.copy_array_element(&number, 0).is_none());
    assert!(ctx.get_entries_from_object(&string).is_none());
    assert!(ctx.get_map_entries(&ctx.create_object(&IndexMap::new())).is_none());
    assert!(ctx.get_byte_buffer(&ctx.create_array(&[])).is_none());
    assert!(ctx.copy_function_name(&string).is_none());
    assert!(ctx.object_identity(&number).is_none());
}

#[test]
fn int32_requires_an_integral_value_in_range() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let cases = [
        (7.0, Some(7)),
        (-2147483648.0, Some(i32::MIN)),
        (2147483647.0, Some(i32::MAX)),
        (2147483648.0, None),
        (1.5, None),
        (f64::NAN, None),
        (f64::INFINITY, None),
    ];
    for (number, expected) in cases {
        assert_eq!(ctx.get_value_int32(&ctx.create_number(number)), expected, "{number}");
    }
}

#[test]
fn script_values_answer_like_host_values() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let array = ctx.run_script("[1, 2]", "q.js").unwrap();
    let map = ctx.run_script("new Map()", "q.js").unwrap();
    let function = ctx.run_script("(x => x)", "q.js").unwrap();
    let boxed = ctx.run_script("new Error('e')", "q.js").unwrap();
    assert!(ctx.is_array(&array) && ctx.is_object(&array) && !ctx.is_map(&array));
    assert!(ctx.is_map(&map) && ctx.is_object(&map) && !ctx.is_array(&map));
    assert!(ctx.is_function(&function) && ctx.is_object(&function));
    assert!(ctx.is_object(&boxed) && !ctx.is_function(&boxed));
    assert_eq!(ctx.get_array_length(&array), 2);
}
