use indexmap::IndexMap;
use jsbridge::{Ctx, DomArgument, DomValue, JsValueWrapper, LiteVm};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn nested_wrapper() -> JsValueWrapper {
    let inner: JsValueWrapper = [("flag", JsValueWrapper::Boolean(false)), ("nothing", JsValueWrapper::Null)].into_iter().collect();
    let mut object = IndexMap::new();
    object.insert("name".to_string(), JsValueWrapper::from("widget"));
    object.insert("ratio".to_string(), JsValueWrapper::from(0.1 + 0.2));
    object.insert("missing".to_string(), JsValueWrapper::Undefined);
    object.insert("tags".to_string(), JsValueWrapper::Array(vec!["a".into(), 2.into(), inner]));
    object.insert(
        "lookup".to_string(),
        JsValueWrapper::Map(vec![(1.into(), "one".into()), ("two".into(), 2.into()), (true.into(), JsValueWrapper::Null)]),
    );
    object.insert(
        "payload".to_string(),
        JsValueWrapper::ByteBuffer {
            bytes: vec![0, 1, 254, 255],
            kind: 3,
        },
    );
    JsValueWrapper::Object(object)
}

#[test]
fn wrapper_round_trips_through_the_context() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let original = nested_wrapper();
    let value = ctx.create_ctx_value(&original);
    assert_eq!(ctx.to_js_value_wrapper(&value), Some(original));
}

#[test]
fn numbers_round_trip_bit_exact() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    for n in [0.0, -0.0, 1.5e-300, f64::MAX, f64::MIN_POSITIVE, -42.25, f64::INFINITY] {
        let value = ctx.create_ctx_value(&JsValueWrapper::Number(n));
        match ctx.to_js_value_wrapper(&value) {
            Some(JsValueWrapper::Number(back)) => assert_eq!(back.to_bits(), n.to_bits()),
            other => panic!("unexpected {other:?}"),
        }
    }
    let nan = ctx.create_number(f64::NAN);
    assert!(matches!(ctx.to_js_value_wrapper(&nan), Some(JsValueWrapper::Number(n)) if n.is_nan()));
}

#[test]
fn script_values_marshal_out() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let value = ctx
        .run_script("const m = new Map(); m.set('k', [1, 'x']); ({ list: [1, null], nested: { m }, text: 'é' })", "out.js")
        .unwrap();
    let wrapper = ctx.to_js_value_wrapper(&value).unwrap();
    assert_eq!(wrapper.get("list"), Some(&JsValueWrapper::Array(vec![1.into(), JsValueWrapper::Null])));
    assert_eq!(wrapper.get("text").and_then(JsValueWrapper::as_str), Some("é"));
    let list = wrapper.get("list").and_then(JsValueWrapper::as_array).unwrap();
    assert_eq!(list[0].as_number(), Some(1.0));
    assert!(list[1].is_null_or_undefined() && list[1].as_bool().is_none());
    let map = wrapper.get("nested").and_then(|nested| nested.get("m")).unwrap();
    assert_eq!(map, &JsValueWrapper::Map(vec![("k".into(), JsValueWrapper::Array(vec![1.into(), "x".into()]))]));
}

#[test]
fn functions_and_cycles_do_not_marshal() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let function = ctx.run_script("(function named() {})", "fn.js").unwrap();
    assert_eq!(ctx.to_js_value_wrapper(&function), None);
    let holder = ctx.run_script("({ callback: () => 1 })", "fn.js").unwrap();
    assert_eq!(ctx.to_js_value_wrapper(&holder), None);
    let cycle = ctx.run_script("const a = { b: {} }; a.b.a = a; a", "cycle.js").unwrap();
    assert_eq!(ctx.to_js_value_wrapper(&cycle), None);
    assert_eq!(ctx.to_dom_value(&cycle), None);
    // Shared, acyclic references are fine.
    let shared = ctx.run_script("const s = { v: 1 }; [s, s]", "shared.js").unwrap();
    let item: JsValueWrapper = [("v", 1.0)].into_iter().collect();
    assert_eq!(ctx.to_js_value_wrapper(&shared), Some(JsValueWrapper::Array(vec![item.clone(), item])));
}

#[test]
fn dom_values_keep_integer_width() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let value = ctx.run_script("({ n: 3, f: 2.5, z: -0, big: 2147483648, s: 'x', b: true, a: [null, undefined] })", "dom.js").unwrap();
    let Some(DomValue::Object(map)) = ctx.to_dom_value(&value) else {
        panic!("expected an object");
    };
    assert_eq!(map["n"], DomValue::Int32(3));
    assert_eq!(map["f"], DomValue::Double(2.5));
    assert!(matches!(map["z"], DomValue::Double(z) if z == 0.0 && z.is_sign_negative()));
    assert_eq!(map["big"], DomValue::Double(2147483648.0));
    assert_eq!(map["s"], DomValue::String("x".to_string()));
    assert_eq!(map["b"], DomValue::Boolean(true));
    assert_eq!(map["a"], DomValue::Array(vec![DomValue::Null, DomValue::Undefined]));
}

#[test]
fn dom_values_build_script_values() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let mut map = IndexMap::new();
    map.insert("width".to_string(), DomValue::Uint32(320));
    map.insert("scale".to_string(), DomValue::Double(1.5));
    map.insert("items".to_string(), DomValue::Array(vec![DomValue::Int32(-1), DomValue::String("b".to_string())]));
    let value = ctx.create_ctx_value_from_dom(&DomValue::Object(map));
    assert!(ctx.set_global_obj_var("layout", &value, Default::default()));
    let result = ctx.run_script("layout.width * layout.scale + ':' + layout.items.join('/')", "layout.js").unwrap();
    assert_eq!(ctx.get_value_string(&result).as_deref(), Some("480:-1/b"));
    assert_eq!(DomValue::Uint32(320).as_f64(), Some(320.0));
}

#[test]
fn dom_arguments_carry_buffers_as_bytes() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let buffer = ctx.create_byte_buffer(&[0xde, 0xad]);
    assert_eq!(ctx.to_dom_argument(&buffer), Some(DomArgument::Bson(vec![0xde, 0xad])));
    assert_eq!(ctx.to_dom_value(&buffer), None);

    let object = ctx.run_script("({ id: 1 })", "arg.js").unwrap();
    let expected: IndexMap<String, DomValue> = [("id".to_string(), DomValue::Int32(1))].into_iter().collect();
    assert_eq!(ctx.to_dom_argument(&object), Some(DomArgument::Object(DomValue::Object(expected))));

    let map = ctx.run_script("const m = new Map(); m.set(1, 'numeric key'); m", "arg.js").unwrap();
    assert_eq!(ctx.to_dom_argument(&map), None);
}

#[test]
fn byte_buffers_keep_their_type_tag() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let buffer = ctx.create_byte_buffer_with_type(b"png!", 7);
    let copy = ctx.get_byte_buffer(&buffer).unwrap();
    assert_eq!(copy.bytes, b"png!".to_vec());
    assert_eq!(copy.kind, 7);
    assert!(ctx.set_global_obj_var("image", &buffer, Default::default()));
    let length = ctx.run_script("image.byteLength", "image.js").unwrap();
    assert_eq!(ctx.get_value_number(&length), Some(4.0));
    let script_buffer = ctx.run_script("new ArrayBuffer(3)", "buffer.js").unwrap();
    assert_eq!(ctx.get_byte_buffer(&script_buffer).map(|b| (b.bytes, b.kind)), Some((vec![0, 0, 0], 0)));
}
