use jsbridge::Repl;

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

#[test]
fn repl_persists_values_between_calls() {
    let repl = Repl::new();
    assert_eq!(repl.eval("let x = 42;").as_deref(), Ok("undefined"));
    assert_eq!(repl.eval("x").as_deref(), Ok("42"));
}

#[test]
fn repl_allows_function_persistence() {
    let repl = Repl::new();
    repl.eval("function add(a,b){ return a + b; }").unwrap();
    assert_eq!(repl.eval("add(2,3)").as_deref(), Ok("5"));
    assert_eq!(repl.eval("add").as_deref(), Ok("[Function: add]"));
}

#[test]
fn repl_renders_completion_values() {
    let repl = Repl::new();
    assert_eq!(repl.eval("'plain'").as_deref(), Ok("plain"));
    assert_eq!(repl.eval("({ a: [1, 'b'], c: null })").as_deref(), Ok(r#"{ a: [1, "b"], c: null }"#));
    assert_eq!(repl.eval("const m = new Map(); m.set('k', 1); m").as_deref(), Ok(r#"Map(1) { "k" => 1 }"#));
    assert_eq!(repl.eval("1 / 0").as_deref(), Ok("Infinity"));
    assert_eq!(repl.eval("1e20").as_deref(), Ok("100000000000000000000"));
    assert_eq!(repl.eval("[1.5e300, -0]").as_deref(), Ok("[1.5e+300, 0]"));
    assert_eq!(repl.eval("({ big: 2 ** 70 })").as_deref(), Ok("{ big: 1.1805916207174113e+21 }"));
}

#[test]
fn repl_reports_exceptions() {
    let repl = Repl::new();
    let err = repl.eval_named("undefinedThing + 1", "input.js").unwrap_err();
    assert!(err.starts_with("ReferenceError: undefinedThing is not defined"), "{err}");
    assert!(err.contains("at input.js:1"), "{err}");
    let syntax = repl.eval("let = 1").unwrap_err();
    assert!(syntax.starts_with("SyntaxError: <repl>:1:"), "{syntax}");
    assert_eq!(repl.eval("throw 1e20").as_deref().map_err(String::as_str), Err("100000000000000000000"));
    // The session survives failures.
    assert_eq!(repl.eval("1 + 1").as_deref(), Ok("2"));
}

#[test]
fn repl_installs_console() {
    let repl = Repl::new();
    assert_eq!(repl.eval("typeof console.log + typeof console.error").as_deref(), Ok("functionfunction"));
    assert_eq!(repl.eval("console.log('from script', 1, [2])").as_deref(), Ok("undefined"));
    assert!(repl.context().get_global_obj_var("global").is_some());
    assert_eq!(repl.vm().init_param().max_call_depth, 200);
    assert!(!Repl::is_complete_input("console.log(["));
}
