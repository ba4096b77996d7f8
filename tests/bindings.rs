use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use jsbridge::napi::{CallbackInfo, CallbackTuple, ERROR_HANDLER_JS_NAME, ERROR_HANDLER_NAME};
use jsbridge::{LiteVm, ModuleClass, ModuleClassMap, Scope, Vm};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn console_module(log: &Rc<RefCell<Vec<String>>>) -> ModuleClassMap {
    let sink = Rc::clone(log);
    let mut console = ModuleClass::new();
    console.insert(
        "Log".to_string(),
        Rc::new(move |info: &CallbackInfo| {
            let Some(scope) = info.scope() else {
                return;
            };
            let ctx = scope.context();
            let line: Vec<String> = info.args().iter().map(|arg| ctx.exception_message(arg)).collect();
            sink.borrow_mut().push(line.join(" "));
        }),
    );
    let mut modules = ModuleClassMap::new();
    modules.insert("Console".to_string(), console);
    modules
}

#[test]
fn module_functions_dispatch_to_native_callbacks() {
    let vm = LiteVm::new(None);
    let scope = Scope::new(&vm, "console-test");
    let log = Rc::new(RefCell::new(Vec::new()));
    assert!(scope.initialize(&console_module(&log)));

    let ctx = scope.context();
    let result = ctx.run_script("Console.Log('hi')", "main.js").unwrap();
    assert!(ctx.is_undefined(&result));
    assert_eq!(*log.borrow(), vec!["hi".to_string()]);

    ctx.run_script("Console.Log('n =', 1 + 2, true)", "main.js").unwrap();
    assert_eq!(log.borrow()[1], "n = 3 true");
}

#[test]
fn initialize_installs_the_global_alias() {
    let vm = LiteVm::new(None);
    let scope = Scope::new(&vm, "alias");
    assert!(scope.initialize(&ModuleClassMap::new()));
    // Safe to repeat.
    assert!(scope.context().register_global_in_js());
    let ctx = scope.context();
    let result = ctx.run_script("global === globalThis && Object.keys(global).indexOf('global') < 0", "alias.js").unwrap();
    assert_eq!(ctx.get_value_boolean(&result), Some(true));
}

#[test]
fn bootstrap_defines_a_default_error_handler() {
    let vm = LiteVm::new(None);
    let scope = Scope::new(&vm, "handler");
    let ctx = scope.context();
    assert!(ctx.get_global_obj_var(ERROR_HANDLER_NAME).is_none());
    assert!(scope.initialize(&ModuleClassMap::new()));

    let handler = ctx.get_global_obj_var(ERROR_HANDLER_NAME).unwrap();
    assert!(ctx.is_function(&handler));
    assert_eq!(ctx.copy_function_name(&handler).as_deref(), Some(ERROR_HANDLER_NAME));

    // Reports through the uncaught policy and the session carries on.
    assert!(ctx.run_script("throw new Error('unhandled')", "boom.js").is_none());
    let result = ctx.run_script("BridgeExceptionHandler(new Error('direct')); 40 + 2", "main.js").unwrap();
    assert_eq!(ctx.get_value_number(&result), Some(42.0));

    // A handler supplied by scripts survives a second bootstrap.
    ctx.run_script("var seen = []; function BridgeExceptionHandler(e) { seen.push(e.message); }", ERROR_HANDLER_JS_NAME).unwrap();
    assert!(ctx.register_global_in_js());
    assert!(ctx.run_script("throw new Error('custom')", "boom.js").is_none());
    let seen = ctx.run_script("seen.join(',')", "main.js").unwrap();
    assert_eq!(ctx.get_value_string(&seen).as_deref(), Some("custom"));
}

#[test]
fn expired_scope_turns_bindings_into_no_ops() {
    let vm = LiteVm::new(None);
    let scope = Scope::new(&vm, "short-lived");
    let log = Rc::new(RefCell::new(Vec::new()));
    assert!(scope.initialize(&console_module(&log)));

    let ctx = Rc::clone(scope.context());
    let console = ctx.get_global_obj_var("Console").unwrap();
    let function = ctx.get_property(&console, "Log").unwrap();
    assert!(ctx.is_function(&function));
    assert_eq!(ctx.copy_function_name(&function).as_deref(), Some("Log"));
    drop(scope);

    let message = ctx.create_string("ignored");
    let result = ctx.call_function(&function, &[message]).unwrap();
    assert!(ctx.is_undefined(&result));
    assert!(log.borrow().is_empty());
}

#[test]
fn native_binding_receives_data_and_arguments() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    let weak = Rc::downgrade(&ctx);
    let data: Rc<dyn Any> = Rc::new("bridge-tag".to_string());
    assert!(ctx.register_native_binding(
        "notify",
        Rc::new(move |tuple: &CallbackTuple<'_>| {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            let tag = tuple.data.downcast_ref::<String>().cloned().unwrap_or_default();
            for argument in tuple.arguments {
                sink.borrow_mut().push(format!("{tag}:{}", ctx.exception_message(argument)));
            }
        }),
        data,
    ));
    let result = ctx.run_script("notify('a', 2)", "notify.js").unwrap();
    assert!(ctx.is_undefined(&result));
    assert_eq!(*received.borrow(), vec!["bridge-tag:a".to_string(), "bridge-tag:2".to_string()]);
    assert!(ctx.get_js_fn("notify").is_some());
}

#[test]
fn native_function_returns_values() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let weak = Rc::downgrade(&ctx);
    assert!(ctx.register_native_function(
        "scaledSum",
        Rc::new(move |tuple: &CallbackTuple<'_>| {
            let ctx = weak.upgrade()?;
            let factor = *tuple.data.downcast_ref::<f64>()?;
            let sum: f64 = tuple.arguments.iter().filter_map(|arg| ctx.get_value_number(arg)).sum();
            Some(ctx.create_number(sum * factor))
        }),
        Rc::new(10.0_f64),
    ));
    let result = ctx.run_script("scaledSum(1, 2, 3)", "sum.js").unwrap();
    assert_eq!(ctx.get_value_number(&result), Some(60.0));
    let missing = ctx.run_script("typeof scaledSum('x')", "sum.js").unwrap();
    assert_eq!(ctx.get_value_string(&missing).as_deref(), Some("number"));
}

#[test]
fn created_functions_see_receiver_and_return_values() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    let weak = Rc::downgrade(&ctx);
    let describe = ctx.create_function(
        "describe",
        Rc::new(move |info: &CallbackInfo| {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            let label = ctx
                .copy_named_property(info.this(), "label")
                .and_then(|label| ctx.get_value_string(&label))
                .unwrap_or_default();
            info.set_return_value(ctx.create_string(&format!("{label}/{}", info.len())));
        }),
    );
    assert!(ctx.set_global_obj_var("describe", &describe, Default::default()));
    let result = ctx.run_script("({ label: 'box', describe }).describe(1, 2)", "receiver.js").unwrap();
    assert_eq!(ctx.get_value_string(&result).as_deref(), Some("box/2"));
}

#[test]
fn js_functions_are_callable_from_native() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_context();
    ctx.run_script("function greet(name, times) { return 'hi ' + name + ' x' + times; }", "greet.js").unwrap();
    let greet = ctx.get_js_fn("greet").unwrap();
    let args = [ctx.create_string("bob"), ctx.create_number(3.0)];
    let result = ctx.call_function(&greet, &args).unwrap();
    assert_eq!(ctx.get_value_string(&result).as_deref(), Some("hi bob x3"));
    assert!(ctx.get_js_fn("missingFunction").is_none());
    ctx.set_global_str_var("notAFunction", "text");
    assert!(ctx.get_js_fn("notAFunction").is_none());
}
