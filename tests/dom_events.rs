use std::rc::Rc;

use indexmap::IndexMap;
use jsbridge::{DomEvent, DomValue, LiteVm, ModuleClassMap, Scope};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

const HANDLER: &str = r#"
    var seen = [];
    function onEvent(e) {
        seen.push(e.type + ':' + e.id + ':' + (e.value === null ? 'null' : typeof e.value === 'object' ? e.value.x : e.value));
    }
"#;

fn event_scope(vm: &LiteVm) -> Rc<Scope> {
    let scope = Scope::new(vm, "events");
    assert!(scope.initialize(&ModuleClassMap::new()));
    scope.context().run_script(HANDLER, "handler.js").unwrap();
    scope
}

fn seen(scope: &Scope) -> String {
    let ctx = scope.context();
    let result = ctx.run_script("seen.join(',')", "seen.js").unwrap();
    ctx.get_value_string(&result).unwrap_or_default()
}

#[test]
fn firing_calls_the_script_listener() {
    let vm = LiteVm::new(None);
    let scope = event_scope(&vm);
    let ctx = scope.context();
    let callback = ctx.get_js_fn("onEvent").unwrap();

    let click = Rc::new(DomEvent::new("click", 7, Some(DomValue::Int32(3))));
    ctx.register_dom_event(&Rc::downgrade(&scope), Rc::clone(&callback), &click);
    assert_eq!(click.listener_count(), 1);
    assert_eq!(click.fire(), 1);
    assert_eq!(seen(&scope), "click:7:3");

    let load = Rc::new(DomEvent::new("load", 1, None));
    ctx.register_dom_event(&Rc::downgrade(&scope), Rc::clone(&callback), &load);
    load.fire();
    let mut payload = IndexMap::new();
    payload.insert("x".to_string(), DomValue::Double(0.5));
    let scroll = Rc::new(DomEvent::new("scroll", 2, Some(DomValue::Object(payload))));
    ctx.register_dom_event(&Rc::downgrade(&scope), callback, &scroll);
    scroll.fire();
    assert_eq!(seen(&scope), "click:7:3,load:1:null,scroll:2:0.5");
}

#[test]
fn listener_errors_reach_the_uncaught_path() {
    let vm = LiteVm::new(None);
    let scope = event_scope(&vm);
    let ctx = scope.context();
    ctx.run_script("var reported = 0; function BridgeExceptionHandler(e) { reported++; }", "ExceptionHandle.js")
        .unwrap();
    let failing = ctx.run_script("(function () { throw new Error('listener failed'); })", "fail.js").unwrap();
    let event = Rc::new(DomEvent::new("click", 1, None));
    ctx.register_dom_event(&Rc::downgrade(&scope), failing, &event);
    event.fire();
    let reported = ctx.run_script("reported", "count.js").unwrap();
    assert_eq!(ctx.get_value_number(&reported), Some(1.0));
}

#[test]
fn firing_after_the_scope_is_gone_is_harmless() {
    let vm = LiteVm::new(None);
    let scope = event_scope(&vm);
    let event = Rc::new(DomEvent::new("click", 7, Some(DomValue::Int32(3))));
    {
        let ctx = scope.context();
        let callback = ctx.get_js_fn("onEvent").unwrap();
        ctx.register_dom_event(&Rc::downgrade(&scope), callback, &event);
    }
    drop(scope);
    assert_eq!(vm.live_contexts(), 0);
    assert_eq!(event.fire(), 1);
}
