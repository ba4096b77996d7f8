use std::cell::Cell;
use std::rc::Rc;

use jsbridge::{Ctx, CtxValueRef, InstanceDefine, JsResult, LiteVm, ModuleClassMap, Scope};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

#[derive(Debug)]
struct Counter {
    value: Cell<f64>,
}

fn counter_define() -> Rc<InstanceDefine<Counter>> {
    let define = InstanceDefine::new(
        "Counter",
        Rc::new(|ctx: &Rc<dyn Ctx>, args: &[CtxValueRef]| -> JsResult<Rc<Counter>> {
            let start = match args.first() {
                Some(arg) => ctx.get_value_number(arg).ok_or_else(|| ctx.create_type_error("start must be a number"))?,
                None => 0.0,
            };
            Ok(Rc::new(Counter { value: Cell::new(start) }))
        }),
    )
    .with_property(
        "value",
        Some(Rc::new(|thiz: &Rc<Counter>, ctx: &Rc<dyn Ctx>| -> JsResult<CtxValueRef> {
            Ok(ctx.create_number(thiz.value.get()))
        })),
        Some(Rc::new(|thiz: &Rc<Counter>, ctx: &Rc<dyn Ctx>, value: &CtxValueRef| -> JsResult<()> {
            let value = ctx.get_value_number(value).ok_or_else(|| ctx.create_type_error("value must be a number"))?;
            thiz.value.set(value);
            Ok(())
        })),
    )
    .with_function(
        "inc",
        Rc::new(|thiz: &Rc<Counter>, ctx: &Rc<dyn Ctx>, args: &[CtxValueRef]| -> JsResult<CtxValueRef> {
            let step = args.first().and_then(|arg| ctx.get_value_number(arg)).unwrap_or(1.0);
            thiz.value.set(thiz.value.get() + step);
            Ok(ctx.create_number(thiz.value.get()))
        }),
    );
    Rc::new(define)
}

fn counter_scope(vm: &LiteVm, define: &Rc<InstanceDefine<Counter>>) -> Rc<Scope> {
    let scope = Scope::new(vm, "counter");
    scope.add_class(Rc::clone(define));
    assert!(scope.initialize(&ModuleClassMap::new()));
    scope
}

fn eval_number(scope: &Scope, source: &str) -> Option<f64> {
    let ctx = scope.context();
    let result = ctx.run_script(source, "counter.js")?;
    ctx.get_value_number(&result)
}

fn eval_string(scope: &Scope, source: &str) -> Option<String> {
    let ctx = scope.context();
    let result = ctx.run_script(source, "counter.js")?;
    ctx.get_value_string(&result)
}

#[test]
fn accessors_and_methods_reach_the_native_instance() {
    let vm = LiteVm::new(None);
    let define = counter_define();
    let scope = counter_scope(&vm, &define);
    assert_eq!(eval_number(&scope, "const c = new Counter(5); c.value = 7; c.inc(); c.inc(8); c.value"), Some(16.0));
    assert_eq!(define.instance_count(), 1);

    // `const` bindings are not global object properties.
    assert!(scope.context().get_global_obj_var("c").is_none());
    assert_eq!(
        eval_string(&scope, "[typeof Counter, c instanceof Counter, 'value' in c, Object.keys(c).length].join()"),
        Some("function,true,true,0".to_string())
    );
}

#[test]
fn distinct_objects_map_to_distinct_instances() {
    let vm = LiteVm::new(None);
    let define = counter_define();
    let scope = counter_scope(&vm, &define);
    assert_eq!(eval_number(&scope, "var a = new Counter(1), b = new Counter(2); a.inc(); a.value * 10 + b.value"), Some(22.0));
    assert_eq!(define.instance_count(), 2);

    let ctx = scope.context();
    let a = ctx.get_global_obj_var("a").unwrap();
    let b = ctx.get_global_obj_var("b").unwrap();
    let a_id = ctx.object_identity(&a).unwrap();
    let b_id = ctx.object_identity(&b).unwrap();
    assert_ne!(a_id, b_id);
    assert_eq!(define.instance(a_id).map(|counter| counter.value.get()), Some(2.0));
    assert_eq!(define.instance(b_id).map(|counter| counter.value.get()), Some(2.0));
    assert!(!Rc::ptr_eq(&define.instance(a_id).unwrap(), &define.instance(b_id).unwrap()));
}

#[test]
fn unreferenced_instances_are_released() {
    let vm = LiteVm::new(None);
    let define = counter_define();
    let scope = counter_scope(&vm, &define);
    assert_eq!(eval_number(&scope, "new Counter(1); 0"), Some(0.0));
    assert_eq!(define.instance_count(), 0);

    assert_eq!(eval_number(&scope, "var kept = new Counter(1); kept = null; 0"), Some(0.0));
    assert_eq!(define.instance_count(), 0);
}

#[test]
fn illegal_receivers_and_plain_calls_throw_type_errors() {
    let vm = LiteVm::new(None);
    let define = counter_define();
    let scope = counter_scope(&vm, &define);
    let source = r#"
        const out = [];
        try { Counter.prototype.inc.call({}); } catch (e) { out.push(e.name); }
        try { Counter(1); } catch (e) { out.push(e.name + ':' + e.message); }
        try { new Counter('x'); } catch (e) { out.push(e.message); }
        out.join('|')
    "#;
    assert_eq!(
        eval_string(&scope, source),
        Some("TypeError|TypeError:Class constructor Counter cannot be invoked without 'new'|start must be a number".to_string())
    );
    assert_eq!(define.instance_count(), 0);
}

#[test]
fn setter_errors_propagate() {
    let vm = LiteVm::new(None);
    let define = counter_define();
    let scope = counter_scope(&vm, &define);
    let source = "const c = new Counter(); let msg; try { c.value = 'nope'; } catch (e) { msg = e.message; } msg + ':' + c.value";
    assert_eq!(eval_string(&scope, source), Some("value must be a number:0".to_string()));
}

#[test]
fn dropping_the_scope_empties_the_holder() {
    let vm = LiteVm::new(None);
    let define = counter_define();
    let scope = counter_scope(&vm, &define);
    assert_eq!(eval_number(&scope, "var keep = new Counter(3); var cycle = { keep }; cycle.self = cycle; keep.value"), Some(3.0));
    assert_eq!(define.instance_count(), 1);
    drop(scope);
    assert_eq!(define.instance_count(), 0);
    assert_eq!(vm.live_contexts(), 0);
}
