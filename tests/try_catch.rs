use std::cell::{Cell, RefCell};
use std::rc::Rc;

use jsbridge::napi::{CallbackInfo, CallbackTuple, ERROR_HANDLER_NAME};
use jsbridge::{Ctx, LiteCtx, LiteVm, VmInitParam};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

/// Installs a native `BridgeExceptionHandler` recording the message of every exception it receives.
fn install_handler(ctx: &Rc<LiteCtx>) -> Rc<RefCell<Vec<String>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let weak = Rc::downgrade(ctx);
    let sink = Rc::clone(&seen);
    let installed = ctx.register_native_binding(
        ERROR_HANDLER_NAME,
        Rc::new(move |tuple: &CallbackTuple<'_>| {
            let (Some(ctx), Some(exception)) = (weak.upgrade(), tuple.arguments.first()) else {
                return;
            };
            sink.borrow_mut().push(ctx.exception_message(exception));
        }),
        Rc::new(()),
    );
    assert!(installed);
    seen
}

#[test]
fn armed_catcher_captures_script_errors() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let seen = install_handler(&ctx);
    let try_catch = ctx.try_catch(true);
    assert!(!try_catch.has_caught());
    assert!(ctx.run_script("null.field", "armed.js").is_none());
    assert!(try_catch.has_caught());
    assert!(try_catch.can_continue());
    assert!(!try_catch.has_terminated());
    let message = try_catch.exception_message();
    assert!(message.starts_with("TypeError"), "{message}");
    let exception = try_catch.exception().unwrap();
    assert!(ctx.is_object(&exception));
    assert!(seen.borrow().is_empty());
}

#[test]
fn disarmed_catcher_reports_to_the_handler_once() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let seen = install_handler(&ctx);
    let try_catch = ctx.try_catch(false);
    assert!(ctx.run_script("throw new RangeError('out of range')", "disarmed.js").is_none());
    assert!(!try_catch.has_caught());
    assert_eq!(seen.borrow().len(), 1);
    assert!(seen.borrow()[0].starts_with("RangeError: out of range"), "{:?}", seen.borrow());
}

#[test]
fn uncaught_without_handler_logs_and_continues() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    assert!(ctx.run_script("throw 'plain'", "uncaught.js").is_none());
    let result = ctx.run_script("40 + 2", "after.js").unwrap();
    assert_eq!(ctx.get_value_number(&result), Some(42.0));
}

#[test]
fn later_capture_replaces_earlier_one() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let try_catch = ctx.try_catch(true);
    assert!(ctx.run_script("throw 1", "first.js").is_none());
    assert!(ctx.run_script("throw 2", "second.js").is_none());
    assert_eq!(try_catch.exception_message(), "2");
}

#[test]
fn rethrow_reaches_the_enclosing_catcher() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let outer = ctx.try_catch(true);
    {
        let inner = ctx.try_catch(true);
        assert!(ctx.run_script("throw new Error('passed along')", "rethrow.js").is_none());
        assert!(inner.has_caught());
        inner.rethrow();
        // A capture is rethrown at most once.
        inner.rethrow();
    }
    assert!(outer.has_caught());
    assert_eq!(outer.exception_message().lines().next(), Some("Error: passed along"));
}

#[test]
fn rethrow_without_enclosing_catcher_reaches_the_handler() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let seen = install_handler(&ctx);
    let try_catch = ctx.try_catch(true);
    assert!(ctx.run_script("throw new Error('escalate')", "escalate.js").is_none());
    try_catch.rethrow();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn verbose_catcher_also_reports() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let seen = install_handler(&ctx);
    let try_catch = ctx.try_catch(true);
    assert!(!try_catch.is_verbose());
    try_catch.set_verbose(true);
    assert!(try_catch.is_verbose());
    assert!(ctx.run_script("throw new Error('loud')", "verbose.js").is_none());
    assert!(try_catch.has_caught());
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn exceptions_from_native_calls_surface_in_the_calling_script() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let weak = Rc::downgrade(&ctx);
    let call_back = ctx.create_function(
        "callBack",
        Rc::new(move |info: &CallbackInfo| {
            let (Some(ctx), Some(function)) = (weak.upgrade(), info.get(0)) else {
                return;
            };
            // No catcher at this level: the failure stays pending for the caller.
            assert!(ctx.call_function(function, &[]).is_none());
        }),
    );
    assert!(ctx.set_global_obj_var("callBack", &call_back, Default::default()));
    let source = r#"
        let caught = "none";
        try {
            callBack(() => { throw new Error("from callback"); });
        } catch (e) {
            caught = e.message;
        }
        caught
    "#;
    let result = ctx.run_script(source, "nested.js").unwrap();
    assert_eq!(ctx.get_value_string(&result).as_deref(), Some("from callback"));
}

#[test]
fn native_catcher_can_swallow_or_forward() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let weak = Rc::downgrade(&ctx);
    let guarded = ctx.create_function(
        "guarded",
        Rc::new(move |info: &CallbackInfo| {
            let (Some(ctx), Some(function), Some(forward)) = (weak.upgrade(), info.get(0), info.get(1)) else {
                return;
            };
            let try_catch = ctx.try_catch(true);
            if ctx.call_function(function, &[]).is_none() && try_catch.has_caught() {
                if ctx.get_value_boolean(forward) == Some(true) {
                    try_catch.rethrow();
                } else {
                    info.set_return_value(ctx.create_string("swallowed"));
                }
            }
        }),
    );
    assert!(ctx.set_global_obj_var("guarded", &guarded, Default::default()));
    let swallowed = ctx.run_script("guarded(() => { throw 1; }, false)", "swallow.js").unwrap();
    assert_eq!(ctx.get_value_string(&swallowed).as_deref(), Some("swallowed"));
    let forwarded = ctx
        .run_script("let out; try { guarded(() => { throw 'up'; }, true); } catch (e) { out = e; } out", "forward.js")
        .unwrap();
    assert_eq!(ctx.get_value_string(&forwarded).as_deref(), Some("up"));
}

#[test]
fn info_throw_raises_in_the_caller() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let weak = Rc::downgrade(&ctx);
    let reject = ctx.create_function(
        "reject",
        Rc::new(move |info: &CallbackInfo| {
            if let Some(ctx) = weak.upgrade() {
                info.throw(ctx.create_type_error("rejected by native"));
                assert!(info.has_exception());
            }
        }),
    );
    assert!(ctx.set_global_obj_var("reject", &reject, Default::default()));
    let result = ctx
        .run_script("try { reject(); 'no' } catch (e) { e instanceof TypeError ? e.message : 'wrong type' }", "reject.js")
        .unwrap();
    assert_eq!(ctx.get_value_string(&result).as_deref(), Some("rejected by native"));
}

#[test]
fn termination_skips_finally_and_is_not_catchable() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let handle = vm.termination_handle();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let stop = ctx.create_function(
        "stop",
        Rc::new(move |_: &CallbackInfo| {
            counter.set(counter.get() + 1);
            handle.terminate();
        }),
    );
    assert!(ctx.set_global_obj_var("stop", &stop, Default::default()));
    let try_catch = ctx.try_catch(true);
    let source = r#"
        var cleanedUp = false;
        try {
            while (true) { stop(); }
        } catch (e) {
            cleanedUp = "caught";
        } finally {
            cleanedUp = true;
        }
    "#;
    assert!(ctx.run_script(source, "forever.js").is_none());
    assert_eq!(calls.get(), 1);
    assert!(try_catch.has_caught());
    assert!(try_catch.has_terminated());
    assert!(!try_catch.can_continue());
    assert!(try_catch.exception().is_none());
    assert!(!vm.termination_handle().is_terminating());

    let cleaned_up = ctx.run_script("cleanedUp", "check.js").unwrap();
    assert_eq!(ctx.get_value_boolean(&cleaned_up), Some(false));
}

#[test]
fn stack_overflow_is_fatal() {
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let vm = LiteVm::new(Some(VmInitParam {
                max_call_depth: 32,
                ..Default::default()
            }));
            let ctx = vm.create_lite_context();
            let try_catch = ctx.try_catch(true);
            let source = "function recurse(n) { return recurse(n + 1); }\ntry { recurse(0); } catch (e) { 'caught' }";
            assert!(ctx.run_script(source, "overflow.js").is_none());
            assert!(try_catch.has_caught());
            assert!(!try_catch.can_continue());
            assert!(!try_catch.has_terminated());
            let message = try_catch.exception_message();
            assert!(message.starts_with("RangeError: Maximum call stack size exceeded"), "{message}");

            let depth = ctx.run_script("function down(n) { return n == 0 ? 0 : down(n - 1); } down(20)", "ok.js").unwrap();
            assert_eq!(ctx.get_value_number(&depth), Some(0.0));
        })
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn deep_recursion_on_a_default_thread_is_fatal() {
    let vm = LiteVm::new(Some(VmInitParam {
        max_call_depth: 1_000_000,
        ..Default::default()
    }));
    let ctx = vm.create_lite_context();
    let try_catch = ctx.try_catch(true);
    let source = "function count(n) { return n == 0 ? 0 : 1 + count(n - 1); }\ncount(100000)";
    assert!(ctx.run_script(source, "deep.js").is_none());
    assert!(try_catch.has_caught());
    assert!(!try_catch.can_continue());
    let message = try_catch.exception_message();
    assert!(message.starts_with("RangeError: Maximum call stack size exceeded"), "{message}");

    let shallow = ctx.run_script("count(10)", "shallow.js").unwrap();
    assert_eq!(ctx.get_value_number(&shallow), Some(10.0));
}

#[test]
fn throwing_handler_is_not_rerouted() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let source = r#"
        var handled = 0;
        function BridgeExceptionHandler(e) {
            handled++;
            throw new Error("handler failed");
        }
    "#;
    ctx.run_script(source, "ExceptionHandle.js").unwrap();
    assert!(ctx.run_script("throw new Error('first')", "boom.js").is_none());
    let handled = ctx.run_script("handled", "count.js").unwrap();
    assert_eq!(ctx.get_value_number(&handled), Some(1.0));
}

#[test]
fn host_thrown_exceptions_follow_the_same_routing() {
    let vm = LiteVm::new(None);
    let ctx = vm.create_lite_context();
    let seen = install_handler(&ctx);
    {
        let try_catch = ctx.try_catch(true);
        ctx.throw_exception_message("from host");
        assert!(try_catch.has_caught());
        assert_eq!(try_catch.exception_message().lines().next(), Some("Error: from host"));
    }
    let value = ctx.create_string("direct");
    ctx.handle_uncaught_exception(&value);
    assert_eq!(*seen.borrow(), vec!["direct".to_string()]);
}
