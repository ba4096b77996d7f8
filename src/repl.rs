use std::rc::Rc;

use crate::napi::{CallbackInfo, Ctx, CtxValueRef, ModuleClass, ModuleClassMap, Vm, VmInitParam};
use crate::{LiteVm, Scope};

/// A persistent script session on the reference engine.
///
/// Notes:
/// - `Repl::new()` creates one context with a `console` module installed.
/// - `Repl::eval(&self, code)` runs code in that context, so globals and functions persist
///   between calls.
pub struct Repl {
    // Declared before `vm`: the context must go first.
    scope: Rc<Scope>,
    vm: LiteVm,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_param(VmInitParam::default())
    }

    pub fn with_param(param: VmInitParam) -> Self {
        let vm = LiteVm::new(Some(param));
        let scope = Scope::new(&vm, "repl");
        if !scope.initialize(&console_module()) {
            log::error!("repl: scope initialisation failed");
        }
        Repl { scope, vm }
    }

    pub fn context(&self) -> &Rc<dyn Ctx> {
        self.scope.context()
    }

    pub fn vm(&self) -> &dyn Vm {
        &self.vm
    }

    /// Evaluates `script` and renders its completion value.
    pub fn eval<T: AsRef<str>>(&self, script: T) -> Result<String, String> {
        self.eval_named(script.as_ref(), "<repl>")
    }

    /// Like [`Repl::eval`], attributing the code to `file_name` in stack traces. The error is the
    /// exception message (with its stack when there is one).
    pub fn eval_named(&self, script: &str, file_name: &str) -> Result<String, String> {
        let ctx = self.context();
        let try_catch = ctx.try_catch(true);
        match ctx.run_script(script, file_name) {
            Some(value) => Ok(display_value(ctx.as_ref(), &value, true)),
            None if try_catch.has_caught() => Err(try_catch.exception_message()),
            None => Err(format!("{file_name}: script failed")),
        }
    }

    pub fn is_complete_input(src: &str) -> bool {
        crate::repl_utils::is_complete_input(src)
    }
}

/// Console rendering of a value. Top-level strings print bare when `bare_strings` is set.
pub fn display_value(ctx: &dyn Ctx, value: &CtxValueRef, bare_strings: bool) -> String {
    if bare_strings && let Some(s) = ctx.get_value_string(value) {
        return s;
    }
    if ctx.is_function(value) {
        let name = ctx.copy_function_name(value).filter(|name| !name.is_empty());
        return format!("[Function: {}]", name.as_deref().unwrap_or("(anonymous)"));
    }
    if ctx.is_object(value) && ctx.has_named_property(value, "stack") && ctx.has_named_property(value, "message") {
        return ctx.exception_message(value);
    }
    match ctx.to_js_value_wrapper(value) {
        Some(wrapper) => wrapper.to_string(),
        None => "[object Object]".to_string(),
    }
}

fn console_module() -> ModuleClassMap {
    let mut console = ModuleClass::new();
    for level in ["log", "info", "warn", "error"] {
        console.insert(
            level.to_string(),
            Rc::new(move |info: &CallbackInfo| {
                let Some(scope) = info.scope() else {
                    return;
                };
                let ctx = scope.context();
                let line = info
                    .args()
                    .iter()
                    .map(|arg| display_value(ctx.as_ref(), arg, true))
                    .collect::<Vec<_>>()
                    .join(" ");
                match level {
                    "warn" | "error" => eprintln!("{line}"),
                    _ => println!("{line}"),
                }
            }),
        );
    }
    let mut modules = ModuleClassMap::new();
    modules.insert("console".to_string(), console);
    modules
}
