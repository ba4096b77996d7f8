use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::napi::{Ctx, CtxValueRef, PropertyAttribute};
use crate::scope::Scope;

/// Arguments, receiver and result slots of one call from script into native code.
pub struct CallbackInfo {
    this: CtxValueRef,
    args: Vec<CtxValueRef>,
    scope: RefCell<Weak<Scope>>,
    return_value: RefCell<Option<CtxValueRef>>,
    exception: RefCell<Option<CtxValueRef>>,
}

impl CallbackInfo {
    pub fn new(this: CtxValueRef, args: Vec<CtxValueRef>) -> Self {
        CallbackInfo {
            this,
            args,
            scope: RefCell::new(Weak::new()),
            return_value: RefCell::new(None),
            exception: RefCell::new(None),
        }
    }

    pub fn this(&self) -> &CtxValueRef {
        &self.this
    }

    pub fn args(&self) -> &[CtxValueRef] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CtxValueRef> {
        self.args.get(index)
    }

    /// The scope the invoked binding belongs to, if it is still alive.
    pub fn scope(&self) -> Option<Rc<Scope>> {
        self.scope.borrow().upgrade()
    }

    pub(crate) fn set_scope(&self, scope: Weak<Scope>) {
        *self.scope.borrow_mut() = scope;
    }

    pub fn set_return_value(&self, value: CtxValueRef) {
        *self.return_value.borrow_mut() = Some(value);
    }

    pub fn take_return_value(&self) -> Option<CtxValueRef> {
        self.return_value.borrow_mut().take()
    }

    /// Marks the call as failed; the engine throws `exception` into the caller once the callback returns.
    pub fn throw(&self, exception: CtxValueRef) {
        *self.exception.borrow_mut() = Some(exception);
    }

    pub fn has_exception(&self) -> bool {
        self.exception.borrow().is_some()
    }

    pub fn take_exception(&self) -> Option<CtxValueRef> {
        self.exception.borrow_mut().take()
    }
}

pub type JsCallback = Rc<dyn Fn(&CallbackInfo)>;

/// Function name -> callback, e.g. `"Log" -> console_log`.
pub type ModuleClass = HashMap<String, JsCallback>;

/// Class name -> module class, e.g. `"Console" -> { "Log", "Warn" }`.
pub type ModuleClassMap = HashMap<String, ModuleClass>;

/// Opaque payload handed to a native binding together with the call arguments.
pub struct CallbackTuple<'a> {
    pub data: &'a Rc<dyn Any>,
    pub arguments: &'a [CtxValueRef],
}

/// Native binding whose result is always `undefined`.
pub type RegisterFunction = Rc<dyn Fn(&CallbackTuple<'_>)>;

/// Native binding that may produce a value; `None` means `undefined`.
pub type NativeFunction = Rc<dyn Fn(&CallbackTuple<'_>) -> Option<CtxValueRef>>;

/// A native callback bound to the scope that registered it.
///
/// The scope is held weakly: the scope owns the context, the context owns the installed
/// function, and the function owns this data.
pub struct FunctionData {
    scope: Weak<Scope>,
    callback: JsCallback,
}

impl FunctionData {
    pub fn new(scope: Weak<Scope>, callback: JsCallback) -> Self {
        FunctionData { scope, callback }
    }

    pub fn scope(&self) -> &Weak<Scope> {
        &self.scope
    }

    /// Runs the callback. Returns `false` without calling it when the scope is gone.
    pub fn invoke(&self, info: &CallbackInfo) -> bool {
        let Some(scope) = self.scope.upgrade() else {
            log::warn!("native callback skipped: owning scope has been released");
            return false;
        };
        info.set_scope(Rc::downgrade(&scope));
        (self.callback)(info);
        true
    }

    /// Wraps this data into the callback shape engines install as a native entry point.
    pub fn into_thunk(self) -> JsCallback {
        let data = Rc::new(self);
        Rc::new(move |info: &CallbackInfo| {
            data.invoke(info);
        })
    }
}

/// A whole module map bound to its scope, ready to be materialised into a context.
pub struct BindingData {
    scope: Weak<Scope>,
    map: ModuleClassMap,
}

impl BindingData {
    pub fn new(scope: Weak<Scope>, map: ModuleClassMap) -> Self {
        BindingData { scope, map }
    }

    pub fn scope(&self) -> &Weak<Scope> {
        &self.scope
    }

    pub fn map(&self) -> &ModuleClassMap {
        &self.map
    }

    /// Installs one global object per class with one thunk per function. Returns the number of
    /// functions installed.
    pub fn install<C: Ctx + ?Sized>(&self, ctx: &C) -> usize {
        let mut installed = 0;
        for (class_name, functions) in &self.map {
            let module = ctx.create_object(&IndexMap::new());
            for (function_name, callback) in functions {
                let thunk = FunctionData::new(self.scope.clone(), Rc::clone(callback)).into_thunk();
                let function = ctx.create_function(function_name, thunk);
                if ctx.set_property(&module, function_name, &function, PropertyAttribute::empty()) {
                    installed += 1;
                } else {
                    log::warn!("failed to install {class_name}.{function_name}");
                }
            }
            if !ctx.set_global_obj_var(class_name, &module, PropertyAttribute::empty()) {
                log::warn!("failed to install module {class_name}");
            }
            log::debug!("module {class_name} installed with {} function(s)", functions.len());
        }
        installed
    }
}
