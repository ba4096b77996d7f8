use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::lite::interp::{Completion, ErrorKind, Interp, Throw};
use crate::lite::object::{NativeFn, ObjectKind, ObjectRef, Property, Value, identity};
use crate::lite::try_catch::{CatchSlot, LiteTryCatch};
use crate::lite::vm::VmShared;
use crate::lite::{builtins, json, parser};
use crate::napi::{
    ByteBuffer, CallbackInfo, ClassTemplate, Ctx, CtxValue, CtxValueRef, ERROR_HANDLER_JS_NAME, ERROR_HANDLER_NAME, GLOBAL_ALIAS_NAME, JsCallback,
    PropertyAttribute, TryCatch, UncaughtExceptionPolicy,
};

/// Hidden native hook the default error handler reports through.
const REPORT_HOOK_NAME: &str = "__bridgeReportUncaught";

/// Installs a default error handler unless one is already defined.
fn error_handler_source() -> String {
    format!(
        "if (typeof {ERROR_HANDLER_NAME} !== 'function') {{ globalThis.{ERROR_HANDLER_NAME} = function {ERROR_HANDLER_NAME}(error) {{ {REPORT_HOOK_NAME}(error); }}; }}"
    )
}

/// Handle to a value living in a [`LiteCtx`].
#[derive(Debug)]
pub struct LiteCtxValue(pub(crate) Value);

impl CtxValue for LiteCtxValue {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One global scope of the reference engine.
pub struct LiteCtx {
    me: Weak<LiteCtx>,
    interp: Interp,
    vm: Rc<VmShared>,
    catchers: RefCell<Vec<Rc<CatchSlot>>>,
    /// Native callbacks currently on the stack.
    callback_depth: Cell<usize>,
    /// Exception raised inside a native callback with no catcher of its own; thrown into the
    /// calling script once the callback returns.
    pending: RefCell<Option<Throw>>,
    reporting: Cell<bool>,
    scripts_started: Cell<bool>,
}

impl LiteCtx {
    pub(crate) fn new(vm: Rc<VmShared>) -> Rc<LiteCtx> {
        let interp = Interp::new(vm.param.max_call_depth, vm.param.stack_budget, Arc::clone(&vm.terminate));
        vm.live_contexts.set(vm.live_contexts.get() + 1);
        log::debug!("lite context created ({} live)", vm.live_contexts.get());
        Rc::new_cyclic(|me| LiteCtx {
            me: me.clone(),
            interp,
            vm,
            catchers: RefCell::new(Vec::new()),
            callback_depth: Cell::new(0),
            pending: RefCell::new(None),
            reporting: Cell::new(false),
            scripts_started: Cell::new(false),
        })
    }

    pub(crate) fn wrap(&self, value: Value) -> CtxValueRef {
        Rc::new(LiteCtxValue(value))
    }

    fn unwrap(&self, value: &CtxValueRef) -> Value {
        match value.as_any().downcast_ref::<LiteCtxValue>() {
            Some(value) => value.0.clone(),
            None => {
                log::error!("value {value:?} does not belong to a lite context; treated as undefined");
                Value::Undefined
            }
        }
    }

    fn object(&self, value: &CtxValueRef) -> Option<ObjectRef> {
        match self.unwrap(value) {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    fn global_value(&self) -> Value {
        Value::Object(Rc::clone(self.interp.global()))
    }

    pub(crate) fn callback_level(&self) -> usize {
        self.callback_depth.get()
    }

    pub(crate) fn push_catcher(&self, slot: Rc<CatchSlot>) {
        self.catchers.borrow_mut().push(slot);
    }

    pub(crate) fn remove_catcher(&self, slot: &Rc<CatchSlot>) {
        self.catchers.borrow_mut().retain(|candidate| !Rc::ptr_eq(candidate, slot));
    }

    /// Delivers an abrupt completion: to the innermost armed catcher of the current callback
    /// level (below `below` when rethrowing), else to the pending slot inside a callback, else
    /// to the uncaught path.
    pub(crate) fn route(&self, throw: Throw, below: Option<&Rc<CatchSlot>>) {
        let level = self.callback_depth.get();
        if level == 0 && matches!(throw, Throw::Terminated) {
            self.interp.clear_termination();
        }
        let target = {
            let catchers = self.catchers.borrow();
            let end = below
                .and_then(|slot| catchers.iter().position(|candidate| Rc::ptr_eq(candidate, slot)))
                .unwrap_or(catchers.len());
            catchers[..end].iter().rev().find(|slot| slot.armed && slot.level == level).cloned()
        };
        match target {
            Some(slot) => {
                let verbose = slot.verbose.get();
                slot.capture(throw.clone());
                if verbose {
                    self.report_uncaught(&throw);
                }
            }
            None if level > 0 => {
                let previous = self.pending.replace(Some(throw));
                drop(previous);
            }
            None => self.report_uncaught(&throw),
        }
    }

    fn report_uncaught(&self, throw: &Throw) {
        match throw {
            Throw::Terminated => log::warn!("script execution terminated"),
            Throw::Exception(value) | Throw::Fatal(value) => self.handle_uncaught_value(value),
        }
    }

    fn handle_uncaught_value(&self, exception: &Value) {
        let message = self.value_message(exception);
        if self.reporting.replace(true) {
            log::error!("exception raised while reporting an uncaught exception: {message}");
            return;
        }
        let handler = match self.interp.find_property(self.interp.global(), ERROR_HANDLER_NAME) {
            Some(Property::Data { value, .. }) if value.is_callable() => Some(value),
            _ => None,
        };
        match handler {
            Some(handler) => {
                log::debug!("routing uncaught exception to {ERROR_HANDLER_NAME}: {message}");
                if let Err(throw) = self.interp.call(&handler, Value::Undefined, &[exception.clone()]) {
                    log::error!("{ERROR_HANDLER_NAME} threw: {}", self.throw_message(&throw));
                    if matches!(throw, Throw::Terminated) && self.callback_depth.get() == 0 {
                        self.interp.clear_termination();
                    }
                }
            }
            None => self.apply_uncaught_policy(&message),
        }
        self.reporting.set(false);
    }

    fn apply_uncaught_policy(&self, message: &str) {
        match self.vm.param.uncaught_exception_policy {
            UncaughtExceptionPolicy::LogAndContinue => log::error!("uncaught exception: {message}"),
            UncaughtExceptionPolicy::Abort => {
                log::error!("uncaught exception, aborting: {message}");
                std::process::abort();
            }
        }
    }

    fn install_report_hook(&self) -> bool {
        let me = self.me.clone();
        let report: NativeFn = Rc::new(move |_interp: &Interp, _this: &Value, args: &[Value], _construct: bool| {
            if let Some(ctx) = me.upgrade() {
                let message = ctx.value_message(&args.first().cloned().unwrap_or_default());
                ctx.apply_uncaught_policy(&message);
            }
            Ok(Value::Undefined)
        });
        let hook = self.interp.new_native_function(REPORT_HOOK_NAME, report);
        self.interp.define_own(self.interp.global(), REPORT_HOOK_NAME, Property::hidden(Value::Object(hook)))
    }

    fn value_message(&self, value: &Value) -> String {
        Ctx::exception_message(self, &self.wrap(value.clone()))
    }

    pub(crate) fn throw_message(&self, throw: &Throw) -> String {
        match throw {
            Throw::Exception(value) | Throw::Fatal(value) => self.value_message(value),
            Throw::Terminated => "execution terminated".to_string(),
        }
    }

    fn complete(&self, completion: Completion) -> Option<CtxValueRef> {
        match completion {
            Ok(value) => Some(self.wrap(value)),
            Err(throw) => {
                self.route(throw, None);
                None
            }
        }
    }

    /// Runs a native callback on behalf of script and turns its outcome back into a completion.
    fn invoke_callback(&self, callback: &JsCallback, this: &Value, args: &[Value]) -> Completion {
        let info = CallbackInfo::new(self.wrap(this.clone()), args.iter().map(|arg| self.wrap(arg.clone())).collect());
        let depth = self.callback_depth.get();
        let outer_pending = self.pending.take();
        self.callback_depth.set(depth + 1);
        callback(&info);
        self.callback_depth.set(depth);
        let pending = self.pending.replace(outer_pending);
        if let Some(throw) = pending {
            return Err(throw);
        }
        if let Some(exception) = info.take_exception() {
            return Err(Throw::Exception(self.unwrap(&exception)));
        }
        Ok(info.take_return_value().map(|value| self.unwrap(&value)).unwrap_or_default())
    }

    fn native_function(&self, name: &str, callback: JsCallback) -> ObjectRef {
        let me = self.me.clone();
        let native: NativeFn = Rc::new(move |_interp: &Interp, this: &Value, args: &[Value], _construct: bool| {
            let Some(ctx) = me.upgrade() else {
                return Ok(Value::Undefined);
            };
            ctx.invoke_callback(&callback, this, args)
        });
        self.interp.new_native_function(name, native)
    }

    fn run_program(&self, source: &str, file_name: &str) -> Completion {
        self.interp.with_stack(|| match parser::parse_script(source, self.interp.stack_guard()) {
            Ok(program) => self.interp.run_program(&program, file_name),
            Err(err) => {
                let line = err.line().unwrap_or(0);
                let message = format!("{file_name}:{line}: {}", err.message());
                log::debug!("parse error: {message}");
                Err(Throw::Exception(self.interp.new_error(ErrorKind::Syntax, &message)))
            }
        })
    }
}

impl Drop for LiteCtx {
    fn drop(&mut self) {
        let live = self.vm.live_contexts.get().saturating_sub(1);
        self.vm.live_contexts.set(live);
        log::debug!("lite context dropped ({live} live)");
    }
}

impl Ctx for LiteCtx {
    fn register_global_in_js(&self) -> bool {
        let global = Rc::clone(self.interp.global());
        if !self.interp.define_own(&global, GLOBAL_ALIAS_NAME, Property::hidden(self.global_value())) || !self.install_report_hook() {
            return false;
        }
        match self.run_program(&error_handler_source(), ERROR_HANDLER_JS_NAME) {
            Ok(_) => true,
            Err(throw) => {
                log::error!("{ERROR_HANDLER_JS_NAME} failed: {}", self.throw_message(&throw));
                false
            }
        }
    }

    fn set_global_obj_var(&self, name: &str, obj: &CtxValueRef, attr: PropertyAttribute) -> bool {
        let value = self.unwrap(obj);
        if self.scripts_started.get() && value.is_callable() {
            log::warn!("global function {name} registered after scripts started running");
        }
        self.interp.define_own(self.interp.global(), name, Property::Data { value, attr })
    }

    fn get_global_obj_var(&self, name: &str) -> Option<CtxValueRef> {
        if !self.interp.has_property(self.interp.global(), name) {
            return None;
        }
        self.get_property(&self.wrap(self.global_value()), name)
    }

    fn set_property(&self, object: &CtxValueRef, key: &str, value: &CtxValueRef, attr: PropertyAttribute) -> bool {
        let Some(obj) = self.object(object) else {
            return false;
        };
        self.interp.define_own(&obj, key, Property::Data { value: self.unwrap(value), attr })
    }

    fn get_property(&self, object: &CtxValueRef, name: &str) -> Option<CtxValueRef> {
        let target = self.unwrap(object);
        if target.is_nullish() {
            return None;
        }
        let completion = self.interp.get(&target, name);
        self.complete(completion)
    }

    fn delete_property(&self, object: &CtxValueRef, name: &str) -> bool {
        match self.object(object) {
            Some(obj) => self.interp.delete(&obj, name),
            None => false,
        }
    }

    fn create_number(&self, number: f64) -> CtxValueRef {
        self.wrap(Value::Number(number))
    }

    fn create_boolean(&self, b: bool) -> CtxValueRef {
        self.wrap(Value::Boolean(b))
    }

    fn create_string(&self, string: &str) -> CtxValueRef {
        self.wrap(Value::string(string))
    }

    fn create_undefined(&self) -> CtxValueRef {
        self.wrap(Value::Undefined)
    }

    fn create_null(&self) -> CtxValueRef {
        self.wrap(Value::Null)
    }

    fn parse_json(&self, json: &str) -> Option<CtxValueRef> {
        match json::parse(&self.interp, json) {
            Ok(value) => Some(self.wrap(value)),
            Err(err) => {
                log::debug!("parse_json rejected input: {err}");
                None
            }
        }
    }

    fn create_object(&self, properties: &IndexMap<String, CtxValueRef>) -> CtxValueRef {
        let obj = self.interp.new_object();
        for (key, value) in properties {
            self.interp.define_own(&obj, key, Property::data(self.unwrap(value)));
        }
        self.wrap(Value::Object(obj))
    }

    fn create_map(&self, entries: &[(CtxValueRef, CtxValueRef)]) -> CtxValueRef {
        let map = self.interp.new_map(Vec::with_capacity(entries.len()));
        if let Value::Object(obj) = &map {
            for (key, value) in entries {
                builtins::map_insert(obj, self.unwrap(key), self.unwrap(value));
            }
        }
        self.wrap(map)
    }

    fn create_array(&self, elements: &[CtxValueRef]) -> CtxValueRef {
        self.wrap(self.interp.new_array(elements.iter().map(|element| self.unwrap(element)).collect()))
    }

    fn create_error(&self, msg: &str) -> CtxValueRef {
        self.wrap(self.interp.new_error(ErrorKind::Error, msg))
    }

    fn create_type_error(&self, msg: &str) -> CtxValueRef {
        self.wrap(self.interp.new_error(ErrorKind::Type, msg))
    }

    fn create_byte_buffer_with_type(&self, bytes: &[u8], kind: u32) -> CtxValueRef {
        self.wrap(self.interp.new_array_buffer(bytes.to_vec(), kind))
    }

    fn create_function(&self, name: &str, callback: JsCallback) -> CtxValueRef {
        self.wrap(Value::Object(self.native_function(name, callback)))
    }

    fn define_class(&self, template: ClassTemplate) -> CtxValueRef {
        let ClassTemplate {
            name,
            constructor,
            accessors,
            methods,
            finalizer,
        } = template;
        let prototype = self.interp.new_object();
        let me = self.me.clone();
        let class_name = name.clone();
        let native: NativeFn = Rc::new(move |interp: &Interp, this: &Value, args: &[Value], construct: bool| {
            if !construct {
                return Err(interp.type_error(&format!("Class constructor {class_name} cannot be invoked without 'new'")));
            }
            let Some(ctx) = me.upgrade() else {
                return Ok(Value::Undefined);
            };
            if let (Value::Object(obj), Some(finalizer)) = (this, &finalizer) {
                let id = identity(obj);
                let finalizer = Rc::clone(finalizer);
                obj.borrow_mut().finalizer = Some(Box::new(move || finalizer(id)));
            }
            ctx.invoke_callback(&constructor, this, args)?;
            Ok(this.clone())
        });
        let ctor = self.interp.new_native_function(&name, native);
        ctor.borrow_mut().properties.insert(
            "prototype".to_string(),
            Property::Data {
                value: Value::Object(Rc::clone(&prototype)),
                attr: PropertyAttribute::READ_ONLY | PropertyAttribute::DONT_ENUM | PropertyAttribute::DONT_DELETE,
            },
        );
        self.interp
            .define_own(&prototype, "constructor", Property::hidden(Value::Object(Rc::clone(&ctor))));

        let accessor_count = accessors.len();
        for accessor in accessors {
            let getter = accessor
                .getter
                .map(|callback| Value::Object(self.native_function(&format!("get {}", accessor.name), callback)));
            let setter = accessor
                .setter
                .map(|callback| Value::Object(self.native_function(&format!("set {}", accessor.name), callback)));
            self.interp.define_own(
                &prototype,
                &accessor.name,
                Property::Accessor {
                    getter,
                    setter,
                    attr: PropertyAttribute::DONT_ENUM,
                },
            );
        }
        let method_count = methods.len();
        for method in methods {
            let function = self.native_function(&method.name, method.callback);
            self.interp.define_own(&prototype, &method.name, Property::hidden(Value::Object(function)));
        }
        log::debug!("class {name} defined with {accessor_count} accessor(s) and {method_count} method(s)");
        self.wrap(Value::Object(ctor))
    }

    fn call_function(&self, function: &CtxValueRef, args: &[CtxValueRef]) -> Option<CtxValueRef> {
        let function = self.unwrap(function);
        let args: Vec<Value> = args.iter().map(|arg| self.unwrap(arg)).collect();
        let completion = self.interp.call(&function, Value::Undefined, &args);
        self.complete(completion)
    }

    fn run_script(&self, source: &str, file_name: &str) -> Option<CtxValueRef> {
        self.scripts_started.set(true);
        log::debug!("running script {file_name} ({} bytes)", source.len());
        let completion = self.run_program(source, file_name);
        self.complete(completion)
    }

    fn get_value_number(&self, value: &CtxValueRef) -> Option<f64> {
        match self.unwrap(value) {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    fn get_value_boolean(&self, value: &CtxValueRef) -> Option<bool> {
        match self.unwrap(value) {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    fn get_value_string(&self, value: &CtxValueRef) -> Option<String> {
        match self.unwrap(value) {
            Value::String(s) => Some(s.to_string()),
            _ => None,
        }
    }

    fn get_value_json(&self, value: &CtxValueRef) -> Option<String> {
        match json::stringify(&self.interp, &self.unwrap(value), None) {
            Ok(text) => text,
            Err(throw) => {
                log::debug!("value has no JSON form: {}", self.throw_message(&throw));
                None
            }
        }
    }

    fn is_undefined(&self, value: &CtxValueRef) -> bool {
        matches!(self.unwrap(value), Value::Undefined)
    }

    fn is_null_or_undefined(&self, value: &CtxValueRef) -> bool {
        self.unwrap(value).is_nullish()
    }

    fn is_map(&self, value: &CtxValueRef) -> bool {
        self.object(value).is_some_and(|obj| matches!(obj.borrow().kind, ObjectKind::Map(_)))
    }

    fn is_string(&self, value: &CtxValueRef) -> bool {
        matches!(self.unwrap(value), Value::String(_))
    }

    fn is_number(&self, value: &CtxValueRef) -> bool {
        matches!(self.unwrap(value), Value::Number(_))
    }

    fn is_byte_buffer(&self, value: &CtxValueRef) -> bool {
        self.object(value)
            .is_some_and(|obj| matches!(obj.borrow().kind, ObjectKind::ArrayBuffer { .. }))
    }

    fn get_byte_buffer(&self, value: &CtxValueRef) -> Option<ByteBuffer> {
        let obj = self.object(value)?;
        let data = obj.borrow();
        match &data.kind {
            ObjectKind::ArrayBuffer { bytes, kind } => Some(ByteBuffer {
                bytes: bytes.clone(),
                kind: *kind,
            }),
            _ => None,
        }
    }

    fn is_array(&self, value: &CtxValueRef) -> bool {
        self.object(value).is_some_and(|obj| matches!(obj.borrow().kind, ObjectKind::Array(_)))
    }

    fn get_array_length(&self, value: &CtxValueRef) -> u32 {
        let Some(obj) = self.object(value) else {
            return 0;
        };
        let data = obj.borrow();
        match &data.kind {
            ObjectKind::Array(elements) => u32::try_from(elements.len()).unwrap_or(u32::MAX),
            _ => 0,
        }
    }

    fn copy_array_element(&self, value: &CtxValueRef, index: u32) -> Option<CtxValueRef> {
        let obj = self.object(value)?;
        let element = match &obj.borrow().kind {
            ObjectKind::Array(elements) => elements.get(index as usize).map(|slot| slot.clone().unwrap_or_default()),
            _ => None,
        };
        element.map(|element| self.wrap(element))
    }

    fn is_object(&self, value: &CtxValueRef) -> bool {
        matches!(self.unwrap(value), Value::Object(_))
    }

    fn get_entries_from_object(&self, value: &CtxValueRef) -> Option<IndexMap<String, CtxValueRef>> {
        let target = self.unwrap(value);
        let Value::Object(obj) = &target else {
            return None;
        };
        let mut entries = IndexMap::new();
        for key in self.interp.own_enumerable_keys(obj) {
            match self.interp.get(&target, &key) {
                Ok(member) => {
                    entries.insert(key, self.wrap(member));
                }
                Err(throw) => {
                    log::debug!("reading property {key} failed: {}", self.throw_message(&throw));
                    return None;
                }
            }
        }
        Some(entries)
    }

    fn get_map_entries(&self, value: &CtxValueRef) -> Option<Vec<(CtxValueRef, CtxValueRef)>> {
        let obj = self.object(value)?;
        let entries = match &obj.borrow().kind {
            ObjectKind::Map(entries) => entries.clone(),
            _ => return None,
        };
        Some(entries.into_iter().map(|(key, value)| (self.wrap(key), self.wrap(value))).collect())
    }

    fn has_named_property(&self, value: &CtxValueRef, name: &str) -> bool {
        self.object(value).is_some_and(|obj| self.interp.has_property(&obj, name))
    }

    fn copy_named_property(&self, value: &CtxValueRef, name: &str) -> Option<CtxValueRef> {
        let obj = self.object(value)?;
        match self.interp.find_property(&obj, name)? {
            Property::Data { value, .. } => Some(self.wrap(value)),
            Property::Accessor { getter: Some(getter), .. } => match self.interp.call(&getter, Value::Object(obj), &[]) {
                Ok(value) => Some(self.wrap(value)),
                Err(throw) => {
                    log::debug!("getter {name} failed: {}", self.throw_message(&throw));
                    None
                }
            },
            Property::Accessor { getter: None, .. } => Some(self.create_undefined()),
        }
    }

    fn is_function(&self, value: &CtxValueRef) -> bool {
        self.unwrap(value).is_callable()
    }

    fn copy_function_name(&self, value: &CtxValueRef) -> Option<String> {
        if !self.is_function(value) {
            return None;
        }
        self.copy_named_property(value, "name").and_then(|name| self.get_value_string(&name))
    }

    fn object_identity(&self, value: &CtxValueRef) -> Option<usize> {
        self.object(value).map(|obj| identity(&obj))
    }

    fn equals(&self, lhs: &CtxValueRef, rhs: &CtxValueRef) -> bool {
        self.interp.loose_equals(&self.unwrap(lhs), &self.unwrap(rhs)).unwrap_or_else(|throw| {
            log::debug!("comparison threw: {}", self.throw_message(&throw));
            false
        })
    }

    fn throw_exception(&self, exception: CtxValueRef) {
        self.route(Throw::Exception(self.unwrap(&exception)), None);
    }

    fn handle_uncaught_exception(&self, exception: &CtxValueRef) {
        self.handle_uncaught_value(&self.unwrap(exception));
    }

    fn try_catch(&self, enable: bool) -> Box<dyn TryCatch + '_> {
        Box::new(LiteTryCatch::new(self, enable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lite::LiteVm;

    #[test]
    fn foreign_handles_read_as_undefined() {
        #[derive(Debug)]
        struct Foreign;
        impl CtxValue for Foreign {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        let vm = LiteVm::new(None);
        let ctx = vm.create_lite_context();
        let foreign: CtxValueRef = Rc::new(Foreign);
        assert!(ctx.is_undefined(&foreign));
    }

    #[test]
    fn pending_exception_survives_nested_callbacks() {
        let vm = LiteVm::new(None);
        let ctx = vm.create_lite_context();
        ctx.callback_depth.set(1);
        ctx.route(Throw::Exception(Value::Number(1.0)), None);
        assert!(ctx.pending.borrow().is_some());
        ctx.callback_depth.set(0);
        ctx.pending.take();
    }
}
