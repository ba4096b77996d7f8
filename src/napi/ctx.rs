use std::any::Any;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::napi::{
    BindingData, ByteBuffer, CallbackInfo, CallbackTuple, ClassTemplate, CtxValueRef, JsCallback, ModuleClassMap, NativeFunction,
    PropertyAttribute, RegisterFunction, TryCatch,
};
use crate::scope::Scope;
use crate::value::{DomArgument, DomEvent, DomValue, JsValueWrapper, format_number};

/// Nesting limit for marshalling object graphs out of an engine.
const MAX_MARSHAL_DEPTH: usize = 128;

/// One JS global scope.
///
/// Queries never throw: `get_value_*` return `None` and `is_*` return `false` when the value is
/// not of the requested type. Calls that run script return `None` on failure; the exception then
/// goes to the innermost armed [`TryCatch`], stays pending for the calling script when the
/// failure happened inside a native callback, or reaches [`Ctx::handle_uncaught_exception`].
///
/// Every [`CtxValueRef`] passed in must have been produced by this context.
pub trait Ctx {
    /// Installs the globals the bootstrap scripts rely on. Safe to call more than once.
    fn register_global_in_js(&self) -> bool;

    fn set_global_obj_var(&self, name: &str, obj: &CtxValueRef, attr: PropertyAttribute) -> bool;
    fn get_global_obj_var(&self, name: &str) -> Option<CtxValueRef>;
    fn set_property(&self, object: &CtxValueRef, key: &str, value: &CtxValueRef, attr: PropertyAttribute) -> bool;
    fn get_property(&self, object: &CtxValueRef, name: &str) -> Option<CtxValueRef>;
    fn delete_property(&self, object: &CtxValueRef, name: &str) -> bool;

    fn create_number(&self, number: f64) -> CtxValueRef;
    fn create_boolean(&self, b: bool) -> CtxValueRef;
    fn create_string(&self, string: &str) -> CtxValueRef;
    fn create_undefined(&self) -> CtxValueRef;
    fn create_null(&self) -> CtxValueRef;
    /// Parses `json`; malformed input yields `None` and throws nothing.
    fn parse_json(&self, json: &str) -> Option<CtxValueRef>;
    fn create_object(&self, properties: &IndexMap<String, CtxValueRef>) -> CtxValueRef;
    fn create_map(&self, entries: &[(CtxValueRef, CtxValueRef)]) -> CtxValueRef;
    fn create_array(&self, elements: &[CtxValueRef]) -> CtxValueRef;
    fn create_error(&self, msg: &str) -> CtxValueRef;
    fn create_byte_buffer_with_type(&self, bytes: &[u8], kind: u32) -> CtxValueRef;
    /// A callable whose invocation runs `callback`.
    fn create_function(&self, name: &str, callback: JsCallback) -> CtxValueRef;
    /// Installs the constructor described by `template` and returns it (not yet bound to a global).
    fn define_class(&self, template: ClassTemplate) -> CtxValueRef;

    fn call_function(&self, function: &CtxValueRef, args: &[CtxValueRef]) -> Option<CtxValueRef>;
    fn run_script(&self, source: &str, file_name: &str) -> Option<CtxValueRef>;

    fn get_value_number(&self, value: &CtxValueRef) -> Option<f64>;
    fn get_value_boolean(&self, value: &CtxValueRef) -> Option<bool>;
    fn get_value_string(&self, value: &CtxValueRef) -> Option<String>;
    /// Serialises `value`; `None` for values JSON cannot express.
    fn get_value_json(&self, value: &CtxValueRef) -> Option<String>;

    fn is_undefined(&self, value: &CtxValueRef) -> bool;
    fn is_null_or_undefined(&self, value: &CtxValueRef) -> bool;
    fn is_map(&self, value: &CtxValueRef) -> bool;
    fn is_string(&self, value: &CtxValueRef) -> bool;
    fn is_number(&self, value: &CtxValueRef) -> bool;
    fn is_byte_buffer(&self, value: &CtxValueRef) -> bool;
    fn get_byte_buffer(&self, value: &CtxValueRef) -> Option<ByteBuffer>;
    fn is_array(&self, value: &CtxValueRef) -> bool;
    fn get_array_length(&self, value: &CtxValueRef) -> u32;
    fn copy_array_element(&self, value: &CtxValueRef, index: u32) -> Option<CtxValueRef>;
    fn is_object(&self, value: &CtxValueRef) -> bool;
    /// Own enumerable string-keyed entries. Other key types are not supported.
    fn get_entries_from_object(&self, value: &CtxValueRef) -> Option<IndexMap<String, CtxValueRef>>;
    fn get_map_entries(&self, value: &CtxValueRef) -> Option<Vec<(CtxValueRef, CtxValueRef)>>;
    fn has_named_property(&self, value: &CtxValueRef, name: &str) -> bool;
    fn copy_named_property(&self, value: &CtxValueRef, name: &str) -> Option<CtxValueRef>;
    fn is_function(&self, value: &CtxValueRef) -> bool;
    fn copy_function_name(&self, value: &CtxValueRef) -> Option<String>;
    /// Identity of the engine object behind `value`; stable for the object's lifetime.
    fn object_identity(&self, value: &CtxValueRef) -> Option<usize>;
    /// Abstract (`==`) equality.
    fn equals(&self, lhs: &CtxValueRef, rhs: &CtxValueRef) -> bool;

    fn throw_exception(&self, exception: CtxValueRef);
    fn handle_uncaught_exception(&self, exception: &CtxValueRef);

    /// Opens an exception scope. Only an armed (`enable == true`) scope captures anything.
    fn try_catch(&self, enable: bool) -> Box<dyn TryCatch + '_>;

    fn create_type_error(&self, msg: &str) -> CtxValueRef {
        self.create_error(msg)
    }

    fn create_byte_buffer(&self, bytes: &[u8]) -> CtxValueRef {
        self.create_byte_buffer_with_type(bytes, 0)
    }

    /// Builds an object from value keys. Keys must be strings or numbers.
    fn create_object_from_values(&self, properties: &[(CtxValueRef, CtxValueRef)]) -> Option<CtxValueRef> {
        let mut map = IndexMap::with_capacity(properties.len());
        for (key, value) in properties {
            let key = match self.get_value_string(key) {
                Some(key) => key,
                None => format_number(self.get_value_number(key)?),
            };
            map.insert(key, Rc::clone(value));
        }
        Some(self.create_object(&map))
    }

    fn is_null(&self, value: &CtxValueRef) -> bool {
        self.is_null_or_undefined(value) && !self.is_undefined(value)
    }

    fn is_boolean(&self, value: &CtxValueRef) -> bool {
        self.get_value_boolean(value).is_some()
    }

    fn get_value_int32(&self, value: &CtxValueRef) -> Option<i32> {
        let n = self.get_value_number(value)?;
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
            Some(n as i32)
        } else {
            None
        }
    }

    fn set_global_json_var(&self, name: &str, json: &str) -> bool {
        match self.parse_json(json) {
            Some(value) => self.set_global_obj_var(name, &value, PropertyAttribute::empty()),
            None => false,
        }
    }

    fn set_global_str_var(&self, name: &str, string: &str) -> bool {
        let value = self.create_string(string);
        self.set_global_obj_var(name, &value, PropertyAttribute::empty())
    }

    fn get_global_str_var(&self, name: &str) -> Option<CtxValueRef> {
        self.get_global_obj_var(name).filter(|value| self.is_string(value))
    }

    fn get_js_fn(&self, name: &str) -> Option<CtxValueRef> {
        self.get_global_obj_var(name).filter(|value| self.is_function(value))
    }

    fn throw_exception_message(&self, msg: &str) {
        let exception = self.create_error(msg);
        self.throw_exception(exception);
    }

    /// Human readable form of a thrown value: the stack for errors, the string form otherwise.
    fn exception_message(&self, exception: &CtxValueRef) -> String {
        if self.is_object(exception) {
            if let Some(stack) = self.copy_named_property(exception, "stack").and_then(|s| self.get_value_string(&s))
                && !stack.is_empty()
            {
                return stack;
            }
            if let Some(message) = self.copy_named_property(exception, "message").and_then(|m| self.get_value_string(&m)) {
                let name = self
                    .copy_named_property(exception, "name")
                    .and_then(|n| self.get_value_string(&n))
                    .unwrap_or_else(|| "Error".to_string());
                return if message.is_empty() { name } else { format!("{name}: {message}") };
            }
        }
        display_primitive(self, exception).or_else(|| self.get_value_json(exception)).unwrap_or_else(|| "[object]".to_string())
    }

    fn register_global_module(&self, scope: &Rc<Scope>, modules: &ModuleClassMap) {
        let binding = BindingData::new(Rc::downgrade(scope), modules.clone());
        let installed = binding.install(self);
        log::debug!("scope {}: {installed} native function(s) registered", scope.name());
    }

    /// Installs a global native function whose result is always `undefined`.
    fn register_native_binding(&self, name: &str, function: RegisterFunction, data: Rc<dyn Any>) -> bool {
        let callback: JsCallback = Rc::new(move |info: &CallbackInfo| {
            function(&CallbackTuple {
                data: &data,
                arguments: info.args(),
            });
        });
        let value = self.create_function(name, callback);
        self.set_global_obj_var(name, &value, PropertyAttribute::DONT_ENUM)
    }

    /// Installs a global native function returning whatever `function` produces.
    fn register_native_function(&self, name: &str, function: NativeFunction, data: Rc<dyn Any>) -> bool {
        let callback: JsCallback = Rc::new(move |info: &CallbackInfo| {
            let result = function(&CallbackTuple {
                data: &data,
                arguments: info.args(),
            });
            if let Some(value) = result {
                info.set_return_value(value);
            }
        });
        let value = self.create_function(name, callback);
        self.set_global_obj_var(name, &value, PropertyAttribute::DONT_ENUM)
    }

    /// Installs one global constructor per class registered on `scope`.
    fn register_classes(&self, scope: &Rc<Scope>) {
        for define in scope.class_defines() {
            let name = define.class_name().to_string();
            let template = define.to_template(Rc::downgrade(scope));
            let constructor = self.define_class(template);
            if !self.set_global_obj_var(&name, &constructor, PropertyAttribute::DONT_ENUM) {
                log::warn!("scope {}: failed to install class {name}", scope.name());
            }
        }
    }

    /// Makes firing `event` call `callback` with `{ type, id, value }`.
    fn register_dom_event(&self, scope: &Weak<Scope>, callback: CtxValueRef, event: &Rc<DomEvent>) {
        let scope = scope.clone();
        event.add_listener(Rc::new(move |fired: &DomEvent| {
            let Some(scope) = scope.upgrade() else {
                log::warn!("dom event {} dropped: owning scope has been released", fired.event_type());
                return;
            };
            let ctx = scope.context();
            let mut payload = IndexMap::new();
            payload.insert("type".to_string(), ctx.create_string(fired.event_type()));
            payload.insert("id".to_string(), ctx.create_number(f64::from(fired.target_id())));
            let value = match fired.value() {
                Some(value) => ctx.create_ctx_value_from_dom(value),
                None => ctx.create_null(),
            };
            payload.insert("value".to_string(), value);
            let event_object = ctx.create_object(&payload);
            ctx.call_function(&callback, &[event_object]);
        }));
    }

    fn to_js_value_wrapper(&self, value: &CtxValueRef) -> Option<JsValueWrapper> {
        let mut path = Vec::new();
        wrapper_from_value(self, value, &mut path)
    }

    fn create_ctx_value(&self, wrapper: &JsValueWrapper) -> CtxValueRef {
        match wrapper {
            JsValueWrapper::Undefined => self.create_undefined(),
            JsValueWrapper::Null => self.create_null(),
            JsValueWrapper::Boolean(b) => self.create_boolean(*b),
            JsValueWrapper::Number(n) => self.create_number(*n),
            JsValueWrapper::String(s) => self.create_string(s),
            JsValueWrapper::Array(items) => {
                let elements: Vec<CtxValueRef> = items.iter().map(|item| self.create_ctx_value(item)).collect();
                self.create_array(&elements)
            }
            JsValueWrapper::Object(map) => {
                let properties: IndexMap<String, CtxValueRef> =
                    map.iter().map(|(key, value)| (key.clone(), self.create_ctx_value(value))).collect();
                self.create_object(&properties)
            }
            JsValueWrapper::Map(entries) => {
                let entries: Vec<_> = entries
                    .iter()
                    .map(|(key, value)| (self.create_ctx_value(key), self.create_ctx_value(value)))
                    .collect();
                self.create_map(&entries)
            }
            JsValueWrapper::ByteBuffer { bytes, kind } => self.create_byte_buffer_with_type(bytes, *kind),
        }
    }

    fn to_dom_value(&self, value: &CtxValueRef) -> Option<DomValue> {
        let mut path = Vec::new();
        dom_value_from_value(self, value, &mut path)
    }

    /// Byte buffers travel as raw bytes, everything else as a [`DomValue`].
    fn to_dom_argument(&self, value: &CtxValueRef) -> Option<DomArgument> {
        if let Some(buffer) = self.get_byte_buffer(value) {
            return Some(DomArgument::Bson(buffer.bytes));
        }
        self.to_dom_value(value).map(DomArgument::Object)
    }

    fn create_ctx_value_from_dom(&self, value: &DomValue) -> CtxValueRef {
        match value {
            DomValue::Undefined => self.create_undefined(),
            DomValue::Null => self.create_null(),
            DomValue::Boolean(b) => self.create_boolean(*b),
            DomValue::Int32(n) => self.create_number(f64::from(*n)),
            DomValue::Uint32(n) => self.create_number(f64::from(*n)),
            DomValue::Double(n) => self.create_number(*n),
            DomValue::String(s) => self.create_string(s),
            DomValue::Array(items) => {
                let elements: Vec<CtxValueRef> = items.iter().map(|item| self.create_ctx_value_from_dom(item)).collect();
                self.create_array(&elements)
            }
            DomValue::Object(map) => {
                let properties: IndexMap<String, CtxValueRef> = map
                    .iter()
                    .map(|(key, value)| (key.clone(), self.create_ctx_value_from_dom(value)))
                    .collect();
                self.create_object(&properties)
            }
        }
    }
}

fn display_primitive<C: Ctx + ?Sized>(ctx: &C, value: &CtxValueRef) -> Option<String> {
    if let Some(s) = ctx.get_value_string(value) {
        return Some(s);
    }
    if let Some(n) = ctx.get_value_number(value) {
        return Some(format_number(n));
    }
    if let Some(b) = ctx.get_value_boolean(value) {
        return Some(b.to_string());
    }
    if ctx.is_undefined(value) {
        return Some("undefined".to_string());
    }
    if ctx.is_null(value) {
        return Some("null".to_string());
    }
    None
}

/// Enters an object on the marshalling path; `None` on cycles or excessive nesting.
fn enter_object<C: Ctx + ?Sized>(ctx: &C, value: &CtxValueRef, path: &mut Vec<usize>) -> Option<usize> {
    let identity = ctx.object_identity(value)?;
    if path.contains(&identity) {
        log::warn!("cannot marshal a cyclic object graph");
        return None;
    }
    if path.len() >= MAX_MARSHAL_DEPTH {
        log::warn!("object graph nested deeper than {MAX_MARSHAL_DEPTH} levels");
        return None;
    }
    path.push(identity);
    Some(identity)
}

fn wrapper_from_value<C: Ctx + ?Sized>(ctx: &C, value: &CtxValueRef, path: &mut Vec<usize>) -> Option<JsValueWrapper> {
    if ctx.is_undefined(value) {
        return Some(JsValueWrapper::Undefined);
    }
    if ctx.is_null_or_undefined(value) {
        return Some(JsValueWrapper::Null);
    }
    if let Some(b) = ctx.get_value_boolean(value) {
        return Some(JsValueWrapper::Boolean(b));
    }
    if let Some(n) = ctx.get_value_number(value) {
        return Some(JsValueWrapper::Number(n));
    }
    if let Some(s) = ctx.get_value_string(value) {
        return Some(JsValueWrapper::String(s));
    }
    if ctx.is_function(value) || !ctx.is_object(value) {
        return None;
    }
    enter_object(ctx, value, path)?;
    let result = wrapper_from_object(ctx, value, path);
    path.pop();
    result
}

fn wrapper_from_object<C: Ctx + ?Sized>(ctx: &C, value: &CtxValueRef, path: &mut Vec<usize>) -> Option<JsValueWrapper> {
    if let Some(buffer) = ctx.get_byte_buffer(value) {
        return Some(JsValueWrapper::ByteBuffer {
            bytes: buffer.bytes,
            kind: buffer.kind,
        });
    }
    if ctx.is_array(value) {
        let mut items = Vec::new();
        for index in 0..ctx.get_array_length(value) {
            let element = ctx.copy_array_element(value, index)?;
            items.push(wrapper_from_value(ctx, &element, path)?);
        }
        return Some(JsValueWrapper::Array(items));
    }
    if ctx.is_map(value) {
        let mut entries = Vec::new();
        for (key, entry) in ctx.get_map_entries(value)? {
            entries.push((wrapper_from_value(ctx, &key, path)?, wrapper_from_value(ctx, &entry, path)?));
        }
        return Some(JsValueWrapper::Map(entries));
    }
    let mut map = IndexMap::new();
    for (key, entry) in ctx.get_entries_from_object(value)? {
        map.insert(key, wrapper_from_value(ctx, &entry, path)?);
    }
    Some(JsValueWrapper::Object(map))
}

fn dom_value_from_value<C: Ctx + ?Sized>(ctx: &C, value: &CtxValueRef, path: &mut Vec<usize>) -> Option<DomValue> {
    if ctx.is_undefined(value) {
        return Some(DomValue::Undefined);
    }
    if ctx.is_null_or_undefined(value) {
        return Some(DomValue::Null);
    }
    if let Some(b) = ctx.get_value_boolean(value) {
        return Some(DomValue::Boolean(b));
    }
    if let Some(n) = ctx.get_value_number(value) {
        let is_negative_zero = n == 0.0 && n.is_sign_negative();
        return Some(match ctx.get_value_int32(value) {
            Some(i) if !is_negative_zero => DomValue::Int32(i),
            _ => DomValue::Double(n),
        });
    }
    if let Some(s) = ctx.get_value_string(value) {
        return Some(DomValue::String(s));
    }
    if ctx.is_function(value) || ctx.is_byte_buffer(value) || !ctx.is_object(value) {
        return None;
    }
    enter_object(ctx, value, path)?;
    let result = dom_value_from_object(ctx, value, path);
    path.pop();
    result
}

fn dom_value_from_object<C: Ctx + ?Sized>(ctx: &C, value: &CtxValueRef, path: &mut Vec<usize>) -> Option<DomValue> {
    if ctx.is_array(value) {
        let mut items = Vec::new();
        for index in 0..ctx.get_array_length(value) {
            let element = ctx.copy_array_element(value, index)?;
            items.push(dom_value_from_value(ctx, &element, path)?);
        }
        return Some(DomValue::Array(items));
    }
    let mut map = IndexMap::new();
    if ctx.is_map(value) {
        // DOM objects only carry string keys.
        for (key, entry) in ctx.get_map_entries(value)? {
            let key = ctx.get_value_string(&key)?;
            map.insert(key, dom_value_from_value(ctx, &entry, path)?);
        }
    } else {
        for (key, entry) in ctx.get_entries_from_object(value)? {
            map.insert(key, dom_value_from_value(ctx, &entry, path)?);
        }
    }
    Some(DomValue::Object(map))
}
