use std::cell::{Cell, RefCell};
use std::cmp::Ordering as CmpOrdering;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::lite::ast::{BinaryOp, Expr, FunctionDef, LogicalOp, ObjectMember, PropertyName, Statement, StatementKind, UnaryOp, VarKind};
use crate::lite::builtins;
use crate::lite::number::{array_index, parse_number};
use crate::value::format_number;
use crate::lite::stack::StackGuard;
use crate::lite::object::{Closure, Env, EnvRef, FunctionKind, NativeFn, ObjectData, ObjectKind, ObjectRef, Property, Value};
use crate::napi::PropertyAttribute;

/// Why evaluation stopped abruptly.
#[derive(Debug, Clone)]
pub enum Throw {
    /// A script-visible exception; `catch` can handle it.
    Exception(Value),
    /// An unrecoverable error (stack overflow). Skips `catch` and `finally`.
    Fatal(Value),
    /// Execution was terminated from the host.
    Terminated,
}

pub type Completion = Result<Value, Throw>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    Type,
    Range,
    Syntax,
    Reference,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [ErrorKind::Error, ErrorKind::Type, ErrorKind::Range, ErrorKind::Syntax, ErrorKind::Reference];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Type => "TypeError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Reference => "ReferenceError",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

enum Flow {
    /// Completed normally, with the completion value of the last expression statement.
    Normal(Option<Value>),
    Return(Value),
    Break,
    Continue,
}

enum Reference {
    Var(String),
    Property(Value, String),
}

struct Frame {
    function: Rc<str>,
    file: Rc<str>,
    line: Cell<usize>,
    top_level: bool,
}

/// Prototypes every new object of a given shape starts from.
pub struct Realm {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub map_prototype: ObjectRef,
    pub array_buffer_prototype: ObjectRef,
    pub error_prototypes: Vec<ObjectRef>,
}

impl Realm {
    pub fn error_prototype(&self, kind: ErrorKind) -> &ObjectRef {
        &self.error_prototypes[kind as usize]
    }
}

/// Registry of weak handles, pruned when it doubles.
struct Tracker<T> {
    items: RefCell<Vec<Weak<T>>>,
    prune_at: Cell<usize>,
}

impl<T> Tracker<T> {
    const MIN_PRUNE: usize = 1024;

    fn new() -> Self {
        Tracker {
            items: RefCell::new(Vec::new()),
            prune_at: Cell::new(Self::MIN_PRUNE),
        }
    }

    fn track(&self, item: &Rc<T>) {
        let mut items = self.items.borrow_mut();
        if items.len() >= self.prune_at.get() {
            items.retain(|weak| weak.strong_count() > 0);
            self.prune_at.set((items.len() * 2).max(Self::MIN_PRUNE));
        }
        items.push(Rc::downgrade(item));
    }

    fn live(&self) -> Vec<Rc<T>> {
        self.items.take().iter().filter_map(Weak::upgrade).collect()
    }
}

/// The tree-walking evaluator behind one context.
pub struct Interp {
    pub(crate) global: ObjectRef,
    global_env: EnvRef,
    pub(crate) realm: Realm,
    frames: RefCell<Vec<Frame>>,
    depth: Cell<usize>,
    max_depth: usize,
    stack: Cell<Option<StackGuard>>,
    stack_budget: usize,
    terminate: Arc<AtomicBool>,
    objects: Tracker<RefCell<ObjectData>>,
    envs: Tracker<Env>,
}

fn raw_object(kind: ObjectKind, prototype: Option<&ObjectRef>) -> ObjectRef {
    Rc::new(RefCell::new(ObjectData::new(kind, prototype.cloned())))
}

impl Interp {
    pub fn new(max_depth: usize, stack_budget: usize, terminate: Arc<AtomicBool>) -> Interp {
        let object_prototype = raw_object(ObjectKind::Ordinary, None);
        let proto = Some(&object_prototype);
        let error_prototype = raw_object(ObjectKind::Ordinary, proto);
        let mut error_prototypes = vec![Rc::clone(&error_prototype)];
        error_prototypes.extend(ErrorKind::ALL[1..].iter().map(|_| raw_object(ObjectKind::Ordinary, Some(&error_prototype))));
        let realm = Realm {
            function_prototype: raw_object(ObjectKind::Ordinary, proto),
            array_prototype: raw_object(ObjectKind::Ordinary, proto),
            string_prototype: raw_object(ObjectKind::Ordinary, proto),
            number_prototype: raw_object(ObjectKind::Ordinary, proto),
            boolean_prototype: raw_object(ObjectKind::Ordinary, proto),
            map_prototype: raw_object(ObjectKind::Ordinary, proto),
            array_buffer_prototype: raw_object(ObjectKind::Ordinary, proto),
            error_prototypes,
            object_prototype: Rc::clone(&object_prototype),
        };
        let global = raw_object(ObjectKind::Ordinary, Some(&object_prototype));
        let global_env = Rc::new(Env::new(None, Some(Value::Object(Rc::clone(&global)))));

        let interp = Interp {
            global,
            global_env,
            realm,
            frames: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            max_depth,
            stack: Cell::new(None),
            stack_budget,
            terminate,
            objects: Tracker::new(),
            envs: Tracker::new(),
        };
        for obj in [
            &interp.global,
            &interp.realm.object_prototype,
            &interp.realm.function_prototype,
            &interp.realm.array_prototype,
            &interp.realm.string_prototype,
            &interp.realm.number_prototype,
            &interp.realm.boolean_prototype,
            &interp.realm.map_prototype,
            &interp.realm.array_buffer_prototype,
        ]
        .into_iter()
        .chain(interp.realm.error_prototypes.iter())
        {
            interp.objects.track(obj);
        }
        interp.envs.track(&interp.global_env);
        builtins::install(&interp);
        interp
    }

    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    /// Runs `f` with stack accounting anchored here, unless an outer entry already anchored it.
    pub fn with_stack<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.stack.get().is_some() {
            return f();
        }
        self.stack.set(Some(StackGuard::here(self.stack_budget)));
        let result = f();
        self.stack.set(None);
        result
    }

    pub fn stack_guard(&self) -> StackGuard {
        self.stack.get().unwrap_or_else(|| StackGuard::here(self.stack_budget))
    }

    fn stack_exhausted(&self) -> bool {
        self.stack.get().is_some_and(|guard| guard.exceeded())
    }

    fn stack_overflow(&self) -> Throw {
        Throw::Fatal(self.new_error(ErrorKind::Range, "Maximum call stack size exceeded"))
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate.load(Ordering::Relaxed)
    }

    pub fn clear_termination(&self) {
        self.terminate.store(false, Ordering::Relaxed);
    }

    fn check_terminated(&self) -> Result<(), Throw> {
        if self.is_terminating() { Err(Throw::Terminated) } else { Ok(()) }
    }

    // ---- allocation ----

    pub fn alloc(&self, kind: ObjectKind, prototype: Option<ObjectRef>) -> ObjectRef {
        let obj = Rc::new(RefCell::new(ObjectData::new(kind, prototype)));
        self.objects.track(&obj);
        obj
    }

    fn new_env(&self, parent: &EnvRef, this: Option<Value>) -> EnvRef {
        let env = Rc::new(Env::new(Some(Rc::clone(parent)), this));
        self.envs.track(&env);
        env
    }

    pub fn new_object(&self) -> ObjectRef {
        self.alloc(ObjectKind::Ordinary, Some(Rc::clone(&self.realm.object_prototype)))
    }

    pub fn new_array(&self, elements: Vec<Value>) -> Value {
        let elements = elements.into_iter().map(Some).collect();
        Value::Object(self.alloc(ObjectKind::Array(elements), Some(Rc::clone(&self.realm.array_prototype))))
    }

    pub fn new_map(&self, entries: Vec<(Value, Value)>) -> Value {
        Value::Object(self.alloc(ObjectKind::Map(entries), Some(Rc::clone(&self.realm.map_prototype))))
    }

    pub fn new_array_buffer(&self, bytes: Vec<u8>, kind: u32) -> Value {
        Value::Object(self.alloc(
            ObjectKind::ArrayBuffer { bytes, kind },
            Some(Rc::clone(&self.realm.array_buffer_prototype)),
        ))
    }

    pub fn new_native_function(&self, name: &str, function: NativeFn) -> ObjectRef {
        let obj = self.alloc(
            ObjectKind::Function(FunctionKind::Native(function)),
            Some(Rc::clone(&self.realm.function_prototype)),
        );
        obj.borrow_mut().properties.insert(
            "name".to_string(),
            Property::Data {
                value: Value::string(name),
                attr: PropertyAttribute::DONT_ENUM | PropertyAttribute::READ_ONLY,
            },
        );
        obj
    }

    fn new_closure(&self, def: &Rc<FunctionDef>, env: &EnvRef, name_hint: Option<&str>) -> Value {
        let closure = Closure {
            def: Rc::clone(def),
            env: Rc::clone(env),
            file: self.current_file(),
        };
        let obj = self.alloc(
            ObjectKind::Function(FunctionKind::Script(closure)),
            Some(Rc::clone(&self.realm.function_prototype)),
        );
        let name = def.name.as_deref().or(name_hint).unwrap_or("");
        obj.borrow_mut().properties.insert(
            "name".to_string(),
            Property::Data {
                value: Value::string(name),
                attr: PropertyAttribute::DONT_ENUM | PropertyAttribute::READ_ONLY,
            },
        );
        Value::Object(obj)
    }

    /// Error object of the given kind whose `stack` records the frames running right now.
    pub fn new_error(&self, kind: ErrorKind, message: &str) -> Value {
        self.new_error_with_prototype(Rc::clone(self.realm.error_prototype(kind)), kind.name(), message)
    }

    pub fn new_error_with_prototype(&self, prototype: ObjectRef, name: &str, message: &str) -> Value {
        let obj = self.alloc(ObjectKind::Error, Some(prototype));
        let header = if message.is_empty() { name.to_string() } else { format!("{name}: {message}") };
        let trace = self.stack_trace();
        let stack = if trace.is_empty() { header } else { format!("{header}\n{trace}") };
        {
            let mut data = obj.borrow_mut();
            data.properties.insert("message".to_string(), Property::hidden(Value::string(message)));
            data.properties.insert("stack".to_string(), Property::hidden(Value::string(&stack)));
        }
        Value::Object(obj)
    }

    pub fn throw_error(&self, kind: ErrorKind, message: &str) -> Throw {
        Throw::Exception(self.new_error(kind, message))
    }

    pub fn type_error(&self, message: &str) -> Throw {
        self.throw_error(ErrorKind::Type, message)
    }

    // ---- frames ----

    fn push_frame(&self, function: Rc<str>, file: Rc<str>, line: usize, top_level: bool) {
        self.frames.borrow_mut().push(Frame {
            function,
            file,
            line: Cell::new(line),
            top_level,
        });
    }

    fn pop_frame(&self) {
        self.frames.borrow_mut().pop();
    }

    fn set_line(&self, line: usize) {
        if let Some(frame) = self.frames.borrow().last() {
            frame.line.set(line);
        }
    }

    fn current_file(&self) -> Rc<str> {
        self.frames
            .borrow()
            .last()
            .map(|frame| Rc::clone(&frame.file))
            .unwrap_or_else(|| Rc::from("<native>"))
    }

    pub fn stack_trace(&self) -> String {
        let frames = self.frames.borrow();
        let lines: Vec<String> = frames
            .iter()
            .rev()
            .map(|frame| {
                if frame.top_level {
                    format!("    at {}:{}", frame.file, frame.line.get())
                } else {
                    format!("    at {} ({}:{})", frame.function, frame.file, frame.line.get())
                }
            })
            .collect();
        lines.join("\n")
    }

    // ---- properties ----

    /// Property lookup along the prototype chain.
    pub fn find_property(&self, obj: &ObjectRef, key: &str) -> Option<Property> {
        let mut current = Rc::clone(obj);
        loop {
            let next = {
                let data = current.borrow();
                if let Some(property) = data.own_property(key) {
                    return Some(property);
                }
                data.prototype.clone()
            };
            current = next?;
        }
    }

    pub fn has_property(&self, obj: &ObjectRef, key: &str) -> bool {
        self.find_property(obj, key).is_some()
    }

    fn prototype_for(&self, value: &Value, key: &str) -> Result<ObjectRef, Throw> {
        match value {
            Value::Object(obj) => Ok(Rc::clone(obj)),
            Value::String(_) => Ok(Rc::clone(&self.realm.string_prototype)),
            Value::Number(_) => Ok(Rc::clone(&self.realm.number_prototype)),
            Value::Boolean(_) => Ok(Rc::clone(&self.realm.boolean_prototype)),
            Value::Undefined | Value::Null => Err(self.type_error(&format!(
                "Cannot read properties of {} (reading '{key}')",
                if matches!(value, Value::Null) { "null" } else { "undefined" }
            ))),
        }
    }

    pub fn get(&self, target: &Value, key: &str) -> Completion {
        if let Value::String(s) = target {
            if key == "length" {
                return Ok(Value::Number(s.encode_utf16().count() as f64));
            }
            if let Some(index) = array_index(key) {
                let unit = s.encode_utf16().nth(index);
                return Ok(unit.map_or(Value::Undefined, |u| Value::string(&String::from_utf16_lossy(&[u]))));
            }
        }
        let obj = self.prototype_for(target, key)?;
        match self.find_property(&obj, key) {
            Some(Property::Data { value, .. }) => Ok(value),
            Some(Property::Accessor { getter: Some(getter), .. }) => self.call(&getter, target.clone(), &[]),
            Some(Property::Accessor { getter: None, .. }) => Ok(Value::Undefined),
            None if key == "prototype" && matches!(target, Value::Object(_)) => {
                Ok(self.ensure_function_prototype(&obj).map_or(Value::Undefined, Value::Object))
            }
            None => Ok(Value::Undefined),
        }
    }

    /// Script functions get their `prototype` object on first use.
    fn ensure_function_prototype(&self, function: &ObjectRef) -> Option<ObjectRef> {
        let constructible = matches!(&function.borrow().kind, ObjectKind::Function(FunctionKind::Script(c)) if !c.def.is_arrow);
        if !constructible {
            return None;
        }
        let prototype = self.new_object();
        prototype
            .borrow_mut()
            .properties
            .insert("constructor".to_string(), Property::hidden(Value::Object(Rc::clone(function))));
        function.borrow_mut().properties.insert(
            "prototype".to_string(),
            Property::Data {
                value: Value::Object(Rc::clone(&prototype)),
                attr: PropertyAttribute::DONT_ENUM | PropertyAttribute::DONT_DELETE,
            },
        );
        Some(prototype)
    }

    pub fn set(&self, target: &Value, key: &str, value: Value) -> Result<(), Throw> {
        let obj = match target {
            Value::Object(obj) => Rc::clone(obj),
            Value::Undefined | Value::Null => {
                return Err(self.type_error(&format!("Cannot set properties of {target:?} (setting '{key}')")));
            }
            _ => return Ok(()),
        };
        if matches!(obj.borrow().kind, ObjectKind::Array(_)) && (key == "length" || array_index(key).is_some()) {
            return self.set_array_slot(&obj, key, value);
        }
        match self.find_property(&obj, key) {
            Some(Property::Accessor { setter: Some(setter), .. }) => {
                self.call(&setter, target.clone(), &[value])?;
                Ok(())
            }
            Some(Property::Accessor { setter: None, .. }) => Ok(()),
            Some(Property::Data { attr, .. }) if !attr.writable() => Ok(()),
            _ => {
                let previous = {
                    let mut data = obj.borrow_mut();
                    if let Some(Property::Data { value: slot, .. }) = data.properties.get_mut(key) {
                        Some(Property::data(std::mem::replace(slot, value)))
                    } else {
                        data.properties.insert(key.to_string(), Property::data(value))
                    }
                };
                drop(previous);
                Ok(())
            }
        }
    }

    fn set_array_slot(&self, obj: &ObjectRef, key: &str, value: Value) -> Result<(), Throw> {
        const MAX_DENSE_LENGTH: usize = 1 << 24;
        let removed = {
            let mut data = obj.borrow_mut();
            let ObjectKind::Array(elements) = &mut data.kind else {
                return Ok(());
            };
            if key == "length" {
                let length = match value {
                    Value::Number(n) if n >= 0.0 && n.fract() == 0.0 && (n as usize) <= MAX_DENSE_LENGTH => n as usize,
                    _ => {
                        drop(data);
                        return Err(self.throw_error(ErrorKind::Range, "Invalid array length"));
                    }
                };
                if length < elements.len() {
                    elements.split_off(length)
                } else {
                    elements.resize(length, None);
                    Vec::new()
                }
            } else {
                let index = array_index(key).unwrap_or(usize::MAX);
                if index >= MAX_DENSE_LENGTH {
                    drop(data);
                    return Err(self.throw_error(ErrorKind::Range, "Invalid array length"));
                }
                if index >= elements.len() {
                    elements.resize(index + 1, None);
                }
                vec![elements[index].replace(value)]
            }
        };
        drop(removed);
        Ok(())
    }

    /// Defines (or redefines) an own property. `false` when an existing one is not configurable.
    pub fn define_own(&self, obj: &ObjectRef, key: &str, property: Property) -> bool {
        let is_array_slot = matches!(obj.borrow().kind, ObjectKind::Array(_)) && (key == "length" || array_index(key).is_some());
        if is_array_slot {
            return match property {
                Property::Data { value, .. } => self.set_array_slot(obj, key, value).is_ok(),
                Property::Accessor { .. } => false,
            };
        }
        let previous = {
            let mut data = obj.borrow_mut();
            if data.properties.get(key).is_some_and(|existing| !existing.attr().configurable()) {
                return false;
            }
            data.properties.insert(key.to_string(), property)
        };
        drop(previous);
        true
    }

    pub fn delete(&self, obj: &ObjectRef, key: &str) -> bool {
        let removed = {
            let mut data = obj.borrow_mut();
            if let ObjectKind::Array(elements) = &mut data.kind {
                if key == "length" {
                    return false;
                }
                if let Some(index) = array_index(key) {
                    let removed = elements.get_mut(index).and_then(Option::take);
                    drop(data);
                    drop(removed);
                    return true;
                }
            }
            match data.properties.get(key).map(|existing| existing.attr().configurable()) {
                Some(false) => return false,
                Some(true) => data.properties.shift_remove(key),
                None => None,
            }
        };
        drop(removed);
        true
    }

    pub fn own_enumerable_keys(&self, obj: &ObjectRef) -> Vec<String> {
        obj.borrow().own_enumerable_keys()
    }

    // ---- conversions ----

    pub fn to_primitive(&self, value: &Value, hint: Hint) -> Completion {
        if !matches!(value, Value::Object(_)) {
            return Ok(value.clone());
        }
        let order = if hint == Hint::String { ["toString", "valueOf"] } else { ["valueOf", "toString"] };
        for name in order {
            let method = self.get(value, name)?;
            if method.is_callable() {
                let result = self.call(&method, value.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub fn to_number(&self, value: &Value) -> Result<f64, Throw> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Object(_) => return self.to_number(&self.to_primitive(value, Hint::Number)?),
        })
    }

    pub fn to_string(&self, value: &Value) -> Result<Rc<str>, Throw> {
        Ok(match value {
            Value::String(s) => Rc::clone(s),
            Value::Object(_) => return self.to_string(&self.to_primitive(value, Hint::String)?),
            other => Rc::from(display_primitive(other).as_str()),
        })
    }

    pub fn loose_equals(&self, a: &Value, b: &Value) -> Result<bool, Throw> {
        Ok(match (a, b) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(x), Value::String(s)) | (Value::String(s), Value::Number(x)) => *x == parse_number(s),
            (Value::Boolean(x), other) | (other, Value::Boolean(x)) => {
                return self.loose_equals(&Value::Number(f64::from(u8::from(*x))), other);
            }
            (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
            (Value::Object(_), primitive) | (primitive, Value::Object(_)) => {
                let object = if matches!(a, Value::Object(_)) { a } else { b };
                let converted = self.to_primitive(object, Hint::Default)?;
                return self.loose_equals(&converted, primitive);
            }
            _ => a.strict_equals(b),
        })
    }

    // ---- calls ----

    pub fn call(&self, callee: &Value, this: Value, args: &[Value]) -> Completion {
        match callee {
            Value::Object(obj) if callee.is_callable() => self.call_object(obj, this, args, false),
            _ => Err(self.type_error(&format!("{} is not a function", describe(callee)))),
        }
    }

    pub fn construct(&self, callee: &Value, args: &[Value]) -> Completion {
        let constructible = match callee {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Function(FunctionKind::Script(closure)) => !closure.def.is_arrow,
                ObjectKind::Function(FunctionKind::Native(_)) => true,
                _ => false,
            },
            _ => false,
        };
        let Value::Object(function) = callee else {
            return Err(self.type_error(&format!("{} is not a constructor", describe(callee))));
        };
        if !constructible {
            return Err(self.type_error(&format!("{} is not a constructor", describe(callee))));
        }
        let prototype = match self.get(callee, "prototype")? {
            Value::Object(prototype) => prototype,
            _ => Rc::clone(&self.realm.object_prototype),
        };
        let this = Value::Object(self.alloc(ObjectKind::Ordinary, Some(prototype)));
        let result = self.call_object(function, this.clone(), args, true)?;
        Ok(if matches!(result, Value::Object(_)) { result } else { this })
    }

    fn call_object(&self, function: &ObjectRef, this: Value, args: &[Value], construct: bool) -> Completion {
        self.check_terminated()?;
        let depth = self.depth.get();
        if depth >= self.max_depth {
            log::warn!("maximum call depth {} exceeded", self.max_depth);
            return Err(self.stack_overflow());
        }
        if self.stack_exhausted() {
            log::warn!("native stack budget of {} bytes exhausted at call depth {depth}", self.stack_budget);
            return Err(self.stack_overflow());
        }
        enum Target {
            Script(Rc<FunctionDef>, EnvRef, Rc<str>, Rc<str>),
            Native(NativeFn),
        }
        let target = {
            let data = function.borrow();
            match &data.kind {
                ObjectKind::Function(FunctionKind::Script(closure)) => {
                    let name = match data.properties.get("name") {
                        Some(Property::Data { value: Value::String(s), .. }) if !s.is_empty() => Rc::clone(s),
                        _ => Rc::from("<anonymous>"),
                    };
                    Target::Script(Rc::clone(&closure.def), Rc::clone(&closure.env), Rc::clone(&closure.file), name)
                }
                ObjectKind::Function(FunctionKind::Native(native)) => Target::Native(Rc::clone(native)),
                _ => return Err(self.type_error("object is not a function")),
            }
        };
        self.depth.set(depth + 1);
        let result = self.with_stack(|| match target {
            Target::Script(def, env, file, name) => self.call_closure(&def, &env, file, name, this, args),
            Target::Native(native) => native(self, &this, args, construct),
        });
        self.depth.set(depth);
        result
    }

    fn call_closure(&self, def: &Rc<FunctionDef>, closure_env: &EnvRef, file: Rc<str>, name: Rc<str>, this: Value, args: &[Value]) -> Completion {
        let this = if def.is_arrow {
            None
        } else if this.is_nullish() {
            Some(Value::Object(Rc::clone(&self.global)))
        } else {
            Some(this)
        };
        let env = self.new_env(closure_env, this);
        for (index, param) in def.params.iter().enumerate() {
            env.declare(param, args.get(index).cloned().unwrap_or_default(), true);
        }
        let mut var_names = Vec::new();
        collect_var_names(&def.body, &mut var_names);
        for name in var_names {
            if !env.has_own(&name) {
                env.declare(&name, Value::Undefined, true);
            }
        }
        self.push_frame(name, file, def.line, false);
        let result = self.exec_statements(&def.body, &env);
        self.pop_frame();
        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    // ---- programs and statements ----

    /// Runs a parsed script at top level and returns its completion value.
    pub fn run_program(&self, statements: &[Statement], file: &str) -> Completion {
        let mut var_names = Vec::new();
        collect_var_names(statements, &mut var_names);
        for name in var_names {
            if !self.has_property(&self.global, &name) {
                self.define_own(
                    &self.global,
                    &name,
                    Property::Data {
                        value: Value::Undefined,
                        attr: PropertyAttribute::DONT_DELETE,
                    },
                );
            }
        }
        self.push_frame(Rc::from("<top-level>"), Rc::from(file), 1, true);
        let env = Rc::clone(&self.global_env);
        let result = self.exec_statements(statements, &env);
        self.pop_frame();
        match result? {
            Flow::Normal(value) => Ok(value.unwrap_or_default()),
            Flow::Return(value) => Ok(value),
            Flow::Break | Flow::Continue => Ok(Value::Undefined),
        }
    }

    /// Hoists the block's lexical declarations and function declarations.
    fn instantiate_block(&self, statements: &[Statement], env: &EnvRef) {
        for statement in statements {
            match &statement.kind {
                StatementKind::Declaration(VarKind::Let, declarations) => {
                    for (name, _) in declarations {
                        env.declare_uninitialized(name, true);
                    }
                }
                StatementKind::Declaration(VarKind::Const, declarations) => {
                    for (name, _) in declarations {
                        env.declare_uninitialized(name, false);
                    }
                }
                StatementKind::FunctionDeclaration(def) => {
                    let name = def.name.as_deref().unwrap_or_default();
                    let function = self.new_closure(def, env, None);
                    if Rc::ptr_eq(env, &self.global_env) {
                        self.define_own(&self.global, name, Property::data(function));
                    } else {
                        env.declare(name, function, true);
                    }
                }
                _ => {}
            }
        }
    }

    fn exec_statements(&self, statements: &[Statement], env: &EnvRef) -> Result<Flow, Throw> {
        self.instantiate_block(statements, env);
        let mut completion = None;
        for statement in statements {
            match self.exec_statement(statement, env)? {
                Flow::Normal(Some(value)) => completion = Some(value),
                Flow::Normal(None) => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal(completion))
    }

    fn exec_scoped(&self, statements: &[Statement], env: &EnvRef) -> Result<Flow, Throw> {
        let needs_scope = statements.iter().any(|s| {
            matches!(
                s.kind,
                StatementKind::Declaration(VarKind::Let | VarKind::Const, _) | StatementKind::FunctionDeclaration(_)
            )
        });
        if needs_scope {
            let block_env = self.new_env(env, None);
            self.exec_statements(statements, &block_env)
        } else {
            self.exec_statements(statements, env)
        }
    }

    fn exec_statement(&self, statement: &Statement, env: &EnvRef) -> Result<Flow, Throw> {
        self.set_line(statement.line);
        if self.stack_exhausted() {
            return Err(self.stack_overflow());
        }
        match &statement.kind {
            StatementKind::Declaration(kind, declarations) => {
                for (name, init) in declarations {
                    let value = match init {
                        Some(expr) => self.eval_named(expr, env, name)?,
                        None if *kind == VarKind::Var => continue,
                        None => Value::Undefined,
                    };
                    match kind {
                        VarKind::Var => self.assign_var(name, value, env)?,
                        VarKind::Let => env.declare(name, value, true),
                        VarKind::Const => env.declare(name, value, false),
                    }
                }
                Ok(Flow::Normal(None))
            }
            StatementKind::FunctionDeclaration(_) | StatementKind::Empty => Ok(Flow::Normal(None)),
            StatementKind::Expr(expr) => Ok(Flow::Normal(Some(self.eval(expr, env)?))),
            StatementKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StatementKind::If(condition, then_branch, else_branch) => {
                if self.eval(condition, env)?.truthy() {
                    self.exec_statement(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.exec_statement(else_branch, env)
                } else {
                    Ok(Flow::Normal(None))
                }
            }
            StatementKind::While(condition, body) => {
                loop {
                    self.check_terminated()?;
                    if !self.eval(condition, env)?.truthy() {
                        break;
                    }
                    match self.exec_statement(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal(_) | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal(None))
            }
            StatementKind::DoWhile(body, condition) => {
                loop {
                    self.check_terminated()?;
                    match self.exec_statement(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal(_) | Flow::Continue => {}
                    }
                    if !self.eval(condition, env)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal(None))
            }
            StatementKind::For { init, test, update, body } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, env),
            StatementKind::Break => Ok(Flow::Break),
            StatementKind::Continue => Ok(Flow::Continue),
            StatementKind::Block(statements) => self.exec_scoped(statements, env),
            StatementKind::Throw(expr) => Err(Throw::Exception(self.eval(expr, env)?)),
            StatementKind::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(block, param.as_deref(), handler.as_deref(), finalizer.as_deref(), env),
        }
    }

    fn exec_for(&self, init: Option<&Statement>, test: Option<&Expr>, update: Option<&Expr>, body: &Statement, env: &EnvRef) -> Result<Flow, Throw> {
        let loop_env = self.new_env(env, None);
        let mut per_iteration = Vec::new();
        if let Some(init) = init {
            if let StatementKind::Declaration(VarKind::Let | VarKind::Const, declarations) = &init.kind {
                per_iteration = declarations.iter().map(|(name, _)| name.clone()).collect();
            }
            self.exec_statement(init, &loop_env)?;
        }
        // Each iteration sees its own copy of `let` bindings, so closures capture per-iteration values.
        let mut iteration_env = if per_iteration.is_empty() {
            loop_env
        } else {
            self.copy_iteration_env(&loop_env, &per_iteration, env)
        };
        loop {
            self.check_terminated()?;
            if let Some(test) = test
                && !self.eval(test, &iteration_env)?.truthy()
            {
                break;
            }
            match self.exec_statement(body, &iteration_env)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal(_) | Flow::Continue => {}
            }
            if !per_iteration.is_empty() {
                iteration_env = self.copy_iteration_env(&iteration_env, &per_iteration, env);
            }
            if let Some(update) = update {
                self.eval(update, &iteration_env)?;
            }
        }
        Ok(Flow::Normal(None))
    }

    fn copy_iteration_env(&self, from: &EnvRef, names: &[String], parent: &EnvRef) -> EnvRef {
        let next = self.new_env(parent, None);
        {
            let vars = from.vars.borrow();
            for name in names {
                if let Some(binding) = vars.get(name) {
                    next.declare(name, binding.value.clone(), binding.mutable);
                }
            }
        }
        next
    }

    fn exec_try(
        &self,
        block: &[Statement],
        param: Option<&str>,
        handler: Option<&[Statement]>,
        finalizer: Option<&[Statement]>,
        env: &EnvRef,
    ) -> Result<Flow, Throw> {
        let result = match (self.exec_scoped(block, env), handler) {
            (Err(Throw::Exception(exception)), Some(handler)) => {
                let catch_env = self.new_env(env, None);
                if let Some(param) = param {
                    catch_env.declare(param, exception, true);
                }
                self.exec_statements(handler, &catch_env)
            }
            (result, _) => result,
        };
        match finalizer {
            None => result,
            // Unrecoverable conditions skip `finally`.
            Some(_) if matches!(result, Err(Throw::Fatal(_) | Throw::Terminated)) => result,
            Some(finalizer) => match self.exec_scoped(finalizer, env)? {
                Flow::Normal(_) => result,
                abrupt => Ok(abrupt),
            },
        }
    }

    // ---- variables ----

    fn lookup_var(&self, name: &str, env: &EnvRef) -> Completion {
        let mut current = Some(env);
        while let Some(scope) = current {
            if let Some(binding) = scope.vars.borrow().get(name) {
                if !binding.initialized {
                    return Err(self.throw_error(ErrorKind::Reference, &format!("Cannot access '{name}' before initialization")));
                }
                return Ok(binding.value.clone());
            }
            current = scope.parent.as_ref();
        }
        if self.has_property(&self.global, name) {
            return self.get(&Value::Object(Rc::clone(&self.global)), name);
        }
        Err(self.throw_error(ErrorKind::Reference, &format!("{name} is not defined")))
    }

    fn is_resolvable(&self, name: &str, env: &EnvRef) -> bool {
        let mut current = Some(env);
        while let Some(scope) = current {
            if scope.has_own(name) {
                return true;
            }
            current = scope.parent.as_ref();
        }
        self.has_property(&self.global, name)
    }

    fn assign_var(&self, name: &str, value: Value, env: &EnvRef) -> Result<(), Throw> {
        let mut current = Some(env);
        while let Some(scope) = current {
            let mut vars = scope.vars.borrow_mut();
            if let Some(binding) = vars.get_mut(name) {
                if !binding.initialized {
                    drop(vars);
                    return Err(self.throw_error(ErrorKind::Reference, &format!("Cannot access '{name}' before initialization")));
                }
                if !binding.mutable {
                    drop(vars);
                    return Err(self.type_error("Assignment to constant variable."));
                }
                let previous = std::mem::replace(&mut binding.value, value);
                drop(vars);
                drop(previous);
                return Ok(());
            }
            drop(vars);
            current = scope.parent.as_ref();
        }
        self.set(&Value::Object(Rc::clone(&self.global)), name, value)
    }

    fn resolve_this(&self, env: &EnvRef) -> Value {
        let mut current = Some(env);
        while let Some(scope) = current {
            if let Some(this) = &scope.this {
                return this.clone();
            }
            current = scope.parent.as_ref();
        }
        Value::Undefined
    }

    // ---- expressions ----

    /// Evaluates `expr`, naming anonymous functions after the binding they are assigned to.
    fn eval_named(&self, expr: &Expr, env: &EnvRef, name: &str) -> Completion {
        match expr {
            Expr::Function(def) if def.name.is_none() => Ok(self.new_closure(def, env, Some(name))),
            _ => self.eval(expr, env),
        }
    }

    fn eval_args(&self, args: &[Expr], env: &EnvRef) -> Result<Vec<Value>, Throw> {
        args.iter().map(|arg| self.eval(arg, env)).collect()
    }

    fn property_key(&self, name: &PropertyName, env: &EnvRef) -> Result<String, Throw> {
        match name {
            PropertyName::Static(name) => Ok(name.clone()),
            PropertyName::Computed(expr) => {
                let key = self.eval(expr, env)?;
                Ok(self.to_string(&key)?.to_string())
            }
        }
    }

    fn eval_object_literal(&self, members: &[ObjectMember], env: &EnvRef) -> Completion {
        let obj = self.new_object();
        for member in members {
            match member {
                ObjectMember::Value(name, expr) => {
                    let key = self.property_key(name, env)?;
                    let value = self.eval_named(expr, env, &key)?;
                    self.define_own(&obj, &key, Property::data(value));
                }
                ObjectMember::Getter(name, def) | ObjectMember::Setter(name, def) => {
                    let key = self.property_key(name, env)?;
                    let function = self.new_closure(def, env, Some(&key));
                    let is_getter = matches!(member, ObjectMember::Getter(..));
                    let (mut getter, mut setter) = match obj.borrow().properties.get(&key) {
                        Some(Property::Accessor { getter, setter, .. }) => (getter.clone(), setter.clone()),
                        _ => (None, None),
                    };
                    if is_getter {
                        getter = Some(function);
                    } else {
                        setter = Some(function);
                    }
                    let attr = PropertyAttribute::empty();
                    self.define_own(&obj, &key, Property::Accessor { getter, setter, attr });
                }
            }
        }
        Ok(Value::Object(obj))
    }

    fn reference(&self, expr: &Expr, env: &EnvRef) -> Result<Reference, Throw> {
        match expr {
            Expr::Var(name) => Ok(Reference::Var(name.clone())),
            Expr::Property(object, name) => Ok(Reference::Property(self.eval(object, env)?, name.clone())),
            Expr::Index(object, key) => {
                let object = self.eval(object, env)?;
                let key = self.eval(key, env)?;
                Ok(Reference::Property(object, self.to_string(&key)?.to_string()))
            }
            _ => Err(self.throw_error(ErrorKind::Syntax, "Invalid assignment target")),
        }
    }

    fn get_reference(&self, reference: &Reference, env: &EnvRef) -> Completion {
        match reference {
            Reference::Var(name) => self.lookup_var(name, env),
            Reference::Property(object, key) => self.get(object, key),
        }
    }

    fn put_reference(&self, reference: &Reference, value: Value, env: &EnvRef) -> Result<(), Throw> {
        match reference {
            Reference::Var(name) => self.assign_var(name, value, env),
            Reference::Property(object, key) => self.set(object, key, value),
        }
    }

    pub(crate) fn eval(&self, expr: &Expr, env: &EnvRef) -> Completion {
        if self.stack_exhausted() {
            return Err(self.stack_overflow());
        }
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::StringLit(s) => Ok(Value::String(Rc::clone(s))),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Var(name) => self.lookup_var(name, env),
            Expr::This => Ok(self.resolve_this(env)),
            Expr::Array(elements) => Ok(self.new_array(self.eval_args(elements, env)?)),
            Expr::Object(members) => self.eval_object_literal(members, env),
            Expr::Function(def) => Ok(self.new_closure(def, env, None)),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand, env),
            Expr::Update { increment, prefix, target } => {
                let reference = self.reference(target, env)?;
                let old = self.to_number(&self.get_reference(&reference, env)?)?;
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.put_reference(&reference, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary_op(*op, &left, &right)
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit { Ok(left) } else { self.eval(right, env) }
            }
            Expr::Conditional(condition, then_expr, else_expr) => {
                if self.eval(condition, env)?.truthy() {
                    self.eval(then_expr, env)
                } else {
                    self.eval(else_expr, env)
                }
            }
            Expr::Assign(target, value) => {
                let reference = self.reference(target, env)?;
                let value = match &reference {
                    Reference::Var(name) => self.eval_named(value, env, name)?,
                    Reference::Property(..) => self.eval(value, env)?,
                };
                self.put_reference(&reference, value.clone(), env)?;
                Ok(value)
            }
            Expr::CompoundAssign(op, target, value) => {
                let reference = self.reference(target, env)?;
                let old = self.get_reference(&reference, env)?;
                let right = self.eval(value, env)?;
                let value = self.binary_op(*op, &old, &right)?;
                self.put_reference(&reference, value.clone(), env)?;
                Ok(value)
            }
            Expr::Property(object, name) => {
                let object = self.eval(object, env)?;
                self.get(&object, name)
            }
            Expr::Index(object, key) => {
                let object = self.eval(object, env)?;
                let key = self.eval(key, env)?;
                let key = self.to_string(&key)?;
                self.get(&object, &key)
            }
            Expr::Call(callee, args) => {
                let (function, this) = match callee.as_ref() {
                    Expr::Property(..) | Expr::Index(..) => {
                        let Reference::Property(object, key) = self.reference(callee, env)? else {
                            return Err(self.type_error("invalid call target"));
                        };
                        (self.get(&object, &key)?, object)
                    }
                    other => (self.eval(other, env)?, Value::Undefined),
                };
                let args = self.eval_args(args, env)?;
                if !function.is_callable() {
                    return Err(self.type_error(&format!("{} is not a function", describe_expr(callee))));
                }
                self.call(&function, this, &args)
            }
            Expr::New(callee, args) => {
                let function = self.eval(callee, env)?;
                let args = self.eval_args(args, env)?;
                if !function.is_callable() {
                    return Err(self.type_error(&format!("{} is not a constructor", describe_expr(callee))));
                }
                self.construct(&function, &args)
            }
            Expr::Comma(left, right) => {
                self.eval(left, env)?;
                self.eval(right, env)
            }
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, env: &EnvRef) -> Completion {
        match op {
            UnaryOp::TypeOf => {
                if let Expr::Var(name) = operand
                    && !self.is_resolvable(name, env)
                {
                    return Ok(Value::string("undefined"));
                }
                Ok(Value::string(self.eval(operand, env)?.type_of()))
            }
            UnaryOp::Delete => match operand {
                Expr::Property(..) | Expr::Index(..) => {
                    let Reference::Property(object, key) = self.reference(operand, env)? else {
                        return Ok(Value::Boolean(false));
                    };
                    match &object {
                        Value::Object(obj) => Ok(Value::Boolean(self.delete(obj, &key))),
                        Value::Undefined | Value::Null => Err(self.type_error(&format!("Cannot convert undefined or null to object (deleting '{key}')"))),
                        _ => Ok(Value::Boolean(true)),
                    }
                }
                Expr::Var(_) => Ok(Value::Boolean(false)),
                other => {
                    self.eval(other, env)?;
                    Ok(Value::Boolean(true))
                }
            },
            UnaryOp::Void => {
                self.eval(operand, env)?;
                Ok(Value::Undefined)
            }
            UnaryOp::Not => Ok(Value::Boolean(!self.eval(operand, env)?.truthy())),
            UnaryOp::Neg => Ok(Value::Number(-self.to_number(&self.eval(operand, env)?)?)),
            UnaryOp::Plus => Ok(Value::Number(self.to_number(&self.eval(operand, env)?)?)),
        }
    }

    pub fn binary_op(&self, op: BinaryOp, left: &Value, right: &Value) -> Completion {
        let numeric = |f: fn(f64, f64) -> f64| -> Completion { Ok(Value::Number(f(self.to_number(left)?, self.to_number(right)?))) };
        match op {
            BinaryOp::Add => {
                let left = self.to_primitive(left, Hint::Default)?;
                let right = self.to_primitive(right, Hint::Default)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut joined = self.to_string(&left)?.to_string();
                    joined.push_str(&self.to_string(&right)?);
                    Ok(Value::string(&joined))
                } else {
                    Ok(Value::Number(self.to_number(&left)? + self.to_number(&right)?))
                }
            }
            BinaryOp::Sub => numeric(|a, b| a - b),
            BinaryOp::Mul => numeric(|a, b| a * b),
            BinaryOp::Div => numeric(|a, b| a / b),
            BinaryOp::Mod => numeric(|a, b| a % b),
            BinaryOp::Exp => numeric(|a, b| if b.is_nan() || (a.abs() == 1.0 && b.is_infinite()) { f64::NAN } else { a.powf(b) }),
            BinaryOp::Equal => Ok(Value::Boolean(self.loose_equals(left, right)?)),
            BinaryOp::NotEqual => Ok(Value::Boolean(!self.loose_equals(left, right)?)),
            BinaryOp::StrictEqual => Ok(Value::Boolean(left.strict_equals(right))),
            BinaryOp::StrictNotEqual => Ok(Value::Boolean(!left.strict_equals(right))),
            BinaryOp::LessThan => Ok(Value::Boolean(matches!(self.compare(left, right)?, Some(CmpOrdering::Less)))),
            BinaryOp::GreaterThan => Ok(Value::Boolean(matches!(self.compare(left, right)?, Some(CmpOrdering::Greater)))),
            BinaryOp::LessEqual => Ok(Value::Boolean(matches!(self.compare(left, right)?, Some(CmpOrdering::Less | CmpOrdering::Equal)))),
            BinaryOp::GreaterEqual => Ok(Value::Boolean(matches!(
                self.compare(left, right)?,
                Some(CmpOrdering::Greater | CmpOrdering::Equal)
            ))),
            BinaryOp::InstanceOf => Ok(Value::Boolean(self.instance_of(left, right)?)),
            BinaryOp::In => {
                let Value::Object(obj) = right else {
                    return Err(self.type_error(&format!("Cannot use 'in' operator to search for '{}' in {right:?}", describe(left))));
                };
                let key = self.to_string(left)?;
                Ok(Value::Boolean(self.has_property(obj, &key)))
            }
        }
    }

    fn compare(&self, left: &Value, right: &Value) -> Result<Option<CmpOrdering>, Throw> {
        let left = self.to_primitive(left, Hint::Number)?;
        let right = self.to_primitive(right, Hint::Number)?;
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            return Ok(Some(a.encode_utf16().cmp(b.encode_utf16())));
        }
        Ok(self.to_number(&left)?.partial_cmp(&self.to_number(&right)?))
    }

    pub fn instance_of(&self, value: &Value, constructor: &Value) -> Result<bool, Throw> {
        if !constructor.is_callable() {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        let Value::Object(obj) = value else {
            return Ok(false);
        };
        let Value::Object(prototype) = self.get(constructor, "prototype")? else {
            return Ok(false);
        };
        let mut current = obj.borrow().prototype.clone();
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, &prototype) {
                return Ok(true);
            }
            current = candidate.borrow().prototype.clone();
        }
        Ok(false)
    }

    /// Breaks every reference cycle the context created so objects are freed and their
    /// finalizers run.
    fn teardown(&self) {
        for env in self.envs.live() {
            let vars = env.vars.take();
            drop(vars);
        }
        let objects = self.objects.live();
        log::debug!("tearing down {} live object(s)", objects.len());
        for obj in &objects {
            let contents = {
                let mut data = obj.borrow_mut();
                (
                    std::mem::take(&mut data.properties),
                    std::mem::take(&mut data.kind),
                    data.prototype.take(),
                )
            };
            drop(contents);
        }
        drop(objects);
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Collects `var` names declared anywhere in `statements` outside nested functions.
fn collect_var_names(statements: &[Statement], names: &mut Vec<String>) {
    for statement in statements {
        collect_var_names_in(statement, names);
    }
}

fn collect_var_names_in(statement: &Statement, names: &mut Vec<String>) {
    match &statement.kind {
        StatementKind::Declaration(VarKind::Var, declarations) => {
            names.extend(declarations.iter().map(|(name, _)| name.clone()));
        }
        StatementKind::If(_, then_branch, else_branch) => {
            collect_var_names_in(then_branch, names);
            if let Some(else_branch) = else_branch {
                collect_var_names_in(else_branch, names);
            }
        }
        StatementKind::While(_, body) | StatementKind::DoWhile(body, _) => collect_var_names_in(body, names),
        StatementKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_var_names_in(init, names);
            }
            collect_var_names_in(body, names);
        }
        StatementKind::Block(statements) => collect_var_names(statements, names),
        StatementKind::Try {
            block, handler, finalizer, ..
        } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(handler, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        _ => {}
    }
}

/// String form of a primitive; objects print as their tag.
pub fn display_primitive(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.to_string(),
        Value::Object(obj) => format!("[{}]", obj.borrow().kind.tag()),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        Value::Object(obj) if value.is_callable() => match obj.borrow().properties.get("name") {
            Some(Property::Data { value: Value::String(name), .. }) if !name.is_empty() => name.to_string(),
            _ => "function".to_string(),
        },
        other => display_primitive(other),
    }
}

fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Var(name) => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Property(object, name) => format!("{}.{name}", describe_expr(object)),
        Expr::Index(object, _) => format!("{}[...]", describe_expr(object)),
        Expr::Call(callee, _) => format!("{}(...)", describe_expr(callee)),
        _ => "expression".to_string(),
    }
}
