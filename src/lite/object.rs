use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::lite::ast::FunctionDef;
use crate::lite::interp::{Completion, Interp};
use crate::value::format_number;
use crate::napi::PropertyAttribute;

pub type ObjectRef = Rc<RefCell<ObjectData>>;

pub type EnvRef = Rc<Env>;

/// Native entry point: `(interp, this, args, is_construct_call)`.
pub type NativeFn = Rc<dyn Fn(&Interp, &Value, &[Value], bool) -> Completion>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            // Objects may be cyclic; print the shape tag only.
            Value::Object(obj) => match obj.try_borrow() {
                Ok(data) => write!(f, "[{} {:#x}]", data.kind.tag(), identity(obj)),
                Err(_) => write!(f, "[object {:#x}]", identity(obj)),
            },
        }
    }
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|obj| matches!(obj.borrow().kind, ObjectKind::Function(_)))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) if self.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// SameValueZero, the key equality of `Map`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

/// Stable address of an object, used as its identity.
pub fn identity(obj: &ObjectRef) -> usize {
    Rc::as_ptr(obj) as *const () as usize
}

#[derive(Clone)]
pub enum Property {
    Data { value: Value, attr: PropertyAttribute },
    Accessor { getter: Option<Value>, setter: Option<Value>, attr: PropertyAttribute },
}

impl Property {
    pub fn data(value: Value) -> Property {
        Property::Data {
            value,
            attr: PropertyAttribute::empty(),
        }
    }

    pub fn hidden(value: Value) -> Property {
        Property::Data {
            value,
            attr: PropertyAttribute::DONT_ENUM,
        }
    }

    pub fn attr(&self) -> PropertyAttribute {
        match self {
            Property::Data { attr, .. } | Property::Accessor { attr, .. } => *attr,
        }
    }
}

/// A script function: its definition plus the environment it closes over.
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: EnvRef,
    /// File the function was defined in, for stack traces.
    pub file: Rc<str>,
}

pub enum FunctionKind {
    Script(Closure),
    Native(NativeFn),
}

#[derive(Default)]
pub enum ObjectKind {
    #[default]
    Ordinary,
    /// `None` marks a hole left by `delete` or by growing `length`.
    Array(Vec<Option<Value>>),
    Function(FunctionKind),
    Error,
    /// Insertion ordered entries.
    Map(Vec<(Value, Value)>),
    ArrayBuffer {
        bytes: Vec<u8>,
        kind: u32,
    },
}

impl ObjectKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "object Object",
            ObjectKind::Array(_) => "object Array",
            ObjectKind::Function(_) => "function",
            ObjectKind::Error => "object Error",
            ObjectKind::Map(_) => "object Map",
            ObjectKind::ArrayBuffer { .. } => "object ArrayBuffer",
        }
    }
}

/// Array contents with holes read as `undefined`.
pub fn dense_elements(elements: &[Option<Value>]) -> Vec<Value> {
    elements.iter().map(|slot| slot.clone().unwrap_or_default()).collect()
}

pub struct ObjectData {
    pub kind: ObjectKind,
    pub prototype: Option<ObjectRef>,
    pub properties: IndexMap<String, Property>,
    /// Runs once when the object is freed.
    pub finalizer: Option<Box<dyn FnOnce()>>,
}

impl ObjectData {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        ObjectData {
            kind,
            prototype,
            properties: IndexMap::new(),
            finalizer: None,
        }
    }

    /// Own property, including the virtual `length` and index slots of arrays.
    pub fn own_property(&self, key: &str) -> Option<Property> {
        if let ObjectKind::Array(elements) = &self.kind {
            if key == "length" {
                return Some(Property::Data {
                    value: Value::Number(elements.len() as f64),
                    attr: PropertyAttribute::DONT_ENUM | PropertyAttribute::DONT_DELETE,
                });
            }
            if let Some(index) = crate::lite::number::array_index(key) {
                return elements.get(index).cloned().flatten().map(Property::data);
            }
        }
        self.properties.get(key).cloned()
    }

    /// Own enumerable keys: array indices first, then properties in insertion order.
    pub fn own_enumerable_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let ObjectKind::Array(elements) = &self.kind {
            keys.extend(elements.iter().enumerate().filter(|(_, slot)| slot.is_some()).map(|(i, _)| i.to_string()));
        }
        keys.extend(
            self.properties
                .iter()
                .filter(|(_, property)| property.attr().enumerable())
                .map(|(key, _)| key.clone()),
        );
        keys
    }
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        if let Some(finalizer) = self.finalizer.take() {
            finalizer();
        }
    }
}

pub struct Binding {
    pub value: Value,
    pub mutable: bool,
    /// `false` between scope entry and the `let`/`const` declaration.
    pub initialized: bool,
}

/// One lexical environment. The global environment has no parent; lookups that fall off the
/// chain continue on the global object.
pub struct Env {
    pub vars: RefCell<HashMap<String, Binding>>,
    pub parent: Option<EnvRef>,
    /// Receiver of a function environment; `None` for block environments and arrows.
    pub this: Option<Value>,
}

impl Env {
    pub fn new(parent: Option<EnvRef>, this: Option<Value>) -> Env {
        Env {
            vars: RefCell::new(HashMap::new()),
            parent,
            this,
        }
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars.borrow_mut().insert(
            name.to_string(),
            Binding {
                value,
                mutable,
                initialized: true,
            },
        );
    }

    /// Creates a binding that cannot be read before its declaration runs.
    pub fn declare_uninitialized(&self, name: &str, mutable: bool) {
        self.vars.borrow_mut().insert(
            name.to_string(),
            Binding {
                value: Value::Undefined,
                mutable,
                initialized: false,
            },
        );
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }
}
