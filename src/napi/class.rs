use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::napi::{CallbackInfo, Ctx, CtxValueRef, FunctionData, JsCallback, JsResult};
use crate::scope::Scope;

pub type GetterCallback<T> = Rc<dyn Fn(&Rc<T>, &Rc<dyn Ctx>) -> JsResult<CtxValueRef>>;

pub type SetterCallback<T> = Rc<dyn Fn(&Rc<T>, &Rc<dyn Ctx>, &CtxValueRef) -> JsResult<()>>;

pub type FunctionCallback<T> = Rc<dyn Fn(&Rc<T>, &Rc<dyn Ctx>, &[CtxValueRef]) -> JsResult<CtxValueRef>>;

pub type InstanceConstructor<T> = Rc<dyn Fn(&Rc<dyn Ctx>, &[CtxValueRef]) -> JsResult<Rc<T>>>;

/// Called by the engine with the identity of a class instance it is about to free.
pub type Finalizer = Rc<dyn Fn(usize)>;

pub struct PropertyDefine<T> {
    pub name: String,
    pub getter: Option<GetterCallback<T>>,
    pub setter: Option<SetterCallback<T>>,
}

pub struct FunctionDefine<T> {
    pub name: String,
    pub cb: FunctionCallback<T>,
}

/// Describes how a native type `T` is exposed to script as a class.
pub struct InstanceDefine<T> {
    pub name: String,
    pub constructor: InstanceConstructor<T>,
    pub properties: Vec<PropertyDefine<T>>,
    pub functions: Vec<FunctionDefine<T>>,
    /// Engine object identity -> native instance.
    pub holder: RefCell<HashMap<usize, Rc<T>>>,
}

impl<T: 'static> InstanceDefine<T> {
    pub fn new(name: impl Into<String>, constructor: InstanceConstructor<T>) -> Self {
        InstanceDefine {
            name: name.into(),
            constructor,
            properties: Vec::new(),
            functions: Vec::new(),
            holder: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, getter: Option<GetterCallback<T>>, setter: Option<SetterCallback<T>>) -> Self {
        self.properties.push(PropertyDefine {
            name: name.into(),
            getter,
            setter,
        });
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, cb: FunctionCallback<T>) -> Self {
        self.functions.push(FunctionDefine { name: name.into(), cb });
        self
    }

    /// The native instance behind the JS object with the given identity.
    pub fn instance(&self, identity: usize) -> Option<Rc<T>> {
        self.holder.borrow().get(&identity).cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.holder.borrow().len()
    }

    fn resolve(&self, ctx: &Rc<dyn Ctx>, this: &CtxValueRef) -> JsResult<Rc<T>> {
        ctx.object_identity(this)
            .and_then(|identity| self.instance(identity))
            .ok_or_else(|| ctx.create_type_error(&format!("Illegal invocation: receiver is not a {} instance", self.name)))
    }

    fn construct(&self, info: &CallbackInfo) {
        let Some(scope) = info.scope() else {
            return;
        };
        let ctx = scope.context();
        match (self.constructor)(ctx, info.args()) {
            Ok(instance) => match ctx.object_identity(info.this()) {
                Some(identity) => {
                    let previous = self.holder.borrow_mut().insert(identity, instance);
                    if previous.is_some() {
                        log::warn!("{}: identity {identity:#x} was still bound to a native instance", self.name);
                    }
                    log::trace!("{}: bound native instance to {identity:#x}", self.name);
                }
                None => info.throw(ctx.create_type_error(&format!("{} constructor called on a non-object receiver", self.name))),
            },
            Err(exception) => info.throw(exception),
        }
    }

    fn release(&self, identity: usize) {
        let released = self.holder.borrow_mut().remove(&identity);
        if released.is_some() {
            log::trace!("{}: released native instance for {identity:#x}", self.name);
        }
    }
}

/// Accessor installed on a class prototype.
pub struct AccessorTemplate {
    pub name: String,
    pub getter: Option<JsCallback>,
    pub setter: Option<JsCallback>,
}

/// Method installed on a class prototype.
pub struct MethodTemplate {
    pub name: String,
    pub callback: JsCallback,
}

/// A class with its native type erased, in the shape engines install.
///
/// Engine protocol: `new Name(...)` creates a fresh object, registers `finalizer` for it, then
/// calls `constructor` with that object as receiver. Setters receive the assigned value as their
/// only argument.
pub struct ClassTemplate {
    pub name: String,
    pub constructor: JsCallback,
    pub accessors: Vec<AccessorTemplate>,
    pub methods: Vec<MethodTemplate>,
    pub finalizer: Option<Finalizer>,
}

/// Type-erased view of an [`InstanceDefine`] as stored by a [`Scope`].
pub trait ClassDefine {
    fn class_name(&self) -> &str;

    fn to_template(self: Rc<Self>, scope: Weak<Scope>) -> ClassTemplate;
}

impl<T: 'static> ClassDefine for InstanceDefine<T> {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn to_template(self: Rc<Self>, scope: Weak<Scope>) -> ClassTemplate {
        let define = Rc::clone(&self);
        let constructor = FunctionData::new(scope.clone(), Rc::new(move |info: &CallbackInfo| define.construct(info))).into_thunk();

        let accessors = self
            .properties
            .iter()
            .map(|property| {
                let getter = property.getter.clone().map(|getter| {
                    let define = Rc::clone(&self);
                    let callback: JsCallback = Rc::new(move |info: &CallbackInfo| {
                        let Some(scope) = info.scope() else {
                            return;
                        };
                        let ctx = scope.context();
                        match define.resolve(ctx, info.this()).and_then(|thiz| getter(&thiz, ctx)) {
                            Ok(value) => info.set_return_value(value),
                            Err(exception) => info.throw(exception),
                        }
                    });
                    FunctionData::new(scope.clone(), callback).into_thunk()
                });
                let setter = property.setter.clone().map(|setter| {
                    let define = Rc::clone(&self);
                    let callback: JsCallback = Rc::new(move |info: &CallbackInfo| {
                        let Some(scope) = info.scope() else {
                            return;
                        };
                        let ctx = scope.context();
                        let value = info.get(0).cloned().unwrap_or_else(|| ctx.create_undefined());
                        if let Err(exception) = define.resolve(ctx, info.this()).and_then(|thiz| setter(&thiz, ctx, &value)) {
                            info.throw(exception);
                        }
                    });
                    FunctionData::new(scope.clone(), callback).into_thunk()
                });
                AccessorTemplate {
                    name: property.name.clone(),
                    getter,
                    setter,
                }
            })
            .collect();

        let methods = self
            .functions
            .iter()
            .map(|function| {
                let define = Rc::clone(&self);
                let cb = Rc::clone(&function.cb);
                let callback: JsCallback = Rc::new(move |info: &CallbackInfo| {
                    let Some(scope) = info.scope() else {
                        return;
                    };
                    let ctx = scope.context();
                    match define.resolve(ctx, info.this()).and_then(|thiz| cb(&thiz, ctx, info.args())) {
                        Ok(value) => info.set_return_value(value),
                        Err(exception) => info.throw(exception),
                    }
                });
                MethodTemplate {
                    name: function.name.clone(),
                    callback: FunctionData::new(scope.clone(), callback).into_thunk(),
                }
            })
            .collect();

        let weak = Rc::downgrade(&self);
        let finalizer: Finalizer = Rc::new(move |identity| {
            if let Some(define) = weak.upgrade() {
                define.release(identity);
            }
        });

        ClassTemplate {
            name: self.name.clone(),
            constructor,
            accessors,
            methods,
            finalizer: Some(finalizer),
        }
    }
}
