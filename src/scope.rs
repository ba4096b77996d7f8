use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::napi::{ClassDefine, Ctx, InstanceDefine, ModuleClassMap, Vm};

/// Host-side owner of one context and of the classes it exposes.
///
/// Bindings installed into the context refer back to their scope weakly, so dropping the last
/// `Rc<Scope>` releases the context and everything script created in it.
pub struct Scope {
    name: String,
    context: Rc<dyn Ctx>,
    classes: RefCell<IndexMap<String, Rc<dyn ClassDefine>>>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("classes", &self.classes.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Scope {
    pub fn new(vm: &dyn Vm, name: &str) -> Rc<Scope> {
        Scope::with_context(vm.create_context(), name)
    }

    pub fn with_context(context: Rc<dyn Ctx>, name: &str) -> Rc<Scope> {
        log::debug!("scope {name} created");
        Rc::new(Scope {
            name: name.to_string(),
            context,
            classes: RefCell::new(IndexMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Rc<dyn Ctx> {
        &self.context
    }

    /// Registers a class to be installed by [`Scope::initialize`]. A later class with the same
    /// name replaces the earlier one.
    pub fn add_class<T: 'static>(&self, define: Rc<InstanceDefine<T>>) {
        let name = define.name.clone();
        if self.classes.borrow_mut().insert(name.clone(), define).is_some() {
            log::warn!("scope {}: class {name} registered twice", self.name);
        }
    }

    pub fn class_defines(&self) -> Vec<Rc<dyn ClassDefine>> {
        self.classes.borrow().values().cloned().collect()
    }

    /// Bootstraps the context: global alias, classes, then native modules.
    pub fn initialize(self: &Rc<Self>, modules: &ModuleClassMap) -> bool {
        if !self.context.register_global_in_js() {
            log::error!("scope {}: failed to bootstrap globals", self.name);
            return false;
        }
        self.context.register_classes(self);
        self.context.register_global_module(self, modules);
        log::debug!("scope {} initialised", self.name);
        true
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        log::debug!("scope {} dropped", self.name);
    }
}
