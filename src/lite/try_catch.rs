use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::lite::LiteCtx;
use crate::lite::interp::Throw;
use crate::napi::{CtxValueRef, TryCatch};

/// Catcher state shared between a [`LiteTryCatch`] and its context's catcher stack.
pub(crate) struct CatchSlot {
    /// Native callback level the catcher was opened at.
    pub(crate) level: usize,
    pub(crate) armed: bool,
    pub(crate) verbose: Cell<bool>,
    caught: RefCell<Option<Throw>>,
    rethrown: Cell<bool>,
    /// The host looked at the capture.
    observed: Cell<bool>,
}

impl CatchSlot {
    pub(crate) fn capture(&self, throw: Throw) {
        let previous = self.caught.replace(Some(throw));
        self.rethrown.set(false);
        self.observed.set(false);
        drop(previous);
    }
}

pub struct LiteTryCatch<'a> {
    ctx: &'a LiteCtx,
    slot: Rc<CatchSlot>,
}

impl<'a> LiteTryCatch<'a> {
    pub(crate) fn new(ctx: &'a LiteCtx, armed: bool) -> Self {
        let slot = Rc::new(CatchSlot {
            level: ctx.callback_level(),
            armed,
            verbose: Cell::new(false),
            caught: RefCell::new(None),
            rethrown: Cell::new(false),
            observed: Cell::new(false),
        });
        ctx.push_catcher(Rc::clone(&slot));
        LiteTryCatch { ctx, slot }
    }

    fn observe(&self) {
        self.slot.observed.set(true);
    }
}

impl TryCatch for LiteTryCatch<'_> {
    fn rethrow(&self) {
        let Some(throw) = self.slot.caught.borrow().clone() else {
            log::warn!("rethrow on a catcher that has caught nothing");
            return;
        };
        if self.slot.rethrown.replace(true) {
            log::warn!("exception already rethrown");
            return;
        }
        self.ctx.route(throw, Some(&self.slot));
    }

    fn has_caught(&self) -> bool {
        self.observe();
        self.slot.caught.borrow().is_some()
    }

    fn can_continue(&self) -> bool {
        !matches!(*self.slot.caught.borrow(), Some(Throw::Fatal(_) | Throw::Terminated))
    }

    fn has_terminated(&self) -> bool {
        matches!(*self.slot.caught.borrow(), Some(Throw::Terminated))
    }

    fn is_verbose(&self) -> bool {
        self.slot.verbose.get()
    }

    fn set_verbose(&self, verbose: bool) {
        self.slot.verbose.set(verbose);
    }

    fn exception(&self) -> Option<CtxValueRef> {
        self.observe();
        match &*self.slot.caught.borrow() {
            Some(Throw::Exception(value) | Throw::Fatal(value)) => Some(self.ctx.wrap(value.clone())),
            Some(Throw::Terminated) | None => None,
        }
    }

    fn exception_message(&self) -> String {
        self.observe();
        let caught = self.slot.caught.borrow().clone();
        match caught {
            Some(throw) => self.ctx.throw_message(&throw),
            None => String::new(),
        }
    }
}

impl Drop for LiteTryCatch<'_> {
    fn drop(&mut self) {
        let unhandled = !self.slot.rethrown.get() && !self.slot.observed.get();
        let caught = self.slot.caught.take();
        if let Some(throw) = &caught
            && unhandled
        {
            log::warn!("catcher dropped with an unhandled exception: {}", self.ctx.throw_message(throw));
        }
        self.ctx.remove_catcher(&self.slot);
        drop(caught);
    }
}
