use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::lite::LiteCtx;
use crate::napi::{Ctx, Vm, VmInitParam};

/// Stops running script from any thread.
///
/// The flag is polled on every call and loop iteration; the script unwinds without running
/// `catch` or `finally` blocks, and the flag clears once the termination reaches the host.
#[derive(Debug, Clone)]
pub struct TerminationHandle(Arc<AtomicBool>);

impl TerminationHandle {
    pub fn terminate(&self) {
        log::debug!("termination requested");
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_terminating(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Engine state shared by a VM and every context it created.
pub(crate) struct VmShared {
    pub(crate) param: VmInitParam,
    pub(crate) live_contexts: Cell<usize>,
    pub(crate) terminate: Arc<AtomicBool>,
}

/// The reference engine instance.
pub struct LiteVm {
    shared: Rc<VmShared>,
}

impl LiteVm {
    pub fn new(param: Option<VmInitParam>) -> Self {
        let param = param.unwrap_or_default();
        log::debug!("lite vm created: {param:?}");
        LiteVm {
            shared: Rc::new(VmShared {
                param,
                live_contexts: Cell::new(0),
                terminate: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn termination_handle(&self) -> TerminationHandle {
        TerminationHandle(Arc::clone(&self.shared.terminate))
    }

    /// Contexts created by this VM that are still alive.
    pub fn live_contexts(&self) -> usize {
        self.shared.live_contexts.get()
    }

    /// Like [`Vm::create_context`], keeping the concrete type.
    pub fn create_lite_context(&self) -> Rc<LiteCtx> {
        LiteCtx::new(Rc::clone(&self.shared))
    }
}

impl Default for LiteVm {
    fn default() -> Self {
        LiteVm::new(None)
    }
}

impl Vm for LiteVm {
    fn create_context(&self) -> Rc<dyn Ctx> {
        self.create_lite_context()
    }

    fn init_param(&self) -> &VmInitParam {
        &self.shared.param
    }
}

impl Drop for LiteVm {
    fn drop(&mut self) {
        let live = self.shared.live_contexts.get();
        if live > 0 {
            log::error!("lite vm dropped while {live} context(s) are still alive");
        } else {
            log::debug!("lite vm dropped");
        }
    }
}
