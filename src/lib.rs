pub(crate) mod error;
pub mod lite;
pub mod napi;
pub(crate) mod repl;
pub(crate) mod repl_utils;
pub(crate) mod scope;
pub mod value;

pub use error::Error;
pub use lite::{LiteCtx, LiteCtxValue, LiteTryCatch, LiteVm, TerminationHandle};
pub use napi::{
    ClassDefine, Ctx, CtxValue, CtxValueRef, InstanceDefine, JsCallback, JsResult, ModuleClass, ModuleClassMap, PropertyAttribute, TryCatch,
    UncaughtExceptionPolicy, Vm, VmInitParam,
};
pub use repl::{Repl, display_value};
pub use scope::Scope;
pub use value::{DomArgument, DomEvent, DomValue, JsValueWrapper};
