//! The engine-neutral embedding contract.
//!
//! Everything in this module is written against the [`Ctx`], [`Vm`] and [`TryCatch`] traits only;
//! a concrete engine plugs in by implementing them (see [`crate::lite`] for the reference backend).

mod callback;
mod class;
mod ctx;
mod try_catch;
mod types;
mod vm;

pub use callback::{
    BindingData, CallbackInfo, CallbackTuple, FunctionData, JsCallback, ModuleClass, ModuleClassMap, NativeFunction, RegisterFunction,
};
pub use class::{
    AccessorTemplate, ClassDefine, ClassTemplate, Finalizer, FunctionCallback, FunctionDefine, GetterCallback, InstanceConstructor,
    InstanceDefine, MethodTemplate, PropertyDefine, SetterCallback,
};
pub use ctx::Ctx;
pub use try_catch::TryCatch;
pub use types::{ByteBuffer, CtxValue, CtxValueRef, JsResult, PropertyAttribute};
pub use vm::{UncaughtExceptionPolicy, Vm, VmInitParam};

/// File name the error-handler bootstrap script is run under.
pub const ERROR_HANDLER_JS_NAME: &str = "ExceptionHandle.js";

/// Global function the bootstrap script installs; uncaught exceptions are routed to it.
pub const ERROR_HANDLER_NAME: &str = "BridgeExceptionHandler";

/// Alias of the global object installed by [`Ctx::register_global_in_js`].
pub const GLOBAL_ALIAS_NAME: &str = "global";
