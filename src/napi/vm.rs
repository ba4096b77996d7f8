use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::napi::Ctx;

/// What happens to an uncaught exception when no error-handler script is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncaughtExceptionPolicy {
    /// Log the exception at error level and keep running.
    #[default]
    LogAndContinue,
    /// Log the exception and abort the process.
    Abort,
}

/// Engine-wide initialisation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmInitParam {
    /// Nested script calls allowed before a stack overflow is raised.
    pub max_call_depth: usize,
    /// Bytes of native stack the engine may use below its outermost entry before raising a
    /// stack overflow. The calling thread needs at least twice this much stack; the default
    /// suits the 2 MiB threads `std` spawns.
    pub stack_budget: usize,
    pub uncaught_exception_policy: UncaughtExceptionPolicy,
}

impl Default for VmInitParam {
    fn default() -> Self {
        VmInitParam {
            max_call_depth: 200,
            stack_budget: 1024 * 1024,
            uncaught_exception_policy: UncaughtExceptionPolicy::default(),
        }
    }
}

impl VmInitParam {
    /// Reads parameters from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One engine instance; manufactures contexts.
///
/// Contexts created by a VM must not outlive it. Engine initialisation failures are fatal, so
/// [`Vm::create_context`] has no error path.
pub trait Vm {
    fn create_context(&self) -> Rc<dyn Ctx>;

    fn init_param(&self) -> &VmInitParam;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_param_from_partial_json() {
        let param = VmInitParam::from_json(r#"{ "uncaught_exception_policy": "abort" }"#).unwrap();
        assert_eq!(param.uncaught_exception_policy, UncaughtExceptionPolicy::Abort);
        assert_eq!(param.max_call_depth, VmInitParam::default().max_call_depth);
        assert_eq!(param.stack_budget, 1024 * 1024);
    }

    #[test]
    fn init_param_rejects_unknown_policy() {
        let err = VmInitParam::from_json(r#"{ "uncaught_exception_policy": "ignore" }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInitParam(_)));
    }
}
