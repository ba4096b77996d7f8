use crate::napi::CtxValueRef;

/// Exception scope around a unit of script execution, obtained from [`crate::napi::Ctx::try_catch`].
///
/// While armed it captures the exceptions raised at its native level. It captures at most one
/// exception at a time; a later capture replaces an earlier one.
pub trait TryCatch {
    /// Delivers the captured exception to the next enclosing catcher (or the calling script, or
    /// the uncaught handler). Valid once per capture.
    fn rethrow(&self);

    fn has_caught(&self) -> bool;

    /// `false` when the captured condition forbids running more script in this unit
    /// (termination, stack overflow).
    fn can_continue(&self) -> bool;

    /// `true` when the engine terminated execution rather than script throwing.
    fn has_terminated(&self) -> bool;

    fn is_verbose(&self) -> bool;

    /// A verbose catcher also reports what it captures to the uncaught-exception path.
    fn set_verbose(&self, verbose: bool);

    /// The captured value. `None` before anything was caught and for terminations.
    fn exception(&self) -> Option<CtxValueRef>;

    fn exception_message(&self) -> String;
}
