//! Native stack accounting for the recursive parser and evaluator.

use std::hint::black_box;

/// Approximate address of the current stack frame.
#[inline(never)]
fn position() -> usize {
    let marker = 0u8;
    black_box(&marker) as *const u8 as usize
}

/// Budget of native stack measured from the outermost entry into the engine.
#[derive(Debug, Clone, Copy)]
pub struct StackGuard {
    base: usize,
    budget: usize,
}

impl StackGuard {
    /// Anchors a guard at the caller's frame.
    pub fn here(budget: usize) -> Self {
        StackGuard { base: position(), budget }
    }

    /// Stack consumed since the anchor. Direction agnostic.
    pub fn used(&self) -> usize {
        self.base.abs_diff(position())
    }

    pub fn exceeded(&self) -> bool {
        self.used() > self.budget
    }
}
