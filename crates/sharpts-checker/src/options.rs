//! `CheckerOptions`: strict mode, the active decorator grammar, and the
//! diagnostic cap.

use sharpts_common::limits::DEFAULT_DIAGNOSTIC_CAP;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoratorMode {
    Stage2,
    Stage3,
}

#[derive(Clone, Copy, Debug)]
pub struct CheckerOptions {
    /// Module files are always strict (§6); this additionally governs
    /// whether a script file without `"use strict"` gets the stricter
    /// read-only-assignment/duplicate-parameter diagnostics.
    pub strict: bool,
    pub decorator_mode: DecoratorMode,
    pub diagnostic_cap: usize,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        CheckerOptions {
            strict: true,
            decorator_mode: DecoratorMode::Stage3,
            diagnostic_cap: DEFAULT_DIAGNOSTIC_CAP,
        }
    }
}
