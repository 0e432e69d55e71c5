//! `Symbol` runtime values and the handful of well-known
//! symbols the core dispatches on directly (`Symbol.iterator`,
//! `Symbol.asyncIterator`, `Symbol.dispose`, `Symbol.asyncDispose`).
//!
//! Symbols are unique even when they share a description, so interning by
//! text (the way `Atom` does) would be wrong — each `Symbol()` call must
//! mint a fresh identity. A process-wide counter is enough for that.

use std::sync::atomic::{AtomicU64, Ordering};

use sharpts_common::Atom;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u64);

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

impl SymbolId {
    /// Mints a fresh, globally unique symbol identity.
    pub fn fresh() -> Self {
        SymbolId(NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// A fixed id reserved for a well-known symbol, so repeated lookups of
    /// e.g. `Symbol.iterator` always compare equal.
    const fn well_known(n: u64) -> Self {
        SymbolId(n)
    }

    pub fn iterator() -> Self {
        Self::well_known(0)
    }

    pub fn async_iterator() -> Self {
        Self::well_known(1)
    }

    pub fn dispose() -> Self {
        Self::well_known(2)
    }

    pub fn async_dispose() -> Self {
        Self::well_known(3)
    }
}

/// Well-known symbols start numbering at 1 inside the counter so they never
/// collide with a user `Symbol()` call, which also draws from the counter
/// starting at 1 — so well-known ids are reserved below the counter's
/// initial value instead.
pub(crate) const FIRST_USER_SYMBOL: u64 = 1000;

pub fn init_symbol_counter() {
    if NEXT_SYMBOL_ID.load(Ordering::Relaxed) < FIRST_USER_SYMBOL {
        NEXT_SYMBOL_ID.store(FIRST_USER_SYMBOL, Ordering::Relaxed);
    }
}

#[derive(Clone, Debug)]
pub struct SymbolData {
    pub id: SymbolId,
    pub description: Option<Atom>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_symbols_are_stable() {
        assert_eq!(SymbolId::iterator(), SymbolId::iterator());
        assert_ne!(SymbolId::iterator(), SymbolId::async_iterator());
    }

    #[test]
    fn fresh_symbols_are_unique() {
        init_symbol_counter();
        let a = SymbolId::fresh();
        let b = SymbolId::fresh();
        assert_ne!(a, b);
    }
}
