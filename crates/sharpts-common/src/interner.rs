//! String interning for identifier/keyword deduplication.
//!
//! The lexer produces one `Atom` per distinct identifier or string literal
//! it scans; equality and hashing on `Atom` are then just a `u32`
//! comparison, which matters once the checker starts hashing `TypeInfo`
//! graphs keyed by member name.
//!
//! The table is a process-wide `Mutex`-guarded map rather than a
//! thread-local one: `sharpts-runtime` resumes generator and async-generator
//! bodies on dedicated worker threads, and those threads must resolve the
//! same `Atom`s the parser interned on the main thread.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Atom(u32);

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({:?})", self.as_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Atom {
    pub fn new(s: &str) -> Self {
        INTERNER.lock().expect("interner lock poisoned").intern(s)
    }

    pub fn as_str(&self) -> Arc<str> {
        INTERNER.lock().expect("interner lock poisoned").resolve(*self)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::new(s)
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Atom::new(&s)
    }
}

#[derive(Default)]
pub struct Interner {
    map: FxHashMap<Arc<str>, u32>,
    strings: Vec<Arc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&id) = self.map.get(s) {
            return Atom(id);
        }
        let rc: Arc<str> = Arc::from(s);
        let id = self.strings.len() as u32;
        self.strings.push(rc.clone());
        self.map.insert(rc, id);
        Atom(id)
    }

    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        self.strings[atom.0 as usize].clone()
    }
}

static INTERNER: Lazy<Mutex<Interner>> = Lazy::new(|| Mutex::new(Interner::new()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_interns_to_same_atom() {
        let a = Atom::new("console");
        let b = Atom::new("console");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_text_interns_to_distinct_atoms() {
        let a = Atom::new("foo");
        let b = Atom::new("bar");
        assert_ne!(a, b);
        assert_eq!(&*a.as_str(), "foo");
        assert_eq!(&*b.as_str(), "bar");
    }
}
