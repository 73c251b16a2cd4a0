//! String interning for identifier deduplication.
//!
//! Identifiers (class names, template-parameter names) are interned once and
//! referred to by a copyable [`Atom`] handle afterwards. Interning gives O(1)
//! equality and hashing and keeps the type tables free of owned strings.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use std::sync::RwLock;

/// Handle to an interned string.
///
/// Two atoms compare equal iff they were interned from equal strings in the
/// same [`Interner`]. Atoms from different interners must never be mixed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

/// Append-only string interner.
///
/// Interning and resolution take `&self`; the interner is safe to share
/// between threads for concurrent reads and inserts.
pub struct Interner {
    map: DashMap<Arc<str>, Atom, FxBuildHasher>,
    strings: RwLock<Vec<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(FxBuildHasher),
            strings: RwLock::new(Vec::new()),
        }
    }

    /// Intern a string, returning its atom. Idempotent.
    pub fn intern(&self, text: &str) -> Atom {
        if let Some(existing) = self.map.get(text) {
            return *existing;
        }
        let mut strings = self.strings.write().expect("interner lock poisoned");
        // Re-check under the write lock: another thread may have interned the
        // same string between the map probe and lock acquisition.
        if let Some(existing) = self.map.get(text) {
            return *existing;
        }
        let shared: Arc<str> = Arc::from(text);
        let atom = Atom(u32::try_from(strings.len()).expect("interner overflow"));
        strings.push(Arc::clone(&shared));
        self.map.insert(shared, atom);
        atom
    }

    /// Resolve an atom back to its string.
    ///
    /// Panics if the atom was not produced by this interner.
    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        let strings = self.strings.read().expect("interner lock poisoned");
        Arc::clone(&strings[atom.0 as usize])
    }

    pub fn len(&self) -> usize {
        self.strings.read().expect("interner lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
