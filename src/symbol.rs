//! Interned identifiers: a small self-contained interner (a `Copy` id
//! backed by a process-global string table), with no external crate
//! dependency needed for it.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// An interned string. Cheap to copy, compare, and hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct Interner {
  strings: Vec<&'static str>,
  map: HashMap<&'static str, Symbol>,
}

impl Interner {
  fn new() -> Self { Self { strings: Vec::new(), map: HashMap::new() } }

  fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.map.get(s) { return sym }
    let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
    let sym = Symbol(self.strings.len() as u32);
    self.strings.push(leaked);
    self.map.insert(leaked, sym);
    sym
  }
}

static INTERNER: LazyLock<Mutex<Interner>> = LazyLock::new(|| Mutex::new(Interner::new()));

/// Intern a string, returning its `Symbol`.
#[must_use] pub fn intern(s: &str) -> Symbol { INTERNER.lock().unwrap().intern(s) }

impl Symbol {
  /// Get the string this symbol was interned from.
  #[must_use] pub fn as_str(self) -> &'static str {
    INTERNER.lock().unwrap().strings[self.0 as usize]
  }
}

impl std::fmt::Display for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_idempotent() {
    let a = intern("foo");
    let b = intern("foo");
    let c = intern("bar");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str(), "foo");
  }
}
