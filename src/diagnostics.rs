//! The warning bus, fatal-error channel, and build configuration shared by
//! all three passes.

use std::collections::HashSet;
use crate::ir::Lid;

/// Files the current build has marked as excluded; a generated specialization
/// that would otherwise land in one of these is dropped with a warning
/// instead of being emitted.
#[derive(Clone, Debug, Default)]
pub struct BuildConfig {
  pub excluded_files: HashSet<String>,
}

impl BuildConfig {
  #[must_use] pub fn is_excluded(&self, file: &str) -> bool { self.excluded_files.contains(file) }
}

/// A non-fatal, user-visible warning. The offending expression or declaration
/// is left unchanged (or dropped, for `DroppedDeclaration`) and the pass
/// continues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
  /// `ETApp` applied a polymorphic reference to the wrong number of type
  /// arguments; the expression is left as-is.
  NotFullyTypeApplied { lid: Lid },
  /// A generated specialization targeted an excluded file and was dropped.
  DroppedDeclaration { lid: Lid },
  /// A `TApp` head was not found in the whole-program map.
  UnrecognizedTypeHead { lid: Lid },
}

/// The warning bus: `(file-name, warning-kind)` pairs accumulated across a
/// pass, or a whole run.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
  pub warnings: Vec<(String, Warning)>,
}

impl Diagnostics {
  #[must_use] pub fn new() -> Self { Self::default() }

  pub fn warn(&mut self, file: &str, w: Warning) {
    tracing::warn!(file, ?w, "monomorphization warning");
    self.warnings.push((file.to_owned(), w));
  }
}

/// Internal invariant violations detectable only after a pass completes, or
/// that a caller might reasonably want to catch rather than crash on.
/// Violations detectable mid-traversal (an `EOp(Eq|Neq)` surviving under
/// `ETApp`, an unexpected body shape reached by a pass that assumes it can't
/// happen) are raised as `panic!`/`assert!`/`unreachable!` at the point of
/// violation instead, since those indicate an earlier pass didn't uphold its
/// own output invariants.
#[derive(Debug, thiserror::Error)]
pub enum MonoError {
  #[error("internal error: pending monomorphization(s) left unresolved at program end: {0:?}")]
  ResidualPendingMonomorphizations(Vec<Lid>),
  #[error("internal error: declaration {0} has nonzero type arity after monomorphization")]
  ResidualArity(Lid),
}
