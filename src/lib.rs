//! Monomorphization core for a whole-program compiler lowering a
//! dependently-typed/ML-style IR to a monomorphic C-like target.
//!
//! Three reducers run in sequence over a [`Program`](ir::Program):
//! [`datatypes`] instantiates parametric type definitions on demand and
//! canonicalizes anonymous tuples into named records; [`functions`]
//! instantiates polymorphic functions/globals at each applied
//! type-argument vector; [`equality`] synthesizes per-type structural
//! equality predicates for any residual `EPolyComp`. Each is an
//! independent reducer and is exported individually for callers that
//! want to run or test a single pass; [`run`] is the whole-program entry
//! point that sequences all three.

pub mod datatypes;
pub mod diagnostics;
pub mod equality;
pub mod functions;
pub mod ir;
pub mod symbol;

pub use diagnostics::{BuildConfig, Diagnostics, MonoError, Warning};
pub use ir::Program;

/// Run the full monomorphization pipeline: data types, then functions,
/// then equality generation, threading a single [`Diagnostics`] sink
/// through all three passes.
///
/// The data-type pass is the only one that can fail outright (a nonempty
/// set of pending monomorphizations at program end is an internal
/// invariant violation); the other two passes are infallible reducers
/// that only ever warn.
pub fn run(program: Program, config: &BuildConfig) -> Result<(Program, Diagnostics), MonoError> {
  let mut diagnostics = Diagnostics::new();
  let program = datatypes::run(&program, config, &mut diagnostics)?;
  let program = functions::run(&program, config, &mut diagnostics);
  let program = equality::run(&program, config, &mut diagnostics);
  Ok((program, diagnostics))
}
