//! The equality-predicate generator: resolves every residual
//! `EPolyComp(op, t)` left behind by the earlier passes into either a
//! primitive comparison opcode or a call to a synthesized (or externally
//! declared) structural predicate, and eta-expands the rare bare,
//! not-yet-applied occurrence into a named closure.
//!
//! Memoizes on `(eq_lid, [t])` via [`Node`], the same structural identity
//! [`crate::functions`] uses for callee instantiation — here `eq_lid` is one
//! of the two fixed markers `__eq`/`__neq` rather than a user declaration.

use std::collections::HashMap;
use smallvec::SmallVec;
use crate::diagnostics::{BuildConfig, Diagnostics, Warning};
use crate::ir::{
  mk_typ, Binder, CallConv, Decl, Expr, ExprKind, Field, File, Flags, Lid, Node, Op, Pattern,
  PolyCompOp, Program, Typ, TypKind, TypeDefBody, Branch,
};
use crate::symbol::{intern, Symbol};

#[derive(Clone, Debug)]
struct TypeDef {
  flags: Flags,
  body: TypeDefBody,
}

type DefMap = HashMap<Lid, TypeDef>;

fn build_def_map(program: &Program) -> DefMap {
  let mut defs = DefMap::new();
  for file in &program.files {
    for decl in &file.decls {
      if let Decl::Type { lid, flags, body, .. } = decl {
        defs.insert(lid.clone(), TypeDef { flags: *flags, body: body.clone() });
      }
    }
  }
  defs
}

fn is_prims_numeric(lid: &Lid) -> bool {
  lid.module.len() == 1 && lid.module[0].as_str() == "Prims"
    && matches!(lid.name.as_str(), "int" | "nat" | "pos")
}

fn is_enum(body: &TypeDefBody) -> bool {
  matches!(body, TypeDefBody::Variant(branches) if branches.iter().all(|b| b.fields.is_empty()))
}

fn eq_marker(op: PolyCompOp) -> Lid {
  Lid::new(SmallVec::new(), intern(match op { PolyCompOp::PEq => "__eq", PolyCompOp::PNeq => "__neq" }))
}

fn prefix_for(op: PolyCompOp) -> &'static str {
  match op { PolyCompOp::PEq => "__eq__", PolyCompOp::PNeq => "__neq__" }
}

/// How a single `EPolyComp(op, t)` occurrence, once applied to two operands,
/// should be rewritten.
enum Resolved {
  /// A representation-level primitive opcode the backend lowers directly:
  /// fixed-width ints and bools compare by value; enums, buffers, and the
  /// `Prims` numeric aliases compare by representation (spec invariant 4).
  Primitive(Op, Option<IntWidth_>),
  /// Call a synthesized or externally declared two-argument predicate.
  Call { lid: Lid, pointer: bool, negate: bool },
}

use crate::ir::IntWidth as IntWidth_;

struct EqualityPass<'a> {
  defs: DefMap,
  generated: HashMap<Node, Lid>,
  /// Lids whose structural-predicate body is still being synthesized
  /// (inserted before recursing into fields, removed once the declaration is
  /// built). A memo hit against a lid still in here means the predicate
  /// currently under construction recurses back into itself through some
  /// chain of fields — the Gray-revisit analogue from the data-type pass.
  in_progress: std::collections::HashSet<Lid>,
  pending: Vec<Decl>,
  has_cycle: bool,
  config: &'a BuildConfig,
  diagnostics: &'a mut Diagnostics,
}

impl<'a> EqualityPass<'a> {
  fn new(defs: DefMap, config: &'a BuildConfig, diagnostics: &'a mut Diagnostics) -> Self {
    Self {
      defs, generated: HashMap::new(), in_progress: std::collections::HashSet::new(),
      pending: Vec::new(), has_cycle: false, config, diagnostics,
    }
  }

  fn emit(&mut self, file: &str, decl: Decl) {
    if self.config.is_excluded(file) {
      self.diagnostics.warn(file, Warning::DroppedDeclaration { lid: decl.lid().clone() });
      return;
    }
    self.pending.push(decl);
  }

  fn flush_into(&mut self, output: &mut Vec<Decl>) {
    output.extend(self.pending.drain(..));
  }

  /// A memoized call target that's still `in_progress` means the predicate
  /// we're currently building transitively calls back into itself. This is a
  /// deliberately coarse mutual-recursion criterion: rather than isolating
  /// which declarations form the cycle, we mark every equality declaration
  /// synthesized for the whole top-level item non-private.
  fn note_possible_cycle(&mut self, lid: &Lid) {
    if self.in_progress.contains(lid) { self.has_cycle = true; }
  }

  fn classify(&mut self, op: PolyCompOp, t: &Typ, file: &str) -> Resolved {
    match &**t {
      TypKind::Qualified(lid) if is_prims_numeric(lid) => Resolved::Primitive(prim_op(op), None),
      TypKind::Int(w, _signed) => Resolved::Primitive(prim_op(op), Some(*w)),
      TypKind::Bool => Resolved::Primitive(prim_op(op), None),
      TypKind::Buf(..) => Resolved::Primitive(prim_op(op), None),
      TypKind::Qualified(lid) => {
        let Some(def) = self.defs.get(lid).cloned() else {
          self.diagnostics.warn(file, Warning::UnrecognizedTypeHead { lid: lid.clone() });
          return self.dispatch_external(op, t, file);
        };
        if is_enum(&def.body) { return Resolved::Primitive(prim_op(op), None) }
        match &def.body {
          TypeDefBody::Flat(_) | TypeDefBody::Variant(_) =>
            Resolved::Call { lid: self.structural_predicate(op, lid, &def, t, file), pointer: false, negate: false },
          TypeDefBody::Forward =>
            Resolved::Call { lid: self.forward_predicate(op, lid, file), pointer: true, negate: false },
          TypeDefBody::Abbrev(_) | TypeDefBody::Enum | TypeDefBody::Union => unreachable!(
            "equality generation reached a {:?} body directly for {}; abbreviations and C enums/unions are opaque to structural equality", def.body, lid.display()
          ),
        }
      }
      _ => self.dispatch_external(op, t, file),
    }
  }

  /// `TArrow`, unresolved `TQualified` heads, and anything else without a
  /// structural definition: declare (once) an external `bool __eq__T(T,T)`
  /// and call it, negating the result at the call site for `PNeq` rather than
  /// declaring a second external symbol.
  fn dispatch_external(&mut self, op: PolyCompOp, t: &Typ, file: &str) -> Resolved {
    let lid = self.external_predicate(t, file);
    match op {
      PolyCompOp::PEq => Resolved::Call { lid, pointer: false, negate: false },
      PolyCompOp::PNeq => Resolved::Call { lid, pointer: false, negate: true },
    }
  }

  fn external_predicate(&mut self, t: &Typ, file: &str) -> Lid {
    let node = Node::new(eq_marker(PolyCompOp::PEq), vec![t.clone()]);
    if let Some(existing) = self.generated.get(&node).cloned() {
      self.note_possible_cycle(&existing);
      return existing;
    }
    let suffix = match &**t {
      TypKind::Qualified(lid) => lid.name.as_str().to_owned(),
      _ => crate::ir::prettyprint_args(std::slice::from_ref(t), &|_| None),
    };
    let new_lid = Lid::new(SmallVec::new(), intern(&format!("__eq__{suffix}")));
    self.generated.insert(node, new_lid.clone());
    let decl = Decl::External {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 0, name: new_lid.clone(),
      ty: mk_typ(TypKind::Arrow(t.clone(), mk_typ(TypKind::Arrow(t.clone(), mk_typ(TypKind::Bool))))),
      param_names: vec![intern("x"), intern("y")],
    };
    self.emit(file, decl);
    new_lid
  }

  /// `TypeDefBody::Forward`: an external abstract type the program never
  /// sees the definition of. Compared by an external predicate taking const
  /// pointers to avoid passing an opaque, possibly-unsized type by value.
  fn forward_predicate(&mut self, op: PolyCompOp, lid: &Lid, file: &str) -> Lid {
    let t = mk_typ(TypKind::Qualified(lid.clone()));
    let node = Node::new(eq_marker(op), vec![t.clone()]);
    if let Some(existing) = self.generated.get(&node).cloned() {
      self.note_possible_cycle(&existing);
      return existing;
    }
    let new_lid = Lid::new(SmallVec::new(), intern(&format!("{}{}", prefix_for(op), lid.name.as_str())));
    self.generated.insert(node, new_lid.clone());
    let ptr = mk_typ(TypKind::Buf(t, true));
    let decl = Decl::External {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 0, name: new_lid.clone(),
      ty: mk_typ(TypKind::Arrow(ptr.clone(), mk_typ(TypKind::Arrow(ptr, mk_typ(TypKind::Bool))))),
      param_names: vec![intern("x"), intern("y")],
    };
    self.emit(file, decl);
    new_lid
  }

  fn scoped_in_progress<T>(&mut self, lid: Lid, f: impl FnOnce(&mut Self) -> T) -> T {
    self.in_progress.insert(lid.clone());
    let result = f(self);
    self.in_progress.remove(&lid);
    result
  }

  /// `Flat`/`Variant` bodies: synthesize a private, field-by-field (or
  /// branch-by-branch) structural predicate. Registered in `generated`
  /// before its body is built so a self-recursive type (a list node
  /// comparing its own tail) resolves the inner call to the same lid instead
  /// of recursing into `structural_predicate` again.
  fn structural_predicate(&mut self, op: PolyCompOp, lid: &Lid, def: &TypeDef, t: &Typ, file: &str) -> Lid {
    let node = Node::new(eq_marker(op), vec![t.clone()]);
    if let Some(existing) = self.generated.get(&node).cloned() {
      self.note_possible_cycle(&existing);
      return existing;
    }
    let new_lid = Lid::new(SmallVec::new(), intern(&format!("{}{}", prefix_for(op), lid.name.as_str())));
    self.generated.insert(node.clone(), new_lid.clone());

    let x = intern("x");
    let y = intern("y");
    let def_body = def.body.clone();
    let body = self.scoped_in_progress(new_lid.clone(), |this| match &def_body {
      TypeDefBody::Flat(fields) => this.build_flat_body(op, fields, t, x, y, file),
      TypeDefBody::Variant(branches) => this.build_variant_body(op, branches, t, x, y, file),
      _ => unreachable!("structural_predicate only called for Flat/Variant bodies"),
    });
    let decl = Decl::Function {
      cc: CallConv::Default, flags: Flags::PRIVATE, type_arity: 0, ret: mk_typ(TypKind::Bool), name: new_lid.clone(),
      binders: vec![
        Binder { name: x, ty: t.clone(), mutable: false },
        Binder { name: y, ty: t.clone(), mutable: false },
      ],
      body,
    };
    self.emit(file, decl);
    new_lid
  }

  fn build_flat_body(&mut self, op: PolyCompOp, fields: &[Field], t: &Typ, x: Symbol, y: Symbol, file: &str) -> Expr {
    let (seed, combinator) = match op {
      PolyCompOp::PEq => (true, Op::And),
      PolyCompOp::PNeq => (false, Op::Or),
    };
    let xe = Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), x)), ty: t.clone() };
    let ye = Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), y)), ty: t.clone() };
    let mut acc = Expr { node: ExprKind::Bool(seed), ty: mk_typ(TypKind::Bool) };
    for (i, f) in fields.iter().enumerate() {
      let name = f.name.unwrap_or_else(|| intern(&format!("f{i}")));
      let xf = Expr { node: ExprKind::Field(Box::new(xe.clone()), name), ty: f.ty.clone() };
      let yf = Expr { node: ExprKind::Field(Box::new(ye.clone()), name), ty: f.ty.clone() };
      let rec = self.mk_rec_equality(op, &f.ty, xf, yf, file);
      acc = binop(combinator, None, acc, rec);
    }
    acc
  }

  /// `match x with Ci xs -> (match y with Ci ys -> AND/OR of field equality |
  /// _ -> fail) | _ -> fail`, with `fail` false for `PEq` and true for
  /// `PNeq` (mismatched constructors are always unequal).
  fn build_variant_body(&mut self, op: PolyCompOp, branches: &[Branch], t: &Typ, x: Symbol, y: Symbol, file: &str) -> Expr {
    let fail = Expr { node: ExprKind::Bool(op == PolyCompOp::PNeq), ty: mk_typ(TypKind::Bool) };
    let combinator = match op { PolyCompOp::PEq => Op::And, PolyCompOp::PNeq => Op::Or };
    let seed = op == PolyCompOp::PEq;

    let outer_arms: Vec<(Pattern, Expr)> = branches.iter().map(|b| {
      let xs: Vec<Symbol> = (0..b.fields.len()).map(|i| intern(&format!("x{i}"))).collect();
      let ys: Vec<Symbol> = (0..b.fields.len()).map(|i| intern(&format!("y{i}"))).collect();
      let mut acc = Expr { node: ExprKind::Bool(seed), ty: mk_typ(TypKind::Bool) };
      for (i, f) in b.fields.iter().enumerate() {
        let xi = Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), xs[i])), ty: f.ty.clone() };
        let yi = Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), ys[i])), ty: f.ty.clone() };
        let rec = self.mk_rec_equality(op, &f.ty, xi, yi, file);
        acc = binop(combinator, None, acc, rec);
      }
      let inner_match = Expr {
        node: ExprKind::Match(
          Box::new(Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), y)), ty: t.clone() }),
          vec![
            (Pattern::Ctor(b.ctor, ys.into_iter().map(Pattern::Var).collect()), acc),
            (Pattern::Wild, fail.clone()),
          ],
        ),
        ty: mk_typ(TypKind::Bool),
      };
      (Pattern::Ctor(b.ctor, xs.into_iter().map(Pattern::Var).collect()), inner_match)
    }).collect();

    let mut arms = outer_arms;
    arms.push((Pattern::Wild, fail));
    Expr {
      node: ExprKind::Match(Box::new(Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), x)), ty: t.clone() }), arms),
      ty: mk_typ(TypKind::Bool),
    }
  }

  /// `TUnit` short-circuits to `true` without visiting `classify` at all —
  /// every unit value is equal to every other, and `Prims.unit` never gets a
  /// type definition to look up.
  fn mk_rec_equality(&mut self, op: PolyCompOp, t: &Typ, x: Expr, y: Expr, file: &str) -> Expr {
    if matches!(&**t, TypKind::Unit) {
      return Expr { node: ExprKind::Bool(true), ty: mk_typ(TypKind::Bool) };
    }
    self.apply_poly_comp(op, t, x, y, file)
  }

  fn apply_poly_comp(&mut self, op: PolyCompOp, t: &Typ, x: Expr, y: Expr, file: &str) -> Expr {
    match self.classify(op, t, file) {
      Resolved::Primitive(prim, width) => binop(prim, width, x, y),
      Resolved::Call { lid, pointer, negate } => {
        let args = if pointer {
          vec![
            Expr { node: ExprKind::AddrOf(Box::new(x)), ty: mk_typ(TypKind::Buf(t.clone(), true)) },
            Expr { node: ExprKind::AddrOf(Box::new(y)), ty: mk_typ(TypKind::Buf(t.clone(), true)) },
          ]
        } else {
          vec![x, y]
        };
        let callee = Expr { node: ExprKind::Qualified(lid), ty: mk_typ(TypKind::Bool) };
        let call = Expr { node: ExprKind::App(Box::new(callee), args), ty: mk_typ(TypKind::Bool) };
        if negate { unop(Op::Not, call) } else { call }
      }
    }
  }

  /// A bare `EPolyComp(op, t)` not applied to two arguments — a polymorphic
  /// equality used as a first-class function value. Eta-expanded into a
  /// freshly named top-level predicate so a closure of type `t -> t -> bool`
  /// exists for the caller to reference.
  fn eta_expand(&mut self, op: PolyCompOp, t: &Typ, file: &str) -> Expr {
    let x = intern("x");
    let y = intern("y");
    let xe = Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), x)), ty: t.clone() };
    let ye = Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), y)), ty: t.clone() };
    let body = self.apply_poly_comp(op, t, xe, ye, file);
    let suffix = match &**t {
      TypKind::Qualified(l) => l.name.as_str().to_owned(),
      _ => crate::ir::prettyprint_args(std::slice::from_ref(t), &|_| None),
    };
    let prefix = match op { PolyCompOp::PEq => "__eq_closure__", PolyCompOp::PNeq => "__neq_closure__" };
    let new_lid = Lid::new(SmallVec::new(), intern(&format!("{prefix}{suffix}")));
    let decl = Decl::Function {
      cc: CallConv::Default, flags: Flags::PRIVATE, type_arity: 0, ret: mk_typ(TypKind::Bool), name: new_lid.clone(),
      binders: vec![
        Binder { name: x, ty: t.clone(), mutable: false },
        Binder { name: y, ty: t.clone(), mutable: false },
      ],
      body,
    };
    self.emit(file, decl);
    Expr {
      node: ExprKind::Qualified(new_lid),
      ty: mk_typ(TypKind::Arrow(t.clone(), mk_typ(TypKind::Arrow(t.clone(), mk_typ(TypKind::Bool))))),
    }
  }

  fn visit_pattern(&mut self, p: &Pattern) -> Pattern { p.clone() }

  fn visit_expr(&mut self, e: &Expr, file: &str) -> Expr {
    if let ExprKind::App(f, args) = &e.node {
      if let ExprKind::PolyComp(op, t) = &f.node {
        assert_eq!(args.len(), 2, "EPolyComp is always binary");
        let a = self.visit_expr(&args[0], file);
        let b = self.visit_expr(&args[1], file);
        return self.apply_poly_comp(*op, t, a, b, file);
      }
    }
    if let ExprKind::PolyComp(op, t) = &e.node {
      return self.eta_expand(*op, t, file);
    }
    let node = match &e.node {
      ExprKind::Qualified(lid) => ExprKind::Qualified(lid.clone()),
      ExprKind::TApp(..) => unreachable!("ETApp must not survive past the function-monomorphization pass"),
      ExprKind::App(f, args) => ExprKind::App(
        Box::new(self.visit_expr(f, file)),
        args.iter().map(|a| self.visit_expr(a, file)).collect(),
      ),
      ExprKind::Op(op, w) => ExprKind::Op(*op, *w),
      ExprKind::PolyComp(..) => unreachable!("handled above"),
      ExprKind::Tuple(..) => unreachable!("ETuple must not survive past data-type monomorphization"),
      ExprKind::Flat(fs) => ExprKind::Flat(fs.iter().map(|(n, x)| (*n, self.visit_expr(x, file))).collect()),
      ExprKind::Field(e, n) => ExprKind::Field(Box::new(self.visit_expr(e, file)), *n),
      ExprKind::Match(scrut, arms) => ExprKind::Match(
        Box::new(self.visit_expr(scrut, file)),
        arms.iter().map(|(p, x)| (self.visit_pattern(p), self.visit_expr(x, file))).collect(),
      ),
      ExprKind::Bound(i) => ExprKind::Bound(*i),
      ExprKind::Bool(b) => ExprKind::Bool(*b),
      ExprKind::AddrOf(e) => ExprKind::AddrOf(Box::new(self.visit_expr(e, file))),
      ExprKind::Lambda(binders, body) => ExprKind::Lambda(binders.clone(), Box::new(self.visit_expr(body, file))),
    };
    Expr { node, ty: e.ty.clone() }
  }

  fn visit_decl(&mut self, d: &Decl, file: &str) -> Decl {
    match d {
      Decl::Function { cc, flags, type_arity, ret, name, binders, body } => Decl::Function {
        cc: *cc, flags: *flags, type_arity: *type_arity, ret: ret.clone(), name: name.clone(),
        binders: binders.clone(), body: self.visit_expr(body, file),
      },
      Decl::Global { flags, name, type_arity, ty, body } => Decl::Global {
        flags: *flags, name: name.clone(), type_arity: *type_arity, ty: ty.clone(), body: self.visit_expr(body, file),
      },
      other => other.clone(),
    }
  }

  fn run_file(&mut self, file: &File) -> Vec<Decl> {
    let _span = tracing::debug_span!("monomorphization", pass = "equality", file = %file.name).entered();
    let mut output = Vec::new();
    for decl in &file.decls {
      self.has_cycle = false;
      let rewritten = self.visit_decl(decl, &file.name);
      if self.has_cycle {
        for d in &mut self.pending { strip_private(d); }
      }
      self.flush_into(&mut output);
      output.push(rewritten);
    }
    output
  }
}

fn strip_private(d: &mut Decl) {
  match d {
    Decl::Type { flags, .. } | Decl::Function { flags, .. } |
    Decl::Global { flags, .. } | Decl::External { flags, .. } => *flags &= !Flags::PRIVATE,
  }
}

fn prim_op(op: PolyCompOp) -> Op {
  match op { PolyCompOp::PEq => Op::Eq, PolyCompOp::PNeq => Op::Neq }
}

fn binop(op: Op, width: Option<IntWidth_>, a: Expr, b: Expr) -> Expr {
  let callee = Expr { node: ExprKind::Op(op, width), ty: mk_typ(TypKind::Bool) };
  Expr { node: ExprKind::App(Box::new(callee), vec![a, b]), ty: mk_typ(TypKind::Bool) }
}

fn unop(op: Op, a: Expr) -> Expr {
  let callee = Expr { node: ExprKind::Op(op, None), ty: mk_typ(TypKind::Bool) };
  Expr { node: ExprKind::App(Box::new(callee), vec![a]), ty: mk_typ(TypKind::Bool) }
}

/// Run the equality generator over the whole (already data-type- and
/// function-monomorphized) program.
#[must_use] pub fn run(program: &Program, config: &BuildConfig, diagnostics: &mut Diagnostics) -> Program {
  let defs = build_def_map(program);
  let mut pass = EqualityPass::new(defs, config, diagnostics);
  let mut files = Vec::with_capacity(program.files.len());
  for file in &program.files {
    files.push(File { name: file.name.clone(), decls: pass.run_file(file) });
  }
  Program { files }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ir::{mk_typ, IntWidth, TypKind};

  fn lid(name: &str) -> Lid { Lid::new(SmallVec::new(), intern(name)) }
  fn int32() -> Typ { mk_typ(TypKind::Int(IntWidth::W32, true)) }

  fn poly_comp_call(op: PolyCompOp, t: Typ, a: Expr, b: Expr) -> Expr {
    Expr {
      node: ExprKind::App(Box::new(Expr { node: ExprKind::PolyComp(op, t), ty: mk_typ(TypKind::Bool) }), vec![a, b]),
      ty: mk_typ(TypKind::Bool),
    }
  }

  fn either_int32_bool() -> (Lid, Decl) {
    let either = lid("Either__int32_bool");
    let def = Decl::Type {
      lid: either.clone(), flags: Flags::empty(), arity: 0,
      body: TypeDefBody::Variant(vec![
        Branch { ctor: intern("Left"), fields: vec![Field { name: None, ty: int32(), mutable: false }] },
        Branch { ctor: intern("Right"), fields: vec![Field { name: None, ty: mk_typ(TypKind::Bool), mutable: false }] },
      ]),
    };
    (either, def)
  }

  /// S5: structural equality on a two-branch variant produces a private
  /// predicate that matches both scrutinees and recurses into primitive
  /// comparisons per field, with no residual `EPolyComp`.
  #[test]
  fn s5_structural_equality_on_variant() {
    let (either, either_def) = either_int32_bool();
    let t = mk_typ(TypKind::Qualified(either.clone()));
    let x = intern("x");
    let y = intern("y");
    let user_fn = Decl::Function {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 0, ret: mk_typ(TypKind::Bool), name: lid("same"),
      binders: vec![
        Binder { name: x, ty: t.clone(), mutable: false },
        Binder { name: y, ty: t.clone(), mutable: false },
      ],
      body: poly_comp_call(
        PolyCompOp::PEq, t.clone(),
        Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), x)), ty: t.clone() },
        Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), y)), ty: t.clone() },
      ),
    };
    let program = Program { files: vec![File { name: "main".into(), decls: vec![either_def, user_fn] }] };
    let mut diags = Diagnostics::new();
    let out = run(&program, &BuildConfig::default(), &mut diags);
    let decls = &out.files[0].decls;

    let generated = decls.iter().find(|d| d.lid().name.as_str() == "__eq__Either__int32_bool")
      .expect("a structural predicate for the variant was synthesized");
    assert!(generated.flags().contains(Flags::PRIVATE));

    let Decl::Function { body, .. } = decls.iter().find(|d| d.lid().name.as_str() == "same").unwrap() else { panic!() };
    fn has_poly_comp(e: &Expr) -> bool {
      match &e.node {
        ExprKind::PolyComp(..) => true,
        ExprKind::App(f, args) => has_poly_comp(f) || args.iter().any(has_poly_comp),
        ExprKind::Match(s, arms) => has_poly_comp(s) || arms.iter().any(|(_, x)| has_poly_comp(x)),
        _ => false,
      }
    }
    assert!(!has_poly_comp(body), "no EPolyComp should remain once the pass has run");
    let ExprKind::App(callee, _) = &body.node else { panic!("expected a direct call to the synthesized predicate") };
    let ExprKind::Qualified(called) = &callee.node else { panic!() };
    assert_eq!(called.name.as_str(), "__eq__Either__int32_bool");
  }

  /// S6: a bare `EPolyComp` used as a value (not applied to two arguments)
  /// is eta-expanded into its own named top-level predicate.
  #[test]
  fn s6_higher_order_equality_is_eta_expanded() {
    let holder = Decl::Function {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 0,
      ret: mk_typ(TypKind::Arrow(int32(), mk_typ(TypKind::Arrow(int32(), mk_typ(TypKind::Bool))))),
      name: lid("get_comparator"), binders: vec![],
      body: Expr { node: ExprKind::PolyComp(PolyCompOp::PEq, int32()), ty: mk_typ(TypKind::Bool) },
    };
    let program = Program { files: vec![File { name: "main".into(), decls: vec![holder] }] };
    let mut diags = Diagnostics::new();
    let out = run(&program, &BuildConfig::default(), &mut diags);
    let decls = &out.files[0].decls;
    let closure = decls.iter().find(|d| d.lid().name.as_str() == "__eq_closure__int32")
      .expect("the bare EPolyComp was eta-expanded into a named predicate");
    let Decl::Function { body, .. } = closure else { panic!() };
    assert!(matches!(body.node, ExprKind::App(..)), "the closure body directly compares its two arguments");

    let Decl::Function { body: holder_body, .. } = decls.iter().find(|d| d.lid().name.as_str() == "get_comparator").unwrap() else { panic!() };
    assert!(matches!(holder_body.node, ExprKind::Qualified(..)), "the use site now references the synthesized closure");
  }

  /// Mutual recursion through two structural predicates strips `Private`
  /// from every equality declaration synthesized for the first type's
  /// top-level use.
  #[test]
  fn mutually_recursive_types_lose_private_on_their_equalities() {
    let b_lid = lid("B");
    let a_lid = lid("A");
    let b_ty = mk_typ(TypKind::Qualified(b_lid.clone()));
    let a_ty = mk_typ(TypKind::Qualified(a_lid.clone()));
    let a_def = Decl::Type {
      lid: a_lid.clone(), flags: Flags::empty(), arity: 0,
      body: TypeDefBody::Flat(vec![Field { name: Some(intern("next")), ty: b_ty.clone(), mutable: false }]),
    };
    let b_def = Decl::Type {
      lid: b_lid.clone(), flags: Flags::empty(), arity: 0,
      body: TypeDefBody::Flat(vec![Field { name: Some(intern("back")), ty: a_ty.clone(), mutable: false }]),
    };
    let x = intern("x");
    let y = intern("y");
    let user_fn = Decl::Function {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 0, ret: mk_typ(TypKind::Bool), name: lid("same"),
      binders: vec![
        Binder { name: x, ty: a_ty.clone(), mutable: false },
        Binder { name: y, ty: a_ty.clone(), mutable: false },
      ],
      body: poly_comp_call(
        PolyCompOp::PEq, a_ty.clone(),
        Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), x)), ty: a_ty.clone() },
        Expr { node: ExprKind::Qualified(Lid::new(SmallVec::new(), y)), ty: a_ty.clone() },
      ),
    };
    let program = Program { files: vec![File { name: "main".into(), decls: vec![a_def, b_def, user_fn] }] };
    let mut diags = Diagnostics::new();
    let out = run(&program, &BuildConfig::default(), &mut diags);
    let decls = &out.files[0].decls;
    let eq_a = decls.iter().find(|d| d.lid().name.as_str() == "__eq__A").unwrap();
    assert!(!eq_a.flags().contains(Flags::PRIVATE), "mutual recursion through B should have stripped Private from A's equality");
  }
}
