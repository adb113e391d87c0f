//! The function/global monomorphizer: on-demand instantiation of
//! polymorphic definitions keyed by applied type-argument vectors.
//!
//! Reuses [`crate::ir::Node`] as the `(lid, type-argument-vector)` memoization
//! key — it's the same structural identity the data-type pass uses for
//! `(type-constructor, type-argument-vector)` nodes, just applied to callees
//! instead of type constructors.

use std::collections::HashMap;
use crate::diagnostics::{BuildConfig, Diagnostics, Warning};
use crate::ir::{
  prettyprint_args, subst_tn, subst_ten, Binder, CallConv, Decl, Expr, ExprKind, File, Flags, Lid,
  Node, Op, Pattern, Program, Typ,
};
use crate::symbol::intern;

#[derive(Clone)]
enum PolyDefKind {
  Function { cc: CallConv, flags: Flags, ret: Typ, binders: Vec<Binder>, body: Expr },
  Global { flags: Flags, ty: Typ, body: Expr },
}

#[derive(Clone)]
struct PolyDef {
  type_arity: u32,
  kind: PolyDefKind,
}

fn build_polydef_map(program: &Program) -> HashMap<Lid, PolyDef> {
  let mut map = HashMap::new();
  for file in &program.files {
    for d in &file.decls {
      match d {
        Decl::Function { type_arity, cc, flags, ret, name, binders, body } if *type_arity > 0 => {
          map.insert(name.clone(), PolyDef {
            type_arity: *type_arity,
            kind: PolyDefKind::Function { cc: *cc, flags: *flags, ret: ret.clone(), binders: binders.clone(), body: body.clone() },
          });
        }
        Decl::Global { type_arity, flags, name, ty, body } if *type_arity > 0 => {
          map.insert(name.clone(), PolyDef {
            type_arity: *type_arity,
            kind: PolyDefKind::Global { flags: *flags, ty: ty.clone(), body: body.clone() },
          });
        }
        _ => {}
      }
    }
  }
  map
}

struct FunctionPass<'a> {
  polydefs: HashMap<Lid, PolyDef>,
  generated_lids: HashMap<Node, Lid>,
  pending: Vec<Decl>,
  config: &'a BuildConfig,
  diagnostics: &'a mut Diagnostics,
}

impl<'a> FunctionPass<'a> {
  fn new(polydefs: HashMap<Lid, PolyDef>, config: &'a BuildConfig, diagnostics: &'a mut Diagnostics) -> Self {
    Self { polydefs, generated_lids: HashMap::new(), pending: Vec::new(), config, diagnostics }
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

  fn instantiate(&mut self, def: &PolyDef, ts: &[Typ], new_lid: &Lid, file: &str) -> Decl {
    match &def.kind {
      PolyDefKind::Function { cc, flags, ret, binders, body } => {
        let ret2 = subst_tn(ts, ret);
        let binders2: Vec<Binder> = binders.iter()
          .map(|b| Binder { name: b.name, ty: subst_tn(ts, &b.ty), mutable: b.mutable })
          .collect();
        let body2 = self.visit_expr(&subst_ten(ts, body), file);
        Decl::Function { cc: *cc, flags: *flags, type_arity: 0, ret: ret2, name: new_lid.clone(), binders: binders2, body: body2 }
      }
      PolyDefKind::Global { flags, ty, body } => {
        let ty2 = subst_tn(ts, ty);
        let body2 = self.visit_expr(&subst_ten(ts, body), file);
        Decl::Global { flags: *flags, name: new_lid.clone(), type_arity: 0, ty: ty2, body: body2 }
      }
    }
  }

  fn visit_pattern(&mut self, p: &Pattern) -> Pattern { p.clone() }

  fn visit_expr(&mut self, e: &Expr, file: &str) -> Expr {
    let node = match &e.node {
      ExprKind::TApp(inner, ts) => return self.visit_tapp(inner, ts, &e.ty, file),
      ExprKind::Qualified(lid) => ExprKind::Qualified(lid.clone()),
      ExprKind::App(f, args) => ExprKind::App(
        Box::new(self.visit_expr(f, file)),
        args.iter().map(|a| self.visit_expr(a, file)).collect(),
      ),
      ExprKind::Op(op, w) => ExprKind::Op(*op, *w),
      ExprKind::PolyComp(op, t) => ExprKind::PolyComp(*op, t.clone()),
      ExprKind::Tuple(es) => ExprKind::Tuple(es.iter().map(|x| self.visit_expr(x, file)).collect()),
      ExprKind::Flat(fs) => ExprKind::Flat(fs.iter().map(|(n, x)| (*n, self.visit_expr(x, file))).collect()),
      ExprKind::Field(e, n) => ExprKind::Field(Box::new(self.visit_expr(e, file)), *n),
      ExprKind::Match(scrut, arms) => ExprKind::Match(
        Box::new(self.visit_expr(scrut, file)),
        arms.iter().map(|(p, x)| (self.visit_pattern(p), self.visit_expr(x, file))).collect(),
      ),
      ExprKind::Bound(i) => ExprKind::Bound(*i),
      ExprKind::Bool(b) => ExprKind::Bool(*b),
      ExprKind::AddrOf(e) => ExprKind::AddrOf(Box::new(self.visit_expr(e, file))),
      ExprKind::Lambda(binders, body) =>
        ExprKind::Lambda(binders.clone(), Box::new(self.visit_expr(body, file))),
    };
    Expr { node, ty: e.ty.clone() }
  }

  /// `ETApp(e, ts)` dispatch.
  fn visit_tapp(&mut self, inner: &Expr, ts: &[Typ], result_ty: &Typ, file: &str) -> Expr {
    let ExprKind::Qualified(lid) = &inner.node else {
      if let ExprKind::Op(Op::Eq | Op::Neq, _) = &inner.node {
        unreachable!("EOp(Eq|Neq) must not appear under ETApp at the function-monomorphization stage");
      }
      return Expr {
        node: ExprKind::TApp(Box::new(self.visit_expr(inner, file)), ts.to_vec()),
        ty: result_ty.clone(),
      };
    };

    let node = Node::new(lid.clone(), ts.to_vec());
    if let Some(chosen) = self.generated_lids.get(&node) {
      return Expr { node: ExprKind::Qualified(chosen.clone()), ty: result_ty.clone() };
    }

    let Some(def) = self.polydefs.get(lid).cloned() else {
      // External polymorphic reference: left for the backend to reject or inline.
      return Expr {
        node: ExprKind::TApp(Box::new(self.visit_expr(inner, file)), ts.to_vec()),
        ty: result_ty.clone(),
      };
    };

    if def.type_arity as usize != ts.len() {
      self.diagnostics.warn(file, Warning::NotFullyTypeApplied { lid: lid.clone() });
      return Expr {
        node: ExprKind::TApp(Box::new(self.visit_expr(inner, file)), ts.to_vec()),
        ty: result_ty.clone(),
      };
    }

    let suffix = prettyprint_args(ts, &|_| None);
    let new_lid = lid.with_name(intern(&format!("{}__{suffix}", lid.name.as_str())));
    // Register before visiting the body: supports polymorphic recursion (a
    // recursive call to the same instantiation resolves to `new_lid` rather
    // than re-triggering instantiation).
    self.generated_lids.insert(node, new_lid.clone());
    let specialized = self.instantiate(&def, ts, &new_lid, file);
    self.emit(file, specialized);
    Expr { node: ExprKind::Qualified(new_lid), ty: result_ty.clone() }
  }

  fn visit_decl(&mut self, d: &Decl, file: &str) -> Decl {
    match d {
      Decl::Function { cc, flags, type_arity, ret, name, binders, body } =>
        Decl::Function { cc: *cc, flags: *flags, type_arity: *type_arity, ret: ret.clone(), name: name.clone(), binders: binders.clone(), body: self.visit_expr(body, file) },
      Decl::Global { flags, name, type_arity, ty, body } =>
        Decl::Global { flags: *flags, name: name.clone(), type_arity: *type_arity, ty: ty.clone(), body: self.visit_expr(body, file) },
      other => other.clone(),
    }
  }

  fn run_file(&mut self, file: &File) -> Vec<Decl> {
    let _span = tracing::debug_span!("monomorphization", pass = "functions", file = %file.name).entered();
    let mut output = Vec::new();
    for decl in &file.decls {
      let is_dropped_poly = matches!(decl,
        Decl::Function { type_arity, .. } | Decl::Global { type_arity, .. } if *type_arity > 0);
      if is_dropped_poly {
        self.flush_into(&mut output);
        continue;
      }
      let rewritten = self.visit_decl(decl, &file.name);
      self.flush_into(&mut output);
      output.push(rewritten);
    }
    output
  }
}

/// Run the function/global monomorphizer over the whole program.
#[must_use] pub fn run(program: &Program, config: &BuildConfig, diagnostics: &mut Diagnostics) -> Program {
  let polydefs = build_polydef_map(program);
  let mut pass = FunctionPass::new(polydefs, config, diagnostics);
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
  use smallvec::smallvec;

  fn lid(name: &str) -> Lid { Lid::new(smallvec![], intern(name)) }
  fn int(w: IntWidth) -> Typ { mk_typ(TypKind::Int(w, true)) }

  /// S4: `id` instantiated at two distinct types produces two specializations
  /// and no residual `ETApp`.
  #[test]
  fn s4_polymorphic_identity_instantiated_twice() {
    let id = lid("id");
    let x = intern("x");
    let id_def = Decl::Function {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 1,
      ret: mk_typ(TypKind::Bound(0)), name: id.clone(),
      binders: vec![Binder { name: x, ty: mk_typ(TypKind::Bound(0)), mutable: false }],
      body: Expr { node: ExprKind::Qualified(Lid::new(smallvec![], x)), ty: mk_typ(TypKind::Bound(0)) },
    };
    let call = |ts: Vec<Typ>, ret: Typ| Expr {
      node: ExprKind::TApp(Box::new(Expr { node: ExprKind::Qualified(id.clone()), ty: mk_typ(TypKind::Bool) }), ts),
      ty: ret,
    };
    let main = Decl::Function {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 0,
      ret: mk_typ(TypKind::Bool), name: lid("main"), binders: vec![],
      body: Expr {
        node: ExprKind::Tuple(vec![
          call(vec![mk_typ(TypKind::Bool)], mk_typ(TypKind::Bool)),
          call(vec![int(IntWidth::W64)], int(IntWidth::W64)),
        ]),
        ty: mk_typ(TypKind::Bool),
      },
    };
    let program = Program { files: vec![File { name: "main".into(), decls: vec![id_def, main] }] };
    let mut diags = Diagnostics::new();
    let out = run(&program, &BuildConfig::default(), &mut diags);
    let decls = &out.files[0].decls;
    assert!(decls.iter().any(|d| d.lid().name.as_str() == "id__bool"));
    assert!(decls.iter().any(|d| d.lid().name.as_str() == "id__int64"));
    assert!(!decls.iter().any(|d| d.lid().name.as_str() == "id"), "the polymorphic source decl is dropped");
    fn has_tapp(e: &Expr) -> bool {
      match &e.node {
        ExprKind::TApp(..) => true,
        ExprKind::Tuple(es) => es.iter().any(has_tapp),
        _ => false,
      }
    }
    for d in decls {
      if let Decl::Function { body, .. } = d { assert!(!has_tapp(body)); }
    }
  }

  #[test]
  fn arity_mismatch_is_a_warning_not_a_panic() {
    let id = lid("id");
    let id_def = Decl::Function {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 1,
      ret: mk_typ(TypKind::Bound(0)), name: id.clone(), binders: vec![],
      body: Expr { node: ExprKind::Bool(true), ty: mk_typ(TypKind::Bool) },
    };
    let bad_call = Decl::Function {
      cc: CallConv::Default, flags: Flags::empty(), type_arity: 0,
      ret: mk_typ(TypKind::Bool), name: lid("main"), binders: vec![],
      body: Expr {
        node: ExprKind::TApp(
          Box::new(Expr { node: ExprKind::Qualified(id), ty: mk_typ(TypKind::Bool) }),
          vec![mk_typ(TypKind::Bool), int(IntWidth::W64)],
        ),
        ty: mk_typ(TypKind::Bool),
      },
    };
    let program = Program { files: vec![File { name: "main".into(), decls: vec![id_def, bad_call] }] };
    let mut diags = Diagnostics::new();
    let _out = run(&program, &BuildConfig::default(), &mut diags);
    assert_eq!(diags.warnings.len(), 1);
    assert!(matches!(diags.warnings[0].1, Warning::NotFullyTypeApplied { .. }));
  }
}
