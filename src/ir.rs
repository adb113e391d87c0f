//! The shared intermediate representation the three monomorphization passes
//! rewrite, plus capture-free substitution and the name-hint helpers all
//! three passes use to choose readable generated names.
//!
//! `Typ = Rc<TypKind>`: cheap structural sharing, and `Rc<T>` forwards
//! `Eq`/`Hash` to `T` so a `Node` (a [`Lid`] plus a `Vec<Typ>`) works as a
//! hash-map key with no custom impl.

use std::rc::Rc;
use std::sync::LazyLock;
use smallvec::SmallVec;
use bitflags::bitflags;
use crate::symbol::{Symbol, intern};

/// A qualified identifier: a module path plus a simple name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Lid {
  pub module: SmallVec<[Symbol; 2]>,
  pub name: Symbol,
}

impl Lid {
  #[must_use] pub fn new(module: impl Into<SmallVec<[Symbol; 2]>>, name: Symbol) -> Self {
    Self { module: module.into(), name }
  }

  /// A same-module sibling with a different simple name.
  #[must_use] pub fn with_name(&self, name: Symbol) -> Self {
    Self { module: self.module.clone(), name }
  }

  #[must_use] pub fn display(&self) -> String {
    let mut s = String::new();
    for m in &self.module { s.push_str(m.as_str()); s.push('.'); }
    s.push_str(self.name.as_str());
    s
  }
}

/// The distinguished "anonymous tuple constructor" identifier.
#[must_use] pub fn tuple_lid() -> &'static Lid {
  static TUPLE_LID: LazyLock<Lid> =
    LazyLock::new(|| Lid { module: SmallVec::new(), name: intern("*tuple*") });
  &TUPLE_LID
}

/// Widths for fixed-size integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth { W8, W16, W32, W64, WSize }

/// A type. Immutable, structurally shared.
pub type Typ = Rc<TypKind>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypKind {
  /// A reference to a (possibly already-monomorphic) named type.
  Qualified(Lid),
  /// Application of a parametric type constructor to arguments.
  App(Lid, Vec<Typ>),
  /// An anonymous tuple type.
  Tuple(Vec<Typ>),
  /// A fixed-width integer, signed or unsigned.
  Int(IntWidth, bool),
  Bool,
  Unit,
  /// Indirection (a pointer). `bool` marks a `const` pointee.
  Buf(Typ, bool),
  Arrow(Typ, Typ),
  /// A de Bruijn-indexed type variable bound by the enclosing declaration's
  /// type-parameter list.
  Bound(u32),
}

#[must_use] pub fn mk_typ(k: TypKind) -> Typ { Rc::new(k) }

bitflags! {
  /// Declaration flags. `Private`/`AutoGenerated` are written by this crate;
  /// `GcType` is read only.
  #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
  pub struct Flags: u8 {
    const PRIVATE = 1;
    const AUTO_GENERATED = 2;
    const GC_TYPE = 4;
  }
}

#[derive(Clone, Debug)]
pub struct Field {
  pub name: Option<Symbol>,
  pub ty: Typ,
  pub mutable: bool,
}

#[derive(Clone, Debug)]
pub struct Branch {
  pub ctor: Symbol,
  pub fields: Vec<Field>,
}

#[derive(Clone, Debug)]
pub enum TypeDefBody {
  Flat(Vec<Field>),
  Variant(Vec<Branch>),
  Abbrev(Typ),
  Forward,
  Enum,
  Union,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallConv { Default, C }

#[derive(Clone, Debug)]
pub struct Binder {
  pub name: Symbol,
  pub ty: Typ,
  pub mutable: bool,
}

#[derive(Clone, Debug)]
pub enum Decl {
  Type { lid: Lid, flags: Flags, arity: u32, body: TypeDefBody },
  Function {
    cc: CallConv, flags: Flags, type_arity: u32, ret: Typ, name: Lid,
    binders: Vec<Binder>, body: Expr,
  },
  Global { flags: Flags, name: Lid, type_arity: u32, ty: Typ, body: Expr },
  External {
    cc: CallConv, flags: Flags, type_arity: u32, name: Lid, ty: Typ,
    param_names: Vec<Symbol>,
  },
}

impl Decl {
  #[must_use] pub fn lid(&self) -> &Lid {
    match self {
      Decl::Type { lid, .. } => lid,
      Decl::Function { name, .. } | Decl::Global { name, .. } | Decl::External { name, .. } => name,
    }
  }

  #[must_use] pub fn flags(&self) -> Flags {
    match self {
      Decl::Type { flags, .. } | Decl::Function { flags, .. } |
      Decl::Global { flags, .. } | Decl::External { flags, .. } => *flags,
    }
  }

  #[must_use] pub fn type_arity(&self) -> u32 {
    match self {
      Decl::Type { arity, .. } => *arity,
      Decl::Function { type_arity, .. } | Decl::Global { type_arity, .. } |
      Decl::External { type_arity, .. } => *type_arity,
    }
  }
}

/// Structural equality operator, unresolved until the equality pass runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolyCompOp { PEq, PNeq }

/// Primitive opcodes a resolved [`PolyCompOp`] or arithmetic expression may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
  Add, Sub, Mul, Div, Mod,
  And, Or, Not,
  Eq, Neq, Lt, Le, Gt, Ge,
  BitAnd, BitOr, BitXor, BitNot, Shl, Shr,
}

#[derive(Clone, Debug)]
pub enum Pattern {
  Wild,
  Var(Symbol),
  Tuple(Vec<Pattern>),
  Record(Vec<(Symbol, Pattern)>),
  Ctor(Symbol, Vec<Pattern>),
}

#[derive(Clone, Debug)]
pub struct Expr {
  pub node: ExprKind,
  pub ty: Typ,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
  Qualified(Lid),
  /// Type application of a polymorphic reference.
  TApp(Box<Expr>, Vec<Typ>),
  App(Box<Expr>, Vec<Expr>),
  Op(Op, Option<IntWidth>),
  /// Unresolved structural equality/inequality at an arbitrary type.
  PolyComp(PolyCompOp, Typ),
  Tuple(Vec<Expr>),
  Flat(Vec<(Symbol, Expr)>),
  Field(Box<Expr>, Symbol),
  Match(Box<Expr>, Vec<(Pattern, Expr)>),
  Bound(u32),
  Bool(bool),
  AddrOf(Box<Expr>),
  /// `fun x y -> body`, used when eta-expanding a bare [`ExprKind::PolyComp`].
  Lambda(Vec<Binder>, Box<Expr>),
}

#[derive(Clone, Debug)]
pub struct File {
  pub name: String,
  pub decls: Vec<Decl>,
}

#[derive(Clone, Debug, Default)]
pub struct Program {
  pub files: Vec<File>,
}

/// `(type-constructor, type-argument-vector)`: the unit of data-type
/// monomorphization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Node {
  pub lid: Lid,
  pub args: Vec<Typ>,
}

impl Node {
  #[must_use] pub fn new(lid: Lid, args: Vec<Typ>) -> Self { Self { lid, args } }
}

/// A user-provided type abbreviation whose left-hand side can be used as the
/// generated name for the right-hand side's monomorphization.
#[derive(Clone, Debug)]
pub struct NameHint {
  pub node: Node,
  pub lid: Lid,
}

/// Capture-free substitution of the `ts.len()` outermost type variables by
/// `ts` in a type. Other `TypKind` variants have no binders of their own, so
/// this is a direct structural walk with no de Bruijn depth bookkeeping.
#[must_use] pub fn subst_tn(ts: &[Typ], ty: &Typ) -> Typ {
  match &**ty {
    TypKind::Bound(i) => ts[*i as usize].clone(),
    TypKind::Qualified(_) | TypKind::Bool | TypKind::Unit => ty.clone(),
    TypKind::Int(..) => ty.clone(),
    TypKind::App(lid, args) =>
      mk_typ(TypKind::App(lid.clone(), args.iter().map(|a| subst_tn(ts, a)).collect())),
    TypKind::Tuple(args) =>
      mk_typ(TypKind::Tuple(args.iter().map(|a| subst_tn(ts, a)).collect())),
    TypKind::Buf(t, is_const) => mk_typ(TypKind::Buf(subst_tn(ts, t), *is_const)),
    TypKind::Arrow(a, b) => mk_typ(TypKind::Arrow(subst_tn(ts, a), subst_tn(ts, b))),
  }
}

fn subst_tn_field(ts: &[Typ], f: &Field) -> Field {
  Field { name: f.name, ty: subst_tn(ts, &f.ty), mutable: f.mutable }
}

#[must_use] pub fn subst_tn_fields(ts: &[Typ], fields: &[Field]) -> Vec<Field> {
  fields.iter().map(|f| subst_tn_field(ts, f)).collect()
}

#[must_use] pub fn subst_tn_branches(ts: &[Typ], branches: &[Branch]) -> Vec<Branch> {
  branches.iter()
    .map(|b| Branch { ctor: b.ctor, fields: subst_tn_fields(ts, &b.fields) })
    .collect()
}

/// Capture-free substitution of type variables through an expression tree:
/// every node's `ty` field, plus `TApp`/`PolyComp` type payloads, are
/// rewritten via [`subst_tn`].
#[must_use] pub fn subst_ten(ts: &[Typ], e: &Expr) -> Expr {
  let node = match &e.node {
    ExprKind::Qualified(lid) => ExprKind::Qualified(lid.clone()),
    ExprKind::TApp(f, args) =>
      ExprKind::TApp(Box::new(subst_ten(ts, f)), args.iter().map(|a| subst_tn(ts, a)).collect()),
    ExprKind::App(f, args) =>
      ExprKind::App(Box::new(subst_ten(ts, f)), args.iter().map(|a| subst_ten(ts, a)).collect()),
    ExprKind::Op(op, w) => ExprKind::Op(*op, *w),
    ExprKind::PolyComp(op, t) => ExprKind::PolyComp(*op, subst_tn(ts, t)),
    ExprKind::Tuple(es) => ExprKind::Tuple(es.iter().map(|x| subst_ten(ts, x)).collect()),
    ExprKind::Flat(fs) =>
      ExprKind::Flat(fs.iter().map(|(n, x)| (*n, subst_ten(ts, x))).collect()),
    ExprKind::Field(e, n) => ExprKind::Field(Box::new(subst_ten(ts, e)), *n),
    ExprKind::Match(scrut, arms) => ExprKind::Match(
      Box::new(subst_ten(ts, scrut)),
      arms.iter().map(|(p, x)| (p.clone(), subst_ten(ts, x))).collect(),
    ),
    ExprKind::Bound(i) => ExprKind::Bound(*i),
    ExprKind::Bool(b) => ExprKind::Bool(*b),
    ExprKind::AddrOf(e) => ExprKind::AddrOf(Box::new(subst_ten(ts, e))),
    ExprKind::Lambda(binders, body) => ExprKind::Lambda(
      binders.iter().map(|b| Binder { name: b.name, ty: subst_tn(ts, &b.ty), mutable: b.mutable }).collect(),
      Box::new(subst_ten(ts, body)),
    ),
  };
  Expr { node, ty: subst_tn(ts, &e.ty) }
}

/// Shallow pretty-printer for a type-argument vector, used to synthesize
/// generated names. Already-monomorphized applications are rewritten to
/// their chosen name (via `resolved`); everything else is printed literally.
/// This is shallow by design: it is meant to read as a human-legible suffix,
/// not a canonical encoding.
pub fn prettyprint_args(args: &[Typ], resolved: &dyn Fn(&Node) -> Option<Lid>) -> String {
  use itertools::Itertools;
  args.iter().map(|t| prettyprint_one(t, resolved)).join("_")
}

fn prettyprint_one(t: &Typ, resolved: &dyn Fn(&Node) -> Option<Lid>) -> String {
  match &**t {
    TypKind::Qualified(lid) => lid.name.as_str().to_owned(),
    TypKind::App(lid, args) => {
      let node = Node::new(lid.clone(), args.clone());
      if let Some(chosen) = resolved(&node) { return chosen.name.as_str().to_owned() }
      format!("{}_{}", lid.name.as_str(), prettyprint_args(args, resolved))
    }
    TypKind::Tuple(args) => {
      let node = Node::new(tuple_lid().clone(), args.clone());
      if let Some(chosen) = resolved(&node) { return chosen.name.as_str().to_owned() }
      format!("tup_{}", prettyprint_args(args, resolved))
    }
    TypKind::Int(w, signed) => {
      let p = if *signed { "int" } else { "uint" };
      match w {
        IntWidth::W8 => format!("{p}8"), IntWidth::W16 => format!("{p}16"),
        IntWidth::W32 => format!("{p}32"), IntWidth::W64 => format!("{p}64"),
        IntWidth::WSize => format!("{p}size"),
      }
    }
    TypKind::Bool => "bool".to_owned(),
    TypKind::Unit => "unit".to_owned(),
    TypKind::Buf(inner, _) => format!("buf_{}", prettyprint_one(inner, resolved)),
    TypKind::Arrow(a, b) =>
      format!("{}_to_{}", prettyprint_one(a, resolved), prettyprint_one(b, resolved)),
    TypKind::Bound(i) => format!("t{i}"),
  }
}
