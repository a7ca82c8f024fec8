use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::array::UpdateList;

/// Width of an expression in bits.
pub type Width = u32;

/// Width of boolean-valued expressions.
pub const BOOL_WIDTH: Width = 1;

/// Widest value constant folding operates on. Wider expressions are legal
/// but stay symbolic.
const FOLD_WIDTH: Width = 128;

/// Binary operators over matching widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl BinOp {
    fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Mul | BinOp::And | BinOp::Or | BinOp::Xor
        )
    }
}

/// Comparison operators; results have width 1. The remaining LLVM predicates
/// are canonicalized onto these five by the constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ult,
    Ule,
    Slt,
    Sle,
}

/// The node variants of the expression DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// A constant bitvector. The payload is masked to the node width.
    Constant(u128),
    /// A byte read from an array through its update list.
    Read { updates: UpdateList, index: Expr },
    /// `cond ? on_true : on_false` with a width-1 condition.
    Select {
        cond: Expr,
        on_true: Expr,
        on_false: Expr,
    },
    /// Bit concatenation; `msb` occupies the high bits.
    Concat { msb: Expr, lsb: Expr },
    /// Bit slice `[bit_offset, bit_offset + width)` of `expr`.
    Extract { expr: Expr, bit_offset: Width },
    ZExt(Expr),
    SExt(Expr),
    Not(Expr),
    Binary { op: BinOp, lhs: Expr, rhs: Expr },
    Cmp { op: CmpOp, lhs: Expr, rhs: Expr },
}

struct Node {
    id: u64,
    width: Width,
    kind: ExprKind,
}

/// An immutable, interned expression. Cloning is a reference-count bump and
/// equality is node identity, which the interner makes coincide with
/// structural equality.
#[derive(Clone)]
pub struct Expr(Arc<Node>);

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

struct Interner {
    map: FxHashMap<(Width, ExprKind), Weak<Node>>,
    next_id: u64,
    purge_at: usize,
}

static INTERNER: Lazy<Mutex<Interner>> = Lazy::new(|| {
    Mutex::new(Interner {
        map: FxHashMap::default(),
        next_id: 0,
        purge_at: 1 << 16,
    })
});

fn intern(width: Width, kind: ExprKind) -> Expr {
    let mut interner = INTERNER.lock();
    let key = (width, kind);
    if let Some(node) = interner.map.get(&key).and_then(Weak::upgrade) {
        return Expr(node);
    }
    let id = interner.next_id;
    interner.next_id += 1;
    let node = Arc::new(Node {
        id,
        width,
        kind: key.1.clone(),
    });
    interner.map.insert(key, Arc::downgrade(&node));
    if interner.map.len() >= interner.purge_at {
        interner.map.retain(|_, weak| weak.strong_count() > 0);
        interner.purge_at = (interner.map.len() * 2).max(1 << 16);
    }
    Expr(node)
}

pub(crate) fn mask_for(width: Width) -> u128 {
    width_mask(width)
}

pub(crate) fn signed_for(value: u128, width: Width) -> i128 {
    as_signed(value, width)
}

pub(crate) fn fold_binary_for_eval(op: BinOp, l: u128, r: u128, width: Width) -> Option<u128> {
    fold_binary(op, l, r, width)
}

pub(crate) fn as_width(value: u128, from: Width, to: Width, signed: bool) -> u128 {
    let narrowed = value & width_mask(from);
    let widened = if signed {
        as_signed(narrowed, from) as u128
    } else {
        narrowed
    };
    widened & width_mask(to)
}

fn width_mask(width: Width) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

fn as_signed(value: u128, width: Width) -> i128 {
    if width >= 128 {
        value as i128
    } else if value >> (width - 1) & 1 == 1 {
        (value | !width_mask(width)) as i128
    } else {
        value as i128
    }
}

impl Expr {
    pub fn width(&self) -> Width {
        self.0.width
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.0.kind, ExprKind::Constant(_))
    }

    /// The constant payload, masked to the node width.
    pub fn as_constant(&self) -> Option<u128> {
        match self.0.kind {
            ExprKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.0.width == BOOL_WIDTH && self.as_constant() == Some(1)
    }

    pub fn is_false(&self) -> bool {
        self.0.width == BOOL_WIDTH && self.as_constant() == Some(0)
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant() == Some(0)
    }

    // -- constructors ------------------------------------------------------

    pub fn constant(value: u128, width: Width) -> Expr {
        assert!(width > 0 && width <= FOLD_WIDTH, "bad constant width {width}");
        intern(width, ExprKind::Constant(value & width_mask(width)))
    }

    pub fn bool_true() -> Expr {
        Expr::constant(1, BOOL_WIDTH)
    }

    pub fn bool_false() -> Expr {
        Expr::constant(0, BOOL_WIDTH)
    }

    pub fn from_bool(b: bool) -> Expr {
        if b {
            Expr::bool_true()
        } else {
            Expr::bool_false()
        }
    }

    /// Read one byte of an array at `index`, looking through the update
    /// list as far as constant indices permit.
    pub fn read(updates: UpdateList, index: Expr) -> Expr {
        if let Some(concrete_index) = index.as_constant() {
            enum Hit {
                Value(Expr),
                BaseArray,
                // A write at a symbolic index may or may not shadow the
                // read; stop looking through.
                Opaque,
            }
            let mut node = updates.head();
            let hit = loop {
                match node {
                    None => break Hit::BaseArray,
                    Some(update) => match update.index().as_constant() {
                        Some(i) if i == concrete_index => {
                            break Hit::Value(update.value().clone())
                        }
                        Some(_) => node = update.next(),
                        None => break Hit::Opaque,
                    },
                }
            };
            match hit {
                Hit::Value(v) => return v,
                Hit::BaseArray => {
                    if let Some(byte) = updates.array().constant_value(concrete_index as u64) {
                        return Expr::constant(byte as u128, 8);
                    }
                }
                Hit::Opaque => {}
            }
        }
        intern(8, ExprKind::Read { updates, index })
    }

    pub fn select(cond: Expr, on_true: Expr, on_false: Expr) -> Expr {
        debug_assert_eq!(cond.width(), BOOL_WIDTH);
        debug_assert_eq!(on_true.width(), on_false.width());
        if cond.is_true() {
            return on_true;
        }
        if cond.is_false() {
            return on_false;
        }
        if on_true == on_false {
            return on_true;
        }
        let width = on_true.width();
        intern(
            width,
            ExprKind::Select {
                cond,
                on_true,
                on_false,
            },
        )
    }

    pub fn concat(msb: Expr, lsb: Expr) -> Expr {
        let width = msb.width() + lsb.width();
        if width <= FOLD_WIDTH {
            if let (Some(hi), Some(lo)) = (msb.as_constant(), lsb.as_constant()) {
                return Expr::constant(hi << lsb.width() | lo, width);
            }
        }
        // concat(extract(e, o+k, m), extract(e, o, k)) => extract(e, o, m+k)
        if let (
            ExprKind::Extract {
                expr: hi_e,
                bit_offset: hi_off,
            },
            ExprKind::Extract {
                expr: lo_e,
                bit_offset: lo_off,
            },
        ) = (msb.kind(), lsb.kind())
        {
            if hi_e == lo_e && *hi_off == lo_off + lsb.width() {
                return Expr::extract(hi_e.clone(), *lo_off, width);
            }
        }
        intern(width, ExprKind::Concat { msb, lsb })
    }

    pub fn extract(expr: Expr, bit_offset: Width, width: Width) -> Expr {
        assert!(
            bit_offset + width <= expr.width(),
            "extract [{bit_offset}, {bit_offset}+{width}) exceeds width {}",
            expr.width()
        );
        if bit_offset == 0 && width == expr.width() {
            return expr;
        }
        if let Some(v) = expr.as_constant() {
            return Expr::constant(v >> bit_offset, width);
        }
        match expr.kind() {
            ExprKind::Concat { msb, lsb } => {
                if bit_offset + width <= lsb.width() {
                    return Expr::extract(lsb.clone(), bit_offset, width);
                }
                if bit_offset >= lsb.width() {
                    return Expr::extract(msb.clone(), bit_offset - lsb.width(), width);
                }
            }
            ExprKind::Extract {
                expr: inner,
                bit_offset: inner_offset,
            } => {
                return Expr::extract(inner.clone(), inner_offset + bit_offset, width);
            }
            _ => {}
        }
        intern(width, ExprKind::Extract { expr, bit_offset })
    }

    /// Zero extend (or truncate, when `width` is smaller) to `width`.
    pub fn zext(expr: Expr, width: Width) -> Expr {
        if width == expr.width() {
            return expr;
        }
        if width < expr.width() {
            return Expr::extract(expr, 0, width);
        }
        if let Some(v) = expr.as_constant() {
            if width <= FOLD_WIDTH {
                return Expr::constant(v, width);
            }
        }
        intern(width, ExprKind::ZExt(expr))
    }

    /// Sign extend (or truncate, when `width` is smaller) to `width`.
    pub fn sext(expr: Expr, width: Width) -> Expr {
        if width == expr.width() {
            return expr;
        }
        if width < expr.width() {
            return Expr::extract(expr, 0, width);
        }
        if let Some(v) = expr.as_constant() {
            if width <= FOLD_WIDTH {
                return Expr::constant(as_signed(v, expr.width()) as u128, width);
            }
        }
        intern(width, ExprKind::SExt(expr))
    }

    pub fn not(expr: Expr) -> Expr {
        let width = expr.width();
        if let Some(v) = expr.as_constant() {
            return Expr::constant(!v, width);
        }
        if let ExprKind::Not(inner) = expr.kind() {
            return inner.clone();
        }
        intern(width, ExprKind::Not(expr))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        debug_assert_eq!(lhs.width(), rhs.width(), "width mismatch in {op:?}");
        let width = lhs.width();
        if let (Some(l), Some(r)) = (lhs.as_constant(), rhs.as_constant()) {
            if let Some(folded) = fold_binary(op, l, r, width) {
                return Expr::constant(folded, width);
            }
        }
        if let Some(simplified) = simplify_binary(op, &lhs, &rhs) {
            return simplified;
        }
        // Keep a constant operand on the left of commutative operators so
        // structurally equal expressions intern to one node.
        let (lhs, rhs) = if op.is_commutative() && rhs.is_constant() && !lhs.is_constant() {
            (rhs, lhs)
        } else {
            (lhs, rhs)
        };
        intern(width, ExprKind::Binary { op, lhs, rhs })
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Expr {
        debug_assert_eq!(lhs.width(), rhs.width(), "width mismatch in {op:?}");
        let width = lhs.width();
        if let (Some(l), Some(r)) = (lhs.as_constant(), rhs.as_constant()) {
            let result = match op {
                CmpOp::Eq => l == r,
                CmpOp::Ult => l < r,
                CmpOp::Ule => l <= r,
                CmpOp::Slt => as_signed(l, width) < as_signed(r, width),
                CmpOp::Sle => as_signed(l, width) <= as_signed(r, width),
            };
            return Expr::from_bool(result);
        }
        if lhs == rhs {
            let result = matches!(op, CmpOp::Eq | CmpOp::Ule | CmpOp::Sle);
            return Expr::from_bool(result);
        }
        let (lhs, rhs) = if op == CmpOp::Eq && rhs.is_constant() && !lhs.is_constant() {
            (rhs, lhs)
        } else {
            (lhs, rhs)
        };
        intern(BOOL_WIDTH, ExprKind::Cmp { op, lhs, rhs })
    }

    // -- derived operators -------------------------------------------------

    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Mul, lhs, rhs)
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Or, lhs, rhs)
    }

    pub fn xor(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(BinOp::Xor, lhs, rhs)
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Eq, lhs, rhs)
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Expr {
        Expr::logical_not(Expr::eq(lhs, rhs))
    }

    pub fn ult(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Ult, lhs, rhs)
    }

    pub fn ule(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Ule, lhs, rhs)
    }

    pub fn ugt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Ult, rhs, lhs)
    }

    pub fn uge(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Ule, rhs, lhs)
    }

    pub fn slt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Slt, lhs, rhs)
    }

    pub fn sle(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Sle, lhs, rhs)
    }

    pub fn sgt(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Slt, rhs, lhs)
    }

    pub fn sge(lhs: Expr, rhs: Expr) -> Expr {
        Expr::cmp(CmpOp::Sle, rhs, lhs)
    }

    /// `e == 0` at `e`'s width; the canonical boolean negation used for the
    /// false side of branches.
    pub fn is_zero_expr(expr: Expr) -> Expr {
        let width = expr.width();
        Expr::eq(Expr::constant(0, width), expr)
    }

    /// Boolean negation of a width-1 expression.
    pub fn logical_not(expr: Expr) -> Expr {
        debug_assert_eq!(expr.width(), BOOL_WIDTH);
        Expr::is_zero_expr(expr)
    }

    /// Short-circuit-free boolean conjunction of width-1 expressions.
    pub fn and_bool(lhs: Expr, rhs: Expr) -> Expr {
        debug_assert_eq!(lhs.width(), BOOL_WIDTH);
        Expr::binary(BinOp::And, lhs, rhs)
    }

    pub fn or_bool(lhs: Expr, rhs: Expr) -> Expr {
        debug_assert_eq!(lhs.width(), BOOL_WIDTH);
        Expr::binary(BinOp::Or, lhs, rhs)
    }

    /// Visit this expression and all sub-expressions, pre-order.
    pub fn visit(&self, visitor: &mut impl FnMut(&Expr)) {
        visitor(self);
        match self.kind() {
            ExprKind::Constant(_) => {}
            ExprKind::Read { updates, index } => {
                index.visit(visitor);
                for (i, v) in updates.iter() {
                    i.visit(visitor);
                    v.visit(visitor);
                }
            }
            ExprKind::Select {
                cond,
                on_true,
                on_false,
            } => {
                cond.visit(visitor);
                on_true.visit(visitor);
                on_false.visit(visitor);
            }
            ExprKind::Concat { msb, lsb } => {
                msb.visit(visitor);
                lsb.visit(visitor);
            }
            ExprKind::Extract { expr, .. }
            | ExprKind::ZExt(expr)
            | ExprKind::SExt(expr)
            | ExprKind::Not(expr) => expr.visit(visitor),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Cmp { lhs, rhs, .. } => {
                lhs.visit(visitor);
                rhs.visit(visitor);
            }
        }
    }
}

fn fold_binary(op: BinOp, l: u128, r: u128, width: Width) -> Option<u128> {
    let mask = width_mask(width);
    let value = match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        // Division by a zero constant stays symbolic; the interpreter
        // reports it through its own error path.
        BinOp::UDiv => l.checked_div(r)?,
        BinOp::URem => l.checked_rem(r)?,
        BinOp::SDiv => {
            let (l, r) = (as_signed(l, width), as_signed(r, width));
            l.checked_div(r)? as u128
        }
        BinOp::SRem => {
            let (l, r) = (as_signed(l, width), as_signed(r, width));
            l.checked_rem(r)? as u128
        }
        BinOp::And => l & r,
        BinOp::Or => l | r,
        BinOp::Xor => l ^ r,
        BinOp::Shl => {
            if r >= width as u128 {
                0
            } else {
                l << r
            }
        }
        BinOp::LShr => {
            if r >= width as u128 {
                0
            } else {
                l >> r
            }
        }
        BinOp::AShr => {
            if r >= width as u128 {
                if as_signed(l, width) < 0 {
                    mask
                } else {
                    0
                }
            } else {
                (as_signed(l, width) >> r) as u128
            }
        }
    };
    Some(value & mask)
}

fn simplify_binary(op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    let width = lhs.width();
    let mask = width_mask(width);
    match op {
        BinOp::Add | BinOp::Or | BinOp::Xor => {
            if rhs.is_zero() {
                return Some(lhs.clone());
            }
            if lhs.is_zero() {
                return Some(rhs.clone());
            }
        }
        BinOp::Sub | BinOp::Shl | BinOp::LShr | BinOp::AShr => {
            if rhs.is_zero() {
                return Some(lhs.clone());
            }
        }
        BinOp::Mul => {
            if lhs.is_zero() || rhs.as_constant() == Some(1) {
                return Some(lhs.clone());
            }
            if rhs.is_zero() || lhs.as_constant() == Some(1) {
                return Some(rhs.clone());
            }
        }
        BinOp::And => {
            if lhs.is_zero() || rhs.as_constant() == Some(mask) {
                return Some(lhs.clone());
            }
            if rhs.is_zero() || lhs.as_constant() == Some(mask) {
                return Some(rhs.clone());
            }
        }
        BinOp::UDiv => {
            if rhs.as_constant() == Some(1) {
                return Some(lhs.clone());
            }
        }
        BinOp::SDiv | BinOp::URem | BinOp::SRem => {}
    }
    None
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            ExprKind::Constant(v) => write!(f, "{v}:w{}", self.width()),
            ExprKind::Read { updates, index } => {
                write!(f, "(read {:?} {:?})", updates, index)
            }
            ExprKind::Select {
                cond,
                on_true,
                on_false,
            } => write!(f, "(select {cond:?} {on_true:?} {on_false:?})"),
            ExprKind::Concat { msb, lsb } => write!(f, "(concat {msb:?} {lsb:?})"),
            ExprKind::Extract { expr, bit_offset } => {
                write!(f, "(extract {expr:?} {bit_offset} w{})", self.width())
            }
            ExprKind::ZExt(e) => write!(f, "(zext {e:?} w{})", self.width()),
            ExprKind::SExt(e) => write!(f, "(sext {e:?} w{})", self.width()),
            ExprKind::Not(e) => write!(f, "(not {e:?})"),
            ExprKind::Binary { op, lhs, rhs } => {
                write!(f, "({} {lhs:?} {rhs:?})", format!("{op:?}").to_lowercase())
            }
            ExprKind::Cmp { op, lhs, rhs } => {
                write!(f, "({} {lhs:?} {rhs:?})", format!("{op:?}").to_lowercase())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Array, UpdateList};

    fn symbolic_u8(name: &str) -> Expr {
        let array = Array::new_symbolic(name, 1);
        Expr::read(UpdateList::new(array), Expr::constant(0, 32))
    }

    #[test]
    fn interning_makes_equal_structures_identical() {
        let x = symbolic_u8("x");
        let a = Expr::add(x.clone(), Expr::constant(1, 8));
        let b = Expr::add(x, Expr::constant(1, 8));
        assert_eq!(a, b);
    }

    #[test]
    fn constant_folding() {
        let a = Expr::add(Expr::constant(250, 8), Expr::constant(10, 8));
        assert_eq!(a.as_constant(), Some(4));

        let s = Expr::binary(BinOp::AShr, Expr::constant(0x80, 8), Expr::constant(1, 8));
        assert_eq!(s.as_constant(), Some(0xc0));

        let d = Expr::binary(BinOp::SDiv, Expr::constant(0xf8, 8), Expr::constant(2, 8));
        assert_eq!(d.as_constant(), Some(0xfc));
    }

    #[test]
    fn equality_of_identical_operands_folds_true() {
        let x = symbolic_u8("x");
        assert!(Expr::eq(x.clone(), x).is_true());
    }

    #[test]
    fn comparisons_have_bool_width() {
        let x = symbolic_u8("x");
        let c = Expr::ult(x, Expr::constant(3, 8));
        assert_eq!(c.width(), BOOL_WIDTH);
    }

    #[test]
    fn concat_extract_round_trip() {
        let array = Array::new_symbolic("buf", 4);
        let updates = UpdateList::new(array);
        let b0 = Expr::read(updates.clone(), Expr::constant(0, 32));
        let b1 = Expr::read(updates, Expr::constant(1, 32));
        let word = Expr::concat(b1.clone(), b0.clone());
        assert_eq!(Expr::extract(word.clone(), 0, 8), b0);
        assert_eq!(Expr::extract(word, 8, 8), b1);
    }

    #[test]
    fn extract_of_concat_refuses_to_widen() {
        let v = Expr::constant(0xbeef, 16);
        assert_eq!(Expr::extract(v, 8, 8).as_constant(), Some(0xbe));
    }

    #[test]
    fn concat_of_adjacent_extracts_fuses() {
        let x = Expr::concat(symbolic_u8("hi"), symbolic_u8("lo"));
        let lo = Expr::extract(x.clone(), 0, 8);
        let hi = Expr::extract(x.clone(), 8, 8);
        assert_eq!(Expr::concat(hi, lo), x);
    }

    #[test]
    fn zext_and_sext_fold_constants() {
        let v = Expr::constant(0x80, 8);
        assert_eq!(Expr::zext(v.clone(), 16).as_constant(), Some(0x80));
        assert_eq!(Expr::sext(v, 16).as_constant(), Some(0xff80));
    }

    #[test]
    fn read_looks_through_constant_updates() {
        let array = Array::new_symbolic("mem", 8);
        let mut updates = UpdateList::new(array);
        updates.extend(Expr::constant(3, 32), Expr::constant(0x5a, 8));
        let hit = Expr::read(updates.clone(), Expr::constant(3, 32));
        assert_eq!(hit.as_constant(), Some(0x5a));
        let miss = Expr::read(updates, Expr::constant(2, 32));
        assert!(!miss.is_constant());
    }

    #[test]
    fn read_stops_at_symbolic_update_index() {
        let array = Array::new_symbolic("mem", 8);
        let mut updates = UpdateList::new(array);
        let sym_index = Expr::zext(symbolic_u8("i"), 32);
        updates.extend(sym_index, Expr::constant(0x11, 8));
        let read = Expr::read(updates, Expr::constant(0, 32));
        assert!(!read.is_constant());
    }

    #[test]
    fn division_by_zero_constant_stays_symbolic() {
        let d = Expr::binary(BinOp::UDiv, Expr::constant(4, 8), Expr::constant(0, 8));
        assert!(!d.is_constant());
    }
}
