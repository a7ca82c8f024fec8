use crate::expr::{BinOp, CmpOp, Expr, Width};

/// Pointer width of the execution context, in bits. The byte order of all
/// multi-byte values is little-endian by contract.
pub const POINTER_WIDTH: Width = 64;

/// Segment reserved for function pointers; the offset selects the function.
pub const FUNCTIONS_SEGMENT: u64 = 1;

/// Segment reserved for the errno object.
pub const ERRNO_SEGMENT: u64 = 2;

/// First segment handed out to ordinary allocations.
pub const FIRST_ORDINARY_SEGMENT: u64 = 3;

/// A value manipulated by the interpreter: a pair of expressions
/// `(segment, offset)`. Pointers carry the segment of their allocation;
/// plain integers carry the constant segment 0. The segment expression
/// always has pointer width, the offset carries the value's own width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KValue {
    segment: Expr,
    offset: Expr,
}

impl KValue {
    pub fn new(segment: Expr, offset: Expr) -> Self {
        debug_assert_eq!(segment.width(), POINTER_WIDTH);
        KValue { segment, offset }
    }

    /// A plain integer value with segment 0.
    pub fn from_expr(offset: Expr) -> Self {
        KValue {
            segment: Expr::constant(0, POINTER_WIDTH),
            offset,
        }
    }

    pub fn from_constant(value: u128, width: Width) -> Self {
        KValue::from_expr(Expr::constant(value, width))
    }

    /// A pointer into `segment` at byte `offset`.
    pub fn pointer(segment: u64, offset: u64) -> Self {
        KValue {
            segment: Expr::constant(segment as u128, POINTER_WIDTH),
            offset: Expr::constant(offset as u128, POINTER_WIDTH),
        }
    }

    pub fn null_pointer() -> Self {
        KValue::pointer(0, 0)
    }

    pub fn segment(&self) -> &Expr {
        &self.segment
    }

    pub fn offset(&self) -> &Expr {
        &self.offset
    }

    pub fn width(&self) -> Width {
        self.offset.width()
    }

    pub fn is_constant(&self) -> bool {
        self.segment.is_constant() && self.offset.is_constant()
    }

    /// The segment when it is a known constant.
    pub fn constant_segment(&self) -> Option<u64> {
        self.segment.as_constant().map(|v| v as u64)
    }

    pub fn has_zero_segment(&self) -> bool {
        self.segment.is_zero()
    }

    /// `self == 0` on both planes, the null-pointer test.
    pub fn create_is_zero(&self) -> Expr {
        Expr::and_bool(
            Expr::is_zero_expr(self.segment.clone()),
            Expr::is_zero_expr(self.offset.clone()),
        )
    }

    // -- arithmetic with segment policies ----------------------------------

    /// Addition preserves the segment of the pointer-tagged operand
    /// (pointer offset arithmetic); two plain integers stay plain.
    pub fn add(&self, rhs: &KValue) -> KValue {
        KValue {
            segment: if self.segment.is_zero() {
                rhs.segment.clone()
            } else {
                self.segment.clone()
            },
            offset: Expr::add(self.offset.clone(), rhs.offset.clone()),
        }
    }

    /// Subtraction keeps the base pointer's segment; subtracting two
    /// pointers of the same segment is a plain integer difference.
    pub fn sub(&self, rhs: &KValue) -> KValue {
        let segment = if rhs.segment.is_zero() {
            self.segment.clone()
        } else if self.segment == rhs.segment {
            Expr::constant(0, POINTER_WIDTH)
        } else {
            self.segment.clone()
        };
        KValue {
            segment,
            offset: Expr::sub(self.offset.clone(), rhs.offset.clone()),
        }
    }

    /// Bitwise AND preserves the left operand's segment: masking a pointer
    /// for alignment must not lose its object identity.
    pub fn and(&self, rhs: &KValue) -> KValue {
        KValue {
            segment: self.segment.clone(),
            offset: Expr::and(self.offset.clone(), rhs.offset.clone()),
        }
    }

    pub fn binary(&self, op: BinOp, rhs: &KValue) -> KValue {
        match op {
            BinOp::Add => self.add(rhs),
            BinOp::Sub => self.sub(rhs),
            BinOp::And => self.and(rhs),
            _ => KValue::from_expr(Expr::binary(op, self.offset.clone(), rhs.offset.clone())),
        }
    }

    // -- comparisons (width-1 results, segment 0) --------------------------

    /// Pointer equality: both planes must agree. The interpreter substitutes
    /// symbolic address placeholders before calling this when two distinct
    /// non-zero segments are compared.
    pub fn eq(&self, rhs: &KValue) -> KValue {
        KValue::from_expr(Expr::and_bool(
            Expr::eq(self.segment.clone(), rhs.segment.clone()),
            Expr::eq(self.offset.clone(), rhs.offset.clone()),
        ))
    }

    pub fn ne(&self, rhs: &KValue) -> KValue {
        KValue::from_expr(Expr::logical_not(
            self.eq(rhs).offset().clone(),
        ))
    }

    pub fn cmp(&self, op: CmpOp, rhs: &KValue) -> KValue {
        if op == CmpOp::Eq {
            return self.eq(rhs);
        }
        KValue::from_expr(Expr::cmp(op, self.offset.clone(), rhs.offset.clone()))
    }

    pub fn ult(&self, rhs: &KValue) -> KValue {
        self.cmp(CmpOp::Ult, rhs)
    }

    pub fn ule(&self, rhs: &KValue) -> KValue {
        self.cmp(CmpOp::Ule, rhs)
    }

    pub fn slt(&self, rhs: &KValue) -> KValue {
        self.cmp(CmpOp::Slt, rhs)
    }

    pub fn sle(&self, rhs: &KValue) -> KValue {
        self.cmp(CmpOp::Sle, rhs)
    }

    // -- width changes; segments survive pointer-preserving casts ----------

    pub fn zext(&self, width: Width) -> KValue {
        KValue {
            segment: self.segment.clone(),
            offset: Expr::zext(self.offset.clone(), width),
        }
    }

    pub fn sext(&self, width: Width) -> KValue {
        KValue {
            segment: self.segment.clone(),
            offset: Expr::sext(self.offset.clone(), width),
        }
    }

    pub fn extract(&self, bit_offset: Width, width: Width) -> KValue {
        KValue {
            segment: self.segment.clone(),
            offset: Expr::extract(self.offset.clone(), bit_offset, width),
        }
    }

    /// Concatenation of value planes; the segment follows the operand that
    /// has one (low part wins when both are tagged).
    pub fn concat(&self, lsb: &KValue) -> KValue {
        KValue {
            segment: if lsb.segment.is_zero() {
                self.segment.clone()
            } else {
                lsb.segment.clone()
            },
            offset: Expr::concat(self.offset.clone(), lsb.offset.clone()),
        }
    }

    pub fn select(cond: Expr, on_true: &KValue, on_false: &KValue) -> KValue {
        KValue {
            segment: Expr::select(
                cond.clone(),
                on_true.segment.clone(),
                on_false.segment.clone(),
            ),
            offset: Expr::select(cond, on_true.offset.clone(), on_false.offset.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Array, UpdateList};

    fn symbolic(width: Width, name: &str) -> Expr {
        let array = Array::new_symbolic(name, (width / 8) as u64);
        let updates = UpdateList::new(array);
        let mut bytes: Option<Expr> = None;
        for i in 0..width / 8 {
            let b = Expr::read(updates.clone(), Expr::constant(i as u128, 32));
            bytes = Some(match bytes {
                None => b,
                Some(acc) => Expr::concat(b, acc),
            });
        }
        bytes.unwrap()
    }

    #[test]
    fn integer_arithmetic_keeps_segment_zero() {
        let a = KValue::from_constant(3, 32);
        let b = KValue::from_constant(4, 32);
        let sum = a.add(&b);
        assert!(sum.has_zero_segment());
        assert_eq!(sum.offset().as_constant(), Some(7));
    }

    #[test]
    fn pointer_offset_arithmetic_keeps_segment() {
        let p = KValue::pointer(5, 0x10);
        let n = KValue::from_constant(8, 64);
        assert_eq!(p.add(&n).constant_segment(), Some(5));
        assert_eq!(n.add(&p).constant_segment(), Some(5));
        assert_eq!(p.sub(&n).constant_segment(), Some(5));
    }

    #[test]
    fn same_segment_difference_is_integer() {
        let p = KValue::pointer(5, 0x18);
        let q = KValue::pointer(5, 0x10);
        let diff = p.sub(&q);
        assert!(diff.has_zero_segment());
        assert_eq!(diff.offset().as_constant(), Some(8));
    }

    #[test]
    fn mask_keeps_left_segment() {
        let p = KValue::pointer(7, 0x1234).zext(64);
        let mask = KValue::from_constant(!0xfff, 64);
        let aligned = p.and(&mask);
        assert_eq!(aligned.constant_segment(), Some(7));
        assert_eq!(aligned.offset().as_constant(), Some(0x1000));
    }

    #[test]
    fn multiplication_strips_segment() {
        let p = KValue::pointer(7, 8);
        let two = KValue::from_constant(2, 64);
        assert!(p.binary(BinOp::Mul, &two).has_zero_segment());
    }

    #[test]
    fn equality_needs_both_planes() {
        let p = KValue::pointer(1, 8);
        let q = KValue::pointer(2, 8);
        assert!(p.eq(&q).offset().is_false());
        assert!(p.eq(&p).offset().is_true());
    }

    #[test]
    fn symbolic_equality_stays_symbolic() {
        let x = KValue::from_expr(symbolic(32, "x"));
        let c = KValue::from_constant(7, 32);
        let cond = x.eq(&c);
        assert!(!cond.offset().is_constant());
        assert_eq!(cond.offset().width(), crate::expr::BOOL_WIDTH);
    }

    #[test]
    fn casts_preserve_segment() {
        let p = KValue::pointer(9, 0x40);
        assert_eq!(p.zext(64).constant_segment(), Some(9));
        assert_eq!(p.extract(0, 32).constant_segment(), Some(9));
        assert_eq!(p.extract(0, 32).width(), 32);
    }
}
