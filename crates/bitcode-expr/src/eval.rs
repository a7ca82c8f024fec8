use rustc_hash::FxHashMap;

use crate::array::Array;
use crate::expr::{as_width, BinOp, CmpOp, Expr, ExprKind, Width};

/// Errors from concrete evaluation.
#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    #[error("division by zero while evaluating")]
    DivisionByZero,

    #[error("expression width {0} exceeds the evaluator's limit")]
    UnsupportedWidth(Width),
}

pub type Result<T> = std::result::Result<T, EvalError>;

/// A concrete binding of arrays to byte vectors.
///
/// Arrays without a binding read as zero, which makes an assignment total:
/// the same convention the seed layer and test-case generation rely on.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    bindings: FxHashMap<Array, Vec<u8>>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, array: Array, values: Vec<u8>) {
        self.bindings.insert(array, values);
    }

    pub fn binding(&self, array: &Array) -> Option<&Vec<u8>> {
        self.bindings.get(array)
    }

    pub fn binding_mut(&mut self, array: &Array) -> Option<&mut Vec<u8>> {
        self.bindings.get_mut(array)
    }

    pub fn arrays(&self) -> impl Iterator<Item = &Array> {
        self.bindings.keys()
    }

    fn array_byte(&self, array: &Array, index: u64) -> u8 {
        if let Some(byte) = array.constant_value(index) {
            return byte;
        }
        self.bindings
            .get(array)
            .and_then(|values| values.get(index as usize).copied())
            .unwrap_or(0)
    }

    /// Evaluate `expr` to a concrete value under this assignment.
    pub fn evaluate(&self, expr: &Expr) -> Result<u128> {
        let width = expr.width();
        if width > 128 {
            return Err(EvalError::UnsupportedWidth(width));
        }
        let value = match expr.kind() {
            ExprKind::Constant(v) => *v,
            ExprKind::Read { updates, index } => {
                let index_value = self.evaluate(index)?;
                let mut result = None;
                for (update_index, update_value) in updates.iter() {
                    if self.evaluate(update_index)? == index_value {
                        result = Some(self.evaluate(update_value)?);
                        break;
                    }
                }
                match result {
                    Some(v) => v,
                    None => self.array_byte(updates.array(), index_value as u64) as u128,
                }
            }
            ExprKind::Select {
                cond,
                on_true,
                on_false,
            } => {
                if self.evaluate(cond)? == 1 {
                    self.evaluate(on_true)?
                } else {
                    self.evaluate(on_false)?
                }
            }
            ExprKind::Concat { msb, lsb } => {
                self.evaluate(msb)? << lsb.width() | self.evaluate(lsb)?
            }
            ExprKind::Extract { expr, bit_offset } => self.evaluate(expr)? >> bit_offset,
            ExprKind::ZExt(inner) => self.evaluate(inner)?,
            ExprKind::SExt(inner) => {
                as_width(self.evaluate(inner)?, inner.width(), width, true)
            }
            ExprKind::Not(inner) => !self.evaluate(inner)?,
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.evaluate(lhs)?;
                let r = self.evaluate(rhs)?;
                eval_binary(*op, l, r, lhs.width())?
            }
            ExprKind::Cmp { op, lhs, rhs } => {
                let l = self.evaluate(lhs)?;
                let r = self.evaluate(rhs)?;
                eval_cmp(*op, l, r, lhs.width()) as u128
            }
        };
        Ok(value & crate::expr::mask_for(width))
    }

    /// Evaluate a width-1 expression as a boolean.
    pub fn evaluate_bool(&self, expr: &Expr) -> Result<bool> {
        Ok(self.evaluate(expr)? == 1)
    }
}

fn eval_binary(op: BinOp, l: u128, r: u128, width: Width) -> Result<u128> {
    crate::expr::fold_binary_for_eval(op, l, r, width).ok_or(EvalError::DivisionByZero)
}

fn eval_cmp(op: CmpOp, l: u128, r: u128, width: Width) -> bool {
    let signed = |v| crate::expr::signed_for(v, width);
    match op {
        CmpOp::Eq => l == r,
        CmpOp::Ult => l < r,
        CmpOp::Ule => l <= r,
        CmpOp::Slt => signed(l) < signed(r),
        CmpOp::Sle => signed(l) <= signed(r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::UpdateList;

    fn byte(array: &Array, index: u64) -> Expr {
        Expr::read(UpdateList::new(array.clone()), Expr::constant(index as u128, 32))
    }

    #[test]
    fn evaluates_reads_under_binding() {
        let array = Array::new_symbolic("input", 2);
        let mut assignment = Assignment::new();
        assignment.bind(array.clone(), vec![0x34, 0x12]);

        let word = Expr::concat(byte(&array, 1), byte(&array, 0));
        assert_eq!(assignment.evaluate(&word).unwrap(), 0x1234);
    }

    #[test]
    fn unbound_arrays_read_zero() {
        let array = Array::new_symbolic("input", 1);
        let assignment = Assignment::new();
        assert_eq!(assignment.evaluate(&byte(&array, 0)).unwrap(), 0);
    }

    #[test]
    fn update_list_shadows_array_contents() {
        let array = Array::new_symbolic("input", 4);
        let mut assignment = Assignment::new();
        assignment.bind(array.clone(), vec![1, 2, 3, 4]);

        let mut updates = UpdateList::new(array);
        updates.extend(Expr::constant(2, 32), Expr::constant(0x7f, 8));
        let read = Expr::read(updates, Expr::constant(2, 32));
        assert_eq!(assignment.evaluate(&read).unwrap(), 0x7f);
    }

    #[test]
    fn signed_comparison_under_assignment() {
        let array = Array::new_symbolic("x", 1);
        let mut assignment = Assignment::new();
        assignment.bind(array.clone(), vec![0xff]);

        let cond = Expr::slt(byte(&array, 0), Expr::constant(0, 8));
        assert!(assignment.evaluate_bool(&cond).unwrap());
    }
}
