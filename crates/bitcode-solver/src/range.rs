use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};

use bitcode_expr::{Array, Assignment, BinOp, CmpOp, Expr, ExprKind, Width};

use crate::backend::{Error, Query, Result, SolverBackend, Validity};

fn mask(width: Width) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

fn signed(value: u128, width: Width) -> i128 {
    let width = width.min(128);
    if width >= 128 {
        value as i128
    } else if value >> (width - 1) & 1 == 1 {
        (value | !mask(width)) as i128
    } else {
        value as i128
    }
}

/// An inclusive unsigned interval `[min, max]` within a width's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueRange {
    min: u128,
    max: u128,
}

impl ValueRange {
    fn full(width: Width) -> Self {
        ValueRange {
            min: 0,
            max: mask(width),
        }
    }

    fn singleton(value: u128) -> Self {
        ValueRange {
            min: value,
            max: value,
        }
    }

    fn bool_unknown() -> Self {
        ValueRange { min: 0, max: 1 }
    }

    fn is_singleton(&self) -> bool {
        self.min == self.max
    }

    fn intersect(self, other: ValueRange) -> Option<ValueRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(ValueRange { min, max })
    }

    fn hull(self, other: ValueRange) -> ValueRange {
        ValueRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// The signed endpoints, when the interval does not straddle the
    /// signed discontinuity.
    fn as_signed(self, width: Width) -> Option<(i128, i128)> {
        if width >= 128 {
            return None;
        }
        let half = 1u128 << (width - 1);
        if self.max < half || self.min >= half {
            Some((signed(self.min, width), signed(self.max, width)))
        } else {
            None
        }
    }
}

type Env = FxHashMap<Expr, ValueRange>;

/// The built-in solver backend: sound interval analysis over the expression
/// DAG. Path constraints refine per-expression ranges to a fixpoint;
/// validity answers come from the refined range of the query expression and
/// models are constructed range-first, then checked against every
/// constraint with the concrete evaluator before being reported.
///
/// `True`/`False`/`must_be_*` answers are proofs under this domain;
/// everything the domain cannot decide is `Unknown`, so the engine may
/// explore an infeasible sibling but never loses a feasible one.
#[derive(Debug, Default)]
pub struct RangeSolver {
    timeout: Option<Duration>,
    refinement_passes: usize,
}

impl RangeSolver {
    pub fn new() -> Self {
        RangeSolver {
            timeout: None,
            refinement_passes: 3,
        }
    }

    fn range_of(&self, expr: &Expr, env: &Env) -> ValueRange {
        let width = expr.width();
        let structural = self.structural_range(expr, env);
        match env.get(expr) {
            Some(&refined) => structural.intersect(refined).unwrap_or(refined),
            None => structural.intersect(ValueRange::full(width)).unwrap_or(structural),
        }
    }

    fn structural_range(&self, expr: &Expr, env: &Env) -> ValueRange {
        let width = expr.width();
        match expr.kind() {
            ExprKind::Constant(v) => ValueRange::singleton(*v),
            ExprKind::Read { .. } => ValueRange::full(8),
            ExprKind::Select {
                cond,
                on_true,
                on_false,
            } => {
                let c = self.range_of(cond, env);
                if c == ValueRange::singleton(1) {
                    self.range_of(on_true, env)
                } else if c == ValueRange::singleton(0) {
                    self.range_of(on_false, env)
                } else {
                    self.range_of(on_true, env).hull(self.range_of(on_false, env))
                }
            }
            ExprKind::Concat { msb, lsb } => {
                if width > 128 {
                    return ValueRange::full(width);
                }
                let hi = self.range_of(msb, env);
                let lo = self.range_of(lsb, env);
                let shift = lsb.width();
                ValueRange {
                    min: hi.min << shift | lo.min,
                    max: hi.max << shift | lo.max,
                }
            }
            ExprKind::Extract {
                expr: inner,
                bit_offset,
            } => {
                let r = self.range_of(inner, env);
                if *bit_offset == 0 && r.max <= mask(width) {
                    r
                } else {
                    ValueRange::full(width)
                }
            }
            ExprKind::ZExt(inner) => self.range_of(inner, env),
            ExprKind::SExt(inner) => {
                let r = self.range_of(inner, env);
                match r.as_signed(inner.width()) {
                    Some((lo, hi)) => ValueRange {
                        min: lo as u128 & mask(width),
                        max: hi as u128 & mask(width),
                    }
                    .normalized(),
                    None => ValueRange::full(width),
                }
            }
            ExprKind::Not(inner) => {
                let r = self.range_of(inner, env);
                ValueRange {
                    min: !r.max & mask(width),
                    max: !r.min & mask(width),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let a = self.range_of(lhs, env);
                let b = self.range_of(rhs, env);
                self.binary_range(*op, a, b, width)
            }
            ExprKind::Cmp { op, lhs, rhs } => {
                let a = self.range_of(lhs, env);
                let b = self.range_of(rhs, env);
                match self.decide_cmp(*op, a, b, lhs.width()) {
                    Some(true) => ValueRange::singleton(1),
                    Some(false) => ValueRange::singleton(0),
                    None => ValueRange::bool_unknown(),
                }
            }
        }
    }

    fn binary_range(&self, op: BinOp, a: ValueRange, b: ValueRange, width: Width) -> ValueRange {
        let m = mask(width);
        let full = ValueRange::full(width);
        match op {
            BinOp::Add => match (a.max.checked_add(b.max), a.min.checked_add(b.min)) {
                (Some(max), Some(min)) if max <= m => ValueRange { min, max },
                _ => full,
            },
            BinOp::Sub => {
                if a.min >= b.max {
                    ValueRange {
                        min: a.min - b.max,
                        max: a.max - b.min,
                    }
                } else {
                    full
                }
            }
            BinOp::Mul => match (a.max.checked_mul(b.max), a.min.checked_mul(b.min)) {
                (Some(max), Some(min)) if max <= m => ValueRange { min, max },
                _ => full,
            },
            BinOp::UDiv => {
                if b.min > 0 {
                    ValueRange {
                        min: a.min / b.max,
                        max: a.max / b.min,
                    }
                } else {
                    full
                }
            }
            BinOp::URem => {
                if b.min > 0 {
                    ValueRange {
                        min: 0,
                        max: a.max.min(b.max - 1),
                    }
                } else {
                    full
                }
            }
            BinOp::And if width == 1 => ValueRange {
                min: a.min & b.min,
                max: a.max & b.max,
            },
            BinOp::Or if width == 1 => ValueRange {
                min: a.min | b.min,
                max: a.max | b.max,
            },
            BinOp::And => ValueRange {
                min: 0,
                max: a.max.min(b.max),
            },
            BinOp::Or | BinOp::Xor => {
                let bits = 128 - (a.max | b.max).leading_zeros();
                let upper = if bits >= 128 { u128::MAX } else { (1u128 << bits) - 1 };
                ValueRange {
                    min: if op == BinOp::Or { a.min.max(b.min) } else { 0 },
                    max: upper.min(m),
                }
            }
            BinOp::Shl => match b.is_singleton().then_some(b.min) {
                Some(shift) if shift < width as u128 => {
                    match a.max.checked_shl(shift as u32) {
                        Some(max) if max <= m => ValueRange {
                            min: a.min << shift,
                            max,
                        },
                        _ => full,
                    }
                }
                _ => full,
            },
            BinOp::LShr => match b.is_singleton().then_some(b.min) {
                Some(shift) if shift < 128 => ValueRange {
                    min: a.min >> shift,
                    max: a.max >> shift,
                },
                _ => full,
            },
            BinOp::SDiv | BinOp::SRem | BinOp::AShr => full,
        }
    }

    fn decide_cmp(&self, op: CmpOp, a: ValueRange, b: ValueRange, width: Width) -> Option<bool> {
        match op {
            CmpOp::Eq => {
                if a.max < b.min || b.max < a.min {
                    Some(false)
                } else if a.is_singleton() && b.is_singleton() && a.min == b.min {
                    Some(true)
                } else {
                    None
                }
            }
            CmpOp::Ult => {
                if a.max < b.min {
                    Some(true)
                } else if a.min >= b.max {
                    Some(false)
                } else {
                    None
                }
            }
            CmpOp::Ule => {
                if a.max <= b.min {
                    Some(true)
                } else if a.min > b.max {
                    Some(false)
                } else {
                    None
                }
            }
            CmpOp::Slt => {
                let (a_lo, a_hi) = a.as_signed(width)?;
                let (b_lo, b_hi) = b.as_signed(width)?;
                if a_hi < b_lo {
                    Some(true)
                } else if a_lo >= b_hi {
                    Some(false)
                } else {
                    None
                }
            }
            CmpOp::Sle => {
                let (a_lo, a_hi) = a.as_signed(width)?;
                let (b_lo, b_hi) = b.as_signed(width)?;
                if a_hi <= b_lo {
                    Some(true)
                } else if a_lo > b_hi {
                    Some(false)
                } else {
                    None
                }
            }
        }
    }

    // -- constraint refinement --------------------------------------------

    fn refine(&self, constraints: &[Expr]) -> Option<Env> {
        let mut env = Env::default();
        for _ in 0..self.refinement_passes {
            let mut changed = false;
            for constraint in constraints {
                if !self.refine_constraint(constraint, true, &mut env, &mut changed) {
                    return None;
                }
            }
            if !changed {
                break;
            }
        }
        Some(env)
    }

    /// Narrow `env` so `constraint == truth` holds; `false` means the
    /// constraint set is unsatisfiable in this domain.
    fn refine_constraint(
        &self,
        constraint: &Expr,
        truth: bool,
        env: &mut Env,
        changed: &mut bool,
    ) -> bool {
        match constraint.kind() {
            ExprKind::Constant(v) => (*v == 1) == truth,
            ExprKind::Cmp {
                op: CmpOp::Eq,
                lhs,
                rhs,
            } if lhs.is_zero() && rhs.width() == 1 => {
                // The canonical boolean negation `0 == e`.
                self.refine_constraint(rhs, !truth, env, changed)
            }
            ExprKind::Cmp { op, lhs, rhs } => self.refine_cmp(*op, lhs, rhs, truth, env, changed),
            ExprKind::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } if constraint.width() == 1 && truth => {
                self.refine_constraint(lhs, true, env, changed)
                    && self.refine_constraint(rhs, true, env, changed)
            }
            ExprKind::Binary {
                op: BinOp::Or,
                lhs,
                rhs,
            } if constraint.width() == 1 && !truth => {
                self.refine_constraint(lhs, false, env, changed)
                    && self.refine_constraint(rhs, false, env, changed)
            }
            ExprKind::Not(inner) if constraint.width() == 1 => {
                self.refine_constraint(inner, !truth, env, changed)
            }
            _ => true,
        }
    }

    fn refine_cmp(
        &self,
        op: CmpOp,
        lhs: &Expr,
        rhs: &Expr,
        truth: bool,
        env: &mut Env,
        changed: &mut bool,
    ) -> bool {
        // Negated comparisons flip into positive forms with the operands
        // swapped: !(a < b) is b <= a.
        if !truth {
            return match op {
                CmpOp::Eq => self.refine_disequality(lhs, rhs, env, changed),
                CmpOp::Ult => self.refine_cmp(CmpOp::Ule, rhs, lhs, true, env, changed),
                CmpOp::Ule => self.refine_cmp(CmpOp::Ult, rhs, lhs, true, env, changed),
                CmpOp::Slt => self.refine_cmp(CmpOp::Sle, rhs, lhs, true, env, changed),
                CmpOp::Sle => self.refine_cmp(CmpOp::Slt, rhs, lhs, true, env, changed),
            };
        }
        let width = lhs.width();
        match (lhs.as_constant(), rhs.as_constant()) {
            (Some(_), Some(_)) => true,
            (Some(c), None) => match op {
                CmpOp::Eq => self.narrow(rhs, ValueRange::singleton(c), env, changed),
                // c < e, c <= e
                CmpOp::Ult => {
                    c < mask(width)
                        && self.narrow(
                            rhs,
                            ValueRange {
                                min: c + 1,
                                max: mask(width),
                            },
                            env,
                            changed,
                        )
                }
                CmpOp::Ule => self.narrow(
                    rhs,
                    ValueRange {
                        min: c,
                        max: mask(width),
                    },
                    env,
                    changed,
                ),
                CmpOp::Slt => {
                    self.narrow_signed_lower(rhs, signed(c, width).saturating_add(1), env, changed)
                }
                CmpOp::Sle => self.narrow_signed_lower(rhs, signed(c, width), env, changed),
            },
            (None, Some(c)) => match op {
                CmpOp::Eq => self.narrow(lhs, ValueRange::singleton(c), env, changed),
                // e < c, e <= c
                CmpOp::Ult => {
                    c > 0 && self.narrow(lhs, ValueRange { min: 0, max: c - 1 }, env, changed)
                }
                CmpOp::Ule => self.narrow(lhs, ValueRange { min: 0, max: c }, env, changed),
                CmpOp::Slt => {
                    self.narrow_signed_upper(lhs, signed(c, width).saturating_sub(1), env, changed)
                }
                CmpOp::Sle => self.narrow_signed_upper(lhs, signed(c, width), env, changed),
            },
            (None, None) => true,
        }
    }

    /// Narrow `expr` with `expr >=s bound`. Signed bounds refine only when
    /// the admitted region maps onto a single unsigned interval.
    fn narrow_signed_lower(
        &self,
        expr: &Expr,
        bound: i128,
        env: &mut Env,
        changed: &mut bool,
    ) -> bool {
        let width = expr.width();
        if width >= 128 {
            return true;
        }
        let half = 1u128 << (width - 1);
        if bound > half as i128 - 1 {
            return false;
        }
        if bound < 0 {
            // admits both sign regions, which do not form one interval
            return true;
        }
        self.narrow(
            expr,
            ValueRange {
                min: bound as u128,
                max: half - 1,
            },
            env,
            changed,
        )
    }

    /// Narrow `expr` with `expr <=s bound`.
    fn narrow_signed_upper(
        &self,
        expr: &Expr,
        bound: i128,
        env: &mut Env,
        changed: &mut bool,
    ) -> bool {
        let width = expr.width();
        if width >= 128 {
            return true;
        }
        let half = 1u128 << (width - 1);
        if bound < -(half as i128) {
            return false;
        }
        if bound >= 0 {
            return true;
        }
        self.narrow(
            expr,
            ValueRange {
                min: half,
                max: (bound + (1i128 << width)) as u128 & mask(width),
            },
            env,
            changed,
        )
    }

    fn narrow(&self, expr: &Expr, range: ValueRange, env: &mut Env, changed: &mut bool) -> bool {
        let current = self
            .range_of(expr, env)
            .intersect(ValueRange::full(expr.width()))
            .unwrap_or(ValueRange::full(expr.width()));
        match current.intersect(range) {
            Some(narrowed) => {
                if env.get(expr) != Some(&narrowed) {
                    env.insert(expr.clone(), narrowed);
                    *changed = true;
                }
                true
            }
            None => false,
        }
    }

    fn refine_disequality(
        &self,
        lhs: &Expr,
        rhs: &Expr,
        env: &mut Env,
        changed: &mut bool,
    ) -> bool {
        let (expr, c) = match (lhs.as_constant(), rhs.as_constant()) {
            (Some(c), None) => (rhs, c),
            (None, Some(c)) => (lhs, c),
            (Some(a), Some(b)) => return a != b,
            _ => return true,
        };
        let current = self.range_of(expr, env);
        if current.is_singleton() && current.min == c {
            return false;
        }
        // Shave the excluded value only when it sits on an end.
        let narrowed = if current.min == c {
            ValueRange {
                min: c + 1,
                max: current.max,
            }
        } else if current.max == c {
            ValueRange {
                min: current.min,
                max: c - 1,
            }
        } else {
            return true;
        };
        self.narrow(expr, narrowed, env, changed)
    }

    // -- model construction ------------------------------------------------

    /// The little-endian contiguous byte span of one symbolic array that
    /// `expr` denotes, when it has that shape.
    fn decompose_le(expr: &Expr) -> Option<(Array, u64, usize)> {
        match expr.kind() {
            ExprKind::Read { updates, index } if updates.is_empty() => {
                let index = index.as_constant()?;
                updates
                    .array()
                    .is_symbolic()
                    .then(|| (updates.array().clone(), index as u64, 1))
            }
            ExprKind::Concat { msb, lsb } => {
                let (array_lo, start_lo, n_lo) = Self::decompose_le(lsb)?;
                let (array_hi, start_hi, n_hi) = Self::decompose_le(msb)?;
                (array_lo == array_hi && start_hi == start_lo + n_lo as u64)
                    .then_some((array_lo, start_lo, n_lo + n_hi))
            }
            ExprKind::ZExt(inner) | ExprKind::SExt(inner) => Self::decompose_le(inner),
            _ => None,
        }
    }

    fn collect_arrays(exprs: &[Expr]) -> Vec<Array> {
        let mut seen = FxHashSet::default();
        let mut arrays = Vec::new();
        for expr in exprs {
            expr.visit(&mut |e| {
                if let ExprKind::Read { updates, .. } = e.kind() {
                    let array = updates.array();
                    if array.is_symbolic() && seen.insert(array.id()) {
                        arrays.push(array.clone());
                    }
                }
            });
        }
        arrays
    }

    fn build_model(&self, constraints: &[Expr]) -> Option<Assignment> {
        let env = self.refine(constraints)?;
        let arrays = Self::collect_arrays(constraints);

        let mut entries: Vec<(&Expr, &ValueRange)> = env.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for pick_max in [false, true] {
            let mut assignment = Assignment::new();
            for array in &arrays {
                assignment.bind(array.clone(), vec![0; array.size() as usize]);
            }
            for (expr, range) in &entries {
                let Some((array, start, len)) = Self::decompose_le(expr) else {
                    continue;
                };
                if len > 16 {
                    continue;
                }
                let value = if pick_max { range.max } else { range.min };
                if len < 16 && value > mask(len as Width * 8) {
                    continue;
                }
                let bytes = value.to_le_bytes();
                if let Some(binding) = assignment.binding_mut(&array) {
                    for i in 0..len {
                        if let Some(slot) = binding.get_mut(start as usize + i) {
                            *slot = bytes[i];
                        }
                    }
                }
            }
            let satisfied = constraints
                .iter()
                .all(|c| assignment.evaluate_bool(c).unwrap_or(false));
            if satisfied {
                return Some(assignment);
            }
        }
        self.enumerate_model(constraints, &arrays)
    }

    /// Last resort for shapes range refinement cannot invert (selects,
    /// remainders): bounded exhaustive search over the symbolic bytes.
    /// Only runs when the space is small enough to sweep outright.
    fn enumerate_model(&self, constraints: &[Expr], arrays: &[Array]) -> Option<Assignment> {
        const MAX_SWEEP_BYTES: u64 = 2;
        let total_bytes: u64 = arrays.iter().map(Array::size).sum();
        if total_bytes == 0 || total_bytes > MAX_SWEEP_BYTES {
            return None;
        }
        let combos = 1u64 << (8 * total_bytes);
        for combo in 0..combos {
            let mut assignment = Assignment::new();
            let mut remaining = combo;
            for array in arrays {
                let mut bytes = Vec::with_capacity(array.size() as usize);
                for _ in 0..array.size() {
                    bytes.push((remaining & 0xff) as u8);
                    remaining >>= 8;
                }
                assignment.bind(array.clone(), bytes);
            }
            let satisfied = constraints
                .iter()
                .all(|c| assignment.evaluate_bool(c).unwrap_or(false));
            if satisfied {
                return Some(assignment);
            }
        }
        None
    }
}

impl ValueRange {
    /// Swap the endpoints if a signed mapping inverted them.
    fn normalized(self) -> ValueRange {
        if self.min <= self.max {
            self
        } else {
            ValueRange {
                min: self.max,
                max: self.min,
            }
        }
    }
}

impl SolverBackend for RangeSolver {
    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn evaluate(&mut self, query: Query) -> Result<Validity> {
        debug_assert_eq!(query.expr.width(), 1);
        if let Some(v) = query.expr.as_constant() {
            return Ok(if v == 1 { Validity::True } else { Validity::False });
        }
        let Some(env) = self.refine(query.constraints) else {
            log::warn!("range solver: constraint set unsatisfiable in interval domain");
            return Ok(Validity::Unknown);
        };
        let range = self.range_of(query.expr, &env);
        Ok(if range == ValueRange::singleton(1) {
            Validity::True
        } else if range == ValueRange::singleton(0) {
            Validity::False
        } else {
            Validity::Unknown
        })
    }

    fn get_value(&mut self, query: Query) -> Result<u128> {
        if let Some(v) = query.expr.as_constant() {
            return Ok(v);
        }
        let model = self
            .build_model(query.constraints)
            .ok_or_else(|| Error::Backend("model construction failed".to_string()))?;
        model
            .evaluate(query.expr)
            .map_err(|e| Error::Backend(e.to_string()))
    }

    fn get_range(&mut self, query: Query) -> Result<(u128, u128)> {
        let env = self.refine(query.constraints).unwrap_or_default();
        let range = self.range_of(query.expr, &env);
        Ok((range.min, range.max))
    }

    fn get_initial_values(
        &mut self,
        constraints: &[Expr],
        arrays: &[Array],
    ) -> Result<Vec<Vec<u8>>> {
        let model = self
            .build_model(constraints)
            .ok_or_else(|| Error::Backend("model construction failed".to_string()))?;
        Ok(arrays
            .iter()
            .map(|array| {
                let mut bytes = model.binding(array).cloned().unwrap_or_default();
                bytes.resize(array.size() as usize, 0);
                bytes
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcode_expr::UpdateList;

    fn symbolic_le(name: &str, bytes: u32) -> Expr {
        let array = Array::new_symbolic(name, bytes as u64);
        let updates = UpdateList::new(array);
        let mut value: Option<Expr> = None;
        for i in 0..bytes {
            let b = Expr::read(updates.clone(), Expr::constant(i as u128, 32));
            value = Some(match value {
                None => b,
                Some(acc) => Expr::concat(b, acc),
            });
        }
        value.unwrap()
    }

    #[test]
    fn unconstrained_query_is_unknown() -> Result<()> {
        let x = symbolic_le("x", 4);
        let cond = Expr::ult(x, Expr::constant(10, 32));
        let mut solver = RangeSolver::new();
        assert_eq!(solver.evaluate(Query::new(&[], &cond))?, Validity::Unknown);
        Ok(())
    }

    #[test]
    fn positive_constraint_refutes_negative_branch() -> Result<()> {
        let x = symbolic_le("x", 4);
        let positive = Expr::sgt(x.clone(), Expr::constant(0, 32));
        let negative = Expr::slt(x, Expr::constant(0, 32));
        let constraints = vec![positive];

        let mut solver = RangeSolver::new();
        assert_eq!(
            solver.evaluate(Query::new(&constraints, &negative))?,
            Validity::False
        );
        Ok(())
    }

    #[test]
    fn equality_constraint_pins_value() -> Result<()> {
        let x = symbolic_le("x", 4);
        let constraints = vec![Expr::eq(x.clone(), Expr::constant(42, 32))];
        let mut solver = RangeSolver::new();
        assert_eq!(solver.get_value(Query::new(&constraints, &x))?, 42);
        Ok(())
    }

    #[test]
    fn disequality_moves_sample_off_zero() -> Result<()> {
        let selector = symbolic_le("selector", 1);
        let is_zero = Expr::is_zero_expr(selector.clone());
        let constraints = vec![Expr::logical_not(is_zero)];
        let mut solver = RangeSolver::new();
        let value = solver.get_value(Query::new(&constraints, &selector))?;
        assert_ne!(value, 0);
        Ok(())
    }

    #[test]
    fn range_respects_unsigned_bounds() -> Result<()> {
        let x = symbolic_le("x", 4);
        let constraints = vec![
            Expr::uge(x.clone(), Expr::constant(5, 32)),
            Expr::ult(x.clone(), Expr::constant(10, 32)),
        ];
        let mut solver = RangeSolver::new();
        let (min, max) = solver.get_range(Query::new(&constraints, &x))?;
        assert_eq!((min, max), (5, 9));
        Ok(())
    }

    #[test]
    fn initial_values_satisfy_constraints() -> Result<()> {
        let array = Array::new_symbolic("input", 4);
        let updates = UpdateList::new(array.clone());
        let mut x: Option<Expr> = None;
        for i in 0..4 {
            let b = Expr::read(updates.clone(), Expr::constant(i, 32));
            x = Some(match x {
                None => b,
                Some(acc) => Expr::concat(b, acc),
            });
        }
        let x = x.unwrap();
        let constraints = vec![Expr::eq(x.clone(), Expr::constant(0x01020304, 32))];

        let mut solver = RangeSolver::new();
        let values = solver.get_initial_values(&constraints, &[array])?;
        assert_eq!(values, vec![vec![0x04, 0x03, 0x02, 0x01]]);
        Ok(())
    }

    #[test]
    fn contradictory_constraints_fail_model_construction() {
        let x = symbolic_le("x", 4);
        let constraints = vec![
            Expr::eq(x.clone(), Expr::constant(1, 32)),
            Expr::eq(x, Expr::constant(2, 32)),
        ];
        let solver = RangeSolver::new();
        assert!(solver.build_model(&constraints).is_none());
    }
}
